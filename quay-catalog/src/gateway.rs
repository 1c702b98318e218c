use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quay_core::EngineError;

/// What the catalog knows about one entity code: existence is signalled by
/// `lookup` returning `Some`, the rest is the narrow slice the reservation
/// engine needs (bookable flag and a list price).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub entity_code: String,
    pub bookable: bool,
    /// List price in minor currency units, if the item carries one.
    pub list_price: Option<i64>,
    pub currency: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

impl From<CatalogError> for EngineError {
    fn from(e: CatalogError) -> Self {
        EngineError::Catalog(e.to_string())
    }
}

/// Gateway to the (external) product catalog. The engine only ever asks one
/// question per code; tenancy is resolved by the caller.
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    async fn lookup(
        &self,
        tenant_id: Uuid,
        entity_code: &str,
    ) -> Result<Option<CatalogItem>, CatalogError>;
}
