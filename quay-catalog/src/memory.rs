use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::gateway::{CatalogError, CatalogGateway, CatalogItem};

/// In-memory catalog keyed by (tenant, entity code). Used for wiring the
/// engine in tests and local runs; a real deployment points the gateway
/// trait at the catalog service instead.
pub struct InMemoryCatalog {
    items: RwLock<HashMap<(Uuid, String), CatalogItem>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, tenant_id: Uuid, item: CatalogItem) {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.insert((tenant_id, item.entity_code.clone()), item);
    }

    /// Seed a bookable item with a list price.
    pub fn seed_bookable(&self, tenant_id: Uuid, entity_code: &str, list_price: i64) {
        self.insert(
            tenant_id,
            CatalogItem {
                entity_code: entity_code.to_string(),
                bookable: true,
                list_price: Some(list_price),
                currency: "USD".to_string(),
            },
        );
    }

    /// Seed an item that exists but may not anchor a departure.
    pub fn seed_non_bookable(&self, tenant_id: Uuid, entity_code: &str) {
        self.insert(
            tenant_id,
            CatalogItem {
                entity_code: entity_code.to_string(),
                bookable: false,
                list_price: None,
                currency: "USD".to_string(),
            },
        );
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogGateway for InMemoryCatalog {
    async fn lookup(
        &self,
        tenant_id: Uuid,
        entity_code: &str,
    ) -> Result<Option<CatalogItem>, CatalogError> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        Ok(items.get(&(tenant_id, entity_code.to_string())).cloned())
    }
}
