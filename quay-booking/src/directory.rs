use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use quay_catalog::CatalogGateway;
use quay_core::{EngineError, EngineResult};

use crate::models::{
    Departure, DeparturePatch, DepartureResource, DepartureStatus, NewDeparture,
};
use crate::repository::{BookingStore, DepartureFilter, DepartureStore, Page, PageResult};

/// CRUD over departure definitions and their embedded resources. Creation
/// validates every referenced catalog item; deletion is guarded so capacity
/// that bookings reference can never vanish underneath them.
pub struct DepartureDirectory {
    tenant_id: Uuid,
    departures: Arc<dyn DepartureStore>,
    bookings: Arc<dyn BookingStore>,
    catalog: Arc<dyn CatalogGateway>,
}

impl DepartureDirectory {
    pub fn new(
        tenant_id: Uuid,
        departures: Arc<dyn DepartureStore>,
        bookings: Arc<dyn BookingStore>,
        catalog: Arc<dyn CatalogGateway>,
    ) -> Self {
        Self {
            tenant_id,
            departures,
            bookings,
            catalog,
        }
    }

    pub async fn create_departure(&self, input: NewDeparture) -> EngineResult<Departure> {
        if input.resources.is_empty() {
            return Err(EngineError::InvalidState(
                "departure must define at least one resource".to_string(),
            ));
        }
        for (i, resource) in input.resources.iter().enumerate() {
            if input.resources[..i]
                .iter()
                .any(|r| r.resource_id == resource.resource_id)
            {
                return Err(EngineError::InvalidState(format!(
                    "duplicate resource_id: {}",
                    resource.resource_id
                )));
            }
        }

        let product = self
            .catalog
            .lookup(self.tenant_id, &input.product_entity_code)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("catalog item {}", input.product_entity_code))
            })?;
        if !product.bookable {
            return Err(EngineError::InvalidState(format!(
                "catalog item {} is not bookable",
                input.product_entity_code
            )));
        }

        for resource in &input.resources {
            self.catalog
                .lookup(self.tenant_id, &resource.child_entity_code)
                .await?
                .ok_or_else(|| {
                    EngineError::NotFound(format!("catalog item {}", resource.child_entity_code))
                })?;
        }

        let now = Utc::now();
        let departure = Departure {
            departure_id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            product_entity_code: input.product_entity_code,
            label: input.label,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            booking_cutoff_at: input.booking_cutoff_at,
            hold_ttl_ms: input.hold_ttl_ms,
            status: DepartureStatus::Draft,
            resources: input
                .resources
                .into_iter()
                .map(|r| DepartureResource {
                    resource_id: r.resource_id,
                    resource_type: r.resource_type,
                    child_entity_code: r.child_entity_code,
                    price_override: r.price_override,
                    currency: r.currency,
                    total_capacity: r.total_capacity,
                    available: r.total_capacity,
                    held: 0,
                    booked: 0,
                })
                .collect(),
            created_at: now,
            updated_at: now,
        };

        self.departures.insert(&departure).await?;
        info!(
            departure_id = %departure.departure_id,
            resources = departure.resources.len(),
            "departure created"
        );
        Ok(departure)
    }

    pub async fn get_departure(&self, departure_id: Uuid) -> EngineResult<Departure> {
        self.departures
            .get(self.tenant_id, departure_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("departure {departure_id}")))
    }

    pub async fn list_departures(
        &self,
        filter: &DepartureFilter,
        page: Page,
    ) -> EngineResult<PageResult<Departure>> {
        Ok(self.departures.list(self.tenant_id, filter, page).await?)
    }

    pub async fn update_departure(
        &self,
        departure_id: Uuid,
        patch: &DeparturePatch,
    ) -> EngineResult<Departure> {
        let updated = self
            .departures
            .update(self.tenant_id, departure_id, patch)
            .await?;
        if !updated {
            return Err(EngineError::NotFound(format!("departure {departure_id}")));
        }
        self.get_departure(departure_id).await
    }

    pub async fn delete_departure(&self, departure_id: Uuid) -> EngineResult<()> {
        let departure = self.get_departure(departure_id).await?;
        if departure.status != DepartureStatus::Draft {
            return Err(EngineError::InvalidState(
                "only draft departures can be deleted".to_string(),
            ));
        }
        if self
            .bookings
            .any_for_departure(self.tenant_id, departure_id)
            .await?
        {
            return Err(EngineError::InvalidState(
                "departure has bookings and cannot be deleted".to_string(),
            ));
        }
        self.departures.delete(self.tenant_id, departure_id).await?;
        info!(%departure_id, "departure deleted");
        Ok(())
    }
}
