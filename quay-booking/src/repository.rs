use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quay_core::scheduler::JobHandle;
use quay_core::EngineError;

use crate::ledger::CapacityUpdate;
use crate::models::{Booking, BookingStatus, Departure, DeparturePatch, DepartureStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Storage(e.to_string())
    }
}

/// Pagination request. Pages are 1-based; limit is clamped by stores.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl Page {
    pub fn offset(&self) -> usize {
        let page = self.page.max(1) as usize;
        (page - 1) * self.limit as usize
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartureFilter {
    pub product_entity_code: Option<String>,
    pub status: Option<DepartureStatus>,
    pub starts_from: Option<DateTime<Utc>>,
    pub starts_until: Option<DateTime<Utc>>,
}

impl DepartureFilter {
    pub fn matches(&self, departure: &Departure) -> bool {
        if let Some(code) = &self.product_entity_code {
            if &departure.product_entity_code != code {
                return false;
            }
        }
        if let Some(status) = self.status {
            if departure.status != status {
                return false;
            }
        }
        if let Some(from) = self.starts_from {
            if departure.starts_at < from {
                return false;
            }
        }
        if let Some(until) = self.starts_until {
            if departure.starts_at > until {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilter {
    pub departure_id: Option<Uuid>,
    pub customer_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_until: Option<DateTime<Utc>>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(id) = self.departure_id {
            if booking.departure_id != id {
                return false;
            }
        }
        if let Some(customer) = &self.customer_id {
            if &booking.customer_id != customer {
                return false;
            }
        }
        if let Some(status) = self.status {
            if booking.status != status {
                return false;
            }
        }
        if let Some(from) = self.created_from {
            if booking.created_at < from {
                return false;
            }
        }
        if let Some(until) = self.created_until {
            if booking.created_at > until {
                return false;
            }
        }
        true
    }
}

/// Departure persistence. `apply_capacity` is the load-bearing call: the
/// backend must evaluate the update's guard and apply its counter moves as
/// one atomic single-document operation. Everything else is plain CRUD.
#[async_trait]
pub trait DepartureStore: Send + Sync {
    async fn insert(&self, departure: &Departure) -> Result<(), StoreError>;

    async fn get(&self, tenant_id: Uuid, departure_id: Uuid)
        -> Result<Option<Departure>, StoreError>;

    /// Sorted by `starts_at` descending.
    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &DepartureFilter,
        page: Page,
    ) -> Result<PageResult<Departure>, StoreError>;

    /// Returns false when the departure does not exist.
    async fn update(
        &self,
        tenant_id: Uuid,
        departure_id: Uuid,
        patch: &DeparturePatch,
    ) -> Result<bool, StoreError>;

    /// Returns false when the departure does not exist.
    async fn delete(&self, tenant_id: Uuid, departure_id: Uuid) -> Result<bool, StoreError>;

    /// Single conditionally-guarded counter update against one resource of
    /// one departure. Returns false when the predicate does not match
    /// (missing departure/resource, wrong status for a hold, or
    /// insufficient quantity in the source pool) with no partial mutation.
    async fn apply_capacity(
        &self,
        tenant_id: Uuid,
        departure_id: Uuid,
        resource_id: &str,
        update: CapacityUpdate,
    ) -> Result<bool, StoreError>;
}

/// Booking persistence. `mark_expired_if_held` is a compare-and-swap on
/// status, guarding the expire race against a concurrent confirm/cancel.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn get(&self, tenant_id: Uuid, booking_id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// Whole-document write of an existing booking.
    async fn update(&self, booking: &Booking) -> Result<(), StoreError>;

    /// Set status to Expired and clear the hold fields, only if the current
    /// status is still Held. Returns the updated booking when the swap
    /// matched, None otherwise.
    async fn mark_expired_if_held(
        &self,
        tenant_id: Uuid,
        booking_id: Uuid,
    ) -> Result<Option<Booking>, StoreError>;

    /// Record the scheduled expiry job on a booking, only if it is still
    /// Held. Returns the updated booking when the swap matched, None when
    /// the hold resolved in the meantime — the job can fire before its
    /// handle is persisted, and an unconditional write here would drag a
    /// terminal booking back to Held.
    async fn set_hold_job_if_held(
        &self,
        tenant_id: Uuid,
        booking_id: Uuid,
        handle: &JobHandle,
    ) -> Result<Option<Booking>, StoreError>;

    /// Whether any booking (in any status) references the departure.
    async fn any_for_departure(
        &self,
        tenant_id: Uuid,
        departure_id: Uuid,
    ) -> Result<bool, StoreError>;

    /// Sorted by `created_at` descending.
    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &BookingFilter,
        page: Page,
    ) -> Result<PageResult<Booking>, StoreError>;

    /// Bookings still Held whose `hold_expires_at` has passed. Feed for the
    /// reconciliation sweep.
    async fn overdue_holds(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offset_is_one_based() {
        assert_eq!(Page { page: 1, limit: 20 }.offset(), 0);
        assert_eq!(Page { page: 3, limit: 10 }.offset(), 20);
        // page 0 is treated as page 1
        assert_eq!(Page { page: 0, limit: 10 }.offset(), 0);
    }
}
