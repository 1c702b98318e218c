use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quay_core::scheduler::JobHandle;

/// Departure status in the lifecycle. Only Draft and Active carry
/// operational meaning for the reservation engine; Closed blocks new holds
/// but never blocks releasing capacity already committed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepartureStatus {
    Draft,
    Active,
    Closed,
}

/// Booking status in the lifecycle. Cancelled and Expired are terminal;
/// Confirmed is not (a confirmed booking can still be cancelled).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Held,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Expired)
    }
}

/// A scheduled, bookable instance of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Departure {
    pub departure_id: Uuid,
    pub tenant_id: Uuid,
    /// Catalog item anchoring this departure; must be flagged bookable.
    pub product_entity_code: String,
    pub label: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    /// After this instant, new holds are refused.
    pub booking_cutoff_at: Option<DateTime<Utc>>,
    /// Default hold duration for this departure; falls back to the engine
    /// default when absent.
    pub hold_ttl_ms: Option<u64>,
    pub status: DepartureStatus,
    pub resources: Vec<DepartureResource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Departure {
    pub fn resource(&self, resource_id: &str) -> Option<&DepartureResource> {
        self.resources.iter().find(|r| r.resource_id == resource_id)
    }

    pub fn resource_mut(&mut self, resource_id: &str) -> Option<&mut DepartureResource> {
        self.resources
            .iter_mut()
            .find(|r| r.resource_id == resource_id)
    }

    /// Apply a partial update. Capacity counters are structurally out of
    /// reach: the patch has no fields for them.
    pub fn apply_patch(&mut self, patch: &DeparturePatch) {
        if let Some(label) = &patch.label {
            self.label = label.clone();
        }
        if let Some(starts_at) = patch.starts_at {
            self.starts_at = starts_at;
        }
        if let Some(ends_at) = patch.ends_at {
            self.ends_at = ends_at;
        }
        if let Some(cutoff) = patch.booking_cutoff_at {
            self.booking_cutoff_at = cutoff;
        }
        if let Some(ttl) = patch.hold_ttl_ms {
            self.hold_ttl_ms = ttl;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = Utc::now();
    }
}

/// One bookable capacity pool within a departure. Referenced externally by
/// `resource_id` only; bookings never hold a pointer into the departure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartureResource {
    pub resource_id: String,
    pub resource_type: String,
    /// Catalog item priced and validated through the gateway.
    pub child_entity_code: String,
    /// Overrides the catalog list price when present (minor units).
    pub price_override: Option<i64>,
    pub currency: Option<String>,
    pub total_capacity: u32,
    pub available: u32,
    pub held: u32,
    pub booked: u32,
}

impl DepartureResource {
    /// available + held + booked == total_capacity, before and after every
    /// mutation.
    pub fn ledger_balanced(&self) -> bool {
        self.available + self.held + self.booked == self.total_capacity
    }
}

/// A single reservation against one resource of one departure. Created only
/// as the side effect of a successful hold; never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: Uuid,
    pub tenant_id: Uuid,
    pub departure_id: Uuid,
    pub resource_id: String,
    pub child_entity_code: String,
    pub customer_id: String,
    pub order_id: Option<String>,
    pub quantity: u32,
    /// Minor currency units.
    pub unit_price: i64,
    pub currency: String,
    pub total_price: i64,
    pub status: BookingStatus,
    /// Set only while held; cleared when the hold resolves.
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    /// Handle to the scheduled expiry callback, cleared once resolved.
    pub hold_job_id: Option<JobHandle>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new_held(
        tenant_id: Uuid,
        departure_id: Uuid,
        resource_id: String,
        child_entity_code: String,
        customer_id: String,
        quantity: u32,
        unit_price: i64,
        currency: String,
        hold_expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            booking_id: Uuid::new_v4(),
            tenant_id,
            departure_id,
            resource_id,
            child_entity_code,
            customer_id,
            order_id: None,
            quantity,
            unit_price,
            currency,
            total_price: unit_price * quantity as i64,
            status: BookingStatus::Held,
            hold_expires_at: Some(hold_expires_at),
            confirmed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            hold_job_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_confirmed(&mut self, order_id: Option<String>) {
        self.status = BookingStatus::Confirmed;
        self.confirmed_at = Some(Utc::now());
        if order_id.is_some() {
            self.order_id = order_id;
        }
        self.hold_expires_at = None;
        self.hold_job_id = None;
        self.updated_at = Utc::now();
    }

    pub fn mark_cancelled(&mut self, cancelled_by: String, reason: Option<String>) {
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(Utc::now());
        self.cancelled_by = Some(cancelled_by);
        self.cancellation_reason = reason;
        self.hold_expires_at = None;
        self.hold_job_id = None;
        self.updated_at = Utc::now();
    }
}

/// Input for `create_departure`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDeparture {
    pub product_entity_code: String,
    pub label: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub booking_cutoff_at: Option<DateTime<Utc>>,
    pub hold_ttl_ms: Option<u64>,
    pub resources: Vec<NewResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewResource {
    pub resource_id: String,
    pub resource_type: String,
    pub child_entity_code: String,
    pub price_override: Option<i64>,
    pub currency: Option<String>,
    pub total_capacity: u32,
}

/// Partial update for `update_departure`. `Option<Option<_>>` fields
/// distinguish "leave as is" from "clear".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeparturePatch {
    pub label: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<Option<DateTime<Utc>>>,
    pub booking_cutoff_at: Option<Option<DateTime<Utc>>>,
    pub hold_ttl_ms: Option<Option<u64>>,
    pub status: Option<DepartureStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn resource(total: u32) -> DepartureResource {
        DepartureResource {
            resource_id: "adult".to_string(),
            resource_type: "seat".to_string(),
            child_entity_code: "SEAT-ADULT".to_string(),
            price_override: None,
            currency: None,
            total_capacity: total,
            available: total,
            held: 0,
            booked: 0,
        }
    }

    #[test]
    fn fresh_resource_ledger_is_balanced() {
        assert!(resource(10).ledger_balanced());
        assert!(resource(0).ledger_balanced());
    }

    #[test]
    fn booking_total_price_is_unit_times_quantity() {
        let b = Booking::new_held(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "adult".into(),
            "SEAT-ADULT".into(),
            "cust-1".into(),
            3,
            2_500,
            "USD".into(),
            Utc::now() + Duration::minutes(15),
        );
        assert_eq!(b.total_price, 7_500);
        assert_eq!(b.status, BookingStatus::Held);
        assert!(b.hold_expires_at.is_some());
    }

    #[test]
    fn confirm_clears_hold_fields() {
        let mut b = Booking::new_held(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "adult".into(),
            "SEAT-ADULT".into(),
            "cust-1".into(),
            1,
            1_000,
            "USD".into(),
            Utc::now() + Duration::minutes(15),
        );
        b.hold_job_id = Some(JobHandle::new());
        b.mark_confirmed(Some("order-9".into()));
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert!(b.hold_expires_at.is_none());
        assert!(b.hold_job_id.is_none());
        assert_eq!(b.order_id.as_deref(), Some("order-9"));
        assert!(b.confirmed_at.is_some());
    }

    #[test]
    fn patch_never_touches_counters() {
        let now = Utc::now();
        let mut dep = Departure {
            departure_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            product_entity_code: "TOUR".into(),
            label: "Morning".into(),
            starts_at: now,
            ends_at: None,
            booking_cutoff_at: None,
            hold_ttl_ms: None,
            status: DepartureStatus::Draft,
            resources: vec![resource(5)],
            created_at: now,
            updated_at: now,
        };
        dep.apply_patch(&DeparturePatch {
            label: Some("Evening".into()),
            status: Some(DepartureStatus::Active),
            hold_ttl_ms: Some(Some(60_000)),
            ..Default::default()
        });
        assert_eq!(dep.label, "Evening");
        assert_eq!(dep.status, DepartureStatus::Active);
        assert_eq!(dep.hold_ttl_ms, Some(60_000));
        assert_eq!(dep.resources[0].available, 5);
        assert_eq!(dep.resources[0].total_capacity, 5);
    }

    #[test]
    fn terminal_statuses() {
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Expired.is_terminal());
        assert!(!BookingStatus::Held.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
    }
}
