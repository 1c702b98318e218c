use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use quay_booking::ledger::CapacityUpdate;
use quay_core::scheduler::JobHandle;
use quay_booking::models::{Booking, BookingStatus, Departure, DeparturePatch};
use quay_booking::repository::{
    BookingFilter, BookingStore, DepartureFilter, DepartureStore, Page, PageResult, StoreError,
};

const MAX_PAGE_LIMIT: u32 = 100;

/// Tenant-scoped in-memory document store. One mutex guards all documents,
/// so every `apply_capacity` call evaluates its guard and applies its
/// counter moves inside one critical section, the same atomicity a document
/// database gives a single conditional update. Production deployments
/// implement the store traits over such a database instead.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    departures: HashMap<(Uuid, Uuid), Departure>,
    bookings: HashMap<(Uuid, Uuid), Booking>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn paginate<T: Clone>(matched: Vec<&T>, page: Page) -> PageResult<T> {
    let limit = page.limit.clamp(1, MAX_PAGE_LIMIT);
    let total = matched.len();
    let items = matched
        .into_iter()
        .skip(page.offset())
        .take(limit as usize)
        .cloned()
        .collect();
    PageResult {
        items,
        total,
        page: page.page.max(1),
        limit,
    }
}

#[async_trait]
impl DepartureStore for MemoryStore {
    async fn insert(&self, departure: &Departure) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.departures.insert(
            (departure.tenant_id, departure.departure_id),
            departure.clone(),
        );
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: Uuid,
        departure_id: Uuid,
    ) -> Result<Option<Departure>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.departures.get(&(tenant_id, departure_id)).cloned())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &DepartureFilter,
        page: Page,
    ) -> Result<PageResult<Departure>, StoreError> {
        let inner = self.inner.lock().await;
        let mut matched: Vec<&Departure> = inner
            .departures
            .iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|(_, d)| d)
            .filter(|d| filter.matches(d))
            .collect();
        matched.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
        Ok(paginate(matched, page))
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        departure_id: Uuid,
        patch: &DeparturePatch,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.departures.get_mut(&(tenant_id, departure_id)) {
            Some(departure) => {
                departure.apply_patch(patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, tenant_id: Uuid, departure_id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.departures.remove(&(tenant_id, departure_id)).is_some())
    }

    async fn apply_capacity(
        &self,
        tenant_id: Uuid,
        departure_id: Uuid,
        resource_id: &str,
        update: CapacityUpdate,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(departure) = inner.departures.get_mut(&(tenant_id, departure_id)) else {
            return Ok(false);
        };
        let status = departure.status;
        let Some(resource) = departure.resource_mut(resource_id) else {
            return Ok(false);
        };
        if !update.guard(resource, status) {
            return Ok(false);
        }
        update.apply(resource);
        departure.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .bookings
            .insert((booking.tenant_id, booking.booking_id), booking.clone());
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.bookings.get(&(tenant_id, booking_id)).cloned())
    }

    async fn update(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.bookings.get_mut(&(booking.tenant_id, booking.booking_id)) {
            Some(existing) => {
                *existing = booking.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!(
                "booking {} vanished during update",
                booking.booking_id
            ))),
        }
    }

    async fn mark_expired_if_held(
        &self,
        tenant_id: Uuid,
        booking_id: Uuid,
    ) -> Result<Option<Booking>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(booking) = inner.bookings.get_mut(&(tenant_id, booking_id)) else {
            return Ok(None);
        };
        if booking.status != BookingStatus::Held {
            return Ok(None);
        }
        booking.status = BookingStatus::Expired;
        booking.hold_expires_at = None;
        booking.hold_job_id = None;
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }

    async fn set_hold_job_if_held(
        &self,
        tenant_id: Uuid,
        booking_id: Uuid,
        handle: &JobHandle,
    ) -> Result<Option<Booking>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(booking) = inner.bookings.get_mut(&(tenant_id, booking_id)) else {
            return Ok(None);
        };
        if booking.status != BookingStatus::Held {
            return Ok(None);
        }
        booking.hold_job_id = Some(handle.clone());
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }

    async fn any_for_departure(
        &self,
        tenant_id: Uuid,
        departure_id: Uuid,
    ) -> Result<bool, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .bookings
            .iter()
            .any(|((t, _), b)| *t == tenant_id && b.departure_id == departure_id))
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &BookingFilter,
        page: Page,
    ) -> Result<PageResult<Booking>, StoreError> {
        let inner = self.inner.lock().await;
        let mut matched: Vec<&Booking> = inner
            .bookings
            .iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|(_, b)| b)
            .filter(|b| filter.matches(b))
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(matched, page))
    }

    async fn overdue_holds(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .bookings
            .iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|(_, b)| b)
            .filter(|b| {
                b.status == BookingStatus::Held
                    && b.hold_expires_at.map(|at| at < now).unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quay_booking::models::{DepartureResource, DepartureStatus};

    fn departure(tenant_id: Uuid, status: DepartureStatus, available: u32) -> Departure {
        let now = Utc::now();
        Departure {
            departure_id: Uuid::new_v4(),
            tenant_id,
            product_entity_code: "TOUR".into(),
            label: "Morning run".into(),
            starts_at: now + Duration::days(7),
            ends_at: None,
            booking_cutoff_at: None,
            hold_ttl_ms: None,
            status,
            resources: vec![DepartureResource {
                resource_id: "adult".into(),
                resource_type: "seat".into(),
                child_entity_code: "SEAT-ADULT".into(),
                price_override: None,
                currency: None,
                total_capacity: available,
                available,
                held: 0,
                booked: 0,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn apply_capacity_is_all_or_nothing() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let dep = departure(tenant, DepartureStatus::Active, 5);
        DepartureStore::insert(&store, &dep).await.unwrap();

        let ok = store
            .apply_capacity(tenant, dep.departure_id, "adult", CapacityUpdate::Hold { quantity: 3 })
            .await
            .unwrap();
        assert!(ok);

        let refused = store
            .apply_capacity(tenant, dep.departure_id, "adult", CapacityUpdate::Hold { quantity: 3 })
            .await
            .unwrap();
        assert!(!refused);

        let loaded = DepartureStore::get(&store, tenant, dep.departure_id)
            .await
            .unwrap()
            .unwrap();
        let r = loaded.resource("adult").unwrap();
        assert_eq!((r.available, r.held, r.booked), (2, 3, 0));
        assert!(r.ledger_balanced());
    }

    #[tokio::test]
    async fn hold_guard_requires_active_status() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let dep = departure(tenant, DepartureStatus::Draft, 5);
        DepartureStore::insert(&store, &dep).await.unwrap();

        let ok = store
            .apply_capacity(tenant, dep.departure_id, "adult", CapacityUpdate::Hold { quantity: 1 })
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn unknown_resource_or_departure_does_not_match() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let dep = departure(tenant, DepartureStatus::Active, 5);
        DepartureStore::insert(&store, &dep).await.unwrap();

        assert!(!store
            .apply_capacity(tenant, dep.departure_id, "child", CapacityUpdate::Hold { quantity: 1 })
            .await
            .unwrap());
        assert!(!store
            .apply_capacity(tenant, Uuid::new_v4(), "adult", CapacityUpdate::Hold { quantity: 1 })
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn mark_expired_is_a_cas_on_held() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let mut booking = Booking::new_held(
            tenant,
            Uuid::new_v4(),
            "adult".into(),
            "SEAT-ADULT".into(),
            "cust".into(),
            1,
            1_000,
            "USD".into(),
            Utc::now() + Duration::minutes(10),
        );
        BookingStore::insert(&store, &booking).await.unwrap();

        let swapped = store
            .mark_expired_if_held(tenant, booking.booking_id)
            .await
            .unwrap();
        assert_eq!(swapped.unwrap().status, BookingStatus::Expired);

        // Second attempt misses: no longer held.
        let missed = store
            .mark_expired_if_held(tenant, booking.booking_id)
            .await
            .unwrap();
        assert!(missed.is_none());

        // A confirmed booking is never swapped.
        booking.booking_id = Uuid::new_v4();
        booking.mark_confirmed(None);
        BookingStore::insert(&store, &booking).await.unwrap();
        let missed = store
            .mark_expired_if_held(tenant, booking.booking_id)
            .await
            .unwrap();
        assert!(missed.is_none());
    }

    #[tokio::test]
    async fn hold_job_is_only_recorded_on_held_bookings() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let booking = Booking::new_held(
            tenant,
            Uuid::new_v4(),
            "adult".into(),
            "SEAT-ADULT".into(),
            "cust".into(),
            1,
            1_000,
            "USD".into(),
            Utc::now() + Duration::minutes(10),
        );
        BookingStore::insert(&store, &booking).await.unwrap();

        let handle = JobHandle::new();
        let updated = store
            .set_hold_job_if_held(tenant, booking.booking_id, &handle)
            .await
            .unwrap();
        assert_eq!(updated.unwrap().hold_job_id, Some(handle));

        // Once the hold resolves, the swap misses and nothing is written.
        store
            .mark_expired_if_held(tenant, booking.booking_id)
            .await
            .unwrap();
        let missed = store
            .set_hold_job_if_held(tenant, booking.booking_id, &JobHandle::new())
            .await
            .unwrap();
        assert!(missed.is_none());
        let loaded = BookingStore::get(&store, tenant, booking.booking_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, BookingStatus::Expired);
        assert!(loaded.hold_job_id.is_none());
    }

    #[tokio::test]
    async fn listing_is_tenant_scoped_and_sorted() {
        let store = MemoryStore::new();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();

        let mut early = departure(tenant_a, DepartureStatus::Active, 5);
        early.starts_at = Utc::now() + Duration::days(1);
        let mut late = departure(tenant_a, DepartureStatus::Active, 5);
        late.starts_at = Utc::now() + Duration::days(30);
        let other = departure(tenant_b, DepartureStatus::Active, 5);

        for d in [&early, &late, &other] {
            DepartureStore::insert(&store, d).await.unwrap();
        }

        let page = DepartureStore::list(&store, tenant_a, &DepartureFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        // starts_at descending
        assert_eq!(page.items[0].departure_id, late.departure_id);
        assert_eq!(page.items[1].departure_id, early.departure_id);
    }

    #[tokio::test]
    async fn overdue_holds_only_returns_elapsed_held() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();

        let overdue = Booking::new_held(
            tenant,
            Uuid::new_v4(),
            "adult".into(),
            "SEAT-ADULT".into(),
            "cust".into(),
            1,
            1_000,
            "USD".into(),
            Utc::now() - Duration::minutes(1),
        );
        let fresh = Booking::new_held(
            tenant,
            Uuid::new_v4(),
            "adult".into(),
            "SEAT-ADULT".into(),
            "cust".into(),
            1,
            1_000,
            "USD".into(),
            Utc::now() + Duration::minutes(10),
        );
        BookingStore::insert(&store, &overdue).await.unwrap();
        BookingStore::insert(&store, &fresh).await.unwrap();

        let found = store.overdue_holds(tenant, Utc::now()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].booking_id, overdue.booking_id);
    }
}
