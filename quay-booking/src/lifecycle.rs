use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use quay_catalog::CatalogGateway;
use quay_core::scheduler::{ExpiryHook, ExpiryScheduler};
use quay_core::{EngineError, EngineResult};

use crate::ledger::CapacityUpdate;
use crate::models::{Booking, BookingStatus, Departure, DepartureStatus};
use crate::repository::{BookingFilter, BookingStore, DepartureStore, Page, PageResult};

#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub departure_id: Uuid,
    pub resource_id: String,
    pub customer_id: String,
    pub quantity: u32,
    /// Overrides the departure's hold TTL for this booking.
    pub hold_ttl_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CancelRequest {
    pub cancelled_by: String,
    pub reason: Option<String>,
}

/// The booking state machine: held -> confirmed -> cancelled, held ->
/// cancelled, held -> expired. Each transition pairs one guarded capacity
/// update with one booking document write; no in-process lock is involved.
pub struct BookingLifecycle {
    tenant_id: Uuid,
    departures: Arc<dyn DepartureStore>,
    bookings: Arc<dyn BookingStore>,
    catalog: Arc<dyn CatalogGateway>,
    scheduler: Arc<dyn ExpiryScheduler>,
    default_hold_ttl_ms: u64,
}

impl BookingLifecycle {
    pub fn new(
        tenant_id: Uuid,
        departures: Arc<dyn DepartureStore>,
        bookings: Arc<dyn BookingStore>,
        catalog: Arc<dyn CatalogGateway>,
        scheduler: Arc<dyn ExpiryScheduler>,
        default_hold_ttl_ms: u64,
    ) -> Self {
        Self {
            tenant_id,
            departures,
            bookings,
            catalog,
            scheduler,
            default_hold_ttl_ms,
        }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// Reserve capacity and create a held booking. The single guarded
    /// capacity update serializes all concurrent holders of the resource;
    /// a predicate miss comes back as Conflict with nothing created.
    pub async fn hold_booking(&self, req: HoldRequest) -> EngineResult<Booking> {
        if req.quantity == 0 {
            return Err(EngineError::InvalidState(
                "quantity must be positive".to_string(),
            ));
        }

        let departure = self.load_departure(req.departure_id).await?;
        if departure.status != DepartureStatus::Active {
            return Err(EngineError::InvalidState(format!(
                "departure {} is not active",
                req.departure_id
            )));
        }
        if let Some(cutoff) = departure.booking_cutoff_at {
            if cutoff < Utc::now() {
                return Err(EngineError::InvalidState(format!(
                    "booking cutoff for departure {} has passed",
                    req.departure_id
                )));
            }
        }

        let resource = departure.resource(&req.resource_id).ok_or_else(|| {
            EngineError::NotFound(format!(
                "resource {} on departure {}",
                req.resource_id, req.departure_id
            ))
        })?;

        let (unit_price, currency) = self.resolve_price(resource).await?;

        let reserved = self
            .departures
            .apply_capacity(
                self.tenant_id,
                req.departure_id,
                &req.resource_id,
                CapacityUpdate::Hold {
                    quantity: req.quantity,
                },
            )
            .await?;
        if !reserved {
            // Availability from the pre-update read; informational only,
            // the in-store guard is authoritative.
            return Err(EngineError::Conflict {
                requested: req.quantity,
                available: resource.available,
            });
        }

        let ttl_ms = req
            .hold_ttl_ms
            .or(departure.hold_ttl_ms)
            .unwrap_or(self.default_hold_ttl_ms);
        let hold_expires_at = Utc::now() + chrono::Duration::milliseconds(ttl_ms as i64);

        let mut booking = Booking::new_held(
            self.tenant_id,
            req.departure_id,
            req.resource_id.clone(),
            resource.child_entity_code.clone(),
            req.customer_id,
            req.quantity,
            unit_price,
            currency,
            hold_expires_at,
        );
        self.bookings.insert(&booking).await?;

        match self
            .scheduler
            .schedule(booking.booking_id, Duration::from_millis(ttl_ms))
            .await
        {
            Ok(handle) => {
                match self
                    .bookings
                    .set_hold_job_if_held(self.tenant_id, booking.booking_id, &handle)
                    .await?
                {
                    Some(updated) => booking = updated,
                    None => {
                        // The job fired before its handle was persisted
                        // and the hold already resolved; the Held snapshot
                        // must not be written back over a terminal status.
                        booking = self.load_booking(booking.booking_id).await?;
                    }
                }
            }
            Err(e) => {
                // Degraded mode: the hold stays valid without automatic
                // expiry; the reconciliation sweep picks it up later.
                warn!(
                    booking_id = %booking.booking_id,
                    error = %e,
                    "expiry scheduling failed, hold relies on the sweep"
                );
            }
        }

        info!(
            booking_id = %booking.booking_id,
            departure_id = %req.departure_id,
            resource_id = %req.resource_id,
            quantity = req.quantity,
            "hold created"
        );
        Ok(booking)
    }

    /// Convert a hold into a confirmed booking: held -> booked on the
    /// ledger. A guard miss here means the ledger no longer carries what
    /// the booking says it holds, which is a bug, not a user error.
    pub async fn confirm_booking(
        &self,
        booking_id: Uuid,
        order_id: Option<String>,
    ) -> EngineResult<Booking> {
        let mut booking = self.load_booking(booking_id).await?;
        if booking.status != BookingStatus::Held {
            return Err(EngineError::InvalidState(format!(
                "booking {} is {:?}, only held bookings can be confirmed",
                booking_id, booking.status
            )));
        }

        let committed = self
            .departures
            .apply_capacity(
                self.tenant_id,
                booking.departure_id,
                &booking.resource_id,
                CapacityUpdate::Commit {
                    quantity: booking.quantity,
                },
            )
            .await?;
        if !committed {
            error!(
                %booking_id,
                departure_id = %booking.departure_id,
                resource_id = %booking.resource_id,
                "held quantity missing from ledger on confirm"
            );
            return Err(EngineError::Internal(format!(
                "capacity ledger does not hold booking {booking_id}"
            )));
        }

        let job = booking.hold_job_id.clone();
        booking.mark_confirmed(order_id);
        self.bookings.update(&booking).await?;
        self.cancel_job(job).await;

        info!(%booking_id, "booking confirmed");
        Ok(booking)
    }

    /// Release a held or confirmed booking back to available capacity.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        req: CancelRequest,
    ) -> EngineResult<Booking> {
        let mut booking = self.load_booking(booking_id).await?;
        let update = match booking.status {
            BookingStatus::Held => CapacityUpdate::ReleaseHeld {
                quantity: booking.quantity,
            },
            BookingStatus::Confirmed => CapacityUpdate::ReleaseBooked {
                quantity: booking.quantity,
            },
            other => {
                return Err(EngineError::InvalidState(format!(
                    "booking {booking_id} is {other:?} and cannot be cancelled"
                )));
            }
        };
        let was_held = booking.status == BookingStatus::Held;

        let released = self
            .departures
            .apply_capacity(
                self.tenant_id,
                booking.departure_id,
                &booking.resource_id,
                update,
            )
            .await?;
        if !released {
            error!(
                %booking_id,
                departure_id = %booking.departure_id,
                "ledger guard failed on cancel"
            );
            return Err(EngineError::Internal(format!(
                "capacity ledger does not carry booking {booking_id}"
            )));
        }

        let job = booking.hold_job_id.clone();
        booking.mark_cancelled(req.cancelled_by, req.reason);
        self.bookings.update(&booking).await?;
        if was_held {
            self.cancel_job(job).await;
        }

        info!(%booking_id, "booking cancelled");
        Ok(booking)
    }

    /// Expire an abandoned hold. Invoked by the scheduler callback and the
    /// reconciliation sweep; losing the race against a concurrent
    /// confirm/cancel is a normal, successful no-op.
    pub async fn expire_booking(&self, booking_id: Uuid) -> EngineResult<()> {
        let expired = self
            .bookings
            .mark_expired_if_held(self.tenant_id, booking_id)
            .await?;
        let Some(booking) = expired else {
            // Already confirmed, cancelled, or expired.
            return Ok(());
        };

        let released = self
            .departures
            .apply_capacity(
                self.tenant_id,
                booking.departure_id,
                &booking.resource_id,
                CapacityUpdate::ReleaseHeld {
                    quantity: booking.quantity,
                },
            )
            .await?;
        if !released {
            error!(
                %booking_id,
                departure_id = %booking.departure_id,
                "ledger guard failed on expire"
            );
            return Err(EngineError::Internal(format!(
                "capacity ledger does not carry expired booking {booking_id}"
            )));
        }

        info!(%booking_id, "hold expired, capacity returned");
        Ok(())
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> EngineResult<Booking> {
        self.load_booking(booking_id).await
    }

    pub async fn list_bookings(
        &self,
        filter: &BookingFilter,
        page: Page,
    ) -> EngineResult<PageResult<Booking>> {
        Ok(self.bookings.list(self.tenant_id, filter, page).await?)
    }

    /// Reconciliation sweep: expire every booking still held past its
    /// `hold_expires_at`. Defense against lost scheduler callbacks.
    pub async fn sweep_expired_holds(&self) -> EngineResult<usize> {
        let overdue = self.bookings.overdue_holds(self.tenant_id, Utc::now()).await?;
        let mut expired = 0;
        for booking in overdue {
            match self.expire_booking(booking.booking_id).await {
                Ok(()) => expired += 1,
                Err(e) => {
                    error!(booking_id = %booking.booking_id, error = %e, "sweep failed to expire hold");
                }
            }
        }
        if expired > 0 {
            info!(expired, "reconciliation sweep released overdue holds");
        }
        Ok(expired)
    }

    async fn load_departure(&self, departure_id: Uuid) -> EngineResult<Departure> {
        self.departures
            .get(self.tenant_id, departure_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("departure {departure_id}")))
    }

    async fn load_booking(&self, booking_id: Uuid) -> EngineResult<Booking> {
        self.bookings
            .get(self.tenant_id, booking_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("booking {booking_id}")))
    }

    /// Resource price override, else the catalog list price.
    async fn resolve_price(
        &self,
        resource: &crate::models::DepartureResource,
    ) -> EngineResult<(i64, String)> {
        if let Some(price) = resource.price_override {
            let currency = resource
                .currency
                .clone()
                .unwrap_or_else(|| "USD".to_string());
            return Ok((price, currency));
        }
        let item = self
            .catalog
            .lookup(self.tenant_id, &resource.child_entity_code)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("catalog item {}", resource.child_entity_code))
            })?;
        let price = item.list_price.ok_or_else(|| {
            EngineError::InvalidState(format!(
                "catalog item {} has no list price",
                resource.child_entity_code
            ))
        })?;
        Ok((price, resource.currency.clone().unwrap_or(item.currency)))
    }

    /// Best-effort cancel of a scheduled expiry job; failures are swallowed.
    async fn cancel_job(&self, job: Option<quay_core::scheduler::JobHandle>) {
        if let Some(handle) = job {
            if let Err(e) = self.scheduler.cancel(&handle).await {
                warn!(job = %handle.0, error = %e, "failed to cancel expiry job");
            }
        }
    }
}

#[async_trait]
impl ExpiryHook for BookingLifecycle {
    async fn on_hold_expired(&self, booking_id: Uuid) {
        if let Err(e) = self.expire_booking(booking_id).await {
            error!(%booking_id, error = %e, "scheduled expiry failed");
        }
    }
}
