use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle to a scheduled expiry callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler unavailable: {0}")]
    Unavailable(String),

    #[error("unknown job: {0}")]
    UnknownJob(String),
}

/// Time-delayed expiry callbacks, injected so production code and tests can
/// swap implementations. Schedule failures are survivable: the hold stays
/// valid without automatic expiry until a reconciliation sweep catches it.
#[async_trait]
pub trait ExpiryScheduler: Send + Sync {
    /// Schedule an expire callback for `booking_id` after `delay`.
    async fn schedule(&self, booking_id: Uuid, delay: Duration) -> Result<JobHandle, SchedulerError>;

    /// Best-effort cancel of a previously scheduled callback.
    async fn cancel(&self, handle: &JobHandle) -> Result<(), SchedulerError>;
}

/// The callback target a scheduler fires into when a hold's TTL elapses.
#[async_trait]
pub trait ExpiryHook: Send + Sync {
    async fn on_hold_expired(&self, booking_id: Uuid);
}

/// Degraded-mode scheduler: accepts every request and never fires.
/// Holds created under it are released only by the reconciliation sweep.
pub struct NoopScheduler;

#[async_trait]
impl ExpiryScheduler for NoopScheduler {
    async fn schedule(&self, booking_id: Uuid, _delay: Duration) -> Result<JobHandle, SchedulerError> {
        tracing::debug!(%booking_id, "noop scheduler: expiry left to the sweep");
        Ok(JobHandle::new())
    }

    async fn cancel(&self, _handle: &JobHandle) -> Result<(), SchedulerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_scheduler_accepts_and_never_fails() {
        let scheduler = NoopScheduler;
        let handle = scheduler
            .schedule(Uuid::new_v4(), Duration::from_secs(900))
            .await
            .unwrap();
        scheduler.cancel(&handle).await.unwrap();
    }

    #[test]
    fn job_handles_are_unique() {
        assert_ne!(JobHandle::new(), JobHandle::new());
    }
}
