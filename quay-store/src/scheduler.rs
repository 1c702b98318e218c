use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use quay_core::scheduler::{ExpiryHook, ExpiryScheduler, JobHandle, SchedulerError};

/// Tokio-backed expiry scheduler: one delayed task per hold, firing the
/// bound `ExpiryHook`. The hook is bound after construction so the
/// lifecycle manager (which owns the scheduler) can also be its target.
///
/// In-process timers do not survive restarts; the reconciliation sweep is
/// the durability backstop, exactly as with an external job queue whose
/// persistence is not guaranteed.
#[derive(Clone)]
pub struct TokioExpiryScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    hook: OnceLock<Arc<dyn ExpiryHook>>,
    jobs: Mutex<HashMap<JobHandle, AbortHandle>>,
}

impl TokioExpiryScheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                hook: OnceLock::new(),
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Bind the callback target. Jobs scheduled before binding fire into
    /// nothing but a warning; the sweep covers the holds they carried.
    pub fn bind(&self, hook: Arc<dyn ExpiryHook>) {
        if self.inner.hook.set(hook).is_err() {
            warn!("expiry hook already bound, ignoring rebind");
        }
    }
}

impl Default for TokioExpiryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn forget(&self, handle: &JobHandle) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.remove(handle);
    }
}

#[async_trait]
impl ExpiryScheduler for TokioExpiryScheduler {
    async fn schedule(
        &self,
        booking_id: Uuid,
        delay: Duration,
    ) -> Result<JobHandle, SchedulerError> {
        let handle = JobHandle::new();
        let inner = Arc::clone(&self.inner);
        let job_id = handle.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.forget(&job_id);
            match inner.hook.get() {
                Some(hook) => hook.on_hold_expired(booking_id).await,
                None => warn!(%booking_id, "expiry fired with no hook bound"),
            }
        });

        let mut jobs = self.inner.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.insert(handle.clone(), task.abort_handle());
        debug!(%booking_id, job = %handle.0, delay_ms = delay.as_millis() as u64, "expiry scheduled");
        Ok(handle)
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<(), SchedulerError> {
        let mut jobs = self.inner.jobs.lock().unwrap_or_else(|e| e.into_inner());
        match jobs.remove(handle) {
            Some(abort) => {
                abort.abort();
                Ok(())
            }
            // The job may already have fired; its callback is a no-op then.
            None => Err(SchedulerError::UnknownJob(handle.0.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHook {
        fired: AtomicUsize,
    }

    #[async_trait]
    impl ExpiryHook for CountingHook {
        async fn on_hold_expired(&self, _booking_id: Uuid) {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn fires_hook_after_delay() {
        let scheduler = TokioExpiryScheduler::new();
        let hook = Arc::new(CountingHook { fired: AtomicUsize::new(0) });
        scheduler.bind(hook.clone());

        scheduler
            .schedule(Uuid::new_v4(), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hook.fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_prevents_firing() {
        let scheduler = TokioExpiryScheduler::new();
        let hook = Arc::new(CountingHook { fired: AtomicUsize::new(0) });
        scheduler.bind(hook.clone());

        let job = scheduler
            .schedule(Uuid::new_v4(), Duration::from_millis(30))
            .await
            .unwrap();
        scheduler.cancel(&job).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(hook.fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelling_a_fired_job_reports_unknown() {
        let scheduler = TokioExpiryScheduler::new();
        let hook = Arc::new(CountingHook { fired: AtomicUsize::new(0) });
        scheduler.bind(hook);

        let job = scheduler
            .schedule(Uuid::new_v4(), Duration::from_millis(5))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(matches!(
            scheduler.cancel(&job).await,
            Err(SchedulerError::UnknownJob(_))
        ));
    }
}
