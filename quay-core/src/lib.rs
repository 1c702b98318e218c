pub mod envelope;
pub mod error;
pub mod scheduler;

pub use envelope::{ApiError, ApiResponse};
pub use error::{EngineError, EngineResult};
pub use scheduler::{ExpiryHook, ExpiryScheduler, JobHandle, NoopScheduler, SchedulerError};
