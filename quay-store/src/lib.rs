pub mod config;
pub mod memory;
pub mod scheduler;
pub mod sweeper;


pub use config::EngineConfig;
pub use memory::MemoryStore;
pub use scheduler::TokioExpiryScheduler;
pub use sweeper::spawn_hold_sweeper;
