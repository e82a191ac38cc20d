//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Retention cleanup: applies the storage age and size bounds and purges
//!   expired result-cache entries at the configured interval

mod cleanup;

pub use cleanup::{run_cleanup_cycle, spawn_cleanup_task, CycleReport};
