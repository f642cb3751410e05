//! Synchronization subsystem
//!
//! Dirty-id tracking, tombstone retention, trigger scheduling, and the
//! cycle engine that reconciles local and remote state.

mod engine;
mod retention;
mod schedule;
mod tracker;

pub use engine::{SyncEngine, SyncMode, SyncPhase, SyncReport};
pub use retention::RetentionPolicy;
pub use schedule::SyncScheduler;
pub use tracker::{ChangeTracker, DrainedChanges};
