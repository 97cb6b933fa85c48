//! Background delivery queue
//!
//! Jobs are persisted by [`JobStore`], claimed and sent by [`Dispatcher`],
//! and polled on a fixed interval by [`Scheduler`].

mod db_store;
mod dispatcher;
mod memory_store;
pub mod payload;
mod scheduler;
mod store;


pub use db_store::DbJobStore;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use memory_store::MemoryJobStore;
pub use payload::JobPayload;
pub use scheduler::{CycleReport, Scheduler};
pub use store::{EligibleQuery, JobStats, JobStore, NewJob, StatusTransition};
