mod args;
pub mod jobs;
pub mod worker;

pub use jobs::{RequeueCommand, StatsCommand, StatusCommand};
pub use worker::WorkerCommand;
