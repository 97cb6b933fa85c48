//! Core utilities and types shared across all Courier crates

pub mod clock;
pub mod config;
pub mod error;
pub mod hooks;
pub mod types;

// Re-export commonly used types
pub use clock::*;
pub use config::*;
pub use error::*;
pub use hooks::*;
pub use types::*;

// Re-export external dependencies
pub use anyhow;
pub use async_trait;
pub use chrono;
pub use thiserror;
pub use tracing;
pub use uuid;
