//! Blob services

mod blob_service;
mod config;
mod usage;

pub use blob_service::*;
pub use config::*;
pub use usage::*;
