//! Attachment storage for Courier
//!
//! Attachments live in an S3-compatible bucket, namespaced per owner. This
//! crate also recomputes an owner's storage usage after each delivery.

pub mod error;
pub mod services;

pub use error::BlobError;
pub use services::{
    BlobConfig, BlobInfo, BlobService, ListOptions, ListResult, PutOptions, StorageUsageHook,
    UsageCalculator, UsageTotals,
};
