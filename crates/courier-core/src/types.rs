//! Custom types for common data structures

use chrono::{DateTime, Utc};

/// Database DateTime type used across all Courier crates
///
/// This is the canonical datetime type for:
/// - Database TIMESTAMPTZ columns
/// - Job scheduling (`scheduled_for`, lease timestamps)
///
/// # Example
/// ```rust
/// use courier_core::DBDateTime;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// pub struct Response {
///     pub inserted_at: DBDateTime,
/// }
/// ```
pub type DBDateTime = DateTime<Utc>;

/// Standard UTC DateTime type for values that never touch the database
pub type UtcDateTime = DateTime<Utc>;

/// Reference to the user that owns a job, label, template or blob
pub type OwnerId = i32;
