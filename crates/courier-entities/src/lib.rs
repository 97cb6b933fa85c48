pub mod types;
pub mod mail_jobs;
pub mod labels;
pub mod templates;
pub mod storage_usage;
