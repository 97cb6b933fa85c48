//! Outbound mail for Courier
//!
//! This crate provides:
//! - Pluggable mail transports (JSON-over-HTTP relay, capture mode)
//! - A persistent delivery queue driven by a recurring scheduler
//! - Per-job retry/failure state machine with lease expiry for stuck jobs
//! - Label and template storage

pub mod errors;
pub mod providers;
pub mod queue;
pub mod services;

// Re-export main types
pub use errors::EmailError;
pub use providers::{
    AttachmentRef, CaptureTransport, HttpTransport, HttpTransportConfig, MailTransport,
    SendEmailRequest, SendEmailResponse, TransportKind,
};
pub use queue::{
    CycleReport, DbJobStore, DispatchOutcome, Dispatcher, JobStats, JobStore, MemoryJobStore,
    Scheduler,
};
pub use services::{
    CreateLabelRequest, CreateTemplateRequest, LabelService, QueueService, RenderedTemplate,
    SubmitEmailRequest, TemplateService, UpdateLabelRequest, UpdateTemplateRequest,
};
