//! Application-facing services

mod label_service;
mod queue_service;
mod template_service;

pub use label_service::{CreateLabelRequest, LabelService, UpdateLabelRequest};
pub use queue_service::{QueueService, SubmitEmailRequest};
pub use template_service::{
    render_placeholders, CreateTemplateRequest, RenderedTemplate, TemplateService,
    UpdateTemplateRequest,
};
