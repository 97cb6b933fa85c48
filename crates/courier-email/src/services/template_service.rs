//! Template storage and `{{placeholder}}` rendering

use std::collections::HashMap;
use std::sync::Arc;

use courier_core::{Clock, OwnerId};
use courier_entities::templates;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::EmailError;
use crate::providers::SendEmailRequest;

#[derive(Debug, Clone)]
pub struct CreateTemplateRequest {
    pub owner_id: OwnerId,
    pub name: String,
    pub subject: String,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
}

/// Fields left as `None` are not changed; `Some(None)` clears a body
#[derive(Debug, Clone, Default)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub html_body: Option<Option<String>>,
    pub text_body: Option<Option<String>>,
}

/// A template with its placeholders substituted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedTemplate {
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
}

impl RenderedTemplate {
    /// Turn the rendered content into a send request
    pub fn into_request(self, from: impl Into<String>, to: Vec<String>) -> SendEmailRequest {
        SendEmailRequest {
            from: from.into(),
            from_name: None,
            to,
            cc: None,
            bcc: None,
            reply_to: None,
            subject: self.subject,
            html: self.html,
            text: self.text,
            headers: None,
        }
    }
}

pub struct TemplateService {
    db: Arc<DatabaseConnection>,
    clock: Arc<dyn Clock>,
}

impl TemplateService {
    pub fn new(db: Arc<DatabaseConnection>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn create(
        &self,
        request: CreateTemplateRequest,
    ) -> Result<templates::Model, EmailError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(EmailError::Validation("Template name is required".to_string()));
        }
        validate_content(
            &request.subject,
            request.html_body.as_deref(),
            request.text_body.as_deref(),
        )?;
        self.ensure_unique(request.owner_id, &name, None).await?;

        let now = self.clock.now();
        let template = templates::ActiveModel {
            owner_id: Set(request.owner_id),
            name: Set(name),
            subject: Set(request.subject),
            html_body: Set(request.html_body),
            text_body: Set(request.text_body),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let template = template.insert(self.db.as_ref()).await?;
        info!("Created template {} with id: {}", template.name, template.id);

        Ok(template)
    }

    pub async fn get(&self, id: i32) -> Result<templates::Model, EmailError> {
        templates::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(EmailError::TemplateNotFound(id))
    }

    pub async fn list(&self, owner_id: OwnerId) -> Result<Vec<templates::Model>, EmailError> {
        let templates = templates::Entity::find()
            .filter(templates::Column::OwnerId.eq(owner_id))
            .order_by_asc(templates::Column::Name)
            .all(self.db.as_ref())
            .await?;

        Ok(templates)
    }

    pub async fn update(
        &self,
        id: i32,
        request: UpdateTemplateRequest,
    ) -> Result<templates::Model, EmailError> {
        let template = self.get(id).await?;

        let subject = request.subject.unwrap_or_else(|| template.subject.clone());
        let html_body = request
            .html_body
            .unwrap_or_else(|| template.html_body.clone());
        let text_body = request
            .text_body
            .unwrap_or_else(|| template.text_body.clone());
        validate_content(&subject, html_body.as_deref(), text_body.as_deref())?;

        let owner_id = template.owner_id;
        let mut active = template.into_active_model();

        if let Some(name) = request.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(EmailError::Validation("Template name is required".to_string()));
            }
            self.ensure_unique(owner_id, &name, Some(id)).await?;
            active.name = Set(name);
        }
        active.subject = Set(subject);
        active.html_body = Set(html_body);
        active.text_body = Set(text_body);
        active.updated_at = Set(self.clock.now());

        let template = active.update(self.db.as_ref()).await?;
        debug!("Updated template {}", template.id);

        Ok(template)
    }

    pub async fn delete(&self, id: i32) -> Result<(), EmailError> {
        let result = templates::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(EmailError::TemplateNotFound(id));
        }

        info!("Deleted template: {}", id);
        Ok(())
    }

    /// Substitute `{{name}}` placeholders in the subject and both bodies
    pub async fn render(
        &self,
        id: i32,
        variables: &HashMap<String, String>,
    ) -> Result<RenderedTemplate, EmailError> {
        let template = self.get(id).await?;

        Ok(RenderedTemplate {
            subject: render_placeholders(&template.subject, variables),
            html: template
                .html_body
                .as_deref()
                .map(|body| render_placeholders(body, variables)),
            text: template
                .text_body
                .as_deref()
                .map(|body| render_placeholders(body, variables)),
        })
    }

    async fn ensure_unique(
        &self,
        owner_id: OwnerId,
        name: &str,
        except: Option<i32>,
    ) -> Result<(), EmailError> {
        let mut query = templates::Entity::find()
            .filter(templates::Column::OwnerId.eq(owner_id))
            .filter(templates::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(templates::Column::Id.ne(id));
        }

        if query.one(self.db.as_ref()).await?.is_some() {
            return Err(EmailError::Validation(format!(
                "Template '{}' already exists",
                name
            )));
        }
        Ok(())
    }
}

fn validate_content(
    subject: &str,
    html_body: Option<&str>,
    text_body: Option<&str>,
) -> Result<(), EmailError> {
    if subject.trim().is_empty() {
        return Err(EmailError::Validation(
            "Template subject is required".to_string(),
        ));
    }
    if html_body.is_none() && text_body.is_none() {
        return Err(EmailError::Validation(
            "Template needs an html or text body".to_string(),
        ));
    }
    Ok(())
}

/// Replace every `{{ key }}` found in `variables`; unknown keys stay as written
pub fn render_placeholders(input: &str, variables: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        let Some(end) = after_open.find("}}") else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = after_open[..end].trim();
        match variables.get(key) {
            Some(value) => output.push_str(value),
            None => output.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    output.push_str(rest);
    output
}
