//! Label storage

use std::sync::Arc;

use courier_core::{Clock, OwnerId};
use courier_entities::labels;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder,
};
use tracing::{debug, info};

use crate::errors::EmailError;

const MAX_NAME_LENGTH: usize = 64;

#[derive(Debug, Clone)]
pub struct CreateLabelRequest {
    pub owner_id: OwnerId,
    pub name: String,
    /// `#rrggbb`
    pub color: Option<String>,
}

/// Fields left as `None` are not changed; `color: Some(None)` clears the colour
#[derive(Debug, Clone, Default)]
pub struct UpdateLabelRequest {
    pub name: Option<String>,
    pub color: Option<Option<String>>,
}

pub struct LabelService {
    db: Arc<DatabaseConnection>,
    clock: Arc<dyn Clock>,
}

impl LabelService {
    pub fn new(db: Arc<DatabaseConnection>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn create(&self, request: CreateLabelRequest) -> Result<labels::Model, EmailError> {
        let name = validate_name(&request.name)?;
        if let Some(color) = &request.color {
            validate_color(color)?;
        }
        self.ensure_unique(request.owner_id, &name, None).await?;

        let now = self.clock.now();
        let label = labels::ActiveModel {
            owner_id: Set(request.owner_id),
            name: Set(name),
            color: Set(request.color.map(|c| c.to_lowercase())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let label = label.insert(self.db.as_ref()).await?;
        info!("Created label {} with id: {}", label.name, label.id);

        Ok(label)
    }

    pub async fn get(&self, id: i32) -> Result<labels::Model, EmailError> {
        labels::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(EmailError::LabelNotFound(id))
    }

    /// Owner's labels sorted by name
    pub async fn list(&self, owner_id: OwnerId) -> Result<Vec<labels::Model>, EmailError> {
        let labels = labels::Entity::find()
            .filter(labels::Column::OwnerId.eq(owner_id))
            .order_by_asc(labels::Column::Name)
            .all(self.db.as_ref())
            .await?;

        Ok(labels)
    }

    pub async fn update(
        &self,
        id: i32,
        request: UpdateLabelRequest,
    ) -> Result<labels::Model, EmailError> {
        let label = self.get(id).await?;
        let owner_id = label.owner_id;
        let mut active = label.into_active_model();

        if let Some(name) = request.name {
            let name = validate_name(&name)?;
            self.ensure_unique(owner_id, &name, Some(id)).await?;
            active.name = Set(name);
        }
        if let Some(color) = request.color {
            if let Some(color) = &color {
                validate_color(color)?;
            }
            active.color = Set(color.map(|c| c.to_lowercase()));
        }
        active.updated_at = Set(self.clock.now());

        let label = active.update(self.db.as_ref()).await?;
        debug!("Updated label {}", label.id);

        Ok(label)
    }

    pub async fn delete(&self, id: i32) -> Result<(), EmailError> {
        let result = labels::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(EmailError::LabelNotFound(id));
        }

        info!("Deleted label: {}", id);
        Ok(())
    }

    async fn ensure_unique(
        &self,
        owner_id: OwnerId,
        name: &str,
        except: Option<i32>,
    ) -> Result<(), EmailError> {
        let mut query = labels::Entity::find()
            .filter(labels::Column::OwnerId.eq(owner_id))
            .filter(labels::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(labels::Column::Id.ne(id));
        }

        if query.one(self.db.as_ref()).await?.is_some() {
            return Err(EmailError::Validation(format!(
                "Label '{}' already exists",
                name
            )));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, EmailError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EmailError::Validation("Label name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(EmailError::Validation(format!(
            "Label name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

fn validate_color(color: &str) -> Result<(), EmailError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());

    if !valid {
        return Err(EmailError::Validation(format!(
            "Invalid label color '{}', expected #rrggbb",
            color
        )));
    }
    Ok(())
}
