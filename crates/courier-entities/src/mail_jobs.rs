//! Mail jobs entity - one row per queued outbound message

use courier_core::DBDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::JobStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mail_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: i32,
    /// Versioned JSON envelope holding the send request
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    /// JSON list of attachment references, passed through to the transport
    #[sea_orm(column_type = "Text", nullable)]
    pub attachments: Option<String>,
    pub status: JobStatus,
    pub attempts: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
    pub provider_message_id: Option<String>,
    pub scheduled_for: Option<DBDateTime>,
    pub claimed_at: Option<DBDateTime>,
    pub completed_at: Option<DBDateTime>,
    pub inserted_at: DBDateTime,
    pub updated_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
