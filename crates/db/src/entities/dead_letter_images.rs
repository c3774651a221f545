//! `SeaORM` Entity for the dead-letter images table.
//!
//! Each row is a snapshot of an image whose deletion exhausted its retry
//! budget. The primary key is the original image ID, which makes the
//! escalation insert idempotent.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "dead_letter_images")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: Uuid,
    pub blob_id: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub retry_count: i32,
    pub created_at: DateTimeWithTimeZone,
    pub failed_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
