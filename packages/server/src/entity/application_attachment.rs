use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "application_attachment")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub application_id: i32,
    #[sea_orm(belongs_to, from = "application_id", to = "id")]
    pub application: HasOne<super::application::Entity>,

    /// Validated slot key; unique per application (enforced by a seeded
    /// index, re-uploads upsert).
    pub slot_key: String,

    /// Key of the stored object in the object store.
    pub object_key: String,

    /// Original upload filename.
    pub filename: String,

    /// Declared MIME content type.
    pub content_type: Option<String>,

    /// Purposefully denormalized to avoid a storage round trip for lists.
    pub size: i64,

    /// Whether the stored object passed size/MIME verification.
    pub verified: bool,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
