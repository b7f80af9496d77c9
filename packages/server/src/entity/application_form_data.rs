use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The versioned form document for one application.
///
/// The payload is the source of truth; `schema_version` is denormalized from
/// its tag so legacy drafts can be found without parsing JSON.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "application_form_data")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub application_id: i32,

    #[sea_orm(belongs_to, from = "application_id", to = "id")]
    pub application: HasOne<super::application::Entity>,

    #[sea_orm(column_type = "JsonBinary")]
    pub payload: Json,

    pub schema_version: i32,

    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
