use common::ApplicationStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only audit trail of status transitions. Never mutated or deleted
/// while the owning application lives.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "application_status_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub application_id: i32,
    #[sea_orm(belongs_to, from = "application_id", to = "id")]
    pub application: HasOne<super::application::Entity>,

    /// NULL for the row synthesized when the application is first created.
    pub from_status: Option<ApplicationStatus>,
    pub to_status: ApplicationStatus,

    pub reason: Option<String>,
    /// Who performed the transition: a user subject or `public`.
    pub actor: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
