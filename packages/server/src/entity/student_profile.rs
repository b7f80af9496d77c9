use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One applicant.
///
/// Authenticated students carry their auth `user_id`; public (no-login)
/// applicants are keyed by email alone, so the one-application-per-pair
/// invariant holds across both flows.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "student_profile")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// NULL for public applicants.
    #[sea_orm(unique)]
    pub user_id: Option<i32>,

    #[sea_orm(unique)]
    pub email: String,

    /// Denormalized from the form at submit time.
    pub full_name: String,
    pub mobile_number: String,

    #[sea_orm(has_many)]
    pub applications: HasMany<super::application::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
