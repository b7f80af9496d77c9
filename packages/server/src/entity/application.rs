use common::ApplicationStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "application")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// One of: draft, submitted, under_review, shortlisted, rejected, awarded.
    pub status: ApplicationStatus,

    pub scholarship_id: i32,
    #[sea_orm(belongs_to, from = "scholarship_id", to = "id")]
    pub scholarship: HasOne<super::scholarship::Entity>,

    pub student_id: i32,
    #[sea_orm(belongs_to, from = "student_id", to = "id")]
    pub student: HasOne<super::student_profile::Entity>,

    #[sea_orm(has_one)]
    pub form_data: HasOne<super::application_form_data::Entity>,

    #[sea_orm(has_many)]
    pub history: HasMany<super::application_status_history::Entity>,

    #[sea_orm(has_many)]
    pub attachments: HasMany<super::application_attachment::Entity>,

    pub submitted_at: Option<DateTimeUtc>,
    /// Set when submission locks the form; cleared again on reopen.
    pub locked_at: Option<DateTimeUtc>,
    pub reopened_at: Option<DateTimeUtc>,

    pub admin_notes: Option<String>,

    /// Soft-delete marker. The duplicate pre-check only counts rows where
    /// this is NULL.
    pub deleted_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
