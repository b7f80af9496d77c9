use chrono::{DateTime, Utc};
use common::ApplicationStatus;
use serde::{Deserialize, Serialize};

use crate::models::shared::Pagination;

/// Query parameters for the admin review queue.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct AdminApplicationListQuery {
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 20)]
    pub per_page: Option<u64>,
    /// Filter by status.
    pub status: Option<ApplicationStatus>,
    /// Filter by scholarship.
    pub scholarship_id: Option<i32>,
    /// Case-insensitive search on applicant name or email.
    pub q: Option<String>,
    /// Sort direction on submission time: `asc` or `desc` (default).
    pub sort_order: Option<String>,
}

/// Request body for a forward status transition.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateStatusRequest {
    pub to: ApplicationStatus,
    pub reason: Option<String>,
}

/// Request body for reopening an application back to draft.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ReopenRequest {
    pub reason: Option<String>,
}

/// Request body for replacing the admin notes on an application.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateNotesRequest {
    pub notes: String,
}

/// Review-queue row: application plus applicant identity.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AdminApplicationListItem {
    #[schema(example = 1)]
    pub id: i32,
    pub status: ApplicationStatus,
    #[schema(example = 1)]
    pub scholarship_id: i32,
    #[schema(example = "Yayasan Merit Scholarship 2026")]
    pub scholarship_title: String,
    #[schema(example = "Aina Zulkifli")]
    pub student_name: String,
    #[schema(example = "aina@example.com")]
    pub student_email: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AdminApplicationListResponse {
    pub data: Vec<AdminApplicationListItem>,
    pub pagination: Pagination,
}

/// Response after a status mutation.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ApplicationStatusResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub status: ApplicationStatus,
}
