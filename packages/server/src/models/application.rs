use chrono::{DateTime, Utc};
use common::ApplicationStatus;
use common::form::ApplicationFormPatch;
use serde::{Deserialize, Serialize};

use crate::entity::{application, application_status_history};
use crate::models::attachment::{AttachmentResponse, DeclaredAttachment};
use crate::models::shared::Pagination;

/// Request body for creating a draft application.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateApplicationRequest {
    #[schema(example = 1)]
    pub scholarship_id: i32,
}

/// Request body for submitting a draft. The optional patch is merged into
/// the stored form before validation, so the client can flush its last edits
/// and submit in one call.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SubmitApplicationRequest {
    pub form: Option<ApplicationFormPatch>,
}

/// Request body for the public (no-login) submission flow.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct PublicSubmissionRequest {
    /// The complete form document; must carry `schemaVersion: 2`.
    #[schema(value_type = Object)]
    pub form: serde_json::Value,
    pub attachments: Vec<DeclaredAttachment>,
}

/// Response envelope for the public flow.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicSubmissionResponse {
    #[schema(example = 42)]
    pub application_id: i32,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct StatusHistoryEntry {
    pub from_status: Option<ApplicationStatus>,
    pub to_status: ApplicationStatus,
    pub reason: Option<String>,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

impl From<application_status_history::Model> for StatusHistoryEntry {
    fn from(m: application_status_history::Model) -> Self {
        Self {
            from_status: m.from_status,
            to_status: m.to_status,
            reason: m.reason,
            actor: m.actor,
            created_at: m.created_at,
        }
    }
}

/// Full application details.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ApplicationResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub status: ApplicationStatus,
    #[schema(example = 1)]
    pub scholarship_id: i32,
    #[schema(example = "Yayasan Merit Scholarship 2026")]
    pub scholarship_title: String,
    /// The stored form payload. Legacy payloads are returned verbatim for
    /// display; only `schemaVersion: 2` payloads are editable.
    #[schema(value_type = Object)]
    pub form: serde_json::Value,
    #[schema(example = 2)]
    pub schema_version: i32,
    pub attachments: Vec<AttachmentResponse>,
    /// Slot keys the current form content requires (empty for legacy forms).
    pub required_slots: Vec<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub reopened_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub history: Vec<StatusHistoryEntry>,
}

/// Application summary for list views (form payload omitted).
#[derive(Serialize, utoipa::ToSchema)]
pub struct ApplicationListItem {
    #[schema(example = 1)]
    pub id: i32,
    pub status: ApplicationStatus,
    #[schema(example = 1)]
    pub scholarship_id: i32,
    #[schema(example = "Yayasan Merit Scholarship 2026")]
    pub scholarship_title: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Paginated list of applications.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ApplicationListResponse {
    pub data: Vec<ApplicationListItem>,
    pub pagination: Pagination,
}

/// Query parameters for the student's own application listing.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ApplicationListQuery {
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 20)]
    pub per_page: Option<u64>,
    /// Filter by status.
    pub status: Option<ApplicationStatus>,
}

impl ApplicationListItem {
    pub fn from_model(m: application::Model, scholarship_title: String) -> Self {
        Self {
            id: m.id,
            status: m.status,
            scholarship_id: m.scholarship_id,
            scholarship_title,
            submitted_at: m.submitted_at,
            created_at: m.created_at,
        }
    }
}
