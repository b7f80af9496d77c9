use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::application_attachment;

#[derive(Serialize, utoipa::ToSchema)]
pub struct AttachmentResponse {
    pub id: Uuid,
    #[schema(example = "personal.studentIdProof")]
    pub slot_key: String,
    #[schema(example = "matric-card.pdf")]
    pub filename: String,
    #[schema(example = "application/pdf")]
    pub content_type: Option<String>,
    pub size: i64,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<application_attachment::Model> for AttachmentResponse {
    fn from(m: application_attachment::Model) -> Self {
        Self {
            id: m.id,
            slot_key: m.slot_key,
            filename: m.filename,
            content_type: m.content_type,
            size: m.size,
            verified: m.verified,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AttachmentListResponse {
    pub attachments: Vec<AttachmentResponse>,
    pub total: u64,
    /// Slot keys the current form content requires.
    pub required_slots: Vec<String>,
    /// Required slots with no verified upload yet.
    pub missing_slots: Vec<String>,
}

/// One client-declared attachment in the public (no-login) submission flow.
/// The object itself was uploaded out of band; the server verifies it
/// against this declaration before accepting the submission.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct DeclaredAttachment {
    #[schema(example = "personal.studentIdProof")]
    pub slot_key: String,
    #[schema(example = "uploads/3f2a/matric-card.pdf")]
    pub object_key: String,
    #[schema(example = "matric-card.pdf")]
    pub filename: String,
    #[schema(example = "application/pdf")]
    pub content_type: String,
    pub size: i64,
}
