use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::scholarship;
use crate::error::AppError;
use crate::models::shared::{Pagination, validate_title};

/// Request body for creating a scholarship.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateScholarshipRequest {
    #[schema(example = "Yayasan Merit Scholarship 2026")]
    pub title: String,
    /// Listing body, in Markdown.
    pub description: String,
    #[schema(example = "Yayasan Pelajaran")]
    pub provider_name: String,
    /// Award amount in whole currency units.
    #[schema(example = 12000)]
    pub amount: i64,
    /// Unpublished scholarships are only visible to admins.
    pub published: bool,
    pub deadline: DateTime<Utc>,
}

/// Request body for updating a scholarship. Absent fields are unchanged.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateScholarshipRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub provider_name: Option<String>,
    pub amount: Option<i64>,
    pub published: Option<bool>,
    pub deadline: Option<DateTime<Utc>>,
}

/// Query parameters for the public scholarship listing.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ScholarshipListQuery {
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 20)]
    pub per_page: Option<u64>,
    /// Case-insensitive title search.
    pub q: Option<String>,
    /// Include scholarships whose deadline has passed. Default false.
    pub include_expired: Option<bool>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ScholarshipResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub title: String,
    pub description: String,
    pub provider_name: String,
    pub amount: i64,
    pub published: bool,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<scholarship::Model> for ScholarshipResponse {
    fn from(m: scholarship::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            description: m.description,
            provider_name: m.provider_name,
            amount: m.amount,
            published: m.published,
            deadline: m.deadline,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Paginated list of scholarships.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ScholarshipListResponse {
    pub data: Vec<ScholarshipResponse>,
    pub pagination: Pagination,
}

pub fn validate_create_scholarship(req: &CreateScholarshipRequest) -> Result<(), AppError> {
    validate_title(&req.title)?;
    validate_title(&req.provider_name)?;
    if req.amount < 0 {
        return Err(AppError::Validation("Amount must be >= 0".into()));
    }
    Ok(())
}

pub fn validate_update_scholarship(req: &UpdateScholarshipRequest) -> Result<(), AppError> {
    if let Some(ref title) = req.title {
        validate_title(title)?;
    }
    if let Some(ref provider) = req.provider_name {
        validate_title(provider)?;
    }
    if let Some(amount) = req.amount
        && amount < 0
    {
        return Err(AppError::Validation("Amount must be >= 0".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateScholarshipRequest {
        CreateScholarshipRequest {
            title: "Yayasan Merit Scholarship".into(),
            description: "Full tuition".into(),
            provider_name: "Yayasan Pelajaran".into(),
            amount: 12000,
            published: true,
            deadline: Utc::now(),
        }
    }

    #[test]
    fn create_validation() {
        assert!(validate_create_scholarship(&valid_request()).is_ok());

        let mut req = valid_request();
        req.title = "".into();
        assert!(validate_create_scholarship(&req).is_err());

        let mut req = valid_request();
        req.amount = -1;
        assert!(validate_create_scholarship(&req).is_err());
    }
}
