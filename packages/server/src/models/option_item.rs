use serde::{Deserialize, Serialize};

use crate::entity::application_option_item::{self, OptionKind};
use crate::error::AppError;
use crate::models::shared::validate_title;

/// Request body for creating a reference-data node.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateOptionItemRequest {
    pub kind: OptionKind,
    #[schema(example = "Cyberjaya")]
    pub name: String,
    /// Required for faculties (a campus id) and courses (a faculty id);
    /// forbidden for campuses and support providers.
    pub parent_id: Option<i32>,
    pub position: Option<i32>,
}

/// Request body for updating a node. Absent fields are unchanged; the kind
/// of a node can never change.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateOptionItemRequest {
    pub name: Option<String>,
    pub active: Option<bool>,
    pub position: Option<i32>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct OptionItemResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub kind: OptionKind,
    pub name: String,
    pub parent_id: Option<i32>,
    pub active: bool,
    pub position: i32,
}

impl From<application_option_item::Model> for OptionItemResponse {
    fn from(m: application_option_item::Model) -> Self {
        Self {
            id: m.id,
            kind: m.kind,
            name: m.name,
            parent_id: m.parent_id,
            active: m.active,
            position: m.position,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CourseNode {
    pub id: i32,
    pub name: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FacultyNode {
    pub id: i32,
    pub name: String,
    pub courses: Vec<CourseNode>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CampusNode {
    pub id: i32,
    pub name: String,
    pub faculties: Vec<FacultyNode>,
}

/// The full selection vocabulary for the form client: the campus tree plus
/// the flat support-provider list.
#[derive(Serialize, utoipa::ToSchema)]
pub struct OptionTreeResponse {
    pub campuses: Vec<CampusNode>,
    pub support_providers: Vec<OptionItemResponse>,
}

pub fn validate_create_option_item(req: &CreateOptionItemRequest) -> Result<(), AppError> {
    validate_title(&req.name)?;
    match (req.kind.required_parent(), req.parent_id) {
        (Some(_), None) => Err(AppError::Validation(format!(
            "A {:?} requires a parent_id",
            req.kind
        ))),
        (None, Some(_)) => Err(AppError::Validation(format!(
            "A {:?} must not have a parent_id",
            req.kind
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_pairing() {
        let ok = CreateOptionItemRequest {
            kind: OptionKind::Faculty,
            name: "Faculty of Computing".into(),
            parent_id: Some(1),
            position: None,
        };
        assert!(validate_create_option_item(&ok).is_ok());

        let orphan_faculty = CreateOptionItemRequest {
            parent_id: None,
            ..ok
        };
        assert!(validate_create_option_item(&orphan_faculty).is_err());

        let parented_campus = CreateOptionItemRequest {
            kind: OptionKind::Campus,
            name: "Melaka".into(),
            parent_id: Some(9),
            position: None,
        };
        assert!(validate_create_option_item(&parented_campus).is_err());
    }
}
