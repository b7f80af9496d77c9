use sea_orm::entity::prelude::*;
use sea_orm::prelude::StringLen;
use serde::{Deserialize, Serialize};

/// Node kind in the reference-data table.
///
/// Campuses, faculties and courses form a 3-level tree via `parent_id`;
/// support providers are a flat list with no parent.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    #[sea_orm(string_value = "campus")]
    Campus,
    #[sea_orm(string_value = "faculty")]
    Faculty,
    #[sea_orm(string_value = "course")]
    Course,
    #[sea_orm(string_value = "support_provider")]
    SupportProvider,
}

impl OptionKind {
    /// The kind a parent node must have, if a parent is required at all.
    pub fn required_parent(&self) -> Option<OptionKind> {
        match self {
            Self::Campus | Self::SupportProvider => None,
            Self::Faculty => Some(Self::Campus),
            Self::Course => Some(Self::Faculty),
        }
    }
}

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "application_option_item")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub kind: OptionKind,
    pub name: String,

    /// Flat parent reference; the tree is assembled in memory.
    pub parent_id: Option<i32>,

    /// Inactive items stay referenced by old applications but disappear from
    /// the public tree and fail path validation.
    pub active: bool,

    /// Sort order within siblings.
    pub position: i32,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
