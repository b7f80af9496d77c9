use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::*;
use tracing::instrument;

use crate::entity::application_option_item::{self, OptionKind};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::option_item::*;
use crate::models::shared::validate_title;
use crate::state::AppState;
use crate::utils::options::build_option_tree;

async fn find_option_item<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<application_option_item::Model, AppError> {
    application_option_item::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Option item not found".into()))
}

/// The combined selection vocabulary for the application form.
#[utoipa::path(
    get,
    path = "/",
    tag = "Options",
    operation_id = "getOptionTree",
    summary = "Get campus/faculty/course tree and support providers",
    description = "Returns the nested campus→faculty→course tree plus the flat support-provider list, active items only. Public; no authentication required.",
    responses(
        (status = 200, description = "Option tree", body = OptionTreeResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn get_options(
    State(state): State<AppState>,
) -> Result<Json<OptionTreeResponse>, AppError> {
    let items = application_option_item::Entity::find()
        .all(&state.db)
        .await?;
    Ok(Json(build_option_tree(&items)))
}

/// Create a reference-data node.
#[utoipa::path(
    post,
    path = "/items",
    tag = "Options",
    operation_id = "createOptionItem",
    summary = "Create an option item",
    description = "Creates a campus, faculty, course or support provider. Faculties and courses must name a parent of the right kind. Requires `option:manage` permission.",
    request_body = CreateOptionItemRequest,
    responses(
        (status = 201, description = "Option item created", body = OptionItemResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Parent not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn create_option_item(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateOptionItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("option:manage")?;
    validate_create_option_item(&payload)?;

    if let Some(parent_id) = payload.parent_id {
        let parent = find_option_item(&state.db, parent_id).await?;
        let expected = payload.kind.required_parent();
        if expected != Some(parent.kind) {
            return Err(AppError::Validation(format!(
                "Parent of a {:?} must be a {:?}, got {:?}",
                payload.kind, expected, parent.kind
            )));
        }
    }

    let model = application_option_item::ActiveModel {
        kind: Set(payload.kind),
        name: Set(payload.name.trim().to_string()),
        parent_id: Set(payload.parent_id),
        active: Set(true),
        position: Set(payload.position.unwrap_or(0)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(OptionItemResponse::from(model))))
}

/// Update a reference-data node.
#[utoipa::path(
    patch,
    path = "/items/{id}",
    tag = "Options",
    operation_id = "updateOptionItem",
    summary = "Update an option item",
    description = "Renames, repositions or (de)activates a node. Deactivation removes the node (and its subtree) from the public tree without breaking old applications. Requires `option:manage` permission.",
    params(("id" = i32, Path, description = "Option item ID")),
    request_body = UpdateOptionItemRequest,
    responses(
        (status = 200, description = "Option item updated", body = OptionItemResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Option item not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(option_id = %id))]
pub async fn update_option_item(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateOptionItemRequest>,
) -> Result<Json<OptionItemResponse>, AppError> {
    auth_user.require_permission("option:manage")?;

    let model = find_option_item(&state.db, id).await?;
    let mut active: application_option_item::ActiveModel = model.into();

    if let Some(name) = payload.name {
        validate_title(&name)?;
        active.name = Set(name.trim().to_string());
    }
    if let Some(is_active) = payload.active {
        active.active = Set(is_active);
    }
    if let Some(position) = payload.position {
        active.position = Set(position);
    }

    let updated = active.update(&state.db).await?;
    Ok(Json(OptionItemResponse::from(updated)))
}

/// Delete a reference-data node.
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "Options",
    operation_id = "deleteOptionItem",
    summary = "Delete an option item",
    description = "Hard-deletes a node with no children. Use deactivation instead when the node may be referenced by stored forms. Requires `option:manage` permission.",
    params(("id" = i32, Path, description = "Option item ID")),
    responses(
        (status = 204, description = "Option item deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Option item not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Node still has children (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(option_id = %id))]
pub async fn delete_option_item(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("option:manage")?;

    let model = find_option_item(&state.db, id).await?;

    let children = application_option_item::Entity::find()
        .filter(application_option_item::Column::ParentId.eq(id))
        .count(&state.db)
        .await?;
    if children > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete: {children} child item(s) reference this node"
        )));
    }

    application_option_item::Entity::delete_by_id(model.id)
        .exec(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
