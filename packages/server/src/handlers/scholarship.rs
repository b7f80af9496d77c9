use std::cmp;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{application, scholarship};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::scholarship::*;
use crate::models::shared::{Pagination, escape_like};
use crate::state::AppState;

/// Find a scholarship by ID or return 404.
pub(crate) async fn find_scholarship<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<scholarship::Model, AppError> {
    scholarship::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Scholarship not found".into()))
}

/// A scholarship accepts new applications only while published and before
/// its deadline.
pub(crate) fn ensure_open_for_applications(
    scholarship: &scholarship::Model,
) -> Result<(), AppError> {
    if !scholarship.published {
        return Err(AppError::NotFound("Scholarship not found".into()));
    }
    if Utc::now() > scholarship.deadline {
        return Err(AppError::Validation(
            "The application deadline for this scholarship has passed".into(),
        ));
    }
    Ok(())
}

/// List published scholarships.
#[utoipa::path(
    get,
    path = "/",
    tag = "Scholarships",
    operation_id = "listScholarships",
    summary = "List published scholarships",
    description = "Returns a paginated list of published scholarships, excluding those past their deadline unless `include_expired` is set. Public; no authentication required.",
    params(ScholarshipListQuery),
    responses(
        (status = 200, description = "List of scholarships", body = ScholarshipListResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_scholarships(
    State(state): State<AppState>,
    Query(query): Query<ScholarshipListQuery>,
) -> Result<Json<ScholarshipListResponse>, AppError> {
    let page = cmp::max(query.page.unwrap_or(1), 1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let mut base_select =
        scholarship::Entity::find().filter(scholarship::Column::Published.eq(true));

    if !query.include_expired.unwrap_or(false) {
        base_select = base_select.filter(scholarship::Column::Deadline.gte(Utc::now()));
    }
    if let Some(ref q) = query.q
        && !q.trim().is_empty()
    {
        base_select = base_select.filter(
            scholarship::Column::Title.contains(&escape_like(q.trim())),
        );
    }

    let total = base_select.clone().count(&state.db).await?;

    let scholarships = base_select
        .order_by_asc(scholarship::Column::Deadline)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let total_pages = total.div_ceil(per_page);
    Ok(Json(ScholarshipListResponse {
        data: scholarships.into_iter().map(ScholarshipResponse::from).collect(),
        pagination: Pagination {
            page,
            per_page,
            total,
            total_pages,
        },
    }))
}

/// Get a single published scholarship.
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Scholarships",
    operation_id = "getScholarship",
    summary = "Get scholarship details",
    description = "Returns full details of a published scholarship. Public; no authentication required.",
    params(("id" = i32, Path, description = "Scholarship ID")),
    responses(
        (status = 200, description = "Scholarship details", body = ScholarshipResponse),
        (status = 404, description = "Scholarship not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(scholarship_id = %id))]
pub async fn get_scholarship(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ScholarshipResponse>, AppError> {
    let model = find_scholarship(&state.db, id).await?;
    if !model.published {
        // Unpublished listings are invisible, not forbidden.
        return Err(AppError::NotFound("Scholarship not found".into()));
    }
    Ok(Json(ScholarshipResponse::from(model)))
}

/// Create a scholarship.
#[utoipa::path(
    post,
    path = "/",
    tag = "Scholarships",
    operation_id = "createScholarship",
    summary = "Create a scholarship",
    description = "Creates a new scholarship listing. Requires `scholarship:manage` permission.",
    request_body = CreateScholarshipRequest,
    responses(
        (status = 201, description = "Scholarship created", body = ScholarshipResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn create_scholarship(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateScholarshipRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("scholarship:manage")?;
    validate_create_scholarship(&payload)?;

    let now = Utc::now();
    let model = scholarship::ActiveModel {
        title: Set(payload.title.trim().to_string()),
        description: Set(payload.description),
        provider_name: Set(payload.provider_name.trim().to_string()),
        amount: Set(payload.amount),
        published: Set(payload.published),
        deadline: Set(payload.deadline),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(ScholarshipResponse::from(model))))
}

/// Update a scholarship.
#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Scholarships",
    operation_id = "updateScholarship",
    summary = "Update a scholarship",
    description = "Partially updates a scholarship listing. Requires `scholarship:manage` permission.",
    params(("id" = i32, Path, description = "Scholarship ID")),
    request_body = UpdateScholarshipRequest,
    responses(
        (status = 200, description = "Scholarship updated", body = ScholarshipResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Scholarship not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(scholarship_id = %id))]
pub async fn update_scholarship(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateScholarshipRequest>,
) -> Result<Json<ScholarshipResponse>, AppError> {
    auth_user.require_permission("scholarship:manage")?;
    validate_update_scholarship(&payload)?;

    let model = find_scholarship(&state.db, id).await?;
    let mut active: scholarship::ActiveModel = model.into();

    if let Some(title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(provider_name) = payload.provider_name {
        active.provider_name = Set(provider_name.trim().to_string());
    }
    if let Some(amount) = payload.amount {
        active.amount = Set(amount);
    }
    if let Some(published) = payload.published {
        active.published = Set(published);
    }
    if let Some(deadline) = payload.deadline {
        active.deadline = Set(deadline);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    Ok(Json(ScholarshipResponse::from(updated)))
}

/// Delete a scholarship.
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Scholarships",
    operation_id = "deleteScholarship",
    summary = "Delete a scholarship",
    description = "Deletes a scholarship with no live applications. Requires `scholarship:manage` permission.",
    params(("id" = i32, Path, description = "Scholarship ID")),
    responses(
        (status = 204, description = "Scholarship deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Scholarship not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Applications reference this scholarship (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(scholarship_id = %id))]
pub async fn delete_scholarship(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("scholarship:manage")?;

    let model = find_scholarship(&state.db, id).await?;

    let live_applications = application::Entity::find()
        .filter(application::Column::ScholarshipId.eq(id))
        .filter(application::Column::DeletedAt.is_null())
        .count(&state.db)
        .await?;
    if live_applications > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete: {live_applications} application(s) reference this scholarship"
        )));
    }

    scholarship::Entity::delete_by_id(model.id)
        .exec(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Admin listing including unpublished scholarships.
#[utoipa::path(
    get,
    path = "/scholarships",
    tag = "Admin",
    operation_id = "listAllScholarships",
    summary = "List all scholarships",
    description = "Returns every scholarship, published or not. Requires `scholarship:manage` permission.",
    params(ScholarshipListQuery),
    responses(
        (status = 200, description = "List of scholarships", body = ScholarshipListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_all_scholarships(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ScholarshipListQuery>,
) -> Result<Json<ScholarshipListResponse>, AppError> {
    auth_user.require_permission("scholarship:manage")?;

    let page = cmp::max(query.page.unwrap_or(1), 1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let mut base_select = scholarship::Entity::find();
    if let Some(ref q) = query.q
        && !q.trim().is_empty()
    {
        base_select = base_select.filter(
            scholarship::Column::Title.contains(&escape_like(q.trim())),
        );
    }

    let total = base_select.clone().count(&state.db).await?;
    let scholarships = base_select
        .order_by_desc(scholarship::Column::CreatedAt)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let total_pages = total.div_ceil(per_page);
    Ok(Json(ScholarshipListResponse {
        data: scholarships.into_iter().map(ScholarshipResponse::from).collect(),
        pagination: Pagination {
            page,
            per_page,
            total,
            total_pages,
        },
    }))
}
