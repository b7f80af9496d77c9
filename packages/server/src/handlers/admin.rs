use std::cmp;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use common::ApplicationStatus;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{application, scholarship, student_profile};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::handlers::application::{build_application_response, insert_history};
use crate::models::admin::*;
use crate::models::application::ApplicationResponse;
use crate::models::shared::{Pagination, escape_like};
use crate::state::AppState;
use crate::utils::notify::notify_status_change;

async fn find_application<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<application::Model, AppError> {
    application::Entity::find_by_id(id)
        .filter(application::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".into()))
}

async fn applicant_email<C: ConnectionTrait>(
    db: &C,
    student_id: i32,
) -> Result<String, AppError> {
    let profile = student_profile::Entity::find_by_id(student_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Internal("Application student not found".into()))?;
    Ok(profile.email)
}

/// Review queue listing.
#[utoipa::path(
    get,
    path = "/applications",
    tag = "Admin",
    operation_id = "listAllApplications",
    summary = "List applications for review",
    description = "Returns a paginated, filterable list of all applications with applicant identity. Requires `application:view_all` permission.",
    params(AdminApplicationListQuery),
    responses(
        (status = 200, description = "List of applications", body = AdminApplicationListResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_applications(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<AdminApplicationListQuery>,
) -> Result<Json<AdminApplicationListResponse>, AppError> {
    auth_user.require_permission("application:view_all")?;

    let page = cmp::max(query.page.unwrap_or(1), 1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let mut base_select = application::Entity::find()
        .filter(application::Column::DeletedAt.is_null());

    if let Some(status) = query.status {
        base_select = base_select.filter(application::Column::Status.eq(status));
    }
    if let Some(scholarship_id) = query.scholarship_id {
        base_select = base_select.filter(application::Column::ScholarshipId.eq(scholarship_id));
    }
    if let Some(ref q) = query.q
        && !q.trim().is_empty()
    {
        let pattern = escape_like(q.trim());
        let matching_students: Vec<i32> = student_profile::Entity::find()
            .filter(
                Condition::any()
                    .add(student_profile::Column::FullName.contains(&pattern))
                    .add(student_profile::Column::Email.contains(&pattern)),
            )
            .all(&state.db)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        base_select = base_select.filter(application::Column::StudentId.is_in(matching_students));
    }

    let total = base_select.clone().count(&state.db).await?;

    let sort_order = if query.sort_order.as_deref() == Some("asc") {
        Order::Asc
    } else {
        Order::Desc
    };

    let rows = base_select
        .find_also_related(scholarship::Entity)
        .order_by(application::Column::SubmittedAt, sort_order)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let student_ids: Vec<i32> = rows.iter().map(|(app, _)| app.student_id).collect();
    let profiles: std::collections::HashMap<i32, student_profile::Model> =
        student_profile::Entity::find()
            .filter(student_profile::Column::Id.is_in(student_ids))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

    let mut data = Vec::with_capacity(rows.len());
    for (app, sch) in rows {
        let profile = profiles
            .get(&app.student_id)
            .ok_or_else(|| AppError::Internal("Application student not found".into()))?;

        data.push(AdminApplicationListItem {
            id: app.id,
            status: app.status,
            scholarship_id: app.scholarship_id,
            scholarship_title: sch.map(|s| s.title).unwrap_or_default(),
            student_name: profile.full_name.clone(),
            student_email: profile.email.clone(),
            submitted_at: app.submitted_at,
            created_at: app.created_at,
        });
    }

    let total_pages = total.div_ceil(per_page);
    Ok(Json(AdminApplicationListResponse {
        data,
        pagination: Pagination { page, per_page, total, total_pages },
    }))
}

/// Full application details for reviewers.
#[utoipa::path(
    get,
    path = "/applications/{id}",
    tag = "Admin",
    operation_id = "getApplicationAsAdmin",
    summary = "Get application details for review",
    description = "Returns full application details regardless of owner. Requires `application:view_all` permission.",
    params(("id" = i32, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application details", body = ApplicationResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Application not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(application_id = %id))]
pub async fn get_application(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApplicationResponse>, AppError> {
    auth_user.require_permission("application:view_all")?;

    let app = find_application(&state.db, id).await?;
    let response = build_application_response(&state.db, app).await?;
    Ok(Json(response))
}

/// Move an application forward through the review workflow.
#[utoipa::path(
    post,
    path = "/applications/{id}/status",
    tag = "Admin",
    operation_id = "updateApplicationStatus",
    summary = "Transition application status",
    description = "Applies a forward status transition from the fixed table (submitted→under_review, under_review→shortlisted/rejected, shortlisted→awarded/rejected). Anything outside the table is rejected as a conflict before any row is touched. Requires `application:review` permission.",
    params(("id" = i32, Path, description = "Application ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApplicationStatusResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Application not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Transition not allowed (INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(application_id = %id))]
pub async fn update_status(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateStatusRequest>,
) -> Result<Json<ApplicationStatusResponse>, AppError> {
    auth_user.require_permission("application:review")?;

    let txn = state.db.begin().await?;

    let app = application::Entity::find_by_id(id)
        .filter(application::Column::DeletedAt.is_null())
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".into()))?;

    if !ApplicationStatus::is_transition_allowed(app.status, payload.to) {
        return Err(AppError::InvalidTransition {
            from: app.status,
            to: payload.to,
        });
    }

    let from = app.status;
    let student_id = app.student_id;

    let mut active: application::ActiveModel = app.into();
    active.status = Set(payload.to);
    let updated = active.update(&txn).await?;

    insert_history(
        &txn,
        updated.id,
        Some(from),
        payload.to,
        payload.reason.clone(),
        &auth_user.subject,
    )
    .await?;

    txn.commit().await?;

    info!(application_id = updated.id, %from, to = %payload.to, "Status transitioned");

    let recipient = applicant_email(&state.db, student_id).await?;
    notify_status_change(
        state.db.clone(),
        state.notifier.clone(),
        updated.id,
        recipient,
        payload.to,
    );

    Ok(Json(ApplicationStatusResponse {
        id: updated.id,
        status: updated.status,
    }))
}

/// Return an application to the student for edits.
#[utoipa::path(
    post,
    path = "/applications/{id}/reopen",
    tag = "Admin",
    operation_id = "reopenApplication",
    summary = "Reopen an application",
    description = "Returns a submitted, under-review or shortlisted application to draft, outside the forward transition table. Clears the submission lock and stamps the reopen time. Requires `application:reopen` permission.",
    params(("id" = i32, Path, description = "Application ID")),
    request_body = ReopenRequest,
    responses(
        (status = 200, description = "Application reopened", body = ApplicationStatusResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Application not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Status cannot be reopened (INVALID_REOPEN)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(application_id = %id))]
pub async fn reopen_application(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ReopenRequest>,
) -> Result<Json<ApplicationStatusResponse>, AppError> {
    auth_user.require_permission("application:reopen")?;

    let txn = state.db.begin().await?;

    let app = application::Entity::find_by_id(id)
        .filter(application::Column::DeletedAt.is_null())
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".into()))?;

    if !app.status.can_reopen() {
        return Err(AppError::InvalidReopen(app.status));
    }

    let from = app.status;
    let student_id = app.student_id;

    let mut active: application::ActiveModel = app.into();
    active.status = Set(ApplicationStatus::Draft);
    active.locked_at = Set(None);
    active.reopened_at = Set(Some(Utc::now()));
    let updated = active.update(&txn).await?;

    insert_history(
        &txn,
        updated.id,
        Some(from),
        ApplicationStatus::Draft,
        payload.reason.clone(),
        &auth_user.subject,
    )
    .await?;

    txn.commit().await?;

    info!(application_id = updated.id, %from, "Application reopened");

    let recipient = applicant_email(&state.db, student_id).await?;
    notify_status_change(
        state.db.clone(),
        state.notifier.clone(),
        updated.id,
        recipient,
        ApplicationStatus::Draft,
    );

    Ok(Json(ApplicationStatusResponse {
        id: updated.id,
        status: updated.status,
    }))
}

/// Replace the reviewer notes on an application.
#[utoipa::path(
    put,
    path = "/applications/{id}/notes",
    tag = "Admin",
    operation_id = "updateApplicationNotes",
    summary = "Update admin notes",
    description = "Replaces the free-form reviewer notes. Notes are internal and never shown to the applicant. Requires `application:review` permission.",
    params(("id" = i32, Path, description = "Application ID")),
    request_body = UpdateNotesRequest,
    responses(
        (status = 200, description = "Notes updated", body = ApplicationStatusResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Application not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(application_id = %id))]
pub async fn update_notes(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateNotesRequest>,
) -> Result<Json<ApplicationStatusResponse>, AppError> {
    auth_user.require_permission("application:review")?;

    if payload.notes.chars().count() > 10_000 {
        return Err(AppError::Validation(
            "Notes must be at most 10,000 characters".into(),
        ));
    }

    let app = find_application(&state.db, id).await?;
    let mut active: application::ActiveModel = app.into();
    active.admin_notes = Set(Some(payload.notes));
    let updated = active.update(&state.db).await?;

    Ok(Json(ApplicationStatusResponse {
        id: updated.id,
        status: updated.status,
    }))
}
