use std::cmp;
use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use common::ApplicationStatus;
use common::form::{
    ApplicationFormPatch, ApplicationFormV2, FormPayload, merge_form, required_attachment_slots,
    validate_form,
};
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{
    application, application_attachment, application_form_data, application_status_history,
    scholarship, student_profile,
};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::handlers::attachment::verify_remote_object;
use crate::handlers::scholarship::{ensure_open_for_applications, find_scholarship};
use crate::models::application::*;
use crate::models::attachment::AttachmentResponse;
use crate::models::shared::Pagination;
use crate::state::AppState;
use crate::utils::notify::notify_status_change;
use crate::utils::options::{validate_course_path, validate_support_providers};

/// Find the student profile for an authenticated user, if one exists.
pub(crate) async fn find_student_profile<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<Option<student_profile::Model>, AppError> {
    Ok(student_profile::Entity::find()
        .filter(student_profile::Column::UserId.eq(Some(user_id)))
        .one(db)
        .await?)
}

/// Ownership-scoped application read.
///
/// A wrong id and a wrong owner are indistinguishable to the caller: both
/// surface as plain not-found, so students cannot probe for the existence of
/// other students' applications.
pub(crate) async fn find_owned_application<C: ConnectionTrait>(
    db: &C,
    application_id: i32,
    user_id: i32,
) -> Result<(application::Model, student_profile::Model), AppError> {
    let not_found = || AppError::NotFound("Application not found".into());

    let app = application::Entity::find_by_id(application_id)
        .filter(application::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(not_found)?;

    let profile = student_profile::Entity::find_by_id(app.student_id)
        .one(db)
        .await?
        .ok_or_else(not_found)?;

    if profile.user_id != Some(user_id) {
        return Err(not_found());
    }

    Ok((app, profile))
}

pub(crate) async fn load_form_row<C: ConnectionTrait>(
    db: &C,
    application_id: i32,
) -> Result<application_form_data::Model, AppError> {
    application_form_data::Entity::find_by_id(application_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Internal("Form data missing for application".into()))
}

pub(crate) async fn insert_history<C: ConnectionTrait>(
    db: &C,
    application_id: i32,
    from_status: Option<ApplicationStatus>,
    to_status: ApplicationStatus,
    reason: Option<String>,
    actor: &str,
) -> Result<(), AppError> {
    application_status_history::ActiveModel {
        application_id: Set(application_id),
        from_status: Set(from_status),
        to_status: Set(to_status),
        reason: Set(reason),
        actor: Set(actor.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Build the full application response with related data.
pub(crate) async fn build_application_response(
    db: &DatabaseConnection,
    app: application::Model,
) -> Result<ApplicationResponse, AppError> {
    let scholarship_model = scholarship::Entity::find_by_id(app.scholarship_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Internal("Application scholarship not found".into()))?;

    let form_row = load_form_row(db, app.id).await?;

    let attachments = application_attachment::Entity::find()
        .filter(application_attachment::Column::ApplicationId.eq(app.id))
        .order_by_asc(application_attachment::Column::CreatedAt)
        .all(db)
        .await?;

    let required_slots: Vec<String> = match FormPayload::from_value(form_row.payload.clone()) {
        Ok(FormPayload::V2(form)) => required_attachment_slots(&form)
            .into_iter()
            .map(|s| s.into_string())
            .collect(),
        _ => Vec::new(),
    };

    let history = application_status_history::Entity::find()
        .filter(application_status_history::Column::ApplicationId.eq(app.id))
        .order_by_asc(application_status_history::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(ApplicationResponse {
        id: app.id,
        status: app.status,
        scholarship_id: app.scholarship_id,
        scholarship_title: scholarship_model.title,
        form: form_row.payload,
        schema_version: form_row.schema_version,
        attachments: attachments.into_iter().map(AttachmentResponse::from).collect(),
        required_slots,
        submitted_at: app.submitted_at,
        locked_at: app.locked_at,
        reopened_at: app.reopened_at,
        created_at: app.created_at,
        history: history.into_iter().map(StatusHistoryEntry::from).collect(),
    })
}

/// Pre-check the one-live-application-per-pair invariant.
async fn ensure_no_duplicate<C: ConnectionTrait>(
    db: &C,
    student_id: i32,
    scholarship_id: i32,
) -> Result<(), AppError> {
    let existing = application::Entity::find()
        .filter(application::Column::StudentId.eq(student_id))
        .filter(application::Column::ScholarshipId.eq(scholarship_id))
        .filter(application::Column::DeletedAt.is_null())
        .count(db)
        .await?;
    if existing > 0 {
        return Err(AppError::DuplicateApplication);
    }
    Ok(())
}

/// Insert the application row, its seeded form document and the opening
/// history entry as one unit.
async fn insert_draft<C: ConnectionTrait>(
    db: &C,
    scholarship_id: i32,
    student_id: i32,
    form: &ApplicationFormV2,
    actor: &str,
) -> Result<application::Model, AppError> {
    let now = Utc::now();

    let app = application::ActiveModel {
        status: Set(ApplicationStatus::Draft),
        scholarship_id: Set(scholarship_id),
        student_id: Set(student_id),
        submitted_at: Set(None),
        locked_at: Set(None),
        reopened_at: Set(None),
        admin_notes: Set(None),
        deleted_at: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    application_form_data::ActiveModel {
        application_id: Set(app.id),
        payload: Set(form.to_value()),
        schema_version: Set(form.schema_version as i32),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    insert_history(db, app.id, None, ApplicationStatus::Draft, None, actor).await?;

    Ok(app)
}

/// Create a draft application.
#[utoipa::path(
    post,
    path = "/",
    tag = "Applications",
    operation_id = "createApplication",
    summary = "Create a draft application",
    description = "Creates a draft application for a published scholarship, seeded with a default form. Fails if the student already has a live application for it. Requires `application:create` permission and an existing student profile.",
    request_body = CreateApplicationRequest,
    responses(
        (status = 201, description = "Draft created", body = ApplicationResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Scholarship not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Duplicate application (DUPLICATE_APPLICATION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn create_application(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateApplicationRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("application:create")?;

    let profile = find_student_profile(&state.db, auth_user.user_id)
        .await?
        .ok_or_else(|| {
            AppError::Validation("Complete your student profile before applying".into())
        })?;

    let txn = state.db.begin().await?;

    let scholarship_model = find_scholarship(&txn, payload.scholarship_id).await?;
    ensure_open_for_applications(&scholarship_model)?;
    ensure_no_duplicate(&txn, profile.id, scholarship_model.id).await?;

    let form = ApplicationFormV2::new_default(
        &profile.full_name,
        &profile.email,
        &profile.mobile_number,
    );
    let app = insert_draft(&txn, scholarship_model.id, profile.id, &form, &auth_user.subject)
        .await?;

    txn.commit().await?;

    info!(application_id = app.id, scholarship_id = scholarship_model.id, "Draft created");

    let response = build_application_response(&state.db, app).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// List the caller's applications.
#[utoipa::path(
    get,
    path = "/",
    tag = "Applications",
    operation_id = "listMyApplications",
    summary = "List own applications",
    description = "Returns the caller's applications across scholarships, newest first.",
    params(ApplicationListQuery),
    responses(
        (status = 200, description = "List of applications", body = ApplicationListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_my_applications(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<ApplicationListResponse>, AppError> {
    let page = cmp::max(query.page.unwrap_or(1), 1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let Some(profile) = find_student_profile(&state.db, auth_user.user_id).await? else {
        return Ok(Json(ApplicationListResponse {
            data: vec![],
            pagination: Pagination { page, per_page, total: 0, total_pages: 0 },
        }));
    };

    let mut base_select = application::Entity::find()
        .filter(application::Column::StudentId.eq(profile.id))
        .filter(application::Column::DeletedAt.is_null());

    if let Some(status) = query.status {
        base_select = base_select.filter(application::Column::Status.eq(status));
    }

    let total = base_select.clone().count(&state.db).await?;

    let rows = base_select
        .find_also_related(scholarship::Entity)
        .order_by_desc(application::Column::CreatedAt)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let data = rows
        .into_iter()
        .map(|(app, sch)| {
            let title = sch.map(|s| s.title).unwrap_or_default();
            ApplicationListItem::from_model(app, title)
        })
        .collect();

    let total_pages = total.div_ceil(per_page);
    Ok(Json(ApplicationListResponse {
        data,
        pagination: Pagination { page, per_page, total, total_pages },
    }))
}

/// Get one of the caller's applications.
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Applications",
    operation_id = "getApplication",
    summary = "Get application details",
    description = "Returns full details of one of the caller's own applications, including the stored form payload, attachments and status history.",
    params(("id" = i32, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application details", body = ApplicationResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
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
    let (app, _) = find_owned_application(&state.db, id, auth_user.user_id).await?;
    let response = build_application_response(&state.db, app).await?;
    Ok(Json(response))
}

/// Apply a typed patch to a draft form.
#[utoipa::path(
    patch,
    path = "/{id}/form",
    tag = "Applications",
    operation_id = "updateApplicationForm",
    summary = "Edit a draft form",
    description = "Merges a partial form edit into the stored draft. Sibling buckets and the financial declaration are replaced wholesale when present; scalar fields are overwritten individually. Only drafts with a current-version payload are editable.",
    params(("id" = i32, Path, description = "Application ID")),
    request_body = ApplicationFormPatch,
    responses(
        (status = 200, description = "Updated application", body = ApplicationResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Application not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Locked or legacy draft (APPLICATION_LOCKED, LEGACY_DRAFT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, patch), fields(application_id = %id))]
pub async fn update_application_form(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(patch): AppJson<ApplicationFormPatch>,
) -> Result<Json<ApplicationResponse>, AppError> {
    auth_user.require_permission("application:create")?;

    let (app, _) = find_owned_application(&state.db, id, auth_user.user_id).await?;
    if app.status != ApplicationStatus::Draft {
        return Err(AppError::ApplicationLocked(app.status));
    }

    let form_row = load_form_row(&state.db, app.id).await?;
    let current = match FormPayload::from_value(form_row.payload.clone()) {
        Ok(FormPayload::V2(form)) => form,
        Ok(FormPayload::Legacy(_)) => return Err(AppError::LegacyDraft),
        Err(e) => return Err(AppError::Internal(format!("Stored form is unreadable: {e}"))),
    };

    let mut merged = merge_form(&current, patch);
    merged.family_info.siblings.assign_member_ids();

    let mut active: application_form_data::ActiveModel = form_row.into();
    active.payload = Set(merged.to_value());
    active.schema_version = Set(merged.schema_version as i32);
    active.updated_at = Set(Utc::now());
    active.update(&state.db).await?;

    let response = build_application_response(&state.db, app).await?;
    Ok(Json(response))
}

/// Discard a legacy-schema draft and recreate it.
#[utoipa::path(
    post,
    path = "/{id}/recreate",
    tag = "Applications",
    operation_id = "recreateDraft",
    summary = "Recreate a legacy draft",
    description = "Hard-deletes a draft whose stored form predates the current schema and creates a fresh draft for the same scholarship. The only path that ever hard-deletes an application.",
    params(("id" = i32, Path, description = "Application ID")),
    responses(
        (status = 201, description = "Fresh draft", body = ApplicationResponse),
        (status = 400, description = "Draft is not legacy (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Application not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Application is not a draft (APPLICATION_LOCKED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(application_id = %id))]
pub async fn recreate_draft(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("application:create")?;

    let (app, profile) = find_owned_application(&state.db, id, auth_user.user_id).await?;
    if app.status != ApplicationStatus::Draft {
        return Err(AppError::ApplicationLocked(app.status));
    }

    let form_row = load_form_row(&state.db, app.id).await?;
    if !FormPayload::from_value(form_row.payload.clone())
        .map(|p| p.is_legacy())
        .unwrap_or(true)
    {
        return Err(AppError::Validation(
            "Draft already uses the current form version".into(),
        ));
    }

    let txn = state.db.begin().await?;

    application_status_history::Entity::delete_many()
        .filter(application_status_history::Column::ApplicationId.eq(app.id))
        .exec(&txn)
        .await?;
    application_attachment::Entity::delete_many()
        .filter(application_attachment::Column::ApplicationId.eq(app.id))
        .exec(&txn)
        .await?;
    application_form_data::Entity::delete_by_id(app.id)
        .exec(&txn)
        .await?;
    application::Entity::delete_by_id(app.id).exec(&txn).await?;

    let form = ApplicationFormV2::new_default(
        &profile.full_name,
        &profile.email,
        &profile.mobile_number,
    );
    let fresh = insert_draft(&txn, app.scholarship_id, profile.id, &form, &auth_user.subject)
        .await?;

    txn.commit().await?;

    info!(old_id = app.id, new_id = fresh.id, "Legacy draft recreated");

    let response = build_application_response(&state.db, fresh).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Run every pre-mutation submit check against a validated form.
///
/// Shared by the authenticated and public submit paths; performs no writes.
pub(crate) async fn run_submission_checks(
    state: &AppState,
    form: &ApplicationFormV2,
) -> Result<(), AppError> {
    validate_form(form, Utc::now().date_naive())?;

    let personal = &form.personal_info;
    match (personal.campus_option_id, personal.faculty_option_id, personal.course_option_id) {
        (Some(campus), Some(faculty), Some(course)) => {
            validate_course_path(&state.db, campus, faculty, course).await?;
        }
        _ => {
            return Err(AppError::Validation(
                "Campus, faculty and course must all be selected".into(),
            ));
        }
    }

    validate_support_providers(
        &state.db,
        &form.financial_declaration.support_provider_option_ids,
    )
    .await?;

    Ok(())
}

/// Submit a draft application.
#[utoipa::path(
    post,
    path = "/{id}/submit",
    tag = "Applications",
    operation_id = "submitApplication",
    summary = "Submit a draft application",
    description = "Validates the form, the campus/faculty/course path, support providers and required attachments (including remote object verification), then atomically locks the application as submitted. Requires `application:submit` permission.",
    params(("id" = i32, Path, description = "Application ID")),
    request_body = SubmitApplicationRequest,
    responses(
        (status = 200, description = "Application submitted", body = ApplicationResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Application not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Locked or legacy draft (APPLICATION_LOCKED, LEGACY_DRAFT)", body = ErrorBody),
        (status = 422, description = "Reference or object verification failure (INVALID_PATH, INVALID_COURSE, INVALID_SUPPORT_PROVIDER, OBJECT_NOT_FOUND, SIZE_MISMATCH, MIME_TYPE_MISMATCH)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(application_id = %id))]
pub async fn submit_application(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<SubmitApplicationRequest>,
) -> Result<Json<ApplicationResponse>, AppError> {
    auth_user.require_permission("application:submit")?;

    let (app, profile) = find_owned_application(&state.db, id, auth_user.user_id).await?;
    if app.status != ApplicationStatus::Draft {
        return Err(AppError::ApplicationLocked(app.status));
    }

    let scholarship_model = find_scholarship(&state.db, app.scholarship_id).await?;
    ensure_open_for_applications(&scholarship_model)?;

    let form_row = load_form_row(&state.db, app.id).await?;
    let current = match FormPayload::from_value(form_row.payload.clone()) {
        Ok(FormPayload::V2(form)) => form,
        Ok(FormPayload::Legacy(_)) => return Err(AppError::LegacyDraft),
        Err(e) => return Err(AppError::Internal(format!("Stored form is unreadable: {e}"))),
    };

    // Flush any final edits before validating.
    let mut form = match payload.form {
        Some(patch) => merge_form(&current, patch),
        None => current,
    };
    form.family_info.siblings.assign_member_ids();

    run_submission_checks(&state, &form).await?;

    // Required-slot coverage against stored, verified uploads.
    let attachments = application_attachment::Entity::find()
        .filter(application_attachment::Column::ApplicationId.eq(app.id))
        .all(&state.db)
        .await?;
    let by_slot: HashMap<&str, &application_attachment::Model> = attachments
        .iter()
        .map(|a| (a.slot_key.as_str(), a))
        .collect();

    let required = required_attachment_slots(&form);
    let missing: Vec<&str> = required
        .iter()
        .map(|s| s.as_str())
        .filter(|slot| !by_slot.get(*slot).is_some_and(|a| a.verified))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Missing required documents: {}",
            missing.join(", ")
        )));
    }

    // Re-verify every required object against its declared metadata.
    for slot in &required {
        let att = by_slot[slot.as_str()];
        verify_remote_object(
            &*state.objects,
            slot.as_str(),
            &att.object_key,
            att.size,
            att.content_type.as_deref(),
            state.config.application.max_attachment_size,
        )
        .await?;
    }

    let now = Utc::now();
    let txn = state.db.begin().await?;

    // Re-read under a row lock: the unlocked status check above is racy, and
    // two concurrent submits must not both flip the row.
    let locked = application::Entity::find_by_id(app.id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".into()))?;
    if locked.status != ApplicationStatus::Draft {
        return Err(AppError::ApplicationLocked(locked.status));
    }

    let mut form_active: application_form_data::ActiveModel = form_row.into();
    form_active.payload = Set(form.to_value());
    form_active.schema_version = Set(form.schema_version as i32);
    form_active.updated_at = Set(now);
    form_active.update(&txn).await?;

    let mut profile_active: student_profile::ActiveModel = profile.clone().into();
    profile_active.full_name = Set(form.personal_info.full_name.clone());
    profile_active.mobile_number = Set(form.personal_info.mobile_number.clone());
    profile_active.updated_at = Set(now);
    profile_active.update(&txn).await?;

    let mut app_active: application::ActiveModel = locked.into();
    app_active.status = Set(ApplicationStatus::Submitted);
    app_active.submitted_at = Set(Some(now));
    app_active.locked_at = Set(Some(now));
    let updated = app_active.update(&txn).await?;

    insert_history(
        &txn,
        updated.id,
        Some(ApplicationStatus::Draft),
        ApplicationStatus::Submitted,
        None,
        &auth_user.subject,
    )
    .await?;

    txn.commit().await?;

    info!(application_id = updated.id, "Application submitted");

    notify_status_change(
        state.db.clone(),
        state.notifier.clone(),
        updated.id,
        profile.email.clone(),
        ApplicationStatus::Submitted,
    );

    let response = build_application_response(&state.db, updated).await?;
    Ok(Json(response))
}
