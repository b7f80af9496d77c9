use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use common::ApplicationStatus;
use common::form::{ApplicationFormV2, SlotKey, is_application_form_v2, required_attachment_slots};
use sea_orm::*;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entity::{
    application, application_attachment, application_form_data, student_profile,
};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::handlers::application::{insert_history, run_submission_checks};
use crate::handlers::attachment::verify_remote_object;
use crate::handlers::scholarship::{ensure_open_for_applications, find_scholarship};
use crate::models::application::{PublicSubmissionRequest, PublicSubmissionResponse};
use crate::models::attachment::DeclaredAttachment;
use crate::state::AppState;
use crate::utils::notify::notify_status_change;

/// Actor recorded in history rows for the no-login flow.
const PUBLIC_ACTOR: &str = "public";

/// Parse every declared slot key and index the declarations by slot.
fn index_declared_attachments(
    attachments: &[DeclaredAttachment],
) -> Result<HashMap<SlotKey, &DeclaredAttachment>, AppError> {
    let mut by_slot = HashMap::with_capacity(attachments.len());
    for declared in attachments {
        let slot = SlotKey::parse(&declared.slot_key)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        if by_slot.insert(slot, declared).is_some() {
            return Err(AppError::Validation(format!(
                "Duplicate attachment declaration for slot '{}'",
                declared.slot_key
            )));
        }
    }
    Ok(by_slot)
}

/// Find or create the profile row for a public applicant, keyed by email.
async fn upsert_public_profile<C: ConnectionTrait>(
    db: &C,
    form: &ApplicationFormV2,
) -> Result<student_profile::Model, AppError> {
    let email = form.personal_info.email.trim().to_lowercase();
    let now = Utc::now();

    if let Some(existing) = student_profile::Entity::find()
        .filter(student_profile::Column::Email.eq(&email))
        .one(db)
        .await?
    {
        let mut active: student_profile::ActiveModel = existing.into();
        active.full_name = Set(form.personal_info.full_name.clone());
        active.mobile_number = Set(form.personal_info.mobile_number.clone());
        active.updated_at = Set(now);
        return Ok(active.update(db).await?);
    }

    Ok(student_profile::ActiveModel {
        user_id: Set(None),
        email: Set(email),
        full_name: Set(form.personal_info.full_name.clone()),
        mobile_number: Set(form.personal_info.mobile_number.clone()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Public (no-login) submission: the application is synthesized directly in
/// `submitted`, never passing through an editable draft.
#[utoipa::path(
    post,
    path = "/scholarships/{id}/applications",
    tag = "Public",
    operation_id = "submitPublicApplication",
    summary = "Submit an application without an account",
    description = "Accepts a complete form document plus declarations for out-of-band uploaded objects, runs the full submit validation pipeline (form rules, course path, support providers, required slots, remote object verification) and persists the application directly as submitted. Rate-limited per applicant email.",
    params(("id" = i32, Path, description = "Scholarship ID")),
    request_body = PublicSubmissionRequest,
    responses(
        (status = 201, description = "Application accepted", body = PublicSubmissionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Scholarship not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Duplicate application (DUPLICATE_APPLICATION)", body = ErrorBody),
        (status = 422, description = "Reference or object verification failure (INVALID_PATH, INVALID_COURSE, INVALID_SUPPORT_PROVIDER, OBJECT_NOT_FOUND, SIZE_MISMATCH, MIME_TYPE_MISMATCH)", body = ErrorBody),
        (status = 429, description = "Rate limit exceeded (RATE_LIMITED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(scholarship_id = %scholarship_id))]
pub async fn submit_public_application(
    State(state): State<AppState>,
    Path(scholarship_id): Path<i32>,
    AppJson(payload): AppJson<PublicSubmissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !is_application_form_v2(&payload.form) {
        return Err(AppError::Validation(
            "Form document must carry schemaVersion 2".into(),
        ));
    }
    let mut form: ApplicationFormV2 = serde_json::from_value(payload.form)
        .map_err(|e| AppError::Validation(format!("Malformed form document: {e}")))?;
    form.family_info.siblings.assign_member_ids();

    state
        .public_rate_limiter
        .check(&form.personal_info.email.trim().to_lowercase())
        .map_err(|retry_after| AppError::RateLimited { retry_after })?;

    let scholarship_model = find_scholarship(&state.db, scholarship_id).await?;
    ensure_open_for_applications(&scholarship_model)?;

    run_submission_checks(&state, &form).await?;

    // Declared attachments must cover the required set exactly.
    let by_slot = index_declared_attachments(&payload.attachments)?;
    let required = required_attachment_slots(&form);

    let missing: Vec<&str> = required
        .iter()
        .filter(|slot| !by_slot.contains_key(*slot))
        .map(|slot| slot.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Missing required documents: {}",
            missing.join(", ")
        )));
    }

    let surplus: Vec<&str> = by_slot
        .keys()
        .filter(|slot| !required.contains(*slot))
        .map(|slot| slot.as_str())
        .collect();
    if !surplus.is_empty() {
        return Err(AppError::Validation(format!(
            "Declared documents for slots the form does not require: {}",
            surplus.join(", ")
        )));
    }

    for (slot, declared) in &by_slot {
        verify_remote_object(
            &*state.objects,
            slot.as_str(),
            &declared.object_key,
            declared.size,
            Some(declared.content_type.as_str()),
            state.config.application.max_attachment_size,
        )
        .await?;
    }

    let now = Utc::now();
    let txn = state.db.begin().await?;

    let profile = upsert_public_profile(&txn, &form).await?;

    let existing = application::Entity::find()
        .filter(application::Column::StudentId.eq(profile.id))
        .filter(application::Column::ScholarshipId.eq(scholarship_model.id))
        .filter(application::Column::DeletedAt.is_null())
        .count(&txn)
        .await?;
    if existing > 0 {
        return Err(AppError::DuplicateApplication);
    }

    let app = application::ActiveModel {
        status: Set(ApplicationStatus::Submitted),
        scholarship_id: Set(scholarship_model.id),
        student_id: Set(profile.id),
        submitted_at: Set(Some(now)),
        locked_at: Set(Some(now)),
        reopened_at: Set(None),
        admin_notes: Set(None),
        deleted_at: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    application_form_data::ActiveModel {
        application_id: Set(app.id),
        payload: Set(form.to_value()),
        schema_version: Set(form.schema_version as i32),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    for (slot, declared) in &by_slot {
        application_attachment::ActiveModel {
            id: Set(Uuid::now_v7()),
            application_id: Set(app.id),
            slot_key: Set(slot.as_str().to_string()),
            object_key: Set(declared.object_key.clone()),
            filename: Set(declared.filename.clone()),
            content_type: Set(Some(declared.content_type.clone())),
            size: Set(declared.size),
            verified: Set(true),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;
    }

    insert_history(
        &txn,
        app.id,
        None,
        ApplicationStatus::Submitted,
        None,
        PUBLIC_ACTOR,
    )
    .await?;

    txn.commit().await?;

    info!(application_id = app.id, scholarship_id, "Public application accepted");

    notify_status_change(
        state.db.clone(),
        state.notifier.clone(),
        app.id,
        profile.email,
        ApplicationStatus::Submitted,
    );

    Ok((
        StatusCode::CREATED,
        Json(PublicSubmissionResponse { application_id: app.id }),
    ))
}
