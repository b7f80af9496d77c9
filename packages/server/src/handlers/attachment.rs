use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use common::form::{FormPayload, SlotKey, required_attachment_slots};
use common::storage::{BoxReader, ObjectStore, StorageError};
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::instrument;
use uuid::Uuid;

use crate::entity::{application, application_attachment};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::handlers::application::{find_owned_application, load_form_row};
use crate::models::attachment::{AttachmentListResponse, AttachmentResponse};
use crate::state::AppState;
use common::ApplicationStatus;

/// Content types accepted for uploaded documents.
pub(crate) const ALLOWED_CONTENT_TYPES: &[&str] =
    &["application/pdf", "image/jpeg", "image/png"];

pub fn attachment_upload_body_limit(max_size: usize) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_size + 4096)
}

pub(crate) fn ensure_allowed_content_type(slot: &str, content_type: &str) -> Result<(), AppError> {
    if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
        return Err(AppError::InvalidMimeType(format!(
            "{slot}: content type '{content_type}' is not accepted (PDF, JPEG or PNG only)"
        )));
    }
    Ok(())
}

/// Check a stored object against its declared metadata.
///
/// The slot key travels in every error message so a multi-document failure
/// is diagnosable from the response alone.
pub(crate) async fn verify_remote_object(
    store: &dyn ObjectStore,
    slot: &str,
    object_key: &str,
    declared_size: i64,
    declared_type: Option<&str>,
    max_size: u64,
) -> Result<(), AppError> {
    let meta = store.head(object_key).await.map_err(|e| match e {
        StorageError::NotFound(_) => {
            AppError::ObjectNotFound(format!("{slot}: uploaded object is missing"))
        }
        other => AppError::Internal(format!("{slot}: {other}")),
    })?;

    if meta.size > max_size {
        return Err(AppError::FileTooLarge(format!(
            "{slot}: object is {} bytes, maximum is {max_size}",
            meta.size
        )));
    }

    if declared_size >= 0 && meta.size != declared_size as u64 {
        return Err(AppError::SizeMismatch(format!(
            "{slot}: object is {} bytes but {declared_size} were declared",
            meta.size
        )));
    }

    if let Some(declared) = declared_type {
        ensure_allowed_content_type(slot, declared)?;
        if let Some(actual) = meta.content_type.as_deref()
            && actual != declared
        {
            return Err(AppError::MimeTypeMismatch(format!(
                "{slot}: stored content type '{actual}' does not match declared '{declared}'"
            )));
        }
    }

    Ok(())
}

fn validate_upload_filename(filename: &str) -> Result<&str, AppError> {
    let filename = filename.trim();
    if filename.is_empty()
        || filename.len() > 255
        || filename.contains('/')
        || filename.contains('\\')
        || filename == "."
        || filename == ".."
    {
        return Err(AppError::Validation("Invalid upload filename".into()));
    }
    Ok(filename)
}

/// Resolve and gate the slot key for a draft's current form content.
async fn resolve_slot_for_draft(
    state: &AppState,
    app: &application::Model,
    raw_slot: &str,
) -> Result<SlotKey, AppError> {
    let slot = SlotKey::parse(raw_slot)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let form_row = load_form_row(&state.db, app.id).await?;
    let form = match FormPayload::from_value(form_row.payload) {
        Ok(FormPayload::V2(form)) => form,
        Ok(FormPayload::Legacy(_)) => return Err(AppError::LegacyDraft),
        Err(e) => return Err(AppError::Internal(format!("Stored form is unreadable: {e}"))),
    };

    // Slots are derived from form content, never chosen freely by the client.
    if !required_attachment_slots(&form).contains(&slot) {
        return Err(AppError::Validation(format!(
            "Slot '{slot}' is not required by the current form content"
        )));
    }

    Ok(slot)
}

/// Stream a multipart field into the object store via a temp file.
async fn stream_field_to_store(
    mut field: axum::extract::multipart::Field<'_>,
    store: &dyn ObjectStore,
    object_key: &str,
    content_type: &str,
    max_size: u64,
) -> Result<u64, AppError> {
    let temp_path = std::env::temp_dir().join(format!("biasiswa-upload-{}", Uuid::new_v4()));

    let result = async {
        let mut temp_file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {e}")))?;

        let mut total_size: u64 = 0;

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?
        {
            total_size += chunk.len() as u64;
            if total_size > max_size {
                return Err(AppError::FileTooLarge(format!(
                    "Upload exceeds maximum size of {max_size} bytes"
                )));
            }
            temp_file
                .write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Temp file write failed: {e}")))?;
        }

        temp_file
            .flush()
            .await
            .map_err(|e| AppError::Internal(format!("Temp file flush failed: {e}")))?;
        drop(temp_file);

        let file = tokio::fs::File::open(&temp_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to reopen temp file: {e}")))?;
        let reader: BoxReader = Box::new(file);
        let written = store
            .put_stream(object_key, reader, Some(content_type))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(written)
    }
    .await;

    // Best effort.
    let _ = tokio::fs::remove_file(&temp_path).await;

    result
}

/// Upload a document into a required slot.
#[utoipa::path(
    put,
    path = "/{id}/attachments/{slot_key}",
    tag = "Attachments",
    operation_id = "uploadAttachment",
    summary = "Upload a document into a slot",
    description = "Uploads the `file` multipart field into the named slot of a draft application. The slot must be in the set the current form content requires; re-uploading replaces the previous document.",
    params(
        ("id" = i32, Path, description = "Application ID"),
        ("slot_key" = String, Path, description = "Attachment slot key"),
    ),
    request_body(content_type = "multipart/form-data", description = "Document upload"),
    responses(
        (status = 201, description = "Attachment stored", body = AttachmentResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Application not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Locked or legacy draft (APPLICATION_LOCKED, LEGACY_DRAFT)", body = ErrorBody),
        (status = 422, description = "Content type rejected (INVALID_MIME_TYPE, FILE_TOO_LARGE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(application_id = %id, slot_key = %raw_slot))]
pub async fn upload_attachment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, raw_slot)): Path<(i32, String)>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("application:create")?;

    let (app, _) = find_owned_application(&state.db, id, auth_user.user_id).await?;
    if app.status != ApplicationStatus::Draft {
        return Err(AppError::ApplicationLocked(app.status));
    }

    let slot = resolve_slot_for_draft(&state, &app, &raw_slot).await?;

    let mut stored: Option<(String, String, String, u64)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue; // Ignore unknown fields.
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
        let filename = validate_upload_filename(&filename)?.to_string();

        let content_type = field
            .content_type()
            .map(str::to_string)
            .or_else(|| mime_guess::from_path(&filename).first().map(|m| m.to_string()))
            .ok_or_else(|| AppError::Validation("Content type could not be determined".into()))?;
        ensure_allowed_content_type(slot.as_str(), &content_type)?;

        let object_key = format!("applications/{}/{}/{}", app.id, slot, Uuid::new_v4());
        let written = stream_field_to_store(
            field,
            &*state.objects,
            &object_key,
            &content_type,
            state.config.application.max_attachment_size,
        )
        .await?;

        stored = Some((object_key, filename, content_type, written));
        break;
    }

    let (object_key, filename, content_type, size) =
        stored.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;

    // Replacing a slot orphans the old object; clean it up best-effort.
    let previous = application_attachment::Entity::find()
        .filter(application_attachment::Column::ApplicationId.eq(app.id))
        .filter(application_attachment::Column::SlotKey.eq(slot.as_str()))
        .one(&state.db)
        .await?;

    let attachment = application_attachment::ActiveModel {
        id: Set(Uuid::now_v7()),
        application_id: Set(app.id),
        slot_key: Set(slot.as_str().to_string()),
        object_key: Set(object_key),
        filename: Set(filename),
        content_type: Set(Some(content_type)),
        size: Set(size as i64),
        verified: Set(true),
        created_at: Set(Utc::now()),
    };

    application_attachment::Entity::insert(attachment)
        .on_conflict(
            OnConflict::columns([
                application_attachment::Column::ApplicationId,
                application_attachment::Column::SlotKey,
            ])
            .update_columns([
                application_attachment::Column::ObjectKey,
                application_attachment::Column::Filename,
                application_attachment::Column::ContentType,
                application_attachment::Column::Size,
                application_attachment::Column::Verified,
                application_attachment::Column::CreatedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(&state.db)
        .await?;

    if let Some(previous) = previous {
        let _ = state.objects.delete(&previous.object_key).await;
    }

    let saved = application_attachment::Entity::find()
        .filter(application_attachment::Column::ApplicationId.eq(app.id))
        .filter(application_attachment::Column::SlotKey.eq(slot.as_str()))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Internal("Attachment missing after upsert".into()))?;

    Ok((StatusCode::CREATED, Json(AttachmentResponse::from(saved))))
}

/// List an application's attachments with slot coverage.
#[utoipa::path(
    get,
    path = "/{id}/attachments",
    tag = "Attachments",
    operation_id = "listAttachments",
    summary = "List attachments and slot coverage",
    description = "Returns the stored attachments plus the slots the current form content requires and which of them are still missing.",
    params(("id" = i32, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Attachment list", body = AttachmentListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Application not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(application_id = %id))]
pub async fn list_attachments(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<AttachmentListResponse>, AppError> {
    let app = if auth_user.has_permission("application:view_all") {
        application::Entity::find_by_id(id)
            .filter(application::Column::DeletedAt.is_null())
            .one(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".into()))?
    } else {
        find_owned_application(&state.db, id, auth_user.user_id).await?.0
    };

    let attachments = application_attachment::Entity::find()
        .filter(application_attachment::Column::ApplicationId.eq(app.id))
        .order_by_asc(application_attachment::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let form_row = load_form_row(&state.db, app.id).await?;
    let required_slots: Vec<String> = match FormPayload::from_value(form_row.payload) {
        Ok(FormPayload::V2(form)) => required_attachment_slots(&form)
            .into_iter()
            .map(|s| s.into_string())
            .collect(),
        _ => Vec::new(),
    };
    let missing_slots: Vec<String> = required_slots
        .iter()
        .filter(|slot| {
            !attachments
                .iter()
                .any(|a| a.slot_key == **slot && a.verified)
        })
        .cloned()
        .collect();

    let total = attachments.len() as u64;
    Ok(Json(AttachmentListResponse {
        attachments: attachments.into_iter().map(AttachmentResponse::from).collect(),
        total,
        required_slots,
        missing_slots,
    }))
}

/// Download a stored document.
#[utoipa::path(
    get,
    path = "/{id}/attachments/{slot_key}",
    tag = "Attachments",
    operation_id = "downloadAttachment",
    summary = "Download a document",
    description = "Streams the document stored in the named slot. Owners can download their own documents; `application:view_all` grants reviewer access.",
    params(
        ("id" = i32, Path, description = "Application ID"),
        ("slot_key" = String, Path, description = "Attachment slot key"),
    ),
    responses(
        (status = 200, description = "Document content"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Attachment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(application_id = %id, slot_key = %raw_slot))]
pub async fn download_attachment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, raw_slot)): Path<(i32, String)>,
) -> Result<Response, AppError> {
    let app = if auth_user.has_permission("application:view_all") {
        application::Entity::find_by_id(id)
            .filter(application::Column::DeletedAt.is_null())
            .one(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".into()))?
    } else {
        find_owned_application(&state.db, id, auth_user.user_id).await?.0
    };

    let attachment = application_attachment::Entity::find()
        .filter(application_attachment::Column::ApplicationId.eq(app.id))
        .filter(application_attachment::Column::SlotKey.eq(raw_slot.as_str()))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Attachment not found".into()))?;

    let reader = state
        .objects
        .get_stream(&attachment.object_key)
        .await
        .map_err(|e| match e {
            StorageError::NotFound(_) => AppError::NotFound("Attachment not found".into()),
            other => AppError::Internal(other.to_string()),
        })?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let content_type = attachment
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, attachment.size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&attachment.filename),
        )
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))?;

    Ok(response)
}

/// Remove a document from a draft slot.
#[utoipa::path(
    delete,
    path = "/{id}/attachments/{slot_key}",
    tag = "Attachments",
    operation_id = "deleteAttachment",
    summary = "Delete a document",
    description = "Removes the document stored in the named slot of a draft application.",
    params(
        ("id" = i32, Path, description = "Application ID"),
        ("slot_key" = String, Path, description = "Attachment slot key"),
    ),
    responses(
        (status = 204, description = "Attachment deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Attachment not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Application is locked (APPLICATION_LOCKED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(application_id = %id, slot_key = %raw_slot))]
pub async fn delete_attachment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, raw_slot)): Path<(i32, String)>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("application:create")?;

    let (app, _) = find_owned_application(&state.db, id, auth_user.user_id).await?;
    if app.status != ApplicationStatus::Draft {
        return Err(AppError::ApplicationLocked(app.status));
    }

    let attachment = application_attachment::Entity::find()
        .filter(application_attachment::Column::ApplicationId.eq(app.id))
        .filter(application_attachment::Column::SlotKey.eq(raw_slot.as_str()))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Attachment not found".into()))?;

    application_attachment::Entity::delete_by_id(attachment.id)
        .exec(&state.db)
        .await?;

    let _ = state.objects.delete(&attachment.object_key).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Build a safe `Content-Disposition` header value.
fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("attachment; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_validation() {
        assert_eq!(validate_upload_filename("  payslip.pdf ").unwrap(), "payslip.pdf");
        assert!(validate_upload_filename("").is_err());
        assert!(validate_upload_filename("a/b.pdf").is_err());
        assert!(validate_upload_filename("..").is_err());
        assert!(validate_upload_filename(&"x".repeat(300)).is_err());
    }

    #[test]
    fn content_type_allowlist() {
        assert!(ensure_allowed_content_type("s", "application/pdf").is_ok());
        assert!(ensure_allowed_content_type("s", "image/jpeg").is_ok());
        assert!(matches!(
            ensure_allowed_content_type("s", "application/zip"),
            Err(AppError::InvalidMimeType(_))
        ));
    }

    #[test]
    fn disposition_header_is_ascii_safe() {
        let value = content_disposition_value("laporan ibu bapa.pdf");
        assert!(value.starts_with("attachment; filename=\"laporanibubapa.pdf\""));
        assert!(value.contains("filename*=UTF-8''laporan%20ibu%20bapa.pdf"));
    }

    mod verification {
        use super::*;
        use async_trait::async_trait;
        use common::storage::{ObjectMetadata, StorageError};

        struct FixedHeadStore(Result<ObjectMetadata, ()>);

        #[async_trait]
        impl ObjectStore for FixedHeadStore {
            async fn put_stream(
                &self,
                _key: &str,
                _reader: BoxReader,
                _content_type: Option<&str>,
            ) -> Result<u64, StorageError> {
                unimplemented!("not used in these tests")
            }

            async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError> {
                Err(StorageError::NotFound(key.to_string()))
            }

            async fn head(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
                self.0
                    .clone()
                    .map_err(|_| StorageError::NotFound(key.to_string()))
            }

            async fn delete(&self, _key: &str) -> Result<bool, StorageError> {
                Ok(false)
            }
        }

        fn meta(size: u64, content_type: &str) -> ObjectMetadata {
            ObjectMetadata {
                size,
                content_type: Some(content_type.to_string()),
            }
        }

        #[tokio::test]
        async fn accepts_matching_object() {
            let store = FixedHeadStore(Ok(meta(1024, "application/pdf")));
            let result = verify_remote_object(
                &store, "personal.studentIdProof", "k", 1024, Some("application/pdf"), 8192,
            )
            .await;
            assert!(result.is_ok());
        }

        #[tokio::test]
        async fn missing_object_names_the_slot() {
            let store = FixedHeadStore(Err(()));
            let err = verify_remote_object(
                &store, "personal.latestTranscript", "k", 10, Some("application/pdf"), 8192,
            )
            .await
            .unwrap_err();
            match err {
                AppError::ObjectNotFound(msg) => {
                    assert!(msg.contains("personal.latestTranscript"))
                }
                other => panic!("expected ObjectNotFound, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn size_mismatch_rejected() {
            let store = FixedHeadStore(Ok(meta(999, "application/pdf")));
            let err = verify_remote_object(&store, "s", "k", 1000, Some("application/pdf"), 8192)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::SizeMismatch(_)));
        }

        #[tokio::test]
        async fn mime_mismatch_rejected() {
            let store = FixedHeadStore(Ok(meta(10, "image/png")));
            let err = verify_remote_object(&store, "s", "k", 10, Some("application/pdf"), 8192)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::MimeTypeMismatch(_)));
        }

        #[tokio::test]
        async fn oversize_object_rejected() {
            let store = FixedHeadStore(Ok(meta(10_000, "application/pdf")));
            let err = verify_remote_object(&store, "s", "k", 10_000, Some("application/pdf"), 8192)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::FileTooLarge(_)));
        }

        #[tokio::test]
        async fn disallowed_declared_type_rejected() {
            let store = FixedHeadStore(Ok(meta(10, "application/zip")));
            let err = verify_remote_object(&store, "s", "k", 10, Some("application/zip"), 8192)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidMimeType(_)));
        }
    }
}
