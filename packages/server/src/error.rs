use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::ApplicationStatus;
use common::form::ValidationError;
use sea_orm::DbErr;
use serde::Serialize;

/// Machine-readable error payload nested under `error`.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`,
    /// `TOKEN_MISSING`, `TOKEN_INVALID`, `PERMISSION_DENIED`, `NOT_FOUND`,
    /// `CONFLICT`, `DUPLICATE_APPLICATION`, `APPLICATION_LOCKED`,
    /// `INVALID_TRANSITION`, `INVALID_REOPEN`, `LEGACY_DRAFT`,
    /// `INVALID_PATH`, `INVALID_COURSE`, `INVALID_SUPPORT_PROVIDER`,
    /// `OBJECT_NOT_FOUND`, `FILE_TOO_LARGE`, `INVALID_MIME_TYPE`,
    /// `MIME_TYPE_MISMATCH`, `SIZE_MISMATCH`, `RATE_LIMITED`,
    /// `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "personalInfo.fullName is required")]
    pub message: String,
}

/// Structured error envelope returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    PermissionDenied,
    NotFound(String),
    Conflict(String),
    /// The (student, scholarship) pair already has a live application.
    DuplicateApplication,
    /// The application is not editable in its current status.
    ApplicationLocked(ApplicationStatus),
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    InvalidReopen(ApplicationStatus),
    /// The stored form payload predates the current schema.
    LegacyDraft,
    /// Campus/faculty/course chain is broken.
    InvalidPath(String),
    /// The course node itself is missing, inactive or not a course.
    InvalidCourse(String),
    InvalidSupportProvider(String),
    /// Remote object verification failures; messages carry the slot key.
    ObjectNotFound(String),
    FileTooLarge(String),
    InvalidMimeType(String),
    MimeTypeMismatch(String),
    SizeMismatch(String),
    /// Rate limit exceeded. Contains seconds until retry is allowed.
    RateLimited {
        retry_after: u64,
    },
    Internal(String),
}

impl AppError {
    fn status_and_detail(self) -> (StatusCode, ErrorDetail) {
        use StatusCode as S;

        match self {
            AppError::Validation(msg) => (
                S::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TokenMissing => (
                S::UNAUTHORIZED,
                ErrorDetail {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                S::UNAUTHORIZED,
                ErrorDetail {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::PermissionDenied => (
                S::FORBIDDEN,
                ErrorDetail {
                    code: "PERMISSION_DENIED",
                    message: "Insufficient permissions".into(),
                },
            ),
            AppError::NotFound(msg) => (
                S::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Conflict(msg) => (
                S::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT",
                    message: msg,
                },
            ),
            AppError::DuplicateApplication => (
                S::CONFLICT,
                ErrorDetail {
                    code: "DUPLICATE_APPLICATION",
                    message: "An application for this scholarship already exists".into(),
                },
            ),
            AppError::ApplicationLocked(status) => (
                S::CONFLICT,
                ErrorDetail {
                    code: "APPLICATION_LOCKED",
                    message: format!("Application is {status} and can no longer be edited"),
                },
            ),
            AppError::InvalidTransition { from, to } => (
                S::CONFLICT,
                ErrorDetail {
                    code: "INVALID_TRANSITION",
                    message: format!("Cannot move an application from {from} to {to}"),
                },
            ),
            AppError::InvalidReopen(status) => (
                S::CONFLICT,
                ErrorDetail {
                    code: "INVALID_REOPEN",
                    message: format!("A {status} application cannot be reopened"),
                },
            ),
            AppError::LegacyDraft => (
                S::CONFLICT,
                ErrorDetail {
                    code: "LEGACY_DRAFT",
                    message: "This draft uses an outdated form version and must be recreated"
                        .into(),
                },
            ),
            AppError::InvalidPath(msg) => (
                S::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_PATH",
                    message: msg,
                },
            ),
            AppError::InvalidCourse(msg) => (
                S::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_COURSE",
                    message: msg,
                },
            ),
            AppError::InvalidSupportProvider(msg) => (
                S::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_SUPPORT_PROVIDER",
                    message: msg,
                },
            ),
            AppError::ObjectNotFound(msg) => (
                S::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "OBJECT_NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::FileTooLarge(msg) => (
                S::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "FILE_TOO_LARGE",
                    message: msg,
                },
            ),
            AppError::InvalidMimeType(msg) => (
                S::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_MIME_TYPE",
                    message: msg,
                },
            ),
            AppError::MimeTypeMismatch(msg) => (
                S::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "MIME_TYPE_MISMATCH",
                    message: msg,
                },
            ),
            AppError::SizeMismatch(msg) => (
                S::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "SIZE_MISMATCH",
                    message: msg,
                },
            ),
            AppError::RateLimited { retry_after } => (
                S::TOO_MANY_REQUESTS,
                ErrorDetail {
                    code: "RATE_LIMITED",
                    message: format!("Rate limit exceeded. Try again in {} seconds", retry_after),
                },
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    S::INTERNAL_SERVER_ERROR,
                    ErrorDetail {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_after = if let AppError::RateLimited { retry_after } = &self {
            Some(*retry_after)
        } else {
            None
        };

        let (status, detail) = self.status_and_detail();
        let body = ErrorBody { error: detail };

        if let Some(seconds) = retry_after {
            (status, [("Retry-After", seconds.to_string())], Json(body)).into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}
