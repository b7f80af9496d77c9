use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

/// Fixed role→permission table. Roles are a closed set issued by the
/// external identity provider; permissions are what handlers check.
const ROLE_PERMISSIONS: &[(&str, &[&str])] = &[
    (
        "admin",
        &[
            "application:review",
            "application:reopen",
            "application:view_all",
            "scholarship:manage",
            "option:manage",
        ],
    ),
    ("student", &["application:create", "application:submit"]),
];

fn permissions_for_role(role: &str) -> Vec<String> {
    ROLE_PERMISSIONS
        .iter()
        .find(|(r, _)| *r == role)
        .map(|(_, perms)| perms.iter().map(|p| p.to_string()).collect())
        .unwrap_or_default()
}

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// Add this as a handler parameter to require authentication.
/// Permission checks happen via `require_permission()` in the handler body.
pub struct AuthUser {
    pub user_id: i32,
    pub subject: String,
    pub role: String,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Returns `Ok(())` if the user has the given permission, `Err(PermissionDenied)` otherwise.
    pub fn require_permission(&self, permission: &str) -> Result<(), AppError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::TokenMissing)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::TokenInvalid)?;

        let claims = jwt::verify(&state.config.auth.jwt_secret, token)
            .map_err(|_| AppError::TokenInvalid)?;

        let permissions = permissions_for_role(&claims.role);

        Ok(AuthUser {
            user_id: claims.uid,
            subject: claims.sub,
            role: claims.role,
            permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_table_resolves_permissions() {
        let admin = permissions_for_role("admin");
        assert!(admin.contains(&"application:review".to_string()));
        assert!(admin.contains(&"application:view_all".to_string()));

        let student = permissions_for_role("student");
        assert!(student.contains(&"application:submit".to_string()));
        assert!(!student.contains(&"application:review".to_string()));

        assert!(permissions_for_role("unknown").is_empty());
    }

    #[test]
    fn permission_checks() {
        let user = AuthUser {
            user_id: 1,
            subject: "aina@example.com".into(),
            role: "student".into(),
            permissions: permissions_for_role("student"),
        };
        assert!(user.require_permission("application:create").is_ok());
        assert!(matches!(
            user.require_permission("scholarship:manage"),
            Err(AppError::PermissionDenied)
        ));
    }
}
