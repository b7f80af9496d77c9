use std::sync::Arc;

use common::storage::ObjectStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::utils::notify::Notifier;
use crate::utils::rate_limit::FixedWindowLimiter;

/// Process-scoped service handles, constructed once in `main` and injected
/// everywhere via axum state.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub objects: Arc<dyn ObjectStore>,
    pub notifier: Arc<dyn Notifier>,
    /// Best-effort, per-process limiter for the public submission flow.
    pub public_rate_limiter: Arc<FixedWindowLimiter>,
    pub config: Arc<AppConfig>,
}
