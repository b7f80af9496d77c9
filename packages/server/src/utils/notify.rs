use async_trait::async_trait;
use chrono::Utc;
use common::ApplicationStatus;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use tracing::{info, warn};

use crate::entity::notification_log::{self, NotificationStatus};

/// Outbound applicant notification channel.
///
/// Actual delivery (email) is an external collaborator; this trait is the
/// seam. The default implementation only logs, which keeps development and
/// tests free of SMTP plumbing.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Logs the notification and reports success.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(recipient, subject, body_len = body.len(), "Notification dispatched");
        Ok(())
    }
}

/// Notify the applicant of a status change, without blocking the caller.
///
/// Runs as a detached task after the status transaction has committed.
/// Every attempt is recorded in `notification_log`; a delivery failure is
/// logged and recorded but never propagates to the request.
pub fn notify_status_change(
    db: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
    application_id: i32,
    recipient: String,
    status: ApplicationStatus,
) {
    tokio::spawn(async move {
        let subject = format!("Your scholarship application is now {status}");
        let body = format!(
            "The status of your application #{application_id} changed to '{status}'. \
             Log in to the portal for details."
        );

        let (log_status, error) = match notifier.send(&recipient, &subject, &body).await {
            Ok(()) => (NotificationStatus::Sent, None),
            Err(e) => {
                warn!(application_id, error = %e, "Applicant notification failed");
                (NotificationStatus::Failed, Some(e.to_string()))
            }
        };

        let entry = notification_log::ActiveModel {
            application_id: Set(application_id),
            recipient: Set(recipient),
            subject: Set(subject),
            status: Set(log_status),
            error: Set(error),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        if let Err(e) = notification_log::Entity::insert(entry).exec(&db).await {
            warn!(application_id, error = %e, "Failed to record notification audit row");
        }
    });
}
