use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::*;
use tracing::info;

use crate::entity::{application, application_attachment, application_status_history};

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite indexes, so we create them
/// manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Duplicate pre-check:
    // SELECT .. FROM application WHERE student_id = ? AND scholarship_id = ? AND deleted_at IS NULL
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_application_student_scholarship")
        .table(application::Entity)
        .col(application::Column::StudentId)
        .col(application::Column::ScholarshipId)
        .to_string(PostgresQueryBuilder);
    run_index(db, "idx_application_student_scholarship", &stmt).await;

    // History listing per application, newest last.
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_status_history_application_created")
        .table(application_status_history::Entity)
        .col(application_status_history::Column::ApplicationId)
        .col(application_status_history::Column::CreatedAt)
        .to_string(PostgresQueryBuilder);
    run_index(db, "idx_status_history_application_created", &stmt).await;

    // Upsert target for slot re-uploads: one attachment per slot.
    let stmt = Index::create()
        .if_not_exists()
        .unique()
        .name("idx_attachment_application_slot")
        .table(application_attachment::Entity)
        .col(application_attachment::Column::ApplicationId)
        .col(application_attachment::Column::SlotKey)
        .to_string(PostgresQueryBuilder);
    run_index(db, "idx_attachment_application_slot", &stmt).await;

    Ok(())
}

async fn run_index(db: &DatabaseConnection, name: &str, stmt: &str) {
    match db.execute_unprepared(stmt).await {
        Ok(_) => {
            info!("Ensured index {name} exists");
        }
        Err(e) => {
            tracing::warn!("Failed to create index {name}: {e}");
        }
    }
}
