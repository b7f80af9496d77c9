use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/scholarships", scholarship_routes())
        .nest("/options", option_routes())
        .nest("/applications", application_routes(config))
        .nest("/public", public_routes())
        .nest("/admin", admin_routes())
}

fn scholarship_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::scholarship::list_scholarships,
            handlers::scholarship::create_scholarship
        ))
        .routes(routes!(
            handlers::scholarship::get_scholarship,
            handlers::scholarship::update_scholarship,
            handlers::scholarship::delete_scholarship
        ))
}

fn option_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::option_item::get_options))
        .routes(routes!(handlers::option_item::create_option_item))
        .routes(routes!(
            handlers::option_item::update_option_item,
            handlers::option_item::delete_option_item
        ))
}

fn application_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let crud = OpenApiRouter::new()
        .routes(routes!(
            handlers::application::create_application,
            handlers::application::list_my_applications
        ))
        .routes(routes!(handlers::application::get_application))
        .routes(routes!(handlers::application::update_application_form))
        .routes(routes!(handlers::application::submit_application))
        .routes(routes!(handlers::application::recreate_draft))
        .routes(routes!(handlers::attachment::list_attachments));

    let uploads = OpenApiRouter::new()
        .routes(routes!(
            handlers::attachment::upload_attachment,
            handlers::attachment::download_attachment,
            handlers::attachment::delete_attachment
        ))
        .layer(handlers::attachment::attachment_upload_body_limit(
            config.application.max_attachment_size as usize,
        ));

    crud.merge(uploads)
}

fn public_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::public::submit_public_application))
}

fn admin_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::admin::list_applications))
        .routes(routes!(handlers::admin::get_application))
        .routes(routes!(handlers::admin::update_status))
        .routes(routes!(handlers::admin::reopen_application))
        .routes(routes!(handlers::admin::update_notes))
        .routes(routes!(handlers::scholarship::list_all_scholarships))
}
