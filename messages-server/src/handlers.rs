use axum::{extract::State, Json};
use messages_core::{process_template, ProcessedTemplate, Template, TemplateId, TemplateVersion};
use tracing::{debug, info};

use crate::error::{ServerError, ServerResult};
use crate::models::{ApiJson, ApiPath, ProcessTemplateRequest, TemplateContentRequest};
use crate::persistence;
use crate::state::AppState;

/// Handler for `POST /api/templates`
/// Creates a template together with its initial version.
#[axum::debug_handler]
pub async fn create_template(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<TemplateContentRequest>,
) -> ServerResult<Json<Template>> {
    info!(title = %payload.title, "Received request to create template");

    // Changes go live only once they are on disk.
    let mut store = state.store.write().await;
    let mut staged = store.clone();
    let template = staged.create_template(&payload.title, &payload.template, payload.initial_description());
    persistence::save_store(&staged, &state.data_path).await?;
    *store = staged;

    info!(template_id = template.id, "Template created");
    Ok(Json(template))
}

/// Handler for `POST /api/templates/{id}/versions`
#[axum::debug_handler]
pub async fn create_version(
    State(state): State<AppState>,
    ApiPath(template_id): ApiPath<TemplateId>,
    ApiJson(payload): ApiJson<TemplateContentRequest>,
) -> ServerResult<Json<TemplateVersion>> {
    debug!(template_id, "Received request to create template version");

    let mut store = state.store.write().await;
    let mut staged = store.clone();
    let version = staged.create_version(
        template_id,
        &payload.title,
        &payload.template,
        payload.version_description(),
    )?;
    persistence::save_store(&staged, &state.data_path).await?;
    *store = staged;

    info!(template_id, version_id = version.id, "Template version created");
    Ok(Json(version))
}

/// Handler for `GET /api/templates/{id}/versions`
/// Lists versions newest first.
#[axum::debug_handler]
pub async fn list_versions(
    State(state): State<AppState>,
    ApiPath(template_id): ApiPath<TemplateId>,
) -> ServerResult<Json<Vec<TemplateVersion>>> {
    let versions = state.store.read().await.versions(template_id)?;
    debug!(template_id, count = versions.len(), "Returning versions");
    Ok(Json(versions))
}

/// Handler for `GET /api/templates`
#[axum::debug_handler]
pub async fn list_templates(State(state): State<AppState>) -> ServerResult<Json<Vec<Template>>> {
    let templates = state.store.read().await.list_templates();
    debug!(count = templates.len(), "Returning template list");
    Ok(Json(templates))
}

/// Handler for `GET /api/templates/{id}`
#[axum::debug_handler]
pub async fn get_template(
    State(state): State<AppState>,
    ApiPath(template_id): ApiPath<TemplateId>,
) -> ServerResult<Json<Template>> {
    let store = state.store.read().await;
    let template = store
        .get_template(template_id)
        .map_err(|_| ServerError::TemplateNotFound(template_id))?;
    Ok(Json(template.clone()))
}

/// Handler for `POST /api/templates/process`
/// Renders a template without storing anything.
#[axum::debug_handler]
pub async fn process(
    ApiJson(payload): ApiJson<ProcessTemplateRequest>,
) -> ServerResult<Json<ProcessedTemplate>> {
    let processed = process_template(&payload.template, &payload.variables);
    debug!(errors = processed.errors.len(), "Template processed");
    Ok(Json(processed))
}
