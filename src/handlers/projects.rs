use super::common::{created_response, no_content_response, success_response, PriceWindowParams};
use super::request_scope;
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::{
        boq::BoqJobRequest,
        projects::{CreateProjectRequest, UpdateProjectRequest},
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let project = state
        .services
        .projects
        .create_project(&scope, payload)
        .await?;
    Ok(created_response(project))
}

async fn list_projects(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let projects = state.services.projects.list_projects(&scope).await?;
    Ok(success_response(projects))
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let project = state
        .services
        .projects
        .get_project_with_client(&scope, project_id)
        .await?;
    Ok(success_response(project))
}

async fn update_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let project = state
        .services
        .projects
        .update_project(&scope, project_id, payload)
        .await?;
    Ok(success_response(project))
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    state
        .services
        .projects
        .delete_project(&scope, project_id)
        .await?;
    Ok(no_content_response())
}

async fn list_boq_jobs(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let lines = state
        .services
        .boq
        .list_boq_jobs(&scope, project_id)
        .await?;
    Ok(success_response(lines))
}

async fn upsert_boq_job(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<BoqJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let line = state
        .services
        .boq
        .add_or_update_boq_job(&scope, project_id, payload)
        .await?;
    Ok(success_response(line))
}

async fn remove_boq_job(
    State(state): State<Arc<AppState>>,
    Path((project_id, job_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    state
        .services
        .boq
        .remove_boq_job(&scope, project_id, job_id)
        .await?;
    Ok(no_content_response())
}

async fn get_material_requirements(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let totals = state
        .services
        .boq
        .compute_material_requirements(&scope, project_id)
        .await?;
    Ok(success_response(totals))
}

async fn get_material_price_detail(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Query(params): Query<PriceWindowParams>,
) -> Result<impl IntoResponse, ApiError> {
    let window = params.window()?;
    let scope = request_scope(&state);
    let details = state
        .services
        .boq
        .build_material_price_detail(&scope, project_id, window)
        .await?;
    Ok(success_response(details))
}

async fn get_cost_summary(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Query(params): Query<PriceWindowParams>,
) -> Result<impl IntoResponse, ApiError> {
    let window = params.window()?;
    let scope = request_scope(&state);
    let summary = state
        .services
        .boq
        .project_cost_summary(&scope, project_id, window)
        .await?;
    Ok(success_response(summary))
}

/// Creates the router for projects, their BOQ lines and cost aggregates
pub fn project_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/:id/boq", get(list_boq_jobs).post(upsert_boq_job))
        .route("/:id/boq/:job_id", delete(remove_boq_job))
        .route("/:id/requirements", get(get_material_requirements))
        .route("/:id/materials", get(get_material_price_detail))
        .route("/:id/cost-summary", get(get_cost_summary))
}
