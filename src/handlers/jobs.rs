use super::common::{created_response, no_content_response, success_response};
use super::request_scope;
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::{
        job_materials::{AddJobMaterialRequest, UpdateJobMaterialQuantityRequest},
        jobs::{CreateJobRequest, UpdateJobRequest},
    },
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityBody {
    pub quantity: Decimal,
}

async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let job = state.services.jobs.create_job(&scope, payload).await?;
    Ok(created_response(job))
}

async fn list_jobs(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let jobs = state.services.jobs.list_jobs(&scope).await?;
    Ok(success_response(jobs))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let job = state.services.jobs.get_job(&scope, job_id).await?;
    Ok(success_response(job))
}

async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<UpdateJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let job = state
        .services
        .jobs
        .update_job(&scope, job_id, payload)
        .await?;
    Ok(success_response(job))
}

async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    state.services.jobs.delete_job(&scope, job_id).await?;
    Ok(no_content_response())
}

async fn add_job_materials(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<AddJobMaterialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let rows = state
        .services
        .job_materials
        .add_job_materials(&scope, job_id, payload)
        .await?;
    Ok(created_response(rows))
}

async fn get_job_materials(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let lines = state
        .services
        .job_materials
        .get_materials_for_job(&scope, job_id)
        .await?;
    Ok(success_response(lines))
}

async fn update_job_material(
    State(state): State<Arc<AppState>>,
    Path((job_id, material_id)): Path<(Uuid, String)>,
    Json(body): Json<UpdateQuantityBody>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let row = state
        .services
        .job_materials
        .update_job_material_quantity(
            &scope,
            UpdateJobMaterialQuantityRequest {
                job_id,
                material_id,
                quantity: body.quantity,
            },
        )
        .await?;
    Ok(success_response(row))
}

async fn delete_job_material(
    State(state): State<Arc<AppState>>,
    Path((job_id, material_id)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    state
        .services
        .job_materials
        .delete_job_material(&scope, job_id, &material_id)
        .await?;
    Ok(no_content_response())
}

/// Creates the router for job definitions and their material ledger
pub fn job_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/:id", get(get_job).put(update_job).delete(delete_job))
        .route(
            "/:id/materials",
            get(get_job_materials).post(add_job_materials),
        )
        .route(
            "/:id/materials/:material_id",
            put(update_job_material).delete(delete_job_material),
        )
}
