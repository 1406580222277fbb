use super::common::{created_response, no_content_response, success_response, PriceWindowParams};
use super::request_scope;
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::{
        materials::{CreateMaterialRequest, UpdateMaterialRequest},
        supplier_prices::RecordSupplierPriceRequest,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;

async fn create_material(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateMaterialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let material = state
        .services
        .materials
        .create_material(&scope, payload)
        .await?;
    Ok(created_response(material))
}

async fn list_materials(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let materials = state.services.materials.list_materials(&scope).await?;
    Ok(success_response(materials))
}

async fn get_material(
    State(state): State<Arc<AppState>>,
    Path(material_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let material = state
        .services
        .materials
        .get_material(&scope, &material_id)
        .await?;
    Ok(success_response(material))
}

async fn update_material(
    State(state): State<Arc<AppState>>,
    Path(material_id): Path<String>,
    Json(payload): Json<UpdateMaterialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let material = state
        .services
        .materials
        .update_material(&scope, &material_id, payload)
        .await?;
    Ok(success_response(material))
}

async fn delete_material(
    State(state): State<Arc<AppState>>,
    Path(material_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    state
        .services
        .materials
        .delete_material(&scope, &material_id)
        .await?;
    Ok(no_content_response())
}

async fn record_supplier_price(
    State(state): State<Arc<AppState>>,
    Path(material_id): Path<String>,
    Json(payload): Json<RecordSupplierPriceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let price = state
        .services
        .supplier_prices
        .record_supplier_price(&scope, &material_id, payload)
        .await?;
    Ok(created_response(price))
}

async fn list_supplier_prices(
    State(state): State<Arc<AppState>>,
    Path(material_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = request_scope(&state);
    let prices = state
        .services
        .supplier_prices
        .list_supplier_prices(&scope, &material_id)
        .await?;
    Ok(success_response(prices))
}

async fn get_price_stats(
    State(state): State<Arc<AppState>>,
    Path(material_id): Path<String>,
    Query(params): Query<PriceWindowParams>,
) -> Result<impl IntoResponse, ApiError> {
    let window = params.window()?;
    let scope = request_scope(&state);
    let stats = state
        .services
        .boq
        .material_price_stats(&scope, &material_id, window)
        .await?;
    Ok(success_response(stats))
}

/// Creates the router for material catalog and price history endpoints
pub fn material_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_materials).post(create_material))
        .route(
            "/:id",
            get(get_material).put(update_material).delete(delete_material),
        )
        .route(
            "/:id/prices",
            get(list_supplier_prices).post(record_supplier_price),
        )
        .route("/:id/price-stats", get(get_price_stats))
}
