pub mod common;
pub mod health;
pub mod jobs;
pub mod materials;
pub mod projects;

use crate::config::AppConfig;
use crate::db::{DbPool, OperationScope};
use crate::events::EventSender;
use crate::services::{
    boq::BoqService, job_materials::JobMaterialService, jobs::JobService,
    materials::MaterialService, projects::ProjectService, supplier_prices::SupplierPriceService,
};
use axum::Router;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub materials: Arc<MaterialService>,
    pub supplier_prices: Arc<SupplierPriceService>,
    pub jobs: Arc<JobService>,
    pub job_materials: Arc<JobMaterialService>,
    pub projects: Arc<ProjectService>,
    pub boq: Arc<BoqService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        Self {
            materials: Arc::new(MaterialService::new(db_pool.clone(), event_sender.clone())),
            supplier_prices: Arc::new(SupplierPriceService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            jobs: Arc::new(JobService::new(db_pool.clone(), event_sender.clone())),
            job_materials: Arc::new(JobMaterialService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            projects: Arc::new(ProjectService::new(db_pool.clone(), event_sender.clone())),
            boq: Arc::new(BoqService::new(
                db_pool,
                event_sender,
                config.price_window(),
            )),
        }
    }
}

/// Scope for one request: a fresh cancellation token and the configured deadline.
pub(crate) fn request_scope(state: &AppState) -> OperationScope {
    OperationScope::new().with_timeout(state.config.request_timeout())
}

/// All versioned API routes, to be nested under `/api/v1`.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/materials", materials::material_routes())
        .nest("/jobs", jobs::job_routes())
        .nest("/projects", projects::project_routes())
}
