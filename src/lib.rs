//! BOQ API Library
//!
//! Construction estimation backend: material catalog, supplier price history,
//! job-material ledger, project bill of quantities and cost rollup.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod services;
pub mod tracing;

use axum::{routing::get, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires every service onto one shared connection pool and event channel.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services =
            handlers::AppServices::new(db.clone(), Arc::new(event_sender.clone()), &config);
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

/// Full application router: health probes, the v1 API and request-scoped middleware.
pub fn build_router(state: AppState) -> Router {
    Router::<Arc<AppState>>::new()
        .route("/", get(|| async { "boq-api up" }))
        .nest("/health", handlers::health::health_routes())
        .nest("/api/v1", handlers::api_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::db::{OperationScope, UnitOfWork};
    pub use crate::errors::{ErrorKind, ServiceError};
    pub use crate::events::{Event, EventSender};
    pub use crate::services::costing::{
        ActualPriceStats, MaterialPriceDetail, MaterialPriceStats, PriceSource, ProjectCostSummary,
    };
    pub use crate::{build_router, AppState};
}
