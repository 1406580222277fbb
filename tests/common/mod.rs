#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use boq_api::{
    config::AppConfig,
    db::{self, OperationScope},
    entities::{job, material, project},
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        jobs::CreateJobRequest, materials::CreateMaterialRequest,
        projects::CreateProjectRequest,
    },
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // Every connection to an in-memory SQLite URL is its own database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = EventSender::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let router = boq_api::build_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    pub fn scope(&self) -> OperationScope {
        OperationScope::new()
    }

    pub async fn seed_material(&self, id: &str, reference_price: Decimal) -> material::Model {
        self.services()
            .materials
            .create_material(
                &self.scope(),
                CreateMaterialRequest {
                    material_id: id.to_string(),
                    name: format!("{} (catalog)", id),
                    unit: "pcs".to_string(),
                    reference_price,
                },
            )
            .await
            .expect("seed material")
    }

    pub async fn seed_job(&self, name: &str) -> job::Model {
        self.services()
            .jobs
            .create_job(
                &self.scope(),
                CreateJobRequest {
                    name: name.to_string(),
                    description: None,
                    unit: "unit".to_string(),
                },
            )
            .await
            .expect("seed job")
    }

    pub async fn seed_project(&self, name: &str) -> project::Model {
        self.services()
            .projects
            .create_project(
                &self.scope(),
                CreateProjectRequest {
                    name: name.to_string(),
                    description: None,
                    address: None,
                    client_id: None,
                },
            )
            .await
            .expect("seed project")
    }

    /// Sends a request through the full router and decodes the JSON body, if any.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }
}
