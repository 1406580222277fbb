//! Cancellation and deadlines roll back in-flight work.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use boq_api::{
    db::{OperationScope, UnitOfWork},
    entities::material,
    errors::ServiceError,
    services::{
        job_materials::{AddJobMaterialRequest, JobMaterialItem},
        materials::CreateMaterialRequest,
    },
};
use chrono::Utc;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ActiveValue::Set};

fn hinge_request() -> CreateMaterialRequest {
    CreateMaterialRequest {
        material_id: "hinge".into(),
        name: "Hinge".into(),
        unit: "pcs".into(),
        reference_price: dec!(4),
    }
}

#[tokio::test]
async fn cancelled_scope_writes_nothing() {
    let app = TestApp::new().await;
    let scope = OperationScope::new();
    scope.cancel();

    let result = app
        .services()
        .materials
        .create_material(&scope, hinge_request())
        .await;
    assert_matches!(result, Err(ServiceError::Cancelled(_)));

    let listed = app
        .services()
        .materials
        .list_materials(&app.scope())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn expired_deadline_writes_nothing() {
    let app = TestApp::new().await;
    app.seed_material("hinge", dec!(4)).await;
    let door = app.seed_job("Install Door").await;

    let scope = OperationScope::new().with_timeout(Duration::ZERO);
    let result = app
        .services()
        .job_materials
        .add_job_materials(
            &scope,
            door.job_id,
            AddJobMaterialRequest {
                materials: vec![JobMaterialItem {
                    material_id: "hinge".into(),
                    quantity: dec!(3),
                }],
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::Cancelled(msg)) if msg.contains("deadline"));

    let lines = app
        .services()
        .job_materials
        .get_materials_for_job(&app.scope(), door.job_id)
        .await
        .unwrap();
    assert!(lines.is_empty());
}

#[tokio::test]
async fn cancel_after_write_rolls_back() {
    let app = TestApp::new().await;
    let scope = OperationScope::new();

    let uow = UnitOfWork::begin(&app.state.db, "cancel after write")
        .await
        .unwrap();
    let result = scope
        .guard(async {
            let now = Utc::now();
            material::ActiveModel {
                material_id: Set("hinge".into()),
                name: Set("Hinge".into()),
                unit: Set("pcs".into()),
                reference_price: Set(dec!(4)),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(uow.txn())
            .await
            .map_err(|e| ServiceError::db_error("insert material", e))?;

            // The caller gives up after the write but before the commit.
            scope.cancel();
            Ok(())
        })
        .await;
    let outcome = uow.finish(result).await;
    assert_matches!(outcome, Err(ServiceError::Cancelled(_)));

    assert_matches!(
        app.services()
            .materials
            .get_material(&app.scope(), "hinge")
            .await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn cancelled_read_returns_cancelled() {
    let app = TestApp::new().await;
    let project = app.seed_project("Office fit-out").await;
    let scope = OperationScope::new();
    scope.cancel();

    let result = app
        .services()
        .boq
        .project_cost_summary(&scope, project.project_id, None)
        .await;
    assert_matches!(result, Err(ServiceError::Cancelled(_)));

    // The connection is usable again once the cancelled transaction is released.
    app.services()
        .boq
        .project_cost_summary(&app.scope(), project.project_id, None)
        .await
        .unwrap();
}
