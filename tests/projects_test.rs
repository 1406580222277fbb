//! Project records: update, delete and the client join.

mod common;

use assert_matches::assert_matches;
use boq_api::{
    entities::{boq_job, client},
    errors::ServiceError,
    services::{
        boq::BoqJobRequest,
        job_materials::{AddJobMaterialRequest, JobMaterialItem},
        projects::{CreateProjectRequest, UpdateProjectRequest},
    },
};
use chrono::Utc;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
};
use uuid::Uuid;

fn rename(name: &str) -> UpdateProjectRequest {
    UpdateProjectRequest {
        name: name.into(),
        description: Some("Second floor".into()),
        address: None,
        client_id: None,
    }
}

async fn seed_client(app: &TestApp, name: &str) -> client::Model {
    client::ActiveModel {
        client_id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        email: Set(None),
        tel: Set(None),
        address: Set(None),
        tax_id: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(&*app.state.db)
    .await
    .expect("seed client")
}

#[tokio::test]
async fn update_replaces_editable_fields() {
    let app = TestApp::new().await;
    let project = app.seed_project("Office fit-out").await;
    let projects = &app.services().projects;

    let updated = projects
        .update_project(&app.scope(), project.project_id, rename("Office fit-out, phase 2"))
        .await
        .unwrap();
    assert_eq!(updated.name, "Office fit-out, phase 2");
    assert_eq!(updated.description.as_deref(), Some("Second floor"));
    assert_eq!(updated.created_at, project.created_at);
    assert!(updated.updated_at.is_some());

    let stored = projects
        .get_project(&app.scope(), project.project_id)
        .await
        .unwrap();
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn update_rejects_unknown_project_client_and_blank_name() {
    let app = TestApp::new().await;
    let project = app.seed_project("Office fit-out").await;
    let projects = &app.services().projects;

    let result = projects
        .update_project(&app.scope(), Uuid::new_v4(), rename("Ghost"))
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));

    let result = projects
        .update_project(
            &app.scope(),
            project.project_id,
            UpdateProjectRequest {
                client_id: Some(Uuid::new_v4()),
                ..rename("Office fit-out")
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(msg)) if msg.contains("Client"));

    let result = projects
        .update_project(&app.scope(), project.project_id, rename("   "))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let stored = projects
        .get_project(&app.scope(), project.project_id)
        .await
        .unwrap();
    assert_eq!(stored.name, "Office fit-out");
    assert_eq!(stored.updated_at, None);
}

#[tokio::test]
async fn project_is_read_with_its_client() {
    let app = TestApp::new().await;
    let acme = seed_client(&app, "Acme Corp").await;
    let projects = &app.services().projects;

    let bare = app.seed_project("Warehouse").await;
    let owned = projects
        .create_project(
            &app.scope(),
            CreateProjectRequest {
                name: "Office fit-out".into(),
                description: None,
                address: None,
                client_id: Some(acme.client_id),
            },
        )
        .await
        .unwrap();

    let with_client = projects
        .get_project_with_client(&app.scope(), owned.project_id)
        .await
        .unwrap();
    assert_eq!(with_client.project, owned);
    assert_eq!(with_client.client, Some(acme));

    let without = projects
        .get_project_with_client(&app.scope(), bare.project_id)
        .await
        .unwrap();
    assert_eq!(without.client, None);

    let result = projects
        .get_project_with_client(&app.scope(), Uuid::new_v4())
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn deleting_a_project_leaves_other_projects_intact() {
    let app = TestApp::new().await;
    app.seed_material("hinge", dec!(4)).await;
    let door = app.seed_job("Install Door").await;
    app.services()
        .job_materials
        .add_job_materials(
            &app.scope(),
            door.job_id,
            AddJobMaterialRequest {
                materials: vec![JobMaterialItem {
                    material_id: "hinge".into(),
                    quantity: dec!(3),
                }],
            },
        )
        .await
        .unwrap();

    let boq = &app.services().boq;
    let office = app.seed_project("Office fit-out").await;
    let warehouse = app.seed_project("Warehouse").await;
    for (project_id, quantity) in [(office.project_id, dec!(10)), (warehouse.project_id, dec!(4))] {
        boq.add_or_update_boq_job(
            &app.scope(),
            project_id,
            BoqJobRequest {
                job_id: door.job_id,
                quantity,
                labor_cost: dec!(0),
                selling_price: dec!(0),
            },
        )
        .await
        .unwrap();
    }
    let before = boq
        .compute_material_requirements(&app.scope(), warehouse.project_id)
        .await
        .unwrap();

    let projects = &app.services().projects;
    projects
        .delete_project(&app.scope(), office.project_id)
        .await
        .unwrap();

    assert_matches!(
        projects.get_project(&app.scope(), office.project_id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        boq.list_boq_jobs(&app.scope(), office.project_id).await,
        Err(ServiceError::NotFound(_))
    );
    let orphaned = boq_job::Entity::find()
        .filter(boq_job::Column::ProjectId.eq(office.project_id))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(orphaned, 0);

    let after = boq
        .compute_material_requirements(&app.scope(), warehouse.project_id)
        .await
        .unwrap();
    assert_eq!(after, before);
    assert_eq!(after["hinge"], dec!(12));

    // The job and its ledger are untouched.
    let lines = app
        .services()
        .job_materials
        .get_materials_for_job(&app.scope(), door.job_id)
        .await
        .unwrap();
    assert_eq!(lines.len(), 1);

    let result = projects.delete_project(&app.scope(), office.project_id).await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}
