mod common;

use assert_matches::assert_matches;
use boq_api::{
    errors::ServiceError,
    services::{
        boq::BoqJobRequest,
        job_materials::{AddJobMaterialRequest, JobMaterialItem},
        materials::{CreateMaterialRequest, UpdateMaterialRequest},
        supplier_prices::RecordSupplierPriceRequest,
    },
};
use chrono::{Duration, TimeZone, Utc};
use common::TestApp;
use rust_decimal_macros::dec;

#[tokio::test]
async fn duplicate_material_id_is_conflict() {
    let app = TestApp::new().await;
    app.seed_material("hinge", dec!(4)).await;

    let result = app
        .services()
        .materials
        .create_material(
            &app.scope(),
            CreateMaterialRequest {
                material_id: "hinge".into(),
                name: "Another hinge".into(),
                unit: "pcs".into(),
                reference_price: dec!(9),
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));

    let stored = app
        .services()
        .materials
        .get_material(&app.scope(), "hinge")
        .await
        .unwrap();
    assert_eq!(stored.reference_price, dec!(4));
}

#[tokio::test]
async fn negative_reference_price_is_rejected() {
    let app = TestApp::new().await;
    let result = app
        .services()
        .materials
        .create_material(
            &app.scope(),
            CreateMaterialRequest {
                material_id: "hinge".into(),
                name: "Hinge".into(),
                unit: "pcs".into(),
                reference_price: dec!(-1),
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn update_changes_catalog_entry() {
    let app = TestApp::new().await;
    app.seed_material("hinge", dec!(4)).await;
    let materials = &app.services().materials;

    let updated = materials
        .update_material(
            &app.scope(),
            "hinge",
            UpdateMaterialRequest {
                name: "Brass hinge".into(),
                unit: "pcs".into(),
                reference_price: dec!(6),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Brass hinge");
    assert_eq!(updated.reference_price, dec!(6));

    let result = materials
        .update_material(
            &app.scope(),
            "ghost",
            UpdateMaterialRequest {
                name: "Ghost".into(),
                unit: "pcs".into(),
                reference_price: dec!(1),
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn material_in_use_cannot_be_deleted() {
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

    let materials = &app.services().materials;
    let result = materials.delete_material(&app.scope(), "hinge").await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));

    app.services()
        .job_materials
        .delete_job_material(&app.scope(), door.job_id, "hinge")
        .await
        .unwrap();
    materials.delete_material(&app.scope(), "hinge").await.unwrap();

    assert_matches!(
        materials.get_material(&app.scope(), "hinge").await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn material_with_price_history_cannot_be_deleted() {
    let app = TestApp::new().await;
    app.seed_material("hinge", dec!(4)).await;
    app.services()
        .supplier_prices
        .record_supplier_price(
            &app.scope(),
            "hinge",
            RecordSupplierPriceRequest {
                supplier_name: "Acme Hardware".into(),
                price: dec!(5),
                observed_at: None,
            },
        )
        .await
        .unwrap();

    let result = app
        .services()
        .materials
        .delete_material(&app.scope(), "hinge")
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn materials_are_listed_by_id() {
    let app = TestApp::new().await;
    app.seed_material("screw", dec!(0.5)).await;
    app.seed_material("hinge", dec!(4)).await;

    let listed = app
        .services()
        .materials
        .list_materials(&app.scope())
        .await
        .unwrap();
    let ids: Vec<&str> = listed.iter().map(|m| m.material_id.as_str()).collect();
    assert_eq!(ids, vec!["hinge", "screw"]);
}

#[tokio::test]
async fn price_history_is_ordered_by_observation_time() {
    let app = TestApp::new().await;
    app.seed_material("hinge", dec!(4)).await;
    let prices = &app.services().supplier_prices;
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();

    for (supplier, price, offset) in [("B", dec!(6), 2), ("A", dec!(5), 0), ("C", dec!(7), 1)] {
        prices
            .record_supplier_price(
                &app.scope(),
                "hinge",
                RecordSupplierPriceRequest {
                    supplier_name: supplier.into(),
                    price,
                    observed_at: Some(base + Duration::days(offset)),
                },
            )
            .await
            .unwrap();
    }

    let history = prices.list_supplier_prices(&app.scope(), "hinge").await.unwrap();
    let suppliers: Vec<&str> = history.iter().map(|p| p.supplier_name.as_str()).collect();
    assert_eq!(suppliers, vec!["A", "C", "B"]);

    let result = prices
        .record_supplier_price(
            &app.scope(),
            "ghost",
            RecordSupplierPriceRequest {
                supplier_name: "A".into(),
                price: dec!(1),
                observed_at: None,
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn job_attached_to_project_cannot_be_deleted() {
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
    let project = app.seed_project("Office fit-out").await;
    app.services()
        .boq
        .add_or_update_boq_job(
            &app.scope(),
            project.project_id,
            BoqJobRequest {
                job_id: door.job_id,
                quantity: dec!(1),
                labor_cost: dec!(0),
                selling_price: dec!(0),
            },
        )
        .await
        .unwrap();

    let jobs = &app.services().jobs;
    assert_matches!(
        jobs.delete_job(&app.scope(), door.job_id).await,
        Err(ServiceError::Conflict(_))
    );

    app.services()
        .boq
        .remove_boq_job(&app.scope(), project.project_id, door.job_id)
        .await
        .unwrap();
    jobs.delete_job(&app.scope(), door.job_id).await.unwrap();

    // Ledger rows went with the job, so the material is free again.
    app.services()
        .materials
        .delete_material(&app.scope(), "hinge")
        .await
        .unwrap();
}
