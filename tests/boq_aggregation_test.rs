//! Integration tests for project BOQ lines and the derived aggregates:
//! material requirements, price detail and the cost rollup.

mod common;

use assert_matches::assert_matches;
use boq_api::{
    errors::ServiceError,
    services::{
        boq::{BoqJobRequest, MAX_PRICE_WINDOW_DAYS},
        costing::PriceSource,
        job_materials::{AddJobMaterialRequest, JobMaterialItem},
        supplier_prices::RecordSupplierPriceRequest,
    },
};
use chrono::{Duration, Utc};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Door job with 3 hinges and 12 screws, placed 10 times in one project.
struct DoorProject {
    project_id: Uuid,
    job_id: Uuid,
}

async fn door_project(app: &TestApp) -> DoorProject {
    app.seed_material("hinge", dec!(4)).await;
    app.seed_material("screw", dec!(0.5)).await;
    let door = app.seed_job("Install Door").await;
    app.services()
        .job_materials
        .add_job_materials(
            &app.scope(),
            door.job_id,
            AddJobMaterialRequest {
                materials: vec![
                    JobMaterialItem {
                        material_id: "hinge".into(),
                        quantity: dec!(3),
                    },
                    JobMaterialItem {
                        material_id: "screw".into(),
                        quantity: dec!(12),
                    },
                ],
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
                quantity: dec!(10),
                labor_cost: dec!(20),
                selling_price: dec!(100),
            },
        )
        .await
        .unwrap();

    DoorProject {
        project_id: project.project_id,
        job_id: door.job_id,
    }
}

async fn record_price(app: &TestApp, material_id: &str, price: Decimal, days_ago: i64) {
    app.services()
        .supplier_prices
        .record_supplier_price(
            &app.scope(),
            material_id,
            RecordSupplierPriceRequest {
                supplier_name: "Acme Hardware".into(),
                price,
                observed_at: Some(Utc::now() - Duration::days(days_ago)),
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn requirements_multiply_ledger_by_boq_quantity() {
    let app = TestApp::new().await;
    let door = door_project(&app).await;

    let totals = app
        .services()
        .boq
        .compute_material_requirements(&app.scope(), door.project_id)
        .await
        .unwrap();

    assert_eq!(totals.len(), 2);
    assert_eq!(totals["hinge"], dec!(30));
    assert_eq!(totals["screw"], dec!(120));
}

#[tokio::test]
async fn requirements_sum_across_jobs_sharing_a_material() {
    let app = TestApp::new().await;
    let door = door_project(&app).await;
    let cabinet = app.seed_job("Install Cabinet").await;
    app.services()
        .job_materials
        .add_job_materials(
            &app.scope(),
            cabinet.job_id,
            AddJobMaterialRequest {
                materials: vec![JobMaterialItem {
                    material_id: "hinge".into(),
                    quantity: dec!(2),
                }],
            },
        )
        .await
        .unwrap();
    app.services()
        .boq
        .add_or_update_boq_job(
            &app.scope(),
            door.project_id,
            BoqJobRequest {
                job_id: cabinet.job_id,
                quantity: dec!(5),
                labor_cost: dec!(0),
                selling_price: dec!(0),
            },
        )
        .await
        .unwrap();

    let totals = app
        .services()
        .boq
        .compute_material_requirements(&app.scope(), door.project_id)
        .await
        .unwrap();
    assert_eq!(totals["hinge"], dec!(40));
    assert_eq!(totals["screw"], dec!(120));
}

#[tokio::test]
async fn upsert_replaces_existing_boq_line() {
    let app = TestApp::new().await;
    let door = door_project(&app).await;
    let boq = &app.services().boq;

    boq.add_or_update_boq_job(
        &app.scope(),
        door.project_id,
        BoqJobRequest {
            job_id: door.job_id,
            quantity: dec!(2),
            labor_cost: dec!(20),
            selling_price: dec!(100),
        },
    )
    .await
    .unwrap();

    let lines = boq.list_boq_jobs(&app.scope(), door.project_id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, dec!(2));

    let totals = boq
        .compute_material_requirements(&app.scope(), door.project_id)
        .await
        .unwrap();
    assert_eq!(totals["hinge"], dec!(6));
}

#[tokio::test]
async fn price_detail_reports_estimate_average_and_latest() {
    let app = TestApp::new().await;
    let door = door_project(&app).await;
    record_price(&app, "hinge", dec!(5), 2).await;
    record_price(&app, "hinge", dec!(7), 1).await;

    let details = app
        .services()
        .boq
        .build_material_price_detail(&app.scope(), door.project_id, None)
        .await
        .unwrap();

    assert_eq!(details.len(), 2);
    let hinge = &details[0];
    assert_eq!(hinge.material_id, "hinge");
    assert_eq!(hinge.total_quantity, dec!(30));
    assert_eq!(hinge.estimated_price, dec!(4));
    assert_eq!(hinge.avg_actual_price, Some(dec!(6)));
    assert_eq!(hinge.actual_price, Some(dec!(7)));
    assert_eq!(hinge.supplier_name.as_deref(), Some("Acme Hardware"));

    let screw = &details[1];
    assert_eq!(screw.material_id, "screw");
    assert_eq!(screw.total_quantity, dec!(120));
    assert_eq!(screw.avg_actual_price, None);
    assert_eq!(screw.actual_price, None);
}

#[tokio::test]
async fn price_detail_is_stable_across_calls() {
    let app = TestApp::new().await;
    let door = door_project(&app).await;
    record_price(&app, "screw", dec!(0.5), 3).await;

    let boq = &app.services().boq;
    let first = boq
        .build_material_price_detail(&app.scope(), door.project_id, None)
        .await
        .unwrap();
    let second = boq
        .build_material_price_detail(&app.scope(), door.project_id, None)
        .await
        .unwrap();
    assert_eq!(first, second);
    // Same bytes on the wire, not just equal values.
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[tokio::test]
async fn price_window_excludes_older_observations() {
    let app = TestApp::new().await;
    let door = door_project(&app).await;
    record_price(&app, "hinge", dec!(3), 40).await;
    record_price(&app, "hinge", dec!(5), 2).await;

    let boq = &app.services().boq;
    let all_time = boq
        .compute_actual_price_stats(&app.scope(), "hinge", None)
        .await
        .unwrap();
    assert_eq!(all_time.avg_actual_price, Some(dec!(4)));
    assert_eq!(all_time.observations, 2);

    let recent = boq
        .compute_actual_price_stats(&app.scope(), "hinge", Some(Duration::days(30)))
        .await
        .unwrap();
    assert_eq!(recent.avg_actual_price, Some(dec!(5)));
    assert_eq!(recent.actual_price, Some(dec!(5)));
    assert_eq!(recent.observations, 1);

    let details = boq
        .build_material_price_detail(&app.scope(), door.project_id, Some(Duration::days(30)))
        .await
        .unwrap();
    assert_eq!(details[0].avg_actual_price, Some(dec!(5)));
}

#[tokio::test]
async fn configured_window_applies_when_request_has_none() {
    let app = TestApp::with_config(|cfg| cfg.price_window_days = Some(30)).await;
    door_project(&app).await;
    record_price(&app, "hinge", dec!(3), 40).await;

    let stats = app
        .services()
        .boq
        .compute_actual_price_stats(&app.scope(), "hinge", None)
        .await
        .unwrap();
    assert_eq!(stats.avg_actual_price, None);
    assert_eq!(stats.observations, 0);
}

#[tokio::test]
async fn estimated_price_comes_from_catalog() {
    let app = TestApp::new().await;
    app.seed_material("hinge", dec!(4)).await;
    let boq = &app.services().boq;

    let price = boq.compute_estimated_price(&app.scope(), "hinge").await.unwrap();
    assert_eq!(price, dec!(4));

    let result = boq.compute_estimated_price(&app.scope(), "ghost").await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn empty_project_has_empty_aggregates() {
    let app = TestApp::new().await;
    let project = app.seed_project("Empty lot").await;
    let boq = &app.services().boq;

    let totals = boq
        .compute_material_requirements(&app.scope(), project.project_id)
        .await
        .unwrap();
    assert!(totals.is_empty());

    let details = boq
        .build_material_price_detail(&app.scope(), project.project_id, None)
        .await
        .unwrap();
    assert!(details.is_empty());

    let summary = boq
        .project_cost_summary(&app.scope(), project.project_id, None)
        .await
        .unwrap();
    assert!(summary.jobs.is_empty());
    assert_eq!(summary.total_cost, Decimal::ZERO);
}

#[tokio::test]
async fn unknown_project_is_not_found() {
    let app = TestApp::new().await;
    let boq = &app.services().boq;
    let missing = Uuid::new_v4();

    assert_matches!(
        boq.compute_material_requirements(&app.scope(), missing).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        boq.build_material_price_detail(&app.scope(), missing, None).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        boq.project_cost_summary(&app.scope(), missing, None).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn cost_summary_uses_latest_price_and_reports_fallbacks() {
    let app = TestApp::new().await;
    let door = door_project(&app).await;
    record_price(&app, "hinge", dec!(5), 2).await;
    record_price(&app, "hinge", dec!(7), 1).await;

    let summary = app
        .services()
        .boq
        .project_cost_summary(&app.scope(), door.project_id, None)
        .await
        .unwrap();

    // hinge: 30 × 7 = 210, screw: 120 × 0.5 (estimate) = 60
    assert_eq!(summary.material_cost, dec!(270));
    assert_eq!(summary.labor_cost, dec!(200));
    assert_eq!(summary.total_cost, dec!(470));
    assert_eq!(summary.total_revenue, dec!(1000));
    assert_eq!(summary.margin, dec!(530));
    assert_eq!(summary.estimated_price_fallbacks, vec!["screw".to_string()]);

    let job = &summary.jobs[0];
    assert_eq!(job.job_id, door.job_id);
    let hinge = &job.materials[0];
    assert_eq!(hinge.unit_price, dec!(7));
    assert_eq!(hinge.price_source, PriceSource::Actual);
    let screw = &job.materials[1];
    assert_eq!(screw.price_source, PriceSource::Estimated);
}

#[tokio::test]
async fn removing_boq_line_drops_its_demand() {
    let app = TestApp::new().await;
    let door = door_project(&app).await;
    let boq = &app.services().boq;

    boq.remove_boq_job(&app.scope(), door.project_id, door.job_id)
        .await
        .unwrap();
    let totals = boq
        .compute_material_requirements(&app.scope(), door.project_id)
        .await
        .unwrap();
    assert!(totals.is_empty());

    assert_matches!(
        boq.remove_boq_job(&app.scope(), door.project_id, door.job_id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn boq_line_validation_and_references() {
    let app = TestApp::new().await;
    let door = door_project(&app).await;
    let boq = &app.services().boq;

    let result = boq
        .add_or_update_boq_job(
            &app.scope(),
            door.project_id,
            BoqJobRequest {
                job_id: door.job_id,
                quantity: dec!(0),
                labor_cost: dec!(0),
                selling_price: dec!(0),
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let result = boq
        .add_or_update_boq_job(
            &app.scope(),
            door.project_id,
            BoqJobRequest {
                job_id: Uuid::new_v4(),
                quantity: dec!(1),
                labor_cost: dec!(0),
                selling_price: dec!(0),
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));

    let result = boq
        .add_or_update_boq_job(
            &app.scope(),
            Uuid::new_v4(),
            BoqJobRequest {
                job_id: door.job_id,
                quantity: dec!(1),
                labor_cost: dec!(0),
                selling_price: dec!(0),
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn price_window_beyond_a_century_is_rejected() {
    let app = TestApp::new().await;
    door_project(&app).await;
    let boq = &app.services().boq;

    boq.compute_actual_price_stats(
        &app.scope(),
        "hinge",
        Some(Duration::days(MAX_PRICE_WINDOW_DAYS)),
    )
    .await
    .unwrap();

    let result = boq
        .compute_actual_price_stats(&app.scope(), "hinge", Some(Duration::days(1_000_000)))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn oversized_configured_window_is_rejected_per_call() {
    let app = TestApp::with_config(|cfg| cfg.price_window_days = Some(10_000_000)).await;
    let door = door_project(&app).await;
    let boq = &app.services().boq;

    let result = boq
        .compute_actual_price_stats(&app.scope(), "hinge", None)
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let result = boq
        .project_cost_summary(&app.scope(), door.project_id, None)
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    // An explicit window still works.
    boq.project_cost_summary(&app.scope(), door.project_id, Some(Duration::days(30)))
        .await
        .unwrap();
}

#[tokio::test]
async fn quantities_outside_stored_precision_are_rejected() {
    let app = TestApp::new().await;
    let door = door_project(&app).await;
    let boq = &app.services().boq;

    for quantity in [
        dec!(0.00001),
        Decimal::from_i128_with_scale(10_i128.pow(20), 0),
        Decimal::from_i128_with_scale(10_i128.pow(12), 0),
    ] {
        let result = boq
            .add_or_update_boq_job(
                &app.scope(),
                door.project_id,
                BoqJobRequest {
                    job_id: door.job_id,
                    quantity,
                    labor_cost: dec!(0),
                    selling_price: dec!(0),
                },
            )
            .await;
        assert_matches!(result, Err(ServiceError::ValidationError(_)), "{}", quantity);
    }

    let result = app
        .services()
        .job_materials
        .add_job_materials(
            &app.scope(),
            door.job_id,
            AddJobMaterialRequest {
                materials: vec![JobMaterialItem {
                    material_id: "hinge".into(),
                    quantity: Decimal::from_i128_with_scale(10_i128.pow(20), 0),
                }],
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    // The largest storable quantity is accepted and aggregates without error.
    boq.add_or_update_boq_job(
        &app.scope(),
        door.project_id,
        BoqJobRequest {
            job_id: door.job_id,
            quantity: dec!(999999999999.9999),
            labor_cost: dec!(0),
            selling_price: dec!(0),
        },
    )
    .await
    .unwrap();
    let totals = boq
        .compute_material_requirements(&app.scope(), door.project_id)
        .await
        .unwrap();
    assert_eq!(totals["hinge"], dec!(2999999999999.9997));
    boq.project_cost_summary(&app.scope(), door.project_id, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn material_price_stats_pair_estimate_with_observations() {
    let app = TestApp::new().await;
    door_project(&app).await;
    record_price(&app, "hinge", dec!(3), 40).await;
    record_price(&app, "hinge", dec!(5), 2).await;
    let boq = &app.services().boq;

    let stats = boq
        .material_price_stats(&app.scope(), "hinge", Some(Duration::days(30)))
        .await
        .unwrap();
    assert_eq!(stats.material_id, "hinge");
    assert_eq!(stats.estimated_price, dec!(4));
    assert_eq!(stats.actual.actual_price, Some(dec!(5)));
    assert_eq!(stats.actual.observations, 1);

    let result = boq.material_price_stats(&app.scope(), "ghost", None).await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}
