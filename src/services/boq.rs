use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::OnConflict, ActiveValue::Set, ColumnTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::costing::{
    self, ActualPriceStats, MaterialPriceDetail, MaterialPriceStats, ProjectCostSummary,
    UnitPrice,
};
use super::{db_failure, translate_write_error, validate_non_negative_decimal, validate_positive_decimal};
use crate::{
    db::{OperationScope, UnitOfWork},
    entities::{boq_job, job, job_material, material, project, supplier_price},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// A job attached to a project. Labor cost and selling price are per job unit.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BoqJobRequest {
    pub job_id: Uuid,
    #[validate(custom = "validate_positive_decimal")]
    pub quantity: Decimal,
    #[validate(custom = "validate_non_negative_decimal")]
    pub labor_cost: Decimal,
    #[validate(custom = "validate_non_negative_decimal")]
    pub selling_price: Decimal,
}

/// Longest trailing window accepted for actual price statistics.
pub const MAX_PRICE_WINDOW_DAYS: i64 = 36_500;

/// Rows a project's aggregates are computed from, read in one transaction.
struct ProjectRows {
    boq_jobs: Vec<boq_job::Model>,
    ledger: Vec<job_material::Model>,
}

async fn require_project(txn: &DatabaseTransaction, project_id: Uuid) -> Result<(), ServiceError> {
    project::Entity::find_by_id(project_id)
        .one(txn)
        .await
        .map_err(db_failure("load project"))?
        .map(|_| ())
        .ok_or_else(|| ServiceError::not_found(format!("Project {} not found", project_id)))
}

async fn load_project_rows(
    txn: &DatabaseTransaction,
    project_id: Uuid,
) -> Result<ProjectRows, ServiceError> {
    require_project(txn, project_id).await?;

    let boq_jobs = boq_job::Entity::find()
        .filter(boq_job::Column::ProjectId.eq(project_id))
        .order_by_asc(boq_job::Column::JobId)
        .all(txn)
        .await
        .map_err(db_failure("load boq jobs"))?;

    if boq_jobs.is_empty() {
        return Ok(ProjectRows {
            boq_jobs,
            ledger: Vec::new(),
        });
    }

    let ledger = job_material::Entity::find()
        .filter(job_material::Column::JobId.is_in(boq_jobs.iter().map(|line| line.job_id)))
        .order_by_asc(job_material::Column::JobId)
        .order_by_asc(job_material::Column::MaterialId)
        .all(txn)
        .await
        .map_err(db_failure("load job materials"))?;

    Ok(ProjectRows { boq_jobs, ledger })
}

async fn load_materials(
    txn: &DatabaseTransaction,
    material_ids: &[String],
) -> Result<BTreeMap<String, material::Model>, ServiceError> {
    if material_ids.is_empty() {
        return Ok(BTreeMap::new());
    }
    let rows = material::Entity::find()
        .filter(material::Column::MaterialId.is_in(material_ids.iter().cloned()))
        .all(txn)
        .await
        .map_err(db_failure("load materials"))?;
    Ok(rows.into_iter().map(|m| (m.material_id.clone(), m)).collect())
}

async fn load_price_history(
    txn: &DatabaseTransaction,
    material_ids: &[String],
) -> Result<Vec<supplier_price::Model>, ServiceError> {
    if material_ids.is_empty() {
        return Ok(Vec::new());
    }
    supplier_price::Entity::find()
        .filter(supplier_price::Column::MaterialId.is_in(material_ids.iter().cloned()))
        .order_by_asc(supplier_price::Column::Id)
        .all(txn)
        .await
        .map_err(db_failure("load supplier prices"))
}

/// Project bill of quantities: job instances, aggregated material demand and cost rollup.
///
/// Every aggregate is recomputed from persisted rows on each call; this
/// service keeps no state besides its connection and the default price window.
#[derive(Clone)]
pub struct BoqService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    price_window: Option<Duration>,
}

impl BoqService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        price_window: Option<Duration>,
    ) -> Self {
        Self {
            db,
            event_sender,
            price_window,
        }
    }

    /// Earliest observation time included by `window`, or by the configured default.
    fn cutoff(&self, window: Option<Duration>) -> Result<Option<DateTime<Utc>>, ServiceError> {
        let Some(window) = window.or(self.price_window) else {
            return Ok(None);
        };
        let out_of_range = || {
            ServiceError::validation(format!(
                "Price window must be between 1 and {} days",
                MAX_PRICE_WINDOW_DAYS
            ))
        };
        if window <= Duration::zero() || window > Duration::days(MAX_PRICE_WINDOW_DAYS) {
            return Err(out_of_range());
        }
        Utc::now()
            .checked_sub_signed(window)
            .map(Some)
            .ok_or_else(out_of_range)
    }

    /// Inserts or replaces the BOQ line for `(project_id, job_id)`.
    #[instrument(skip(self, scope))]
    pub async fn add_or_update_boq_job(
        &self,
        scope: &OperationScope,
        project_id: Uuid,
        request: BoqJobRequest,
    ) -> Result<boq_job::Model, ServiceError> {
        request.validate()?;
        let job_id = request.job_id;

        let uow = UnitOfWork::begin(&self.db, "upsert boq job").await?;
        let result = scope
            .guard(async {
                let txn = uow.txn();
                require_project(txn, project_id).await?;
                job::Entity::find_by_id(job_id)
                    .one(txn)
                    .await
                    .map_err(db_failure("load job"))?
                    .ok_or_else(|| ServiceError::not_found(format!("Job {} not found", job_id)))?;

                let now = Utc::now();
                let line = boq_job::ActiveModel {
                    project_id: Set(project_id),
                    job_id: Set(job_id),
                    quantity: Set(request.quantity),
                    labor_cost: Set(request.labor_cost),
                    selling_price: Set(request.selling_price),
                    created_at: Set(now),
                    updated_at: Set(now),
                };

                boq_job::Entity::insert(line)
                    .on_conflict(
                        OnConflict::columns([boq_job::Column::ProjectId, boq_job::Column::JobId])
                            .update_columns([
                                boq_job::Column::Quantity,
                                boq_job::Column::LaborCost,
                                boq_job::Column::SellingPrice,
                                boq_job::Column::UpdatedAt,
                            ])
                            .to_owned(),
                    )
                    .exec_without_returning(txn)
                    .await
                    .map_err(|e| {
                        translate_write_error(
                            "upsert boq job",
                            e,
                            || ServiceError::conflict("BOQ line was written concurrently"),
                            || ServiceError::not_found("Referenced project or job not found"),
                        )
                    })?;

                boq_job::Entity::find_by_id((project_id, job_id))
                    .one(txn)
                    .await
                    .map_err(db_failure("reload boq job"))?
                    .ok_or_else(|| ServiceError::InternalError("BOQ line missing after upsert".into()))
            })
            .await;
        let line = uow.finish(result).await?;

        info!(
            %project_id,
            %job_id,
            quantity = %line.quantity,
            "BOQ job written"
        );
        self.event_sender
            .send_or_log(Event::BoqJobUpserted {
                project_id,
                job_id,
                quantity: line.quantity,
            })
            .await;
        Ok(line)
    }

    #[instrument(skip(self, scope))]
    pub async fn remove_boq_job(
        &self,
        scope: &OperationScope,
        project_id: Uuid,
        job_id: Uuid,
    ) -> Result<(), ServiceError> {
        let uow = UnitOfWork::begin(&self.db, "remove boq job").await?;
        let result = scope
            .guard(async {
                let deleted = boq_job::Entity::delete_by_id((project_id, job_id))
                    .exec(uow.txn())
                    .await
                    .map_err(db_failure("delete boq job"))?;
                if deleted.rows_affected == 0 {
                    return Err(ServiceError::not_found(format!(
                        "Job {} is not part of project {}",
                        job_id, project_id
                    )));
                }
                Ok(())
            })
            .await;
        uow.finish(result).await?;

        info!(%project_id, %job_id, "BOQ job removed");
        self.event_sender
            .send_or_log(Event::BoqJobRemoved { project_id, job_id })
            .await;
        Ok(())
    }

    #[instrument(skip(self, scope))]
    pub async fn list_boq_jobs(
        &self,
        scope: &OperationScope,
        project_id: Uuid,
    ) -> Result<Vec<boq_job::Model>, ServiceError> {
        let uow = UnitOfWork::begin_snapshot(&self.db, "list boq jobs").await?;
        let result = scope
            .guard(async {
                let txn = uow.txn();
                require_project(txn, project_id).await?;
                boq_job::Entity::find()
                    .filter(boq_job::Column::ProjectId.eq(project_id))
                    .order_by_asc(boq_job::Column::JobId)
                    .all(txn)
                    .await
                    .map_err(db_failure("list boq jobs"))
            })
            .await;
        uow.finish(result).await
    }

    /// Total quantity of each material the project's jobs require.
    #[instrument(skip(self, scope))]
    pub async fn compute_material_requirements(
        &self,
        scope: &OperationScope,
        project_id: Uuid,
    ) -> Result<BTreeMap<String, Decimal>, ServiceError> {
        let uow = UnitOfWork::begin_snapshot(&self.db, "compute material requirements").await?;
        let result = scope
            .guard(async {
                let rows = load_project_rows(uow.txn(), project_id).await?;
                costing::material_requirements(&rows.boq_jobs, &rows.ledger)
            })
            .await;
        uow.finish(result).await
    }

    /// Catalog reference price of a material.
    #[instrument(skip(self, scope))]
    pub async fn compute_estimated_price(
        &self,
        scope: &OperationScope,
        material_id: &str,
    ) -> Result<Decimal, ServiceError> {
        scope
            .guard(async {
                material::Entity::find_by_id(material_id.to_string())
                    .one(&*self.db)
                    .await
                    .map_err(db_failure("load material"))?
                    .map(|m| m.reference_price)
                    .ok_or_else(|| {
                        ServiceError::not_found(format!("Material {} not found", material_id))
                    })
            })
            .await
    }

    /// Average and most recent supplier price, over `window` or the configured default.
    #[instrument(skip(self, scope))]
    pub async fn compute_actual_price_stats(
        &self,
        scope: &OperationScope,
        material_id: &str,
        window: Option<Duration>,
    ) -> Result<ActualPriceStats, ServiceError> {
        let cutoff = self.cutoff(window)?;
        let uow = UnitOfWork::begin_snapshot(&self.db, "compute actual price stats").await?;
        let result = scope
            .guard(async {
                let ids = [material_id.to_string()];
                if load_materials(uow.txn(), &ids).await?.is_empty() {
                    return Err(ServiceError::not_found(format!(
                        "Material {} not found",
                        material_id
                    )));
                }
                let history = load_price_history(uow.txn(), &ids).await?;
                costing::actual_price_stats(&history, cutoff)
            })
            .await;
        uow.finish(result).await
    }

    /// Estimated price and actual price stats for a material, from one snapshot.
    #[instrument(skip(self, scope))]
    pub async fn material_price_stats(
        &self,
        scope: &OperationScope,
        material_id: &str,
        window: Option<Duration>,
    ) -> Result<MaterialPriceStats, ServiceError> {
        let cutoff = self.cutoff(window)?;
        let uow = UnitOfWork::begin_snapshot(&self.db, "material price stats").await?;
        let result = scope
            .guard(async {
                let ids = [material_id.to_string()];
                let material = load_materials(uow.txn(), &ids)
                    .await?
                    .remove(material_id)
                    .ok_or_else(|| {
                        ServiceError::not_found(format!("Material {} not found", material_id))
                    })?;
                let history = load_price_history(uow.txn(), &ids).await?;
                Ok(MaterialPriceStats {
                    material_id: material.material_id,
                    estimated_price: material.reference_price,
                    actual: costing::actual_price_stats(&history, cutoff)?,
                })
            })
            .await;
        uow.finish(result).await
    }

    /// Per-material demand and price detail for a project, from one snapshot.
    #[instrument(skip(self, scope))]
    pub async fn build_material_price_detail(
        &self,
        scope: &OperationScope,
        project_id: Uuid,
        window: Option<Duration>,
    ) -> Result<Vec<MaterialPriceDetail>, ServiceError> {
        let cutoff = self.cutoff(window)?;
        let uow = UnitOfWork::begin_snapshot(&self.db, "build material price detail").await?;
        let result = scope
            .guard(async {
                let txn = uow.txn();
                let rows = load_project_rows(txn, project_id).await?;
                let requirements = costing::material_requirements(&rows.boq_jobs, &rows.ledger)?;
                let ids: Vec<String> = requirements.keys().cloned().collect();

                let materials = load_materials(txn, &ids).await?;
                let history = load_price_history(txn, &ids).await?;
                let stats = costing::actual_price_stats_by_material(&history, cutoff)?;
                costing::build_price_details(&requirements, &materials, &stats)
            })
            .await;
        let details = uow.finish(result).await?;

        debug!(%project_id, materials = details.len(), "Material price detail built");
        Ok(details)
    }

    /// Material, labor and revenue totals for a project.
    ///
    /// Materials without supplier history are priced at their catalog
    /// estimate and listed in `estimated_price_fallbacks`.
    #[instrument(skip(self, scope))]
    pub async fn project_cost_summary(
        &self,
        scope: &OperationScope,
        project_id: Uuid,
        window: Option<Duration>,
    ) -> Result<ProjectCostSummary, ServiceError> {
        let cutoff = self.cutoff(window)?;
        let uow = UnitOfWork::begin_snapshot(&self.db, "project cost summary").await?;
        let result = scope
            .guard(async {
                let txn = uow.txn();
                let rows = load_project_rows(txn, project_id).await?;
                let mut ids: Vec<String> =
                    rows.ledger.iter().map(|row| row.material_id.clone()).collect();
                ids.sort();
                ids.dedup();

                let materials = load_materials(txn, &ids).await?;
                let history = load_price_history(txn, &ids).await?;
                let stats = costing::actual_price_stats_by_material(&history, cutoff)?;

                let empty = ActualPriceStats::default();
                let mut prices = BTreeMap::new();
                for id in &ids {
                    let material = materials.get(id).ok_or_else(|| {
                        ServiceError::InternalError(format!(
                            "ledger references material {} missing from catalog",
                            id
                        ))
                    })?;
                    let unit_price =
                        UnitPrice::select(material.reference_price, stats.get(id).unwrap_or(&empty));
                    prices.insert(id.clone(), unit_price);
                }

                costing::project_cost_summary(project_id, &rows.boq_jobs, &rows.ledger, &prices)
            })
            .await;
        let summary = uow.finish(result).await?;

        if !summary.estimated_price_fallbacks.is_empty() {
            warn!(
                %project_id,
                materials = ?summary.estimated_price_fallbacks,
                "No supplier price recorded; using catalog estimate"
            );
        }
        Ok(summary)
    }
}
