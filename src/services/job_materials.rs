use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{db_failure, translate_write_error, validate_not_blank, validate_positive_decimal};
use crate::{
    db::{OperationScope, UnitOfWork},
    entities::{job, job_material, material},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JobMaterialItem {
    #[validate(length(min = 1), custom = "validate_not_blank")]
    pub material_id: String,
    #[validate(custom = "validate_positive_decimal")]
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddJobMaterialRequest {
    #[validate(length(min = 1))]
    pub materials: Vec<JobMaterialItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateJobMaterialQuantityRequest {
    pub job_id: Uuid,
    #[validate(length(min = 1), custom = "validate_not_blank")]
    pub material_id: String,
    #[validate(custom = "validate_positive_decimal")]
    pub quantity: Decimal,
}

/// One ledger entry joined with its catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMaterialLine {
    pub material_id: String,
    pub name: String,
    pub unit: String,
    pub quantity: Decimal,
}

/// Per-job ledger of required materials and their per-unit quantities.
#[derive(Clone)]
pub struct JobMaterialService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

async fn require_job(txn: &DatabaseTransaction, job_id: Uuid) -> Result<job::Model, ServiceError> {
    job::Entity::find_by_id(job_id)
        .one(txn)
        .await
        .map_err(db_failure("load job"))?
        .ok_or_else(|| ServiceError::not_found(format!("Job {} not found", job_id)))
}

impl JobMaterialService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Attaches a batch of materials to a job, all or nothing.
    ///
    /// Duplicate pairs, whether already stored or repeated inside the batch,
    /// are rejected by the store's primary key and surface as `Conflict`.
    #[instrument(skip(self, scope, request), fields(items = request.materials.len()))]
    pub async fn add_job_materials(
        &self,
        scope: &OperationScope,
        job_id: Uuid,
        request: AddJobMaterialRequest,
    ) -> Result<Vec<job_material::Model>, ServiceError> {
        request.validate()?;
        for item in &request.materials {
            item.validate()?;
        }

        let uow = UnitOfWork::begin(&self.db, "add job materials").await?;
        let result = scope
            .guard(async {
                let txn = uow.txn();
                require_job(txn, job_id).await?;

                let wanted: BTreeSet<&str> = request
                    .materials
                    .iter()
                    .map(|item| item.material_id.as_str())
                    .collect();
                let found: BTreeSet<String> = material::Entity::find()
                    .filter(material::Column::MaterialId.is_in(wanted.iter().copied()))
                    .all(txn)
                    .await
                    .map_err(db_failure("load materials"))?
                    .into_iter()
                    .map(|m| m.material_id)
                    .collect();
                let missing: Vec<&str> = wanted
                    .iter()
                    .copied()
                    .filter(|id| !found.contains(*id))
                    .collect();
                if !missing.is_empty() {
                    return Err(ServiceError::not_found(format!(
                        "Material(s) not found: {}",
                        missing.join(", ")
                    )));
                }

                let now = Utc::now();
                let rows: Vec<job_material::Model> = request
                    .materials
                    .iter()
                    .map(|item| job_material::Model {
                        job_id,
                        material_id: item.material_id.clone(),
                        quantity: item.quantity,
                        created_at: now,
                        updated_at: now,
                    })
                    .collect();

                job_material::Entity::insert_many(rows.iter().map(|row| {
                    job_material::ActiveModel {
                        job_id: Set(row.job_id),
                        material_id: Set(row.material_id.clone()),
                        quantity: Set(row.quantity),
                        created_at: Set(row.created_at),
                        updated_at: Set(row.updated_at),
                    }
                }))
                .exec_without_returning(txn)
                .await
                .map_err(|e| {
                    translate_write_error(
                        "insert job materials",
                        e,
                        || {
                            ServiceError::conflict(format!(
                                "Job {} already lists one or more of these materials",
                                job_id
                            ))
                        },
                        || ServiceError::not_found("Referenced job or material not found"),
                    )
                })?;
                Ok(rows)
            })
            .await;
        let added = uow.finish(result).await?;

        info!(%job_id, count = added.len(), "Job materials added");
        self.event_sender
            .send_or_log(Event::JobMaterialsAdded {
                job_id,
                material_ids: added.iter().map(|row| row.material_id.clone()).collect(),
            })
            .await;
        Ok(added)
    }

    #[instrument(skip(self, scope))]
    pub async fn update_job_material_quantity(
        &self,
        scope: &OperationScope,
        request: UpdateJobMaterialQuantityRequest,
    ) -> Result<job_material::Model, ServiceError> {
        request.validate()?;
        let job_id = request.job_id;

        let uow = UnitOfWork::begin(&self.db, "update job material quantity").await?;
        let result = scope
            .guard(async {
                let existing =
                    job_material::Entity::find_by_id((job_id, request.material_id.clone()))
                        .one(uow.txn())
                        .await
                        .map_err(db_failure("load job material"))?
                        .ok_or_else(|| {
                            ServiceError::not_found(format!(
                                "Material {} is not attached to job {}",
                                request.material_id, job_id
                            ))
                        })?;

                let mut model: job_material::ActiveModel = existing.into();
                model.quantity = Set(request.quantity);
                model.updated_at = Set(Utc::now());
                model
                    .update(uow.txn())
                    .await
                    .map_err(db_failure("update job material"))
            })
            .await;
        let updated = uow.finish(result).await?;

        info!(
            %job_id,
            material_id = %updated.material_id,
            quantity = %updated.quantity,
            "Job material quantity updated"
        );
        self.event_sender
            .send_or_log(Event::JobMaterialQuantityUpdated {
                job_id,
                material_id: updated.material_id.clone(),
                quantity: updated.quantity,
            })
            .await;
        Ok(updated)
    }

    #[instrument(skip(self, scope))]
    pub async fn delete_job_material(
        &self,
        scope: &OperationScope,
        job_id: Uuid,
        material_id: &str,
    ) -> Result<(), ServiceError> {
        let uow = UnitOfWork::begin(&self.db, "delete job material").await?;
        let result = scope
            .guard(async {
                let deleted = job_material::Entity::delete_by_id((job_id, material_id.to_string()))
                    .exec(uow.txn())
                    .await
                    .map_err(db_failure("delete job material"))?;
                if deleted.rows_affected == 0 {
                    return Err(ServiceError::not_found(format!(
                        "Material {} is not attached to job {}",
                        material_id, job_id
                    )));
                }
                Ok(())
            })
            .await;
        uow.finish(result).await?;

        info!(%job_id, material_id, "Job material removed");
        self.event_sender
            .send_or_log(Event::JobMaterialRemoved {
                job_id,
                material_id: material_id.to_string(),
            })
            .await;
        Ok(())
    }

    /// Current ledger for a job. An existing job with no materials yields an empty list.
    #[instrument(skip(self, scope))]
    pub async fn get_materials_for_job(
        &self,
        scope: &OperationScope,
        job_id: Uuid,
    ) -> Result<Vec<JobMaterialLine>, ServiceError> {
        let uow = UnitOfWork::begin_snapshot(&self.db, "get materials for job").await?;
        let result = scope
            .guard(async {
                let txn = uow.txn();
                require_job(txn, job_id).await?;

                let rows = job_material::Entity::find()
                    .filter(job_material::Column::JobId.eq(job_id))
                    .find_also_related(material::Entity)
                    .order_by_asc(job_material::Column::MaterialId)
                    .all(txn)
                    .await
                    .map_err(db_failure("load job materials"))?;

                rows.into_iter()
                    .map(|(row, catalog)| {
                        let catalog = catalog.ok_or_else(|| {
                            ServiceError::InternalError(format!(
                                "ledger row references missing material {}",
                                row.material_id
                            ))
                        })?;
                        Ok(JobMaterialLine {
                            material_id: row.material_id,
                            name: catalog.name,
                            unit: catalog.unit,
                            quantity: row.quantity,
                        })
                    })
                    .collect()
            })
            .await;
        uow.finish(result).await
    }
}
