use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{db_failure, translate_write_error, validate_not_blank};
use crate::{
    db::{OperationScope, UnitOfWork},
    entities::{boq_job, job, job_material},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 32), custom = "validate_not_blank")]
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateJobRequest {
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 32), custom = "validate_not_blank")]
    pub unit: String,
}

/// A job definition together with its per-unit material ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: job::Model,
    pub materials: Vec<job_material::Model>,
}

/// Catalog of reusable work items.
#[derive(Clone)]
pub struct JobService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl JobService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, scope))]
    pub async fn create_job(
        &self,
        scope: &OperationScope,
        request: CreateJobRequest,
    ) -> Result<job::Model, ServiceError> {
        request.validate()?;

        let uow = UnitOfWork::begin(&self.db, "create job").await?;
        let result = scope
            .guard(async {
                let now = Utc::now();
                job::ActiveModel {
                    job_id: Set(Uuid::new_v4()),
                    name: Set(request.name.clone()),
                    description: Set(request.description.clone()),
                    unit: Set(request.unit.clone()),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(uow.txn())
                .await
                .map_err(db_failure("create job"))
            })
            .await;
        let created = uow.finish(result).await?;

        info!(job_id = %created.job_id, name = %created.name, "Job created");
        self.event_sender
            .send_or_log(Event::JobCreated {
                job_id: created.job_id,
            })
            .await;
        Ok(created)
    }

    #[instrument(skip(self, scope))]
    pub async fn update_job(
        &self,
        scope: &OperationScope,
        job_id: Uuid,
        request: UpdateJobRequest,
    ) -> Result<job::Model, ServiceError> {
        request.validate()?;

        let uow = UnitOfWork::begin(&self.db, "update job").await?;
        let result = scope
            .guard(async {
                let existing = job::Entity::find_by_id(job_id)
                    .one(uow.txn())
                    .await
                    .map_err(db_failure("load job"))?
                    .ok_or_else(|| ServiceError::not_found(format!("Job {} not found", job_id)))?;

                let mut model: job::ActiveModel = existing.into();
                model.name = Set(request.name.clone());
                model.description = Set(request.description.clone());
                model.unit = Set(request.unit.clone());
                model.updated_at = Set(Utc::now());
                model.update(uow.txn()).await.map_err(db_failure("update job"))
            })
            .await;
        let updated = uow.finish(result).await?;

        info!(job_id = %updated.job_id, "Job updated");
        self.event_sender
            .send_or_log(Event::JobUpdated { job_id })
            .await;
        Ok(updated)
    }

    /// Loads a job and its ledger from one snapshot.
    #[instrument(skip(self, scope))]
    pub async fn get_job(
        &self,
        scope: &OperationScope,
        job_id: Uuid,
    ) -> Result<JobDetail, ServiceError> {
        let uow = UnitOfWork::begin_snapshot(&self.db, "get job").await?;
        let result = scope
            .guard(async {
                let job = job::Entity::find_by_id(job_id)
                    .one(uow.txn())
                    .await
                    .map_err(db_failure("load job"))?
                    .ok_or_else(|| ServiceError::not_found(format!("Job {} not found", job_id)))?;
                let materials = job_material::Entity::find()
                    .filter(job_material::Column::JobId.eq(job_id))
                    .order_by_asc(job_material::Column::MaterialId)
                    .all(uow.txn())
                    .await
                    .map_err(db_failure("load job materials"))?;
                Ok(JobDetail { job, materials })
            })
            .await;
        uow.finish(result).await
    }

    #[instrument(skip(self, scope))]
    pub async fn list_jobs(&self, scope: &OperationScope) -> Result<Vec<job::Model>, ServiceError> {
        scope
            .guard(async {
                job::Entity::find()
                    .order_by_asc(job::Column::Name)
                    .order_by_asc(job::Column::JobId)
                    .all(&*self.db)
                    .await
                    .map_err(db_failure("list jobs"))
            })
            .await
    }

    /// Deletes a job and its ledger rows. A job still attached to a project is a conflict.
    #[instrument(skip(self, scope))]
    pub async fn delete_job(&self, scope: &OperationScope, job_id: Uuid) -> Result<(), ServiceError> {
        let uow = UnitOfWork::begin(&self.db, "delete job").await?;
        let result = scope
            .guard(async {
                let txn = uow.txn();
                job::Entity::find_by_id(job_id)
                    .one(txn)
                    .await
                    .map_err(db_failure("load job"))?
                    .ok_or_else(|| ServiceError::not_found(format!("Job {} not found", job_id)))?;

                let attached = boq_job::Entity::find()
                    .filter(boq_job::Column::JobId.eq(job_id))
                    .count(txn)
                    .await
                    .map_err(db_failure("count project references"))?;
                if attached > 0 {
                    return Err(ServiceError::conflict(format!(
                        "Job {} is attached to {} project(s)",
                        job_id, attached
                    )));
                }

                job_material::Entity::delete_many()
                    .filter(job_material::Column::JobId.eq(job_id))
                    .exec(txn)
                    .await
                    .map_err(db_failure("delete job materials"))?;

                job::Entity::delete_by_id(job_id).exec(txn).await.map_err(|e| {
                    translate_write_error(
                        "delete job",
                        e,
                        || ServiceError::InternalError("unexpected unique violation".into()),
                        || ServiceError::conflict(format!("Job {} is still referenced", job_id)),
                    )
                })?;
                Ok(())
            })
            .await;
        uow.finish(result).await?;

        info!(%job_id, "Job deleted");
        self.event_sender
            .send_or_log(Event::JobDeleted { job_id })
            .await;
        Ok(())
    }
}
