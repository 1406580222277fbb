use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{db_failure, translate_write_error, validate_not_blank};
use crate::{
    db::{OperationScope, UnitOfWork},
    entities::{boq_job, client, project},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub client_id: Option<Uuid>,
}

/// Replaces a project's editable fields; status and creation time are kept.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub client_id: Option<Uuid>,
}

/// A project together with the client it belongs to, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectWithClient {
    #[serde(flatten)]
    pub project: project::Model,
    pub client: Option<client::Model>,
}

fn client_not_found(client_id: Option<Uuid>) -> ServiceError {
    ServiceError::not_found(format!(
        "Client {} not found",
        client_id.unwrap_or_default()
    ))
}

/// Minimal project records; BOQ lines hang off these.
#[derive(Clone)]
pub struct ProjectService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ProjectService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, scope))]
    pub async fn create_project(
        &self,
        scope: &OperationScope,
        request: CreateProjectRequest,
    ) -> Result<project::Model, ServiceError> {
        request.validate()?;

        let uow = UnitOfWork::begin(&self.db, "create project").await?;
        let result = scope
            .guard(async {
                project::ActiveModel {
                    project_id: Set(Uuid::new_v4()),
                    name: Set(request.name.clone()),
                    description: Set(request.description.clone()),
                    address: Set(request.address.clone()),
                    status: Set(project::STATUS_PLANNING.to_string()),
                    client_id: Set(request.client_id),
                    created_at: Set(Utc::now()),
                    updated_at: Set(None),
                }
                .insert(uow.txn())
                .await
                .map_err(|e| {
                    translate_write_error(
                        "create project",
                        e,
                        || ServiceError::InternalError("unexpected unique violation".into()),
                        || client_not_found(request.client_id),
                    )
                })
            })
            .await;
        let created = uow.finish(result).await?;

        info!(project_id = %created.project_id, "Project created");
        self.event_sender
            .send_or_log(Event::ProjectCreated {
                project_id: created.project_id,
            })
            .await;
        Ok(created)
    }

    #[instrument(skip(self, scope))]
    pub async fn get_project(
        &self,
        scope: &OperationScope,
        project_id: Uuid,
    ) -> Result<project::Model, ServiceError> {
        scope
            .guard(async {
                project::Entity::find_by_id(project_id)
                    .one(&*self.db)
                    .await
                    .map_err(db_failure("load project"))?
                    .ok_or_else(|| {
                        ServiceError::not_found(format!("Project {} not found", project_id))
                    })
            })
            .await
    }

    #[instrument(skip(self, scope))]
    pub async fn update_project(
        &self,
        scope: &OperationScope,
        project_id: Uuid,
        request: UpdateProjectRequest,
    ) -> Result<project::Model, ServiceError> {
        request.validate()?;

        let uow = UnitOfWork::begin(&self.db, "update project").await?;
        let result = scope
            .guard(async {
                let existing = project::Entity::find_by_id(project_id)
                    .one(uow.txn())
                    .await
                    .map_err(db_failure("load project"))?
                    .ok_or_else(|| {
                        ServiceError::not_found(format!("Project {} not found", project_id))
                    })?;

                let mut model: project::ActiveModel = existing.into();
                model.name = Set(request.name.clone());
                model.description = Set(request.description.clone());
                model.address = Set(request.address.clone());
                model.client_id = Set(request.client_id);
                model.updated_at = Set(Some(Utc::now()));
                model.update(uow.txn()).await.map_err(|e| {
                    translate_write_error(
                        "update project",
                        e,
                        || ServiceError::InternalError("unexpected unique violation".into()),
                        || client_not_found(request.client_id),
                    )
                })
            })
            .await;
        let updated = uow.finish(result).await?;

        info!(%project_id, "Project updated");
        self.event_sender
            .send_or_log(Event::ProjectUpdated { project_id })
            .await;
        Ok(updated)
    }

    /// Deletes a project and every BOQ line attached to it.
    ///
    /// Jobs and their ledgers are shared catalog data and stay untouched.
    #[instrument(skip(self, scope))]
    pub async fn delete_project(
        &self,
        scope: &OperationScope,
        project_id: Uuid,
    ) -> Result<(), ServiceError> {
        let uow = UnitOfWork::begin(&self.db, "delete project").await?;
        let result = scope
            .guard(async {
                let txn = uow.txn();
                let removed_lines = boq_job::Entity::delete_many()
                    .filter(boq_job::Column::ProjectId.eq(project_id))
                    .exec(txn)
                    .await
                    .map_err(db_failure("delete boq jobs"))?
                    .rows_affected;

                let deleted = project::Entity::delete_by_id(project_id)
                    .exec(txn)
                    .await
                    .map_err(db_failure("delete project"))?;
                if deleted.rows_affected == 0 {
                    return Err(ServiceError::not_found(format!(
                        "Project {} not found",
                        project_id
                    )));
                }
                Ok(removed_lines)
            })
            .await;
        let removed_lines = uow.finish(result).await?;

        info!(%project_id, removed_lines, "Project deleted");
        self.event_sender
            .send_or_log(Event::ProjectDeleted { project_id })
            .await;
        Ok(())
    }

    /// Loads a project and its client in one query.
    #[instrument(skip(self, scope))]
    pub async fn get_project_with_client(
        &self,
        scope: &OperationScope,
        project_id: Uuid,
    ) -> Result<ProjectWithClient, ServiceError> {
        scope
            .guard(async {
                let (project, client) = project::Entity::find_by_id(project_id)
                    .find_also_related(client::Entity)
                    .one(&*self.db)
                    .await
                    .map_err(db_failure("load project with client"))?
                    .ok_or_else(|| {
                        ServiceError::not_found(format!("Project {} not found", project_id))
                    })?;
                Ok(ProjectWithClient { project, client })
            })
            .await
    }

    #[instrument(skip(self, scope))]
    pub async fn list_projects(
        &self,
        scope: &OperationScope,
    ) -> Result<Vec<project::Model>, ServiceError> {
        scope
            .guard(async {
                project::Entity::find()
                    .order_by_desc(project::Column::CreatedAt)
                    .order_by_asc(project::Column::ProjectId)
                    .all(&*self.db)
                    .await
                    .map_err(db_failure("list projects"))
            })
            .await
    }
}
