use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use super::{db_failure, translate_write_error, validate_non_negative_decimal, validate_not_blank};
use crate::{
    db::{OperationScope, UnitOfWork},
    entities::{job_material, material},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMaterialRequest {
    #[validate(length(min = 1, max = 64), custom = "validate_not_blank")]
    pub material_id: String,
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub name: String,
    #[validate(length(min = 1, max = 32), custom = "validate_not_blank")]
    pub unit: String,
    #[validate(custom = "validate_non_negative_decimal")]
    pub reference_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateMaterialRequest {
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub name: String,
    #[validate(length(min = 1, max = 32), custom = "validate_not_blank")]
    pub unit: String,
    #[validate(custom = "validate_non_negative_decimal")]
    pub reference_price: Decimal,
}

/// Material catalog: master records and their reference (estimated) prices.
#[derive(Clone)]
pub struct MaterialService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl MaterialService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a material; an existing id is a conflict.
    #[instrument(skip(self, scope))]
    pub async fn create_material(
        &self,
        scope: &OperationScope,
        request: CreateMaterialRequest,
    ) -> Result<material::Model, ServiceError> {
        request.validate()?;
        let material_id = request.material_id.trim().to_string();

        let uow = UnitOfWork::begin(&self.db, "create material").await?;
        let result = scope
            .guard(async {
                let now = Utc::now();
                let model = material::ActiveModel {
                    material_id: Set(material_id.clone()),
                    name: Set(request.name.clone()),
                    unit: Set(request.unit.clone()),
                    reference_price: Set(request.reference_price),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                model.insert(uow.txn()).await.map_err(|e| {
                    translate_write_error(
                        "create material",
                        e,
                        || ServiceError::conflict(format!("Material {} already exists", material_id)),
                        || ServiceError::InternalError("unexpected foreign key on materials".into()),
                    )
                })
            })
            .await;
        let created = uow.finish(result).await?;

        info!(material_id = %created.material_id, "Material created");
        self.event_sender
            .send_or_log(Event::MaterialCreated {
                material_id: created.material_id.clone(),
            })
            .await;
        Ok(created)
    }

    #[instrument(skip(self, scope))]
    pub async fn update_material(
        &self,
        scope: &OperationScope,
        material_id: &str,
        request: UpdateMaterialRequest,
    ) -> Result<material::Model, ServiceError> {
        request.validate()?;

        let uow = UnitOfWork::begin(&self.db, "update material").await?;
        let result = scope
            .guard(async {
                let existing = material::Entity::find_by_id(material_id.to_string())
                    .one(uow.txn())
                    .await
                    .map_err(db_failure("load material"))?
                    .ok_or_else(|| {
                        ServiceError::not_found(format!("Material {} not found", material_id))
                    })?;

                let mut model: material::ActiveModel = existing.into();
                model.name = Set(request.name.clone());
                model.unit = Set(request.unit.clone());
                model.reference_price = Set(request.reference_price);
                model.updated_at = Set(Utc::now());
                model
                    .update(uow.txn())
                    .await
                    .map_err(db_failure("update material"))
            })
            .await;
        let updated = uow.finish(result).await?;

        info!(material_id = %updated.material_id, "Material updated");
        self.event_sender
            .send_or_log(Event::MaterialUpdated {
                material_id: updated.material_id.clone(),
            })
            .await;
        Ok(updated)
    }

    #[instrument(skip(self, scope))]
    pub async fn get_material(
        &self,
        scope: &OperationScope,
        material_id: &str,
    ) -> Result<material::Model, ServiceError> {
        scope
            .guard(async {
                material::Entity::find_by_id(material_id.to_string())
                    .one(&*self.db)
                    .await
                    .map_err(db_failure("load material"))?
                    .ok_or_else(|| {
                        ServiceError::not_found(format!("Material {} not found", material_id))
                    })
            })
            .await
    }

    #[instrument(skip(self, scope))]
    pub async fn list_materials(
        &self,
        scope: &OperationScope,
    ) -> Result<Vec<material::Model>, ServiceError> {
        scope
            .guard(async {
                material::Entity::find()
                    .order_by_asc(material::Column::MaterialId)
                    .all(&*self.db)
                    .await
                    .map_err(db_failure("list materials"))
            })
            .await
    }

    /// Deletes a material that no job references.
    ///
    /// The reference count and the delete share one transaction; the
    /// restricting foreign key catches a reference added concurrently.
    #[instrument(skip(self, scope))]
    pub async fn delete_material(
        &self,
        scope: &OperationScope,
        material_id: &str,
    ) -> Result<(), ServiceError> {
        let uow = UnitOfWork::begin(&self.db, "delete material").await?;
        let result = scope
            .guard(async {
                let txn = uow.txn();
                material::Entity::find_by_id(material_id.to_string())
                    .one(txn)
                    .await
                    .map_err(db_failure("load material"))?
                    .ok_or_else(|| {
                        ServiceError::not_found(format!("Material {} not found", material_id))
                    })?;

                let references = job_material::Entity::find()
                    .filter(job_material::Column::MaterialId.eq(material_id))
                    .count(txn)
                    .await
                    .map_err(db_failure("count material references"))?;
                if references > 0 {
                    return Err(ServiceError::conflict(format!(
                        "Material {} is used by {} job(s)",
                        material_id, references
                    )));
                }

                material::Entity::delete_by_id(material_id.to_string())
                    .exec(txn)
                    .await
                    .map_err(|e| {
                        translate_write_error(
                            "delete material",
                            e,
                            || ServiceError::InternalError("unexpected unique violation".into()),
                            || {
                                ServiceError::conflict(format!(
                                    "Material {} is still referenced",
                                    material_id
                                ))
                            },
                        )
                    })?;
                Ok(())
            })
            .await;
        uow.finish(result).await?;

        info!(material_id, "Material deleted");
        self.event_sender
            .send_or_log(Event::MaterialDeleted {
                material_id: material_id.to_string(),
            })
            .await;
        Ok(())
    }
}
