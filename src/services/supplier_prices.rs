use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use super::{db_failure, translate_write_error, validate_non_negative_decimal, validate_not_blank};
use crate::{
    db::{OperationScope, UnitOfWork},
    entities::{material, supplier_price},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordSupplierPriceRequest {
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub supplier_name: String,
    #[validate(custom = "validate_non_negative_decimal")]
    pub price: Decimal,
    /// Defaults to the time of recording.
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
}

/// Append-only history of observed supplier purchase prices.
#[derive(Clone)]
pub struct SupplierPriceService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl SupplierPriceService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, scope))]
    pub async fn record_supplier_price(
        &self,
        scope: &OperationScope,
        material_id: &str,
        request: RecordSupplierPriceRequest,
    ) -> Result<supplier_price::Model, ServiceError> {
        request.validate()?;

        let uow = UnitOfWork::begin(&self.db, "record supplier price").await?;
        let result = scope
            .guard(async {
                let missing =
                    || ServiceError::not_found(format!("Material {} not found", material_id));

                material::Entity::find_by_id(material_id.to_string())
                    .one(uow.txn())
                    .await
                    .map_err(db_failure("load material"))?
                    .ok_or_else(missing)?;

                let now = Utc::now();
                let model = supplier_price::ActiveModel {
                    id: NotSet,
                    material_id: Set(material_id.to_string()),
                    supplier_name: Set(request.supplier_name.trim().to_string()),
                    price: Set(request.price),
                    observed_at: Set(request.observed_at.unwrap_or(now)),
                    created_at: Set(now),
                };
                model.insert(uow.txn()).await.map_err(|e| {
                    translate_write_error(
                        "insert supplier price",
                        e,
                        || ServiceError::InternalError("unexpected unique violation".into()),
                        missing,
                    )
                })
            })
            .await;
        let recorded = uow.finish(result).await?;

        info!(
            material_id = %recorded.material_id,
            supplier = %recorded.supplier_name,
            price = %recorded.price,
            "Supplier price recorded"
        );
        self.event_sender
            .send_or_log(Event::SupplierPriceRecorded {
                material_id: recorded.material_id.clone(),
                supplier_name: recorded.supplier_name.clone(),
                price: recorded.price,
                observed_at: recorded.observed_at,
            })
            .await;
        Ok(recorded)
    }

    /// Price history for a material, oldest observation first.
    #[instrument(skip(self, scope))]
    pub async fn list_supplier_prices(
        &self,
        scope: &OperationScope,
        material_id: &str,
    ) -> Result<Vec<supplier_price::Model>, ServiceError> {
        let uow = UnitOfWork::begin_snapshot(&self.db, "list supplier prices").await?;
        let result = scope
            .guard(async {
                material::Entity::find_by_id(material_id.to_string())
                    .one(uow.txn())
                    .await
                    .map_err(db_failure("load material"))?
                    .ok_or_else(|| {
                        ServiceError::not_found(format!("Material {} not found", material_id))
                    })?;

                let mut rows = supplier_price::Entity::find()
                    .filter(supplier_price::Column::MaterialId.eq(material_id))
                    .order_by_asc(supplier_price::Column::ObservedAt)
                    .order_by_asc(supplier_price::Column::Id)
                    .all(uow.txn())
                    .await
                    .map_err(db_failure("list supplier prices"))?;
                rows.sort_by_key(|row| (row.observed_at, row.id));
                Ok(rows)
            })
            .await;
        uow.finish(result).await
    }
}
