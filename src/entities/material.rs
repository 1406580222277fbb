use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog record for a purchasable material. `reference_price` is the estimate.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub material_id: String,
    pub name: String,
    pub unit: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub reference_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::job_material::Entity")]
    JobMaterials,
    #[sea_orm(has_many = "super::supplier_price::Entity")]
    SupplierPrices,
}

impl Related<super::job_material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobMaterials.def()
    }
}

impl Related<super::supplier_price::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SupplierPrices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
