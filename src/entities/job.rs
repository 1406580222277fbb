use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub job_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::job_material::Entity")]
    JobMaterials,
    #[sea_orm(has_many = "super::boq_job::Entity")]
    BoqJobs,
}

impl Related<super::job_material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobMaterials.def()
    }
}

impl Related<super::boq_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BoqJobs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
