use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_configs")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub store_id: String,
  pub provider: String,
  #[serde(skip_serializing)]
  pub access_token: String,
  #[serde(skip_serializing)]
  pub webhook_secret: Option<String>,
  pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::store::Entity",
    from = "Column::StoreId",
    to = "super::store::Column::Id"
  )]
  Store,
}

impl Related<super::store::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Store.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
