use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
  Clone,
  Copy,
  Debug,
  PartialEq,
  Eq,
  EnumIter,
  DeriveActiveEnum,
  Serialize,
  Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum StoreStatus {
  #[sea_orm(string_value = "pending")]
  Pending,
  #[sea_orm(string_value = "active")]
  Active,
  #[sea_orm(string_value = "suspended")]
  Suspended,
  #[sea_orm(string_value = "deleted")]
  Deleted,
}

/// A tenant. Rows are never hard-deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub name: String,
  /// Order number prefix, unique across stores
  #[sea_orm(unique)]
  pub code: String,
  pub status: StoreStatus,
  pub plan: Option<String>,
  pub license_serial: Option<String>,
  /// Last issued order sequence number
  pub order_seq: i64,
  pub created_at: DateTime,
  pub deleted_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::product::Entity")]
  Products,
  #[sea_orm(has_many = "super::order::Entity")]
  Orders,
}

impl Related<super::product::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Products.def()
  }
}

impl Related<super::order::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Orders.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
