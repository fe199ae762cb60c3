//! Order line items. Price and name are frozen at order time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub store_id: String,
  pub order_id: String,
  pub product_id: String,
  pub product_name: String,
  pub quantity: i64,
  pub unit_price: i64,
  /// Size as ordered
  pub size: Option<String>,
  /// Variant whose stock was taken, if any
  pub variant: Option<String>,
  pub color: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::order::Entity",
    from = "Column::OrderId",
    to = "super::order::Column::Id"
  )]
  Order,
}

impl Related<super::order::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Order.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
