//! Per-variant stock, one row per entry of a product's variant map

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub product_id: String,
  #[sea_orm(primary_key, auto_increment = false)]
  pub variant: String,
  pub store_id: String,
  pub stock: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::product::Entity",
    from = "Column::ProductId",
    to = "super::product::Column::Id"
  )]
  Product,
}

impl Related<super::product::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Product.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
