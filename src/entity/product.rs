use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub store_id: String,
  pub name: String,
  /// Minor currency units
  pub price: i64,
  pub stock: i64,
  pub created_at: DateTime,
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
  #[sea_orm(has_many = "super::variant::Entity")]
  Variants,
}

impl Related<super::store::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Store.def()
  }
}

impl Related<super::variant::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Variants.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
