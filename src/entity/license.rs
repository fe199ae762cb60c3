//! License entity - plan limits bound to at most one store

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
pub enum LicenseStatus {
  #[sea_orm(string_value = "generated")]
  Generated,
  #[sea_orm(string_value = "activated")]
  Activated,
  #[sea_orm(string_value = "suspended")]
  Suspended,
  #[sea_orm(string_value = "revoked")]
  Revoked,
  #[sea_orm(string_value = "expired")]
  Expired,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "licenses")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub serial: String,
  pub plan: String,
  pub status: LicenseStatus,
  /// `None` is a lifetime license
  pub expires_at: Option<DateTime>,
  /// `None` is unlimited
  pub max_products: Option<i64>,
  /// `None` is unlimited
  pub max_orders: Option<i64>,
  pub store_id: Option<String>,
  pub created_at: DateTime,
  pub activated_at: Option<DateTime>,
}

impl Model {
  pub fn is_valid_at(&self, now: DateTime) -> bool {
    self.status == LicenseStatus::Activated
      && self.expires_at.is_none_or(|exp| exp > now)
  }
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
