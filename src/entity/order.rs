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
pub enum OrderStatus {
  #[sea_orm(string_value = "pending")]
  Pending,
  #[sea_orm(string_value = "pending_payment")]
  PendingPayment,
  #[sea_orm(string_value = "pending_capture")]
  PendingCapture,
  #[sea_orm(string_value = "paid")]
  Paid,
  #[sea_orm(string_value = "payment_failed")]
  PaymentFailed,
  #[sea_orm(string_value = "processing")]
  Processing,
  #[sea_orm(string_value = "shipped")]
  Shipped,
  #[sea_orm(string_value = "delivered")]
  Delivered,
  #[sea_orm(string_value = "cancelled")]
  Cancelled,
  #[sea_orm(string_value = "refunded")]
  Refunded,
  #[sea_orm(string_value = "disputed")]
  Disputed,
}

impl OrderStatus {
  /// Set by the merchant once the order is being fulfilled.
  pub fn is_fulfillment(self) -> bool {
    matches!(self, Self::Processing | Self::Shipped | Self::Delivered)
  }

  /// Reported by the payment provider before settlement.
  pub fn is_payment(self) -> bool {
    matches!(
      self,
      Self::Pending
        | Self::PendingPayment
        | Self::PendingCapture
        | Self::Paid
        | Self::PaymentFailed
    )
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub store_id: String,
  #[sea_orm(unique)]
  pub order_number: String,
  pub status: OrderStatus,
  pub customer_email: String,
  pub customer_name: String,
  pub customer_phone: Option<String>,
  pub shipping_address: Option<Json>,
  pub shipping_method: Option<String>,
  pub payment_method: Option<String>,
  pub notes: Option<String>,
  pub subtotal: i64,
  pub shipping_cost: i64,
  pub total: i64,
  /// Raw status last reported by the payment provider
  pub payment_status: Option<String>,
  pub payment_provider: Option<String>,
  pub payment_id: Option<String>,
  pub payment_meta: Option<Json>,
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
  #[sea_orm(has_many = "super::order_item::Entity")]
  Items,
}

impl Related<super::store::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Store.def()
  }
}

impl Related<super::order_item::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Items.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
