use sea_orm::sea_query::Expr;

use super::Scope;
use crate::{
  entity::{OrderStatus, order, order_item},
  prelude::*,
};

/// Payment facts reported by the provider, stored verbatim on the order.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
  pub provider: String,
  pub payment_id: String,
  pub status: String,
  pub meta: json::Value,
}

pub struct Orders<'s> {
  scope: &'s Scope,
}

impl<'s> Orders<'s> {
  pub(super) fn new(scope: &'s Scope) -> Self {
    Self { scope }
  }

  pub async fn by_id(&self, id: &str) -> Result<Option<order::Model>> {
    let query = order::Entity::find_by_id(id);
    Ok(
      self
        .scope
        .visible(query, order::Column::StoreId)
        .one(self.scope.conn())
        .await?,
    )
  }

  /// Newest first.
  pub async fn recent(&self, limit: u64) -> Result<Vec<order::Model>> {
    let query =
      order::Entity::find().order_by_desc(order::Column::CreatedAt);
    let orders = self
      .scope
      .owned(query, order::Column::StoreId)?
      .paginate(self.scope.conn(), limit.max(1))
      .fetch_page(0)
      .await?;
    Ok(orders)
  }

  /// Orders created at or after `start`.
  pub async fn count_since(&self, start: DateTime) -> Result<u64> {
    let query =
      order::Entity::find().filter(order::Column::CreatedAt.gte(start));
    Ok(
      self
        .scope
        .owned(query, order::Column::StoreId)?
        .count(self.scope.conn())
        .await?,
    )
  }

  /// Inserts the order under this scope's tenant, whatever `store_id` the
  /// model carries.
  pub async fn insert(&self, order: order::ActiveModel) -> Result<order::Model> {
    let tenant = self.scope.tenant_id()?;
    let order = order::ActiveModel {
      store_id: Set(tenant.as_str().to_string()),
      ..order
    };
    Ok(order.insert(self.scope.conn()).await?)
  }

  pub async fn insert_items(
    &self,
    items: Vec<order_item::ActiveModel>,
  ) -> Result<()> {
    if items.is_empty() {
      return Ok(());
    }

    let tenant = self.scope.tenant_id()?;
    let items = items.into_iter().map(|item| order_item::ActiveModel {
      store_id: Set(tenant.as_str().to_string()),
      ..item
    });
    order_item::Entity::insert_many(items).exec(self.scope.conn()).await?;
    Ok(())
  }

  pub async fn items(&self, order_id: &str) -> Result<Vec<order_item::Model>> {
    let query = order_item::Entity::find()
      .filter(order_item::Column::OrderId.eq(order_id))
      .order_by_asc(order_item::Column::Id);
    Ok(
      self
        .scope
        .visible(query, order_item::Column::StoreId)
        .all(self.scope.conn())
        .await?,
    )
  }

  /// Moves a non-cancelled order to `status`. Returns `false` when the
  /// order is missing or already cancelled, so a cancellation can be won
  /// by exactly one caller.
  pub async fn set_status(&self, id: &str, status: OrderStatus) -> Result<bool> {
    let query = order::Entity::update_many()
      .col_expr(order::Column::Status, Expr::value(status))
      .col_expr(order::Column::UpdatedAt, Expr::value(utils::now()))
      .filter(order::Column::Id.eq(id))
      .filter(order::Column::Status.ne(OrderStatus::Cancelled));
    let res = self
      .scope
      .owned(query, order::Column::StoreId)?
      .exec(self.scope.conn())
      .await?;
    Ok(res.rows_affected == 1)
  }

  pub async fn mark_cancelled(&self, id: &str) -> Result<bool> {
    self.set_status(id, OrderStatus::Cancelled).await
  }

  /// Overwrites the payment fields with the latest provider report.
  pub async fn record_payment(
    &self,
    id: &str,
    record: PaymentRecord,
  ) -> Result<bool> {
    let query = order::Entity::update_many()
      .col_expr(order::Column::PaymentProvider, Expr::value(record.provider))
      .col_expr(order::Column::PaymentId, Expr::value(record.payment_id))
      .col_expr(order::Column::PaymentStatus, Expr::value(record.status))
      .col_expr(order::Column::PaymentMeta, Expr::value(record.meta))
      .col_expr(order::Column::UpdatedAt, Expr::value(utils::now()))
      .filter(order::Column::Id.eq(id));
    let res = self
      .scope
      .owned(query, order::Column::StoreId)?
      .exec(self.scope.conn())
      .await?;
    Ok(res.rows_affected == 1)
  }
}
