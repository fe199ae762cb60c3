//! Quota ledger: plan limits against usage derived from live rows.

use serde::Serialize;

use crate::{
  prelude::*,
  scope::{Guard, Scope},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
  pub plan: String,
  pub product_count: u64,
  /// `None` is unlimited
  pub max_products: Option<u64>,
  pub order_count_this_month: u64,
  /// `None` is unlimited
  pub max_orders: Option<u64>,
  pub can_create_product: bool,
  pub can_create_order: bool,
}

fn allows(current: u64, max: Option<u64>) -> bool {
  max.is_none_or(|max| current < max)
}

fn limit(max: Option<i64>) -> Option<u64> {
  // a negative limit from a bad row allows nothing
  max.map(|max| u64::try_from(max).unwrap_or(0))
}

pub struct Quota<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Quota<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Standalone lookup in its own read-only unit of work.
  pub async fn usage(&self, tenant: &str) -> Option<Usage> {
    let scope = match Guard::new(self.db).enter(Some(tenant)).await {
      Ok(scope) => scope,
      Err(err) => {
        error!(store = tenant, "Usage lookup failed: {err}");
        return None;
      }
    };

    let usage = usage(&scope).await;
    if let Err(err) = scope.rollback().await {
      warn!(store = tenant, "Usage scope rollback failed: {err}");
    }
    usage
  }
}

/// Usage as seen from inside `scope`. `None` when the store has no valid
/// license or any lookup fails, so callers deny rather than allow.
pub async fn usage(scope: &Scope) -> Option<Usage> {
  match compute(scope, utils::now()).await {
    Ok(usage) => usage,
    Err(err) => {
      error!(store = ?scope.tenant(), "Usage lookup failed: {err}");
      None
    }
  }
}

async fn compute(scope: &Scope, now: DateTime) -> Result<Option<Usage>> {
  let Some(license) = scope.store().license().await? else {
    return Ok(None);
  };
  if !license.is_valid_at(now) {
    debug!(serial = %license.serial, status = ?license.status, "License not valid");
    return Ok(None);
  }

  let product_count = scope.products().count().await?;
  let order_count = scope.orders().count_since(utils::month_start(now)).await?;
  let max_products = limit(license.max_products);
  let max_orders = limit(license.max_orders);

  Ok(Some(Usage {
    plan: license.plan,
    product_count,
    max_products,
    order_count_this_month: order_count,
    max_orders,
    can_create_product: allows(product_count, max_products),
    can_create_order: allows(order_count, max_orders),
  }))
}
