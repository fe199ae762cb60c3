//! Order placement and status transitions
//!
//! Placement runs as one unit of work per order:
//! validate, resolve the store, bump the store's order sequence (which is
//! also the first write and so serializes orders per store), re-price from
//! storage, check stock, check quota, insert the order with frozen line
//! items, decrement stock conditionally, commit, then notify.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  entity::{OrderStatus, order, order_item},
  notify::{Notification, Outbox},
  prelude::*,
  scope::{Guard, Scope},
  sv::quota,
};

/// Largest quantity accepted on a single line
pub const MAX_QUANTITY: i64 = 100_000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
  #[serde(default)]
  pub customer_email: String,
  #[serde(default)]
  pub customer_name: String,
  pub customer_phone: Option<String>,
  pub shipping_address: Option<json::Value>,
  pub shipping_method: Option<String>,
  pub shipping_cost: Option<i64>,
  #[serde(default)]
  pub items: Vec<OrderLine>,
  pub payment_method: Option<String>,
  pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
  pub product_id: String,
  pub quantity: i64,
  /// Variant key
  pub size: Option<String>,
  pub color: Option<String>,
  /// Whatever the client believes the price is. Never read.
  #[serde(default, rename = "price")]
  pub client_price: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placed {
  pub order_id: String,
  pub order_number: String,
  pub total: i64,
  pub status: OrderStatus,
}

/// Outcome of a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  Unchanged,
  Applied,
}

impl NewOrder {
  fn validate(&self) -> Result<()> {
    if self.customer_email.trim().is_empty() {
      return Err(Error::IncompleteOrder("customerEmail"));
    }
    if self.customer_name.trim().is_empty() {
      return Err(Error::IncompleteOrder("customerName"));
    }
    if self.items.is_empty() {
      return Err(Error::IncompleteOrder("items"));
    }
    if self.items.iter().any(|item| item.product_id.trim().is_empty()) {
      return Err(Error::IncompleteOrder("productId"));
    }
    if self.items.iter().any(|item| !(1..=MAX_QUANTITY).contains(&item.quantity)) {
      return Err(Error::Invalid("quantity"));
    }
    if self.shipping_cost.is_some_and(|cost| cost < 0) {
      return Err(Error::Invalid("shippingCost"));
    }
    Ok(())
  }

  fn product_ids(&self) -> BTreeSet<String> {
    self.items.iter().map(|item| item.product_id.clone()).collect()
  }
}

pub struct Order<'a> {
  db: &'a DatabaseConnection,
  outbox: &'a Outbox,
}

impl<'a> Order<'a> {
  pub fn new(db: &'a DatabaseConnection, outbox: &'a Outbox) -> Self {
    Self { db, outbox }
  }

  pub async fn place(
    &self,
    tenant: Option<&str>,
    input: NewOrder,
  ) -> Result<Placed> {
    input.validate()?;

    let tenant = match tenant {
      Some(tenant) => tenant.to_string(),
      None => self.infer_tenant(&input).await?,
    };

    let scope = Guard::new(self.db).enter(Some(&tenant)).await?;
    let (order, placed) = create(&scope, input).await?;
    scope.commit().await?;

    info!(
      store = %order.store_id,
      order = %order.order_number,
      total = order.total,
      "Order placed"
    );
    self.outbox.publish(Notification::OrderPlaced {
      store_id: order.store_id,
      order_id: order.id,
      order_number: order.order_number,
      customer_email: order.customer_email,
      total: order.total,
    });
    Ok(placed)
  }

  /// Fallback for callers that do not know the store: trust the products'
  /// owners, provided they agree.
  async fn infer_tenant(&self, input: &NewOrder) -> Result<String> {
    let ids = input.product_ids();
    let owners = Guard::new(self.db)
      .bypass_tenant_scope()
      .product_owners(&ids)
      .await?;

    let stores: BTreeSet<&String> = owners.values().collect();
    let mut stores = stores.into_iter();
    match (stores.next(), stores.next()) {
      (None, _) => Err(Error::ProductsNotFound(ids.into_iter().collect())),
      (Some(_), Some(_)) => Err(Error::CrossTenantItems),
      (Some(store), None) => {
        warn!(
          store = %store,
          "Order store inferred from item products, caller supplied none"
        );
        Ok(store.clone())
      }
    }
  }

  pub async fn get(&self, tenant: &str, id: &str) -> Result<order::Model> {
    let scope = Guard::new(self.db).enter(Some(tenant)).await?;
    scope.orders().by_id(id).await?.ok_or(Error::OrderNotFound)
  }

  pub async fn items(
    &self,
    tenant: &str,
    id: &str,
  ) -> Result<Vec<order_item::Model>> {
    let scope = Guard::new(self.db).enter(Some(tenant)).await?;
    let orders = scope.orders();
    if orders.by_id(id).await?.is_none() {
      return Err(Error::OrderNotFound);
    }
    orders.items(id).await
  }

  pub async fn recent(&self, tenant: &str, limit: u64) -> Result<Vec<order::Model>> {
    let scope = Guard::new(self.db).enter(Some(tenant)).await?;
    scope.orders().recent(limit).await
  }

  /// Admin status change for one order of `tenant`.
  pub async fn set_status(
    &self,
    tenant: &str,
    id: &str,
    to: OrderStatus,
  ) -> Result<order::Model> {
    let scope = Guard::new(self.db).enter(Some(tenant)).await?;
    scope.lock().await?;

    let order = scope.orders().by_id(id).await?.ok_or(Error::OrderNotFound)?;
    if transition(&scope, &order, to).await? == Transition::Unchanged {
      return Ok(order);
    }

    let order = scope.orders().by_id(id).await?.ok_or(Error::OrderNotFound)?;
    scope.commit().await?;

    info!(store = tenant, order = %order.order_number, status = ?to, "Order status changed");
    Ok(order)
  }
}

/// Runs placement inside `scope`. Nothing is visible to other units of work
/// until the caller commits.
async fn create(scope: &Scope, input: NewOrder) -> Result<(order::Model, Placed)> {
  let tenant = scope.tenant_id()?.as_str().to_string();

  // first write of the unit of work, held until commit
  let order_number = scope.store().next_order_number().await?;

  let ids: Vec<String> = input.product_ids().into_iter().collect();
  let products: HashMap<String, _> = scope
    .products()
    .by_ids(&ids)
    .await?
    .into_iter()
    .map(|product| (product.id.clone(), product))
    .collect();

  let missing: Vec<String> =
    ids.iter().filter(|id| !products.contains_key(*id)).cloned().collect();
  if !missing.is_empty() {
    return Err(Error::ProductsNotFound(missing));
  }

  let mut variants: HashMap<(String, String), i64> = HashMap::new();
  for row in scope.products().variants_of(&ids).await? {
    variants.insert((row.product_id, row.variant), row.stock);
  }
  let tracks_variants =
    |product: &str| variants.keys().any(|(id, _)| id == product);

  // authoritative prices; client prices are ignored
  let mut subtotal: i64 = 0;
  let mut aggregate: BTreeMap<&str, i64> = BTreeMap::new();
  let mut unvariant: BTreeMap<&str, i64> = BTreeMap::new();
  let mut by_variant: BTreeMap<(&str, &str), i64> = BTreeMap::new();
  let mut lines = Vec::with_capacity(input.items.len());

  for item in &input.items {
    let product = &products[&item.product_id];
    let line = product
      .price
      .checked_mul(item.quantity)
      .ok_or(Error::Invalid("quantity"))?;
    subtotal = subtotal.checked_add(line).ok_or(Error::Invalid("quantity"))?;

    let id = product.id.as_str();
    add_quantity(aggregate.entry(id).or_default(), item.quantity)?;
    let variant = match item.size.as_deref() {
      Some(size) if tracks_variants(id) => {
        add_quantity(by_variant.entry((id, size)).or_default(), item.quantity)?;
        Some(size.to_string())
      }
      _ => {
        add_quantity(unvariant.entry(id).or_default(), item.quantity)?;
        None
      }
    };

    lines.push(order_item::ActiveModel {
      order_id: Set(String::new()),
      product_id: Set(product.id.clone()),
      product_name: Set(product.name.clone()),
      quantity: Set(item.quantity),
      unit_price: Set(product.price),
      size: Set(item.size.clone()),
      variant: Set(variant),
      color: Set(item.color.clone()),
      ..Default::default()
    });
  }

  for (&(product, variant), &qty) in &by_variant {
    let key = (product.to_string(), variant.to_string());
    if variants.get(&key).copied().unwrap_or(0) < qty {
      return Err(Error::InsufficientStock {
        product: products[product].name.clone(),
        variant: Some(variant.to_string()),
      });
    }
  }
  for (&product, &qty) in &unvariant {
    if products[product].stock < qty {
      return Err(Error::InsufficientStock {
        product: products[product].name.clone(),
        variant: None,
      });
    }
  }

  let usage = quota::usage(scope).await.ok_or(Error::NoLicense)?;
  if !usage.can_create_order {
    return Err(Error::OrderLimitExceeded {
      current: usage.order_count_this_month,
      max: usage.max_orders.unwrap_or_default(),
    });
  }

  let shipping_cost = input.shipping_cost.unwrap_or(0);
  let total = subtotal
    .checked_add(shipping_cost)
    .ok_or(Error::Invalid("shippingCost"))?;
  let now = utils::now();
  let order_id = Uuid::new_v4().to_string();

  let order = scope
    .orders()
    .insert(order::ActiveModel {
      id: Set(order_id.clone()),
      store_id: Set(tenant.clone()),
      order_number: Set(order_number),
      status: Set(OrderStatus::Pending),
      customer_email: Set(input.customer_email.trim().to_string()),
      customer_name: Set(input.customer_name.trim().to_string()),
      customer_phone: Set(input.customer_phone),
      shipping_address: Set(input.shipping_address),
      shipping_method: Set(input.shipping_method),
      payment_method: Set(input.payment_method),
      notes: Set(input.notes),
      subtotal: Set(subtotal),
      shipping_cost: Set(shipping_cost),
      total: Set(total),
      payment_status: Set(None),
      payment_provider: Set(None),
      payment_id: Set(None),
      payment_meta: Set(None),
      created_at: Set(now),
      updated_at: Set(now),
    })
    .await?;

  let lines = lines
    .into_iter()
    .map(|line| order_item::ActiveModel { order_id: Set(order_id.clone()), ..line })
    .collect();
  scope.orders().insert_items(lines).await?;

  // conditional decrements catch anything the checks above could not see
  let catalog = scope.products();
  for (&product, &qty) in &aggregate {
    if !catalog.take_stock(product, qty).await? {
      return Err(Error::InsufficientStock {
        product: products[product].name.clone(),
        variant: None,
      });
    }
  }
  for (&(product, variant), &qty) in &by_variant {
    if !catalog.take_variant_stock(product, variant, qty).await? {
      return Err(Error::InsufficientStock {
        product: products[product].name.clone(),
        variant: Some(variant.to_string()),
      });
    }
  }

  let placed = Placed {
    order_id: order.id.clone(),
    order_number: order.order_number.clone(),
    total: order.total,
    status: order.status,
  };
  Ok((order, placed))
}

fn add_quantity(total: &mut i64, qty: i64) -> Result<()> {
  *total = total.checked_add(qty).ok_or(Error::Invalid("quantity"))?;
  Ok(())
}

/// Moves `order` to `to` inside `scope`. The caller must hold the store
/// lock. Cancelling restores every line item's stock exactly once; a
/// cancelled order cannot be moved anywhere else.
pub async fn transition(
  scope: &Scope,
  order: &order::Model,
  to: OrderStatus,
) -> Result<Transition> {
  if order.status == to {
    return Ok(Transition::Unchanged);
  }
  if order.status == OrderStatus::Cancelled {
    return Err(Error::InvalidTransition { from: order.status, to });
  }

  let orders = scope.orders();
  if to != OrderStatus::Cancelled {
    if !orders.set_status(&order.id, to).await? {
      return Err(Error::InvalidTransition { from: OrderStatus::Cancelled, to });
    }
    return Ok(Transition::Applied);
  }

  if !orders.mark_cancelled(&order.id).await? {
    // another unit of work cancelled it first
    return Ok(Transition::Unchanged);
  }

  let catalog = scope.products();
  for item in orders.items(&order.id).await? {
    if !catalog.restore_stock(&item.product_id, item.quantity).await? {
      warn!(
        order = %order.order_number,
        product = %item.product_id,
        "Product gone, stock not restored"
      );
      continue;
    }
    if let Some(variant) = &item.variant {
      catalog
        .restore_variant_stock(&item.product_id, variant, item.quantity)
        .await?;
    }
  }

  Ok(Transition::Applied)
}
