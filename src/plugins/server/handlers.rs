use std::sync::Arc;

use axum::{
  Json,
  body::Bytes,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};

use crate::{
  entity::{OrderStatus, order, order_item, product},
  payments::Signed,
  prelude::*,
  scope::{NewProduct, ProductChanges},
  state::AppState,
  sv::{Listing, NewOrder, Placed, Usage, WebhookAck},
};

#[derive(Debug, Serialize)]
pub struct Res<T> {
  pub success: bool,
  pub data: T,
}

pub fn ok<T>(data: T) -> Json<Res<T>> {
  Json(Res { success: true, data })
}

pub async fn health() -> &'static str {
  "OK"
}

pub async fn product(
  State(app): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<Res<Listing>>> {
  Ok(ok(app.sv().catalog.get(None, &id).await?))
}

pub async fn products(
  State(app): State<Arc<AppState>>,
  Path(store): Path<String>,
) -> Result<Json<Res<Vec<product::Model>>>> {
  Ok(ok(app.sv().catalog.list(&store).await?))
}

pub async fn create_product(
  State(app): State<Arc<AppState>>,
  Path(store): Path<String>,
  Json(req): Json<NewProduct>,
) -> Result<(StatusCode, Json<Res<product::Model>>)> {
  let product = app.sv().catalog.create(&store, req).await?;
  Ok((StatusCode::CREATED, ok(product)))
}

pub async fn update_product(
  State(app): State<Arc<AppState>>,
  Path((store, id)): Path<(String, String)>,
  Json(req): Json<ProductChanges>,
) -> Result<Json<Res<product::Model>>> {
  Ok(ok(app.sv().catalog.update(&store, &id, req).await?))
}

pub async fn delete_product(
  State(app): State<Arc<AppState>>,
  Path((store, id)): Path<(String, String)>,
) -> Result<StatusCode> {
  app.sv().catalog.delete(&store, &id).await?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn usage(
  State(app): State<Arc<AppState>>,
  Path(store): Path<String>,
) -> Result<Json<Res<Usage>>> {
  app.sv().quota.usage(&store).await.map(ok).ok_or(Error::NoLicense)
}

pub async fn place_order(
  State(app): State<Arc<AppState>>,
  Path(store): Path<String>,
  Json(req): Json<NewOrder>,
) -> Result<(StatusCode, Json<Res<Placed>>)> {
  let placed = app.sv().order.place(Some(&store), req).await?;
  Ok((StatusCode::CREATED, ok(placed)))
}

/// Storefront checkout without a store id; the store is taken from the
/// products ordered.
pub async fn place_order_inferred(
  State(app): State<Arc<AppState>>,
  Json(req): Json<NewOrder>,
) -> Result<(StatusCode, Json<Res<Placed>>)> {
  let placed = app.sv().order.place(None, req).await?;
  Ok((StatusCode::CREATED, ok(placed)))
}

pub async fn order(
  State(app): State<Arc<AppState>>,
  Path((store, id)): Path<(String, String)>,
) -> Result<Json<Res<order::Model>>> {
  Ok(ok(app.sv().order.get(&store, &id).await?))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
  pub limit: Option<u64>,
}

pub async fn orders(
  State(app): State<Arc<AppState>>,
  Path(store): Path<String>,
  Query(query): Query<RecentQuery>,
) -> Result<Json<Res<Vec<order::Model>>>> {
  let limit = query.limit.unwrap_or(50).clamp(1, 200);
  Ok(ok(app.sv().order.recent(&store, limit).await?))
}

pub async fn order_items(
  State(app): State<Arc<AppState>>,
  Path((store, id)): Path<(String, String)>,
) -> Result<Json<Res<Vec<order_item::Model>>>> {
  Ok(ok(app.sv().order.items(&store, &id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusReq {
  pub status: OrderStatus,
}

pub async fn set_order_status(
  State(app): State<Arc<AppState>>,
  Path((store, id)): Path<(String, String)>,
  Json(req): Json<StatusReq>,
) -> Result<Json<Res<order::Model>>> {
  Ok(ok(app.sv().order.set_status(&store, &id, req.status).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfigReq {
  pub access_token: String,
  pub webhook_secret: Option<String>,
}

pub async fn set_payment_config(
  State(app): State<Arc<AppState>>,
  Path(store): Path<String>,
  Json(req): Json<PaymentConfigReq>,
) -> Result<StatusCode> {
  app
    .sv()
    .payments
    .configure(&store, req.access_token, req.webhook_secret)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
  pub store: Option<String>,
}

pub async fn payment_webhook(
  State(app): State<Arc<AppState>>,
  Query(query): Query<WebhookQuery>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Json<WebhookAck>> {
  let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
  let signed = Signed {
    signature: header("x-signature"),
    request_id: header("x-request-id"),
  };

  let ack = app
    .sv()
    .payments
    .reconcile(query.store.as_deref(), &signed, &body)
    .await?;
  Ok(Json(ack))
}
