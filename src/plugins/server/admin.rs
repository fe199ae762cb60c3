//! Operator routes: store provisioning and the license lifecycle.

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{Path, Request, State},
  http::{HeaderMap, StatusCode},
  middleware::{self, Next},
  response::Response,
  routing::{get, patch, post},
};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use super::handlers::{Res, ok};
use crate::{
  entity::{StoreStatus, license, store},
  prelude::*,
  state::AppState,
  sv::NewLicense,
};

pub fn router(app: Arc<AppState>) -> Router<Arc<AppState>> {
  Router::new()
    .route("/stores", post(provision_store))
    .route("/stores/{store}", get(get_store).delete(delete_store))
    .route("/stores/{store}/status", patch(set_store_status))
    .route("/licenses", post(generate_license))
    .route("/licenses/{serial}", get(get_license))
    .route("/licenses/{serial}/activate", post(activate_license))
    .route("/licenses/{serial}/renew", post(renew_license))
    .route("/licenses/{serial}/suspend", post(suspend_license))
    .route("/licenses/{serial}/resume", post(resume_license))
    .route("/licenses/{serial}/revoke", post(revoke_license))
    .layer(middleware::from_fn_with_state(app, admin_auth))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get("authorization")
    .and_then(|v| v.to_str().ok())
    .and_then(|s| s.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|s| !s.is_empty())
}

pub async fn admin_auth(
  State(app): State<Arc<AppState>>,
  request: Request,
  next: Next,
) -> Result<Response, StatusCode> {
  let Some(expected) = app.config.admin_token.as_deref() else {
    warn!("Admin request refused, ADMIN_TOKEN is not set");
    return Err(StatusCode::UNAUTHORIZED);
  };
  let token = bearer_token(request.headers()).ok_or(StatusCode::UNAUTHORIZED)?;
  if !bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
    return Err(StatusCode::UNAUTHORIZED);
  }
  Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct ProvisionReq {
  pub name: String,
}

async fn provision_store(
  State(app): State<Arc<AppState>>,
  Json(req): Json<ProvisionReq>,
) -> Result<(StatusCode, Json<Res<store::Model>>)> {
  let store = app.sv().store.provision(&req.name).await?;
  Ok((StatusCode::CREATED, ok(store)))
}

async fn get_store(
  State(app): State<Arc<AppState>>,
  Path(store): Path<String>,
) -> Result<Json<Res<store::Model>>> {
  let store = app.sv().store.by_id(&store).await?.ok_or(Error::TenantNotFound)?;
  Ok(ok(store))
}

#[derive(Debug, Deserialize)]
pub struct StoreStatusReq {
  pub status: StoreStatus,
}

async fn set_store_status(
  State(app): State<Arc<AppState>>,
  Path(store): Path<String>,
  Json(req): Json<StoreStatusReq>,
) -> Result<Json<Res<store::Model>>> {
  Ok(ok(app.sv().store.set_status(&store, req.status).await?))
}

async fn delete_store(
  State(app): State<Arc<AppState>>,
  Path(store): Path<String>,
) -> Result<Json<Res<store::Model>>> {
  Ok(ok(app.sv().store.soft_delete(&store).await?))
}

async fn generate_license(
  State(app): State<Arc<AppState>>,
  Json(req): Json<NewLicense>,
) -> Result<(StatusCode, Json<Res<license::Model>>)> {
  let license = app.sv().license.generate(req).await?;
  Ok((StatusCode::CREATED, ok(license)))
}

async fn get_license(
  State(app): State<Arc<AppState>>,
  Path(serial): Path<String>,
) -> Result<Json<Res<license::Model>>> {
  let license = app
    .sv()
    .license
    .by_serial(&serial)
    .await?
    .ok_or(LicenseError::NotFound)?;
  Ok(ok(license))
}

#[derive(Debug, Deserialize)]
pub struct ActivateReq {
  pub store: String,
}

async fn activate_license(
  State(app): State<Arc<AppState>>,
  Path(serial): Path<String>,
  Json(req): Json<ActivateReq>,
) -> Result<Json<Res<license::Model>>> {
  Ok(ok(app.sv().license.activate(&serial, &req.store).await?))
}

#[derive(Debug, Deserialize)]
pub struct RenewReq {
  pub days: u64,
}

async fn renew_license(
  State(app): State<Arc<AppState>>,
  Path(serial): Path<String>,
  Json(req): Json<RenewReq>,
) -> Result<Json<Res<DateTime>>> {
  if req.days == 0 {
    return Err(Error::Invalid("days"));
  }
  Ok(ok(app.sv().license.renew(&serial, req.days).await?))
}

async fn suspend_license(
  State(app): State<Arc<AppState>>,
  Path(serial): Path<String>,
) -> Result<StatusCode> {
  app.sv().license.suspend(&serial).await?;
  Ok(StatusCode::NO_CONTENT)
}

async fn resume_license(
  State(app): State<Arc<AppState>>,
  Path(serial): Path<String>,
) -> Result<StatusCode> {
  app.sv().license.resume(&serial).await?;
  Ok(StatusCode::NO_CONTENT)
}

async fn revoke_license(
  State(app): State<Arc<AppState>>,
  Path(serial): Path<String>,
) -> Result<StatusCode> {
  app.sv().license.revoke(&serial).await?;
  Ok(StatusCode::NO_CONTENT)
}
