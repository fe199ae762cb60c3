//! Error types for the storefront core

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Database error: {0}")]
  Database(#[from] sea_orm::DbErr),

  #[error("Tenant id is required")]
  TenantRequired,

  #[error("Store not found")]
  TenantNotFound,

  #[error("Order items belong to more than one store")]
  CrossTenantItems,

  #[error("Products not found: {0:?}")]
  ProductsNotFound(Vec<String>),

  #[error("Incomplete order: {0}")]
  IncompleteOrder(&'static str),

  #[error("Insufficient stock for {product}{}", variant_suffix(.variant))]
  InsufficientStock { product: String, variant: Option<String> },

  #[error("Monthly order limit reached ({current}/{max})")]
  OrderLimitExceeded { current: u64, max: u64 },

  #[error("Product limit reached ({current}/{max})")]
  ProductLimitExceeded { current: u64, max: u64 },

  #[error("No valid license")]
  NoLicense,

  #[error("Invalid input: {0}")]
  Invalid(&'static str),

  #[error("Product not found")]
  ProductNotFound,

  #[error("Order not found")]
  OrderNotFound,

  #[error("Cannot move order from {from:?} to {to:?}")]
  InvalidTransition {
    from: crate::entity::OrderStatus,
    to: crate::entity::OrderStatus,
  },

  #[error("License error: {0}")]
  License(#[from] LicenseError),

  #[error("Webhook error: {0}")]
  Webhook(#[from] Webhook),

  #[error("Payment provider error: {0}")]
  Provider(String),

  #[error("Timed out: {0}")]
  Timeout(&'static str),

  #[error("Internal error: {0}")]
  Internal(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LicenseError {
  #[error("license not found")]
  NotFound,
  #[error("license is not in a state that allows this operation")]
  InvalidState,
  #[error("store already holds an activated license")]
  StoreLicensed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Webhook {
  #[error("signature verification failed: {0}")]
  VerificationFailed(&'static str),
  #[error("payment configuration not found")]
  ConfigNotFound,
}

fn variant_suffix(variant: &Option<String>) -> String {
  variant.as_ref().map(|v| format!(" (variant {v})")).unwrap_or_default()
}

impl Error {
  /// Infrastructure failures the caller may retry, as opposed to business
  /// rejections that will fail the same way again.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      Error::Database(_)
        | Error::Provider(_)
        | Error::Timeout(_)
        | Error::Internal(_)
    )
  }
}

#[derive(Serialize)]
struct ErrorBody {
  success: bool,
  error: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  details: Option<json::Value>,
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  retryable: bool,
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    use json::json;

    let retryable = self.is_retryable();
    let (status, error, details) = match &self {
      Error::TenantRequired => {
        (StatusCode::BAD_REQUEST, "Store id is required", None)
      }
      Error::TenantNotFound => (StatusCode::NOT_FOUND, "Store not found", None),
      Error::CrossTenantItems => (
        StatusCode::BAD_REQUEST,
        "Items belong to more than one store",
        None,
      ),
      Error::ProductsNotFound(ids) => (
        StatusCode::NOT_FOUND,
        "Products not found",
        Some(json!({ "products": ids })),
      ),
      Error::IncompleteOrder(what) => (
        StatusCode::BAD_REQUEST,
        "Incomplete order",
        Some(json!({ "missing": what })),
      ),
      Error::InsufficientStock { product, variant } => (
        StatusCode::CONFLICT,
        "Insufficient stock",
        Some(json!({ "product": product, "variant": variant })),
      ),
      Error::OrderLimitExceeded { current, max } => (
        StatusCode::FORBIDDEN,
        "Monthly order limit reached",
        Some(json!({ "current": current, "max": max })),
      ),
      Error::ProductLimitExceeded { current, max } => (
        StatusCode::FORBIDDEN,
        "Product limit reached",
        Some(json!({ "current": current, "max": max })),
      ),
      Error::NoLicense => (StatusCode::FORBIDDEN, "No valid license", None),
      Error::Invalid(what) => (
        StatusCode::BAD_REQUEST,
        "Invalid input",
        Some(json!({ "field": what })),
      ),
      Error::ProductNotFound => {
        (StatusCode::NOT_FOUND, "Product not found", None)
      }
      Error::OrderNotFound => (StatusCode::NOT_FOUND, "Order not found", None),
      Error::InvalidTransition { from, to } => (
        StatusCode::CONFLICT,
        "Invalid status transition",
        Some(json!({ "from": from, "to": to })),
      ),
      Error::License(err) => match err {
        LicenseError::NotFound => {
          (StatusCode::NOT_FOUND, "License not found", None)
        }
        LicenseError::InvalidState | LicenseError::StoreLicensed => {
          (StatusCode::CONFLICT, "License cannot be changed", None)
        }
      },
      Error::Webhook(Webhook::VerificationFailed(reason)) => {
        error!("Webhook rejected: {reason}");
        (StatusCode::UNAUTHORIZED, "Verification failed", None)
      }
      Error::Webhook(Webhook::ConfigNotFound) => {
        error!("Webhook rejected: payment configuration missing");
        (StatusCode::UNAUTHORIZED, "Verification failed", None)
      }
      Error::Timeout(what) => {
        warn!("Timed out: {what}");
        (StatusCode::GATEWAY_TIMEOUT, "Upstream timeout", None)
      }
      Error::Provider(err) => {
        error!("Payment provider error: {err}");
        (StatusCode::BAD_GATEWAY, "Payment provider unavailable", None)
      }
      Error::Database(err) => {
        error!("Database error: {err}");
        (StatusCode::SERVICE_UNAVAILABLE, "Database error", None)
      }
      Error::Internal(err) => {
        error!("Internal error: {err}");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error", None)
      }
    };

    let body = ErrorBody { success: false, error, details, retryable };
    (status, axum::Json(body)).into_response()
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
