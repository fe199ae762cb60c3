//! Payment provider seam: authoritative status lookups, status mapping and
//! webhook signature verification.

mod mercadopago;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub use self::mercadopago::{API_URL, MercadoPago};
use crate::{entity::OrderStatus, prelude::*};

type HmacSha256 = Hmac<Sha256>;

/// A payment as reported by the provider's own API.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderPayment {
  #[serde(deserialize_with = "id_string")]
  pub id: String,
  pub status: String,
  #[serde(default)]
  pub status_detail: Option<String>,
  /// Order id set when the checkout link was created
  #[serde(default)]
  pub external_reference: Option<String>,
  #[serde(default)]
  pub transaction_amount: Option<json::Value>,
  #[serde(default)]
  pub currency_id: Option<String>,
}

fn id_string<'de, D>(de: D) -> std::result::Result<String, D::Error>
where
  D: serde::Deserializer<'de>,
{
  match json::Value::deserialize(de)? {
    json::Value::String(id) => Ok(id),
    json::Value::Number(id) => Ok(id.to_string()),
    _ => Err(serde::de::Error::custom("payment id must be a string or number")),
  }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
  fn name(&self) -> &'static str;

  /// Fetches the current state of `payment_id` with the store's credentials.
  async fn payment(
    &self,
    access_token: &str,
    payment_id: &str,
  ) -> Result<ProviderPayment>;
}

pub fn map_status(status: &str) -> OrderStatus {
  match status {
    "approved" => OrderStatus::Paid,
    "pending" | "in_process" => OrderStatus::PendingPayment,
    "rejected" => OrderStatus::PaymentFailed,
    "cancelled" => OrderStatus::Cancelled,
    "refunded" => OrderStatus::Refunded,
    "charged_back" | "in_mediation" => OrderStatus::Disputed,
    "authorized" => OrderStatus::PendingCapture,
    _ => OrderStatus::Pending,
  }
}

/// Headers that authenticate a notification.
#[derive(Debug, Clone, Default)]
pub struct Signed<'a> {
  /// `ts=<unix>,v1=<hex hmac>`
  pub signature: Option<&'a str>,
  pub request_id: Option<&'a str>,
}

fn manifest(payment_id: &str, request_id: &str, ts: &str) -> String {
  format!(
    "id:{};request-id:{request_id};ts:{ts};",
    payment_id.to_lowercase()
  )
}

fn parse_signature(header: &str) -> Option<(&str, &str)> {
  let mut ts = None;
  let mut v1 = None;

  for part in header.split(',') {
    let (key, value) = part.trim().split_once('=')?;
    match key.trim() {
      "ts" => ts = Some(value.trim()),
      "v1" => v1 = Some(value.trim()),
      _ => {}
    }
  }

  match (ts, v1) {
    (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => Some((ts, v1)),
    _ => None,
  }
}

/// Verifies the notification signature for `payment_id` against the
/// store's webhook secret. Every missing piece rejects.
pub fn verify_signature(
  secret: Option<&str>,
  headers: &Signed<'_>,
  payment_id: &str,
) -> Result<(), Webhook> {
  let secret = secret
    .filter(|secret| !secret.is_empty())
    .ok_or(Webhook::VerificationFailed("webhook secret not configured"))?;
  let header = headers
    .signature
    .ok_or(Webhook::VerificationFailed("missing signature header"))?;
  let request_id = headers
    .request_id
    .ok_or(Webhook::VerificationFailed("missing request id header"))?;
  let (ts, provided) = parse_signature(header)
    .ok_or(Webhook::VerificationFailed("malformed signature header"))?;

  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .map_err(|_| Webhook::VerificationFailed("unusable webhook secret"))?;
  mac.update(manifest(payment_id, request_id, ts).as_bytes());
  let expected = hex::encode(mac.finalize().into_bytes());

  let expected = expected.as_bytes();
  let provided = provided.to_ascii_lowercase();
  let provided = provided.as_bytes();

  // signature length is public, always 64 hex chars
  if expected.len() != provided.len() || !bool::from(expected.ct_eq(provided))
  {
    return Err(Webhook::VerificationFailed("signature mismatch"));
  }
  Ok(())
}

/// Signature header value for a notification; the sending half of
/// [`verify_signature`].
#[cfg(test)]
pub fn sign(secret: &str, payment_id: &str, request_id: &str, ts: i64) -> String {
  let ts = ts.to_string();
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
  mac.update(manifest(payment_id, request_id, &ts).as_bytes());
  format!("ts={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
}
