use reqwest::{Client, StatusCode, Url};

use super::{PaymentProvider, ProviderPayment};
use crate::prelude::*;

pub const API_URL: &str = "https://api.mercadopago.com";

/// Mercado Pago payments API client.
#[derive(Debug, Clone)]
pub struct MercadoPago {
  client: Client,
  base: Url,
}

impl MercadoPago {
  pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self> {
    let client = Client::builder()
      .user_agent(concat!("storefront/", env!("CARGO_PKG_VERSION")))
      .timeout(timeout)
      .build()
      .map_err(|err| Error::Internal(format!("http client: {err}")))?;

    let base = Url::parse(&base.into())
      .map_err(|err| Error::Internal(format!("provider url: {err}")))?;
    if base.cannot_be_a_base() {
      return Err(Error::Internal(format!("provider url: `{base}` is not a base")));
    }
    Ok(Self { client, base })
  }

  /// `{base}/v1/payments/{id}` with `id` percent-encoded as one segment.
  fn payment_url(&self, payment_id: &str) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(["v1", "payments", payment_id]);
    }
    url
  }
}

#[async_trait]
impl PaymentProvider for MercadoPago {
  fn name(&self) -> &'static str {
    "mercadopago"
  }

  async fn payment(
    &self,
    access_token: &str,
    payment_id: &str,
  ) -> Result<ProviderPayment> {
    let res = self
      .client
      .get(self.payment_url(payment_id))
      .bearer_auth(access_token)
      .send()
      .await
      .map_err(|err| {
        if err.is_timeout() {
          Error::Timeout("payment provider")
        } else {
          Error::Provider(err.to_string())
        }
      })?;

    match res.status() {
      status if status.is_success() => {}
      StatusCode::NOT_FOUND => {
        return Err(Error::Provider(format!("payment {payment_id} not found")));
      }
      status => {
        return Err(Error::Provider(format!(
          "payment lookup returned {status}"
        )));
      }
    }

    res
      .json::<ProviderPayment>()
      .await
      .map_err(|err| Error::Provider(format!("payment body: {err}")))
  }
}

#[cfg(test)]
mod tests {
  use axum::{
    Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::get,
  };

  use super::*;

  async fn payment(
    Path(id): Path<String>,
    headers: HeaderMap,
  ) -> Result<Json<json::Value>, StatusCode> {
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
    if auth != Some("Bearer token-a") {
      return Err(StatusCode::UNAUTHORIZED);
    }
    match id.as_str() {
      "missing" => Err(StatusCode::NOT_FOUND),
      "slow" => {
        time::sleep(Duration::from_secs(5)).await;
        Err(StatusCode::NOT_FOUND)
      }
      _ => Ok(Json(json::json!({
        "id": 9001,
        "status": "approved",
        "status_detail": "accredited",
        "external_reference": id,
        "transaction_amount": 25.5,
        "currency_id": "ARS",
      }))),
    }
  }

  async fn stub() -> String {
    let router = Router::new().route("/api/v1/payments/{id}", get(payment));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}/api/")
  }

  #[tokio::test]
  async fn reads_payment_with_bearer_token() {
    let client = MercadoPago::new(stub().await, Duration::from_secs(5)).unwrap();

    let payment = client.payment("token-a", "order-1").await.unwrap();
    assert_eq!(payment.id, "9001");
    assert_eq!(payment.status, "approved");
    assert_eq!(payment.external_reference.as_deref(), Some("order-1"));

    // the id stays a single path segment
    let payment = client.payment("token-a", "../orders/1?x=y").await.unwrap();
    assert_eq!(payment.external_reference.as_deref(), Some("../orders/1?x=y"));
  }

  #[tokio::test]
  async fn failures_map_to_errors() {
    let client = MercadoPago::new(stub().await, Duration::from_millis(200)).unwrap();

    assert!(matches!(
      client.payment("token-a", "missing").await,
      Err(Error::Provider(msg)) if msg.contains("not found")
    ));
    assert!(matches!(
      client.payment("token-b", "order-1").await,
      Err(Error::Provider(msg)) if msg.contains("401")
    ));

    let err = client.payment("token-a", "slow").await.unwrap_err();
    assert!(matches!(err, Error::Timeout("payment provider")));
    assert!(err.is_retryable());
  }

  #[test]
  fn rejects_unusable_base() {
    assert!(MercadoPago::new("not a url", Duration::from_secs(1)).is_err());
    assert!(MercadoPago::new("mailto:ops@example.com", Duration::from_secs(1)).is_err());
  }
}
