//! Payment webhook reconciliation
//!
//! A notification is only ever a hint that something changed. After the
//! signature checks out, the payment is re-read from the provider with the
//! store's own credentials and that answer is what gets applied.

use serde::{Deserialize, Serialize};

use crate::{
  entity::payment_config,
  notify::{Notification, Outbox},
  payments::{self, PaymentProvider, ProviderPayment, Signed},
  prelude::*,
  scope::{Guard, PaymentRecord},
  state::Config,
  sv::order::{Transition, transition},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  /// Not a payment notification
  Ignored,
  Updated,
  Unchanged,
  OrderNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
  pub received: bool,
  pub action: Action,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order_id: Option<String>,
}

impl WebhookAck {
  fn new(action: Action, order_id: Option<String>) -> Self {
    Self { received: true, action, order_id }
  }
}

#[derive(Debug, Default, Deserialize)]
struct Notice {
  #[serde(rename = "type")]
  kind: Option<String>,
  topic: Option<String>,
  data: Option<NoticeData>,
}

#[derive(Debug, Deserialize)]
struct NoticeData {
  id: Option<json::Value>,
}

impl Notice {
  fn is_payment(&self) -> bool {
    self.kind.as_deref().or(self.topic.as_deref()) == Some("payment")
  }

  fn payment_id(&self) -> Option<String> {
    match self.data.as_ref()?.id.as_ref()? {
      json::Value::String(id) if !id.is_empty() => Some(id.clone()),
      json::Value::Number(id) => Some(id.to_string()),
      _ => None,
    }
  }
}

pub struct Payments<'a> {
  db: &'a DatabaseConnection,
  provider: &'a dyn PaymentProvider,
  outbox: &'a Outbox,
  config: &'a Config,
}

impl<'a> Payments<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    provider: &'a dyn PaymentProvider,
    outbox: &'a Outbox,
    config: &'a Config,
  ) -> Self {
    Self { db, provider, outbox, config }
  }

  pub async fn configure(
    &self,
    tenant: &str,
    access_token: String,
    webhook_secret: Option<String>,
  ) -> Result<()> {
    if access_token.trim().is_empty() {
      return Err(Error::Invalid("accessToken"));
    }

    let scope = Guard::new(self.db).enter(Some(tenant)).await?;
    scope.lock().await?;
    scope
      .store()
      .set_payment_config(
        self.provider.name().to_string(),
        access_token,
        webhook_secret,
      )
      .await?;
    scope.commit().await
  }

  /// Handles one inbound notification for `tenant`. Every outcome other
  /// than a failed verification is acknowledged so the provider stops
  /// retrying.
  pub async fn reconcile(
    &self,
    tenant: Option<&str>,
    headers: &Signed<'_>,
    body: &[u8],
  ) -> Result<WebhookAck> {
    let tenant = tenant.ok_or(Error::TenantRequired)?;

    let notice = match json::from_slice::<Notice>(body) {
      Ok(notice) => notice,
      Err(err) => {
        warn!(store = tenant, "Unreadable notification ignored: {err}");
        return Ok(WebhookAck::new(Action::Ignored, None));
      }
    };
    if !notice.is_payment() {
      debug!(store = tenant, kind = ?notice.kind.or(notice.topic), "Notification ignored");
      return Ok(WebhookAck::new(Action::Ignored, None));
    }
    let Some(payment_id) = notice.payment_id() else {
      warn!(store = tenant, "Payment notification without a payment id");
      return Ok(WebhookAck::new(Action::Ignored, None));
    };

    let config = self.payment_config(tenant).await?;
    if let Err(err) =
      payments::verify_signature(config.webhook_secret.as_deref(), headers, &payment_id)
    {
      error!(store = tenant, payment = %payment_id, "Webhook rejected: {err}");
      return Err(err.into());
    }

    let payment = time::timeout(
      self.config.provider_timeout,
      self.provider.payment(&config.access_token, &payment_id),
    )
    .await
    .map_err(|_| Error::Timeout("payment provider"))??;

    self.apply(tenant, payment).await
  }

  async fn payment_config(&self, tenant: &str) -> Result<payment_config::Model> {
    let lookup = async {
      let scope = Guard::new(self.db).enter(Some(tenant)).await?;
      scope.store().payment_config().await
    };

    let config = time::timeout(self.config.lookup_timeout, lookup)
      .await
      .map_err(|_| Error::Timeout("payment config lookup"))??;

    config.ok_or_else(|| {
      error!(store = tenant, "Webhook for a store without payment configuration");
      Webhook::ConfigNotFound.into()
    })
  }

  async fn apply(&self, tenant: &str, payment: ProviderPayment) -> Result<WebhookAck> {
    let Some(order_id) = payment.external_reference.clone() else {
      warn!(store = tenant, payment = %payment.id, "Payment carries no order reference");
      return Ok(WebhookAck::new(Action::OrderNotFound, None));
    };

    let scope = Guard::new(self.db).enter(Some(tenant)).await?;
    match scope.lock().await {
      Ok(()) => {}
      Err(Error::TenantNotFound) => {
        warn!(store = tenant, payment = %payment.id, "Payment for a deleted store");
        return Ok(WebhookAck::new(Action::OrderNotFound, Some(order_id)));
      }
      Err(err) => return Err(err),
    }

    let Some(order) = scope.orders().by_id(&order_id).await? else {
      warn!(
        store = tenant,
        order = %order_id,
        payment = %payment.id,
        "Payment references an unknown order"
      );
      return Ok(WebhookAck::new(Action::OrderNotFound, Some(order_id)));
    };

    let to = payments::map_status(&payment.status);
    // redelivered payment notices never undo fulfillment progress
    let outcome = if order.status.is_fulfillment() && to.is_payment() {
      info!(order = %order.order_number, from = ?order.status, ?to, "Order already in fulfillment");
      Transition::Unchanged
    } else {
      match transition(&scope, &order, to).await {
        Ok(outcome) => outcome,
        Err(Error::InvalidTransition { from, to }) => {
          warn!(order = %order.order_number, ?from, ?to, "Payment status not applicable");
          Transition::Unchanged
        }
        Err(err) => return Err(err),
      }
    };

    let record = PaymentRecord {
      provider: self.provider.name().to_string(),
      payment_id: payment.id.clone(),
      status: payment.status.clone(),
      meta: json::json!({
        "id": payment.id,
        "status": payment.status,
        "statusDetail": payment.status_detail,
        "amount": payment.transaction_amount,
        "currency": payment.currency_id,
      }),
    };
    scope.orders().record_payment(&order.id, record).await?;
    scope.commit().await?;

    if outcome == Transition::Unchanged {
      debug!(order = %order.order_number, status = ?to, "Payment status unchanged");
      return Ok(WebhookAck::new(Action::Unchanged, Some(order.id)));
    }

    info!(order = %order.order_number, payment = %payment.id, status = ?to, "Payment applied");
    self.outbox.publish(Notification::PaymentUpdated {
      store_id: order.store_id,
      order_id: order.id.clone(),
      payment_id: payment.id,
      status: to,
    });
    Ok(WebhookAck::new(Action::Updated, Some(order.id)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    entity::OrderStatus,
    sv::{NewLicense, NewOrder, Order, order::OrderLine},
    testing::{self, FakeProvider, stock},
  };

  const SECRET: &str = "whsec-a";

  struct Env {
    db: DatabaseConnection,
    provider: FakeProvider,
    outbox: Outbox,
    rx: tokio::sync::mpsc::Receiver<Notification>,
    config: Config,
    store: String,
    product: String,
    order: String,
  }

  impl Env {
    async fn new() -> Self {
      Self::with_provider(FakeProvider::default(), Config::default()).await
    }

    async fn with_provider(provider: FakeProvider, config: Config) -> Self {
      let db = testing::db().await;
      let store = testing::store(&db, "store-a").await;
      testing::license(&db, &store, NewLicense::unlimited("pro")).await;
      let product = testing::product(&db, &store, "Mug", 500, 10).await;
      let (outbox, rx) = Outbox::new(16);

      let input = NewOrder {
        customer_email: "buyer@example.com".into(),
        customer_name: "Buyer".into(),
        items: vec![OrderLine {
          product_id: product.id.clone(),
          quantity: 2,
          ..Default::default()
        }],
        ..Default::default()
      };
      let placed = Order::new(&db, &outbox).place(Some(&store), input).await.unwrap();

      let mut env = Self {
        db,
        provider,
        outbox,
        rx,
        config,
        store,
        product: product.id,
        order: placed.order_id,
      };
      env.rx.try_recv().unwrap();
      env.sv().configure(&env.store, "token-a".into(), Some(SECRET.into())).await.unwrap();
      env
    }

    fn sv(&self) -> Payments<'_> {
      Payments::new(&self.db, &self.provider, &self.outbox, &self.config)
    }

    async fn deliver(&self, payment: &str, signed_for: &str, secret: &str) -> Result<WebhookAck> {
      let signature = payments::sign(secret, signed_for, "req-1", 1_760_000_000);
      let headers = Signed { signature: Some(&signature), request_id: Some("req-1") };
      let body = json::json!({ "type": "payment", "action": "payment.updated", "data": { "id": payment } });
      self.sv().reconcile(Some(&self.store), &headers, body.to_string().as_bytes()).await
    }

    async fn status(&self) -> OrderStatus {
      Order::new(&self.db, &self.outbox).get(&self.store, &self.order).await.unwrap().status
    }
  }

  #[tokio::test]
  async fn applies_provider_status_once() {
    let mut env = Env::new().await;
    env.provider.set("9001", "approved", &env.order);

    let ack = env.deliver("9001", "9001", SECRET).await.unwrap();
    assert_eq!(ack, WebhookAck::new(Action::Updated, Some(env.order.clone())));
    assert_eq!(env.status().await, OrderStatus::Paid);
    assert_eq!(env.provider.lookups.lock().unwrap()[0], ("token-a".to_string(), "9001".to_string()));

    let order = Order::new(&env.db, &env.outbox).get(&env.store, &env.order).await.unwrap();
    assert_eq!(order.payment_id.as_deref(), Some("9001"));
    assert_eq!(order.payment_status.as_deref(), Some("approved"));
    assert_eq!(order.payment_meta.as_ref().unwrap()["statusDetail"], "approved_detail");
    assert!(matches!(
      env.rx.try_recv(),
      Ok(Notification::PaymentUpdated { status: OrderStatus::Paid, .. })
    ));

    // redelivery
    let ack = env.deliver("9001", "9001", SECRET).await.unwrap();
    assert_eq!(ack.action, Action::Unchanged);
    assert_eq!(env.status().await, OrderStatus::Paid);
    assert_eq!(env.provider.lookups(), 2);
    assert!(env.rx.try_recv().is_err());

    let again = Order::new(&env.db, &env.outbox).get(&env.store, &env.order).await.unwrap();
    assert_eq!(again.payment_meta, order.payment_meta);
  }

  #[tokio::test]
  async fn body_status_is_never_trusted() {
    let env = Env::new().await;
    env.provider.set("9001", "rejected", &env.order);

    let signature = payments::sign(SECRET, "9001", "req-1", 1);
    let headers = Signed { signature: Some(&signature), request_id: Some("req-1") };
    let body = br#"{"type":"payment","data":{"id":9001},"status":"approved"}"#;
    env.sv().reconcile(Some(&env.store), &headers, body).await.unwrap();
    assert_eq!(env.status().await, OrderStatus::PaymentFailed);
  }

  #[tokio::test]
  async fn tampered_or_foreign_signatures_are_rejected() {
    let env = Env::new().await;
    env.provider.set("9001", "approved", &env.order);
    env.provider.set("9002", "approved", &env.order);

    // header signed for another payment id
    assert!(matches!(
      env.deliver("9002", "9001", SECRET).await,
      Err(Error::Webhook(Webhook::VerificationFailed(_)))
    ));
    // another store's secret
    assert!(matches!(
      env.deliver("9001", "9001", "whsec-b").await,
      Err(Error::Webhook(Webhook::VerificationFailed(_)))
    ));

    let body = br#"{"type":"payment","data":{"id":"9001"}}"#;
    assert!(matches!(
      env.sv().reconcile(Some(&env.store), &Signed::default(), body).await,
      Err(Error::Webhook(Webhook::VerificationFailed(_)))
    ));

    assert_eq!(env.provider.lookups(), 0);
    assert_eq!(env.status().await, OrderStatus::Pending);
  }

  #[tokio::test]
  async fn missing_config_or_secret_fails_closed() {
    let env = Env::new().await;
    let other = testing::store(&env.db, "store-b").await;
    let signature = payments::sign(SECRET, "9001", "req-1", 1);
    let headers = Signed { signature: Some(&signature), request_id: Some("req-1") };
    let body = br#"{"type":"payment","data":{"id":"9001"}}"#;

    assert!(matches!(
      env.sv().reconcile(Some(&other), &headers, body).await,
      Err(Error::Webhook(Webhook::ConfigNotFound))
    ));

    env.sv().configure(&other, "token-b".into(), None).await.unwrap();
    assert!(matches!(
      env.sv().reconcile(Some(&other), &headers, body).await,
      Err(Error::Webhook(Webhook::VerificationFailed(_)))
    ));
    assert!(matches!(
      env.sv().reconcile(None, &headers, body).await,
      Err(Error::TenantRequired)
    ));
  }

  #[tokio::test]
  async fn non_payment_and_unknown_orders_are_acknowledged() {
    let env = Env::new().await;

    let ack = env
      .sv()
      .reconcile(Some(&env.store), &Signed::default(), br#"{"type":"plan","data":{"id":"1"}}"#)
      .await
      .unwrap();
    assert_eq!(ack.action, Action::Ignored);

    let ack = env.sv().reconcile(Some(&env.store), &Signed::default(), b"not json").await.unwrap();
    assert_eq!(ack.action, Action::Ignored);

    env.provider.set("9003", "approved", "no-such-order");
    let ack = env.deliver("9003", "9003", SECRET).await.unwrap();
    assert_eq!(ack.action, Action::OrderNotFound);
    assert!(ack.received);
  }

  #[tokio::test]
  async fn provider_cancellation_restores_stock_once() {
    let env = Env::new().await;
    assert_eq!(stock(&env.db, &env.product).await, 8);

    env.provider.set("9001", "cancelled", &env.order);
    env.deliver("9001", "9001", SECRET).await.unwrap();
    env.deliver("9001", "9001", SECRET).await.unwrap();
    assert_eq!(stock(&env.db, &env.product).await, 10);

    // a late approval cannot revive a cancelled order
    env.provider.set("9001", "approved", &env.order);
    let ack = env.deliver("9001", "9001", SECRET).await.unwrap();
    assert_eq!(ack.action, Action::Unchanged);
    assert_eq!(env.status().await, OrderStatus::Cancelled);
    assert_eq!(stock(&env.db, &env.product).await, 10);
  }

  #[tokio::test]
  async fn redelivery_never_undoes_fulfillment() {
    let mut env = Env::new().await;
    env.provider.set("9001", "approved", &env.order);
    env.deliver("9001", "9001", SECRET).await.unwrap();
    env.rx.try_recv().unwrap();

    Order::new(&env.db, &env.outbox)
      .set_status(&env.store, &env.order, OrderStatus::Shipped)
      .await
      .unwrap();

    let ack = env.deliver("9001", "9001", SECRET).await.unwrap();
    assert_eq!(ack.action, Action::Unchanged);
    assert_eq!(env.status().await, OrderStatus::Shipped);
    assert!(env.rx.try_recv().is_err());

    // a refund still lands on a shipped order
    env.provider.set("9001", "refunded", &env.order);
    let ack = env.deliver("9001", "9001", SECRET).await.unwrap();
    assert_eq!(ack.action, Action::Updated);
    assert_eq!(env.status().await, OrderStatus::Refunded);
  }

  #[tokio::test]
  async fn deleted_store_is_acknowledged() {
    let env = Env::new().await;
    env.provider.set("9001", "approved", &env.order);
    crate::sv::Store::new(&env.db).soft_delete(&env.store).await.unwrap();

    let ack = env.deliver("9001", "9001", SECRET).await.unwrap();
    assert_eq!(ack, WebhookAck::new(Action::OrderNotFound, Some(env.order.clone())));
    assert_eq!(env.status().await, OrderStatus::Pending);
  }

  #[tokio::test]
  async fn slow_config_lookup_times_out() {
    let config = Config { lookup_timeout: Duration::from_millis(50), ..Config::default() };
    let env = Env::with_provider(FakeProvider::default(), config).await;
    env.provider.set("9001", "approved", &env.order);

    // the only pooled connection is busy
    let busy = Guard::new(&env.db).enter(Some(&env.store)).await.unwrap();
    let err = env.deliver("9001", "9001", SECRET).await.unwrap_err();
    assert!(matches!(err, Error::Timeout("payment config lookup")));
    assert_eq!(env.provider.lookups(), 0);
    busy.rollback().await.unwrap();
  }

  #[tokio::test]
  async fn slow_provider_times_out() {
    let provider = FakeProvider::slow(Duration::from_secs(5));
    let config = Config { provider_timeout: Duration::from_millis(20), ..Config::default() };
    let env = Env::with_provider(provider, config).await;
    env.provider.set("9001", "approved", &env.order);

    let err = env.deliver("9001", "9001", SECRET).await.unwrap_err();
    assert!(matches!(err, Error::Timeout("payment provider")));
    assert!(err.is_retryable());
    assert_eq!(env.status().await, OrderStatus::Pending);
  }
}
