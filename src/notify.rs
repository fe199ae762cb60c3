//! Post-commit notifications
//!
//! Producers only ever [`Outbox::publish`] after their unit of work has
//! committed. Publishing never fails the caller; a full or closed queue is
//! logged and the message is dropped.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::{entity::OrderStatus, prelude::*};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
  OrderPlaced {
    store_id: String,
    order_id: String,
    order_number: String,
    customer_email: String,
    total: i64,
  },
  PaymentUpdated {
    store_id: String,
    order_id: String,
    payment_id: String,
    status: OrderStatus,
  },
}

#[derive(Debug, Clone)]
pub struct Outbox {
  tx: mpsc::Sender<Notification>,
}

impl Outbox {
  pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (Self { tx }, rx)
  }

  pub fn publish(&self, notification: Notification) {
    if let Err(err) = self.tx.try_send(notification) {
      warn!("Dropping notification: {err}");
    }
  }
}

#[async_trait]
pub trait Deliver: Send + Sync {
  async fn deliver(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Writes each notification as a structured log line.
pub struct LogDeliver;

#[async_trait]
impl Deliver for LogDeliver {
  async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
    match notification {
      Notification::OrderPlaced { store_id, order_number, customer_email, total, .. } => {
        info!(store = %store_id, %order_number, %customer_email, total, "Order placed");
      }
      Notification::PaymentUpdated { store_id, order_id, payment_id, status } => {
        info!(store = %store_id, %order_id, %payment_id, ?status, "Payment updated");
      }
    }
    Ok(())
  }
}

/// Drains `rx` until every sender is gone. Delivery failures are logged and
/// do not stop the loop.
pub async fn drain(rx: &mut mpsc::Receiver<Notification>, deliver: &dyn Deliver) {
  while let Some(notification) = rx.recv().await {
    if let Err(err) = deliver.deliver(&notification).await {
      warn!("Notification delivery failed: {err:#}");
    }
  }
}
