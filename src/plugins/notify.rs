use std::sync::Arc;

use async_trait::async_trait;

use crate::{
  notify::{self, Deliver, LogDeliver},
  prelude::*,
  state::AppState,
};

/// Consumes the notification outbox.
pub struct Plugin {
  deliver: Arc<dyn Deliver>,
}

impl Plugin {
  pub fn new(deliver: impl Deliver + 'static) -> Self {
    Self { deliver: Arc::new(deliver) }
  }
}

impl Default for Plugin {
  fn default() -> Self {
    Self::new(LogDeliver)
  }
}

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    // lives in AppState, so a restarted consumer resumes the same queue
    let mut inbox = app.inbox.lock().await;
    let rx = inbox.as_mut().context("Notification inbox missing")?;

    notify::drain(rx, self.deliver.as_ref()).await;
    warn!("Notification outbox closed");
    Ok(())
  }
}
