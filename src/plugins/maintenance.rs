use std::sync::Arc;

use async_trait::async_trait;

use crate::{prelude::*, state::AppState};

/// Periodically flags activated licenses past their expiry.
pub struct Plugin {
  pub every: Duration,
}

impl Default for Plugin {
  fn default() -> Self {
    Self { every: Duration::from_secs(60 * 60) }
  }
}

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let mut interval = time::interval(self.every);
    loop {
      interval.tick().await;
      match app.sv().license.expire_stale().await {
        Ok(0) => debug!("No licenses expired"),
        Ok(count) => info!("Expired {count} licenses"),
        Err(err) => error!("License expiry sweep failed: {err}"),
      }
    }
  }
}
