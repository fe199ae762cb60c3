pub mod maintenance;
pub mod notify;
pub mod server;

use crate::{prelude::*, state::AppState};

/// A long-running background service. `start` should only return when the
/// service can no longer make progress; the supervisor restarts it.
#[async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

pub struct App {
  plugins: Vec<Arc<dyn Plugin>>,
  backoff: Duration,
}

impl App {
  pub fn new() -> Self {
    Self { plugins: Vec::new(), backoff: Duration::from_secs(5) }
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Arc::new(plugin));
    self
  }

  /// Spawns every plugin under its own supervisor and returns immediately.
  pub async fn run(self, app: Arc<AppState>) {
    let backoff = self.backoff;

    for plugin in self.plugins {
      let app = app.clone();

      tokio::spawn(async move {
        let name = plugin.name();
        info!(service = name, "Service initialized");

        loop {
          let handle = tokio::spawn({
            let app = app.clone();
            let plugin = plugin.clone();
            async move { plugin.start(app).await }
          });

          match handle.await {
            Ok(Ok(())) => warn!(service = name, "Service stopped unexpectedly"),
            Ok(Err(err)) => {
              error!(service = name, "Service crashed: {err:#}")
            }
            Err(err) if err.is_cancelled() => {
              info!(service = name, "Service shut down");
              break;
            }
            Err(_) => error!(service = name, "Service panicked"),
          }

          time::sleep(backoff).await;
          info!(service = name, "Restarting service");
        }
      });
    }
  }
}
