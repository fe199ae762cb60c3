use std::env;

use migration::{Migrator, MigratorTrait};
use tokio::sync::{Mutex, mpsc};

use crate::{
  notify::{Notification, Outbox},
  payments::{self, MercadoPago, PaymentProvider},
  prelude::*,
  sv,
};

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  pub port: u16,
  /// Bound on each payment provider API call
  pub provider_timeout: Duration,
  /// Bound on loading a store's payment configuration
  pub lookup_timeout: Duration,
  pub notify_buffer: usize,
  pub provider_api_url: String,
  /// Bearer token for `/admin` routes. Unset disables them.
  pub admin_token: Option<String>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database_url: String::from("sqlite:storefront.db?mode=rwc"),
      port: 3000,
      provider_timeout: Duration::from_secs(10),
      lookup_timeout: Duration::from_secs(5),
      notify_buffer: 1024,
      provider_api_url: String::from(payments::API_URL),
      admin_token: None,
    }
  }
}

fn var<T>(
  key: &str,
  parse: impl FnOnce(&str) -> anyhow::Result<T>,
) -> anyhow::Result<Option<T>> {
  match env::var(key) {
    Ok(raw) if !raw.trim().is_empty() => parse(raw.trim())
      .with_context(|| format!("Invalid {key}: `{raw}`"))
      .map(Some),
    _ => Ok(None),
  }
}

fn duration(raw: &str) -> anyhow::Result<Duration> {
  Ok(humantime::parse_duration(raw)?)
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    let default = Self::default();

    Ok(Self {
      database_url: var("DATABASE_URL", |raw| Ok(raw.to_string()))?
        .unwrap_or(default.database_url),
      port: var("PORT", |raw| Ok(raw.parse()?))?.unwrap_or(default.port),
      provider_timeout: var("PROVIDER_TIMEOUT", duration)?
        .unwrap_or(default.provider_timeout),
      lookup_timeout: var("LOOKUP_TIMEOUT", duration)?
        .unwrap_or(default.lookup_timeout),
      notify_buffer: var("NOTIFY_BUFFER", |raw| Ok(raw.parse()?))?
        .unwrap_or(default.notify_buffer),
      provider_api_url: var("PROVIDER_API_URL", |raw| Ok(raw.to_string()))?
        .unwrap_or(default.provider_api_url),
      admin_token: var("ADMIN_TOKEN", |raw| Ok(raw.to_string()))?,
    })
  }
}

pub struct Services<'a> {
  pub store: sv::Store<'a>,
  pub license: sv::License<'a>,
  pub quota: sv::Quota<'a>,
  pub catalog: sv::Catalog<'a>,
  pub order: sv::Order<'a>,
  pub payments: sv::Payments<'a>,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub config: Config,
  pub provider: Arc<dyn PaymentProvider>,
  pub outbox: Outbox,
  /// Taken once by the notification consumer
  pub inbox: Mutex<Option<mpsc::Receiver<Notification>>>,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
      .await
      .context("Failed to connect to database")?;

    info!("Running migrations...");
    Migrator::up(&db, None).await.context("Failed to run migrations")?;

    let provider =
      MercadoPago::new(&config.provider_api_url, config.provider_timeout)?;
    Ok(Self::with_parts(db, config, Arc::new(provider)))
  }

  pub fn with_parts(
    db: DatabaseConnection,
    config: Config,
    provider: Arc<dyn PaymentProvider>,
  ) -> Self {
    let (outbox, inbox) = Outbox::new(config.notify_buffer);
    Self { db, config, provider, outbox, inbox: Mutex::new(Some(inbox)) }
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      store: sv::Store::new(&self.db),
      license: sv::License::new(&self.db),
      quota: sv::Quota::new(&self.db),
      catalog: sv::Catalog::new(&self.db),
      order: sv::Order::new(&self.db, &self.outbox),
      payments: sv::Payments::new(
        &self.db,
        self.provider.as_ref(),
        &self.outbox,
        &self.config,
      ),
    }
  }
}
