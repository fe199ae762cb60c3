//! Storefront - multi-tenant commerce core
//!
//! Architecture:
//! - SeaORM for database access (SQLite)
//! - Tenant scoping through `scope::Guard`; every store-owned query is
//!   filtered on `store_id`
//! - Axum for the HTTP surface with rate limiting
//! - Tokio for async runtime and supervised background services

mod entity;
mod error;
mod notify;
mod payments;
mod plugins;
mod prelude;
mod scope;
mod state;
mod sv;
#[cfg(test)]
mod testing;
mod utils;

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  plugins::{App, maintenance, notify as notifications, server},
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "storefront=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::from_env()?;
  info!("Starting Storefront v{}", env!("CARGO_PKG_VERSION"));

  let app = Arc::new(AppState::new(config).await?);

  App::new()
    .register(server::Plugin)
    .register(notifications::Plugin::default())
    .register(maintenance::Plugin::default())
    .run(app)
    .await;

  tokio::signal::ctrl_c().await.context("Failed to listen for shutdown")?;
  info!("Shutting down");
  Ok(())
}
