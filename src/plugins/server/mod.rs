mod admin;
mod handlers;

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use axum::{
  Router,
  routing::{get, patch, post, put},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

pub fn router(app: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(handlers::health))
    .route("/api/products/{id}", get(handlers::product))
    .route("/api/orders", post(handlers::place_order_inferred))
    .route("/api/stores/{store}/usage", get(handlers::usage))
    .route(
      "/api/stores/{store}/products",
      get(handlers::products).post(handlers::create_product),
    )
    .route(
      "/api/stores/{store}/products/{id}",
      patch(handlers::update_product).delete(handlers::delete_product),
    )
    .route(
      "/api/stores/{store}/orders",
      get(handlers::orders).post(handlers::place_order),
    )
    .route("/api/stores/{store}/orders/{id}", get(handlers::order))
    .route("/api/stores/{store}/orders/{id}/items", get(handlers::order_items))
    .route(
      "/api/stores/{store}/orders/{id}/status",
      patch(handlers::set_order_status),
    )
    .route(
      "/api/stores/{store}/payment-config",
      put(handlers::set_payment_config),
    )
    .route("/webhooks/payments", post(handlers::payment_webhook))
    .nest("/admin", admin::router(app.clone()))
    .with_state(app)
}

pub struct Plugin;

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let governor_conf = Arc::new(
      GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );

    let limiter = governor_conf.limiter().clone();
    let port = app.config.port;

    let router = router(app)
      .layer(
        ServiceBuilder::new()
          .layer(TraceLayer::new_for_http())
          .layer(GovernorLayer::new(governor_conf))
          .layer(
            CorsLayer::new()
              .allow_origin(Any)
              .allow_methods(Any)
              .allow_headers(Any),
          ),
      )
      .into_make_service_with_connect_info::<SocketAddr>();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP Server listening on {addr}");

    let limiter = async {
      loop {
        time::sleep(Duration::from_secs(60)).await;
        limiter.retain_recent();
      }
    };

    let server = async {
      axum::serve(listener, router).await.context("Axum server error")
    };

    tokio::select! {
      result = server => {
        match &result {
          Ok(_) => info!("Server stopped gracefully"),
          Err(err) => error!("Server stopped with error: {err}"),
        }
        result
      }
      _ = limiter => {
        error!("Rate limiter cleaner stopped unexpectedly!");
        Ok(())
      }
    }
  }
}
