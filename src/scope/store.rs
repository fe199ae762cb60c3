use sea_orm::sea_query::{Expr, OnConflict};

use super::Scope;
use crate::{
  entity::{license, payment_config, store},
  prelude::*,
};

/// The scope's own store row and the per-store records hanging off it.
pub struct StoreRow<'s> {
  scope: &'s Scope,
}

impl<'s> StoreRow<'s> {
  pub(super) fn new(scope: &'s Scope) -> Self {
    Self { scope }
  }

  fn live(&self) -> Result<sea_orm::UpdateMany<store::Entity>> {
    let tenant = self.scope.tenant_id()?;
    Ok(
      store::Entity::update_many()
        .filter(store::Column::Id.eq(tenant.as_str()))
        .filter(store::Column::DeletedAt.is_null()),
    )
  }

  pub async fn get(&self) -> Result<Option<store::Model>> {
    let tenant = self.scope.tenant_id()?;
    Ok(
      store::Entity::find_by_id(tenant.as_str())
        .filter(store::Column::DeletedAt.is_null())
        .one(self.scope.conn())
        .await?,
    )
  }

  /// No-op write on the store row. Fails with `TenantNotFound` for
  /// unknown or deleted stores.
  pub async fn lock(&self) -> Result<()> {
    let res = self
      .live()?
      .col_expr(store::Column::OrderSeq, Expr::col(store::Column::OrderSeq).into())
      .exec(self.scope.conn())
      .await?;

    if res.rows_affected == 0 {
      return Err(Error::TenantNotFound);
    }
    Ok(())
  }

  /// Bumps the store's order sequence and formats the next order number.
  /// Also takes the lock.
  pub async fn next_order_number(&self) -> Result<String> {
    let res = self
      .live()?
      .col_expr(
        store::Column::OrderSeq,
        Expr::col(store::Column::OrderSeq).add(1),
      )
      .exec(self.scope.conn())
      .await?;

    if res.rows_affected == 0 {
      return Err(Error::TenantNotFound);
    }

    let store = self.get().await?.ok_or(Error::TenantNotFound)?;
    Ok(utils::order_number(&store.code, store.order_seq))
  }

  /// License the store currently points at, whatever its state.
  pub async fn license(&self) -> Result<Option<license::Model>> {
    let Some(serial) = self.get().await?.and_then(|store| store.license_serial)
    else {
      return Ok(None);
    };

    let query = license::Entity::find_by_id(serial);
    Ok(
      self
        .scope
        .owned(query, license::Column::StoreId)?
        .one(self.scope.conn())
        .await?,
    )
  }

  pub async fn payment_config(&self) -> Result<Option<payment_config::Model>> {
    let query = payment_config::Entity::find();
    Ok(
      self
        .scope
        .owned(query, payment_config::Column::StoreId)?
        .one(self.scope.conn())
        .await?,
    )
  }

  pub async fn set_payment_config(
    &self,
    provider: String,
    access_token: String,
    webhook_secret: Option<String>,
  ) -> Result<()> {
    let tenant = self.scope.tenant_id()?;
    let config = payment_config::ActiveModel {
      store_id: Set(tenant.as_str().to_string()),
      provider: Set(provider),
      access_token: Set(access_token),
      webhook_secret: Set(webhook_secret),
      updated_at: Set(utils::now()),
    };

    payment_config::Entity::insert(config)
      .on_conflict(
        OnConflict::column(payment_config::Column::StoreId)
          .update_columns([
            payment_config::Column::Provider,
            payment_config::Column::AccessToken,
            payment_config::Column::WebhookSecret,
            payment_config::Column::UpdatedAt,
          ])
          .to_owned(),
      )
      .exec(self.scope.conn())
      .await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use crate::{scope::Guard, testing};

  use super::*;

  #[tokio::test]
  async fn order_numbers_follow_store_sequence() {
    let db = testing::db().await;
    let a = testing::store(&db, "store-a").await;
    let b = testing::store(&db, "store-b").await;
    let guard = Guard::new(&db);

    let scope = guard.enter(Some(&a)).await.unwrap();
    let store = scope.store();
    assert_eq!(store.next_order_number().await.unwrap(), "ORD-STOREA-000001");
    assert_eq!(store.next_order_number().await.unwrap(), "ORD-STOREA-000002");
    scope.commit().await.unwrap();

    let scope = guard.enter(Some(&b)).await.unwrap();
    assert_eq!(
      scope.store().next_order_number().await.unwrap(),
      "ORD-STOREB-000001"
    );
  }

  #[tokio::test]
  async fn unknown_store_cannot_lock() {
    let db = testing::db().await;
    let scope = Guard::new(&db).enter(Some("ghost")).await.unwrap();
    assert!(matches!(scope.lock().await, Err(Error::TenantNotFound)));
  }

  #[tokio::test]
  async fn payment_config_upsert_overwrites() {
    let db = testing::db().await;
    let a = testing::store(&db, "store-a").await;
    let b = testing::store(&db, "store-b").await;
    let guard = Guard::new(&db);

    let scope = guard.enter(Some(&a)).await.unwrap();
    let store = scope.store();
    store
      .set_payment_config("mercadopago".into(), "tok-1".into(), None)
      .await
      .unwrap();
    store
      .set_payment_config("mercadopago".into(), "tok-2".into(), Some("s".into()))
      .await
      .unwrap();
    let config = store.payment_config().await.unwrap().unwrap();
    assert_eq!(config.access_token, "tok-2");
    assert_eq!(config.webhook_secret.as_deref(), Some("s"));
    scope.commit().await.unwrap();

    let scope = guard.enter(Some(&b)).await.unwrap();
    assert!(scope.store().payment_config().await.unwrap().is_none());
  }
}
