use sea_orm::sea_query::Expr;
use serde::Deserialize;

use crate::{
  entity::{LicenseStatus, StoreStatus, license, store},
  prelude::*,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLicense {
  pub plan: String,
  pub max_products: Option<i64>,
  pub max_orders: Option<i64>,
  /// `None` issues a lifetime license
  pub days: Option<u64>,
}

#[cfg(test)]
impl NewLicense {
  pub fn unlimited(plan: impl Into<String>) -> Self {
    Self { plan: plan.into(), max_products: None, max_orders: None, days: None }
  }
}

pub struct License<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> License<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn generate(&self, new: NewLicense) -> Result<license::Model> {
    if new.max_products.is_some_and(|max| max < 0)
      || new.max_orders.is_some_and(|max| max < 0)
    {
      return Err(Error::Invalid("limits"));
    }

    let now = utils::now();
    let license = license::ActiveModel {
      serial: Set(utils::license_serial()),
      plan: Set(new.plan),
      status: Set(LicenseStatus::Generated),
      expires_at: Set(new.days.map(|days| now + utils::days(days))),
      max_products: Set(new.max_products),
      max_orders: Set(new.max_orders),
      store_id: Set(None),
      created_at: Set(now),
      activated_at: Set(None),
    };

    let license = license.insert(self.db).await?;
    info!(serial = %license.serial, plan = %license.plan, "License generated");
    Ok(license)
  }

  pub async fn by_serial(&self, serial: &str) -> Result<Option<license::Model>> {
    Ok(license::Entity::find_by_id(serial).one(self.db).await?)
  }

  /// Binds a generated license to `store_id`. A store holds at most one
  /// valid activated license.
  pub async fn activate(
    &self,
    serial: &str,
    store_id: &str,
  ) -> Result<license::Model> {
    let now = utils::now();
    let txn = self.db.begin().await?;

    let store = store::Entity::find_by_id(store_id)
      .filter(store::Column::DeletedAt.is_null())
      .one(&txn)
      .await?
      .ok_or(Error::TenantNotFound)?;

    // write first so concurrent activations for this store serialize
    store::ActiveModel {
      status: Set(match store.status {
        StoreStatus::Pending => StoreStatus::Active,
        status => status,
      }),
      ..store.clone().into()
    }
    .update(&txn)
    .await?;

    let held = license::Entity::find()
      .filter(license::Column::StoreId.eq(store_id))
      .filter(license::Column::Status.eq(LicenseStatus::Activated))
      .all(&txn)
      .await?;
    if held.iter().any(|license| license.is_valid_at(now)) {
      return Err(LicenseError::StoreLicensed.into());
    }

    let res = license::Entity::update_many()
      .col_expr(license::Column::Status, Expr::value(LicenseStatus::Activated))
      .col_expr(license::Column::StoreId, Expr::value(store_id))
      .col_expr(license::Column::ActivatedAt, Expr::value(now))
      .filter(license::Column::Serial.eq(serial))
      .filter(license::Column::Status.eq(LicenseStatus::Generated))
      .exec(&txn)
      .await?;

    if res.rows_affected == 0 {
      return Err(missing_or_invalid(&txn, serial).await);
    }

    let license = license::Entity::find_by_id(serial)
      .one(&txn)
      .await?
      .ok_or(LicenseError::NotFound)?;

    store::ActiveModel {
      plan: Set(Some(license.plan.clone())),
      license_serial: Set(Some(license.serial.clone())),
      ..store.into()
    }
    .update(&txn)
    .await?;

    txn.commit().await?;
    info!(%serial, store = store_id, "License activated");
    Ok(license)
  }

  /// Extends from the later of now and the current expiry. Expired
  /// licenses that were bound to a store come back as activated.
  pub async fn renew(&self, serial: &str, days: u64) -> Result<DateTime> {
    let txn = self.db.begin().await?;

    let license = license::Entity::find_by_id(serial)
      .one(&txn)
      .await?
      .ok_or(LicenseError::NotFound)?;

    let Some(expires_at) = license.expires_at else {
      // lifetime
      return Err(LicenseError::InvalidState.into());
    };

    let status = match license.status {
      LicenseStatus::Expired if license.store_id.is_some() => {
        LicenseStatus::Activated
      }
      LicenseStatus::Expired => LicenseStatus::Generated,
      LicenseStatus::Revoked => return Err(LicenseError::InvalidState.into()),
      status => status,
    };

    let now = utils::now();
    let base = if expires_at < now { now } else { expires_at };
    let new_exp = base + utils::days(days);

    license::ActiveModel {
      expires_at: Set(Some(new_exp)),
      status: Set(status),
      ..license.into()
    }
    .update(&txn)
    .await?;

    txn.commit().await?;
    Ok(new_exp)
  }

  pub async fn suspend(&self, serial: &str) -> Result<()> {
    self
      .transition(serial, &[LicenseStatus::Activated], LicenseStatus::Suspended)
      .await
  }

  pub async fn resume(&self, serial: &str) -> Result<()> {
    self
      .transition(serial, &[LicenseStatus::Suspended], LicenseStatus::Activated)
      .await
  }

  pub async fn revoke(&self, serial: &str) -> Result<()> {
    use LicenseStatus::*;

    self
      .transition(serial, &[Generated, Activated, Suspended, Expired], Revoked)
      .await
  }

  /// Flags activated licenses whose expiry has passed.
  pub async fn expire_stale(&self) -> Result<u64> {
    let res = license::Entity::update_many()
      .col_expr(license::Column::Status, Expr::value(LicenseStatus::Expired))
      .filter(license::Column::Status.eq(LicenseStatus::Activated))
      .filter(license::Column::ExpiresAt.lte(utils::now()))
      .exec(self.db)
      .await?;
    Ok(res.rows_affected)
  }

  async fn transition(
    &self,
    serial: &str,
    from: &[LicenseStatus],
    to: LicenseStatus,
  ) -> Result<()> {
    let res = license::Entity::update_many()
      .col_expr(license::Column::Status, Expr::value(to))
      .filter(license::Column::Serial.eq(serial))
      .filter(license::Column::Status.is_in(from.iter().copied()))
      .exec(self.db)
      .await?;

    if res.rows_affected == 0 {
      return Err(missing_or_invalid(self.db, serial).await);
    }
    info!(%serial, status = ?to, "License updated");
    Ok(())
  }
}

async fn missing_or_invalid<C: ConnectionTrait>(db: &C, serial: &str) -> Error {
  match license::Entity::find_by_id(serial).one(db).await {
    Ok(Some(_)) => LicenseError::InvalidState.into(),
    Ok(None) => LicenseError::NotFound.into(),
    Err(err) => err.into(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing;

  #[tokio::test]
  async fn generate_then_activate() {
    let db = testing::db().await;
    let a = testing::store_with_status(&db, "store-a", StoreStatus::Pending).await;
    let sv = License::new(&db);

    let lic = sv
      .generate(NewLicense { days: Some(30), ..NewLicense::unlimited("pro") })
      .await
      .unwrap();
    assert_eq!(lic.status, LicenseStatus::Generated);
    assert!(lic.expires_at.is_some());

    let lic = sv.activate(&lic.serial, &a).await.unwrap();
    assert_eq!(lic.status, LicenseStatus::Activated);
    assert_eq!(lic.store_id.as_deref(), Some(a.as_str()));
    assert!(lic.is_valid_at(utils::now()));

    let store = store::Entity::find_by_id(&a).one(&db).await.unwrap().unwrap();
    assert_eq!(store.status, StoreStatus::Active);
    assert_eq!(store.plan.as_deref(), Some("pro"));
    assert_eq!(store.license_serial, Some(lic.serial.clone()));

    // already activated
    assert!(matches!(
      sv.activate(&lic.serial, &a).await,
      Err(Error::License(LicenseError::StoreLicensed))
    ));
  }

  #[tokio::test]
  async fn license_binds_one_store() {
    let db = testing::db().await;
    let a = testing::store(&db, "store-a").await;
    let b = testing::store(&db, "store-b").await;
    let sv = License::new(&db);

    let lic = sv.generate(NewLicense::unlimited("pro")).await.unwrap();
    sv.activate(&lic.serial, &a).await.unwrap();
    assert!(matches!(
      sv.activate(&lic.serial, &b).await,
      Err(Error::License(LicenseError::InvalidState))
    ));
    assert!(matches!(
      sv.activate("NOPE-NOPE-NOPE-NOPE", &b).await,
      Err(Error::License(LicenseError::NotFound))
    ));
  }

  #[tokio::test]
  async fn suspend_resume_revoke() {
    let db = testing::db().await;
    let a = testing::store(&db, "store-a").await;
    let sv = License::new(&db);
    let lic = testing::license(&db, &a, NewLicense::unlimited("pro")).await;

    sv.suspend(&lic.serial).await.unwrap();
    assert!(matches!(
      sv.suspend(&lic.serial).await,
      Err(Error::License(LicenseError::InvalidState))
    ));
    sv.resume(&lic.serial).await.unwrap();
    sv.revoke(&lic.serial).await.unwrap();

    let lic = sv.by_serial(&lic.serial).await.unwrap().unwrap();
    assert_eq!(lic.status, LicenseStatus::Revoked);
    assert!(!lic.is_valid_at(utils::now()));
  }

  #[tokio::test]
  async fn renew_extends_from_later_of_now_and_expiry() {
    let db = testing::db().await;
    let a = testing::store(&db, "store-a").await;
    let sv = License::new(&db);
    let lic = testing::license(
      &db,
      &a,
      NewLicense { days: Some(1), ..NewLicense::unlimited("pro") },
    )
    .await;

    let old = lic.expires_at.unwrap();
    let new = sv.renew(&lic.serial, 30).await.unwrap();
    assert_eq!(new, old + utils::days(30));

    let lifetime = sv.generate(NewLicense::unlimited("pro")).await.unwrap();
    assert!(matches!(
      sv.renew(&lifetime.serial, 30).await,
      Err(Error::License(LicenseError::InvalidState))
    ));
  }

  #[tokio::test]
  async fn expire_stale_flags_past_licenses() {
    let db = testing::db().await;
    let a = testing::store(&db, "store-a").await;
    let sv = License::new(&db);
    let lic = testing::license(&db, &a, NewLicense::unlimited("pro")).await;

    license::ActiveModel {
      expires_at: Set(Some(utils::now() - utils::days(1))),
      ..lic.clone().into()
    }
    .update(&db)
    .await
    .unwrap();

    assert_eq!(sv.expire_stale().await.unwrap(), 1);
    let lic = sv.by_serial(&lic.serial).await.unwrap().unwrap();
    assert_eq!(lic.status, LicenseStatus::Expired);

    sv.renew(&lic.serial, 7).await.unwrap();
    let lic = sv.by_serial(&lic.serial).await.unwrap().unwrap();
    assert!(lic.is_valid_at(utils::now()));
  }
}
