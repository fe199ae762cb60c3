//! Tenant scoping
//!
//! A [`Scope`] is a unit of work (one database transaction) bound to a single
//! store. Every tenant-owned table is reachable only through the accessors on
//! a scope, and every query they build is filtered on `store_id`, so code
//! inside a scope cannot observe or touch another store's rows no matter how
//! the query is phrased.
//!
//! Scopes are opened by [`Guard::enter`] (tenant required) or
//! [`Guard::enter_optional`] (runs unscoped when no tenant is given, used by
//! public direct-link lookups). A scope is not inherited by spawned tasks;
//! each unit of work opens its own. Dropping a scope without calling
//! [`Scope::commit`] rolls the transaction back.
//!
//! Reads that must cross tenants on purpose go through [`Unscoped`], which is
//! only handed out by the explicitly named [`Guard::bypass_tenant_scope`].

mod catalog;
mod orders;
mod store;

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use sea_orm::{DatabaseTransaction, QuerySelect};

pub use self::{
  catalog::{NewProduct, ProductChanges, Products},
  orders::{Orders, PaymentRecord},
  store::StoreRow,
};
use crate::{entity::product, prelude::*};

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
  /// Absent or blank ids are rejected with [`Error::TenantRequired`].
  pub fn parse(raw: Option<&str>) -> Result<Self> {
    match raw.map(str::trim) {
      Some(id) if !id.is_empty() => Ok(Self(id.to_string())),
      _ => Err(Error::TenantRequired),
    }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Debug for TenantId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "TenantId({})", self.0)
  }
}

impl fmt::Display for TenantId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

pub struct Guard<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Guard<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Opens a unit of work scoped to `tenant`.
  pub async fn enter(&self, tenant: Option<&str>) -> Result<Scope> {
    let tenant = TenantId::parse(tenant)?;
    let txn = self.db.begin().await?;
    Ok(Scope { txn, tenant: Some(tenant) })
  }

  /// Like [`Guard::enter`], but runs unscoped when no tenant is supplied.
  /// Writes through an unscoped unit of work fail with `TenantRequired`.
  pub async fn enter_optional(&self, tenant: Option<&str>) -> Result<Scope> {
    let tenant = match tenant {
      Some(raw) => Some(TenantId::parse(Some(raw))?),
      None => None,
    };
    let txn = self.db.begin().await?;
    Ok(Scope { txn, tenant })
  }

  pub fn bypass_tenant_scope(&self) -> Unscoped<'a> {
    Unscoped { db: self.db }
  }
}

pub struct Scope {
  txn: DatabaseTransaction,
  tenant: Option<TenantId>,
}

impl Scope {
  pub fn tenant(&self) -> Option<&TenantId> {
    self.tenant.as_ref()
  }

  pub fn tenant_id(&self) -> Result<&TenantId> {
    self.tenant.as_ref().ok_or(Error::TenantRequired)
  }

  pub fn products(&self) -> Products<'_> {
    Products::new(self)
  }

  pub fn orders(&self) -> Orders<'_> {
    Orders::new(self)
  }

  pub fn store(&self) -> StoreRow<'_> {
    StoreRow::new(self)
  }

  /// Takes the store's write lock for the rest of the unit of work, so
  /// read-then-write sequences inside it cannot interleave with another
  /// unit of work for the same store.
  pub async fn lock(&self) -> Result<()> {
    self.store().lock().await
  }

  pub async fn commit(self) -> Result<()> {
    Ok(self.txn.commit().await?)
  }

  pub async fn rollback(self) -> Result<()> {
    Ok(self.txn.rollback().await?)
  }

  fn conn(&self) -> &DatabaseTransaction {
    &self.txn
  }

  /// Read filter: restricted to the tenant, or untouched when unscoped.
  fn visible<Q, C>(&self, query: Q, col: C) -> Q
  where
    Q: QueryFilter,
    C: ColumnTrait,
  {
    match &self.tenant {
      Some(tenant) => query.filter(col.eq(tenant.as_str())),
      None => query,
    }
  }

  /// Write filter: always restricted, unscoped writes are refused.
  fn owned<Q, C>(&self, query: Q, col: C) -> Result<Q>
  where
    Q: QueryFilter,
    C: ColumnTrait,
  {
    let tenant = self.tenant_id()?;
    Ok(query.filter(col.eq(tenant.as_str())))
  }
}

/// Cross-tenant reads. Nothing here returns row data beyond ownership.
pub struct Unscoped<'a> {
  db: &'a DatabaseConnection,
}

impl Unscoped<'_> {
  /// Owning store of each product id that exists, keyed by product id.
  pub async fn product_owners(
    &self,
    ids: &BTreeSet<String>,
  ) -> Result<HashMap<String, String>> {
    let rows: Vec<(String, String)> = product::Entity::find()
      .select_only()
      .column(product::Column::Id)
      .column(product::Column::StoreId)
      .filter(product::Column::Id.is_in(ids.iter().cloned()))
      .into_tuple()
      .all(self.db)
      .await?;

    Ok(rows.into_iter().collect())
  }
}
