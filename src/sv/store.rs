use sea_orm::SqlErr;
use uuid::Uuid;

use crate::{
  entity::{StoreStatus, store},
  prelude::*,
};

/// Attempts at a free store code before giving up
const CODE_ATTEMPTS: usize = 8;

pub struct Store<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Store<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn provision(&self, name: &str) -> Result<store::Model> {
    let name = name.trim();
    if name.is_empty() {
      return Err(Error::Invalid("name"));
    }

    let base = utils::store_code(name);
    for attempt in 0..CODE_ATTEMPTS {
      let code = match attempt {
        0 => base.clone(),
        _ => {
          let salt = Uuid::new_v4().simple().to_string();
          format!("{base}{}", salt[..4].to_uppercase())
        }
      };

      let store = store::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set(name.to_string()),
        code: Set(code),
        status: Set(StoreStatus::Pending),
        plan: Set(None),
        license_serial: Set(None),
        order_seq: Set(0),
        created_at: Set(utils::now()),
        deleted_at: Set(None),
      };

      match store.insert(self.db).await {
        Ok(store) => {
          info!(store = %store.id, code = %store.code, name = %store.name, "Store provisioned");
          return Ok(store);
        }
        Err(err)
          if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
        {
          debug!(%base, attempt, "Store code taken");
        }
        Err(err) => return Err(err.into()),
      }
    }

    Err(Error::Internal(format!("no free store code for `{base}`")))
  }

  /// Deleted stores are not returned.
  pub async fn by_id(&self, id: &str) -> Result<Option<store::Model>> {
    Ok(
      store::Entity::find_by_id(id)
        .filter(store::Column::DeletedAt.is_null())
        .one(self.db)
        .await?,
    )
  }

  pub async fn set_status(
    &self,
    id: &str,
    status: StoreStatus,
  ) -> Result<store::Model> {
    if status == StoreStatus::Deleted {
      return self.soft_delete(id).await;
    }

    let store = self.by_id(id).await?.ok_or(Error::TenantNotFound)?;
    Ok(
      store::ActiveModel { status: Set(status), ..store.into() }
        .update(self.db)
        .await?,
    )
  }

  /// Flags the store deleted. The row and everything it owns stay.
  pub async fn soft_delete(&self, id: &str) -> Result<store::Model> {
    let store = self.by_id(id).await?.ok_or(Error::TenantNotFound)?;
    let store = store::ActiveModel {
      status: Set(StoreStatus::Deleted),
      deleted_at: Set(Some(utils::now())),
      ..store.into()
    }
    .update(self.db)
    .await?;

    warn!(store = %store.id, "Store deleted");
    Ok(store)
  }
}
