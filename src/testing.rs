//! Fixtures shared by unit tests.

use std::{collections::BTreeMap, path::Path, sync::Mutex};

use migration::{Migrator, MigratorTrait};
use sea_orm::ConnectOptions;
use uuid::Uuid;

use crate::{
  entity::{OrderStatus, StoreStatus, license, order, product, store},
  payments::{PaymentProvider, ProviderPayment},
  prelude::*,
  scope::{Guard, NewProduct},
  sv::{self, NewLicense},
};

pub async fn db() -> DatabaseConnection {
  let db = Database::connect("sqlite::memory:").await.unwrap();
  Migrator::up(&db, None).await.unwrap();
  db
}

/// File-backed database with a real connection pool, for tests that need
/// concurrent connections.
pub async fn file_db(dir: &Path, connections: u32) -> DatabaseConnection {
  let url = format!("sqlite://{}?mode=rwc", dir.join("store.db").display());
  let mut opts = ConnectOptions::new(url);
  opts
    .max_connections(connections)
    .acquire_timeout(Duration::from_secs(30))
    .sqlx_logging(false);

  let db = Database::connect(opts).await.unwrap();
  db.execute_unprepared("PRAGMA journal_mode=WAL").await.unwrap();
  Migrator::up(&db, None).await.unwrap();
  db
}

pub async fn store(db: &DatabaseConnection, id: &str) -> String {
  store_with_status(db, id, StoreStatus::Active).await
}

pub async fn store_with_status(
  db: &DatabaseConnection,
  id: &str,
  status: StoreStatus,
) -> String {
  store::ActiveModel {
    id: Set(id.to_string()),
    name: Set(format!("Store {id}")),
    code: Set(utils::store_code(id)),
    status: Set(status),
    plan: Set(None),
    license_serial: Set(None),
    order_seq: Set(0),
    created_at: Set(utils::now()),
    deleted_at: Set(None),
  }
  .insert(db)
  .await
  .unwrap()
  .id
}

/// Generates and activates a license for `store`.
pub async fn license(
  db: &DatabaseConnection,
  store: &str,
  new: NewLicense,
) -> license::Model {
  let sv = sv::License::new(db);
  let license = sv.generate(new).await.unwrap();
  sv.activate(&license.serial, store).await.unwrap()
}

pub async fn product(
  db: &DatabaseConnection,
  store: &str,
  name: &str,
  price: i64,
  stock: i64,
) -> product::Model {
  product_with_variants(db, store, name, price, stock, &[]).await
}

pub async fn product_with_variants(
  db: &DatabaseConnection,
  store: &str,
  name: &str,
  price: i64,
  stock: i64,
  variants: &[(&str, i64)],
) -> product::Model {
  let scope = Guard::new(db).enter(Some(store)).await.unwrap();
  let product = scope
    .products()
    .insert(NewProduct {
      name: name.to_string(),
      price,
      stock,
      variants: variants
        .iter()
        .map(|(variant, stock)| (variant.to_string(), *stock))
        .collect::<BTreeMap<_, _>>(),
    })
    .await
    .unwrap();
  scope.commit().await.unwrap();
  product
}

pub async fn stock(db: &DatabaseConnection, product: &str) -> i64 {
  product::Entity::find_by_id(product).one(db).await.unwrap().unwrap().stock
}

/// Bare order row stamped at `at`, for quota window tests.
pub async fn order_at(
  db: &DatabaseConnection,
  store: &str,
  at: DateTime,
) -> order::Model {
  let id = Uuid::new_v4().to_string();
  order::ActiveModel {
    id: Set(id.clone()),
    store_id: Set(store.to_string()),
    order_number: Set(format!("TEST-{id}")),
    status: Set(OrderStatus::Pending),
    customer_email: Set("buyer@example.com".into()),
    customer_name: Set("Buyer".into()),
    customer_phone: Set(None),
    shipping_address: Set(None),
    shipping_method: Set(None),
    payment_method: Set(None),
    notes: Set(None),
    subtotal: Set(0),
    shipping_cost: Set(0),
    total: Set(0),
    payment_status: Set(None),
    payment_provider: Set(None),
    payment_id: Set(None),
    payment_meta: Set(None),
    created_at: Set(at),
    updated_at: Set(at),
  }
  .insert(db)
  .await
  .unwrap()
}

/// Provider double serving canned payments and counting lookups.
#[derive(Default)]
pub struct FakeProvider {
  payments: Mutex<HashMap<String, ProviderPayment>>,
  pub lookups: Mutex<Vec<(String, String)>>,
  delay: Option<Duration>,
}

impl FakeProvider {
  pub fn slow(delay: Duration) -> Self {
    Self { delay: Some(delay), ..Default::default() }
  }

  pub fn set(&self, id: &str, status: &str, order_id: &str) {
    let payment = ProviderPayment {
      id: id.to_string(),
      status: status.to_string(),
      status_detail: Some(format!("{status}_detail")),
      external_reference: Some(order_id.to_string()),
      transaction_amount: Some(json::json!(25.5)),
      currency_id: Some("ARS".into()),
    };
    self.payments.lock().unwrap().insert(id.to_string(), payment);
  }

  pub fn lookups(&self) -> usize {
    self.lookups.lock().unwrap().len()
  }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
  fn name(&self) -> &'static str {
    "mercadopago"
  }

  async fn payment(
    &self,
    access_token: &str,
    payment_id: &str,
  ) -> Result<ProviderPayment> {
    if let Some(delay) = self.delay {
      time::sleep(delay).await;
    }

    self
      .lookups
      .lock()
      .unwrap()
      .push((access_token.to_string(), payment_id.to_string()));
    self
      .payments
      .lock()
      .unwrap()
      .get(payment_id)
      .cloned()
      .ok_or_else(|| Error::Provider(format!("payment {payment_id} not found")))
  }
}
