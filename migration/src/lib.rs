pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_stores;
mod m20261001_000002_create_licenses;
mod m20261001_000003_create_products;
mod m20261001_000004_create_orders;
mod m20261001_000005_create_payment_configs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20261001_000001_create_stores::Migration),
      Box::new(m20261001_000002_create_licenses::Migration),
      Box::new(m20261001_000003_create_products::Migration),
      Box::new(m20261001_000004_create_orders::Migration),
      Box::new(m20261001_000005_create_payment_configs::Migration),
    ]
  }
}
