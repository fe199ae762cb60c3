use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
  entity::product,
  prelude::*,
  scope::{Guard, NewProduct, ProductChanges},
  sv::quota,
};

/// A product with its variant stock map.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
  #[serde(flatten)]
  pub product: product::Model,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub variants: BTreeMap<String, i64>,
}

fn check_amounts(
  price: Option<i64>,
  stock: Option<i64>,
  variants: Option<&BTreeMap<String, i64>>,
) -> Result<()> {
  if price.is_some_and(|price| price < 0) {
    return Err(Error::Invalid("price"));
  }
  if stock.is_some_and(|stock| stock < 0) {
    return Err(Error::Invalid("stock"));
  }
  if let Some(variants) = variants
    && variants.iter().any(|(key, stock)| key.trim().is_empty() || *stock < 0)
  {
    return Err(Error::Invalid("variants"));
  }
  Ok(())
}

pub struct Catalog<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Catalog<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Creates a product if the store's plan still allows one more.
  pub async fn create(
    &self,
    tenant: &str,
    input: NewProduct,
  ) -> Result<product::Model> {
    if input.name.trim().is_empty() {
      return Err(Error::Invalid("name"));
    }
    check_amounts(Some(input.price), Some(input.stock), Some(&input.variants))?;

    let scope = Guard::new(self.db).enter(Some(tenant)).await?;
    scope.lock().await?;

    let usage = quota::usage(&scope).await.ok_or(Error::NoLicense)?;
    if !usage.can_create_product {
      return Err(Error::ProductLimitExceeded {
        current: usage.product_count,
        max: usage.max_products.unwrap_or_default(),
      });
    }

    let product = scope.products().insert(input).await?;
    scope.commit().await?;

    info!(store = tenant, product = %product.id, "Product created");
    Ok(product)
  }

  pub async fn update(
    &self,
    tenant: &str,
    id: &str,
    changes: ProductChanges,
  ) -> Result<product::Model> {
    if changes.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
      return Err(Error::Invalid("name"));
    }
    check_amounts(changes.price, changes.stock, changes.variants.as_ref())?;

    let scope = Guard::new(self.db).enter(Some(tenant)).await?;
    scope.lock().await?;
    let product = scope
      .products()
      .update(id, changes)
      .await?
      .ok_or(Error::ProductNotFound)?;
    scope.commit().await?;
    Ok(product)
  }

  pub async fn delete(&self, tenant: &str, id: &str) -> Result<()> {
    let scope = Guard::new(self.db).enter(Some(tenant)).await?;
    scope.lock().await?;
    if !scope.products().delete(id).await? {
      return Err(Error::ProductNotFound);
    }
    scope.commit().await?;

    info!(store = tenant, product = %id, "Product deleted");
    Ok(())
  }

  /// Store-scoped lookup, or a global direct-link lookup when `tenant` is
  /// `None`.
  pub async fn get(&self, tenant: Option<&str>, id: &str) -> Result<Listing> {
    let scope = Guard::new(self.db).enter_optional(tenant).await?;
    let products = scope.products();
    let product = products.by_id(id).await?.ok_or(Error::ProductNotFound)?;
    let variants = products.variants(id).await?;
    Ok(Listing { product, variants })
  }

  pub async fn list(&self, tenant: &str) -> Result<Vec<product::Model>> {
    let scope = Guard::new(self.db).enter(Some(tenant)).await?;
    scope.products().all().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{sv::NewLicense, testing};

  fn mug() -> NewProduct {
    NewProduct {
      name: "Mug".into(),
      price: 800,
      stock: 3,
      variants: BTreeMap::new(),
    }
  }

  #[tokio::test]
  async fn product_quota_is_strict() {
    let db = testing::db().await;
    let a = testing::store(&db, "store-a").await;
    let limits = NewLicense { max_products: Some(2), ..NewLicense::unlimited("basic") };
    testing::license(&db, &a, limits).await;
    let sv = Catalog::new(&db);

    sv.create(&a, mug()).await.unwrap();
    let second = sv.create(&a, mug()).await.unwrap();
    assert!(matches!(
      sv.create(&a, mug()).await,
      Err(Error::ProductLimitExceeded { current: 2, max: 2 })
    ));

    sv.delete(&a, &second.id).await.unwrap();
    sv.create(&a, mug()).await.unwrap();
    assert_eq!(sv.list(&a).await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn unlicensed_store_cannot_create() {
    let db = testing::db().await;
    let a = testing::store(&db, "store-a").await;
    assert!(matches!(
      Catalog::new(&db).create(&a, mug()).await,
      Err(Error::NoLicense)
    ));
  }

  #[tokio::test]
  async fn rejects_negative_amounts() {
    let db = testing::db().await;
    let a = testing::store(&db, "store-a").await;
    testing::license(&db, &a, NewLicense::unlimited("pro")).await;
    let sv = Catalog::new(&db);

    let bad = NewProduct { price: -1, ..mug() };
    assert!(matches!(sv.create(&a, bad).await, Err(Error::Invalid("price"))));

    let product = sv.create(&a, mug()).await.unwrap();
    let changes = ProductChanges {
      variants: Some(BTreeMap::from([("S".to_string(), -2)])),
      ..Default::default()
    };
    assert!(matches!(
      sv.update(&a, &product.id, changes).await,
      Err(Error::Invalid("variants"))
    ));
  }

  #[tokio::test]
  async fn direct_link_lookup_crosses_stores() {
    let db = testing::db().await;
    let a = testing::store(&db, "store-a").await;
    let b = testing::store(&db, "store-b").await;
    let product = testing::product_with_variants(&db, &a, "Tee", 1000, 3, &[("M", 3)]).await;
    let sv = Catalog::new(&db);

    let listing = sv.get(None, &product.id).await.unwrap();
    assert_eq!(listing.product.store_id, a);
    assert_eq!(listing.variants["M"], 3);

    assert!(sv.get(Some(&a), &product.id).await.is_ok());
    assert!(matches!(
      sv.get(Some(&b), &product.id).await,
      Err(Error::ProductNotFound)
    ));
    assert!(matches!(
      sv.update(&b, &product.id, ProductChanges::default()).await,
      Err(Error::ProductNotFound)
    ));
    assert!(matches!(sv.delete(&b, &product.id).await, Err(Error::ProductNotFound)));
  }
}
