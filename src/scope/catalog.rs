use std::collections::BTreeMap;

use sea_orm::sea_query::Expr;
use serde::Deserialize;
use uuid::Uuid;

use super::Scope;
use crate::{
  entity::{product, variant},
  prelude::*,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
  pub name: String,
  pub price: i64,
  #[serde(default)]
  pub stock: i64,
  #[serde(default)]
  pub variants: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductChanges {
  pub name: Option<String>,
  pub price: Option<i64>,
  pub stock: Option<i64>,
  /// Replaces the whole variant map when present
  pub variants: Option<BTreeMap<String, i64>>,
}

pub struct Products<'s> {
  scope: &'s Scope,
}

impl<'s> Products<'s> {
  pub(super) fn new(scope: &'s Scope) -> Self {
    Self { scope }
  }

  pub async fn by_id(&self, id: &str) -> Result<Option<product::Model>> {
    let query = product::Entity::find_by_id(id);
    Ok(
      self
        .scope
        .visible(query, product::Column::StoreId)
        .one(self.scope.conn())
        .await?,
    )
  }

  pub async fn by_ids(&self, ids: &[String]) -> Result<Vec<product::Model>> {
    let query = product::Entity::find()
      .filter(product::Column::Id.is_in(ids.iter().cloned()));
    Ok(
      self
        .scope
        .visible(query, product::Column::StoreId)
        .all(self.scope.conn())
        .await?,
    )
  }

  pub async fn all(&self) -> Result<Vec<product::Model>> {
    let query =
      product::Entity::find().order_by_asc(product::Column::CreatedAt);
    Ok(
      self
        .scope
        .visible(query, product::Column::StoreId)
        .all(self.scope.conn())
        .await?,
    )
  }

  pub async fn count(&self) -> Result<u64> {
    let query = product::Entity::find();
    Ok(
      self
        .scope
        .visible(query, product::Column::StoreId)
        .count(self.scope.conn())
        .await?,
    )
  }

  /// Variant stock map of one product; empty when the product does not
  /// track variants.
  pub async fn variants(&self, id: &str) -> Result<BTreeMap<String, i64>> {
    let rows = self.variants_of(&[id.to_string()]).await?;
    Ok(rows.into_iter().map(|row| (row.variant, row.stock)).collect())
  }

  pub async fn variants_of(&self, ids: &[String]) -> Result<Vec<variant::Model>> {
    let query = variant::Entity::find()
      .filter(variant::Column::ProductId.is_in(ids.iter().cloned()));
    Ok(
      self
        .scope
        .visible(query, variant::Column::StoreId)
        .all(self.scope.conn())
        .await?,
    )
  }

  pub async fn insert(&self, input: NewProduct) -> Result<product::Model> {
    let tenant = self.scope.tenant_id()?;
    let now = utils::now();

    let product = product::ActiveModel {
      id: Set(Uuid::new_v4().to_string()),
      store_id: Set(tenant.as_str().to_string()),
      name: Set(input.name),
      price: Set(input.price),
      stock: Set(input.stock),
      created_at: Set(now),
      updated_at: Set(now),
    }
    .insert(self.scope.conn())
    .await?;

    self.write_variants(&product.id, input.variants).await?;
    Ok(product)
  }

  /// `None` when the product is not visible to this tenant.
  pub async fn update(
    &self,
    id: &str,
    changes: ProductChanges,
  ) -> Result<Option<product::Model>> {
    let query = product::Entity::find_by_id(id);
    let Some(current) = self
      .scope
      .owned(query, product::Column::StoreId)?
      .one(self.scope.conn())
      .await?
    else {
      return Ok(None);
    };

    let mut model: product::ActiveModel = current.into();
    if let Some(name) = changes.name {
      model.name = Set(name);
    }
    if let Some(price) = changes.price {
      model.price = Set(price);
    }
    if let Some(stock) = changes.stock {
      model.stock = Set(stock);
    }
    model.updated_at = Set(utils::now());
    let product = model.update(self.scope.conn()).await?;

    if let Some(variants) = changes.variants {
      let query = variant::Entity::delete_many()
        .filter(variant::Column::ProductId.eq(id));
      self
        .scope
        .owned(query, variant::Column::StoreId)?
        .exec(self.scope.conn())
        .await?;
      self.write_variants(id, variants).await?;
    }

    Ok(Some(product))
  }

  pub async fn delete(&self, id: &str) -> Result<bool> {
    let query =
      product::Entity::delete_many().filter(product::Column::Id.eq(id));
    let res = self
      .scope
      .owned(query, product::Column::StoreId)?
      .exec(self.scope.conn())
      .await?;
    Ok(res.rows_affected == 1)
  }

  /// Decrements aggregate stock only if it stays non-negative.
  pub async fn take_stock(&self, id: &str, qty: i64) -> Result<bool> {
    let query = product::Entity::update_many()
      .col_expr(
        product::Column::Stock,
        Expr::col(product::Column::Stock).sub(qty),
      )
      .col_expr(product::Column::UpdatedAt, Expr::value(utils::now()))
      .filter(product::Column::Id.eq(id))
      .filter(product::Column::Stock.gte(qty));
    let res = self
      .scope
      .owned(query, product::Column::StoreId)?
      .exec(self.scope.conn())
      .await?;
    Ok(res.rows_affected == 1)
  }

  pub async fn take_variant_stock(
    &self,
    id: &str,
    variant: &str,
    qty: i64,
  ) -> Result<bool> {
    let query = variant::Entity::update_many()
      .col_expr(
        variant::Column::Stock,
        Expr::col(variant::Column::Stock).sub(qty),
      )
      .filter(variant::Column::ProductId.eq(id))
      .filter(variant::Column::Variant.eq(variant))
      .filter(variant::Column::Stock.gte(qty));
    let res = self
      .scope
      .owned(query, variant::Column::StoreId)?
      .exec(self.scope.conn())
      .await?;
    Ok(res.rows_affected == 1)
  }

  /// `false` when the product no longer exists.
  pub async fn restore_stock(&self, id: &str, qty: i64) -> Result<bool> {
    let query = product::Entity::update_many()
      .col_expr(
        product::Column::Stock,
        Expr::col(product::Column::Stock).add(qty),
      )
      .col_expr(product::Column::UpdatedAt, Expr::value(utils::now()))
      .filter(product::Column::Id.eq(id));
    let res = self
      .scope
      .owned(query, product::Column::StoreId)?
      .exec(self.scope.conn())
      .await?;
    Ok(res.rows_affected == 1)
  }

  pub async fn restore_variant_stock(
    &self,
    id: &str,
    variant: &str,
    qty: i64,
  ) -> Result<bool> {
    let query = variant::Entity::update_many()
      .col_expr(
        variant::Column::Stock,
        Expr::col(variant::Column::Stock).add(qty),
      )
      .filter(variant::Column::ProductId.eq(id))
      .filter(variant::Column::Variant.eq(variant));
    let res = self
      .scope
      .owned(query, variant::Column::StoreId)?
      .exec(self.scope.conn())
      .await?;
    Ok(res.rows_affected == 1)
  }

  async fn write_variants(
    &self,
    product_id: &str,
    variants: BTreeMap<String, i64>,
  ) -> Result<()> {
    if variants.is_empty() {
      return Ok(());
    }

    let tenant = self.scope.tenant_id()?;
    let rows: Vec<_> = variants
      .into_iter()
      .map(|(name, stock)| variant::ActiveModel {
        product_id: Set(product_id.to_string()),
        variant: Set(name),
        store_id: Set(tenant.as_str().to_string()),
        stock: Set(stock),
      })
      .collect();

    variant::Entity::insert_many(rows).exec(self.scope.conn()).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{scope::Guard, testing};

  #[tokio::test]
  async fn stock_never_goes_negative() {
    let db = testing::db().await;
    let a = testing::store(&db, "store-a").await;
    let scope = Guard::new(&db).enter(Some(&a)).await.unwrap();
    let products = scope.products();

    let product = products
      .insert(NewProduct {
        name: "Mug".into(),
        price: 800,
        stock: 2,
        variants: BTreeMap::from([("red".to_string(), 1)]),
      })
      .await
      .unwrap();

    assert!(products.take_stock(&product.id, 2).await.unwrap());
    assert!(!products.take_stock(&product.id, 1).await.unwrap());
    assert!(products.take_variant_stock(&product.id, "red", 1).await.unwrap());
    assert!(!products.take_variant_stock(&product.id, "red", 1).await.unwrap());
    assert!(!products.take_variant_stock(&product.id, "blue", 1).await.unwrap());

    let stored = products.by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(stored.stock, 0);
    assert_eq!(products.variants(&product.id).await.unwrap()["red"], 0);
  }

  #[tokio::test]
  async fn update_replaces_variant_map() {
    let db = testing::db().await;
    let a = testing::store(&db, "store-a").await;
    let scope = Guard::new(&db).enter(Some(&a)).await.unwrap();
    let products = scope.products();

    let product = products
      .insert(NewProduct {
        name: "Tee".into(),
        price: 1000,
        stock: 4,
        variants: BTreeMap::from([("S".into(), 2), ("M".into(), 2)]),
      })
      .await
      .unwrap();

    let changes = ProductChanges {
      variants: Some(BTreeMap::from([("XL".into(), 7)])),
      ..Default::default()
    };
    products.update(&product.id, changes).await.unwrap().unwrap();

    let variants = products.variants(&product.id).await.unwrap();
    assert_eq!(variants, BTreeMap::from([("XL".to_string(), 7)]));
  }
}
