use sea_orm_migration::prelude::*;

use super::m20261001_000001_create_stores::Stores;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Products::Table)
          .if_not_exists()
          .col(ColumnDef::new(Products::Id).string().not_null().primary_key())
          .col(ColumnDef::new(Products::StoreId).string().not_null())
          .col(ColumnDef::new(Products::Name).string().not_null())
          .col(ColumnDef::new(Products::Price).big_integer().not_null())
          .col(
            ColumnDef::new(Products::Stock).big_integer().not_null().default(0),
          )
          .col(ColumnDef::new(Products::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Products::UpdatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_products_store")
              .from(Products::Table, Products::StoreId)
              .to(Stores::Table, Stores::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_products_store")
          .table(Products::Table)
          .col(Products::StoreId)
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(ProductVariants::Table)
          .if_not_exists()
          .col(ColumnDef::new(ProductVariants::ProductId).string().not_null())
          .col(ColumnDef::new(ProductVariants::Variant).string().not_null())
          .col(ColumnDef::new(ProductVariants::StoreId).string().not_null())
          .col(
            ColumnDef::new(ProductVariants::Stock)
              .big_integer()
              .not_null()
              .default(0),
          )
          .primary_key(
            Index::create()
              .col(ProductVariants::ProductId)
              .col(ProductVariants::Variant),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_variants_product")
              .from(ProductVariants::Table, ProductVariants::ProductId)
              .to(Products::Table, Products::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(ProductVariants::Table).to_owned())
      .await?;
    manager.drop_table(Table::drop().table(Products::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Products {
  Table,
  Id,
  StoreId,
  Name,
  Price,
  Stock,
  CreatedAt,
  UpdatedAt,
}

#[derive(DeriveIden)]
pub enum ProductVariants {
  Table,
  ProductId,
  Variant,
  StoreId,
  Stock,
}
