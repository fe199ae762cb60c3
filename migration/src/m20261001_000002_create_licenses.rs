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
          .table(Licenses::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Licenses::Serial).string().not_null().primary_key(),
          )
          .col(ColumnDef::new(Licenses::Plan).string().not_null())
          .col(
            ColumnDef::new(Licenses::Status)
              .string()
              .not_null()
              .default("generated"),
          )
          .col(ColumnDef::new(Licenses::ExpiresAt).date_time().null())
          .col(ColumnDef::new(Licenses::MaxProducts).big_integer().null())
          .col(ColumnDef::new(Licenses::MaxOrders).big_integer().null())
          .col(ColumnDef::new(Licenses::StoreId).string().null())
          .col(ColumnDef::new(Licenses::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Licenses::ActivatedAt).date_time().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_licenses_store")
              .from(Licenses::Table, Licenses::StoreId)
              .to(Stores::Table, Stores::Id)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_licenses_store")
          .table(Licenses::Table)
          .col(Licenses::StoreId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Licenses::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Licenses {
  Table,
  Serial,
  Plan,
  Status,
  ExpiresAt,
  MaxProducts,
  MaxOrders,
  StoreId,
  CreatedAt,
  ActivatedAt,
}
