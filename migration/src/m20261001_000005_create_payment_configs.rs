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
          .table(PaymentConfigs::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(PaymentConfigs::StoreId)
              .string()
              .not_null()
              .primary_key(),
          )
          .col(ColumnDef::new(PaymentConfigs::Provider).string().not_null())
          .col(ColumnDef::new(PaymentConfigs::AccessToken).string().not_null())
          .col(ColumnDef::new(PaymentConfigs::WebhookSecret).string().null())
          .col(ColumnDef::new(PaymentConfigs::UpdatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_payment_configs_store")
              .from(PaymentConfigs::Table, PaymentConfigs::StoreId)
              .to(Stores::Table, Stores::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(PaymentConfigs::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum PaymentConfigs {
  Table,
  StoreId,
  Provider,
  AccessToken,
  WebhookSecret,
  UpdatedAt,
}
