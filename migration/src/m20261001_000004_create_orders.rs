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
          .table(Orders::Table)
          .if_not_exists()
          .col(ColumnDef::new(Orders::Id).string().not_null().primary_key())
          .col(ColumnDef::new(Orders::StoreId).string().not_null())
          .col(
            ColumnDef::new(Orders::OrderNumber).string().not_null().unique_key(),
          )
          .col(
            ColumnDef::new(Orders::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(ColumnDef::new(Orders::CustomerEmail).string().not_null())
          .col(ColumnDef::new(Orders::CustomerName).string().not_null())
          .col(ColumnDef::new(Orders::CustomerPhone).string().null())
          .col(ColumnDef::new(Orders::ShippingAddress).json().null())
          .col(ColumnDef::new(Orders::ShippingMethod).string().null())
          .col(ColumnDef::new(Orders::PaymentMethod).string().null())
          .col(ColumnDef::new(Orders::Notes).text().null())
          .col(ColumnDef::new(Orders::Subtotal).big_integer().not_null())
          .col(ColumnDef::new(Orders::ShippingCost).big_integer().not_null())
          .col(ColumnDef::new(Orders::Total).big_integer().not_null())
          .col(ColumnDef::new(Orders::PaymentStatus).string().null())
          .col(ColumnDef::new(Orders::PaymentProvider).string().null())
          .col(ColumnDef::new(Orders::PaymentId).string().null())
          .col(ColumnDef::new(Orders::PaymentMeta).json().null())
          .col(ColumnDef::new(Orders::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Orders::UpdatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_orders_store")
              .from(Orders::Table, Orders::StoreId)
              .to(Stores::Table, Stores::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_orders_store_created")
          .table(Orders::Table)
          .col(Orders::StoreId)
          .col(Orders::CreatedAt)
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(OrderItems::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(OrderItems::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(OrderItems::StoreId).string().not_null())
          .col(ColumnDef::new(OrderItems::OrderId).string().not_null())
          .col(ColumnDef::new(OrderItems::ProductId).string().not_null())
          .col(ColumnDef::new(OrderItems::ProductName).string().not_null())
          .col(ColumnDef::new(OrderItems::Quantity).big_integer().not_null())
          .col(ColumnDef::new(OrderItems::UnitPrice).big_integer().not_null())
          .col(ColumnDef::new(OrderItems::Size).string().null())
          .col(ColumnDef::new(OrderItems::Variant).string().null())
          .col(ColumnDef::new(OrderItems::Color).string().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_order_items_order")
              .from(OrderItems::Table, OrderItems::OrderId)
              .to(Orders::Table, Orders::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_order_items_order")
          .table(OrderItems::Table)
          .col(OrderItems::OrderId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(OrderItems::Table).to_owned()).await?;
    manager.drop_table(Table::drop().table(Orders::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Orders {
  Table,
  Id,
  StoreId,
  OrderNumber,
  Status,
  CustomerEmail,
  CustomerName,
  CustomerPhone,
  ShippingAddress,
  ShippingMethod,
  PaymentMethod,
  Notes,
  Subtotal,
  ShippingCost,
  Total,
  PaymentStatus,
  PaymentProvider,
  PaymentId,
  PaymentMeta,
  CreatedAt,
  UpdatedAt,
}

#[derive(DeriveIden)]
pub enum OrderItems {
  Table,
  Id,
  StoreId,
  OrderId,
  ProductId,
  ProductName,
  Quantity,
  UnitPrice,
  Size,
  Variant,
  Color,
}
