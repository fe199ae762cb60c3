use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Stores::Table)
          .if_not_exists()
          .col(ColumnDef::new(Stores::Id).string().not_null().primary_key())
          .col(ColumnDef::new(Stores::Name).string().not_null())
          .col(ColumnDef::new(Stores::Code).string().not_null().unique_key())
          .col(
            ColumnDef::new(Stores::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(ColumnDef::new(Stores::Plan).string().null())
          .col(ColumnDef::new(Stores::LicenseSerial).string().null())
          .col(
            ColumnDef::new(Stores::OrderSeq)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(ColumnDef::new(Stores::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Stores::DeletedAt).date_time().null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Stores::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Stores {
  Table,
  Id,
  Name,
  Code,
  Status,
  Plan,
  LicenseSerial,
  OrderSeq,
  CreatedAt,
  DeletedAt,
}
