//! Migration to create the tenants table.
//!
//! Tenants are the organization accounts every other business record hangs
//! off. Contact email is globally unique.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tenants::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tenants::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tenants::Name).text().not_null())
                    .col(ColumnDef::new(Tenants::Email).text().not_null())
                    .col(ColumnDef::new(Tenants::Phone).text().null())
                    .col(ColumnDef::new(Tenants::Street).text().null())
                    .col(ColumnDef::new(Tenants::City).text().null())
                    .col(ColumnDef::new(Tenants::PostalCode).text().null())
                    .col(
                        ColumnDef::new(Tenants::Country)
                            .text()
                            .not_null()
                            .default("DE"),
                    )
                    .col(ColumnDef::new(Tenants::VatId).text().null())
                    .col(ColumnDef::new(Tenants::TaxNumber).text().null())
                    .col(ColumnDef::new(Tenants::Iban).text().null())
                    .col(ColumnDef::new(Tenants::Bic).text().null())
                    .col(ColumnDef::new(Tenants::BankName).text().null())
                    .col(ColumnDef::new(Tenants::BankAccountHolder).text().null())
                    .col(ColumnDef::new(Tenants::ContactPerson).text().null())
                    .col(ColumnDef::new(Tenants::Website).text().null())
                    .col(
                        ColumnDef::new(Tenants::Plan)
                            .text()
                            .not_null()
                            .default("STARTER"),
                    )
                    .col(
                        ColumnDef::new(Tenants::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Tenants::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Tenants::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tenants_email")
                    .table(Tenants::Table)
                    .col(Tenants::Email)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_tenants_email").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Tenants::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
    Name,
    Email,
    Phone,
    Street,
    City,
    PostalCode,
    Country,
    VatId,
    TaxNumber,
    Iban,
    Bic,
    BankName,
    BankAccountHolder,
    ContactPerson,
    Website,
    Plan,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
