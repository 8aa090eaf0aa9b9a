//! Database migrations for the invoicing service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2024_01_01_000001_create_tenants;
mod m2024_01_01_000002_create_users;
mod m2024_01_01_000003_create_customers;
mod m2024_01_01_000004_create_invoices;
mod m2024_01_01_000005_create_invoice_items;
mod m2024_01_01_000006_create_quotes;
mod m2024_01_01_000007_create_products;
mod m2024_01_01_000008_create_projects;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2024_01_01_000001_create_tenants::Migration),
            Box::new(m2024_01_01_000002_create_users::Migration),
            Box::new(m2024_01_01_000003_create_customers::Migration),
            Box::new(m2024_01_01_000004_create_invoices::Migration),
            Box::new(m2024_01_01_000005_create_invoice_items::Migration),
            Box::new(m2024_01_01_000006_create_quotes::Migration),
            Box::new(m2024_01_01_000007_create_products::Migration),
            Box::new(m2024_01_01_000008_create_projects::Migration),
        ]
    }
}
