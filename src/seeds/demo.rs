//! Demo tenant seeding
//!
//! Creates "Demo Handwerk GmbH" with an admin user, three customers, three
//! products, three invoices and one project. Running the seed again is a
//! no-op once the demo tenant exists.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde_json::json;
use uuid::Uuid;

use crate::db::begin_transaction;
use crate::models::{Plan, ProjectStatus, UserRole};
use crate::query::parse_datetime;
use crate::repositories::{
    CreateCustomer, CreateInvoice, CreateProduct, CreateProject, CreateTenant, CreateUser,
    CustomerRepository, InvoiceItemInput, InvoiceRepository, ProductRepository,
    ProjectRepository, TenantRepository, UserRepository,
};

const DEMO_TENANT_EMAIL: &str = "info@demo-handwerk.de";
pub const DEMO_ADMIN_EMAIL: &str = "admin@demo-handwerk.de";
pub const DEMO_ADMIN_PASSWORD: &str = "Demo1234";
const PAYMENT_TERMS: &str = "Zahlbar innerhalb 30 Tagen ohne Abzug.";

/// What [`seed_demo`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoSeed {
    Created { tenant_id: Uuid },
    AlreadyPresent { tenant_id: Uuid },
}

/// Seeds the demo tenant in a single transaction.
pub async fn seed_demo(db: &DatabaseConnection) -> Result<DemoSeed> {
    if let Some(existing) = TenantRepository::new(db)
        .find_by_email(DEMO_TENANT_EMAIL)
        .await?
    {
        log::info!("Demo tenant '{}' already exists, skipping", existing.name);
        return Ok(DemoSeed::AlreadyPresent {
            tenant_id: existing.id,
        });
    }

    let txn = begin_transaction(db, None)
        .await
        .context("Failed to open seed transaction")?;
    let tenant_id = seed_tenant(&txn).await?;
    txn.commit().await.context("Failed to commit demo seed")?;

    log::info!("Seeded demo tenant {tenant_id} (login: {DEMO_ADMIN_EMAIL})");
    Ok(DemoSeed::Created { tenant_id })
}

async fn seed_tenant<C>(db: &C) -> Result<Uuid>
where
    C: sea_orm::ConnectionTrait + TransactionTrait,
{
    let tenant = TenantRepository::new(db)
        .create(CreateTenant {
            name: "Demo Handwerk GmbH".into(),
            email: DEMO_TENANT_EMAIL.into(),
            phone: Some("+49 89 12345678".into()),
            street: Some("Musterstraße 123".into()),
            city: Some("München".into()),
            postal_code: Some("80331".into()),
            country: Some("DE".into()),
            vat_id: Some("DE123456789".into()),
            tax_number: Some("123/456/78901".into()),
            iban: Some("DE89370400440532013000".into()),
            bic: Some("COBADEFFXXX".into()),
            bank_name: Some("Commerzbank".into()),
            bank_account_holder: Some("Demo Handwerk GmbH".into()),
            contact_person: Some("Max Mustermann".into()),
            website: Some("https://demo-handwerk.de".into()),
            plan: Some(Plan::Professional),
        })
        .await?;

    UserRepository::new(db, tenant.id)
        .create(CreateUser {
            email: DEMO_ADMIN_EMAIL.into(),
            password: DEMO_ADMIN_PASSWORD.into(),
            first_name: "Max".into(),
            last_name: "Mustermann".into(),
            role: Some(UserRole::Admin),
        })
        .await?;

    let customers = CustomerRepository::new(db, tenant.id)
        .create_many_and_return(vec![
            CreateCustomer {
                customer_number: Some("K0001".into()),
                name: "Stadt München".into(),
                email: Some("eingangsrechnungen@muenchen.de".into()),
                phone: Some("+49 89 233-0".into()),
                street: Some("Marienplatz 8".into()),
                city: Some("München".into()),
                postal_code: Some("80331".into()),
                leitweg_id: Some("991-12345-67".into()),
                contact_person: Some("Frau Schmidt".into()),
                notes: Some("Öffentlicher Auftraggeber - XRechnung erforderlich".into()),
                ..CreateCustomer::default()
            },
            CreateCustomer {
                customer_number: Some("K0002".into()),
                name: "Siemens AG".into(),
                email: Some("rechnungen@siemens.com".into()),
                phone: Some("+49 89 636-0".into()),
                street: Some("Werner-von-Siemens-Str. 1".into()),
                city: Some("München".into()),
                postal_code: Some("80333".into()),
                vat_id: Some("DE999999999".into()),
                contact_person: Some("Herr Müller".into()),
                notes: Some("Großkunde - ZUGFeRD bevorzugt".into()),
                ..CreateCustomer::default()
            },
            CreateCustomer {
                customer_number: Some("K0003".into()),
                name: "BMW Group".into(),
                email: Some("lieferanten@bmw.de".into()),
                phone: Some("+49 89 382-0".into()),
                street: Some("Petuelring 130".into()),
                city: Some("München".into()),
                postal_code: Some("80788".into()),
                vat_id: Some("DE888888888".into()),
                contact_person: Some("Frau Weber".into()),
                notes: Some("Premium Kunde".into()),
                ..CreateCustomer::default()
            },
        ])
        .await?;
    let [munich, siemens, bmw] = customers.as_slice() else {
        anyhow::bail!("expected three demo customers");
    };

    ProductRepository::new(db, tenant.id)
        .create_many_and_return(vec![
            CreateProduct {
                name: "Elektroinstallation Stundensatz".into(),
                description: Some("Fachkraft Elektroinstallation pro Stunde".into()),
                price: Decimal::from(85),
                unit: Some("Std".into()),
                ..CreateProduct::default()
            },
            CreateProduct {
                name: "Material: Kabel NYM-J 3x1,5".into(),
                description: Some("Installationskabel NYM-J 3x1,5mm² pro Meter".into()),
                price: Decimal::new(250, 2),
                unit: Some("m".into()),
                stock: Some(Decimal::from(500)),
                min_stock: Some(Decimal::from(50)),
                ..CreateProduct::default()
            },
            CreateProduct {
                name: "Sicherungskasten Installation".into(),
                description: Some("Installation und Verdrahtung Unterverteilung".into()),
                price: Decimal::from(450),
                unit: Some("Stk".into()),
                ..CreateProduct::default()
            },
        ])
        .await?;

    let invoices = InvoiceRepository::new(db, tenant.id);
    let first = invoices
        .create(CreateInvoice {
            customer_id: munich.id,
            invoice_number: "RE-2024-001".into(),
            date: date("2024-01-15")?,
            due_date: date("2024-02-14")?,
            items: vec![
                item("Elektroinstallation Bürogebäude - Fachkraftstunden", 20, Decimal::from(85), "Std"),
                item("Material: Kabel NYM-J 3x1,5mm²", 170, Decimal::new(250, 2), "m"),
            ],
            payment_terms: Some(PAYMENT_TERMS.into()),
            payment_method: Some("bank_transfer".into()),
            notes: None,
            metadata: Some(json!({
                "exports": { "xrechnung": { "leitwegId": "991-12345-67" } }
            })),
            status: None,
        })
        .await?;
    invoices.mark_sent(first.id).await?;

    let second = invoices
        .create(CreateInvoice {
            customer_id: siemens.id,
            invoice_number: "RE-2024-002".into(),
            date: date("2024-01-20")?,
            due_date: date("2024-02-19")?,
            items: vec![
                item("Elektroinstallation Produktionshalle - Fachkraftstunden", 32, Decimal::from(85), "Std"),
                item("Sicherungskasten Installation", 1, Decimal::from(450), "Stk"),
                item("Anfahrtskosten", 1, Decimal::from(5), "Psch"),
            ],
            payment_terms: Some(PAYMENT_TERMS.into()),
            payment_method: Some("sepa".into()),
            notes: None,
            metadata: Some(json!({
                "exports": { "zugferd": { "profile": "COMFORT" } }
            })),
            status: None,
        })
        .await?;
    invoices.mark_sent(second.id).await?;

    let third = invoices
        .create(CreateInvoice {
            customer_id: bmw.id,
            invoice_number: "RE-2024-003".into(),
            date: date("2024-01-25")?,
            due_date: date("2024-02-24")?,
            items: vec![item(
                "Wartung Elektroanlage - Fachkraftstunden",
                12,
                Decimal::from(85),
                "Std",
            )],
            payment_terms: Some(PAYMENT_TERMS.into()),
            payment_method: Some("bank_transfer".into()),
            notes: None,
            metadata: Some(json!({
                "exports": { "zugferd": { "profile": "COMFORT" } },
                "payment": { "reference": "RE-2024-003" }
            })),
            status: None,
        })
        .await?;
    invoices.mark_sent(third.id).await?;
    invoices.mark_paid(third.id).await?;

    ProjectRepository::new(db, tenant.id)
        .create(CreateProject {
            name: "Neubau Bürogebäude Siemens Campus".into(),
            description: Some("Komplette Elektroinstallation für neues Bürogebäude".into()),
            status: Some(ProjectStatus::Active),
            start_date: Some(date("2024-01-01")?),
            end_date: Some(date("2024-06-30")?),
            budget: Some(Decimal::from(250_000)),
        })
        .await?;

    Ok(tenant.id)
}

fn item(description: &str, quantity: i64, price: Decimal, unit: &str) -> InvoiceItemInput {
    InvoiceItemInput {
        description: description.into(),
        quantity: Decimal::from(quantity),
        price,
        tax_rate: Decimal::from(19),
        unit: Some(unit.into()),
    }
}

fn date(raw: &str) -> Result<DateTimeWithTimeZone> {
    parse_datetime(raw).with_context(|| format!("invalid seed date {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvoiceStatus;
    use crate::query::{FindManyArgs, InvoiceField, OrderBy};
    use crate::repositories::testing::memory_db;

    #[tokio::test]
    async fn seeds_demo_data_once() {
        let db = memory_db().await;

        let DemoSeed::Created { tenant_id } = seed_demo(&db).await.unwrap() else {
            panic!("first run must create the demo tenant");
        };
        assert_eq!(
            seed_demo(&db).await.unwrap(),
            DemoSeed::AlreadyPresent { tenant_id }
        );

        assert_eq!(CustomerRepository::new(&db, tenant_id).count(None).await.unwrap(), 3);
        assert_eq!(ProductRepository::new(&db, tenant_id).count(None).await.unwrap(), 3);
        assert_eq!(ProjectRepository::new(&db, tenant_id).count(None).await.unwrap(), 1);

        let invoices = InvoiceRepository::new(&db, tenant_id)
            .find_many(&FindManyArgs::default().order_by(OrderBy::asc(InvoiceField::InvoiceNumber)))
            .await
            .unwrap();
        let summary: Vec<_> = invoices
            .iter()
            .map(|i| (i.invoice_number.as_str(), i.status, i.total))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("RE-2024-001", InvoiceStatus::Sent, Decimal::new(252875, 2)),
                ("RE-2024-002", InvoiceStatus::Sent, Decimal::new(377825, 2)),
                ("RE-2024-003", InvoiceStatus::Paid, Decimal::new(121380, 2)),
            ]
        );
    }

    #[tokio::test]
    async fn demo_admin_can_log_in() {
        let db = memory_db().await;
        seed_demo(&db).await.unwrap();

        let user =
            crate::repositories::user::verify_credentials(&db, DEMO_ADMIN_EMAIL, DEMO_ADMIN_PASSWORD)
                .await
                .unwrap();
        assert!(user.is_some_and(|u| u.role == UserRole::Admin));
    }
}
