//! Invoice entity model
//!
//! This module contains the SeaORM entity model for the invoices table.
//! Monetary columns are fixed-point decimals; `subtotal` is net and `total`
//! includes tax.

use rust_decimal::Decimal;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::enums::InvoiceStatus;

/// Invoice entity owned by a tenant and addressed to a customer
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,
    pub customer_id: Uuid,

    /// Unique within the tenant
    pub invoice_number: String,

    /// Invoice date
    pub date: DateTimeWithTimeZone,
    pub due_date: DateTimeWithTimeZone,

    /// Sum of item totals before tax
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub subtotal: Decimal,

    /// Sum of item totals including tax
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub total: Decimal,

    pub status: InvoiceStatus,
    pub payment_terms: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,

    /// Export and delivery bookkeeping
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<JsonValue>,

    pub sent_at: Option<DateTimeWithTimeZone>,
    pub paid_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id",
        on_delete = "Cascade"
    )]
    Tenant,
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_delete = "Cascade"
    )]
    Customer,
    #[sea_orm(has_many = "super::invoice_item::Entity")]
    Items,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::invoice_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
