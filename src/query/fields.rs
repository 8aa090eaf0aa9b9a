//! Field catalogs of the invoicing entities.
//!
//! Secrets such as `users.password_hash` are deliberately absent so they can
//! never be filtered, ordered or aggregated on.

use crate::entity_fields;
use crate::models::enums::{
    INVOICE_STATUS_VALUES, PLAN_VALUES, PROJECT_STATUS_VALUES, QUOTE_STATUS_VALUES,
    USER_ROLE_VALUES,
};
use crate::models::{customer, invoice, invoice_item, product, project, quote, tenant, user};
use crate::query::FieldKind;

entity_fields! {
    pub enum TenantField for tenant::Entity {
        Id => ("id", tenant::Column::Id, FieldKind::Uuid),
        Name => ("name", tenant::Column::Name, FieldKind::String),
        Email => ("email", tenant::Column::Email, FieldKind::String),
        City => ("city", tenant::Column::City, FieldKind::String),
        Country => ("country", tenant::Column::Country, FieldKind::String),
        VatId => ("vat_id", tenant::Column::VatId, FieldKind::String),
        Plan => ("plan", tenant::Column::Plan, FieldKind::Enum(PLAN_VALUES)),
        IsActive => ("is_active", tenant::Column::IsActive, FieldKind::Bool),
        CreatedAt => ("created_at", tenant::Column::CreatedAt, FieldKind::DateTime),
        UpdatedAt => ("updated_at", tenant::Column::UpdatedAt, FieldKind::DateTime),
    }
}

entity_fields! {
    pub enum UserField for user::Entity {
        Id => ("id", user::Column::Id, FieldKind::Uuid),
        TenantId => ("tenant_id", user::Column::TenantId, FieldKind::Uuid),
        Email => ("email", user::Column::Email, FieldKind::String),
        FirstName => ("first_name", user::Column::FirstName, FieldKind::String),
        LastName => ("last_name", user::Column::LastName, FieldKind::String),
        Role => ("role", user::Column::Role, FieldKind::Enum(USER_ROLE_VALUES)),
        IsActive => ("is_active", user::Column::IsActive, FieldKind::Bool),
        EmailVerifiedAt => ("email_verified_at", user::Column::EmailVerifiedAt, FieldKind::DateTime),
        LastLoginAt => ("last_login_at", user::Column::LastLoginAt, FieldKind::DateTime),
        CreatedAt => ("created_at", user::Column::CreatedAt, FieldKind::DateTime),
    }
}

entity_fields! {
    pub enum CustomerField for customer::Entity {
        Id => ("id", customer::Column::Id, FieldKind::Uuid),
        CustomerNumber => ("customer_number", customer::Column::CustomerNumber, FieldKind::String),
        Name => ("name", customer::Column::Name, FieldKind::String),
        Email => ("email", customer::Column::Email, FieldKind::String),
        Phone => ("phone", customer::Column::Phone, FieldKind::String),
        City => ("city", customer::Column::City, FieldKind::String),
        PostalCode => ("postal_code", customer::Column::PostalCode, FieldKind::String),
        Country => ("country", customer::Column::Country, FieldKind::String),
        VatId => ("vat_id", customer::Column::VatId, FieldKind::String),
        LeitwegId => ("leitweg_id", customer::Column::LeitwegId, FieldKind::String),
        ContactPerson => ("contact_person", customer::Column::ContactPerson, FieldKind::String),
        CreatedAt => ("created_at", customer::Column::CreatedAt, FieldKind::DateTime),
        UpdatedAt => ("updated_at", customer::Column::UpdatedAt, FieldKind::DateTime),
    }
}

entity_fields! {
    pub enum InvoiceField for invoice::Entity {
        Id => ("id", invoice::Column::Id, FieldKind::Uuid),
        CustomerId => ("customer_id", invoice::Column::CustomerId, FieldKind::Uuid),
        InvoiceNumber => ("invoice_number", invoice::Column::InvoiceNumber, FieldKind::String),
        Date => ("date", invoice::Column::Date, FieldKind::DateTime),
        DueDate => ("due_date", invoice::Column::DueDate, FieldKind::DateTime),
        Subtotal => ("subtotal", invoice::Column::Subtotal, FieldKind::Decimal),
        Total => ("total", invoice::Column::Total, FieldKind::Decimal),
        Status => ("status", invoice::Column::Status, FieldKind::Enum(INVOICE_STATUS_VALUES)),
        PaymentTerms => ("payment_terms", invoice::Column::PaymentTerms, FieldKind::String),
        PaymentMethod => ("payment_method", invoice::Column::PaymentMethod, FieldKind::String),
        Notes => ("notes", invoice::Column::Notes, FieldKind::String),
        Metadata => ("metadata", invoice::Column::Metadata, FieldKind::Json),
        SentAt => ("sent_at", invoice::Column::SentAt, FieldKind::DateTime),
        PaidAt => ("paid_at", invoice::Column::PaidAt, FieldKind::DateTime),
        CreatedAt => ("created_at", invoice::Column::CreatedAt, FieldKind::DateTime),
        UpdatedAt => ("updated_at", invoice::Column::UpdatedAt, FieldKind::DateTime),
    }
}

entity_fields! {
    pub enum InvoiceItemField for invoice_item::Entity {
        Id => ("id", invoice_item::Column::Id, FieldKind::Uuid),
        InvoiceId => ("invoice_id", invoice_item::Column::InvoiceId, FieldKind::Uuid),
        Description => ("description", invoice_item::Column::Description, FieldKind::String),
        Quantity => ("quantity", invoice_item::Column::Quantity, FieldKind::Decimal),
        Price => ("price", invoice_item::Column::Price, FieldKind::Decimal),
        Total => ("total", invoice_item::Column::Total, FieldKind::Decimal),
        TaxRate => ("tax_rate", invoice_item::Column::TaxRate, FieldKind::Decimal),
        Unit => ("unit", invoice_item::Column::Unit, FieldKind::String),
        CreatedAt => ("created_at", invoice_item::Column::CreatedAt, FieldKind::DateTime),
    }
}

entity_fields! {
    pub enum QuoteField for quote::Entity {
        Id => ("id", quote::Column::Id, FieldKind::Uuid),
        CustomerId => ("customer_id", quote::Column::CustomerId, FieldKind::Uuid),
        QuoteNumber => ("quote_number", quote::Column::QuoteNumber, FieldKind::String),
        Date => ("date", quote::Column::Date, FieldKind::DateTime),
        ValidUntil => ("valid_until", quote::Column::ValidUntil, FieldKind::DateTime),
        Subtotal => ("subtotal", quote::Column::Subtotal, FieldKind::Decimal),
        Total => ("total", quote::Column::Total, FieldKind::Decimal),
        Status => ("status", quote::Column::Status, FieldKind::Enum(QUOTE_STATUS_VALUES)),
        Notes => ("notes", quote::Column::Notes, FieldKind::String),
        CreatedAt => ("created_at", quote::Column::CreatedAt, FieldKind::DateTime),
        UpdatedAt => ("updated_at", quote::Column::UpdatedAt, FieldKind::DateTime),
    }
}

entity_fields! {
    pub enum ProductField for product::Entity {
        Id => ("id", product::Column::Id, FieldKind::Uuid),
        Name => ("name", product::Column::Name, FieldKind::String),
        Description => ("description", product::Column::Description, FieldKind::String),
        Price => ("price", product::Column::Price, FieldKind::Decimal),
        Unit => ("unit", product::Column::Unit, FieldKind::String),
        TaxRate => ("tax_rate", product::Column::TaxRate, FieldKind::Decimal),
        Stock => ("stock", product::Column::Stock, FieldKind::Decimal),
        MinStock => ("min_stock", product::Column::MinStock, FieldKind::Decimal),
        IsActive => ("is_active", product::Column::IsActive, FieldKind::Bool),
        CreatedAt => ("created_at", product::Column::CreatedAt, FieldKind::DateTime),
        UpdatedAt => ("updated_at", product::Column::UpdatedAt, FieldKind::DateTime),
    }
}

entity_fields! {
    pub enum ProjectField for project::Entity {
        Id => ("id", project::Column::Id, FieldKind::Uuid),
        Name => ("name", project::Column::Name, FieldKind::String),
        Description => ("description", project::Column::Description, FieldKind::String),
        Status => ("status", project::Column::Status, FieldKind::Enum(PROJECT_STATUS_VALUES)),
        StartDate => ("start_date", project::Column::StartDate, FieldKind::DateTime),
        EndDate => ("end_date", project::Column::EndDate, FieldKind::DateTime),
        Budget => ("budget", project::Column::Budget, FieldKind::Decimal),
        CreatedAt => ("created_at", project::Column::CreatedAt, FieldKind::DateTime),
        UpdatedAt => ("updated_at", project::Column::UpdatedAt, FieldKind::DateTime),
    }
}
