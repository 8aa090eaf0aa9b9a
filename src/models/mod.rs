//! # Data Models
//!
//! SeaORM entities for the multi-tenant invoicing schema, plus the
//! string-backed enums stored in status/role/plan columns.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod customer;
pub mod enums;
pub mod invoice;
pub mod invoice_item;
pub mod product;
pub mod project;
pub mod quote;
pub mod tenant;
pub mod user;

pub use customer::Entity as Customer;
pub use enums::{InvoiceStatus, Plan, ProjectStatus, QuoteStatus, UserRole};
pub use invoice::Entity as Invoice;
pub use invoice_item::Entity as InvoiceItem;
pub use product::Entity as Product;
pub use project::Entity as Project;
pub use quote::Entity as Quote;
pub use tenant::Entity as Tenant;
pub use user::Entity as User;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "invoicing".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
