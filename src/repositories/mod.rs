//! # Repository Layer
//!
//! One delegate per entity. Tenant-owned delegates are constructed with a
//! tenant id and add `tenant_id = ?` to every statement they issue, so a
//! delegate can never read or modify another tenant's rows.
//!
//! Delegates are generic over the connection so the same code runs against
//! the pool or inside a [`sea_orm::DatabaseTransaction`].

use chrono::Utc;
use sea_orm::Set;
use sea_orm::prelude::DateTimeWithTimeZone;

use crate::error::RepositoryError;

pub mod customer;
pub mod invoice;
pub mod invoice_item;
pub mod product;
pub mod project;
pub mod quote;
pub mod tenant;
pub mod user;

pub use customer::{CreateCustomer, CustomerRepository, CustomerWithCounts, UpdateCustomer};
pub use invoice::{
    CreateInvoice, InvoiceDetails, InvoiceItemInput, InvoiceListFilter, InvoiceRepository,
    InvoiceWithCustomer, UpdateInvoice,
};
pub use invoice_item::{CreateInvoiceItem, InvoiceItemRepository, UpdateInvoiceItem};
pub use product::{CreateProduct, ProductRepository, UpdateProduct};
pub use project::{CreateProject, ProjectRepository, UpdateProject};
pub use quote::{CreateQuote, QuoteRepository, UpdateQuote};
pub use tenant::{CreateTenant, RegisterTenant, TenantRepository, UpdateTenant};
pub use user::{CreateUser, UpdateUser, UserRepository};

/// Current time as stored in `timestamp with time zone` columns.
pub(crate) fn now() -> DateTimeWithTimeZone {
    Utc::now().fixed_offset()
}

/// Normalizes caller-supplied timestamps to UTC before they are stored.
pub(crate) fn to_utc(value: DateTimeWithTimeZone) -> DateTimeWithTimeZone {
    value.with_timezone(&Utc).fixed_offset()
}

/// Rejects blank required strings.
pub(crate) fn require_non_blank(value: &str, what: &str) -> Result<(), RepositoryError> {
    if value.trim().is_empty() {
        return Err(RepositoryError::Validation(format!("{what} cannot be empty")));
    }
    Ok(())
}

/// Sets a nullable column when the patch carries a value.
pub(crate) fn set_some<T>(column: &mut sea_orm::ActiveValue<Option<T>>, value: Option<T>)
where
    Option<T>: Into<sea_orm::Value>,
{
    if let Some(value) = value {
        *column = Set(Some(value));
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Lowercases the address and requires a local part and a dotted domain.
pub(crate) fn validate_email(email: &str) -> Result<String, RepositoryError> {
    let email = normalize_email(email);
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(RepositoryError::Validation(format!(
            "Invalid email address: {email}"
        )));
    }
    Ok(email)
}

/// Generates the read-only query verbs of a delegate.
///
/// The surrounding impl must provide `self.db` and `fn scope(&self) -> Condition`.
macro_rules! scoped_read_verbs {
    ($field:ty, $model:ty) => {
        /// First row matching the filter, honouring `order_by` and `skip`.
        pub async fn find_first(
            &self,
            args: &$crate::query::FindManyArgs<$field>,
        ) -> Result<Option<$model>, $crate::error::RepositoryError> {
            $crate::query::exec::find_first(self.db, self.scope(), args).await
        }

        /// Rows matching the filter, ordered and paged.
        pub async fn find_many(
            &self,
            args: &$crate::query::FindManyArgs<$field>,
        ) -> Result<Vec<$model>, $crate::error::RepositoryError> {
            $crate::query::exec::find_many(self.db, self.scope(), args).await
        }

        pub async fn count(
            &self,
            filter: Option<&$crate::query::Filter<$field>>,
        ) -> Result<u64, $crate::error::RepositoryError> {
            $crate::query::exec::count(self.db, self.scope(), filter).await
        }

        pub async fn aggregate(
            &self,
            args: &$crate::query::AggregateArgs<$field>,
        ) -> Result<$crate::query::AggregateResult, $crate::error::RepositoryError> {
            $crate::query::exec::aggregate(self.db, self.scope(), args).await
        }

        pub async fn group_by(
            &self,
            args: &$crate::query::GroupByArgs<$field>,
        ) -> Result<Vec<$crate::query::GroupByRow>, $crate::error::RepositoryError> {
            $crate::query::exec::group_by(self.db, self.scope(), args).await
        }
    };
}

pub(crate) use scoped_read_verbs;

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the repository unit tests.

    use sea_orm::{Database, DatabaseConnection};
    use uuid::Uuid;

    use super::tenant::{CreateTenant, TenantRepository};

    pub async fn memory_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        crate::db::run_migrations(&db).await.unwrap();
        db
    }

    pub async fn tenant(db: &DatabaseConnection, name: &str) -> Uuid {
        TenantRepository::new(db)
            .create(CreateTenant {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase().replace(' ', "-")),
                ..CreateTenant::default()
            })
            .await
            .unwrap()
            .id
    }
}
