//! # Customer Repository
//!
//! Customers carry a tenant-unique `customer_number`, generated as `K0001`,
//! `K0002`, ... when the caller does not supply one. A customer that is
//! referenced by invoices or quotes cannot be deleted.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{now, require_non_blank, scoped_read_verbs, set_some};
use crate::db::begin_transaction;
use crate::error::RepositoryError;
use crate::models::customer::{self, Entity as Customer, Model as CustomerModel};
use crate::models::{invoice, quote};
use crate::query::{
    CustomerField, Filter, FilterOp, FindManyArgs, OrderBy, Page, exec, page_offset,
};
use crate::services::next_customer_number;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateCustomer {
    /// Generated (`K0001`, ...) when omitted
    pub customer_number: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub vat_id: Option<String>,
    pub leitweg_id: Option<String>,
    pub contact_person: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateCustomer {
    pub customer_number: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub vat_id: Option<String>,
    pub leitweg_id: Option<String>,
    pub contact_person: Option<String>,
    pub notes: Option<String>,
}

/// A customer with the number of documents addressed to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerWithCounts {
    #[serde(flatten)]
    pub customer: CustomerModel,
    pub invoice_count: u64,
    pub quote_count: u64,
}

pub struct CustomerRepository<'a, C = DatabaseConnection> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C> CustomerRepository<'a, C>
where
    C: ConnectionTrait + TransactionTrait,
{
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    fn scope(&self) -> Condition {
        Condition::all().add(customer::Column::TenantId.eq(self.tenant_id))
    }

    scoped_read_verbs!(CustomerField, CustomerModel);

    pub async fn find_unique(&self, id: Uuid) -> Result<Option<CustomerModel>, RepositoryError> {
        Customer::find_by_id(id)
            .filter(self.scope())
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_by_number(
        &self,
        customer_number: &str,
    ) -> Result<Option<CustomerModel>, RepositoryError> {
        Customer::find()
            .filter(self.scope())
            .filter(customer::Column::CustomerNumber.eq(customer_number))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Page of customers ordered by name, optionally narrowed by a
    /// case-insensitive search over name, email and customer number.
    pub async fn list(
        &self,
        search: Option<&str>,
        page: u64,
        limit: u64,
    ) -> Result<Page<CustomerModel>, RepositoryError> {
        let filter = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|term| {
                Filter::or(
                    [
                        CustomerField::Name,
                        CustomerField::Email,
                        CustomerField::CustomerNumber,
                    ]
                    .into_iter()
                    .map(|field| Filter::binary(field, FilterOp::Icontains, term))
                    .collect(),
                )
            });

        let total = self.count(filter.as_ref()).await?;
        let args = FindManyArgs {
            filter,
            ..FindManyArgs::default()
        }
        .order_by(OrderBy::asc(CustomerField::Name))
        .skip(page_offset(page, limit)?)
        .take(limit);
        let data = self.find_many(&args).await?;

        Ok(Page::new(data, total, page, limit))
    }

    pub async fn find_with_counts(
        &self,
        id: Uuid,
    ) -> Result<Option<CustomerWithCounts>, RepositoryError> {
        let Some(customer) = self.find_unique(id).await? else {
            return Ok(None);
        };
        let (invoice_count, quote_count) = self.document_counts(&[customer.id]).await?;
        Ok(Some(CustomerWithCounts {
            customer,
            invoice_count,
            quote_count,
        }))
    }

    pub async fn create(&self, input: CreateCustomer) -> Result<CustomerModel, RepositoryError> {
        require_non_blank(&input.name, "Customer name")?;
        let customer_number = match input.customer_number {
            Some(number) => {
                require_non_blank(&number, "Customer number")?;
                number.trim().to_string()
            }
            None => self.generate_number().await?,
        };
        let timestamp = now();

        let customer = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(self.tenant_id),
            customer_number: Set(customer_number),
            name: Set(input.name.trim().to_string()),
            email: Set(input.email),
            phone: Set(input.phone),
            street: Set(input.street),
            city: Set(input.city),
            postal_code: Set(input.postal_code),
            country: Set(input.country),
            vat_id: Set(input.vat_id),
            leitweg_id: Set(input.leitweg_id),
            contact_person: Set(input.contact_person),
            notes: Set(input.notes),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
        };

        let created = customer
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        counter!("customers_created_total").increment(1);
        Ok(created)
    }

    pub async fn create_many_and_return(
        &self,
        inputs: Vec<CreateCustomer>,
    ) -> Result<Vec<CustomerModel>, RepositoryError> {
        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        let repo = CustomerRepository::new(&txn, self.tenant_id);
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(repo.create(input).await?);
        }
        txn.commit().await.map_err(RepositoryError::database_error)?;
        Ok(created)
    }

    pub async fn update(
        &self,
        id: Uuid,
        patch: UpdateCustomer,
    ) -> Result<CustomerModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Customer"))?;
        self.apply_update(existing, patch).await
    }

    /// Creates the customer with `customer_number` if absent, otherwise patches it.
    pub async fn upsert(
        &self,
        customer_number: &str,
        create: CreateCustomer,
        patch: UpdateCustomer,
    ) -> Result<CustomerModel, RepositoryError> {
        match self.find_by_number(customer_number).await? {
            Some(existing) => self.apply_update(existing, patch).await,
            None => {
                self.create(CreateCustomer {
                    customer_number: Some(customer_number.to_string()),
                    ..create
                })
                .await
            }
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<CustomerModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Customer"))?;
        self.ensure_unreferenced(&[existing.id]).await?;

        existing
            .clone()
            .delete(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(existing)
    }

    /// Deletes all matching customers, refusing if any of them is referenced.
    pub async fn delete_many(
        &self,
        filter: Option<&Filter<CustomerField>>,
    ) -> Result<u64, RepositoryError> {
        let ids: Vec<Uuid> = exec::select(self.scope(), filter)?
            .select_only()
            .column(customer::Column::Id)
            .into_tuple()
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.ensure_unreferenced(&ids).await?;

        let result = Customer::delete_many()
            .filter(self.scope())
            .filter(customer::Column::Id.is_in(ids))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(result.rows_affected)
    }

    async fn apply_update(
        &self,
        existing: CustomerModel,
        patch: UpdateCustomer,
    ) -> Result<CustomerModel, RepositoryError> {
        let mut active = existing.into_active_model();
        if let Some(number) = patch.customer_number {
            require_non_blank(&number, "Customer number")?;
            active.customer_number = Set(number.trim().to_string());
        }
        if let Some(name) = patch.name {
            require_non_blank(&name, "Customer name")?;
            active.name = Set(name.trim().to_string());
        }
        set_some(&mut active.email, patch.email);
        set_some(&mut active.phone, patch.phone);
        set_some(&mut active.street, patch.street);
        set_some(&mut active.city, patch.city);
        set_some(&mut active.postal_code, patch.postal_code);
        set_some(&mut active.country, patch.country);
        set_some(&mut active.vat_id, patch.vat_id);
        set_some(&mut active.leitweg_id, patch.leitweg_id);
        set_some(&mut active.contact_person, patch.contact_person);
        set_some(&mut active.notes, patch.notes);
        active.updated_at = Set(now());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Next free `K`-number, starting after the tenant's customer count.
    async fn generate_number(&self) -> Result<String, RepositoryError> {
        let mut existing = self.count(None).await?;
        loop {
            let candidate = next_customer_number(existing);
            if self.find_by_number(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            existing += 1;
        }
    }

    async fn document_counts(&self, ids: &[Uuid]) -> Result<(u64, u64), RepositoryError> {
        let invoices = invoice::Entity::find()
            .filter(invoice::Column::TenantId.eq(self.tenant_id))
            .filter(invoice::Column::CustomerId.is_in(ids.iter().copied()))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        let quotes = quote::Entity::find()
            .filter(quote::Column::TenantId.eq(self.tenant_id))
            .filter(quote::Column::CustomerId.is_in(ids.iter().copied()))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok((invoices, quotes))
    }

    async fn ensure_unreferenced(&self, ids: &[Uuid]) -> Result<(), RepositoryError> {
        let (invoices, quotes) = self.document_counts(ids).await?;
        if invoices > 0 || quotes > 0 {
            return Err(RepositoryError::Validation(
                "Cannot delete customer with existing invoices or quotes".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fails with `NotFound` unless the customer exists within the tenant.
pub(crate) async fn ensure_tenant_customer<C: ConnectionTrait>(
    db: &C,
    tenant_id: Uuid,
    customer_id: Uuid,
) -> Result<(), RepositoryError> {
    let exists = Customer::find_by_id(customer_id)
        .filter(customer::Column::TenantId.eq(tenant_id))
        .count(db)
        .await
        .map_err(RepositoryError::database_error)?
        > 0;
    if !exists {
        return Err(RepositoryError::not_found("Customer"));
    }
    Ok(())
}
