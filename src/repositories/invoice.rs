//! # Invoice Repository
//!
//! An invoice and its items are always written together: creating an
//! invoice, or updating it with a new item list, recomputes the totals and
//! replaces the items inside one transaction. Paid invoices cannot be
//! deleted.

use chrono::{DateTime, Duration, FixedOffset};
use metrics::counter;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use super::customer::ensure_tenant_customer;
use super::quote::validate_lines;
use super::{now, require_non_blank, scoped_read_verbs, set_some, to_utc};
use crate::db::begin_transaction;
use crate::error::RepositoryError;
use crate::models::customer::{self, Model as CustomerModel};
use crate::models::invoice::{self, Entity as Invoice, Model as InvoiceModel};
use crate::models::invoice_item::{self, Model as InvoiceItemModel};
use crate::models::InvoiceStatus;
use crate::query::exec::apply_order;
use crate::query::filter::icontains;
use crate::query::{Filter, FilterOp, InvoiceField, OrderBy, Page, exec, page_offset};
use crate::services::{TaxedLine, totals};

/// One line of an invoice as supplied by the caller.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct InvoiceItemInput {
    pub description: String,
    pub quantity: rust_decimal::Decimal,
    /// Net unit price
    pub price: rust_decimal::Decimal,
    /// Percent, e.g. `19`
    pub tax_rate: rust_decimal::Decimal,
    pub unit: Option<String>,
}

impl InvoiceItemInput {
    fn taxed_line(&self) -> TaxedLine {
        TaxedLine {
            quantity: self.quantity,
            price: self.price,
            tax_rate: self.tax_rate,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateInvoice {
    pub customer_id: Uuid,
    pub invoice_number: String,
    pub date: DateTime<FixedOffset>,
    pub due_date: DateTime<FixedOffset>,
    pub items: Vec<InvoiceItemInput>,
    pub payment_terms: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub metadata: Option<JsonValue>,
    /// Defaults to `DRAFT`
    pub status: Option<InvoiceStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateInvoice {
    pub customer_id: Option<Uuid>,
    pub invoice_number: Option<String>,
    pub date: Option<DateTime<FixedOffset>>,
    pub due_date: Option<DateTime<FixedOffset>>,
    /// Replaces every existing item and recomputes the totals
    pub items: Option<Vec<InvoiceItemInput>>,
    pub payment_terms: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub metadata: Option<JsonValue>,
    pub status: Option<InvoiceStatus>,
}

/// Criteria of the invoice list view.
#[derive(Debug, Clone, Default)]
pub struct InvoiceListFilter {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<Uuid>,
    /// Inclusive lower bound on the invoice date
    pub from: Option<DateTimeWithTimeZone>,
    /// Inclusive upper bound on the invoice date
    pub to: Option<DateTimeWithTimeZone>,
    /// Case-insensitive match on invoice number or customer name
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CustomerSummary {
    pub id: Uuid,
    pub name: String,
}

/// List row: the invoice with its customer's id and name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceWithCustomer {
    #[serde(flatten)]
    pub invoice: InvoiceModel,
    pub customer: Option<CustomerSummary>,
}

/// The invoice with its customer and items in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceDetails {
    #[serde(flatten)]
    pub invoice: InvoiceModel,
    pub customer: Option<CustomerModel>,
    pub items: Vec<InvoiceItemModel>,
}

pub struct InvoiceRepository<'a, C = DatabaseConnection> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C> InvoiceRepository<'a, C>
where
    C: ConnectionTrait + TransactionTrait,
{
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    fn scope(&self) -> Condition {
        Condition::all().add(invoice::Column::TenantId.eq(self.tenant_id))
    }

    scoped_read_verbs!(InvoiceField, InvoiceModel);

    pub async fn find_unique(&self, id: Uuid) -> Result<Option<InvoiceModel>, RepositoryError> {
        Invoice::find_by_id(id)
            .filter(self.scope())
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_by_number(
        &self,
        invoice_number: &str,
    ) -> Result<Option<InvoiceModel>, RepositoryError> {
        Invoice::find()
            .filter(self.scope())
            .filter(invoice::Column::InvoiceNumber.eq(invoice_number))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_with_details(
        &self,
        id: Uuid,
    ) -> Result<Option<InvoiceDetails>, RepositoryError> {
        let Some((invoice, customer)) = Invoice::find_by_id(id)
            .filter(self.scope())
            .find_also_related(customer::Entity)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)?
        else {
            return Ok(None);
        };

        let items = invoice_item::Entity::find()
            .filter(invoice_item::Column::InvoiceId.eq(invoice.id))
            .order_by_asc(invoice_item::Column::CreatedAt)
            .order_by_asc(invoice_item::Column::Id)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(Some(InvoiceDetails {
            invoice,
            customer,
            items,
        }))
    }

    /// Page of invoices, newest first, each with its customer summary.
    pub async fn list(
        &self,
        criteria: &InvoiceListFilter,
        page: u64,
        limit: u64,
    ) -> Result<Page<InvoiceWithCustomer>, RepositoryError> {
        let mut condition = self.scope().add(list_filter(criteria).to_condition()?);
        if let Some(term) = criteria.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(icontains(
                        Expr::col((invoice::Entity, invoice::Column::InvoiceNumber)).into(),
                        term,
                    ))
                    .add(icontains(
                        Expr::col((customer::Entity, customer::Column::Name)).into(),
                        term,
                    )),
            );
        }

        let total = Invoice::find()
            .join(JoinType::LeftJoin, invoice::Relation::Customer.def())
            .filter(condition.clone())
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        let rows = apply_order(
            Invoice::find()
                .find_also_related(customer::Entity)
                .filter(condition),
            &[OrderBy::desc(InvoiceField::Date)],
        )
        .offset(page_offset(page, limit)?)
        .limit(limit)
        .all(self.db)
        .await
        .map_err(RepositoryError::database_error)?;

        let data = rows
            .into_iter()
            .map(|(invoice, customer)| InvoiceWithCustomer {
                invoice,
                customer: customer.map(|c| CustomerSummary {
                    id: c.id,
                    name: c.name,
                }),
            })
            .collect();

        Ok(Page::new(data, total, page, limit))
    }

    /// Creates the invoice and its items in one transaction.
    pub async fn create(&self, input: CreateInvoice) -> Result<InvoiceModel, RepositoryError> {
        require_non_blank(&input.invoice_number, "Invoice number")?;
        validate_items(&input.items)?;
        ensure_tenant_customer(self.db, self.tenant_id, input.customer_id).await?;

        let lines: Vec<TaxedLine> = input.items.iter().map(InvoiceItemInput::taxed_line).collect();
        let sums = totals::compute(&lines);
        let timestamp = now();
        let invoice_id = Uuid::new_v4();

        let header = invoice::ActiveModel {
            id: Set(invoice_id),
            tenant_id: Set(self.tenant_id),
            customer_id: Set(input.customer_id),
            invoice_number: Set(input.invoice_number.trim().to_string()),
            date: Set(to_utc(input.date)),
            due_date: Set(to_utc(input.due_date)),
            subtotal: Set(sums.subtotal),
            total: Set(sums.total),
            status: Set(input.status.unwrap_or(InvoiceStatus::Draft)),
            payment_terms: Set(input.payment_terms),
            payment_method: Set(input.payment_method),
            notes: Set(input.notes),
            metadata: Set(input.metadata),
            sent_at: Set(None),
            paid_at: Set(None),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
        };

        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        let created = header
            .insert(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        insert_items(&txn, invoice_id, input.items, &sums.line_totals).await?;
        txn.commit().await.map_err(RepositoryError::database_error)?;

        counter!("invoices_created_total").increment(1);
        tracing::info!(
            tenant_id = %self.tenant_id,
            invoice_id = %created.id,
            invoice_number = %created.invoice_number,
            "Created invoice"
        );
        Ok(created)
    }

    pub async fn create_many_and_return(
        &self,
        inputs: Vec<CreateInvoice>,
    ) -> Result<Vec<InvoiceModel>, RepositoryError> {
        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        let repo = InvoiceRepository::new(&txn, self.tenant_id);
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
        patch: UpdateInvoice,
    ) -> Result<InvoiceModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Invoice"))?;
        self.apply_update(existing, patch).await
    }

    /// Creates the invoice with `invoice_number` if absent, otherwise patches it.
    pub async fn upsert(
        &self,
        invoice_number: &str,
        create: CreateInvoice,
        patch: UpdateInvoice,
    ) -> Result<InvoiceModel, RepositoryError> {
        match self.find_by_number(invoice_number).await? {
            Some(existing) => self.apply_update(existing, patch).await,
            None => {
                self.create(CreateInvoice {
                    invoice_number: invoice_number.to_string(),
                    ..create
                })
                .await
            }
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<InvoiceModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Invoice"))?;
        if existing.status == InvoiceStatus::Paid {
            return Err(RepositoryError::Validation(
                "Cannot delete paid invoices".to_string(),
            ));
        }

        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        delete_items(&txn, &[existing.id]).await?;
        Invoice::delete_by_id(existing.id)
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        txn.commit().await.map_err(RepositoryError::database_error)?;
        Ok(existing)
    }

    /// Deletes every matching invoice with its items; refuses if any is paid.
    pub async fn delete_many(
        &self,
        filter: Option<&Filter<InvoiceField>>,
    ) -> Result<u64, RepositoryError> {
        let matches: Vec<(Uuid, InvoiceStatus)> = exec::select(self.scope(), filter)?
            .select_only()
            .column(invoice::Column::Id)
            .column(invoice::Column::Status)
            .into_tuple()
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        if matches.is_empty() {
            return Ok(0);
        }
        if matches.iter().any(|(_, status)| *status == InvoiceStatus::Paid) {
            return Err(RepositoryError::Validation(
                "Cannot delete paid invoices".to_string(),
            ));
        }
        let ids: Vec<Uuid> = matches.into_iter().map(|(id, _)| id).collect();

        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        delete_items(&txn, &ids).await?;
        let result = Invoice::delete_many()
            .filter(self.scope())
            .filter(invoice::Column::Id.is_in(ids))
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        txn.commit().await.map_err(RepositoryError::database_error)?;
        Ok(result.rows_affected)
    }

    /// Marks the invoice as sent now. Paid or cancelled invoices stay as they are.
    pub async fn mark_sent(&self, id: Uuid) -> Result<InvoiceModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Invoice"))?;
        if matches!(existing.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled) {
            return Err(RepositoryError::Validation(format!(
                "Cannot send an invoice with status {:?}",
                existing.status
            )));
        }

        let timestamp = now();
        let mut active = existing.into_active_model();
        active.status = Set(InvoiceStatus::Sent);
        active.sent_at = Set(Some(timestamp));
        active.updated_at = Set(timestamp);
        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Marks the invoice as paid now.
    pub async fn mark_paid(&self, id: Uuid) -> Result<InvoiceModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Invoice"))?;
        if existing.status == InvoiceStatus::Cancelled {
            return Err(RepositoryError::Validation(
                "Cannot mark a cancelled invoice as paid".to_string(),
            ));
        }

        let timestamp = now();
        let mut active = existing.into_active_model();
        active.status = Set(InvoiceStatus::Paid);
        active.paid_at = Set(Some(timestamp));
        active.updated_at = Set(timestamp);
        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    async fn apply_update(
        &self,
        existing: InvoiceModel,
        patch: UpdateInvoice,
    ) -> Result<InvoiceModel, RepositoryError> {
        if let Some(customer_id) = patch.customer_id {
            ensure_tenant_customer(self.db, self.tenant_id, customer_id).await?;
        }
        if let Some(items) = &patch.items {
            validate_items(items)?;
        }

        let invoice_id = existing.id;
        let mut active = existing.into_active_model();
        if let Some(customer_id) = patch.customer_id {
            active.customer_id = Set(customer_id);
        }
        if let Some(number) = patch.invoice_number {
            require_non_blank(&number, "Invoice number")?;
            active.invoice_number = Set(number.trim().to_string());
        }
        if let Some(date) = patch.date {
            active.date = Set(to_utc(date));
        }
        if let Some(due_date) = patch.due_date {
            active.due_date = Set(to_utc(due_date));
        }
        if let Some(status) = patch.status {
            active.status = Set(status);
        }
        set_some(&mut active.payment_terms, patch.payment_terms);
        set_some(&mut active.payment_method, patch.payment_method);
        set_some(&mut active.notes, patch.notes);
        set_some(&mut active.metadata, patch.metadata);
        active.updated_at = Set(now());

        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        if let Some(items) = patch.items {
            let lines: Vec<TaxedLine> = items.iter().map(InvoiceItemInput::taxed_line).collect();
            let sums = totals::compute(&lines);
            active.subtotal = Set(sums.subtotal);
            active.total = Set(sums.total);
            delete_items(&txn, &[invoice_id]).await?;
            insert_items(&txn, invoice_id, items, &sums.line_totals).await?;
        }
        let updated = active
            .update(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        txn.commit().await.map_err(RepositoryError::database_error)?;
        Ok(updated)
    }
}

fn list_filter(criteria: &InvoiceListFilter) -> Filter<InvoiceField> {
    let mut parts = Vec::new();
    if let Some(status) = criteria.status {
        parts.push(Filter::eq(InvoiceField::Status, serde_json::json!(status)));
    }
    if let Some(customer_id) = criteria.customer_id {
        parts.push(Filter::eq(InvoiceField::CustomerId, customer_id.to_string()));
    }
    if let Some(from) = criteria.from {
        parts.push(Filter::binary(InvoiceField::Date, FilterOp::Gte, to_utc(from).to_rfc3339()));
    }
    if let Some(to) = criteria.to {
        parts.push(Filter::binary(InvoiceField::Date, FilterOp::Lte, to_utc(to).to_rfc3339()));
    }
    Filter::and(parts)
}

fn validate_items(items: &[InvoiceItemInput]) -> Result<(), RepositoryError> {
    for (index, item) in items.iter().enumerate() {
        if item.description.trim().is_empty() {
            return Err(RepositoryError::Validation(format!(
                "line {}: description cannot be empty",
                index + 1
            )));
        }
    }
    let lines: Vec<TaxedLine> = items.iter().map(InvoiceItemInput::taxed_line).collect();
    validate_lines(&lines)
}

async fn insert_items<C: ConnectionTrait>(
    db: &C,
    invoice_id: Uuid,
    items: Vec<InvoiceItemInput>,
    line_totals: &[rust_decimal::Decimal],
) -> Result<(), RepositoryError> {
    let timestamp = now();
    let models: Vec<invoice_item::ActiveModel> = items
        .into_iter()
        .zip(line_totals.iter().copied())
        .enumerate()
        .map(|(position, (item, total))| invoice_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            invoice_id: Set(invoice_id),
            description: Set(item.description.trim().to_string()),
            quantity: Set(item.quantity),
            price: Set(item.price),
            total: Set(total),
            tax_rate: Set(item.tax_rate),
            unit: Set(item.unit),
            // Items are read back ordered by creation time
            created_at: Set(timestamp + Duration::microseconds(position as i64)),
        })
        .collect();
    if models.is_empty() {
        return Ok(());
    }

    invoice_item::Entity::insert_many(models)
        .exec(db)
        .await
        .map_err(RepositoryError::database_error)?;
    Ok(())
}

async fn delete_items<C: ConnectionTrait>(db: &C, invoice_ids: &[Uuid]) -> Result<(), RepositoryError> {
    invoice_item::Entity::delete_many()
        .filter(invoice_item::Column::InvoiceId.is_in(invoice_ids.iter().copied()))
        .exec(db)
        .await
        .map_err(RepositoryError::database_error)?;
    Ok(())
}
