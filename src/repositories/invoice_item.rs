//! # Invoice Item Repository
//!
//! Items carry no tenant column; the delegate scopes every statement through
//! the owning invoice's tenant. Any item write recomputes the parent invoice
//! totals in the same transaction.

use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{now, require_non_blank, scoped_read_verbs, set_some};
use crate::db::begin_transaction;
use crate::error::RepositoryError;
use crate::models::invoice::{self, Entity as Invoice};
use crate::models::invoice_item::{self, Entity as InvoiceItem, Model as InvoiceItemModel};
use crate::query::{Filter, InvoiceItemField, exec};
use crate::services::{TaxedLine, totals};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateInvoiceItem {
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub tax_rate: Decimal,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateInvoiceItem {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub unit: Option<String>,
}

pub struct InvoiceItemRepository<'a, C = DatabaseConnection> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C> InvoiceItemRepository<'a, C>
where
    C: ConnectionTrait + TransactionTrait,
{
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    fn scope(&self) -> Condition {
        Condition::all().add(
            invoice_item::Column::InvoiceId.in_subquery(
                Query::select()
                    .column(invoice::Column::Id)
                    .from(invoice::Entity)
                    .and_where(invoice::Column::TenantId.eq(self.tenant_id))
                    .to_owned(),
            ),
        )
    }

    scoped_read_verbs!(InvoiceItemField, InvoiceItemModel);

    pub async fn find_unique(&self, id: Uuid) -> Result<Option<InvoiceItemModel>, RepositoryError> {
        InvoiceItem::find_by_id(id)
            .filter(self.scope())
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Items of one invoice in insertion order.
    pub async fn find_by_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceItemModel>, RepositoryError> {
        InvoiceItem::find()
            .filter(self.scope())
            .filter(invoice_item::Column::InvoiceId.eq(invoice_id))
            .order_by_asc(invoice_item::Column::CreatedAt)
            .order_by_asc(invoice_item::Column::Id)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn create(&self, input: CreateInvoiceItem) -> Result<InvoiceItemModel, RepositoryError> {
        self.ensure_invoice(input.invoice_id).await?;
        let line = TaxedLine {
            quantity: input.quantity,
            price: input.price,
            tax_rate: input.tax_rate,
        };
        validate(&input.description, &line)?;

        let item = invoice_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            invoice_id: Set(input.invoice_id),
            description: Set(input.description.trim().to_string()),
            quantity: Set(line.quantity),
            price: Set(line.price),
            total: Set(totals::line_total(line.quantity, line.price)),
            tax_rate: Set(line.tax_rate),
            unit: Set(input.unit),
            created_at: Set(now()),
        };

        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        let created = item
            .insert(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        refresh_invoice_totals(&txn, created.invoice_id).await?;
        txn.commit().await.map_err(RepositoryError::database_error)?;
        Ok(created)
    }

    pub async fn create_many_and_return(
        &self,
        inputs: Vec<CreateInvoiceItem>,
    ) -> Result<Vec<InvoiceItemModel>, RepositoryError> {
        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        let repo = InvoiceItemRepository::new(&txn, self.tenant_id);
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
        patch: UpdateInvoiceItem,
    ) -> Result<InvoiceItemModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Invoice item"))?;

        let line = TaxedLine {
            quantity: patch.quantity.unwrap_or(existing.quantity),
            price: patch.price.unwrap_or(existing.price),
            tax_rate: patch.tax_rate.unwrap_or(existing.tax_rate),
        };
        let description = patch
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or_else(|| existing.description.clone());
        validate(&description, &line)?;

        let invoice_id = existing.invoice_id;
        let mut active = existing.into_active_model();
        active.description = Set(description);
        active.quantity = Set(line.quantity);
        active.price = Set(line.price);
        active.tax_rate = Set(line.tax_rate);
        active.total = Set(totals::line_total(line.quantity, line.price));
        set_some(&mut active.unit, patch.unit);

        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        let updated = active
            .update(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        refresh_invoice_totals(&txn, invoice_id).await?;
        txn.commit().await.map_err(RepositoryError::database_error)?;
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<InvoiceItemModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Invoice item"))?;

        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        InvoiceItem::delete_by_id(existing.id)
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        refresh_invoice_totals(&txn, existing.invoice_id).await?;
        txn.commit().await.map_err(RepositoryError::database_error)?;
        Ok(existing)
    }

    pub async fn delete_many(
        &self,
        filter: Option<&Filter<InvoiceItemField>>,
    ) -> Result<u64, RepositoryError> {
        let affected: Vec<Uuid> = exec::select(self.scope(), filter)?
            .select_only()
            .column(invoice_item::Column::InvoiceId)
            .distinct()
            .into_tuple()
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        let removed = exec::delete_many(&txn, self.scope(), filter).await?;
        for invoice_id in affected {
            refresh_invoice_totals(&txn, invoice_id).await?;
        }
        txn.commit().await.map_err(RepositoryError::database_error)?;
        Ok(removed)
    }

    async fn ensure_invoice(&self, invoice_id: Uuid) -> Result<(), RepositoryError> {
        let exists = Invoice::find_by_id(invoice_id)
            .filter(invoice::Column::TenantId.eq(self.tenant_id))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?
            > 0;
        if !exists {
            return Err(RepositoryError::not_found("Invoice"));
        }
        Ok(())
    }
}

fn validate(description: &str, line: &TaxedLine) -> Result<(), RepositoryError> {
    require_non_blank(description, "Description")?;
    totals::validate_line(line).map_err(|reason| RepositoryError::Validation(reason.to_string()))
}

/// Recomputes `subtotal` and `total` of an invoice from its stored items.
async fn refresh_invoice_totals<C: ConnectionTrait>(
    db: &C,
    invoice_id: Uuid,
) -> Result<(), RepositoryError> {
    let lines: Vec<TaxedLine> = InvoiceItem::find()
        .filter(invoice_item::Column::InvoiceId.eq(invoice_id))
        .all(db)
        .await
        .map_err(RepositoryError::database_error)?
        .into_iter()
        .map(|item| TaxedLine {
            quantity: item.quantity,
            price: item.price,
            tax_rate: item.tax_rate,
        })
        .collect();
    let sums = totals::compute(&lines);

    Invoice::update_many()
        .col_expr(invoice::Column::Subtotal, Expr::value(sums.subtotal))
        .col_expr(invoice::Column::Total, Expr::value(sums.total))
        .col_expr(invoice::Column::UpdatedAt, Expr::value(now()))
        .filter(invoice::Column::Id.eq(invoice_id))
        .exec(db)
        .await
        .map_err(RepositoryError::database_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::testing::{memory_db, tenant};
    use crate::repositories::{
        CreateCustomer, CreateInvoice, CustomerRepository, InvoiceItemInput, InvoiceRepository,
    };

    fn d(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    async fn invoice(db: &DatabaseConnection, tenant_id: Uuid) -> Uuid {
        let customer_id = CustomerRepository::new(db, tenant_id)
            .create(CreateCustomer {
                name: "Kunde".into(),
                ..CreateCustomer::default()
            })
            .await
            .unwrap()
            .id;
        InvoiceRepository::new(db, tenant_id)
            .create(CreateInvoice {
                customer_id,
                invoice_number: "RE-1".into(),
                date: now(),
                due_date: now(),
                items: vec![InvoiceItemInput {
                    description: "Montage".into(),
                    quantity: d("2"),
                    price: d("50"),
                    tax_rate: d("19"),
                    unit: None,
                }],
                payment_terms: None,
                payment_method: None,
                notes: None,
                metadata: None,
                status: None,
            })
            .await
            .unwrap()
            .id
    }

    fn extra(invoice_id: Uuid) -> CreateInvoiceItem {
        CreateInvoiceItem {
            invoice_id,
            description: "Material".into(),
            quantity: d("1"),
            price: d("100"),
            tax_rate: d("7"),
            unit: Some("Pauschal".into()),
        }
    }

    #[tokio::test]
    async fn item_writes_refresh_invoice_totals() {
        let db = memory_db().await;
        let tenant_id = tenant(&db, "A").await;
        let invoice_id = invoice(&db, tenant_id).await;
        let repo = InvoiceItemRepository::new(&db, tenant_id);
        let invoices = InvoiceRepository::new(&db, tenant_id);

        let item = repo.create(extra(invoice_id)).await.unwrap();
        assert_eq!(item.total, d("100"));
        let header = invoices.find_unique(invoice_id).await.unwrap().unwrap();
        assert_eq!((header.subtotal, header.total), (d("200"), d("226")));

        repo.update(
            item.id,
            UpdateInvoiceItem {
                quantity: Some(d("2")),
                ..UpdateInvoiceItem::default()
            },
        )
        .await
        .unwrap();
        let header = invoices.find_unique(invoice_id).await.unwrap().unwrap();
        assert_eq!((header.subtotal, header.total), (d("300"), d("333")));

        repo.delete(item.id).await.unwrap();
        let header = invoices.find_unique(invoice_id).await.unwrap().unwrap();
        assert_eq!((header.subtotal, header.total), (d("100"), d("119")));
    }

    #[tokio::test]
    async fn items_are_scoped_through_the_invoice_tenant() {
        let db = memory_db().await;
        let a = tenant(&db, "A").await;
        let b = tenant(&db, "B").await;
        let invoice_id = invoice(&db, a).await;

        let foreign = InvoiceItemRepository::new(&db, b);
        assert_eq!(foreign.count(None).await.unwrap(), 0);
        assert!(matches!(
            foreign.create(extra(invoice_id)).await,
            Err(RepositoryError::NotFound(_))
        ));
        assert_eq!(foreign.delete_many(None).await.unwrap(), 0);

        let own = InvoiceItemRepository::new(&db, a);
        assert_eq!(own.count(None).await.unwrap(), 1);
        assert_eq!(own.find_by_invoice(invoice_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_many_refreshes_totals() {
        let db = memory_db().await;
        let tenant_id = tenant(&db, "A").await;
        let invoice_id = invoice(&db, tenant_id).await;
        let repo = InvoiceItemRepository::new(&db, tenant_id);

        assert_eq!(repo.delete_many(None).await.unwrap(), 1);
        let header = InvoiceRepository::new(&db, tenant_id)
            .find_unique(invoice_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(header.total, Decimal::ZERO);
    }
}
