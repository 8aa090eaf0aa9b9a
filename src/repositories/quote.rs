//! # Quote Repository
//!
//! Quotes have no stored line items; totals are computed from the lines
//! supplied at create/update time.

use chrono::{DateTime, FixedOffset};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::customer::ensure_tenant_customer;
use super::{now, require_non_blank, scoped_read_verbs, set_some, to_utc};
use crate::db::begin_transaction;
use crate::error::RepositoryError;
use crate::models::QuoteStatus;
use crate::models::quote::{self, Entity as Quote, Model as QuoteModel};
use crate::query::{Filter, QuoteField, exec};
use crate::services::{TaxedLine, totals};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateQuote {
    pub customer_id: Uuid,
    pub quote_number: String,
    pub date: DateTime<FixedOffset>,
    pub valid_until: DateTime<FixedOffset>,
    /// Priced lines the totals are computed from
    #[serde(default)]
    pub lines: Vec<TaxedLine>,
    /// Defaults to `DRAFT`
    pub status: Option<QuoteStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateQuote {
    pub customer_id: Option<Uuid>,
    pub quote_number: Option<String>,
    pub date: Option<DateTime<FixedOffset>>,
    pub valid_until: Option<DateTime<FixedOffset>>,
    /// Replaces the totals when present
    pub lines: Option<Vec<TaxedLine>>,
    pub status: Option<QuoteStatus>,
    pub notes: Option<String>,
}

pub struct QuoteRepository<'a, C = DatabaseConnection> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C> QuoteRepository<'a, C>
where
    C: ConnectionTrait + TransactionTrait,
{
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    fn scope(&self) -> Condition {
        Condition::all().add(quote::Column::TenantId.eq(self.tenant_id))
    }

    scoped_read_verbs!(QuoteField, QuoteModel);

    pub async fn find_unique(&self, id: Uuid) -> Result<Option<QuoteModel>, RepositoryError> {
        Quote::find_by_id(id)
            .filter(self.scope())
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_by_number(
        &self,
        quote_number: &str,
    ) -> Result<Option<QuoteModel>, RepositoryError> {
        Quote::find()
            .filter(self.scope())
            .filter(quote::Column::QuoteNumber.eq(quote_number))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn create(&self, input: CreateQuote) -> Result<QuoteModel, RepositoryError> {
        require_non_blank(&input.quote_number, "Quote number")?;
        validate_lines(&input.lines)?;
        ensure_tenant_customer(self.db, self.tenant_id, input.customer_id).await?;

        let sums = totals::compute(&input.lines);
        let timestamp = now();
        let quote = quote::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(self.tenant_id),
            customer_id: Set(input.customer_id),
            quote_number: Set(input.quote_number.trim().to_string()),
            date: Set(to_utc(input.date)),
            valid_until: Set(to_utc(input.valid_until)),
            subtotal: Set(sums.subtotal),
            total: Set(sums.total),
            status: Set(input.status.unwrap_or(QuoteStatus::Draft)),
            notes: Set(input.notes),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
        };

        quote
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn create_many_and_return(
        &self,
        inputs: Vec<CreateQuote>,
    ) -> Result<Vec<QuoteModel>, RepositoryError> {
        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        let repo = QuoteRepository::new(&txn, self.tenant_id);
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(repo.create(input).await?);
        }
        txn.commit().await.map_err(RepositoryError::database_error)?;
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, patch: UpdateQuote) -> Result<QuoteModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Quote"))?;
        self.apply_update(existing, patch).await
    }

    /// Creates the quote with `quote_number` if absent, otherwise patches it.
    pub async fn upsert(
        &self,
        quote_number: &str,
        create: CreateQuote,
        patch: UpdateQuote,
    ) -> Result<QuoteModel, RepositoryError> {
        match self.find_by_number(quote_number).await? {
            Some(existing) => self.apply_update(existing, patch).await,
            None => {
                self.create(CreateQuote {
                    quote_number: quote_number.to_string(),
                    ..create
                })
                .await
            }
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<QuoteModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Quote"))?;
        existing
            .clone()
            .delete(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(existing)
    }

    pub async fn delete_many(
        &self,
        filter: Option<&Filter<QuoteField>>,
    ) -> Result<u64, RepositoryError> {
        exec::delete_many(self.db, self.scope(), filter).await
    }

    async fn apply_update(
        &self,
        existing: QuoteModel,
        patch: UpdateQuote,
    ) -> Result<QuoteModel, RepositoryError> {
        let mut active = existing.into_active_model();
        if let Some(customer_id) = patch.customer_id {
            ensure_tenant_customer(self.db, self.tenant_id, customer_id).await?;
            active.customer_id = Set(customer_id);
        }
        if let Some(number) = patch.quote_number {
            require_non_blank(&number, "Quote number")?;
            active.quote_number = Set(number.trim().to_string());
        }
        if let Some(date) = patch.date {
            active.date = Set(to_utc(date));
        }
        if let Some(valid_until) = patch.valid_until {
            active.valid_until = Set(to_utc(valid_until));
        }
        if let Some(lines) = patch.lines {
            validate_lines(&lines)?;
            let sums = totals::compute(&lines);
            active.subtotal = Set(sums.subtotal);
            active.total = Set(sums.total);
        }
        if let Some(status) = patch.status {
            active.status = Set(status);
        }
        set_some(&mut active.notes, patch.notes);
        active.updated_at = Set(now());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}

pub(crate) fn validate_lines(lines: &[TaxedLine]) -> Result<(), RepositoryError> {
    for (index, line) in lines.iter().enumerate() {
        totals::validate_line(line)
            .map_err(|reason| RepositoryError::Validation(format!("line {}: {reason}", index + 1)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::testing::{memory_db, tenant};
    use crate::repositories::{CreateCustomer, CustomerRepository};
    use rust_decimal::Decimal;

    fn line(quantity: i64, price: i64, tax_rate: i64) -> TaxedLine {
        TaxedLine {
            quantity: Decimal::from(quantity),
            price: Decimal::from(price),
            tax_rate: Decimal::from(tax_rate),
        }
    }

    fn quote_for(customer_id: Uuid, number: &str) -> CreateQuote {
        CreateQuote {
            customer_id,
            quote_number: number.to_string(),
            date: now(),
            valid_until: now(),
            lines: vec![line(2, 50, 19)],
            status: None,
            notes: None,
        }
    }

    async fn customer(db: &DatabaseConnection, tenant_id: Uuid) -> Uuid {
        CustomerRepository::new(db, tenant_id)
            .create(CreateCustomer {
                name: "Kunde".into(),
                ..CreateCustomer::default()
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn create_computes_totals() {
        let db = memory_db().await;
        let tenant_id = tenant(&db, "A").await;
        let customer_id = customer(&db, tenant_id).await;

        let quote = QuoteRepository::new(&db, tenant_id)
            .create(quote_for(customer_id, "AN-2024-001"))
            .await
            .unwrap();

        assert_eq!(quote.subtotal, Decimal::from(100));
        assert_eq!(quote.total, Decimal::from(119));
        assert_eq!(quote.status, QuoteStatus::Draft);
    }

    #[tokio::test]
    async fn foreign_customer_is_rejected() {
        let db = memory_db().await;
        let a = tenant(&db, "A").await;
        let b = tenant(&db, "B").await;
        let foreign_customer = customer(&db, b).await;

        let err = QuoteRepository::new(&db, a)
            .create(quote_for(foreign_customer, "AN-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn quote_numbers_are_unique_per_tenant_only() {
        let db = memory_db().await;
        let a = tenant(&db, "A").await;
        let b = tenant(&db, "B").await;
        let customer_a = customer(&db, a).await;
        let customer_b = customer(&db, b).await;

        QuoteRepository::new(&db, a).create(quote_for(customer_a, "AN-1")).await.unwrap();
        QuoteRepository::new(&db, b).create(quote_for(customer_b, "AN-1")).await.unwrap();
        let err = QuoteRepository::new(&db, a)
            .create(quote_for(customer_a, "AN-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_recomputes_totals_and_status() {
        let db = memory_db().await;
        let tenant_id = tenant(&db, "A").await;
        let customer_id = customer(&db, tenant_id).await;
        let repo = QuoteRepository::new(&db, tenant_id);
        let quote = repo.create(quote_for(customer_id, "AN-1")).await.unwrap();

        let updated = repo
            .update(
                quote.id,
                UpdateQuote {
                    lines: Some(vec![line(1, 1000, 7)]),
                    status: Some(QuoteStatus::Accepted),
                    ..UpdateQuote::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.subtotal, Decimal::from(1000));
        assert_eq!(updated.total, Decimal::from(1070));
        assert_eq!(updated.status, QuoteStatus::Accepted);
        assert!(updated.updated_at >= quote.updated_at);
    }
}
