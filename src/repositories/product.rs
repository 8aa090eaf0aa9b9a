//! # Product Repository

use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{now, require_non_blank, scoped_read_verbs, set_some};
use crate::db::begin_transaction;
use crate::error::RepositoryError;
use crate::models::product::{self, Entity as Product, Model as ProductModel};
use crate::query::{Filter, ProductField, exec};

const DEFAULT_TAX_RATE: i64 = 19;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub unit: Option<String>,
    /// Percent, defaults to 19
    pub tax_rate: Option<Decimal>,
    /// Left empty for services
    pub stock: Option<Decimal>,
    pub min_stock: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub unit: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub stock: Option<Decimal>,
    pub min_stock: Option<Decimal>,
    pub is_active: Option<bool>,
}

pub struct ProductRepository<'a, C = DatabaseConnection> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C> ProductRepository<'a, C>
where
    C: ConnectionTrait + TransactionTrait,
{
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    fn scope(&self) -> Condition {
        Condition::all().add(product::Column::TenantId.eq(self.tenant_id))
    }

    scoped_read_verbs!(ProductField, ProductModel);

    pub async fn find_unique(&self, id: Uuid) -> Result<Option<ProductModel>, RepositoryError> {
        Product::find_by_id(id)
            .filter(self.scope())
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Active stocked products at or below their restock threshold.
    pub async fn find_low_stock(&self) -> Result<Vec<ProductModel>, RepositoryError> {
        Product::find()
            .filter(self.scope())
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::Stock.is_not_null())
            .filter(product::Column::MinStock.is_not_null())
            .filter(
                Expr::col((product::Entity, product::Column::Stock))
                    .lte(Expr::col((product::Entity, product::Column::MinStock))),
            )
            .order_by_asc(product::Column::Name)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn create(&self, input: CreateProduct) -> Result<ProductModel, RepositoryError> {
        self.insert(Uuid::new_v4(), input).await
    }

    async fn insert(&self, id: Uuid, input: CreateProduct) -> Result<ProductModel, RepositoryError> {
        require_non_blank(&input.name, "Product name")?;
        let tax_rate = input.tax_rate.unwrap_or(Decimal::from(DEFAULT_TAX_RATE));
        validate_amounts(Some(input.price), Some(tax_rate), input.stock, input.min_stock)?;

        let timestamp = now();
        let product = product::ActiveModel {
            id: Set(id),
            tenant_id: Set(self.tenant_id),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            price: Set(input.price),
            unit: Set(input.unit),
            tax_rate: Set(tax_rate),
            stock: Set(input.stock),
            min_stock: Set(input.min_stock),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
        };

        product
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn create_many_and_return(
        &self,
        inputs: Vec<CreateProduct>,
    ) -> Result<Vec<ProductModel>, RepositoryError> {
        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        let repo = ProductRepository::new(&txn, self.tenant_id);
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(repo.create(input).await?);
        }
        txn.commit().await.map_err(RepositoryError::database_error)?;
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, patch: UpdateProduct) -> Result<ProductModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Product"))?;
        self.apply_update(existing, patch).await
    }

    /// Products have no natural key; the upsert is keyed by id and a
    /// created product keeps the given id.
    pub async fn upsert(
        &self,
        id: Uuid,
        create: CreateProduct,
        patch: UpdateProduct,
    ) -> Result<ProductModel, RepositoryError> {
        match self.find_unique(id).await? {
            Some(existing) => self.apply_update(existing, patch).await,
            None => self.insert(id, create).await,
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<ProductModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Product"))?;
        existing
            .clone()
            .delete(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(existing)
    }

    pub async fn delete_many(
        &self,
        filter: Option<&Filter<ProductField>>,
    ) -> Result<u64, RepositoryError> {
        exec::delete_many(self.db, self.scope(), filter).await
    }

    async fn apply_update(
        &self,
        existing: ProductModel,
        patch: UpdateProduct,
    ) -> Result<ProductModel, RepositoryError> {
        validate_amounts(patch.price, patch.tax_rate, patch.stock, patch.min_stock)?;

        let mut active = existing.into_active_model();
        if let Some(name) = patch.name {
            require_non_blank(&name, "Product name")?;
            active.name = Set(name.trim().to_string());
        }
        if let Some(price) = patch.price {
            active.price = Set(price);
        }
        if let Some(tax_rate) = patch.tax_rate {
            active.tax_rate = Set(tax_rate);
        }
        if let Some(is_active) = patch.is_active {
            active.is_active = Set(is_active);
        }
        set_some(&mut active.description, patch.description);
        set_some(&mut active.unit, patch.unit);
        set_some(&mut active.stock, patch.stock);
        set_some(&mut active.min_stock, patch.min_stock);
        active.updated_at = Set(now());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}

fn validate_amounts(
    price: Option<Decimal>,
    tax_rate: Option<Decimal>,
    stock: Option<Decimal>,
    min_stock: Option<Decimal>,
) -> Result<(), RepositoryError> {
    if price.is_some_and(|p| p.is_sign_negative()) {
        return Err(RepositoryError::Validation("price must not be negative".into()));
    }
    if tax_rate.is_some_and(|t| t.is_sign_negative() || t > Decimal::ONE_HUNDRED) {
        return Err(RepositoryError::Validation(
            "tax rate must be between 0 and 100".into(),
        ));
    }
    if min_stock.is_some_and(|m| m.is_sign_negative()) || stock.is_some_and(|s| s.is_sign_negative()) {
        return Err(RepositoryError::Validation("stock must not be negative".into()));
    }
    Ok(())
}
