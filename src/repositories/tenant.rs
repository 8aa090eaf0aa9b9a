//! # Tenant Repository
//!
//! Tenants are the root of the ownership tree and are not themselves
//! tenant-scoped. Registration creates a tenant together with its first
//! administrator in one transaction.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::user::{self, CreateUser, UserRepository};
use super::{
    normalize_email, now, require_non_blank, scoped_read_verbs, set_some, validate_email,
};
use crate::db::begin_transaction;
use crate::error::RepositoryError;
use crate::models::tenant::{self, Entity as Tenant, Model as TenantModel};
use crate::models::{Plan, UserRole, user::Model as UserModel};
use crate::password;
use crate::query::{Filter, TenantField, exec};

const DEFAULT_COUNTRY: &str = "DE";

/// Input for creating a tenant.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateTenant {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    /// ISO country code (default `DE`)
    pub country: Option<String>,
    pub vat_id: Option<String>,
    pub tax_number: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_holder: Option<String>,
    pub contact_person: Option<String>,
    pub website: Option<String>,
    /// Subscription plan (default `STARTER`)
    pub plan: Option<Plan>,
}

/// Partial tenant update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub vat_id: Option<String>,
    pub tax_number: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_holder: Option<String>,
    pub contact_person: Option<String>,
    pub website: Option<String>,
    pub plan: Option<Plan>,
    pub is_active: Option<bool>,
}

/// Self-service sign-up: a company and its first administrator.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterTenant {
    pub company_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Delegate for the `tenants` table.
pub struct TenantRepository<'a, C = DatabaseConnection> {
    db: &'a C,
}

impl<'a, C> TenantRepository<'a, C>
where
    C: ConnectionTrait + TransactionTrait,
{
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    fn scope(&self) -> Condition {
        Condition::all()
    }

    scoped_read_verbs!(TenantField, TenantModel);

    pub async fn find_unique(&self, id: Uuid) -> Result<Option<TenantModel>, RepositoryError> {
        Tenant::find_by_id(id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<TenantModel>, RepositoryError> {
        Tenant::find()
            .filter(tenant::Column::Email.eq(normalize_email(email)))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn create(&self, input: CreateTenant) -> Result<TenantModel, RepositoryError> {
        require_non_blank(&input.name, "Tenant name")?;
        let email = validate_email(&input.email)?;
        let timestamp = now();

        let tenant = tenant::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            email: Set(email),
            phone: Set(input.phone),
            street: Set(input.street),
            city: Set(input.city),
            postal_code: Set(input.postal_code),
            country: Set(input.country.unwrap_or_else(|| DEFAULT_COUNTRY.to_string())),
            vat_id: Set(input.vat_id),
            tax_number: Set(input.tax_number),
            iban: Set(input.iban),
            bic: Set(input.bic),
            bank_name: Set(input.bank_name),
            bank_account_holder: Set(input.bank_account_holder),
            contact_person: Set(input.contact_person),
            website: Set(input.website),
            plan: Set(input.plan.unwrap_or(Plan::Starter)),
            is_active: Set(true),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
        };

        tenant
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Inserts every input or none of them; results keep input order.
    pub async fn create_many_and_return(
        &self,
        inputs: Vec<CreateTenant>,
    ) -> Result<Vec<TenantModel>, RepositoryError> {
        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        let repo = TenantRepository::new(&txn);
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
        patch: UpdateTenant,
    ) -> Result<TenantModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Tenant"))?;
        self.apply_update(existing, patch).await
    }

    /// Creates the tenant with `email` if absent, otherwise applies `patch`.
    pub async fn upsert(
        &self,
        email: &str,
        create: CreateTenant,
        patch: UpdateTenant,
    ) -> Result<TenantModel, RepositoryError> {
        match self.find_by_email(email).await? {
            Some(existing) => self.apply_update(existing, patch).await,
            None => {
                self.create(CreateTenant {
                    email: email.to_string(),
                    ..create
                })
                .await
            }
        }
    }

    /// Deletes the tenant and, through cascading keys, everything it owns.
    pub async fn delete(&self, id: Uuid) -> Result<TenantModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Tenant"))?;
        existing
            .clone()
            .delete(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(existing)
    }

    pub async fn delete_many(
        &self,
        filter: Option<&Filter<TenantField>>,
    ) -> Result<u64, RepositoryError> {
        exec::delete_many(self.db, self.scope(), filter).await
    }

    /// Creates a tenant and its first `ADMIN` user atomically.
    pub async fn register(
        &self,
        input: RegisterTenant,
    ) -> Result<(TenantModel, UserModel), RepositoryError> {
        require_non_blank(&input.company_name, "Company name")?;
        password::validate_strength(&input.password)
            .map_err(|e| RepositoryError::Validation(e.to_string()))?;
        let email = validate_email(&input.email)?;

        if user::find_by_email_global(self.db, &email).await?.is_some()
            || self.find_by_email(&email).await?.is_some()
        {
            return Err(RepositoryError::Conflict(
                "Email is already registered".to_string(),
            ));
        }

        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;

        let tenant = TenantRepository::new(&txn)
            .create(CreateTenant {
                name: input.company_name,
                email: email.clone(),
                ..CreateTenant::default()
            })
            .await?;

        let admin = UserRepository::new(&txn, tenant.id)
            .create(CreateUser {
                email,
                password: input.password,
                first_name: input.first_name,
                last_name: input.last_name,
                role: Some(UserRole::Admin),
            })
            .await?;

        txn.commit().await.map_err(RepositoryError::database_error)?;

        tracing::info!(tenant_id = %tenant.id, user_id = %admin.id, "Registered tenant");
        Ok((tenant, admin))
    }

    async fn apply_update(
        &self,
        existing: TenantModel,
        patch: UpdateTenant,
    ) -> Result<TenantModel, RepositoryError> {
        let mut active = existing.into_active_model();
        if let Some(name) = patch.name {
            require_non_blank(&name, "Tenant name")?;
            active.name = Set(name.trim().to_string());
        }
        if let Some(email) = patch.email {
            active.email = Set(validate_email(&email)?);
        }
        if let Some(country) = patch.country {
            active.country = Set(country);
        }
        if let Some(plan) = patch.plan {
            active.plan = Set(plan);
        }
        if let Some(is_active) = patch.is_active {
            active.is_active = Set(is_active);
        }
        set_some(&mut active.phone, patch.phone);
        set_some(&mut active.street, patch.street);
        set_some(&mut active.city, patch.city);
        set_some(&mut active.postal_code, patch.postal_code);
        set_some(&mut active.vat_id, patch.vat_id);
        set_some(&mut active.tax_number, patch.tax_number);
        set_some(&mut active.iban, patch.iban);
        set_some(&mut active.bic, patch.bic);
        set_some(&mut active.bank_name, patch.bank_name);
        set_some(&mut active.bank_account_holder, patch.bank_account_holder);
        set_some(&mut active.contact_person, patch.contact_person);
        set_some(&mut active.website, patch.website);
        active.updated_at = Set(now());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FindManyArgs, OrderBy};
    use crate::repositories::testing::memory_db;

    fn input(name: &str, email: &str) -> CreateTenant {
        CreateTenant {
            name: name.to_string(),
            email: email.to_string(),
            ..CreateTenant::default()
        }
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let db = memory_db().await;
        let repo = TenantRepository::new(&db);

        let tenant = repo.create(input("Muster GmbH", " Info@Muster.de ")).await.unwrap();

        assert_eq!(tenant.email, "info@muster.de");
        assert_eq!(tenant.country, "DE");
        assert_eq!(tenant.plan, Plan::Starter);
        assert!(tenant.is_active);
        assert_eq!(
            repo.find_by_email("INFO@muster.de").await.unwrap().map(|t| t.id),
            Some(tenant.id)
        );
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let db = memory_db().await;
        let repo = TenantRepository::new(&db);
        repo.create(input("A", "a@example.com")).await.unwrap();

        let err = repo.create(input("B", "a@example.com")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn create_many_is_all_or_nothing() {
        let db = memory_db().await;
        let repo = TenantRepository::new(&db);

        let err = repo
            .create_many_and_return(vec![
                input("One", "one@example.com"),
                input("Two", "one@example.com"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(repo.count(None).await.unwrap(), 0);

        let created = repo
            .create_many_and_return(vec![
                input("One", "one@example.com"),
                input("Two", "two@example.com"),
            ])
            .await
            .unwrap();
        assert_eq!(
            created.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            ["One", "Two"]
        );
    }

    #[tokio::test]
    async fn upsert_creates_then_patches() {
        let db = memory_db().await;
        let repo = TenantRepository::new(&db);
        let patch = UpdateTenant {
            plan: Some(Plan::Enterprise),
            ..UpdateTenant::default()
        };

        let first = repo
            .upsert("up@example.com", input("Up", ""), patch.clone())
            .await
            .unwrap();
        assert_eq!(first.plan, Plan::Starter);

        let second = repo
            .upsert("up@example.com", input("Up", ""), patch)
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.plan, Plan::Enterprise);
    }

    #[tokio::test]
    async fn update_and_delete_missing_tenant() {
        let db = memory_db().await;
        let repo = TenantRepository::new(&db);

        assert!(matches!(
            repo.update(Uuid::new_v4(), UpdateTenant::default()).await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete(Uuid::new_v4()).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn register_creates_admin_atomically() {
        let db = memory_db().await;
        let repo = TenantRepository::new(&db);
        let registration = RegisterTenant {
            company_name: "Demo GmbH".into(),
            first_name: "Max".into(),
            last_name: "Mustermann".into(),
            email: "admin@demo.de".into(),
            password: "Demo1234".into(),
        };

        let (tenant, admin) = repo.register(registration.clone()).await.unwrap();
        assert_eq!(admin.tenant_id, tenant.id);
        assert_eq!(admin.role, UserRole::Admin);
        assert_ne!(admin.password_hash, "Demo1234");

        let err = repo.register(registration).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(repo.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn register_rejects_weak_password() {
        let db = memory_db().await;
        let err = TenantRepository::new(&db)
            .register(RegisterTenant {
                company_name: "Weak".into(),
                first_name: "A".into(),
                last_name: "B".into(),
                email: "weak@example.com".into(),
                password: "short".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
    }

    #[tokio::test]
    async fn find_many_orders_by_name() {
        let db = memory_db().await;
        let repo = TenantRepository::new(&db);
        for name in ["Zeta", "Alpha", "Mid"] {
            repo.create(input(name, &format!("{}@example.com", name.to_lowercase())))
                .await
                .unwrap();
        }

        let names: Vec<_> = repo
            .find_many(&FindManyArgs::default().order_by(OrderBy::asc(TenantField::Name)))
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["Alpha", "Mid", "Zeta"]);
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("x@y.de").is_ok());
        assert!(validate_email("nope").is_err());
        assert!(validate_email("@y.de").is_err());
    }
}
