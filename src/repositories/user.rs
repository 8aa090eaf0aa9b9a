//! # User Repository
//!
//! Users log in with an email that is unique across all tenants, so lookups
//! for authentication go through [`find_by_email_global`] and
//! [`verify_credentials`]; everything else is tenant-scoped.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{normalize_email, now, require_non_blank, scoped_read_verbs, validate_email};
use crate::db::begin_transaction;
use crate::error::RepositoryError;
use crate::models::tenant::Entity as Tenant;
use crate::models::user::{self, Entity as User, Model as UserModel};
use crate::models::UserRole;
use crate::password::{self, PasswordError};
use crate::query::{Filter, UserField, exec};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateUser {
    pub email: String,
    /// Plain-text password, hashed before it is stored
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Defaults to `USER`
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    /// New plain-text password
    pub password: Option<String>,
}

pub struct UserRepository<'a, C = DatabaseConnection> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C> UserRepository<'a, C>
where
    C: ConnectionTrait + TransactionTrait,
{
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    fn scope(&self) -> Condition {
        Condition::all().add(user::Column::TenantId.eq(self.tenant_id))
    }

    scoped_read_verbs!(UserField, UserModel);

    pub async fn find_unique(&self, id: Uuid) -> Result<Option<UserModel>, RepositoryError> {
        User::find_by_id(id)
            .filter(self.scope())
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, RepositoryError> {
        User::find()
            .filter(self.scope())
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn create(&self, input: CreateUser) -> Result<UserModel, RepositoryError> {
        let email = validate_email(&input.email)?;
        require_non_blank(&input.first_name, "First name")?;
        require_non_blank(&input.last_name, "Last name")?;
        let password_hash = hash(input.password).await?;
        let timestamp = now();

        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(self.tenant_id),
            email: Set(email),
            password_hash: Set(password_hash),
            first_name: Set(input.first_name.trim().to_string()),
            last_name: Set(input.last_name.trim().to_string()),
            role: Set(input.role.unwrap_or(UserRole::User)),
            is_active: Set(true),
            email_verified_at: Set(None),
            last_login_at: Set(None),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
        };

        user.insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn create_many_and_return(
        &self,
        inputs: Vec<CreateUser>,
    ) -> Result<Vec<UserModel>, RepositoryError> {
        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        let repo = UserRepository::new(&txn, self.tenant_id);
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(repo.create(input).await?);
        }
        txn.commit().await.map_err(RepositoryError::database_error)?;
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, patch: UpdateUser) -> Result<UserModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("User"))?;
        self.apply_update(existing, patch).await
    }

    /// Creates the user with `email` in this tenant if absent, otherwise patches it.
    ///
    /// An email taken by another tenant's user is a conflict.
    pub async fn upsert(
        &self,
        email: &str,
        create: CreateUser,
        patch: UpdateUser,
    ) -> Result<UserModel, RepositoryError> {
        match self.find_by_email(email).await? {
            Some(existing) => self.apply_update(existing, patch).await,
            None => {
                self.create(CreateUser {
                    email: email.to_string(),
                    ..create
                })
                .await
            }
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<UserModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("User"))?;
        existing
            .clone()
            .delete(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(existing)
    }

    pub async fn delete_many(
        &self,
        filter: Option<&Filter<UserField>>,
    ) -> Result<u64, RepositoryError> {
        exec::delete_many(self.db, self.scope(), filter).await
    }

    /// Records a successful login.
    pub async fn touch_last_login(&self, id: Uuid) -> Result<UserModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("User"))?;
        let mut active = existing.into_active_model();
        active.last_login_at = Set(Some(now()));
        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    async fn apply_update(
        &self,
        existing: UserModel,
        patch: UpdateUser,
    ) -> Result<UserModel, RepositoryError> {
        let mut active = existing.into_active_model();
        if let Some(first_name) = patch.first_name {
            require_non_blank(&first_name, "First name")?;
            active.first_name = Set(first_name.trim().to_string());
        }
        if let Some(last_name) = patch.last_name {
            require_non_blank(&last_name, "Last name")?;
            active.last_name = Set(last_name.trim().to_string());
        }
        if let Some(role) = patch.role {
            active.role = Set(role);
        }
        if let Some(is_active) = patch.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(password) = patch.password {
            active.password_hash = Set(hash(password).await?);
        }
        active.updated_at = Set(now());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}

/// Looks a user up by email across all tenants.
pub async fn find_by_email_global<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> Result<Option<UserModel>, RepositoryError> {
    User::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await
        .map_err(RepositoryError::database_error)
}

/// Returns the user when the password matches and both the user and its
/// tenant are active. Every failure reason yields `None`.
pub async fn verify_credentials<C: ConnectionTrait>(
    db: &C,
    email: &str,
    password: &str,
) -> Result<Option<UserModel>, RepositoryError> {
    let Some(user) = find_by_email_global(db, email).await? else {
        return Ok(None);
    };

    let verified =
        password::verify_password_async(password.to_owned(), user.password_hash.clone()).await;
    match verified {
        Ok(true) => {}
        Ok(false) => return Ok(None),
        Err(err) => {
            tracing::warn!(user_id = %user.id, error = %err, "Stored password hash is unusable");
            return Ok(None);
        }
    }

    if !user.is_active {
        tracing::debug!(user_id = %user.id, "Login rejected for inactive user");
        return Ok(None);
    }

    let tenant_active = Tenant::find_by_id(user.tenant_id)
        .one(db)
        .await
        .map_err(RepositoryError::database_error)?
        .is_some_and(|tenant| tenant.is_active);
    if !tenant_active {
        tracing::debug!(tenant_id = %user.tenant_id, "Login rejected for inactive tenant");
        return Ok(None);
    }

    Ok(Some(user))
}

async fn hash(plain: String) -> Result<String, RepositoryError> {
    if plain.is_empty() {
        return Err(RepositoryError::Validation(
            "Password cannot be empty".to_string(),
        ));
    }
    password::hash_password_async(plain).await.map_err(|err: PasswordError| {
        tracing::error!(error = %err, "Password hashing failed");
        RepositoryError::Validation(err.to_string())
    })
}
