//! # Project Repository

use rust_decimal::Decimal;
use chrono::{DateTime, FixedOffset};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{now, require_non_blank, scoped_read_verbs, set_some, to_utc};
use crate::db::begin_transaction;
use crate::error::RepositoryError;
use crate::models::ProjectStatus;
use crate::models::project::{self, Entity as Project, Model as ProjectModel};
use crate::query::{Filter, ProjectField, exec};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `PLANNING`
    pub status: Option<ProjectStatus>,
    pub start_date: Option<DateTime<FixedOffset>>,
    pub end_date: Option<DateTime<FixedOffset>>,
    pub budget: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<DateTime<FixedOffset>>,
    pub end_date: Option<DateTime<FixedOffset>>,
    pub budget: Option<Decimal>,
}

pub struct ProjectRepository<'a, C = DatabaseConnection> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C> ProjectRepository<'a, C>
where
    C: ConnectionTrait + TransactionTrait,
{
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    fn scope(&self) -> Condition {
        Condition::all().add(project::Column::TenantId.eq(self.tenant_id))
    }

    scoped_read_verbs!(ProjectField, ProjectModel);

    pub async fn find_unique(&self, id: Uuid) -> Result<Option<ProjectModel>, RepositoryError> {
        Project::find_by_id(id)
            .filter(self.scope())
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn create(&self, input: CreateProject) -> Result<ProjectModel, RepositoryError> {
        self.insert(Uuid::new_v4(), input).await
    }

    async fn insert(&self, id: Uuid, input: CreateProject) -> Result<ProjectModel, RepositoryError> {
        require_non_blank(&input.name, "Project name")?;
        let start_date = input.start_date.map(to_utc);
        let end_date = input.end_date.map(to_utc);
        validate_schedule(start_date, end_date, input.budget)?;

        let timestamp = now();
        let project = project::ActiveModel {
            id: Set(id),
            tenant_id: Set(self.tenant_id),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            status: Set(input.status.unwrap_or(ProjectStatus::Planning)),
            start_date: Set(start_date),
            end_date: Set(end_date),
            budget: Set(input.budget),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
        };

        project
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn create_many_and_return(
        &self,
        inputs: Vec<CreateProject>,
    ) -> Result<Vec<ProjectModel>, RepositoryError> {
        let txn = begin_transaction(self.db, None)
            .await
            .map_err(RepositoryError::database_error)?;
        let repo = ProjectRepository::new(&txn, self.tenant_id);
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(repo.create(input).await?);
        }
        txn.commit().await.map_err(RepositoryError::database_error)?;
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, patch: UpdateProject) -> Result<ProjectModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Project"))?;
        self.apply_update(existing, patch).await
    }

    /// Keyed by id; a created project keeps the given id.
    pub async fn upsert(
        &self,
        id: Uuid,
        create: CreateProject,
        patch: UpdateProject,
    ) -> Result<ProjectModel, RepositoryError> {
        match self.find_unique(id).await? {
            Some(existing) => self.apply_update(existing, patch).await,
            None => self.insert(id, create).await,
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<ProjectModel, RepositoryError> {
        let existing = self
            .find_unique(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Project"))?;
        existing
            .clone()
            .delete(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(existing)
    }

    pub async fn delete_many(
        &self,
        filter: Option<&Filter<ProjectField>>,
    ) -> Result<u64, RepositoryError> {
        exec::delete_many(self.db, self.scope(), filter).await
    }

    async fn apply_update(
        &self,
        existing: ProjectModel,
        patch: UpdateProject,
    ) -> Result<ProjectModel, RepositoryError> {
        let start_date = patch.start_date.map(to_utc).or(existing.start_date);
        let end_date = patch.end_date.map(to_utc).or(existing.end_date);
        validate_schedule(start_date, end_date, patch.budget)?;

        let mut active = existing.into_active_model();
        if let Some(name) = patch.name {
            require_non_blank(&name, "Project name")?;
            active.name = Set(name.trim().to_string());
        }
        if let Some(status) = patch.status {
            active.status = Set(status);
        }
        set_some(&mut active.description, patch.description);
        set_some(&mut active.start_date, patch.start_date.map(to_utc));
        set_some(&mut active.end_date, patch.end_date.map(to_utc));
        set_some(&mut active.budget, patch.budget);
        active.updated_at = Set(now());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}

fn validate_schedule(
    start_date: Option<DateTimeWithTimeZone>,
    end_date: Option<DateTimeWithTimeZone>,
    budget: Option<Decimal>,
) -> Result<(), RepositoryError> {
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            return Err(RepositoryError::Validation(
                "end date must not be before start date".into(),
            ));
        }
    }
    if budget.is_some_and(|b| b.is_sign_negative()) {
        return Err(RepositoryError::Validation("budget must not be negative".into()));
    }
    Ok(())
}
