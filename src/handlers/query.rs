//! # Query Handlers
//!
//! Exposes the typed read verbs of the tenant-owned delegates over HTTP:
//! `POST /{entity}/query`, `/count`, `/aggregate` and `/group-by`, each taking
//! the same JSON argument shapes the delegates accept.

use async_trait::async_trait;
use axum::{Json, Router, extract::State, routing::post};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::CountResponse;
use crate::auth::AuthUser;
use crate::error::{ApiError, RepositoryError};
use crate::query::{
    AggregateArgs, AggregateResult, CustomerField, Field, Filter, FindManyArgs, GroupByArgs,
    GroupByRow, InvoiceField, ProductField, ProjectField, QuoteField,
};
use crate::repositories::{
    CustomerRepository, InvoiceRepository, ProductRepository, ProjectRepository, QuoteRepository,
};
use crate::server::AppState;

/// Body of the `count` endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "F: Field"))]
pub struct CountArgs<F> {
    #[serde(default, rename = "where")]
    pub filter: Option<Filter<F>>,
}

/// A tenant-scoped delegate whose read verbs are served by the query routes.
#[async_trait]
pub trait QueryDelegate: Send + Sync + 'static {
    type Field: Field;
    type Model: Serialize + Send;

    async fn find_many(
        db: &DatabaseConnection,
        tenant_id: Uuid,
        args: &FindManyArgs<Self::Field>,
    ) -> Result<Vec<Self::Model>, RepositoryError>;

    async fn count(
        db: &DatabaseConnection,
        tenant_id: Uuid,
        filter: Option<&Filter<Self::Field>>,
    ) -> Result<u64, RepositoryError>;

    async fn aggregate(
        db: &DatabaseConnection,
        tenant_id: Uuid,
        args: &AggregateArgs<Self::Field>,
    ) -> Result<AggregateResult, RepositoryError>;

    async fn group_by(
        db: &DatabaseConnection,
        tenant_id: Uuid,
        args: &GroupByArgs<Self::Field>,
    ) -> Result<Vec<GroupByRow>, RepositoryError>;
}

macro_rules! query_delegate {
    ($marker:ident, $repo:ident, $field:ty, $model:ty) => {
        pub struct $marker;

        #[async_trait]
        impl QueryDelegate for $marker {
            type Field = $field;
            type Model = $model;

            async fn find_many(
                db: &DatabaseConnection,
                tenant_id: Uuid,
                args: &FindManyArgs<$field>,
            ) -> Result<Vec<$model>, RepositoryError> {
                $repo::new(db, tenant_id).find_many(args).await
            }

            async fn count(
                db: &DatabaseConnection,
                tenant_id: Uuid,
                filter: Option<&Filter<$field>>,
            ) -> Result<u64, RepositoryError> {
                $repo::new(db, tenant_id).count(filter).await
            }

            async fn aggregate(
                db: &DatabaseConnection,
                tenant_id: Uuid,
                args: &AggregateArgs<$field>,
            ) -> Result<AggregateResult, RepositoryError> {
                $repo::new(db, tenant_id).aggregate(args).await
            }

            async fn group_by(
                db: &DatabaseConnection,
                tenant_id: Uuid,
                args: &GroupByArgs<$field>,
            ) -> Result<Vec<GroupByRow>, RepositoryError> {
                $repo::new(db, tenant_id).group_by(args).await
            }
        }
    };
}

query_delegate!(Customers, CustomerRepository, CustomerField, crate::models::customer::Model);
query_delegate!(Invoices, InvoiceRepository, InvoiceField, crate::models::invoice::Model);
query_delegate!(Quotes, QuoteRepository, QuoteField, crate::models::quote::Model);
query_delegate!(Products, ProductRepository, ProductField, crate::models::product::Model);
query_delegate!(Projects, ProjectRepository, ProjectField, crate::models::project::Model);

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(entity_routes::<Customers>("customers"))
        .merge(entity_routes::<Invoices>("invoices"))
        .merge(entity_routes::<Quotes>("quotes"))
        .merge(entity_routes::<Products>("products"))
        .merge(entity_routes::<Projects>("projects"))
}

fn entity_routes<D: QueryDelegate>(entity: &str) -> Router<AppState> {
    Router::new()
        .route(&format!("/{entity}/query"), post(find_many::<D>))
        .route(&format!("/{entity}/count"), post(count::<D>))
        .route(&format!("/{entity}/aggregate"), post(aggregate::<D>))
        .route(&format!("/{entity}/group-by"), post(group_by::<D>))
}

pub async fn find_many<D: QueryDelegate>(
    State(state): State<AppState>,
    user: AuthUser,
    Json(args): Json<FindManyArgs<D::Field>>,
) -> Result<Json<Vec<D::Model>>, ApiError> {
    let rows = D::find_many(&state.db, user.tenant_id, &args).await?;
    Ok(Json(rows))
}

pub async fn count<D: QueryDelegate>(
    State(state): State<AppState>,
    user: AuthUser,
    Json(args): Json<CountArgs<D::Field>>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = D::count(&state.db, user.tenant_id, args.filter.as_ref()).await?;
    Ok(Json(CountResponse { count }))
}

pub async fn aggregate<D: QueryDelegate>(
    State(state): State<AppState>,
    user: AuthUser,
    Json(args): Json<AggregateArgs<D::Field>>,
) -> Result<Json<AggregateResult>, ApiError> {
    let result = D::aggregate(&state.db, user.tenant_id, &args).await?;
    Ok(Json(result))
}

pub async fn group_by<D: QueryDelegate>(
    State(state): State<AppState>,
    user: AuthUser,
    Json(args): Json<GroupByArgs<D::Field>>,
) -> Result<Json<Vec<GroupByRow>>, ApiError> {
    let rows = D::group_by(&state.db, user.tenant_id, &args).await?;
    Ok(Json(rows))
}
