//! # Project Handlers

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use super::types::SuccessResponse;
use crate::auth::AuthUser;
use crate::error::{ApiError, RepositoryError};
use crate::models::project::Model as ProjectModel;
use crate::repositories::{CreateProject, ProjectRepository};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects", post(create_project))
        .route("/projects/{id}", get(get_project).delete(delete_project))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects",
    security(("bearer_auth" = [])),
    request_body = CreateProject,
    responses(
        (status = 201, description = "Project created"),
        (status = 400, description = "Invalid schedule or budget", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateProject>,
) -> Result<(StatusCode, Json<ProjectModel>), ApiError> {
    let project = ProjectRepository::new(&state.db, user.tenant_id)
        .create(input)
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project"),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectModel>, ApiError> {
    let project = ProjectRepository::new(&state.db, user.tenant_id)
        .find_unique(id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Project"))?;
    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project deleted", body = SuccessResponse),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn delete_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    ProjectRepository::new(&state.db, user.tenant_id)
        .delete(id)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}
