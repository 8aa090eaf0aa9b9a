//! # Common API Types
//!
//! Request/response shapes shared by several handlers, plus the pagination
//! helper every list endpoint goes through.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::models::UserRole;
use crate::models::user::Model as UserModel;
use crate::query::PageParams;

/// Response of the `count` endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CountResponse {
    pub count: u64,
}

/// Response of delete endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Resolves list pagination against the configured defaults.
pub fn page_window(
    config: &AppConfig,
    page: Option<u64>,
    limit: Option<u64>,
) -> Result<(u64, u64), ApiError> {
    Ok(PageParams { page, limit }.resolve(config.default_page_size, config.max_page_size)?)
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

impl From<&UserModel> for UserSummary {
    fn from(user: &UserModel) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
        }
    }
}
