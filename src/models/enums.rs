//! String-backed enums shared by entities, filters and API payloads.
//!
//! Values are stored in SCREAMING_SNAKE_CASE text columns so that filters can
//! compare them as plain strings.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Subscription plan of a tenant
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    #[sea_orm(string_value = "STARTER")]
    Starter,
    #[sea_orm(string_value = "PROFESSIONAL")]
    Professional,
    #[sea_orm(string_value = "ENTERPRISE")]
    Enterprise,
}

/// Role of a user inside its tenant
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    #[sea_orm(string_value = "USER")]
    User,
    #[sea_orm(string_value = "ACCOUNTANT")]
    Accountant,
}

/// Lifecycle status of an invoice
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "SENT")]
    Sent,
    #[sea_orm(string_value = "PAID")]
    Paid,
    #[sea_orm(string_value = "OVERDUE")]
    Overdue,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

/// Lifecycle status of a quote
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "SENT")]
    Sent,
    #[sea_orm(string_value = "ACCEPTED")]
    Accepted,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
    #[sea_orm(string_value = "EXPIRED")]
    Expired,
}

/// Lifecycle status of a project
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[sea_orm(string_value = "PLANNING")]
    Planning,
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "ON_HOLD")]
    OnHold,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

pub(crate) const PLAN_VALUES: &[&str] = &["STARTER", "PROFESSIONAL", "ENTERPRISE"];
pub(crate) const USER_ROLE_VALUES: &[&str] = &["ADMIN", "USER", "ACCOUNTANT"];
pub(crate) const INVOICE_STATUS_VALUES: &[&str] =
    &["DRAFT", "SENT", "PAID", "OVERDUE", "CANCELLED"];
pub(crate) const QUOTE_STATUS_VALUES: &[&str] =
    &["DRAFT", "SENT", "ACCEPTED", "REJECTED", "EXPIRED"];
pub(crate) const PROJECT_STATUS_VALUES: &[&str] =
    &["PLANNING", "ACTIVE", "ON_HOLD", "COMPLETED", "CANCELLED"];

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ActiveEnum, Iterable};

    #[test]
    fn value_lists_match_enum_variants() {
        let invoice: Vec<String> = InvoiceStatus::iter().map(|s| s.to_value()).collect();
        assert_eq!(invoice, INVOICE_STATUS_VALUES);

        let quote: Vec<String> = QuoteStatus::iter().map(|s| s.to_value()).collect();
        assert_eq!(quote, QUOTE_STATUS_VALUES);

        let project: Vec<String> = ProjectStatus::iter().map(|s| s.to_value()).collect();
        assert_eq!(project, PROJECT_STATUS_VALUES);

        let roles: Vec<String> = UserRole::iter().map(|s| s.to_value()).collect();
        assert_eq!(roles, USER_ROLE_VALUES);

        let plans: Vec<String> = Plan::iter().map(|s| s.to_value()).collect();
        assert_eq!(plans, PLAN_VALUES);
    }

    #[test]
    fn serde_uses_stored_spelling() {
        assert_eq!(
            serde_json::to_value(ProjectStatus::OnHold).unwrap(),
            serde_json::json!("ON_HOLD")
        );
        let status: InvoiceStatus = serde_json::from_str("\"OVERDUE\"").unwrap();
        assert_eq!(status, InvoiceStatus::Overdue);
    }
}
