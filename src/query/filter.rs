//! Typed filter AST and its compilation into SeaORM conditions.
//!
//! Filters arrive as JSON, for example
//!
//! ```json
//! { "and": [
//!     { "binary": { "field": "status", "op": "eq", "value": "SENT" } },
//!     { "not": { "binary": { "field": "paid_at", "op": "is_not_null" } } }
//! ] }
//! ```
//!
//! Values are coerced according to the field's [`FieldKind`]; anything that
//! does not fit is rejected with a [`FilterError`] before SQL is built.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::Condition;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use super::field::{Field, FieldKind};

/// Comparison operators available in a binary filter node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    /// Case-insensitive `contains`
    Icontains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::In => "in",
            FilterOp::NotIn => "not_in",
            FilterOp::Contains => "contains",
            FilterOp::Icontains => "icontains",
            FilterOp::StartsWith => "starts_with",
            FilterOp::EndsWith => "ends_with",
            FilterOp::IsNull => "is_null",
            FilterOp::IsNotNull => "is_not_null",
        };
        f.write_str(name)
    }
}

/// Filter AST parameterized by an entity's field enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter<F> {
    Binary {
        field: F,
        op: FilterOp,
        #[serde(default)]
        value: JsonValue,
    },
    /// All children must match; empty matches every row
    And(Vec<Filter<F>>),
    /// Any child must match; empty matches no row
    Or(Vec<Filter<F>>),
    Not(Box<Filter<F>>),
}

impl<F: Field> Filter<F> {
    pub fn binary(field: F, op: FilterOp, value: impl Into<JsonValue>) -> Self {
        Filter::Binary {
            field,
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: F, value: impl Into<JsonValue>) -> Self {
        Self::binary(field, FilterOp::Eq, value)
    }

    pub fn and(children: Vec<Filter<F>>) -> Self {
        Filter::And(children)
    }

    pub fn or(children: Vec<Filter<F>>) -> Self {
        Filter::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Filter<F>) -> Self {
        Filter::Not(Box::new(inner))
    }

    /// Compiles the filter into a SeaORM condition with table-qualified columns.
    pub fn to_condition(&self) -> FilterResult<Condition> {
        Ok(match self {
            Filter::Binary { field, op, value } => binary_condition(*field, *op, value)?,
            Filter::And(children) => children
                .iter()
                .try_fold(Condition::all(), |acc, child| {
                    Ok::<_, FilterError>(acc.add(child.to_condition()?))
                })?,
            Filter::Or(children) => {
                if children.is_empty() {
                    Condition::all().add(Expr::cust("1 = 0"))
                } else {
                    children.iter().try_fold(Condition::any(), |acc, child| {
                        Ok::<_, FilterError>(acc.add(child.to_condition()?))
                    })?
                }
            }
            Filter::Not(inner) => Condition::all().add(inner.to_condition()?).not(),
        })
    }
}

/// Errors that can occur while validating or compiling a filter.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Type mismatch for field {field}: expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("Unsupported operation {op} for field {field}")]
    UnsupportedOperation { field: String, op: String },

    #[error("Invalid filter expression: {0}")]
    InvalidExpression(String),
}

pub type FilterResult<T> = Result<T, FilterError>;

/// Table-qualified column expression for a field.
pub(crate) fn column_expr<F: Field>(field: F) -> SimpleExpr {
    Expr::col((F::Entity::default(), field.column())).into()
}

fn binary_condition<F: Field>(field: F, op: FilterOp, value: &JsonValue) -> FilterResult<Condition> {
    let kind = field.kind();
    let col = || Expr::col((F::Entity::default(), field.column()));

    if value.is_null() {
        return match op {
            FilterOp::Eq | FilterOp::IsNull => Ok(Condition::all().add(col().is_null())),
            FilterOp::Ne | FilterOp::IsNotNull => Ok(Condition::all().add(col().is_not_null())),
            _ => Err(FilterError::TypeMismatch {
                field: field.name().to_owned(),
                expected: kind.to_string(),
                got: "null".to_owned(),
            }),
        };
    }

    let expr = match op {
        FilterOp::IsNull => col().is_null(),
        FilterOp::IsNotNull => col().is_not_null(),
        FilterOp::Eq | FilterOp::Ne => {
            ensure(field, op, kind != FieldKind::Json)?;
            let v = coerce(field, value)?;
            if op == FilterOp::Eq {
                col().eq(v)
            } else {
                col().ne(v)
            }
        }
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            ensure(field, op, kind.is_comparable() || kind.is_textual())?;
            let v = coerce(field, value)?;
            match op {
                FilterOp::Gt => col().gt(v),
                FilterOp::Gte => col().gte(v),
                FilterOp::Lt => col().lt(v),
                _ => col().lte(v),
            }
        }
        FilterOp::In | FilterOp::NotIn => {
            ensure(field, op, kind != FieldKind::Json)?;
            let items = value.as_array().ok_or_else(|| FilterError::TypeMismatch {
                field: field.name().to_owned(),
                expected: format!("array of {kind}"),
                got: json_type(value).to_owned(),
            })?;
            let values = items
                .iter()
                .map(|item| coerce(field, item))
                .collect::<FilterResult<Vec<_>>>()?;
            match (op, values.is_empty()) {
                (FilterOp::In, true) => Expr::cust("1 = 0"),
                (FilterOp::NotIn, true) => Expr::cust("1 = 1"),
                (FilterOp::In, false) => col().is_in(values),
                _ => col().is_not_in(values),
            }
        }
        FilterOp::Contains | FilterOp::StartsWith | FilterOp::EndsWith => {
            ensure(field, op, kind.is_textual())?;
            let needle = expect_str(field, value)?;
            let pattern = match op {
                FilterOp::Contains => format!("%{}%", like_escape(needle)),
                FilterOp::StartsWith => format!("{}%", like_escape(needle)),
                _ => format!("%{}", like_escape(needle)),
            };
            col().like(LikeExpr::new(pattern).escape('\\'))
        }
        FilterOp::Icontains => {
            ensure(field, op, kind.is_textual())?;
            icontains(col().into(), expect_str(field, value)?)
        }
    };

    Ok(Condition::all().add(expr))
}

/// Case-insensitive substring match of any text expression.
pub(crate) fn icontains(expr: SimpleExpr, needle: &str) -> SimpleExpr {
    let pattern = format!("%{}%", like_escape(&needle.to_lowercase()));
    Expr::expr(Func::lower(expr)).like(LikeExpr::new(pattern).escape('\\'))
}

fn ensure<F: Field>(field: F, op: FilterOp, allowed: bool) -> FilterResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(FilterError::UnsupportedOperation {
            field: field.name().to_owned(),
            op: op.to_string(),
        })
    }
}

fn expect_str<F: Field>(field: F, value: &JsonValue) -> FilterResult<&str> {
    value.as_str().ok_or_else(|| FilterError::TypeMismatch {
        field: field.name().to_owned(),
        expected: FieldKind::String.to_string(),
        got: json_type(value).to_owned(),
    })
}

/// Converts a JSON value into an engine value of the field's kind.
pub(crate) fn coerce<F: Field>(field: F, value: &JsonValue) -> FilterResult<sea_orm::Value> {
    let kind = field.kind();
    let mismatch = || FilterError::TypeMismatch {
        field: field.name().to_owned(),
        expected: kind.to_string(),
        got: json_type(value).to_owned(),
    };

    Ok(match (kind, value) {
        (FieldKind::String, JsonValue::String(s)) => s.clone().into(),
        (FieldKind::Enum(allowed), JsonValue::String(s)) => {
            if !allowed.contains(&s.as_str()) {
                return Err(FilterError::TypeMismatch {
                    field: field.name().to_owned(),
                    expected: kind.to_string(),
                    got: format!("\"{s}\""),
                });
            }
            s.clone().into()
        }
        (FieldKind::Uuid, JsonValue::String(s)) => {
            Uuid::parse_str(s).map_err(|_| mismatch())?.into()
        }
        (FieldKind::Decimal, JsonValue::Number(n)) => {
            Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .map_err(|_| mismatch())?
                .into()
        }
        (FieldKind::Decimal, JsonValue::String(s)) => {
            Decimal::from_str(s.trim()).map_err(|_| mismatch())?.into()
        }
        (FieldKind::Integer, JsonValue::Number(n)) => n.as_i64().ok_or_else(mismatch)?.into(),
        (FieldKind::Bool, JsonValue::Bool(b)) => (*b).into(),
        (FieldKind::DateTime, JsonValue::String(s)) => {
            parse_datetime(s).ok_or_else(mismatch)?.into()
        }
        _ => return Err(mismatch()),
    })
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
/// Offsets are normalized to UTC.
pub fn parse_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).fixed_offset());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice;
    use crate::query::fields::InvoiceField;
    use sea_orm::{DbBackend, EntityTrait, QueryFilter, QueryTrait};
    use serde_json::json;

    fn sql(filter: Filter<InvoiceField>) -> String {
        invoice::Entity::find()
            .filter(filter.to_condition().unwrap())
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn parses_nested_json_filters() {
        let filter: Filter<InvoiceField> = serde_json::from_value(json!({
            "and": [
                { "binary": { "field": "status", "op": "eq", "value": "SENT" } },
                { "not": { "binary": { "field": "paid_at", "op": "is_not_null" } } }
            ]
        }))
        .unwrap();

        assert_eq!(
            filter,
            Filter::and(vec![
                Filter::eq(InvoiceField::Status, "SENT"),
                Filter::not(Filter::binary(
                    InvoiceField::PaidAt,
                    FilterOp::IsNotNull,
                    JsonValue::Null
                )),
            ])
        );
    }

    #[test]
    fn unknown_fields_are_rejected_while_parsing() {
        let err = serde_json::from_value::<Filter<InvoiceField>>(json!({
            "binary": { "field": "password_hash", "op": "eq", "value": "x" }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn null_equality_becomes_is_null() {
        let sql = sql(Filter::eq(InvoiceField::SentAt, JsonValue::Null));
        assert!(sql.contains(r#""invoices"."sent_at" IS NULL"#), "{sql}");
    }

    #[test]
    fn icontains_lowercases_both_sides() {
        let sql = sql(Filter::binary(
            InvoiceField::InvoiceNumber,
            FilterOp::Icontains,
            "RE-2024",
        ));
        assert!(sql.contains(r#"LOWER("invoices"."invoice_number") LIKE '%re-2024%'"#), "{sql}");
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(like_escape("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn empty_or_matches_nothing_and_empty_and_matches_all() {
        let none = sql(Filter::or(vec![]));
        assert!(none.contains("1 = 0"), "{none}");

        // sea-query renders an empty AND as `WHERE TRUE`
        let all = sql(Filter::and(vec![]));
        assert!(!all.contains("1 = 0"), "{all}");
        assert!(!all.contains("WHERE") || all.ends_with("WHERE TRUE"), "{all}");
    }

    #[test]
    fn enum_values_are_validated() {
        let err = Filter::eq(InvoiceField::Status, "ARCHIVED")
            .to_condition()
            .unwrap_err();
        assert!(matches!(err, FilterError::TypeMismatch { .. }));
    }

    #[test]
    fn operators_are_checked_against_kind() {
        let err = Filter::binary(InvoiceField::Total, FilterOp::Contains, "1")
            .to_condition()
            .unwrap_err();
        assert_eq!(
            err,
            FilterError::UnsupportedOperation {
                field: "total".into(),
                op: "contains".into()
            }
        );

        let err = Filter::binary(InvoiceField::Metadata, FilterOp::Eq, json!({"a": 1}))
            .to_condition()
            .unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedOperation { .. }));
    }

    #[test]
    fn decimals_accept_numbers_and_strings() {
        assert!(coerce(InvoiceField::Total, &json!(2528.75)).is_ok());
        assert!(coerce(InvoiceField::Total, &json!("2528.75")).is_ok());
        assert!(coerce(InvoiceField::Total, &json!("abc")).is_err());
    }

    #[test]
    fn datetimes_accept_plain_dates() {
        let dt = parse_datetime("2024-01-15").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-15T00:00:00+00:00");
        assert!(parse_datetime("15.01.2024").is_none());
    }

    #[test]
    fn in_requires_an_array() {
        let err = Filter::binary(InvoiceField::Status, FilterOp::In, "SENT")
            .to_condition()
            .unwrap_err();
        assert!(matches!(err, FilterError::TypeMismatch { .. }));

        let sql = sql(Filter::binary(
            InvoiceField::Status,
            FilterOp::In,
            json!(["SENT", "PAID"]),
        ));
        assert!(sql.contains(r#""invoices"."status" IN ('SENT', 'PAID')"#), "{sql}");
    }
}
