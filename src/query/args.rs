//! Argument and result shapes shared by every delegate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::{IntoParams, ToSchema};

use super::field::Field;
use super::filter::{Filter, FilterError, FilterResult};

/// Upper bound for `take` on any single query.
pub const MAX_TAKE: u64 = 1000;

/// Largest offset the SQL drivers can bind.
pub const MAX_SKIP: u64 = i64::MAX as u64;

fn check_skip(skip: Option<u64>) -> FilterResult<()> {
    match skip {
        Some(skip) if skip > MAX_SKIP => Err(FilterError::InvalidExpression(format!(
            "skip must not exceed {MAX_SKIP}"
        ))),
        _ => Ok(()),
    }
}

/// Row offset of a 1-based page, rejecting pages whose offset cannot be bound.
pub fn page_offset(page: u64, limit: u64) -> FilterResult<u64> {
    page.saturating_sub(1)
        .checked_mul(limit)
        .filter(|offset| *offset <= MAX_SKIP)
        .ok_or_else(|| FilterError::InvalidExpression("page is out of range".to_owned()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl From<SortDirection> for sea_orm::Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => sea_orm::Order::Asc,
            SortDirection::Desc => sea_orm::Order::Desc,
        }
    }
}

/// One ordering key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy<F> {
    pub field: F,
    #[serde(default)]
    pub direction: SortDirection,
}

impl<F> OrderBy<F> {
    pub fn asc(field: F) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: F) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

/// Arguments of `find_many` / `find_first`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "F: Field"))]
pub struct FindManyArgs<F> {
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter<F>>,
    #[serde(default)]
    pub order_by: Vec<OrderBy<F>>,
    #[serde(default)]
    pub take: Option<u64>,
    #[serde(default)]
    pub skip: Option<u64>,
}

impl<F> Default for FindManyArgs<F> {
    fn default() -> Self {
        Self {
            filter: None,
            order_by: Vec::new(),
            take: None,
            skip: None,
        }
    }
}

impl<F: Field> FindManyArgs<F> {
    pub fn filtered(filter: Filter<F>) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    pub fn order_by(mut self, order: OrderBy<F>) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn validate(&self) -> FilterResult<()> {
        check_skip(self.skip)
    }

    /// Effective limit: the requested `take` capped at [`MAX_TAKE`].
    pub fn effective_take(&self) -> u64 {
        self.take.unwrap_or(MAX_TAKE).min(MAX_TAKE)
    }
}

/// Arguments of `aggregate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "F: Field"))]
pub struct AggregateArgs<F> {
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter<F>>,
    #[serde(default)]
    pub count: bool,
    #[serde(default)]
    pub sum: Vec<F>,
    #[serde(default)]
    pub avg: Vec<F>,
    #[serde(default)]
    pub min: Vec<F>,
    #[serde(default)]
    pub max: Vec<F>,
}

impl<F> Default for AggregateArgs<F> {
    fn default() -> Self {
        Self {
            filter: None,
            count: false,
            sum: Vec::new(),
            avg: Vec::new(),
            min: Vec::new(),
            max: Vec::new(),
        }
    }
}

impl<F: Field> AggregateArgs<F> {
    /// Rejects `sum`/`avg` on non-numeric fields and `min`/`max` on fields
    /// that are neither numeric nor dates.
    pub fn validate(&self) -> FilterResult<()> {
        validate_selection(&self.sum, &self.avg, &self.min, &self.max)
    }

    pub fn is_empty(&self) -> bool {
        !self.count
            && self.sum.is_empty()
            && self.avg.is_empty()
            && self.min.is_empty()
            && self.max.is_empty()
    }
}

/// Result of `aggregate`, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AggregateResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub sum: BTreeMap<String, JsonValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub avg: BTreeMap<String, JsonValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub min: BTreeMap<String, JsonValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub max: BTreeMap<String, JsonValue>,
}

/// Arguments of `group_by`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "F: Field"))]
pub struct GroupByArgs<F> {
    pub by: Vec<F>,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter<F>>,
    #[serde(default)]
    pub sum: Vec<F>,
    #[serde(default)]
    pub avg: Vec<F>,
    #[serde(default)]
    pub min: Vec<F>,
    #[serde(default)]
    pub max: Vec<F>,
    #[serde(default)]
    pub order_by: Vec<OrderBy<F>>,
    #[serde(default)]
    pub take: Option<u64>,
    #[serde(default)]
    pub skip: Option<u64>,
}

impl<F: Field> GroupByArgs<F> {
    pub fn by(fields: Vec<F>) -> Self {
        Self {
            by: fields,
            filter: None,
            sum: Vec::new(),
            avg: Vec::new(),
            min: Vec::new(),
            max: Vec::new(),
            order_by: Vec::new(),
            take: None,
            skip: None,
        }
    }

    pub fn validate(&self) -> FilterResult<()> {
        if self.by.is_empty() {
            return Err(FilterError::InvalidExpression(
                "group_by requires at least one `by` field".to_owned(),
            ));
        }
        if let Some(field) = self.by.iter().find(|f| f.kind() == super::FieldKind::Json) {
            return Err(FilterError::UnsupportedOperation {
                field: field.name().to_owned(),
                op: "group_by".to_owned(),
            });
        }
        if let Some(order) = self.order_by.iter().find(|o| !self.by.contains(&o.field)) {
            return Err(FilterError::InvalidExpression(format!(
                "order_by field `{}` must be one of the `by` fields",
                order.field.name()
            )));
        }
        check_skip(self.skip)?;
        validate_selection(&self.sum, &self.avg, &self.min, &self.max)
    }
}

/// One `group_by` output row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GroupByRow {
    pub key: BTreeMap<String, JsonValue>,
    pub count: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub sum: BTreeMap<String, JsonValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub avg: BTreeMap<String, JsonValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub min: BTreeMap<String, JsonValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub max: BTreeMap<String, JsonValue>,
}

fn validate_selection<F: Field>(sum: &[F], avg: &[F], min: &[F], max: &[F]) -> FilterResult<()> {
    let check = |fields: &[F], op: &str, allowed: fn(super::FieldKind) -> bool| {
        match fields.iter().find(|f| !allowed(f.kind())) {
            Some(field) => Err(FilterError::UnsupportedOperation {
                field: field.name().to_owned(),
                op: op.to_owned(),
            }),
            None => Ok(()),
        }
    };
    check(sum, "sum", super::FieldKind::is_numeric)?;
    check(avg, "avg", super::FieldKind::is_numeric)?;
    check(min, "min", super::FieldKind::is_comparable)?;
    check(max, "max", super::FieldKind::is_comparable)
}

/// Page/limit pagination parameters of the HTTP list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number (default 1)
    pub page: Option<u64>,
    /// Page size (default 20, max 100)
    pub limit: Option<u64>,
}

impl PageParams {
    /// Resolves `(page, limit)`, rejecting out-of-range values.
    pub fn resolve(&self, default_limit: u64, max_limit: u64) -> FilterResult<(u64, u64)> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(default_limit);
        if page == 0 {
            return Err(FilterError::InvalidExpression(
                "page must be at least 1".to_owned(),
            ));
        }
        if limit == 0 || limit > max_limit {
            return Err(FilterError::InvalidExpression(format!(
                "limit must be between 1 and {max_limit}"
            )));
        }
        page_offset(page, limit)?;
        Ok((page, limit))
    }
}

/// One page of results with totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        Self {
            data,
            total,
            page,
            total_pages: total.div_ceil(limit.max(1)),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fields::{CustomerField, InvoiceField};
    use serde_json::json;

    #[test]
    fn find_many_args_parse_from_json() {
        let args: FindManyArgs<CustomerField> = serde_json::from_value(json!({
            "where": { "binary": { "field": "name", "op": "icontains", "value": "ag" } },
            "order_by": [{ "field": "name" }, { "field": "created_at", "direction": "desc" }],
            "take": 5000,
            "skip": 10
        }))
        .unwrap();

        assert!(args.filter.is_some());
        assert_eq!(
            args.order_by,
            vec![
                OrderBy::asc(CustomerField::Name),
                OrderBy::desc(CustomerField::CreatedAt)
            ]
        );
        assert_eq!(args.effective_take(), MAX_TAKE);
        assert_eq!(args.skip, Some(10));
    }

    #[test]
    fn negative_take_is_rejected_by_type() {
        let parsed = serde_json::from_value::<FindManyArgs<CustomerField>>(json!({ "take": -1 }));
        assert!(parsed.is_err());
    }

    #[test]
    fn aggregate_rejects_non_numeric_sum() {
        let args = AggregateArgs {
            sum: vec![InvoiceField::Status],
            ..AggregateArgs::default()
        };
        assert!(matches!(
            args.validate(),
            Err(FilterError::UnsupportedOperation { .. })
        ));

        let args = AggregateArgs {
            min: vec![InvoiceField::Date],
            max: vec![InvoiceField::Total],
            ..AggregateArgs::default()
        };
        assert!(args.validate().is_ok());
    }

    #[test]
    fn group_by_requires_keys_and_ordering_on_keys() {
        let empty = GroupByArgs::<InvoiceField>::by(vec![]);
        assert!(empty.validate().is_err());

        let mut args = GroupByArgs::by(vec![InvoiceField::Status]);
        args.order_by.push(OrderBy::asc(InvoiceField::Total));
        assert!(args.validate().is_err());

        args.order_by = vec![OrderBy::desc(InvoiceField::Status)];
        assert!(args.validate().is_ok());
    }

    #[test]
    fn page_params_resolve_with_bounds() {
        assert_eq!(PageParams::default().resolve(20, 100).unwrap(), (1, 20));
        let params = PageParams {
            page: Some(0),
            limit: None,
        };
        assert!(params.resolve(20, 100).is_err());
        let params = PageParams {
            page: Some(2),
            limit: Some(101),
        };
        assert!(params.resolve(20, 100).is_err());
    }

    #[test]
    fn unbindable_offsets_are_rejected() {
        let params = PageParams {
            page: Some(u64::MAX),
            limit: Some(20),
        };
        assert!(matches!(
            params.resolve(20, 100),
            Err(FilterError::InvalidExpression(_))
        ));
        assert_eq!(page_offset(3, 20).unwrap(), 40);
        assert!(page_offset(u64::MAX, 2).is_err());

        let args: FindManyArgs<CustomerField> =
            serde_json::from_value(json!({ "skip": u64::MAX })).unwrap();
        assert!(args.validate().is_err());
        assert!(FindManyArgs::<CustomerField>::default().skip(MAX_SKIP).validate().is_ok());

        let mut grouped = GroupByArgs::by(vec![InvoiceField::Status]);
        grouped.skip = Some(MAX_SKIP + 1);
        assert!(grouped.validate().is_err());
    }

    #[test]
    fn page_counts_total_pages() {
        let page = Page::new(vec![1, 2], 41, 1, 20);
        assert_eq!(page.total_pages, 3);
        let empty: Page<u8> = Page::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }
}
