//! Generic executors that compile typed arguments into SeaORM queries.
//!
//! Every executor takes a `scope` condition which is ANDed with the caller's
//! filter. Tenant-owned delegates pass `tenant_id = ?` here.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    Condition, ConnectionTrait, EntityTrait, IdenStatic, Iterable, Order, PrimaryKeyToColumn,
    QueryFilter, QueryOrder, QueryResult, QuerySelect, QueryTrait, Select,
};
use serde_json::Value as JsonValue;

use super::args::{
    AggregateArgs, AggregateResult, FindManyArgs, GroupByArgs, GroupByRow, OrderBy, MAX_TAKE,
};
use super::field::{Field, FieldKind};
use super::filter::{column_expr, Filter, FilterResult};
use crate::error::RepositoryError;

type ModelOf<F> = <<F as Field>::Entity as EntityTrait>::Model;

/// Builds a scoped, filtered select for the field's entity.
pub fn select<F: Field>(
    scope: Condition,
    filter: Option<&Filter<F>>,
) -> FilterResult<Select<F::Entity>> {
    let mut query = F::Entity::find().filter(scope);
    if let Some(filter) = filter {
        query = query.filter(filter.to_condition()?);
    }
    Ok(query)
}

/// Applies ordering keys followed by the primary key as a stable tie-breaker.
pub fn apply_order<F: Field, Q: QueryOrder>(mut query: Q, order_by: &[OrderBy<F>]) -> Q {
    for order in order_by {
        query = query.order_by(column_expr(order.field), Order::from(order.direction));
    }
    for key in <<F::Entity as EntityTrait>::PrimaryKey as Iterable>::iter() {
        let column = key.into_column();
        let already_ordered = order_by
            .iter()
            .any(|o| o.field.column().as_str() == column.as_str());
        if !already_ordered {
            query = query.order_by(
                SimpleExpr::from(Expr::col((F::Entity::default(), column))),
                Order::Asc,
            );
        }
    }
    query
}

pub async fn find_many<C, F>(
    db: &C,
    scope: Condition,
    args: &FindManyArgs<F>,
) -> Result<Vec<ModelOf<F>>, RepositoryError>
where
    C: ConnectionTrait,
    F: Field,
{
    args.validate()?;
    let query = select(scope, args.filter.as_ref())?;
    let mut query = apply_order(query, &args.order_by).limit(args.effective_take());
    if let Some(skip) = args.skip {
        query = query.offset(skip);
    }
    query.all(db).await.map_err(RepositoryError::database_error)
}

pub async fn find_first<C, F>(
    db: &C,
    scope: Condition,
    args: &FindManyArgs<F>,
) -> Result<Option<ModelOf<F>>, RepositoryError>
where
    C: ConnectionTrait,
    F: Field,
{
    args.validate()?;
    let query = select(scope, args.filter.as_ref())?;
    let mut query = apply_order(query, &args.order_by);
    if let Some(skip) = args.skip {
        query = query.offset(skip);
    }
    query.one(db).await.map_err(RepositoryError::database_error)
}

pub async fn count<C, F>(
    db: &C,
    scope: Condition,
    filter: Option<&Filter<F>>,
) -> Result<u64, RepositoryError>
where
    C: ConnectionTrait,
    F: Field,
{
    let query = select(scope, filter)?
        .select_only()
        .column_as(count_expr(), COUNT_ALIAS);
    let row = db
        .query_one(query.build(db.get_database_backend()))
        .await
        .map_err(RepositoryError::database_error)?;
    match row {
        Some(row) => read_count(&row),
        None => Ok(0),
    }
}

/// Deletes every row matching scope and filter, returning the number removed.
pub async fn delete_many<C, F>(
    db: &C,
    scope: Condition,
    filter: Option<&Filter<F>>,
) -> Result<u64, RepositoryError>
where
    C: ConnectionTrait,
    F: Field,
{
    let mut query = F::Entity::delete_many().filter(scope);
    if let Some(filter) = filter {
        query = query.filter(filter.to_condition()?);
    }
    let result = query.exec(db).await.map_err(RepositoryError::database_error)?;
    Ok(result.rows_affected)
}

pub async fn aggregate<C, F>(
    db: &C,
    scope: Condition,
    args: &AggregateArgs<F>,
) -> Result<AggregateResult, RepositoryError>
where
    C: ConnectionTrait,
    F: Field,
{
    args.validate()?;
    if args.is_empty() {
        return Ok(AggregateResult::default());
    }

    let mut query = select(scope, args.filter.as_ref())?.select_only();
    if args.count {
        query = query.column_as(count_expr(), COUNT_ALIAS);
    }
    let selection = Selection::new(&args.sum, &args.avg, &args.min, &args.max);
    for (alias, expr, _) in selection.columns() {
        query = query.column_as(expr, alias);
    }

    let backend = db.get_database_backend();
    let row = db
        .query_one(query.build(backend))
        .await
        .map_err(RepositoryError::database_error)?;

    let mut result = AggregateResult::default();
    if let Some(row) = row {
        if args.count {
            result.count = Some(read_count(&row)?);
        }
        selection.read_into(&row, &mut result.sum, &mut result.avg, &mut result.min, &mut result.max)?;
    }
    Ok(result)
}

pub async fn group_by<C, F>(
    db: &C,
    scope: Condition,
    args: &GroupByArgs<F>,
) -> Result<Vec<GroupByRow>, RepositoryError>
where
    C: ConnectionTrait,
    F: Field,
{
    args.validate()?;

    let mut query = select(scope, args.filter.as_ref())?.select_only();
    for field in &args.by {
        query = query
            .column_as(column_expr(*field), key_alias(*field))
            .group_by(column_expr(*field));
    }
    query = query.column_as(count_expr(), COUNT_ALIAS);

    let selection = Selection::new(&args.sum, &args.avg, &args.min, &args.max);
    for (alias, expr, _) in selection.columns() {
        query = query.column_as(expr, alias);
    }

    for order in &args.order_by {
        query = query.order_by(column_expr(order.field), Order::from(order.direction));
    }
    // Deterministic output when no explicit ordering was requested
    for field in &args.by {
        if !args.order_by.iter().any(|o| o.field == *field) {
            query = query.order_by(column_expr(*field), Order::Asc);
        }
    }
    query = query.limit(args.take.unwrap_or(MAX_TAKE).min(MAX_TAKE));
    if let Some(skip) = args.skip {
        query = query.offset(skip);
    }

    let backend = db.get_database_backend();
    let rows = db
        .query_all(query.build(backend))
        .await
        .map_err(RepositoryError::database_error)?;

    rows.iter()
        .map(|row| {
            let mut out = GroupByRow {
                count: read_count(row)?,
                ..GroupByRow::default()
            };
            for field in &args.by {
                out.key.insert(
                    field.name().to_owned(),
                    read_value(row, &key_alias(*field), field.kind())?,
                );
            }
            selection.read_into(row, &mut out.sum, &mut out.avg, &mut out.min, &mut out.max)?;
            Ok(out)
        })
        .collect()
}

const COUNT_ALIAS: &str = "_count";

fn count_expr() -> SimpleExpr {
    Expr::cust("COUNT(*)")
}

fn key_alias<F: Field>(field: F) -> String {
    format!("key_{}", field.name())
}

#[derive(Clone, Copy)]
enum AggregateFn {
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFn {
    fn prefix(self) -> &'static str {
        match self {
            AggregateFn::Sum => "sum",
            AggregateFn::Avg => "avg",
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
        }
    }
}

/// Requested aggregate columns with their SQL aliases.
struct Selection<'a, F> {
    entries: Vec<(AggregateFn, &'a F)>,
}

impl<'a, F: Field> Selection<'a, F> {
    fn new(sum: &'a [F], avg: &'a [F], min: &'a [F], max: &'a [F]) -> Self {
        let entries = sum
            .iter()
            .map(|f| (AggregateFn::Sum, f))
            .chain(avg.iter().map(|f| (AggregateFn::Avg, f)))
            .chain(min.iter().map(|f| (AggregateFn::Min, f)))
            .chain(max.iter().map(|f| (AggregateFn::Max, f)))
            .collect();
        Self { entries }
    }

    fn alias(func: AggregateFn, field: F) -> String {
        format!("{}_{}", func.prefix(), field.name())
    }

    fn columns(&self) -> impl Iterator<Item = (String, SimpleExpr, AggregateFn)> + '_ {
        self.entries.iter().map(|(func, field)| {
            let col = column_expr(**field);
            let expr: SimpleExpr = match func {
                AggregateFn::Sum => Func::sum(col).into(),
                AggregateFn::Avg => Func::avg(col).into(),
                AggregateFn::Min => Func::min(col).into(),
                AggregateFn::Max => Func::max(col).into(),
            };
            (Self::alias(*func, **field), expr, *func)
        })
    }

    fn read_into(
        &self,
        row: &QueryResult,
        sum: &mut BTreeMap<String, JsonValue>,
        avg: &mut BTreeMap<String, JsonValue>,
        min: &mut BTreeMap<String, JsonValue>,
        max: &mut BTreeMap<String, JsonValue>,
    ) -> Result<(), RepositoryError> {
        for (func, field) in &self.entries {
            let alias = Self::alias(*func, **field);
            // sum/avg over integers come back as decimals on Postgres
            let kind = match func {
                AggregateFn::Sum | AggregateFn::Avg => FieldKind::Decimal,
                AggregateFn::Min | AggregateFn::Max => field.kind(),
            };
            let value = read_value(row, &alias, kind)?;
            let target = match func {
                AggregateFn::Sum => &mut *sum,
                AggregateFn::Avg => &mut *avg,
                AggregateFn::Min => &mut *min,
                AggregateFn::Max => &mut *max,
            };
            target.insert(field.name().to_owned(), value);
        }
        Ok(())
    }
}

fn read_count(row: &QueryResult) -> Result<u64, RepositoryError> {
    let count: i64 = row
        .try_get("", COUNT_ALIAS)
        .map_err(RepositoryError::database_error)?;
    Ok(count.max(0) as u64)
}

/// Reads an aliased result column as JSON according to the field kind.
fn read_value(row: &QueryResult, alias: &str, kind: FieldKind) -> Result<JsonValue, RepositoryError> {
    let value = match kind {
        FieldKind::String | FieldKind::Enum(_) => row
            .try_get::<Option<String>>("", alias)
            .map(|v| v.map(JsonValue::from)),
        FieldKind::Uuid => row
            .try_get::<Option<uuid::Uuid>>("", alias)
            .map(|v| v.map(|u| JsonValue::from(u.to_string()))),
        FieldKind::Decimal => row
            .try_get::<Option<Decimal>>("", alias)
            .map(|v| v.map(|d| JsonValue::from(d.normalize().to_string()))),
        FieldKind::Integer => row
            .try_get::<Option<i64>>("", alias)
            .map(|v| v.map(JsonValue::from)),
        FieldKind::Bool => row
            .try_get::<Option<bool>>("", alias)
            .map(|v| v.map(JsonValue::from)),
        FieldKind::DateTime => row
            .try_get::<Option<sea_orm::prelude::DateTimeWithTimeZone>>("", alias)
            .map(|v| v.map(|dt| JsonValue::from(dt.to_rfc3339()))),
        FieldKind::Json => row.try_get::<Option<JsonValue>>("", alias),
    }
    .map_err(RepositoryError::database_error)?;

    Ok(value.unwrap_or(JsonValue::Null))
}
