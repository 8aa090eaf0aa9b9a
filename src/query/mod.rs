//! # Query Arguments
//!
//! The typed argument surface shared by every delegate: field catalogs, the
//! filter AST, ordering, pagination, aggregate and group-by shapes, plus the
//! generic executors that run them against a connection.

pub mod args;
pub mod exec;
pub mod field;
pub mod fields;
pub mod filter;

pub use args::{
    AggregateArgs, AggregateResult, FindManyArgs, GroupByArgs, GroupByRow, MAX_SKIP, MAX_TAKE,
    OrderBy, Page, PageParams, SortDirection, page_offset,
};
pub use field::{Field, FieldKind};
pub use fields::{
    CustomerField, InvoiceField, InvoiceItemField, ProductField, ProjectField, QuoteField,
    TenantField, UserField,
};
pub use filter::{Filter, FilterError, FilterOp, FilterResult, parse_datetime};
