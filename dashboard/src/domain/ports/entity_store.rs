//! Port for the hosted backend's row storage.
//!
//! Rows cross this boundary as JSON objects keyed by column name. Filters
//! are plain data so the same conjunction can be sent to the store and
//! evaluated locally against rows that arrive through the change feed.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::define_port_error;

/// A table row keyed by column name.
pub type Row = Map<String, Value>;

/// Tables the dashboard reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// `profiles`
    Profiles,
    /// `client_companies`
    ClientCompanies,
    /// `client_contacts`
    ClientContacts,
    /// `projects`
    Projects,
    /// `comments`
    Comments,
    /// `documents`
    Documents,
}

impl Table {
    /// Table name as exposed by the hosted backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::ClientCompanies => "client_companies",
            Self::ClientContacts => "client_contacts",
            Self::Projects => "projects",
            Self::Comments => "comments",
            Self::Documents => "documents",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    /// Column equals value. An `Eq` against JSON null tests for null.
    Eq,
    /// Column is present, non-null and differs from value.
    Neq,
}

/// Single column condition. Filters in a list are conjunctive.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Column name.
    pub column: String,
    /// Comparison.
    pub op: FilterOp,
    /// Operand.
    pub value: Value,
}

impl Filter {
    /// `column = value`
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    /// `column <> value`
    #[must_use]
    pub fn neq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Neq,
            value: value.into(),
        }
    }

    /// Evaluate the condition against a row.
    ///
    /// A missing column behaves like SQL null: it never satisfies `Neq` and
    /// only satisfies `Eq` when the operand is null.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        let cell = row.get(&self.column).filter(|value| !value.is_null());
        match (self.op, cell) {
            (FilterOp::Eq, None) => self.value.is_null(),
            (FilterOp::Eq, Some(value)) => values_equal(value, &self.value),
            (FilterOp::Neq, None) => false,
            (FilterOp::Neq, Some(value)) => !self.value.is_null() && !values_equal(value, &self.value),
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => (l - r).abs() < f64::EPSILON,
        _ => left == right,
    }
}

/// Sort direction for an [`OrderBy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Ordering clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column name.
    pub column: String,
    /// Direction.
    pub direction: Direction,
}

/// Point-in-time read against one table.
///
/// # Examples
/// ```
/// use dashboard::domain::ports::{Direction, Filter, Query, Table};
///
/// let query = Query::from(Table::Projects)
///     .filter(Filter::neq("status", "Complete"))
///     .order_by("last_update_date", Direction::Descending)
///     .limit(10);
/// assert_eq!(query.filters.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Table to read.
    pub table: Table,
    /// Conjunctive filters.
    pub filters: Vec<Filter>,
    /// Ordering clauses, most significant first.
    pub order: Vec<OrderBy>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
}

impl Query {
    /// Add a filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add several filters.
    #[must_use]
    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Add an ordering clause.
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    /// Cap the number of returned rows.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl From<Table> for Query {
    fn from(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }
}

define_port_error! {
    /// Errors raised by entity store adapters.
    pub enum EntityStoreError {
        /// The store could not be reached.
        Connection { message: String } =>
            backend_transient, "entity store connection failed: {message}",
        /// The store rejected the query or mutation.
        Query { message: String } =>
            backend_permanent, "entity store query failed: {message}",
        /// The store's own authorisation refused the operation.
        Rejected { message: String } =>
            forbidden, "entity store rejected the request: {message}",
        /// The response could not be decoded.
        Decode { message: String } =>
            backend_permanent, "entity store response could not be decoded: {message}",
    }
}

/// Port for reading and writing rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Read rows matching the query.
    async fn select(&self, query: &Query) -> Result<Vec<Row>, EntityStoreError>;

    /// Insert one row and return it as stored (with generated columns).
    async fn insert(&self, table: Table, row: Row) -> Result<Row, EntityStoreError>;

    /// Merge `patch` into every row matching `filters`; return the updated
    /// rows. Matching zero rows is not an error.
    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, EntityStoreError>;

    /// Delete every row matching `filters`; return the deleted rows.
    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, EntityStoreError>;
}

/// Fixture implementation for tests that do not exercise persistence.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureEntityStore;

#[async_trait]
impl EntityStore for FixtureEntityStore {
    async fn select(&self, _query: &Query) -> Result<Vec<Row>, EntityStoreError> {
        Ok(Vec::new())
    }

    async fn insert(&self, _table: Table, row: Row) -> Result<Row, EntityStoreError> {
        Ok(row)
    }

    async fn update(
        &self,
        _table: Table,
        _filters: &[Filter],
        _patch: Row,
    ) -> Result<Vec<Row>, EntityStoreError> {
        Ok(Vec::new())
    }

    async fn delete(
        &self,
        _table: Table,
        _filters: &[Filter],
    ) -> Result<Vec<Row>, EntityStoreError> {
        Ok(Vec::new())
    }
}
