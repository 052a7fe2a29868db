//! Repository Layer - Core Traits
//!
//! Defines the abstract interfaces for data access.
//! Implementations can use the hosted REST backend, SQLite, in-memory, etc.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::error::StoreResult;
use crate::domain::{Entity, Identity, Role};

/// A table row, keyed by column name
pub type Row = Map<String, Value>;

/// Conjunction of `column = value` predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality predicate
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether `row` satisfies every predicate
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|(column, value)| row.get(column).unwrap_or(&Value::Null) == value)
    }
}

/// Sort order for `select`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), ascending: true }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), ascending: false }
    }

    /// Compare two rows on this order's column (nulls first)
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ord = compare_values(
            a.get(&self.column).unwrap_or(&Value::Null),
            b.get(&self.column).unwrap_or(&Value::Null),
        );
        if self.ascending {
            ord
        } else {
            ord.reverse()
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Row-oriented persistence service
///
/// Every operation is a single request; all of them are async so the same
/// trait covers HTTP, SQLite and in-process backends.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Rows of `table` matching `filter`, optionally sorted
    async fn select(&self, table: &str, filter: &Filter, order: Option<&Order>) -> StoreResult<Vec<Row>>;

    /// Insert one row and return it as stored (with server-assigned columns)
    async fn insert(&self, table: &str, row: Row) -> StoreResult<Row>;

    /// Patch the columns in `patch` on every row matching `filter`
    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> StoreResult<()>;

    /// Delete rows matching `filter`; `StoreError::NotFound` when none matched
    async fn delete(&self, table: &str, filter: &Filter) -> StoreResult<()>;

    /// Write whole rows keyed by `id`, inserting the ones that do not exist
    async fn upsert(&self, table: &str, rows: Vec<Row>) -> StoreResult<()>;
}

/// Resolves who is calling and what they may do
#[async_trait]
pub trait AccessControl: Send + Sync {
    /// The authenticated caller, if any
    async fn current_identity(&self) -> StoreResult<Option<Identity>>;

    /// Role of `identity`, if one is assigned
    async fn role_of(&self, identity: &Identity) -> StoreResult<Option<Role>>;
}

/// Typed access to an ordered, parent-scoped collection
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Create a new entity, returning it with its assigned ID
    async fn create(&self, entity: &T) -> StoreResult<T>;

    /// Find entity by ID
    async fn find_by_id(&self, id: &T::Id) -> StoreResult<Option<T>>;

    /// Entities of one parent, ascending by position
    async fn list_by_parent(&self, parent_id: &str) -> StoreResult<Vec<T>>;

    /// Delete entity by ID
    async fn delete(&self, id: &T::Id) -> StoreResult<()>;

    /// Persist full entities in one batch
    async fn save_all(&self, entities: &[T]) -> StoreResult<()>;
}
