//! In-Memory Store
//!
//! Process-local tables with server-assigned ids. Used by tests and offline
//! demos. Upserts replace whole rows, which is the strictest reading of the
//! batch-write contract.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

use super::error::{StoreError, StoreResult};
use super::traits::{Filter, Order, RemoteStore, Row};

/// Store operation, for failure scripting and call accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Select,
    Insert,
    Update,
    Delete,
    Upsert,
}

#[derive(Default)]
struct MemoryTables {
    tables: HashMap<String, Vec<Row>>,
    next_id: u64,
    failures: HashMap<StoreOp, VecDeque<String>>,
    calls: HashMap<StoreOp, usize>,
}

impl MemoryTables {
    /// Count the call and pop a scripted failure, if any
    fn enter(&mut self, op: StoreOp) -> StoreResult<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(|queue| queue.pop_front()) {
            Some(message) => Err(StoreError::Other(message)),
            None => Ok(()),
        }
    }

    fn assign_server_columns(&mut self, row: &mut Row) {
        let missing_id = match row.get("id") {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if missing_id {
            self.next_id += 1;
            row.insert("id".to_string(), Value::String(format!("mem-{:06}", self.next_id)));
        }
        if !row.contains_key("created_at") {
            row.insert(
                "created_at".to_string(),
                Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
    }
}

/// In-memory implementation of [`RemoteStore`]
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with `message`
    pub async fn fail_next(&self, op: StoreOp, message: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.failures.entry(op).or_default().push_back(message.into());
    }

    /// Number of calls of `op` so far, failed ones included
    pub async fn calls(&self, op: StoreOp) -> usize {
        let inner = self.inner.lock().await;
        inner.calls.get(&op).copied().unwrap_or(0)
    }

    /// Insert rows directly, bypassing accounting and failure scripting
    pub async fn seed(&self, table: &str, rows: Vec<Row>) -> Vec<Row> {
        let mut inner = self.inner.lock().await;
        let mut stored = Vec::with_capacity(rows.len());
        for mut row in rows {
            inner.assign_server_columns(&mut row);
            stored.push(row.clone());
            inner.tables.entry(table.to_string()).or_default().push(row);
        }
        stored
    }

    /// Current contents of `table`, in storage order
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        let inner = self.inner.lock().await;
        inner.tables.get(table).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(&self, table: &str, filter: &Filter, order: Option<&Order>) -> StoreResult<Vec<Row>> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::Select)?;

        let mut rows: Vec<Row> = inner
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|row| filter.matches(row)).cloned().collect())
            .unwrap_or_default();
        if let Some(order) = order {
            rows.sort_by(|a, b| order.compare(a, b));
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Row) -> StoreResult<Row> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::Insert)?;

        inner.assign_server_columns(&mut row);
        inner.tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::Update)?;

        if let Some(rows) = inner.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, table: &str, filter: &Filter) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::Delete)?;

        if filter.is_empty() {
            return Err(StoreError::Other("refusing to delete without a filter".to_string()));
        }
        let rows = inner.tables.entry(table.to_string()).or_default();
        let before = rows.len();
        rows.retain(|row| !filter.matches(row));
        if rows.len() == before {
            return Err(StoreError::NotFound { table: table.to_string() });
        }
        Ok(())
    }

    async fn upsert(&self, table: &str, rows: Vec<Row>) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::Upsert)?;

        for mut row in rows {
            inner.assign_server_columns(&mut row);
            let id = row.get("id").cloned().unwrap_or(Value::Null);
            let existing = inner.tables.entry(table.to_string()).or_default();
            match existing.iter_mut().find(|r| r.get("id") == Some(&id)) {
                Some(slot) => *slot = row,
                None => existing.push(row),
            }
        }
        Ok(())
    }
}
