//! SQLite Store
//!
//! Local stand-in for the hosted backend. Tables mirror the hosted schema;
//! statements are built from the generic row/filter shapes of [`RemoteStore`].

use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Number, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::error::{StoreError, StoreResult};
use super::traits::{Filter, Order, RemoteStore, Row};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS nfc_profiles (
    id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
    user_id TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS profile_buttons (
    id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
    profile_id TEXT,
    label TEXT NOT NULL,
    action_type TEXT NOT NULL,
    action_value TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_profile_buttons_profile
    ON profile_buttons(profile_id, sort_order);

CREATE TABLE IF NOT EXISTS profile_button_clicks (
    id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
    button_id TEXT NOT NULL REFERENCES profile_buttons(id) ON DELETE CASCADE,
    profile_id TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS user_roles (
    id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
    user_id TEXT,
    role TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
";

/// SQLite implementation of [`RemoteStore`]
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and run migrations
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Fresh in-memory database, mainly for tests
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Table and column names are interpolated, so only plain identifiers pass
fn ident(name: &str) -> StoreResult<&str> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(name)
    } else {
        Err(StoreError::Other(format!("invalid identifier '{}'", name)))
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// ` WHERE a = ?1 AND b = ?2` plus its parameters, numbered from `offset + 1`
fn where_clause(filter: &Filter, offset: usize) -> StoreResult<(String, Vec<SqlValue>)> {
    if filter.is_empty() {
        return Ok((String::new(), Vec::new()));
    }
    let mut parts = Vec::with_capacity(filter.conditions().len());
    let mut params = Vec::with_capacity(filter.conditions().len());
    for (i, (column, value)) in filter.conditions().iter().enumerate() {
        parts.push(format!("{} = ?{}", ident(column)?, offset + i + 1));
        params.push(to_sql(value));
    }
    Ok((format!(" WHERE {}", parts.join(" AND ")), params))
}

/// Run a row-returning statement and map every row to JSON
fn query_rows(conn: &Connection, sql: &str, params: Vec<SqlValue>) -> StoreResult<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let rows = stmt.query_map(params_from_iter(params), |row| {
        let mut out = Row::new();
        for (i, name) in names.iter().enumerate() {
            out.insert(name.clone(), from_sql(row.get_ref(i)?));
        }
        Ok(out)
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn select(&self, table: &str, filter: &Filter, order: Option<&Order>) -> StoreResult<Vec<Row>> {
        let (where_sql, params) = where_clause(filter, 0)?;
        let mut sql = format!("SELECT * FROM {}{}", ident(table)?, where_sql);
        if let Some(order) = order {
            sql.push_str(&format!(
                " ORDER BY {} {}",
                ident(&order.column)?,
                if order.ascending { "ASC" } else { "DESC" }
            ));
        }

        let conn = self.conn.lock().await;
        query_rows(&conn, &sql, params)
    }

    async fn insert(&self, table: &str, row: Row) -> StoreResult<Row> {
        let table = ident(table)?;
        let sql = if row.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table)
        } else {
            let columns = row.keys().map(|c| ident(c)).collect::<StoreResult<Vec<_>>>()?;
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        let params: Vec<SqlValue> = row.values().map(to_sql).collect();

        let conn = self.conn.lock().await;
        query_rows(&conn, &sql, params)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("insert into {} returned no row", table)))
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> StoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut sets = Vec::with_capacity(patch.len());
        let mut params = Vec::with_capacity(patch.len());
        for (i, (column, value)) in patch.iter().enumerate() {
            sets.push(format!("{} = ?{}", ident(column)?, i + 1));
            params.push(to_sql(value));
        }
        let (where_sql, where_params) = where_clause(filter, params.len())?;
        params.extend(where_params);
        let sql = format!("UPDATE {} SET {}{}", ident(table)?, sets.join(", "), where_sql);

        let conn = self.conn.lock().await;
        conn.execute(&sql, params_from_iter(params))?;
        Ok(())
    }

    async fn delete(&self, table: &str, filter: &Filter) -> StoreResult<()> {
        if filter.is_empty() {
            return Err(StoreError::Other("refusing to delete without a filter".to_string()));
        }
        let (where_sql, params) = where_clause(filter, 0)?;
        let sql = format!("DELETE FROM {}{}", ident(table)?, where_sql);

        let conn = self.conn.lock().await;
        let affected = conn.execute(&sql, params_from_iter(params))?;
        if affected == 0 {
            return Err(StoreError::NotFound { table: table.to_string() });
        }
        Ok(())
    }

    async fn upsert(&self, table: &str, rows: Vec<Row>) -> StoreResult<()> {
        let table = ident(table)?;
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        for row in rows {
            if !row.contains_key("id") {
                return Err(StoreError::Other(format!("upsert into {} needs an id column", table)));
            }
            let columns = row.keys().map(|c| ident(c)).collect::<StoreResult<Vec<_>>>()?;
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
            let updates: Vec<String> = columns
                .iter()
                .filter(|c| **c != "id")
                .map(|c| format!("{c} = excluded.{c}"))
                .collect();
            let conflict = if updates.is_empty() {
                "DO NOTHING".to_string()
            } else {
                format!("DO UPDATE SET {}", updates.join(", "))
            };
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) {}",
                table,
                columns.join(", "),
                placeholders.join(", "),
                conflict
            );
            let params: Vec<SqlValue> = row.values().map(to_sql).collect();
            tx.execute(&sql, params_from_iter(params))?;
        }

        tx.commit()?;
        Ok(())
    }
}
