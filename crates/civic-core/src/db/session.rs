//! The per-table primitive operations the store adapter is built on.
//!
//! [`Session`] deliberately exposes only what a wide-column engine offers:
//! whole-row upserts, key-addressed updates and deletes, filtered scans of a
//! single table, and truncation. There are no joins and no multi-table
//! transactions; keeping several tables in agreement is the adapter's job.
//!
//! Table and column names passed to a session are `&'static str` constants
//! from [`super::schema`] and the view definitions, never caller input, so
//! they are spliced into SQL directly while values are always bound.

use crate::error::StoreError;
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, params_from_iter};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// One key column paired with the value that addresses it.
pub type KeyPart = (&'static str, Value);

/// A full row keyed by column name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.columns.insert(column.to_string(), value.into());
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        self.columns.insert(column.to_string(), value.into());
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Names of columns whose values differ between the two rows.
    #[must_use]
    pub fn diff(&self, other: &Self) -> Vec<String> {
        let mut names: Vec<String> = self
            .columns
            .iter()
            .filter(|(name, value)| other.columns.get(*name) != Some(*value))
            .map(|(name, _)| name.clone())
            .collect();
        for name in other.columns.keys() {
            if !self.columns.contains_key(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// Row filter applied by [`Session::select`]. Bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(&'static str, Value),
    AtLeast(&'static str, Value),
    AtMost(&'static str, Value),
}

impl Predicate {
    const fn column(&self) -> &'static str {
        match self {
            Self::Eq(column, _) | Self::AtLeast(column, _) | Self::AtMost(column, _) => *column,
        }
    }

    const fn operator(&self) -> &'static str {
        match self {
            Self::Eq(..) => "=",
            Self::AtLeast(..) => ">=",
            Self::AtMost(..) => "<=",
        }
    }

    const fn value(&self) -> &Value {
        match self {
            Self::Eq(_, value) | Self::AtLeast(_, value) | Self::AtMost(_, value) => value,
        }
    }
}

/// Scan order on a clustering column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc(&'static str),
    Desc(&'static str),
}

/// Column assignment applied by [`Session::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Set(&'static str, Value),
    /// In-place counter add, evaluated by the engine and floored at zero.
    Add(&'static str, i64),
}

/// Primitive single-table operations against the backing engine.
///
/// Each call blocks until the engine has answered. Implementations must
/// report an engine that stayed busy past its timeout as
/// [`StoreError::NoResponse`].
pub trait Session {
    /// Insert a full row, replacing any row with the same primary key.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the engine rejects the write.
    fn upsert(&self, table: &'static str, row: &Row) -> Result<(), StoreError>;

    /// Read rows matching every predicate.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the engine rejects the read.
    fn select(
        &self,
        table: &'static str,
        predicates: &[Predicate],
        order: Option<Order>,
        limit: Option<u32>,
    ) -> Result<Vec<Row>, StoreError>;

    /// Apply assignments to the rows addressed by `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the engine rejects the write.
    fn update(
        &self,
        table: &'static str,
        assignments: &[Assignment],
        key: &[KeyPart],
    ) -> Result<(), StoreError>;

    /// Delete every row whose key starts with `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the engine rejects the delete.
    fn delete(&self, table: &'static str, key: &[KeyPart]) -> Result<(), StoreError>;

    /// Remove every row of `table`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the engine rejects the truncation.
    fn truncate(&self, table: &'static str) -> Result<(), StoreError>;
}

impl<S: Session + ?Sized> Session for &S {
    fn upsert(&self, table: &'static str, row: &Row) -> Result<(), StoreError> {
        (**self).upsert(table, row)
    }

    fn select(
        &self,
        table: &'static str,
        predicates: &[Predicate],
        order: Option<Order>,
        limit: Option<u32>,
    ) -> Result<Vec<Row>, StoreError> {
        (**self).select(table, predicates, order, limit)
    }

    fn update(
        &self,
        table: &'static str,
        assignments: &[Assignment],
        key: &[KeyPart],
    ) -> Result<(), StoreError> {
        (**self).update(table, assignments, key)
    }

    fn delete(&self, table: &'static str, key: &[KeyPart]) -> Result<(), StoreError> {
        (**self).delete(table, key)
    }

    fn truncate(&self, table: &'static str) -> Result<(), StoreError> {
        (**self).truncate(table)
    }
}

/// [`Session`] over a `rusqlite` connection.
#[derive(Debug)]
pub struct SqliteSession {
    conn: Connection,
}

impl SqliteSession {
    /// Wrap an already configured and migrated connection.
    #[must_use]
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    fn classify(op: &'static str, table: &'static str, source: rusqlite::Error) -> StoreError {
        match source.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                StoreError::NoResponse { table }
            }
            _ => StoreError::Engine { op, table, source },
        }
    }

    fn execute(
        &self,
        op: &'static str,
        table: &'static str,
        sql: &str,
        values: &[&Value],
    ) -> Result<usize, StoreError> {
        tracing::trace!(op, table, sql = %sql, "session execute");
        self.conn
            .execute(sql, params_from_iter(values.iter()))
            .map_err(|err| Self::classify(op, table, err))
    }
}

fn push_where<'v>(
    sql: &mut String,
    clauses: &[(&'static str, &'static str, &'v Value)],
    values: &mut Vec<&'v Value>,
) {
    for (idx, &(column, operator, value)) in clauses.iter().enumerate() {
        sql.push_str(if idx == 0 { " WHERE " } else { " AND " });
        values.push(value);
        let _ = write!(sql, "{column} {operator} ?{}", values.len());
    }
}

impl Session for SqliteSession {
    fn upsert(&self, table: &'static str, row: &Row) -> Result<(), StoreError> {
        let mut columns = Vec::with_capacity(row.len());
        let mut placeholders = Vec::with_capacity(row.len());
        let mut values = Vec::with_capacity(row.len());
        for (idx, (column, value)) in row.iter().enumerate() {
            columns.push(column);
            placeholders.push(format!("?{}", idx + 1));
            values.push(value);
        }
        let sql = format!(
            "INSERT OR REPLACE INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        self.execute("upsert", table, &sql, &values).map(|_| ())
    }

    fn select(
        &self,
        table: &'static str,
        predicates: &[Predicate],
        order: Option<Order>,
        limit: Option<u32>,
    ) -> Result<Vec<Row>, StoreError> {
        let mut sql = format!("SELECT * FROM {table}");
        let mut values = Vec::with_capacity(predicates.len());
        let clauses: Vec<_> = predicates
            .iter()
            .map(|p| (p.column(), p.operator(), p.value()))
            .collect();
        push_where(&mut sql, &clauses, &mut values);
        match order {
            Some(Order::Asc(column)) => {
                let _ = write!(sql, " ORDER BY {column} ASC");
            }
            Some(Order::Desc(column)) => {
                let _ = write!(sql, " ORDER BY {column} DESC");
            }
            None => {}
        }
        if let Some(limit) = limit {
            let _ = write!(sql, " LIMIT {limit}");
        }

        tracing::trace!(table, sql = %sql, "session select");
        let classify = |err| Self::classify("select", table, err);
        let mut stmt = self.conn.prepare(&sql).map_err(classify)?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let mut out = Row::new();
                for (idx, name) in names.iter().enumerate() {
                    out.set(name, row.get::<_, Value>(idx)?);
                }
                Ok(out)
            })
            .map_err(classify)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(classify)
    }

    fn update(
        &self,
        table: &'static str,
        assignments: &[Assignment],
        key: &[KeyPart],
    ) -> Result<(), StoreError> {
        let mut sql = format!("UPDATE {table} SET ");
        let mut values: Vec<&Value> = Vec::with_capacity(assignments.len() + key.len());
        let deltas: Vec<Value> = assignments
            .iter()
            .map(|a| match a {
                Assignment::Set(_, value) => value.clone(),
                Assignment::Add(_, delta) => Value::Integer(*delta),
            })
            .collect();
        for (idx, (assignment, value)) in assignments.iter().zip(&deltas).enumerate() {
            if idx > 0 {
                sql.push_str(", ");
            }
            values.push(value);
            let n = values.len();
            let _ = match assignment {
                Assignment::Set(column, _) => write!(sql, "{column} = ?{n}"),
                Assignment::Add(column, _) => write!(sql, "{column} = MAX({column} + ?{n}, 0)"),
            };
        }
        let clauses: Vec<_> = key.iter().map(|(c, v)| (*c, "=", v)).collect();
        push_where(&mut sql, &clauses, &mut values);
        self.execute("update", table, &sql, &values).map(|_| ())
    }

    fn delete(&self, table: &'static str, key: &[KeyPart]) -> Result<(), StoreError> {
        let mut sql = format!("DELETE FROM {table}");
        let mut values = Vec::with_capacity(key.len());
        let clauses: Vec<_> = key.iter().map(|(c, v)| (*c, "=", v)).collect();
        push_where(&mut sql, &clauses, &mut values);
        self.execute("delete", table, &sql, &values).map(|_| ())
    }

    fn truncate(&self, table: &'static str) -> Result<(), StoreError> {
        self.execute("truncate", table, &format!("DELETE FROM {table}"), &[])
            .map(|_| ())
    }
}
