//! Fan-out adapter that keeps every view of an entity in step.
//!
//! An entity type implementing [`Replicated`] declares its views, the first
//! of which is canonical: it answers exact-match lookups by the entity's
//! identity. The other views key the same row on different column orders,
//! and most of them include `created_at` in their key, so they can only be
//! addressed once the canonical row has been read.
//!
//! Every mutating operation therefore runs in two phases:
//!
//! 1. look the entity up in the canonical view (failing with `NotFound`
//!    before anything is written), then
//! 2. apply one change to each view in declaration order through
//!    [`ReplicaStore::mutate_all_views`].
//!
//! There is no rollback. If phase 2 fails after at least one view was
//! written, the error is returned as [`StoreError::PartialFanOut`] listing
//! the views that were written, and the divergence is logged. Repeating the
//! operation is safe because every write is an upsert or an assignment.

pub mod comments;
pub mod proposals;

use crate::db::{Assignment, KeyPart, Order, Predicate, Row, Session};
use crate::error::{CivicError, StoreError};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

/// One physically stored copy of an entity, keyed for one read pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View {
    pub table: &'static str,
    /// Primary key columns in partition/clustering order.
    pub key: &'static [&'static str],
}

impl View {
    /// Values of this view's key columns taken from a full row.
    #[must_use]
    pub fn address(&self, row: &Row) -> Vec<KeyPart> {
        self.key
            .iter()
            .map(|column| (*column, row.get(column).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    fn is_partitioned_by(&self, partition: &[KeyPart]) -> bool {
        partition.len() <= self.key.len()
            && partition
                .iter()
                .zip(self.key)
                .all(|((column, _), key)| column == key)
    }
}

/// An entity stored redundantly across several views.
pub trait Replicated: Sized {
    /// Identity used for canonical lookups.
    type Key: fmt::Display + Ord + Clone;
    /// Columns that may change after creation.
    type Field: Copy + fmt::Debug;

    const ENTITY: &'static str;
    /// All views of the entity; the first is canonical.
    const VIEWS: &'static [View];

    fn key(&self) -> Self::Key;
    fn canonical_key(key: &Self::Key) -> Vec<KeyPart>;
    fn to_row(&self) -> Row;
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] when a column is missing or malformed.
    fn from_row(row: &RowReader<'_>) -> Result<Self, StoreError>;
    fn column(field: Self::Field) -> &'static str;
    /// Reject records that must never reach the store.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::Validation`] naming the offending field.
    fn validate(&self) -> Result<(), CivicError>;

    #[must_use]
    fn canonical_view() -> View {
        Self::VIEWS[0]
    }
}

/// A change to one mutable field, applied identically to every view.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<F> {
    Set(F, Value),
    Add(F, i64),
}

impl<F: Copy> Change<F> {
    fn assignment<E: Replicated<Field = F>>(&self) -> Assignment {
        match self {
            Self::Set(field, value) => Assignment::Set(E::column(*field), value.clone()),
            Self::Add(field, delta) => Assignment::Add(E::column(*field), *delta),
        }
    }
}

/// Outcome of a bulk purge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub cleared: Vec<&'static str>,
    /// Views whose purge got no response and were skipped.
    pub timed_out: Vec<&'static str>,
}

impl PurgeReport {
    pub fn merge(&mut self, other: Self) {
        self.cleared.extend(other.cleared);
        self.timed_out.extend(other.timed_out);
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.timed_out.is_empty()
    }
}

/// Typed column access over a row read from `table`.
pub struct RowReader<'r> {
    table: &'static str,
    row: &'r Row,
}

impl<'r> RowReader<'r> {
    #[must_use]
    pub const fn new(table: &'static str, row: &'r Row) -> Self {
        Self { table, row }
    }

    fn decode_error(&self, column: &'static str, reason: impl Into<String>) -> StoreError {
        StoreError::Decode {
            table: self.table,
            column,
            reason: reason.into(),
        }
    }

    fn value(&self, column: &'static str) -> Result<&'r Value, StoreError> {
        self.row
            .get(column)
            .ok_or_else(|| self.decode_error(column, "column missing"))
    }

    fn integer(&self, column: &'static str) -> Result<i64, StoreError> {
        match self.value(column)? {
            Value::Integer(n) => Ok(*n),
            other => Err(self.decode_error(column, format!("expected integer, got {other:?}"))),
        }
    }

    /// # Errors
    ///
    /// Fails when the column is missing or not text.
    pub fn text(&self, column: &'static str) -> Result<String, StoreError> {
        match self.value(column)? {
            Value::Text(text) => Ok(text.clone()),
            other => Err(self.decode_error(column, format!("expected text, got {other:?}"))),
        }
    }

    /// # Errors
    ///
    /// Fails when the column is missing, not an integer, or negative.
    pub fn counter(&self, column: &'static str) -> Result<u32, StoreError> {
        let raw = self.integer(column)?;
        u32::try_from(raw)
            .map_err(|_| self.decode_error(column, format!("counter out of range: {raw}")))
    }

    /// # Errors
    ///
    /// Fails when the column is missing or not a representable instant.
    pub fn timestamp(&self, column: &'static str) -> Result<DateTime<Utc>, StoreError> {
        let micros = self.integer(column)?;
        DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| self.decode_error(column, format!("timestamp out of range: {micros}")))
    }

    /// # Errors
    ///
    /// Fails when the column is missing or does not parse as `T`.
    pub fn id<T>(&self, column: &'static str) -> Result<T, StoreError>
    where
        T: FromStr<Err = CivicError>,
    {
        let raw = self.text(column)?;
        raw.parse()
            .map_err(|err: CivicError| self.decode_error(column, err.to_string()))
    }
}

/// Encode a timestamp the way every view stores it.
#[must_use]
pub fn micros(at: DateTime<Utc>) -> Value {
    Value::Integer(at.timestamp_micros())
}

/// Runs logical operations for entity `E` against all of its views.
pub struct ReplicaStore<'s, S: ?Sized, E> {
    session: &'s S,
    entity: PhantomData<fn() -> E>,
}

impl<S: ?Sized, E> Clone for ReplicaStore<'_, S, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized, E> Copy for ReplicaStore<'_, S, E> {}

impl<'s, S: Session + ?Sized, E: Replicated> ReplicaStore<'s, S, E> {
    #[must_use]
    pub const fn new(session: &'s S) -> Self {
        Self {
            session,
            entity: PhantomData,
        }
    }

    #[must_use]
    pub const fn session(&self) -> &'s S {
        self.session
    }

    /// Write a complete record into every view.
    ///
    /// # Errors
    ///
    /// Validation failures are raised before any view is written; store
    /// failures surface as [`CivicError::Store`].
    pub fn insert(&self, entity: &E) -> Result<(), CivicError> {
        entity.validate()?;
        let row = entity.to_row();
        self.mutate_all_views("insert", |view| self.session.upsert(view.table, &row))?;
        Ok(())
    }

    /// Exact-match lookup in the canonical view.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read or row decoding fails.
    pub fn find(&self, key: &E::Key) -> Result<Option<E>, CivicError> {
        let view = E::canonical_view();
        let predicates: Vec<Predicate> = E::canonical_key(key)
            .into_iter()
            .map(|(column, value)| Predicate::Eq(column, value))
            .collect();
        let rows = self.session.select(view.table, &predicates, None, Some(1))?;
        let found = rows
            .first()
            .map(|row| E::from_row(&RowReader::new(view.table, row)))
            .transpose()?;
        Ok(found)
    }

    /// Like [`Self::find`] but a missing record is an error.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::NotFound`] when the canonical view has no row.
    pub fn get(&self, key: &E::Key) -> Result<E, CivicError> {
        self.find(key)?.ok_or_else(|| CivicError::not_found(E::ENTITY, key))
    }

    /// Apply `changes` to every view of the entity addressed by `key`.
    ///
    /// Returns the record as it was read before the change.
    ///
    /// # Errors
    ///
    /// `NotFound` if the canonical lookup misses (no view is touched);
    /// otherwise any store failure, partial fan-out included.
    pub fn update(&self, key: &E::Key, changes: &[Change<E::Field>]) -> Result<E, CivicError> {
        let current = self.get(key)?;
        let row = current.to_row();
        let assignments: Vec<Assignment> = changes.iter().map(Change::assignment::<E>).collect();
        self.mutate_all_views("update", |view| {
            self.session
                .update(view.table, &assignments, &view.address(&row))
        })?;
        Ok(current)
    }

    /// Remove the entity addressed by `key` from every view.
    ///
    /// # Errors
    ///
    /// `NotFound` if the canonical lookup misses; otherwise store failures.
    pub fn delete(&self, key: &E::Key) -> Result<E, CivicError> {
        let current = self.get(key)?;
        let row = current.to_row();
        self.mutate_all_views("delete", |view| {
            self.session.delete(view.table, &view.address(&row))
        })?;
        Ok(current)
    }

    /// Delete a whole partition from every view.
    ///
    /// Every view must lead its key with the partition columns.
    ///
    /// # Errors
    ///
    /// Store failures, partial fan-out included.
    pub fn delete_partition(&self, partition: &[KeyPart]) -> Result<(), CivicError> {
        debug_assert!(
            E::VIEWS.iter().all(|view| view.is_partitioned_by(partition)),
            "{} views are not all partitioned by {partition:?}",
            E::ENTITY
        );
        self.mutate_all_views("delete_partition", |view| {
            self.session.delete(view.table, partition)
        })?;
        Ok(())
    }

    /// Clear every view of the entity type.
    ///
    /// A view that gets no response is skipped and reported; the remaining
    /// views are still attempted. Any other failure aborts the purge.
    ///
    /// # Errors
    ///
    /// The first store failure that is not a timeout.
    pub fn purge(&self) -> Result<PurgeReport, CivicError> {
        let mut report = PurgeReport::default();
        for view in E::VIEWS {
            match self.session.truncate(view.table) {
                Ok(()) => report.cleared.push(view.table),
                Err(err) if err.is_no_response() => {
                    tracing::warn!(
                        entity = E::ENTITY,
                        table = view.table,
                        "purge got no response; continuing with remaining views"
                    );
                    report.timed_out.push(view.table);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(report)
    }

    /// Read decoded records from one view.
    ///
    /// # Errors
    ///
    /// Store failures and undecodable rows.
    pub fn scan(
        &self,
        view: View,
        predicates: &[Predicate],
        order: Option<Order>,
    ) -> Result<Vec<E>, CivicError> {
        let rows = self.session.select(view.table, predicates, order, None)?;
        let records = rows
            .iter()
            .map(|row| E::from_row(&RowReader::new(view.table, row)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Apply one operation to every view in declaration order.
    ///
    /// Stops at the first failure. A failure on the first view leaves all
    /// views untouched and is returned as-is; a later one is wrapped in
    /// [`StoreError::PartialFanOut`].
    ///
    /// # Errors
    ///
    /// The failing view's error, wrapped when earlier views were written.
    pub fn mutate_all_views<F>(&self, op: &'static str, mut apply: F) -> Result<(), StoreError>
    where
        F: FnMut(&View) -> Result<(), StoreError>,
    {
        let mut applied = Vec::with_capacity(E::VIEWS.len());
        for view in E::VIEWS {
            if let Err(source) = apply(view) {
                if applied.is_empty() {
                    return Err(source);
                }
                tracing::error!(
                    entity = E::ENTITY,
                    op,
                    failed = view.table,
                    applied = ?applied,
                    error = %source,
                    "fan-out stopped part way; views diverge until repaired"
                );
                return Err(StoreError::PartialFanOut {
                    op,
                    applied,
                    failed: view.table,
                    source: Box::new(source),
                });
            }
            tracing::debug!(entity = E::ENTITY, op, table = view.table, "view written");
            applied.push(view.table);
        }
        Ok(())
    }
}
