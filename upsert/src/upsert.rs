//! Update-or-insert orchestration.

use core::fmt::{self, Debug, Display, Formatter};
use std::time::Duration;
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, warn};
use crate::schema::{Record, Schema};
use crate::detect::Detection;
use crate::exec::{Executor, run_statement};
use crate::sql::StatementKind;
use crate::error::{Error, Result};


/// What an upsert did to the database.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Outcome {
    /// No row matched the key, so a new one was inserted.
    Inserted,
    /// A matching row was updated.
    Updated,
    /// A matching row already held the same values; nothing was written.
    NoChange,
}

impl Outcome {
    /// Whether a new row was created.
    pub const fn is_inserted(self) -> bool {
        matches!(self, Outcome::Inserted)
    }

    /// Whether any write statement was sent to the database.
    pub const fn is_written(self) -> bool {
        !matches!(self, Outcome::NoChange)
    }
}

impl Display for Outcome {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match *self {
            Outcome::Inserted => "inserted",
            Outcome::Updated  => "updated",
            Outcome::NoChange => "no change",
        })
    }
}

/// The result of a successful upsert.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Upserted<R> {
    /// What happened.
    pub outcome: Outcome,
    /// The row as stored, including any values computed by the database
    /// (e.g. an `INTEGER PRIMARY KEY` or column defaults).
    pub record: R,
}

impl<R> Upserted<R> {
    /// Discards the outcome.
    pub fn into_record(self) -> R {
        self.record
    }
}

/// Configures and runs the record-level operations.
///
/// The defaults read the stored row before writing, so that an unchanged
/// record reports [`Outcome::NoChange`] without any write traffic; transactions
/// are opened as `IMMEDIATE`, and no slow statements are reported.
#[derive(Clone, Copy)]
pub struct Upserter {
    detect_changes: bool,
    slow_threshold: Option<Duration>,
    behavior: TransactionBehavior,
}

impl Default for Upserter {
    fn default() -> Self {
        Upserter {
            detect_changes: true,
            slow_threshold: None,
            behavior: TransactionBehavior::Immediate,
        }
    }
}

impl Debug for Upserter {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let behavior = match self.behavior {
            TransactionBehavior::Deferred => "Deferred",
            TransactionBehavior::Immediate => "Immediate",
            TransactionBehavior::Exclusive => "Exclusive",
            _ => "Other",
        };

        formatter
            .debug_struct("Upserter")
            .field("detect_changes", &self.detect_changes)
            .field("slow_threshold", &self.slow_threshold)
            .field("behavior", &format_args!("{behavior}"))
            .finish()
    }
}

impl Upserter {
    /// Creates an upserter with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether to read the stored row before writing. Without this, one
    /// round trip is saved, but an unchanged row is reported as
    /// [`Outcome::Updated`] and rewritten.
    pub fn detect_changes(mut self, flag: bool) -> Self {
        self.detect_changes = flag;
        self
    }

    /// Emits a warning for each statement that runs longer than `threshold`.
    pub fn slow_statement_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    /// The locking behavior of transactions opened by [`Upserter::upsert_tx()`].
    pub fn transaction_behavior(mut self, behavior: TransactionBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Writes `record`, updating the row under its key if there is one and
    /// inserting a new row otherwise.
    ///
    /// No transaction is opened, so pass a [`rusqlite::Transaction`] as the
    /// executor if the read and the write(s) must be atomic. The key columns
    /// must be unique in the table; otherwise, the update may touch several
    /// rows while only the first one is returned.
    pub fn upsert<E, R>(&self, exec: &E, record: &R) -> Result<Upserted<R>>
    where
        E: ?Sized + Executor,
        R: Record + 'static,
    {
        let schema = Schema::of::<R>()?;

        let upserted = if self.detect_changes {
            match self.detect_with(exec, &schema, record)? {
                Detection::Unchanged(current) => Upserted {
                    outcome: Outcome::NoChange,
                    record: current,
                },
                Detection::Absent => Upserted {
                    outcome: Outcome::Inserted,
                    record: self.insert_with(exec, &schema, record)?,
                },
                Detection::Changed(_) => self.write_with(exec, &schema, record)?,
            }
        } else {
            self.write_with(exec, &schema, record)?
        };

        debug!(table = schema.table(), outcome = %upserted.outcome, "upserted record");

        Ok(upserted)
    }

    /// Runs [`Upserter::upsert()`] in a new transaction, which is committed if
    /// the upsert succeeds and rolled back otherwise.
    pub fn upsert_tx<R>(&self, conn: &mut Connection, record: &R) -> Result<Upserted<R>>
    where
        R: Record + 'static,
    {
        let txn = conn.transaction_with_behavior(self.behavior)?;

        match self.upsert(&txn, record) {
            Ok(upserted) => {
                txn.commit()?;
                Ok(upserted)
            }
            Err(error) => {
                if let Err(rollback_error) = txn.rollback() {
                    warn!(%error, %rollback_error, "rollback after failed upsert also failed");
                }
                Err(error)
            }
        }
    }

    /// Updates the row under the key of `record`.
    ///
    /// Fails with [`Error::NoIdReturned`] if there is no such row.
    pub fn update<E, R>(&self, exec: &E, record: &R) -> Result<R>
    where
        E: ?Sized + Executor,
        R: Record + 'static,
    {
        let schema = Schema::of::<R>()?;

        self.update_with(exec, &schema, record)?.ok_or_else(|| Error::NoIdReturned {
            table: schema.table().into(),
        })
    }

    /// Inserts `record` as a new row.
    pub fn insert<E, R>(&self, exec: &E, record: &R) -> Result<R>
    where
        E: ?Sized + Executor,
        R: Record + 'static,
    {
        let schema = Schema::of::<R>()?;
        self.insert_with(exec, &schema, record)
    }

    /// Reads the row stored under the key of `record`, if any.
    pub fn fetch<E, R>(&self, exec: &E, record: &R) -> Result<Option<R>>
    where
        E: ?Sized + Executor,
        R: Record + 'static,
    {
        let schema = Schema::of::<R>()?;
        self.fetch_with(exec, &schema, record)
    }

    /// Reads the row under the key of `record` and compares it to `record`.
    ///
    /// Columns written from a value expression are compared by the database,
    /// since their stored value depends on the bound inputs of the expression.
    pub fn detect<E, R>(&self, exec: &E, record: &R) -> Result<Detection<R>>
    where
        E: ?Sized + Executor,
        R: Record + 'static,
    {
        let schema = Schema::of::<R>()?;
        self.detect_with(exec, &schema, record)
    }

    /// Deletes the row(s) under the key of `record`, returning how many were deleted.
    pub fn delete<E, R>(&self, exec: &E, record: &R) -> Result<usize>
    where
        E: ?Sized + Executor,
        R: Record + 'static,
    {
        let schema = Schema::of::<R>()?;
        let sql = schema.sql(StatementKind::Delete);

        run_statement(StatementKind::Delete, schema.table(), sql, self.slow_threshold, || {
            exec.execute(sql, record)
        })
    }

    fn fetch_with<E, R>(&self, exec: &E, schema: &Schema, record: &R) -> Result<Option<R>>
    where
        E: ?Sized + Executor,
        R: Record,
    {
        let sql = schema.sql(StatementKind::Select);

        run_statement(StatementKind::Select, schema.table(), sql, self.slow_threshold, || {
            exec.fetch_first(sql, record)
        })
    }

    fn detect_with<E, R>(&self, exec: &E, schema: &Schema, record: &R) -> Result<Detection<R>>
    where
        E: ?Sized + Executor,
        R: Record,
    {
        let detection = Detection::classify(record, self.fetch_with(exec, schema, record)?);

        let detection = match (detection, schema.compare_sql()) {
            (Detection::Unchanged(current), Some(sql)) => {
                let same: Option<bool> = run_statement(
                    StatementKind::Select,
                    schema.table(),
                    sql,
                    self.slow_threshold,
                    || exec.fetch_value(sql, record),
                )?;

                // `None` if the row was deleted in between
                if same == Some(true) {
                    Detection::Unchanged(current)
                } else {
                    Detection::Changed(current)
                }
            }
            (detection, _) => detection,
        };

        debug!(table = schema.table(), state = detection.as_str(), "detected stored row");

        Ok(detection)
    }

    /// Updates the row, falling back to an insert if no row matched the key.
    /// The row may have disappeared since it was detected, in which case it
    /// is inserted just like an absent one.
    fn write_with<E, R>(&self, exec: &E, schema: &Schema, record: &R) -> Result<Upserted<R>>
    where
        E: ?Sized + Executor,
        R: Record,
    {
        let upserted = match self.update_with(exec, schema, record)? {
            Some(record) => Upserted { outcome: Outcome::Updated, record },
            None => Upserted {
                outcome: Outcome::Inserted,
                record: self.insert_with(exec, schema, record)?,
            },
        };

        Ok(upserted)
    }

    /// `Ok(None)` means that no row matched the key.
    fn update_with<E, R>(&self, exec: &E, schema: &Schema, record: &R) -> Result<Option<R>>
    where
        E: ?Sized + Executor,
        R: Record,
    {
        let sql = schema.sql(StatementKind::Update);

        run_statement(StatementKind::Update, schema.table(), sql, self.slow_threshold, || {
            exec.fetch_first(sql, record)
        })
    }

    fn insert_with<E, R>(&self, exec: &E, schema: &Schema, record: &R) -> Result<R>
    where
        E: ?Sized + Executor,
        R: Record,
    {
        let sql = schema.sql(StatementKind::Insert);
        let inserted = run_statement(StatementKind::Insert, schema.table(), sql, self.slow_threshold, || {
            exec.fetch_first(sql, record)
        })?;

        inserted.ok_or_else(|| Error::NoIdReturned { table: schema.table().into() })
    }
}

/// Upserts `record` with the default [`Upserter`] configuration.
pub fn upsert<E, R>(exec: &E, record: &R) -> Result<Upserted<R>>
where
    E: ?Sized + Executor,
    R: Record + 'static,
{
    Upserter::default().upsert(exec, record)
}

/// Upserts `record` in a new transaction, with the default [`Upserter`] configuration.
pub fn upsert_tx<R>(conn: &mut Connection, record: &R) -> Result<Upserted<R>>
where
    R: Record + 'static,
{
    Upserter::default().upsert_tx(conn, record)
}

/// Updates the row under the key of `record`, with the default [`Upserter`] configuration.
pub fn update<E, R>(exec: &E, record: &R) -> Result<R>
where
    E: ?Sized + Executor,
    R: Record + 'static,
{
    Upserter::default().update(exec, record)
}

/// Inserts `record`, with the default [`Upserter`] configuration.
pub fn insert<E, R>(exec: &E, record: &R) -> Result<R>
where
    E: ?Sized + Executor,
    R: Record + 'static,
{
    Upserter::default().insert(exec, record)
}

/// Reads the row under the key of `record`, with the default [`Upserter`] configuration.
pub fn fetch<E, R>(exec: &E, record: &R) -> Result<Option<R>>
where
    E: ?Sized + Executor,
    R: Record + 'static,
{
    Upserter::default().fetch(exec, record)
}

/// Deletes the row under the key of `record`, with the default [`Upserter`] configuration.
pub fn delete<E, R>(exec: &E, record: &R) -> Result<usize>
where
    E: ?Sized + Executor,
    R: Record + 'static,
{
    Upserter::default().delete(exec, record)
}
