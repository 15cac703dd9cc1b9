//! The seam between the generated statements and the database.

use std::time::{Duration, Instant};
use rusqlite::{Connection, Transaction, Savepoint};
use rusqlite::types::FromSql;
use tracing::{debug, warn};
use crate::schema::Record;
use crate::param::bind_record;
use crate::sql::StatementKind;
use crate::error::{Error, Result};


/// Runs a statement with its parameters taken from a record.
///
/// Implemented for [`Connection`], [`Transaction`], and [`Savepoint`], so
/// the same operations can run either on their own or as part of a larger
/// transaction that the caller controls. Errors are returned as they come
/// from the database; nothing is retried.
pub trait Executor {
    /// Runs `sql` and decodes the first returned row, if any, by scanning it
    /// into a new record (see [`Record::scan_row()`]). Further rows are not
    /// consulted.
    fn fetch_first<R: Record>(&self, sql: &str, record: &R) -> Result<Option<R>>;

    /// Runs `sql` and decodes the first column of the first returned row,
    /// if any.
    fn fetch_value<R: Record, T: FromSql>(&self, sql: &str, record: &R) -> Result<Option<T>>;

    /// Runs `sql`, discarding any rows, and returns the number of rows changed.
    fn execute<R: Record>(&self, sql: &str, record: &R) -> Result<usize>;
}

impl Executor for Connection {
    fn fetch_first<R: Record>(&self, sql: &str, record: &R) -> Result<Option<R>> {
        let mut statement = self.prepare_cached(sql)?;
        bind_record(&mut statement, record)?;

        let result = {
            let mut rows = statement.raw_query();

            match rows.next()? {
                Some(row) => Some(record.scan_row(row)?),
                None => None,
            }
        };

        // don't let big strings and blobs sit in the statement cache
        statement.clear_bindings();

        Ok(result)
    }

    fn fetch_value<R: Record, T: FromSql>(&self, sql: &str, record: &R) -> Result<Option<T>> {
        let mut statement = self.prepare_cached(sql)?;
        bind_record(&mut statement, record)?;

        let result = {
            let mut rows = statement.raw_query();

            match rows.next()? {
                Some(row) => Some(row.get(0).map_err(Error::decode)?),
                None => None,
            }
        };

        statement.clear_bindings();

        Ok(result)
    }

    fn execute<R: Record>(&self, sql: &str, record: &R) -> Result<usize> {
        let mut statement = self.prepare_cached(sql)?;
        bind_record(&mut statement, record)?;

        let changed = statement.raw_execute()?;
        statement.clear_bindings();

        Ok(changed)
    }
}

impl Executor for Transaction<'_> {
    fn fetch_first<R: Record>(&self, sql: &str, record: &R) -> Result<Option<R>> {
        <Connection as Executor>::fetch_first(self, sql, record)
    }

    fn fetch_value<R: Record, T: FromSql>(&self, sql: &str, record: &R) -> Result<Option<T>> {
        <Connection as Executor>::fetch_value(self, sql, record)
    }

    fn execute<R: Record>(&self, sql: &str, record: &R) -> Result<usize> {
        <Connection as Executor>::execute(self, sql, record)
    }
}

impl Executor for Savepoint<'_> {
    fn fetch_first<R: Record>(&self, sql: &str, record: &R) -> Result<Option<R>> {
        <Connection as Executor>::fetch_first(self, sql, record)
    }

    fn fetch_value<R: Record, T: FromSql>(&self, sql: &str, record: &R) -> Result<Option<T>> {
        <Connection as Executor>::fetch_value(self, sql, record)
    }

    fn execute<R: Record>(&self, sql: &str, record: &R) -> Result<usize> {
        <Connection as Executor>::execute(self, sql, record)
    }
}

impl<E: ?Sized + Executor> Executor for &E {
    fn fetch_first<R: Record>(&self, sql: &str, record: &R) -> Result<Option<R>> {
        E::fetch_first(&**self, sql, record)
    }

    fn fetch_value<R: Record, T: FromSql>(&self, sql: &str, record: &R) -> Result<Option<T>> {
        E::fetch_value(&**self, sql, record)
    }

    fn execute<R: Record>(&self, sql: &str, record: &R) -> Result<usize> {
        E::execute(&**self, sql, record)
    }
}

/// Runs one generated statement through `f`, logging it, warning if it took
/// longer than `slow_threshold`, and attributing failures to `kind`.
pub(crate) fn run_statement<T, F>(
    kind: StatementKind,
    table: &str,
    sql: &str,
    slow_threshold: Option<Duration>,
    f: F,
) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    debug!(statement = %kind, table, sql, "running generated statement");

    let start = Instant::now();
    let result = f().map_err(|error| error.during(kind));
    let elapsed = start.elapsed();

    if let Some(threshold) = slow_threshold {
        if elapsed > threshold {
            warn!(statement = %kind, table, sql, ?elapsed, ?threshold, "slow statement");
        }
    }

    result
}
