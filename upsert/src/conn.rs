//! Record-level operations as methods on SQLite connections.

use rusqlite::{Connection, Transaction, Savepoint};
use crate::{
    schema::Record,
    detect::Detection,
    exec::Executor,
    upsert::{Upserter, Upserted},
    error::Result,
    util::Sealed,
};


/// This extension trait defines the record-level operations on
/// [`Connection`], [`Transaction`], and [`Savepoint`], using the default
/// [`Upserter`] configuration. Build an [`Upserter`] explicitly in order to
/// turn off change detection or to log slow statements.
///
/// None of these methods open a transaction. Use [`crate::upsert_tx()`] for
/// an upsert that is atomic on its own.
#[allow(private_bounds)]
pub trait ConnectionExt: Executor + Sealed {
    /// Updates the row under the key of `record` if there is one, and inserts
    /// `record` as a new row otherwise. See [`Upserter::upsert()`].
    fn upsert<R: Record + 'static>(&self, record: &R) -> Result<Upserted<R>> {
        Upserter::default().upsert(self, record)
    }

    /// Inserts `record` as a new row, returning it as stored.
    fn insert_record<R: Record + 'static>(&self, record: &R) -> Result<R> {
        Upserter::default().insert(self, record)
    }

    /// Updates the row under the key of `record`, returning it as stored.
    /// Fails with [`crate::Error::NoIdReturned`] if there is no such row.
    fn update_record<R: Record + 'static>(&self, record: &R) -> Result<R> {
        Upserter::default().update(self, record)
    }

    /// Reads the row under the key of `record`, if any.
    fn fetch_record<R: Record + 'static>(&self, record: &R) -> Result<Option<R>> {
        Upserter::default().fetch(self, record)
    }

    /// Compares `record` with the row stored under its key.
    fn detect_record<R: Record + 'static>(&self, record: &R) -> Result<Detection<R>> {
        Upserter::default().detect(self, record)
    }

    /// Deletes the row under the key of `record`, returning the number of
    /// deleted rows.
    fn delete_record<R: Record + 'static>(&self, record: &R) -> Result<usize> {
        Upserter::default().delete(self, record)
    }
}

impl ConnectionExt for Connection {}
impl ConnectionExt for Transaction<'_> {}
impl ConnectionExt for Savepoint<'_> {}

impl Sealed for Connection {}
impl Sealed for Transaction<'_> {}
impl Sealed for Savepoint<'_> {}
