//! Upsert errors and results

use core::fmt::{self, Display};
use std::error::Error as StdError;
use std::borrow::Cow;
use rusqlite::Error as SqlError;
use thiserror::Error;
use crate::sql::StatementKind;


/// Errors arising while describing, rendering, or writing a record.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    /// An `INSERT` (or a standalone `UPDATE`) with `RETURNING *`
    /// completed without error but returned no row.
    #[error("no row returned from write to table `{table}`")]
    NoIdReturned {
        table: String,
    },

    /// The database failed to prepare or run one of the generated statements.
    #[error("{statement} statement failed: {source}")]
    Execution {
        statement: StatementKind,
        #[source]
        source: SqlError,
    },

    /// The record type can't be mapped to a flat row of columns.
    #[error("type `{type_name}` can't be used as a record: {reason}")]
    UnsupportedType {
        type_name: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    /// The record declares no key column, so it can't locate its own row.
    #[error("record for table `{table}` has no key columns")]
    NoKeyColumns {
        table: String,
    },

    /// A returned row could not be scanned back into the record.
    #[error("can't decode returned row: {0}")]
    Decode(#[source] SqlError),

    #[error("unknown parameter name `{0}`")]
    UnknownParam(Cow<'static, str>),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] SqlError),

    #[error("formatting error")]
    Fmt(#[from] fmt::Error),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync + 'static>),
}

impl Error {
    /// Creates an `Error` from any other underlying reason.
    pub fn other<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static
    {
        Error::Other(Box::new(error))
    }

    /// Creates an `Error` from a message.
    pub fn message<T: Display>(message: T) -> Self {
        Error::Other(message.to_string().into())
    }

    /// Creates an `UnknownParam` error from a dynamic parameter name.
    pub fn unknown_param_dyn<T: Display>(name: T) -> Self {
        Error::UnknownParam(Cow::Owned(name.to_string()))
    }

    /// Creates an `UnsupportedType` error.
    pub fn unsupported_type(
        type_name: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Error::UnsupportedType {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Wraps a bare `Decode` error. This is what derived `Record::scan_row()`
    /// implementations call on a failed column conversion.
    pub fn decode(error: SqlError) -> Self {
        Error::Decode(error)
    }

    /// Attributes a raw SQLite failure to the statement that was running.
    /// Decoding and parameter errors are returned unchanged, since they are
    /// not execution failures.
    pub fn during(self, statement: StatementKind) -> Self {
        match self {
            Error::Sqlite(source) => Error::Execution { statement, source },
            other => other,
        }
    }

    /// Returns the kind of statement during which the database failed, if
    /// this is an execution error.
    pub fn statement_kind(&self) -> Option<StatementKind> {
        match *self {
            Error::Execution { statement, .. } => Some(statement),
            _ => None,
        }
    }
}

/// Convenience type alias for upsert-related results.
pub type Result<T, E = Error> = core::result::Result<T, E>;
