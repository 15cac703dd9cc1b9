#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]
#![forbid(unsafe_code)]
#![deny(missing_docs, missing_debug_implementations, missing_copy_implementations)]

mod param;
mod util;

pub mod field;
pub mod schema;
pub mod sql;
pub mod exec;
pub mod detect;
pub mod upsert;
pub mod conn;
pub mod error;

pub extern crate rusqlite;

pub use rusqlite::{
    Connection, Transaction, TransactionBehavior, Savepoint, Row,
    types::{self, ToSql, FromSql, Value, ValueRef, ToSqlOutput, Null},
};
pub use field::{Field, Role, ColumnSpec, ResolvedField};
pub use schema::{Record, RecordDesc, Schema};
pub use sql::StatementKind;
pub use exec::Executor;
pub use detect::Detection;
pub use upsert::{Outcome, Upserted, Upserter};
pub use upsert::{upsert, upsert_tx, update, insert, fetch, delete};
pub use conn::ConnectionExt;
pub use param::ParamPrefix;
pub use error::{Error, Result};

#[cfg(feature = "chrono")]
pub use chrono::{DateTime, FixedOffset, Utc};

#[cfg(feature = "uuid")]
pub use uuid::Uuid;

#[cfg(feature = "json")]
pub use serde_json::Value as JsonValue;

#[cfg(feature = "derive")]
pub use upsert_macros::Record;

#[cfg(test)]
mod testing;
