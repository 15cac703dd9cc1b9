//! Rendering the text of the generated statements.
//!
//! Every function here is pure and total: the same columns always render
//! to the same bytes. Table and column names are wrapped in double quotes
//! but not escaped, so they must already be plain identifiers.

use core::fmt::{self, Display, Formatter};
use crate::field::ColumnSpec;


/// The four statements generated for every record type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum StatementKind {
    /// `SELECT * FROM ... WHERE ...`
    Select,
    /// `UPDATE ... SET ... WHERE ... RETURNING *`
    Update,
    /// `INSERT INTO ... VALUES ... RETURNING *`
    Insert,
    /// `DELETE FROM ... WHERE ...`
    Delete,
}

impl Display for StatementKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match *self {
            StatementKind::Select => "SELECT",
            StatementKind::Update => "UPDATE",
            StatementKind::Insert => "INSERT",
            StatementKind::Delete => "DELETE",
        })
    }
}

/// Renders `SET "c1" = e1, "c2" = e2`.
#[derive(Clone, Copy, Debug)]
pub struct SetClause<'a>(pub &'a [ColumnSpec]);

impl Display for SetClause<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("SET ")?;

        let mut sep = "";
        for col in self.0 {
            write!(formatter, r#"{sep}"{}" = {}"#, col.name, col.value)?;
            sep = ", ";
        }

        Ok(())
    }
}

/// Renders `("c1","c2") VALUES (e1, e2)`.
#[derive(Clone, Copy, Debug)]
pub struct ValuesClause<'a>(pub &'a [ColumnSpec]);

impl Display for ValuesClause<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("(")?;

        let mut sep = "";
        for col in self.0 {
            write!(formatter, r#"{sep}"{}""#, col.name)?;
            sep = ",";
        }

        formatter.write_str(") VALUES (")?;

        sep = "";
        for col in self.0 {
            write!(formatter, "{sep}{}", col.value)?;
            sep = ", ";
        }

        formatter.write_str(")")
    }
}

/// Renders `WHERE c1 = e1 AND c2 = e2`.
///
/// Only plain equality is generated, so a key column holding `NULL`
/// never matches anything.
#[derive(Clone, Copy, Debug)]
pub struct WhereClause<'a>(pub &'a [ColumnSpec]);

impl Display for WhereClause<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("WHERE ")?;

        let mut sep = "";
        for col in self.0 {
            write!(formatter, "{sep}{} = {}", col.name, col.value)?;
            sep = " AND ";
        }

        Ok(())
    }
}

/// Renders `(e1) IS "c1" AND (e2) IS "c2"`, which is true when every
/// column already holds what its expression would write. `IS` treats two
/// `NULL`s as equal.
#[derive(Clone, Copy, Debug)]
pub struct SameClause<'a>(pub &'a [ColumnSpec]);

impl Display for SameClause<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for col in self.0 {
            write!(formatter, r#"{sep}({}) IS "{}""#, col.value, col.name)?;
            sep = " AND ";
        }

        Ok(())
    }
}

/// `UPDATE "<table>" SET ... WHERE ... RETURNING *`
pub fn update_sql(table: &str, writable: &[ColumnSpec], keys: &[ColumnSpec]) -> String {
    format!(
        r#"UPDATE "{table}" {} {} RETURNING *"#,
        SetClause(writable),
        WhereClause(keys),
    )
}

/// `INSERT INTO "<table>" (...) VALUES (...) RETURNING *`
///
/// `columns` are the writable columns, interleaved with any natural keys.
pub fn insert_sql(table: &str, columns: &[ColumnSpec]) -> String {
    format!(r#"INSERT INTO "{table}" {} RETURNING *"#, ValuesClause(columns))
}

/// `SELECT * FROM "<table>" WHERE ...`
pub fn select_sql(table: &str, keys: &[ColumnSpec]) -> String {
    format!(r#"SELECT * FROM "{table}" {}"#, WhereClause(keys))
}

/// `SELECT (e1) IS "c1" AND ... FROM "<table>" WHERE ...`
///
/// Compares the stored row against columns whose value is computed by an
/// SQL expression, which can't be compared on the Rust side.
pub fn compare_sql(table: &str, computed: &[ColumnSpec], keys: &[ColumnSpec]) -> String {
    format!(r#"SELECT {} FROM "{table}" {}"#, SameClause(computed), WhereClause(keys))
}

/// `DELETE FROM "<table>" WHERE ...`
pub fn delete_sql(table: &str, keys: &[ColumnSpec]) -> String {
    format!(r#"DELETE FROM "{table}" {}"#, WhereClause(keys))
}
