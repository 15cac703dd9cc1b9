//! Deciding whether a write is needed at all.

use crate::schema::Record;


/// The state of the row a record would be written to.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Detection<R> {
    /// No row matches the key of the record.
    Absent,
    /// A row matches and its writable columns equal the record's.
    Unchanged(R),
    /// A row matches but at least one writable column differs.
    Changed(R),
}

impl<R: Record> Detection<R> {
    /// Compares `record` against the `current` row stored under its key.
    ///
    /// Only [`Record::writable_eq()`] is consulted here; columns computed from
    /// value expressions are compared separately, see [`Schema::compare_sql()`].
    ///
    /// [`Schema::compare_sql()`]: crate::schema::Schema::compare_sql
    pub fn classify(record: &R, current: Option<R>) -> Self {
        match current {
            None => Detection::Absent,
            Some(current) if record.writable_eq(&current) => Detection::Unchanged(current),
            Some(current) => Detection::Changed(current),
        }
    }
}

impl<R> Detection<R> {
    /// Whether a row exists under the key.
    pub fn is_present(&self) -> bool {
        !matches!(self, Detection::Absent)
    }

    /// Whether writing the record would change the stored row.
    pub fn needs_write(&self) -> bool {
        !matches!(self, Detection::Unchanged(_))
    }

    /// The stored row, if there is one.
    pub fn into_current(self) -> Option<R> {
        match self {
            Detection::Absent => None,
            Detection::Unchanged(current) | Detection::Changed(current) => Some(current),
        }
    }

    /// A short name of the state, for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Detection::Absent       => "absent",
            Detection::Unchanged(_) => "unchanged",
            Detection::Changed(_)   => "changed",
        }
    }
}
