//! Hand-written records and a fault-injecting executor for unit tests.

use std::cell::RefCell;
use rusqlite::{ffi, Connection, Row, ToSql};
use rusqlite::types::FromSql;
use crate::field::Field;
use crate::schema::{Record, RecordDesc};
use crate::exec::Executor;
use crate::detect::Detection;
use crate::upsert::{Upserter, Outcome};
use crate::sql::StatementKind;
use crate::error::{Error, Result};


#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct Person {
    pub name: String,
    pub age: i64,
    pub id: i64,
}

impl Person {
    pub fn new(name: &str, age: i64) -> Self {
        Person { name: name.into(), age, id: 0 }
    }
}

impl Record for Person {
    fn description() -> RecordDesc {
        RecordDesc::new("person")
            .field(Field::new("Name"))
            .field(Field::new("Age"))
            .field(Field::new("Id").tag("key"))
    }

    fn param(&self, name: &str) -> Option<&dyn ToSql> {
        match name {
            "name" => Some(&self.name),
            "age" => Some(&self.age),
            "id" => Some(&self.id),
            _ => None,
        }
    }

    fn scan_row(&self, row: &Row<'_>) -> Result<Self> {
        Ok(Person {
            name: row.get("name").map_err(Error::decode)?,
            age: row.get("age").map_err(Error::decode)?,
            id: row.get("id").map_err(Error::decode)?,
        })
    }

    fn writable_eq(&self, other: &Self) -> bool {
        self.name == other.name && self.age == other.age
    }
}

/// A record whose `label` column is computed from the omitted `raw` field.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct Badge {
    pub id: i64,
    pub raw: String,
    pub label: String,
}

impl Record for Badge {
    fn description() -> RecordDesc {
        RecordDesc::new("badge")
            .field(Field::new("Id").key())
            .field(Field::new("Raw").omit().bind(true))
            .field(Field::new("Label").value_expr("upper(:raw)"))
    }

    fn param(&self, name: &str) -> Option<&dyn ToSql> {
        match name {
            "id" => Some(&self.id),
            "raw" => Some(&self.raw),
            "label" => Some(&self.label),
            _ => None,
        }
    }

    fn scan_row(&self, row: &Row<'_>) -> Result<Self> {
        Ok(Badge {
            id: row.get("id").map_err(Error::decode)?,
            raw: self.raw.clone(),
            label: row.get("label").map_err(Error::decode)?,
        })
    }

    fn writable_eq(&self, _other: &Self) -> bool {
        true
    }
}

pub(crate) fn person_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;

    conn.execute_batch(
        "CREATE TABLE person(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            age INTEGER NOT NULL
        );
        CREATE TABLE badge(
            id INTEGER PRIMARY KEY,
            label TEXT NOT NULL
        );"
    )?;

    Ok(conn)
}

/// What the scripted executor does when it sees a given statement.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Fault {
    /// Fail with `SQLITE_BUSY` without running the statement.
    Busy,
    /// Pretend that the statement returned no rows.
    NoRows,
}

/// Runs statements on a real connection, but records them, and can be told
/// to fail or return nothing for a particular kind of statement.
pub(crate) struct Scripted {
    conn: Connection,
    faults: Vec<(StatementKind, Fault)>,
    log: RefCell<Vec<StatementKind>>,
}

impl Scripted {
    pub fn new(conn: Connection) -> Self {
        Scripted {
            conn,
            faults: Vec::new(),
            log: RefCell::new(Vec::new()),
        }
    }

    pub fn fault(mut self, kind: StatementKind, fault: Fault) -> Self {
        self.faults.push((kind, fault));
        self
    }

    pub fn take_log(&self) -> Vec<StatementKind> {
        self.log.take()
    }

    fn intercept(&self, sql: &str) -> Option<Fault> {
        let kind = match sql.split_whitespace().next() {
            Some("SELECT") => StatementKind::Select,
            Some("UPDATE") => StatementKind::Update,
            Some("INSERT") => StatementKind::Insert,
            _ => StatementKind::Delete,
        };

        self.log.borrow_mut().push(kind);

        self.faults
            .iter()
            .find(|&&(k, _)| k == kind)
            .map(|&(_, fault)| fault)
    }
}

fn busy() -> Error {
    Error::Sqlite(rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_BUSY), None))
}

impl Executor for Scripted {
    fn fetch_first<R: Record>(&self, sql: &str, record: &R) -> Result<Option<R>> {
        match self.intercept(sql) {
            Some(Fault::Busy) => Err(busy()),
            Some(Fault::NoRows) => Ok(None),
            None => self.conn.fetch_first(sql, record),
        }
    }

    fn fetch_value<R: Record, T: FromSql>(&self, sql: &str, record: &R) -> Result<Option<T>> {
        match self.intercept(sql) {
            Some(Fault::Busy) => Err(busy()),
            Some(Fault::NoRows) => Ok(None),
            None => self.conn.fetch_value(sql, record),
        }
    }

    fn execute<R: Record>(&self, sql: &str, record: &R) -> Result<usize> {
        match self.intercept(sql) {
            Some(Fault::Busy) => Err(busy()),
            Some(Fault::NoRows) => Ok(0),
            None => <Connection as Executor>::execute(&self.conn, sql, record),
        }
    }
}

mod tests {
    use StatementKind::{Select, Update, Insert, Delete};
    use super::*;

    fn seeded() -> Result<(Scripted, Person)> {
        let exec = Scripted::new(person_db()?);
        let stored = Upserter::new().insert(&exec, &Person::new("Steven Seagal", 64))?;
        exec.take_log();

        Ok((exec, stored))
    }

    #[test]
    fn absent_row_is_inserted_without_update() -> Result<()> {
        let exec = Scripted::new(person_db()?);
        let upserted = Upserter::new().upsert(&exec, &Person::new("Brian Seitz", 36))?;

        assert_eq!(upserted.outcome, Outcome::Inserted);
        assert!(upserted.record.id > 0);
        assert_eq!(exec.take_log(), [Select, Insert]);

        Ok(())
    }

    #[test]
    fn unchanged_row_sends_no_writes() -> Result<()> {
        let (exec, stored) = seeded()?;
        let upserted = Upserter::new().upsert(&exec, &stored)?;

        assert_eq!(upserted.outcome, Outcome::NoChange);
        assert_eq!(upserted.record, stored);
        assert_eq!(exec.take_log(), [Select]);

        Ok(())
    }

    #[test]
    fn changed_row_is_updated() -> Result<()> {
        let (exec, stored) = seeded()?;
        let changed = Person { age: 65, ..stored.clone() };
        let upserted = Upserter::new().upsert(&exec, &changed)?;

        assert_eq!(upserted.outcome, Outcome::Updated);
        assert_eq!(upserted.record, changed);
        assert_eq!(exec.take_log(), [Select, Update]);

        Ok(())
    }

    #[test]
    fn without_detection_unchanged_reports_updated() -> Result<()> {
        let (exec, stored) = seeded()?;
        let upserted = Upserter::new().detect_changes(false).upsert(&exec, &stored)?;

        assert_eq!(upserted.outcome, Outcome::Updated);
        assert_eq!(exec.take_log(), [Update]);

        Ok(())
    }

    #[test]
    fn without_detection_missing_row_falls_back_to_insert() -> Result<()> {
        let exec = Scripted::new(person_db()?);
        let upserted = Upserter::new()
            .detect_changes(false)
            .upsert(&exec, &Person::new("Brian Seitz", 36))?;

        assert_eq!(upserted.outcome, Outcome::Inserted);
        assert_eq!(exec.take_log(), [Update, Insert]);

        Ok(())
    }

    #[test]
    fn row_vanishing_before_update_is_inserted() -> Result<()> {
        let (exec, stored) = seeded()?;
        let exec = exec.fault(Update, Fault::NoRows);
        let changed = Person { age: 65, ..stored };
        let upserted = Upserter::new().upsert(&exec, &changed)?;

        assert_eq!(upserted.outcome, Outcome::Inserted);
        assert_eq!(exec.take_log(), [Select, Update, Insert]);

        Ok(())
    }

    #[test]
    fn update_failure_does_not_fall_back() -> Result<()> {
        let (exec, stored) = seeded()?;
        let exec = exec.fault(Update, Fault::Busy);
        let changed = Person { age: 65, ..stored };
        let err = Upserter::new().upsert(&exec, &changed).unwrap_err();

        assert_eq!(err.statement_kind(), Some(Update));
        assert_eq!(exec.take_log(), [Select, Update]);

        Ok(())
    }

    #[test]
    fn select_failure_is_distinct() -> Result<()> {
        let exec = Scripted::new(person_db()?).fault(Select, Fault::Busy);
        let err = Upserter::new().upsert(&exec, &Person::new("Brian Seitz", 36)).unwrap_err();

        assert_eq!(err.statement_kind(), Some(Select));
        assert_eq!(exec.take_log(), [Select]);

        Ok(())
    }

    #[test]
    fn empty_insert_is_no_id_returned() -> Result<()> {
        let exec = Scripted::new(person_db()?).fault(Insert, Fault::NoRows);
        let err = Upserter::new().upsert(&exec, &Person::new("Brian Seitz", 36)).unwrap_err();

        assert!(matches!(err, Error::NoIdReturned { ref table } if table == "person"));

        Ok(())
    }

    #[test]
    fn standalone_update_requires_a_row() -> Result<()> {
        let exec = Scripted::new(person_db()?);
        let err = Upserter::new().update(&exec, &Person::new("Nobody", 1)).unwrap_err();

        assert!(matches!(err, Error::NoIdReturned { .. }));
        assert_eq!(exec.take_log(), [Update]);

        Ok(())
    }

    #[test]
    fn detection_states() -> Result<()> {
        let (exec, stored) = seeded()?;
        let upserter = Upserter::new();

        let detection = upserter.detect(&exec, &stored)?;
        assert_eq!(detection, Detection::Unchanged(stored.clone()));
        assert!(detection.is_present());
        assert!(!detection.needs_write());

        let older = Person { age: 30, ..stored.clone() };
        let detection = upserter.detect(&exec, &older)?;
        assert_eq!(detection, Detection::Changed(stored.clone()));
        assert!(detection.needs_write());
        assert_eq!(detection.into_current(), Some(stored));

        let detection = upserter.detect(&exec, &Person::new("Nobody", 1))?;
        assert_eq!(detection, Detection::Absent);
        assert!(!detection.is_present());

        Ok(())
    }

    #[test]
    fn computed_columns_are_compared_by_the_database() -> Result<()> {
        let exec = Scripted::new(person_db()?);
        let upserter = Upserter::new();
        let badge = Badge { id: 0, raw: "gold".into(), label: String::new() };

        let stored = upserter.upsert(&exec, &badge)?.record;
        assert_eq!(stored.label, "GOLD");
        assert_eq!(exec.take_log(), [Select, Insert]);

        let upserted = upserter.upsert(&exec, &stored)?;
        assert_eq!(upserted.outcome, Outcome::NoChange);
        assert_eq!(exec.take_log(), [Select, Select]);

        // only the bound input differs, the stored label is stale
        let silver = Badge { raw: "silver".into(), ..stored.clone() };
        assert_eq!(upserter.detect(&exec, &silver)?, Detection::Changed(stored));
        exec.take_log();

        let upserted = upserter.upsert(&exec, &silver)?;
        assert_eq!(upserted.outcome, Outcome::Updated);
        assert_eq!(upserted.record.label, "SILVER");
        assert_eq!(exec.take_log(), [Select, Select, Update]);

        Ok(())
    }

    #[test]
    fn delete_runs_only_the_delete() -> Result<()> {
        let (exec, stored) = seeded()?;

        assert_eq!(Upserter::new().delete(&exec, &stored)?, 1);
        assert_eq!(Upserter::new().delete(&exec, &stored)?, 0);
        assert_eq!(exec.take_log(), [Delete, Delete]);

        Ok(())
    }
}
