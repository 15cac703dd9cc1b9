use std::time::Duration;
use tracing_subscriber::EnvFilter;
use upsert::{Record, Connection, ConnectionExt, Upserter, Outcome, Result};

#[derive(Clone, PartialEq, Eq, Debug, Record)]
struct Person {
    name: String,
    age: i64,
    #[upsert(key)]
    id: i64,
}

#[derive(Clone, PartialEq, Eq, Debug, Record)]
#[upsert(table = "celebrity")]
struct Celebrity {
    #[upsert(key, natural)]
    name: String,
    age: i64,
    #[upsert(omit)]
    known_for: Vec<String>,
}

/// This is the bulk of the actual logic.
fn do_it() -> Result<()> {
    let mut conn = Connection::open_in_memory()?;

    conn.execute_batch(r#"
        CREATE TABLE person(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            age INTEGER NOT NULL
        );
        CREATE TABLE celebrity(
            name TEXT PRIMARY KEY,
            age INTEGER NOT NULL
        );
    "#)?;

    // A surrogate key: the database assigns it on insert.
    let brian = conn.upsert(&Person { name: "Brian Seitz".into(), age: 36, id: 0 })?;
    assert_eq!(brian.outcome, Outcome::Inserted);
    println!("{}: {:#?}", brian.outcome, brian.record);

    let birthday = Person { age: 37, ..brian.record };
    let brian = upsert::upsert_tx(&mut conn, &birthday)?;
    assert_eq!(brian.outcome, Outcome::Updated);
    println!("{}: {:#?}", brian.outcome, brian.record);

    // A natural key: the record supplies it, so a fresh record with the
    // same name finds the existing row.
    let upserter = Upserter::new().slow_statement_threshold(Duration::from_millis(50));
    let steven = Celebrity {
        name: "Steven Seagal".into(),
        age: 64,
        known_for: vec!["Under Siege".into()],
    };

    for (age, expected) in [(64, Outcome::Inserted), (64, Outcome::NoChange), (65, Outcome::Updated)] {
        let celebrity = Celebrity { age, ..steven.clone() };
        let upserted = upserter.upsert(&conn, &celebrity)?;

        assert_eq!(upserted.outcome, expected);
        assert_eq!(upserted.record.known_for, steven.known_for);
        println!("{} {} (age {})", upserted.outcome, upserted.record.name, upserted.record.age);
    }

    assert_eq!(conn.delete_record(&steven)?, 1);
    assert_eq!(conn.fetch_record(&steven)?, None);

    Ok(())
}

// Run it both as an example as well as during testing

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("upsert=debug"))
        )
        .init();

    do_it()
}
