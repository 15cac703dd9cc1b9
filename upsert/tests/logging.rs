use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use upsert::{Record, Connection, ConnectionExt, Result};


#[derive(Clone, PartialEq, Eq, Debug, Record)]
#[upsert(table = "celebrity")]
struct Celebrity {
    #[upsert(key, natural)]
    name: String,
    age: i64,
}

/// Collects formatted log lines in memory.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn lines_containing(&self, needle: &str) -> Vec<String> {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);

        String::from_utf8_lossy(&buf)
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_owned)
            .collect()
    }
}

impl io::Write for Captured {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn every_outcome_is_logged_once() -> Result<()> {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(captured.clone())
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || -> Result<()> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("CREATE TABLE celebrity(name TEXT PRIMARY KEY, age INTEGER NOT NULL)")?;

        let steven = Celebrity { name: "Steven Seagal".into(), age: 64 };

        conn.upsert(&steven)?;
        conn.upsert(&steven)?;
        conn.upsert(&Celebrity { age: 65, ..steven })?;

        Ok(())
    })?;

    let outcomes = captured.lines_containing("upserted record");

    assert_eq!(outcomes.len(), 3, "{outcomes:#?}");
    assert!(outcomes[0].contains("outcome=inserted"));
    assert!(outcomes[1].contains("outcome=no change"));
    assert!(outcomes[2].contains("outcome=updated"));
    assert!(outcomes.iter().all(|line| line.contains("celebrity")));

    Ok(())
}
