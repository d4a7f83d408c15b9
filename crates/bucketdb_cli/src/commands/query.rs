//! Streaming commands: all, prefix, range.

use crate::output::Format;
use bucketdb_core::{Db, Query};
use std::io::Write;

/// Runs `query` with an optional filter and prints every pair.
///
/// Returns the number of pairs printed. A scan cut short because output
/// stalled past the idle timeout is an error, after whatever was printed.
pub fn run<W: Write>(
    db: &Db,
    query: Query,
    filter: Option<&str>,
    format: Format,
    out: &mut W,
) -> Result<usize, Box<dyn std::error::Error>> {
    let query = match filter {
        Some(expression) => query.filter_expr(expression)?,
        None => query,
    };
    let mut stream = db.begin_read()?.query(query)?;
    let mut printed = 0;
    for pair in stream.by_ref() {
        format.write(out, &pair)?;
        printed += 1;
    }
    stream.finish()?;
    tracing::debug!(printed, "query finished");
    Ok(printed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketdb_core::Config;
    use serde_json::json;
    use std::io;
    use std::thread;
    use std::time::Duration;

    /// A sink that stalls on its first write.
    struct StallingWriter {
        stall: Option<Duration>,
        buf: Vec<u8>,
    }

    impl Write for StallingWriter {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            if let Some(pause) = self.stall.take() {
                thread::sleep(pause);
            }
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn seeded() -> Db {
        let db = Db::open_in_memory();
        db.update(|tx| {
            for i in 0..12 {
                let doc = json!({"key": i}).as_object().cloned().unwrap();
                tx.put("test.bucket", &i.to_string(), &doc)?;
            }
            Ok(())
        })
        .unwrap();
        db
    }

    fn lines(out: Vec<u8>) -> Vec<String> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn prefix_prints_one_pair_per_line() {
        let db = seeded();
        let mut out = Vec::new();
        let printed = run(&db, Query::prefix("test.bucket", "1"), None, Format::Json, &mut out).unwrap();
        assert_eq!(printed, 3);
        assert_eq!(
            lines(out),
            [
                r#"{"key":"1","value":{"key":1}}"#,
                r#"{"key":"10","value":{"key":10}}"#,
                r#"{"key":"11","value":{"key":11}}"#,
            ]
        );
    }

    #[test]
    fn filter_applies_to_range() {
        let db = seeded();
        let mut out = Vec::new();
        let query = Query::range("test.bucket", "1", "3");
        run(&db, query, Some(".key > 5"), Format::Json, &mut out).unwrap();
        assert_eq!(
            lines(out),
            [
                r#"{"key":"10","value":{"key":10}}"#,
                r#"{"key":"11","value":{"key":11}}"#,
            ]
        );
    }

    #[test]
    fn bad_filter_prints_nothing() {
        let db = seeded();
        let mut out = Vec::new();
        assert!(run(&db, Query::all("test.bucket"), Some(".key >"), Format::Json, &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn stalled_output_fails_instead_of_truncating_silently() {
        let config = Config::new()
            .stream_buffer(2)
            .stream_idle_timeout(Duration::from_millis(50));
        let db = Db::open_in_memory_with_config(config);
        db.update(|tx| {
            for i in 0..100 {
                let doc = json!({"key": i}).as_object().cloned().unwrap();
                tx.put("b", &format!("{i:03}"), &doc)?;
            }
            Ok(())
        })
        .unwrap();

        let mut out = StallingWriter {
            stall: Some(Duration::from_millis(300)),
            buf: Vec::new(),
        };
        let err = run(&db, Query::all("b"), None, Format::Json, &mut out).unwrap_err();
        assert!(err.to_string().contains("abandoned"));
        assert!(!out.buf.is_empty());
    }
}
