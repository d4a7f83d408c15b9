//! Query stream lifecycle and transaction isolation.

use bucketdb_core::{
    Config, CoreError, Db, Document, Query, ScanDiagnostic, SkipReason, StreamEnd, TransactionState,
};
use serde_json::json;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

fn put_n(db: &Db, bucket: &str, n: usize) {
    db.update(|tx| {
        for i in 0..n {
            let doc = json!({"key": i}).as_object().cloned().unwrap();
            tx.put(bucket, &format!("{i:04}"), &doc)?;
        }
        Ok(())
    })
    .unwrap();
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn exhausted_stream_releases_its_transaction() {
    let db = Db::open_in_memory();
    put_n(&db, "b", 200);
    let mut stream = db.all("b").unwrap();
    assert_eq!(db.engine().active_readers(), 1);
    assert_eq!(stream.by_ref().count(), 200);
    assert_eq!(db.engine().active_readers(), 0);
    assert!(stream.next().is_none());
}

#[test]
fn cancel_releases_a_partially_read_stream() {
    let db = Db::open_in_memory_with_config(Config::new().stream_buffer(4));
    put_n(&db, "b", 500);
    let mut stream = db.all("b").unwrap();
    assert_eq!(stream.next().unwrap().key, "0000");
    assert_eq!(stream.next().unwrap().key, "0001");

    stream.cancel();
    assert_eq!(db.engine().active_readers(), 0);
    assert!(stream.next().is_none());
    stream.cancel();
}

#[test]
fn dropping_a_stream_cancels_it() {
    let db = Db::open_in_memory_with_config(Config::new().stream_buffer(1));
    put_n(&db, "b", 100);
    {
        let mut stream = db.all("b").unwrap();
        stream.next().unwrap();
    }
    assert_eq!(db.engine().active_readers(), 0);
}

#[test]
fn abandoned_stream_times_out_and_reports_truncation() {
    let config = Config::new()
        .stream_buffer(2)
        .stream_idle_timeout(Duration::from_millis(50));
    let db = Db::open_in_memory_with_config(config);
    put_n(&db, "b", 100);

    let mut stream = db.all("b").unwrap();
    assert!(wait_until(|| db.engine().active_readers() == 0));
    assert_eq!(stream.end_reason(), Some(StreamEnd::Abandoned));

    // What was buffered before the producer gave up is still readable.
    let delivered: Vec<String> = stream.by_ref().map(|pair| pair.key).collect();
    assert_eq!(delivered, ["0000", "0001"]);
    assert!(stream.is_truncated());
    assert!(matches!(
        stream.finish(),
        Err(CoreError::StreamAbandoned { ref bucket, idle_ms: 50 }) if bucket == "b"
    ));
}

#[test]
fn paused_consumer_learns_the_scan_was_cut_short() {
    let config = Config::new()
        .stream_buffer(4)
        .stream_idle_timeout(Duration::from_millis(100));
    let db = Db::open_in_memory_with_config(config);
    put_n(&db, "b", 50);

    let mut stream = db.all("b").unwrap();
    let mut seen = vec![stream.next().unwrap().key];
    thread::sleep(Duration::from_millis(400));
    seen.extend(stream.by_ref().map(|pair| pair.key));

    assert!(seen.len() < 50);
    assert!(stream.is_truncated());
    assert!(stream.finish().is_err());
}

#[test]
fn complete_and_cancelled_streams_are_not_truncated() {
    let db = Db::open_in_memory();
    put_n(&db, "b", 500);

    let mut stream = db.all("b").unwrap();
    assert_eq!(stream.by_ref().count(), 500);
    assert_eq!(stream.end_reason(), Some(StreamEnd::Exhausted));
    stream.finish().unwrap();

    // The default buffer is far smaller than the bucket, so the producer
    // is still waiting when the cancel arrives.
    let mut stream = db.all("b").unwrap();
    stream.cancel();
    assert_eq!(stream.end_reason(), Some(StreamEnd::Cancelled));
    assert!(!stream.is_truncated());
}

#[test]
fn slow_consumer_within_timeout_gets_everything() {
    let config = Config::new()
        .stream_buffer(1)
        .stream_idle_timeout(Duration::from_secs(5));
    let db = Db::open_in_memory_with_config(config);
    put_n(&db, "b", 20);

    let mut seen = Vec::new();
    for pair in db.all("b").unwrap() {
        thread::sleep(Duration::from_millis(2));
        seen.push(pair.key);
    }
    assert_eq!(seen.len(), 20);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn streams_do_not_block_writers() {
    let db = Db::open_in_memory_with_config(Config::new().stream_buffer(1));
    put_n(&db, "b", 10);
    let mut stream = db.all("b").unwrap();
    stream.next().unwrap();

    db.put("b", "9999", &Document::new()).unwrap();
    let rest: Vec<String> = stream.map(|pair| pair.key).collect();
    assert_eq!(rest.len(), 9);
    assert!(!rest.contains(&"9999".to_string()));
}

#[test]
fn read_transaction_does_not_see_later_commits() {
    let db = Db::open_in_memory();
    db.put("b", "k", &json!({"v": 1}).as_object().cloned().unwrap())
        .unwrap();

    let reader = db.begin_read().unwrap();
    let writer_db = db.clone();
    thread::spawn(move || {
        writer_db
            .update(|tx| {
                tx.put("b", "k", &json!({"v": 2}).as_object().cloned().unwrap())?;
                tx.put("b", "new", &Document::new())
            })
            .unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(reader.get("b", "k").unwrap()["v"], json!(1));
    assert!(reader.get("b", "new").unwrap_err().is_no_such_key());
    assert_eq!(db.get("b", "k").unwrap()["v"], json!(2));
}

#[test]
fn second_writer_waits_for_the_first() {
    let db = Db::open_in_memory();
    let mut first = db.begin_write().unwrap();
    first.put("b", "k", &Document::new()).unwrap();

    let other = db.clone();
    let (started, waiting) = mpsc::channel();
    let second = thread::spawn(move || {
        started.send(()).unwrap();
        let tx = other.begin_write().unwrap();
        tx.get("b", "k").is_ok()
    });
    waiting.recv().unwrap();
    thread::sleep(Duration::from_millis(20));
    assert!(!second.is_finished());

    first.commit().unwrap();
    assert_eq!(first.state(), TransactionState::Committed);
    assert!(second.join().unwrap());
}

#[test]
fn diagnostics_report_skipped_pairs() {
    let db = Db::open_in_memory();
    db.update(|tx| {
        tx.put("b", "1", &json!({"v": 1}).as_object().cloned().unwrap())?;
        tx.put("b", "2", &json!({"v": "x"}).as_object().cloned().unwrap())
    })
    .unwrap();

    let (sender, receiver) = mpsc::channel::<ScanDiagnostic>();
    let query = Query::all("b")
        .filter_expr(".v < 5")
        .unwrap()
        .diagnostics(sender);
    let keys: Vec<String> = db
        .begin_read()
        .unwrap()
        .query(query)
        .unwrap()
        .map(|pair| pair.key)
        .collect();
    assert_eq!(keys, ["1"]);

    let reports: Vec<ScanDiagnostic> = receiver.try_iter().collect();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].bucket, "b");
    assert_eq!(reports[0].key, "2");
    assert!(matches!(reports[0].reason, SkipReason::Eval(_)));
    assert_eq!(db.stats().pairs_skipped, 1);
}

#[test]
fn query_on_finished_transaction_is_rejected() {
    let db = Db::open_in_memory();
    put_n(&db, "b", 1);
    let mut tx = db.begin_read().unwrap();
    tx.rollback().unwrap();
    assert!(tx.all("b").is_err());
}

#[test]
fn streams_from_many_threads() {
    let db = Db::open_in_memory_with_config(Config::new().stream_buffer(3));
    put_n(&db, "b", 300);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = db.clone();
            thread::spawn(move || db.all("b").unwrap().count())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 300);
    }
    assert_eq!(db.engine().active_readers(), 0);
}
