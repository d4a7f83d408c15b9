//! Benchmark utilities.

use bucketdb_codec::Document;
use bucketdb_core::Db;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;

/// Generate a random alphanumeric string of the specified length.
pub fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a document whose `body` field holds roughly `payload` bytes.
pub fn random_document(id: usize, payload: usize) -> Document {
    let mut rng = rand::thread_rng();
    let mut doc = Document::new();
    doc.insert("id".into(), json!(id));
    doc.insert("score".into(), json!(rng.gen_range(0..1000)));
    doc.insert("ratio".into(), json!(rng.gen::<f64>()));
    doc.insert("tags".into(), json!(["alpha", "beta"]));
    doc.insert("body".into(), json!(random_text(payload)));
    doc
}

/// Zero-padded key so lexicographic order matches numeric order.
pub fn key(i: usize) -> String {
    format!("{i:08}")
}

/// Load `count` documents into `bucket` in one transaction.
pub fn populate(db: &Db, bucket: &str, count: usize, payload: usize) {
    let docs: Vec<_> = (0..count).map(|i| random_document(i, payload)).collect();
    db.update(|tx| {
        for (i, doc) in docs.iter().enumerate() {
            tx.put(bucket, &key(i), doc)?;
        }
        Ok(())
    })
    .expect("populate failed");
}
