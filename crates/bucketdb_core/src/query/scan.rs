//! Cursor walks for the three scan modes.

use bucketdb_storage::{Cursor, CursorEntry};
use bytes::Bytes;

/// Which keys of a bucket a query visits. Keys compare byte by byte, so
/// `"10"` sorts before `"2"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    /// Every key, ascending.
    All,
    /// Keys that start with the given prefix.
    Prefix(String),
    /// Keys `k` with `start <= k <= end`. Empty when `end < start`.
    Range {
        /// First key to include.
        start: String,
        /// Last key to include.
        end: String,
    },
}

impl ScanMode {
    fn seek(&self, cursor: &mut Cursor) -> Option<CursorEntry> {
        match self {
            Self::All => cursor.first(),
            Self::Prefix(prefix) => cursor.seek(prefix.as_bytes()),
            Self::Range { start, end } if end.as_bytes() < start.as_bytes() => None,
            Self::Range { start, .. } => cursor.seek(start.as_bytes()),
        }
    }

    fn admits(&self, key: &[u8]) -> bool {
        match self {
            Self::All => true,
            Self::Prefix(prefix) => key.starts_with(prefix.as_bytes()),
            Self::Range { end, .. } => key <= end.as_bytes(),
        }
    }
}

/// The raw key/value entries a scan visits, in key order. Nested buckets
/// are stepped over.
pub(crate) struct Scan {
    cursor: Cursor,
    mode: ScanMode,
    started: bool,
    done: bool,
}

impl Scan {
    pub(crate) fn new(cursor: Cursor, mode: ScanMode) -> Self {
        Self {
            cursor,
            mode,
            started: false,
            done: false,
        }
    }
}

impl Iterator for Scan {
    type Item = (Bytes, Bytes);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let entry = if self.started {
                self.cursor.next()
            } else {
                self.started = true;
                self.mode.seek(&mut self.cursor)
            };
            match entry {
                Some(entry) if self.mode.admits(&entry.key) => {
                    if let Some(value) = entry.value {
                        return Some((entry.key, value));
                    }
                }
                _ => self.done = true,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketdb_storage::{Engine, EngineOptions};

    fn keys(mode: ScanMode) -> Vec<String> {
        let engine = Engine::in_memory(EngineOptions::default());
        let mut tx = engine.begin(true).unwrap();
        let bucket = tx.create_bucket_if_absent(None, b"b").unwrap();
        for i in 0..=11 {
            tx.put(&bucket, i.to_string().as_bytes(), b"v").unwrap();
        }
        tx.create_bucket_if_absent(Some(&bucket), b"15").unwrap();
        let cursor = tx.cursor(Some(&bucket)).unwrap();
        Scan::new(cursor, mode)
            .map(|(k, _)| String::from_utf8(k.to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn all_skips_nested_buckets() {
        let all = keys(ScanMode::All);
        assert_eq!(all.len(), 12);
        assert!(!all.contains(&"15".to_string()));
        assert_eq!(&all[..4], ["0", "1", "10", "11"]);
    }

    #[test]
    fn prefix_stops_at_first_non_match() {
        assert_eq!(keys(ScanMode::Prefix("1".into())), ["1", "10", "11"]);
        assert!(keys(ScanMode::Prefix("x".into())).is_empty());
    }

    #[test]
    fn range_is_inclusive_and_lexicographic() {
        let range = ScanMode::Range {
            start: "1".into(),
            end: "3".into(),
        };
        assert_eq!(keys(range), ["1", "10", "11", "2", "3"]);
    }

    #[test]
    fn inverted_or_out_of_bounds_range_is_empty() {
        assert!(keys(ScanMode::Range {
            start: "3".into(),
            end: "1".into()
        })
        .is_empty());
        assert!(keys(ScanMode::Range {
            start: "99".into(),
            end: "999".into()
        })
        .is_empty());
    }
}
