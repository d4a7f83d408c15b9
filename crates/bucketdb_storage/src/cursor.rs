//! Forward cursors over one bucket.

use crate::bucket::{BucketNode, Entry};
use bytes::Bytes;
use std::ops::Bound;
use std::sync::Arc;

/// One position of a [`Cursor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorEntry {
    /// The key at this position.
    pub key: Bytes,
    /// The stored value, or `None` when the key names a nested bucket.
    pub value: Option<Bytes>,
}

impl CursorEntry {
    /// Returns true when this entry is a nested bucket.
    #[must_use]
    pub fn is_bucket(&self) -> bool {
        self.value.is_none()
    }
}

/// A forward iterator over the keys of one bucket in byte order.
///
/// The cursor owns a snapshot of the bucket taken when it was created, so
/// it stays valid (and unchanged) however long it is held. It is `Send` and
/// can be moved to another thread.
///
/// Iterating a fresh cursor starts at the first key; [`seek`](Self::seek)
/// repositions it and iteration continues after the sought entry.
#[derive(Debug, Clone)]
pub struct Cursor {
    node: Arc<BucketNode>,
    last: Option<Bytes>,
    exhausted: bool,
}

impl Cursor {
    pub(crate) fn new(node: Arc<BucketNode>) -> Self {
        Self {
            node,
            last: None,
            exhausted: false,
        }
    }

    /// Moves to the first key of the bucket.
    pub fn first(&mut self) -> Option<CursorEntry> {
        let found = self
            .node
            .entries
            .iter()
            .next()
            .map(|(key, entry)| to_entry(key, entry));
        self.settle(found)
    }

    /// Moves to the first key greater than or equal to `key`.
    pub fn seek(&mut self, key: &[u8]) -> Option<CursorEntry> {
        let found = self
            .node
            .entries
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(|(key, entry)| to_entry(key, entry));
        self.settle(found)
    }

    fn settle(&mut self, found: Option<CursorEntry>) -> Option<CursorEntry> {
        match &found {
            Some(entry) => {
                self.last = Some(entry.key.clone());
                self.exhausted = false;
            }
            None => self.exhausted = true,
        }
        found
    }
}

impl Iterator for Cursor {
    type Item = CursorEntry;

    fn next(&mut self) -> Option<CursorEntry> {
        if self.exhausted {
            return None;
        }
        let Some(last) = self.last.clone() else {
            return self.first();
        };
        let found = self
            .node
            .entries
            .range::<[u8], _>((Bound::Excluded(last.as_ref()), Bound::Unbounded))
            .next()
            .map(|(key, entry)| to_entry(key, entry));
        self.settle(found)
    }
}

fn to_entry(key: &Bytes, entry: &Entry) -> CursorEntry {
    CursorEntry {
        key: key.clone(),
        value: match entry {
            Entry::Value(value) => Some(value.clone()),
            Entry::Bucket(_) => None,
        },
    }
}
