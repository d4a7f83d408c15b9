//! Copy-on-write bucket tree.
//!
//! A bucket maps byte keys to either a value or a nested bucket. Nested
//! buckets are held behind `Arc`, so a snapshot of the whole tree is a single
//! `Arc` clone of the root and a writer only copies the buckets on the path it
//! actually touches (`Arc::make_mut`).

use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One slot inside a bucket.
#[derive(Debug, Clone)]
pub(crate) enum Entry {
    /// A stored value.
    Value(Bytes),
    /// A nested bucket.
    Bucket(Arc<BucketNode>),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Entry::Value(_) => "value",
            Entry::Bucket(_) => "bucket",
        }
    }
}

/// A bucket: an ordered map of keys to entries.
#[derive(Debug, Clone, Default)]
pub(crate) struct BucketNode {
    pub(crate) entries: BTreeMap<Bytes, Entry>,
}

impl BucketNode {
    /// Follows `path` from this node, read-only.
    pub(crate) fn descend(self: &Arc<Self>, path: &[Bytes]) -> Option<Arc<BucketNode>> {
        let mut node = Arc::clone(self);
        for segment in path {
            node = match node.entries.get(segment) {
                Some(Entry::Bucket(child)) => Arc::clone(child),
                _ => return None,
            };
        }
        Some(node)
    }

    /// Returns the child bucket called `name`, if there is one.
    pub(crate) fn child(&self, name: &[u8]) -> Option<&Arc<BucketNode>> {
        match self.entries.get(name) {
            Some(Entry::Bucket(child)) => Some(child),
            _ => None,
        }
    }

    /// Returns the value stored under `key`; nested buckets read as absent.
    pub(crate) fn value(&self, key: &[u8]) -> Option<&Bytes> {
        match self.entries.get(key) {
            Some(Entry::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Creates the child bucket `name` unless it exists. Returns whether it was created.
    pub(crate) fn ensure_child(&mut self, name: &Bytes) -> StorageResult<bool> {
        match self.entries.get(name.as_ref()) {
            Some(Entry::Bucket(_)) => Ok(false),
            Some(other) => Err(StorageError::IncompatibleValue { found: other.kind() }),
            None => {
                self.entries
                    .insert(name.clone(), Entry::Bucket(Arc::default()));
                Ok(true)
            }
        }
    }

    /// Stores `value` under `key`, refusing to overwrite a nested bucket.
    pub(crate) fn put_value(&mut self, key: Bytes, value: Bytes) -> StorageResult<()> {
        if let Some(entry @ Entry::Bucket(_)) = self.entries.get(key.as_ref()) {
            return Err(StorageError::IncompatibleValue { found: entry.kind() });
        }
        self.entries.insert(key, Entry::Value(value));
        Ok(())
    }

    /// Removes the value under `key`. Returns whether anything was removed.
    pub(crate) fn delete_value(&mut self, key: &[u8]) -> StorageResult<bool> {
        match self.entries.get(key) {
            None => Ok(false),
            Some(entry @ Entry::Bucket(_)) => {
                Err(StorageError::IncompatibleValue { found: entry.kind() })
            }
            Some(Entry::Value(_)) => {
                self.entries.remove(key);
                Ok(true)
            }
        }
    }
}

/// Follows `path` from `root`, copying every bucket on the way so the
/// returned node can be mutated without disturbing older snapshots.
pub(crate) fn descend_mut<'a>(
    root: &'a mut Arc<BucketNode>,
    path: &[Bytes],
) -> StorageResult<&'a mut BucketNode> {
    let mut node = Arc::make_mut(root);
    for segment in path {
        node = match node.entries.get_mut(segment.as_ref()) {
            Some(Entry::Bucket(child)) => Arc::make_mut(child),
            _ => return Err(StorageError::BucketNotFound),
        };
    }
    Ok(node)
}

/// One step of [`walk`].
#[derive(Debug, Clone, Copy)]
pub(crate) enum Visit<'a> {
    /// A bucket, given by its full path.
    Bucket(&'a [Bytes]),
    /// A value inside the bucket at `path`.
    Value {
        path: &'a [Bytes],
        key: &'a Bytes,
        value: &'a Bytes,
    },
}

/// Walks the tree depth-first, parents before children, keys ascending.
///
/// Every bucket is visited before its own values, and its values before
/// its child buckets.
pub(crate) fn walk<F>(root: &BucketNode, visit: &mut F) -> StorageResult<()>
where
    F: FnMut(Visit<'_>) -> StorageResult<()>,
{
    fn recurse<F>(node: &BucketNode, path: &mut Vec<Bytes>, visit: &mut F) -> StorageResult<()>
    where
        F: FnMut(Visit<'_>) -> StorageResult<()>,
    {
        for (key, entry) in &node.entries {
            if let Entry::Value(value) = entry {
                visit(Visit::Value { path, key, value })?;
            }
        }
        for (key, entry) in &node.entries {
            if let Entry::Bucket(child) = entry {
                path.push(key.clone());
                visit(Visit::Bucket(path))?;
                recurse(child, path, visit)?;
                path.pop();
            }
        }
        Ok(())
    }

    let mut path = Vec::new();
    recurse(root, &mut path, visit)
}
