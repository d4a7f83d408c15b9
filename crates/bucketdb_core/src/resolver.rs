//! Maps bucket paths onto the engine's nested buckets.

use crate::error::{CoreError, CoreResult};
use crate::path::BucketPath;
use bucketdb_storage::{BucketHandle, EngineTx};

/// Walks `path` from the root. Fails as soon as a segment is missing.
///
/// A top-level path is a single lookup; each further segment is one more.
pub(crate) fn resolve(tx: &EngineTx, path: &BucketPath) -> CoreResult<BucketHandle> {
    let mut handle: Option<BucketHandle> = None;
    for segment in path.segments() {
        handle = Some(
            tx.bucket(handle.as_ref(), segment.as_bytes())?
                .ok_or_else(|| CoreError::no_such_bucket(path.as_str()))?,
        );
    }
    handle.ok_or_else(|| CoreError::no_such_bucket(path.as_str()))
}

/// Walks `path` from the root, creating every missing segment.
pub(crate) fn resolve_or_create(tx: &mut EngineTx, path: &BucketPath) -> CoreResult<BucketHandle> {
    let mut handle: Option<BucketHandle> = None;
    for segment in path.segments() {
        handle = Some(tx.create_bucket_if_absent(handle.as_ref(), segment.as_bytes())?);
    }
    handle.ok_or_else(|| CoreError::no_such_bucket(path.as_str()))
}
