//! Byte store underneath the commit log.

use crate::error::StorageResult;

/// An append-only byte store holding one commit log.
///
/// The engine never rewrites bytes in place: committed records are appended,
/// and the only destructive operation is [`truncate`](Self::truncate), used to
/// cut a torn trailing record after a crash or a failed append.
pub trait StorageBackend: Send + Sync {
    /// Reads exactly `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`ReadPastEnd`](crate::StorageError::ReadPastEnd) when the
    /// range extends beyond [`size`](Self::size), or on I/O failure.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current length in bytes; the next append lands here.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Forces data and metadata to durable media.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Drops every byte at or after `new_size`.
    ///
    /// # Errors
    ///
    /// Fails if `new_size` is larger than the current size or on I/O failure.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
