//! CLI command implementations.

pub mod admin;
pub mod docs;
pub mod query;

use thiserror::Error;

/// Errors raised by the CLI itself rather than the database.
#[derive(Debug, Error)]
pub enum CliError {
    /// The document argument parsed as JSON but is not an object.
    #[error("document must be a JSON object, got {found}")]
    NotAnObject {
        /// The kind of JSON value that was given.
        found: &'static str,
    },
}
