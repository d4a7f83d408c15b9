//! Whole-database commands: buckets, backup, size.

use crate::output::Format;
use bucketdb_core::Db;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Prints every bucket path as a JSON array, parents first.
pub fn buckets<W: Write>(
    db: &Db,
    format: Format,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    let paths: Vec<String> = db.buckets()?.iter().map(ToString::to_string).collect();
    format.write(out, &paths)
}

/// Writes a backup of the database to `output`.
pub fn backup<W: Write>(
    db: &Db,
    output: &Path,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Creating backup at {:?}", output);
    let written = db.backup_to_file(output)?;
    writeln!(out, "backup written to {} ({written} bytes)", output.display())?;
    Ok(())
}

/// Prints the size of the stored data in bytes.
pub fn size<W: Write>(db: &Db, out: &mut W) -> Result<(), Box<dyn std::error::Error>> {
    writeln!(out, "{}", db.size()?)?;
    Ok(())
}
