//! Output formatting.

use clap::ValueEnum;
use serde::Serialize;
use std::io::Write;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// One compact JSON value per line.
    #[default]
    Json,
    /// Indented JSON.
    JsonPretty,
    /// One YAML document per value, each opened with `---`.
    Yaml,
}

impl Format {
    /// Writes `value` followed by a newline.
    pub fn write<W: Write, T: Serialize>(
        self,
        out: &mut W,
        value: &T,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match self {
            Format::Json => {
                serde_json::to_writer(&mut *out, value)?;
                writeln!(out)?;
            }
            Format::JsonPretty => {
                serde_json::to_writer_pretty(&mut *out, value)?;
                writeln!(out)?;
            }
            // The YAML serializer ends every document with a newline already.
            Format::Yaml => {
                out.write_all(b"---\n")?;
                serde_yaml::to_writer(&mut *out, value)?;
            }
        }
        Ok(())
    }
}
