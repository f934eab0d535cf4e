use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use log::info;
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
}

impl Format {
    /// `.json` means JSON; anything else is written as CSV.
    pub fn from_path(path: &Path) -> Format {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Csv,
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            other => Err(Error::configuration(format!("unknown format '{}'", other))),
        }
    }
}

/// Writes `rows` as CSV (one record per row, header from the field names) or
/// as a pretty-printed JSON array.
pub fn rows<W, T>(writer: W, rows: &[T], format: Format) -> Result<()>
where
    W: Write,
    T: Serialize,
{
    match format {
        Format::Csv => {
            let mut csv_writer = csv::Writer::from_writer(writer);
            for row in rows {
                csv_writer.serialize(row)?;
            }
            csv_writer.flush()?;
        }
        Format::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

pub fn rows_to_file<T: Serialize>(path: &Path, rows: &[T], format: Option<Format>) -> Result<()> {
    let format = format.unwrap_or_else(|| Format::from_path(path));
    let file = File::create(path)?;
    self::rows(io::BufWriter::new(file), rows, format)?;
    info!("Wrote {} rows to {:?}", rows.len(), path);
    Ok(())
}

pub fn rows_to_string<T: Serialize>(rows: &[T], format: Format) -> Result<String> {
    let mut buf = Vec::new();
    self::rows(&mut buf, rows, format)?;
    String::from_utf8(buf).map_err(|e| Error::logic(format!("writer produced invalid UTF-8: {}", e)))
}
