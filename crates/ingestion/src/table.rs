//! CSV table reading and atomic publishing.
//!
//! Every artifact is written to a temporary file in its destination directory and
//! then renamed into place, so readers never observe a partially written file.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use ohlcv_core::{Error, RawTable, Result};
use serde::Serialize;
use tempfile::NamedTempFile;

/// Read a CSV file with a header row into an untyped table.
pub fn read_table(path: impl AsRef<Path>) -> Result<RawTable> {
    let file = fs::File::open(path.as_ref())?;
    read_table_from(file)
}

/// Read CSV from any reader. Rows may be ragged; fields are trimmed.
///
/// Cells are decoded lossily: invalid UTF-8 becomes U+FFFD and is left to the
/// per-cell parsers, so one bad byte never rejects the whole table.
pub fn read_table_from<R: Read>(reader: R) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = decode(reader.byte_headers()?);
    let mut rows = Vec::new();
    for record in reader.byte_records() {
        rows.push(decode(&record?));
    }
    Ok(RawTable::new(headers, rows))
}

fn decode(record: &csv::ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

/// Write a CSV table atomically.
pub fn publish_csv<I>(path: impl AsRef<Path>, headers: &[String], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    publish_with(path.as_ref(), |file| {
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(headers)?;
        for row in rows {
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// Write a value as pretty JSON atomically.
pub fn publish_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    publish_with(path.as_ref(), |file| {
        serde_json::to_writer_pretty(&mut *file, value)?;
        file.write_all(b"\n")?;
        Ok(())
    })
}

/// Remove a previously published file. Returns whether one existed.
pub fn remove_stale(path: impl AsRef<Path>) -> Result<bool> {
    match fs::remove_file(path.as_ref()) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Io(e)),
    }
}

fn publish_with<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
