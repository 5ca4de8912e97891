//! Common, IO-related code.

use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use flate2::bufread::MultiGzDecoder;

/// Transparently open a file with gzip decoder.
pub fn open_read_maybe_gz<P>(path: P) -> Result<Box<dyn BufRead>, anyhow::Error>
where
    P: AsRef<Path>,
{
    if path.as_ref().extension().map(|s| s.to_str()) == Some(Some("gz")) {
        tracing::trace!("Opening {:?} as gzip for reading", path.as_ref());
        let file = File::open(path)?;
        let bufreader = BufReader::new(file);
        let decoder = MultiGzDecoder::new(bufreader);
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        tracing::trace!("Opening {:?} as plain text for reading", path.as_ref());
        let file = File::open(path).map(BufReader::new)?;
        Ok(Box::new(file))
    }
}

/// Load a JSON document from `path`, gzip-compressed or not.
pub fn read_json<T, P>(path: P) -> Result<T, anyhow::Error>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let reader = open_read_maybe_gz(path.as_ref())
        .map_err(|e| anyhow::anyhow!("could not open {:?}: {}", path.as_ref(), e))?;
    serde_json::from_reader(reader)
        .map_err(|e| anyhow::anyhow!("could not parse JSON from {:?}: {}", path.as_ref(), e))
}

/// Write `value` as pretty-printed JSON to `path`.
pub fn write_json<T, P>(path: P, value: &T) -> Result<(), anyhow::Error>
where
    T: serde::Serialize,
    P: AsRef<Path>,
{
    tracing::trace!("Writing JSON to {:?}", path.as_ref());
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Append one row to a tab-separated ledger file.
///
/// The file is created with `header` as its first line if it does not exist yet; existing
/// files are only ever appended to.
pub fn append_ledger_row<P>(path: P, header: &[&str], row: &[&str]) -> Result<(), anyhow::Error>
where
    P: AsRef<Path>,
{
    let is_new = !path.as_ref().exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())
        .map_err(|e| anyhow::anyhow!("could not open ledger {:?}: {}", path.as_ref(), e))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(file);
    if is_new {
        tracing::debug!("creating ledger {:?}", path.as_ref());
        writer.write_record(header)?;
    }
    writer.write_record(row)?;
    writer.flush()?;
    Ok(())
}
