//! Delimited tabular dumps as an import [`RowSource`].
//!
//! Fields are read as raw bytes, so values in the legacy 8-bit encoding
//! reach the importer undecoded. The first record is the header.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ByteRecord, Reader, ReaderBuilder};
use fias_catalog_core::import::{RawRow, RowSource};

pub struct CsvSource {
    name: String,
    headers: Vec<String>,
    reader: Reader<File>,
    record: ByteRecord,
}

/// Source name of a dump: its file name without a trailing `.csv`.
pub fn source_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lower = file_name.to_ascii_lowercase();
    match lower.strip_suffix(".csv") {
        Some(stem) => file_name[..stem.len()].to_string(),
        None => file_name,
    }
}

impl CsvSource {
    pub fn open(path: &Path, delimiter: u8) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let headers = reader
            .byte_headers()
            .with_context(|| format!("Failed to read header of {}", path.display()))?
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .collect();
        Ok(Self {
            name: source_name(path),
            headers,
            reader,
            record: ByteRecord::new(),
        })
    }
}

impl RowSource for CsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn total_rows(&self) -> Option<u64> {
        None
    }

    fn next_row(&mut self) -> Result<Option<RawRow>> {
        if !self.reader.read_byte_record(&mut self.record)? {
            return Ok(None);
        }
        let fields = self
            .headers
            .iter()
            .zip(self.record.iter())
            .map(|(name, value)| (name.clone(), value.to_vec()))
            .collect();
        Ok(Some(RawRow { fields }))
    }
}
