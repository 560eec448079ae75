//! Tabular-row reader for the extracted CSV members.
//!
//! Rows come back in dict form keyed by the header row. UTF-8 files are
//! streamed straight from disk; other encodings (the indicator label files
//! ship as WINDOWS-1252) are decoded up front with `encoding_rs`.

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

/// One CSV row keyed by (lower-cased) column name.
pub type Row = HashMap<String, String>;

pub struct TabularReader {
    headers: Vec<String>,
    reader: csv::Reader<Box<dyn Read>>,
}

impl TabularReader {
    pub fn open(path: &Path, encoding: &'static Encoding) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

        let source: Box<dyn Read> = if encoding == UTF_8 {
            Box::new(BufReader::new(file))
        } else {
            let mut bytes = Vec::new();
            BufReader::new(file)
                .read_to_end(&mut bytes)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let (decoded, _, had_errors) = encoding.decode(&bytes);
            if had_errors {
                tracing::warn!(path = %path.display(), encoding = encoding.name(), "malformed sequences replaced while decoding");
            }
            Box::new(Cursor::new(decoded.into_owned().into_bytes()))
        };

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);
        let headers: Vec<String> = reader
            .byte_headers()
            .with_context(|| format!("Failed to read CSV headers of {}", path.display()))?
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .collect();

        Ok(Self { headers, reader })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Remaining rows. Short records are padded with empty values.
    pub fn rows(&mut self) -> impl Iterator<Item = Result<Row>> + '_ {
        let headers = &self.headers;
        self.reader.byte_records().map(move |record| {
            let record = record.context("CSV parse error")?;
            Ok(headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    let value = record
                        .get(i)
                        .map(|v| String::from_utf8_lossy(v).into_owned())
                        .unwrap_or_default();
                    (header.clone(), value)
                })
                .collect())
        })
    }
}
