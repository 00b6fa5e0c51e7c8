//! Delimited-text ingestion
//!
//! **Read-Once Design**: an upload is parsed exactly once into a
//! [`RawTable`] of string cells. Typed views ([`InventoryTable`], prepared
//! history series) are derived from it without touching the file again.
//!
//! Toyota Way Principles:
//! - Jidoka: structural problems (ragged rows, bad quoting) stop the upload
//!   with the offending line instead of producing a half-read table
//! - Genchi Genbutsu: raw cells are kept verbatim so the export shows what
//!   the user actually uploaded
//!
//! [`InventoryTable`]: crate::inventory::InventoryTable

pub mod export;
pub mod schema;

use crate::{Error, Result};
use schema::{ColumnAliases, Schema};
use std::io::Read;
use std::path::Path;

/// One data row of an uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line in the source file (header is line 1)
    pub line: usize,
    /// Cells in header order, untrimmed
    pub cells: Vec<String>,
}

impl RawRow {
    /// Cell at `index`, trimmed
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(|c| c.trim())
    }
}

/// Parsed but untyped upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    schema: Schema,
    rows: Vec<RawRow>,
}

impl RawTable {
    /// Create a table from an already-built schema and rows
    ///
    /// Useful for testing and benchmarking
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if a row's width differs from the schema
    pub fn new(schema: Schema, rows: Vec<RawRow>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|r| r.cells.len() != schema.len()) {
            return Err(Error::Parse(format!(
                "line {}: expected {} fields, found {}",
                row.line,
                schema.len(),
                row.cells.len()
            )));
        }
        Ok(Self { schema, rows })
    }

    /// Parse CSV from any reader
    ///
    /// The whole input is buffered so quoting can be checked before any
    /// row is built.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the reader itself fails, otherwise as
    /// [`from_bytes`](Self::from_bytes)
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    /// Parse CSV from an in-memory upload
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] on malformed structure (inconsistent column
    /// counts, an unterminated quote, invalid UTF-8, missing or duplicate
    /// headers)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if let Some(line) = unterminated_quote_line(bytes) {
            return Err(Error::Parse(format!("line {line}: unterminated quote")));
        }

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);

        let headers = csv_reader.headers().map_err(map_csv_error)?.clone();
        let schema = Schema::from_headers(headers.iter())?;

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record.map_err(map_csv_error)?;
            let line = record
                .position()
                .map_or(rows.len() + 2, |p| usize::try_from(p.line()).unwrap_or(usize::MAX));
            rows.push(RawRow {
                line,
                cells: record.iter().map(str::to_string).collect(),
            });
        }

        tracing::debug!(columns = schema.len(), rows = rows.len(), "parsed upload");
        Ok(Self { schema, rows })
    }

    /// Read and parse a CSV file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened, otherwise as
    /// [`from_reader`](Self::from_reader)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Trimmed header row
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Data rows in file order
    #[must_use]
    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    /// Number of data rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Resolve a canonical column (see [`Schema::resolve`])
    #[must_use]
    pub fn column(&self, canonical: &str, aliases: &ColumnAliases) -> Option<usize> {
        self.schema.resolve(canonical, aliases)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Line on which a still-open quoted field began, if the input ends inside
/// one
///
/// Mirrors the csv reader's defaults: a quote opens a field only as its
/// first byte, `""` inside a quoted field is a literal quote, and a quote
/// anywhere else is ordinary text.
fn unterminated_quote_line(bytes: &[u8]) -> Option<usize> {
    let mut state = QuoteState::FieldStart;
    let mut line = 1;
    let mut opened_on = 1;

    for &b in bytes {
        state = match (state, b) {
            (QuoteState::FieldStart, b'"') => {
                opened_on = line;
                QuoteState::Quoted
            }
            (QuoteState::Quoted, b'"') => QuoteState::QuoteInQuoted,
            (QuoteState::QuoteInQuoted, b'"') => QuoteState::Quoted,
            (QuoteState::Quoted, _) => QuoteState::Quoted,
            (_, b',' | b'\n' | b'\r') => QuoteState::FieldStart,
            _ => QuoteState::Unquoted,
        };
        if b == b'\n' {
            line += 1;
        }
    }

    (state == QuoteState::Quoted).then_some(opened_on)
}

fn map_csv_error(err: csv::Error) -> Error {
    if err.is_io_error() {
        if let csv::ErrorKind::Io(io) = err.into_kind() {
            return Error::Io(io);
        }
        return Error::Parse("unreadable input".to_string());
    }

    let line = err.position().map(csv::Position::line);
    let detail = match err.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("expected {expected_len} fields, found {len}"),
        csv::ErrorKind::Utf8 { .. } => "invalid UTF-8".to_string(),
        _ => err.to_string(),
    };
    match line {
        Some(line) => Error::Parse(format!("line {line}: {detail}")),
        None => Error::Parse(detail),
    }
}
