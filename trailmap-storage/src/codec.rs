//! Delimited codec for event records.
//!
//! Source logs and partition files share one schema: a header naming the
//! `Date`, `User` and `Action` columns (in any order, surrounding whitespace
//! ignored) followed by one record per row. The reader holds one row at a
//! time and imposes no field or line length limit.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use trailmap_core::{
    is_path_safe_action, EventRecord, RecordError, StorageError, TrailmapResult, PATH_SEPARATOR,
    RECORD_HEADER,
};

/// Column positions resolved from a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLayout {
    date: usize,
    user: usize,
    action: usize,
}

impl HeaderLayout {
    /// Resolve the three required columns from a header row.
    pub fn resolve(header: &csv::StringRecord) -> Result<Self, RecordError> {
        let find = |column: &'static str| {
            header
                .iter()
                .position(|name| name == column)
                .ok_or(RecordError::MissingColumn { column })
        };
        Ok(Self {
            date: find(RECORD_HEADER[0])?,
            user: find(RECORD_HEADER[1])?,
            action: find(RECORD_HEADER[2])?,
        })
    }

    fn extract(&self, row: &csv::StringRecord, line: u64) -> Result<EventRecord, RecordError> {
        let field = |idx: usize, name: &'static str| match row.get(idx) {
            Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
            _ => Err(RecordError::MissingField { line, field: name }),
        };
        let timestamp = field(self.date, RECORD_HEADER[0])?;
        let user = field(self.user, RECORD_HEADER[1])?;
        let action = field(self.action, RECORD_HEADER[2])?;
        if !is_path_safe_action(&action) {
            return Err(RecordError::Unparseable {
                line,
                reason: format!("action contains the path separator '{}'", PATH_SEPARATOR.trim()),
            });
        }
        Ok(EventRecord::new(timestamp, user, action))
    }
}

/// Streaming reader over a delimited event file.
pub struct RecordReader<R: Read> {
    inner: csv::Reader<R>,
    layout: HeaderLayout,
    row: csv::StringRecord,
    path: PathBuf,
}

impl RecordReader<File> {
    /// Open `path` and resolve its header.
    pub fn open(path: &Path, delimiter: u8) -> TrailmapResult<Self> {
        let file = File::open(path).map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, delimiter, path)
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap an arbitrary reader. `path` is only used in error reports.
    pub fn from_reader(reader: R, delimiter: u8, path: &Path) -> TrailmapResult<Self> {
        let mut inner = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let header = inner
            .headers()
            .map_err(|err| map_csv_error(err, path))?
            .clone();
        let layout = HeaderLayout::resolve(&header)?;
        Ok(Self {
            inner,
            layout,
            row: csv::StringRecord::new(),
            path: path.to_path_buf(),
        })
    }

    /// Read the next record, or `None` at end of input.
    ///
    /// Malformed rows surface as [`RecordError`]; the caller decides whether
    /// to abort or skip. Reading may continue after a record error.
    pub fn next_record(&mut self) -> Option<TrailmapResult<EventRecord>> {
        match self.inner.read_record(&mut self.row) {
            Ok(false) => None,
            Ok(true) => {
                let line = self.row.position().map(|p| p.line()).unwrap_or(0);
                Some(self.layout.extract(&self.row, line).map_err(Into::into))
            }
            Err(err) => Some(Err(map_csv_error(err, &self.path))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = TrailmapResult<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

/// Build a record writer. The header is written only when `write_header`.
pub fn record_writer<W: Write>(
    writer: W,
    delimiter: u8,
    write_header: bool,
    path: &Path,
) -> TrailmapResult<csv::Writer<W>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(writer);
    if write_header {
        writer
            .write_record(RECORD_HEADER)
            .map_err(|err| map_csv_error(err, path))?;
    }
    Ok(writer)
}

/// Append one record in header column order.
pub fn write_record<W: Write>(
    writer: &mut csv::Writer<W>,
    record: &EventRecord,
    path: &Path,
) -> TrailmapResult<()> {
    writer
        .write_record([
            record.timestamp.as_str(),
            record.user.as_str(),
            record.action.as_str(),
        ])
        .map_err(|err| map_csv_error(err, path))
}

/// Translate a csv error into the trailmap taxonomy: I/O failures are
/// storage errors, everything else is a malformed row.
pub fn map_csv_error(err: csv::Error, path: &Path) -> trailmap_core::TrailmapError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    match err.into_kind() {
        csv::ErrorKind::Io(source) => StorageError::Read {
            path: path.to_path_buf(),
            source,
        }
        .into(),
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => RecordError::Unparseable {
            line,
            reason: format!("expected {} fields, found {}", expected_len, len),
        }
        .into(),
        csv::ErrorKind::Utf8 { err, .. } => RecordError::Unparseable {
            line,
            reason: format!("invalid UTF-8: {}", err),
        }
        .into(),
        other => StorageError::Codec {
            path: path.to_path_buf(),
            reason: format!("{:?}", other),
        }
        .into(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use trailmap_core::TrailmapError;

    fn reader(input: &str) -> TrailmapResult<RecordReader<&[u8]>> {
        RecordReader::from_reader(input.as_bytes(), b';', Path::new("mem.csv"))
    }

    #[test]
    fn test_reads_records_in_order() {
        let mut r = reader("Date;User;Action\n2024-01-01;u1;A\n2024-01-02;u2;B\n").expect("open");
        let first = r.next_record().expect("row").expect("valid");
        let second = r.next_record().expect("row").expect("valid");
        assert!(r.next_record().is_none());
        assert_eq!(first, EventRecord::new("2024-01-01", "u1", "A"));
        assert_eq!(second, EventRecord::new("2024-01-02", "u2", "B"));
    }

    #[test]
    fn test_header_whitespace_and_order_tolerated() {
        let mut r = reader("Action; User; Date\nB;u9;2024\n").expect("open");
        let rec = r.next_record().expect("row").expect("valid");
        assert_eq!(rec, EventRecord::new("2024", "u9", "B"));
    }

    #[test]
    fn test_missing_header_column() {
        let err = reader("Date;Action\n2024;A\n").err().expect("should fail");
        assert!(matches!(
            err,
            TrailmapError::Record(RecordError::MissingColumn { column: "User" })
        ));
    }

    #[test]
    fn test_empty_input_has_no_header() {
        assert!(reader("").is_err());
    }

    #[test]
    fn test_missing_user_is_reported_with_line() {
        let mut r = reader("Date;User;Action\n2024;u1;A\n2024;;B\n").expect("open");
        assert!(r.next_record().expect("row").is_ok());
        let err = r.next_record().expect("row").expect_err("missing user");
        assert!(matches!(
            err,
            TrailmapError::Record(RecordError::MissingField { line: 3, field: "User" })
        ));
    }

    #[test]
    fn test_arrow_in_action_is_unparseable() {
        let mut r = reader("Date;User;Action\n2024;u1;B -> C\n2024;u1;D\n").expect("open");
        let err = r.next_record().expect("row").expect_err("arrow action");
        assert!(matches!(
            err,
            TrailmapError::Record(RecordError::Unparseable { line: 2, .. })
        ));
        assert!(r.next_record().expect("row").is_ok());
    }

    #[test]
    fn test_short_row_is_unparseable() {
        let mut r = reader("Date;User;Action\n2024;u1\n").expect("open");
        let err = r.next_record().expect("row").expect_err("short row");
        assert!(matches!(err, TrailmapError::Record(RecordError::Unparseable { .. })));
    }

    #[test]
    fn test_long_fields_are_not_truncated() {
        let action = "X".repeat(1 << 20);
        let input = format!("Date;User;Action\n2024;u1;{}\n", action);
        let mut r = reader(&input).expect("open");
        let rec = r.next_record().expect("row").expect("valid");
        assert_eq!(rec.action.len(), 1 << 20);
    }

    #[test]
    fn test_writer_round_trips_quoted_delimiter() {
        let mut buf = Vec::new();
        {
            let mut w = record_writer(&mut buf, b';', true, Path::new("mem.csv")).expect("writer");
            let rec = EventRecord::new("2024-01-01 10:00:00", "user;odd", "A");
            write_record(&mut w, &rec, Path::new("mem.csv")).expect("write");
            w.flush().expect("flush");
        }
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("Date;User;Action\n"));
        let mut r = reader(&text).expect("open");
        let rec = r.next_record().expect("row").expect("valid");
        assert_eq!(rec.user.as_str(), "user;odd");
    }
}
