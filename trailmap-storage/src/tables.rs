//! Path files and aggregate tables.
//!
//! Both are comma-delimited. A path file holds one canonical path per row and
//! no header, except that a digest-named path file opens with an
//! `#owner,<user>` row naming its user. Tables carry a header row. Every file here is written through
//! [`StagedFile`] so readers never observe a half-written table.

use std::fs::File;
use std::path::Path;

use trailmap_core::{ActionPath, StorageError, TrailmapResult, UserKey};

use crate::codec::map_csv_error;
use crate::staged::StagedFile;

/// Delimiter of path files and aggregate tables.
pub const TABLE_DELIMITER: u8 = b',';

/// First field of the owner row in a path file.
pub const OWNER_TAG: &str = "#owner";

/// Lines read back from a path file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFileContents {
    /// Single-column, non-empty rows in file order.
    pub lines: Vec<String>,
    /// Rows skipped for having more than one column or undecodable bytes.
    pub malformed: u64,
    /// User named by an owner row, if the file has one.
    pub owner: Option<UserKey>,
}

/// Write one row per path, preceded by an owner row when `owner` is given.
pub fn write_path_file(
    path: &Path,
    owner: Option<&UserKey>,
    paths: &[ActionPath],
) -> TrailmapResult<()> {
    let mut staged = StagedFile::create(path)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(TABLE_DELIMITER)
            .has_headers(false)
            .flexible(true)
            .from_writer(staged.writer_mut()?);
        if let Some(owner) = owner {
            writer
                .write_record([OWNER_TAG, owner.as_str()])
                .map_err(|err| map_csv_error(err, path))?;
        }
        for action_path in paths {
            writer
                .write_record([action_path.canonical()])
                .map_err(|err| map_csv_error(err, path))?;
        }
        writer.flush().map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    staged.commit()
}

/// Read a path file leniently: blank rows are ignored, malformed rows counted.
pub fn read_path_file(path: &Path) -> TrailmapResult<PathFileContents> {
    let file = File::open(path).map_err(|source| StorageError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(TABLE_DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut contents = PathFileContents::default();
    let mut row = csv::StringRecord::new();
    loop {
        match reader.read_record(&mut row) {
            Ok(false) => break,
            Ok(true) => match row.len() {
                1 if !row[0].is_empty() => contents.lines.push(row[0].to_string()),
                1 => {}
                2 if &row[0] == OWNER_TAG => contents.owner = Some(UserKey::new(&row[1])),
                _ => contents.malformed += 1,
            },
            Err(err) if err.is_io_error() => return Err(map_csv_error(err, path)),
            Err(_) => contents.malformed += 1,
        }
    }
    Ok(contents)
}

/// Write a table with `header` followed by `rows`.
pub fn write_table<I, R, F>(path: &Path, header: &[&str], rows: I) -> TrailmapResult<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut staged = StagedFile::create(path)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(TABLE_DELIMITER)
            .has_headers(false)
            .from_writer(staged.writer_mut()?);
        writer
            .write_record(header)
            .map_err(|err| map_csv_error(err, path))?;
        for row in rows {
            writer
                .write_record(row)
                .map_err(|err| map_csv_error(err, path))?;
        }
        writer.flush().map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    staged.commit()
}

/// Read a table, checking its header matches `header` exactly.
pub fn read_table(path: &Path, header: &[&str]) -> TrailmapResult<Vec<csv::StringRecord>> {
    let file = File::open(path).map_err(|source| StorageError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(TABLE_DELIMITER)
        .has_headers(true)
        .from_reader(file);
    let found = reader.headers().map_err(|err| map_csv_error(err, path))?;
    if found.iter().ne(header.iter().copied()) {
        return Err(StorageError::Codec {
            path: path.to_path_buf(),
            reason: format!(
                "unexpected header {:?}, expected {:?}",
                found.iter().collect::<Vec<_>>(),
                header
            ),
        }
        .into());
    }
    reader
        .records()
        .map(|row| row.map_err(|err| map_csv_error(err, path)))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
