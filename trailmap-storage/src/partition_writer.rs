//! Bounded-handle spill writer for per-user partition files.
//!
//! The writer routes each record to `<user>.csv` in append mode. At most
//! `max_open` files are held open; when a record arrives for a user whose
//! file is closed and the pool is full, the least recently written file is
//! flushed and closed first. A file gets its header only when it is created
//! empty, so reopening a partition never duplicates the header.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use trailmap_core::{EventRecord, StorageError, TrailmapResult, UserKey};

use crate::codec::{record_writer, write_record};
use crate::naming::FileKind;

/// Counters reported when the writer finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionStats {
    /// Records appended across all partitions.
    pub records: u64,
    /// Partition files created by this writer.
    pub partitions_created: u64,
    /// Handles closed to stay within the open-file bound.
    pub evictions: u64,
}

struct OpenPartition {
    writer: csv::Writer<File>,
    path: PathBuf,
    last_used: u64,
}

/// Append-only router from records to per-user partition files.
pub struct PartitionWriter {
    dir: PathBuf,
    delimiter: u8,
    max_open: usize,
    open: HashMap<UserKey, OpenPartition>,
    clock: u64,
    stats: PartitionStats,
}

impl PartitionWriter {
    /// Create a writer rooted at `dir`, creating the directory if needed.
    pub fn new(dir: &Path, delimiter: u8, max_open: usize) -> TrailmapResult<Self> {
        std::fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            delimiter,
            max_open: max_open.max(1),
            open: HashMap::new(),
            clock: 0,
            stats: PartitionStats::default(),
        })
    }

    /// Append one record to its user's partition.
    pub fn append(&mut self, record: &EventRecord) -> TrailmapResult<()> {
        self.clock += 1;
        if !self.open.contains_key(&record.user) {
            if self.open.len() >= self.max_open {
                self.evict_least_recent()?;
            }
            let partition = self.open_partition(&record.user)?;
            self.open.insert(record.user.clone(), partition);
        }

        let clock = self.clock;
        if let Some(partition) = self.open.get_mut(&record.user) {
            partition.last_used = clock;
            write_record(&mut partition.writer, record, &partition.path)?;
        }
        self.stats.records += 1;
        Ok(())
    }

    /// Number of files currently held open.
    pub fn open_handles(&self) -> usize {
        self.open.len()
    }

    /// Flush and close every open file.
    pub fn finish(mut self) -> TrailmapResult<PartitionStats> {
        for (_, mut partition) in self.open.drain() {
            flush(&mut partition)?;
        }
        Ok(self.stats)
    }

    fn open_partition(&mut self, user: &UserKey) -> TrailmapResult<OpenPartition> {
        let path = FileKind::Partition.path_in(&self.dir, user);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StorageError::Open {
                path: path.clone(),
                source,
            })?;
        let is_new = file
            .metadata()
            .map_err(|source| StorageError::Read {
                path: path.clone(),
                source,
            })?
            .len()
            == 0;
        if is_new {
            self.stats.partitions_created += 1;
        }
        let writer = record_writer(file, self.delimiter, is_new, &path)?;
        Ok(OpenPartition {
            writer,
            path,
            last_used: self.clock,
        })
    }

    fn evict_least_recent(&mut self) -> TrailmapResult<()> {
        let victim = self
            .open
            .iter()
            .min_by_key(|(_, p)| p.last_used)
            .map(|(user, _)| user.clone());
        if let Some(user) = victim {
            if let Some(mut partition) = self.open.remove(&user) {
                flush(&mut partition)?;
                self.stats.evictions += 1;
            }
        }
        Ok(())
    }
}

fn flush(partition: &mut OpenPartition) -> TrailmapResult<()> {
    partition.writer.flush().map_err(|source| {
        StorageError::Write {
            path: partition.path.clone(),
            source,
        }
        .into()
    })
}

// ============================================================================
// TESTS
// ============================================================================
