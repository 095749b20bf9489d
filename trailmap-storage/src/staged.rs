//! Write-then-rename files.
//!
//! Output is written to a hidden sibling (`.<name>.partial`) and renamed over
//! the final path on [`StagedFile::commit`]. A final file therefore only ever
//! exists fully written; an uncommitted staging file is removed on drop.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use trailmap_core::{StorageError, TrailmapResult};

pub struct StagedFile {
    staging_path: PathBuf,
    final_path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl StagedFile {
    /// Start staging `final_path`, creating parent directories.
    pub fn create(final_path: &Path) -> TrailmapResult<Self> {
        if let Some(parent) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let staging_path = staging_path_for(final_path);
        let file = File::create(&staging_path).map_err(|source| StorageError::Open {
            path: staging_path.clone(),
            source,
        })?;
        Ok(Self {
            staging_path,
            final_path: final_path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> TrailmapResult<()> {
        let path = self.final_path.clone();
        self.writer_mut()?
            .write_all(bytes)
            .map_err(|source| StorageError::Write { path, source }.into())
    }

    /// Borrow the underlying buffered writer.
    pub fn writer_mut(&mut self) -> TrailmapResult<&mut BufWriter<File>> {
        match self.writer.as_mut() {
            Some(writer) => Ok(writer),
            None => Err(StorageError::Codec {
                path: self.final_path.clone(),
                reason: "staged file already committed".to_string(),
            }
            .into()),
        }
    }

    /// Flush, sync and move into place.
    pub fn commit(mut self) -> TrailmapResult<()> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|err| StorageError::Write {
                path: self.staging_path.clone(),
                source: err.into_error(),
            })?;
            file.sync_all().map_err(|source| StorageError::Write {
                path: self.staging_path.clone(),
                source,
            })?;
        }
        fs::rename(&self.staging_path, &self.final_path).map_err(|source| {
            StorageError::Rename {
                path: self.final_path.clone(),
                source,
            }
            .into()
        })
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.writer.is_some() {
            self.writer = None;
            let _ = fs::remove_file(&self.staging_path);
        }
    }
}

/// Final file name a staging file name stands in for, if it is one.
pub fn staged_target(name: &str) -> Option<&str> {
    name.strip_prefix('.')?
        .strip_suffix(".partial")
        .filter(|target| !target.is_empty())
}

fn staging_path_for(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!(".{}.partial", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_moves_into_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("out").join("summary.csv");
        let mut staged = StagedFile::create(&target).expect("create");
        staged.write_all(b"Path,Occurrences,Users\n").expect("write");
        assert!(!target.exists());
        staged.commit().expect("commit");
        assert_eq!(
            fs::read_to_string(&target).expect("read"),
            "Path,Occurrences,Users\n"
        );
        assert!(!dir.path().join("out").join(".summary.csv.partial").exists());
    }

    #[test]
    fn test_staged_target_recovers_final_name() {
        assert_eq!(staged_target(".u1_paths.csv.partial"), Some("u1_paths.csv"));
        assert_eq!(
            staged_target("..trailmap-complete.partial"),
            Some(".trailmap-complete")
        );
        assert_eq!(staged_target("u1.csv"), None);
        assert_eq!(staged_target("..partial"), None);
    }

    #[test]
    fn test_drop_without_commit_leaves_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("graph.puml");
        {
            let mut staged = StagedFile::create(&target).expect("create");
            staged.write_all(b"@startuml\n").expect("write");
        }
        assert!(!target.exists());
        assert_eq!(fs::read_dir(dir.path()).expect("read_dir").count(), 0);
    }
}
