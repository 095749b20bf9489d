//! File naming for per-user artifacts.
//!
//! User keys are percent-encoded so that any key maps to exactly one safe path
//! component, and decoding the file name recovers the key. Keys whose encoding
//! would not fit in a file name get a bounded name instead: a prefix of the
//! encoding, `+`, and a SHA-256 digest of the key. Percent-encoding never
//! emits `+`, so the two forms cannot be confused. The owner of a digest-named
//! file is recorded inside it.
//!
//! Listing is sorted by file name so every scan over a directory visits files
//! in the same order.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use trailmap_core::{StorageError, TrailmapResult, UserKey};

const PARTITION_SUFFIX: &str = ".csv";
const PATH_FILE_SUFFIX: &str = "_paths.csv";

/// Longest stem used before switching to a digest name. Leaves room for the
/// suffix and the `.<name>.partial` staging name under a 255-byte limit.
pub const MAX_STEM_BYTES: usize = 160;

const DIGEST_SEPARATOR: char = '+';
const DIGEST_HEX_LEN: usize = 32;

/// Which per-user artifact a directory holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `<user>.csv` in the partition directory.
    Partition,
    /// `<user>_paths.csv` in the path directory.
    Paths,
}

/// What a file name says about its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOwner {
    /// The name decodes to the owning key.
    Named(UserKey),
    /// The name is a digest of a long key; the key is stored in the file.
    Digest,
}

impl FileOwner {
    pub fn user(&self) -> Option<&UserKey> {
        match self {
            FileOwner::Named(user) => Some(user),
            FileOwner::Digest => None,
        }
    }
}

impl FileKind {
    fn suffix(self) -> &'static str {
        match self {
            FileKind::Partition => PARTITION_SUFFIX,
            FileKind::Paths => PATH_FILE_SUFFIX,
        }
    }

    /// File name for `user`.
    pub fn file_name(self, user: &UserKey) -> String {
        self.name_for_stem(&stem(user))
    }

    /// File name for an already-derived stem.
    pub fn name_for_stem(self, stem: &str) -> String {
        format!("{}{}", stem, self.suffix())
    }

    /// Full path for `user` under `dir`.
    pub fn path_in(self, dir: &Path, user: &UserKey) -> PathBuf {
        dir.join(self.file_name(user))
    }

    /// Recover the owner from a file name, or `None` for foreign files.
    pub fn parse_file_name(self, name: &str) -> Option<FileOwner> {
        self.split_stem(name).map(|(_, owner)| owner)
    }

    fn split_stem(self, name: &str) -> Option<(String, FileOwner)> {
        if name.starts_with('.') {
            return None;
        }
        let stem = name.strip_suffix(self.suffix())?;
        if stem.is_empty() {
            return None;
        }
        if let Some((prefix, digest)) = stem.rsplit_once(DIGEST_SEPARATOR) {
            let well_formed = !prefix.contains(DIGEST_SEPARATOR)
                && digest.len() == DIGEST_HEX_LEN
                && digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
            return well_formed.then(|| (stem.to_string(), FileOwner::Digest));
        }
        let decoded = urlencoding::decode(stem).ok()?;
        Some((
            stem.to_string(),
            FileOwner::Named(UserKey::new(decoded.into_owned())),
        ))
    }
}

/// Name stem shared by a user's partition and path files.
fn stem(user: &UserKey) -> String {
    let encoded = urlencoding::encode(user.as_str());
    // a leading dot would collide with marker and staging files
    let encoded = match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{}", rest),
        None => encoded.into_owned(),
    };
    if encoded.len() <= MAX_STEM_BYTES {
        return encoded;
    }

    let digest = Sha256::digest(user.as_str().as_bytes());
    let mut cut = MAX_STEM_BYTES - DIGEST_HEX_LEN - 1;
    // never split a %XX escape
    if let Some(pct) = encoded[..cut].rfind('%') {
        if pct + 3 > cut {
            cut = pct;
        }
    }
    format!(
        "{}{}{}",
        &encoded[..cut],
        DIGEST_SEPARATOR,
        hex::encode(&digest[..DIGEST_HEX_LEN / 2])
    )
}

/// A per-user file found in a stage directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFile {
    pub owner: FileOwner,
    /// File name without its kind suffix.
    pub stem: String,
    pub path: PathBuf,
}

/// List the per-user files of `kind` under `dir`, sorted by file name.
///
/// A missing directory lists as empty.
pub fn list_user_files(dir: &Path, kind: FileKind) -> TrailmapResult<Vec<UserFile>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StorageError::Read {
                path: dir.to_path_buf(),
                source,
            }
            .into())
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| StorageError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some((stem, owner)) = kind.split_stem(name) {
            files.push(UserFile { owner, stem, path });
        }
    }
    files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(files)
}
