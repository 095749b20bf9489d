//! Synthetic event log generation.
//!
//! Rows pick a user and an action uniformly at random and a timestamp up to
//! [`MAX_AGE_SECS`] seconds before the anchor time.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trailmap_core::{is_path_safe_action, EventRecord, StorageError, TrailmapResult, UserKey};
use trailmap_storage::{record_writer, write_record, StagedFile};

use crate::error::{CliError, CliResult};

/// Oldest generated timestamp, in seconds before the anchor.
pub const MAX_AGE_SECS: i64 = 100_000;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorSettings {
    pub output: PathBuf,
    pub rows: u64,
    pub users: u32,
    pub actions: Vec<String>,
    pub delimiter: u8,
    pub seed: Option<u64>,
    /// Timestamps are drawn from `[anchor - MAX_AGE_SECS, anchor]`.
    pub anchor: NaiveDateTime,
}

impl GeneratorSettings {
    /// Check argument values before any file is touched.
    pub fn validate(&self) -> CliResult<()> {
        if self.users == 0 {
            return Err(CliError::InvalidArgument {
                arg: "users",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.actions.is_empty() || self.actions.iter().any(|a| a.trim().is_empty()) {
            return Err(CliError::InvalidArgument {
                arg: "actions",
                reason: "must be a non-empty list of non-empty names".to_string(),
            });
        }
        if !self.actions.iter().all(|a| is_path_safe_action(a)) {
            return Err(CliError::InvalidArgument {
                arg: "actions",
                reason: "names must not contain '->'".to_string(),
            });
        }
        if matches!(self.delimiter, b'"' | b'\n' | b'\r') {
            return Err(CliError::InvalidArgument {
                arg: "delimiter",
                reason: "must not be a quote or line break".to_string(),
            });
        }
        Ok(())
    }
}

/// Random source of event records.
pub struct EventFaker {
    rng: StdRng,
    users: Vec<UserKey>,
    actions: Vec<String>,
    anchor: NaiveDateTime,
}

impl EventFaker {
    pub fn new(settings: &GeneratorSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            users: (1..=settings.users)
                .map(|i| UserKey::new(format!("user{}", i)))
                .collect(),
            actions: settings.actions.clone(),
            anchor: settings.anchor,
        }
    }

    pub fn next_record(&mut self) -> EventRecord {
        let user = self.users[self.rng.random_range(0..self.users.len())].clone();
        let age = self.rng.random_range(0..=MAX_AGE_SECS);
        let timestamp = (self.anchor - Duration::seconds(age))
            .format(TIMESTAMP_FORMAT)
            .to_string();
        let action = self.actions[self.rng.random_range(0..self.actions.len())].clone();
        EventRecord::new(timestamp, user, action)
    }
}

/// Write a synthetic log per `settings`. Returns the number of rows written.
pub fn generate(settings: &GeneratorSettings) -> CliResult<u64> {
    settings.validate()?;
    write_log(&settings.output, settings)?;
    tracing::info!(
        output = %settings.output.display(),
        rows = settings.rows,
        "Generated '{}' with {} rows.",
        settings.output.display(),
        settings.rows
    );
    Ok(settings.rows)
}

fn write_log(path: &Path, settings: &GeneratorSettings) -> TrailmapResult<()> {
    let mut faker = EventFaker::new(settings);
    let mut staged = StagedFile::create(path)?;
    {
        let mut writer = record_writer(staged.writer_mut()?, settings.delimiter, true, path)?;
        for _ in 0..settings.rows {
            write_record(&mut writer, &faker.next_record(), path)?;
        }
        writer.flush().map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    staged.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailmap_storage::RecordReader;

    fn anchor() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-06-01 12:00:00", TIMESTAMP_FORMAT).expect("anchor")
    }

    fn settings(output: PathBuf, seed: Option<u64>) -> GeneratorSettings {
        GeneratorSettings {
            output,
            rows: 200,
            users: 5,
            actions: ["A", "B", "C", "D", "E"].map(String::from).to_vec(),
            delimiter: b';',
            seed,
            anchor: anchor(),
        }
    }

    #[test]
    fn test_generated_log_is_readable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("actions.csv");
        let rows = generate(&settings(out.clone(), Some(7))).expect("generate");
        assert_eq!(rows, 200);

        let records: Vec<EventRecord> = RecordReader::open(&out, b';')
            .expect("open")
            .map(|r| r.expect("valid"))
            .collect();
        assert_eq!(records.len(), 200);

        let oldest = (anchor() - Duration::seconds(MAX_AGE_SECS))
            .format(TIMESTAMP_FORMAT)
            .to_string();
        let newest = anchor().format(TIMESTAMP_FORMAT).to_string();
        for record in &records {
            assert!(record.timestamp >= oldest && record.timestamp <= newest);
            assert!(["user1", "user2", "user3", "user4", "user5"].contains(&record.user.as_str()));
            assert!(["A", "B", "C", "D", "E"].contains(&record.action.as_str()));
        }
    }

    #[test]
    fn test_seed_makes_output_reproducible() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        generate(&settings(a.clone(), Some(42))).expect("generate");
        generate(&settings(b.clone(), Some(42))).expect("generate");
        assert_eq!(
            std::fs::read(&a).expect("read"),
            std::fs::read(&b).expect("read")
        );
    }

    #[test]
    fn test_zero_rows_writes_header_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("empty.csv");
        let mut s = settings(out.clone(), Some(1));
        s.rows = 0;
        generate(&s).expect("generate");
        assert_eq!(std::fs::read_to_string(&out).expect("read"), "Date;User;Action\n");
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut s = settings(dir.path().join("x.csv"), None);
        s.users = 0;
        assert!(matches!(
            s.validate(),
            Err(CliError::InvalidArgument { arg: "users", .. })
        ));
        s.users = 3;
        s.actions.clear();
        assert!(matches!(
            s.validate(),
            Err(CliError::InvalidArgument { arg: "actions", .. })
        ));
        s.actions = vec!["A".to_string(), "B -> C".to_string()];
        assert!(matches!(
            s.validate(),
            Err(CliError::InvalidArgument { arg: "actions", .. })
        ));
    }
}
