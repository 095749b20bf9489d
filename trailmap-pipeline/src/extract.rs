//! Sequence extraction: one partition in, trigger-delimited paths out.
//!
//! A partition is loaded whole (one user's records), ordered newest first by
//! plain string comparison of the timestamp, and walked by a two-state
//! scanner:
//!
//! ```text
//!            trigger                       trigger: close + reopen
//! Seeking ───────────► Collecting ◄──────────────────┐
//!   ▲  │ other            │ other: append            │
//!   └──┘                  └──────────────────────────┘
//!                         end of records: close
//! ```
//!
//! Closing emits the accumulator when it holds at least two actions.

use std::path::Path;

use trailmap_core::{ActionPath, EventRecord, TrailmapConfig, TrailmapError, TrailmapResult};
use trailmap_storage::{
    checkpoint, list_user_files, write_path_file, DirState, FileKind, FileOwner, RecordReader,
    UserFile,
};

use crate::stage::{Stage, StageOutcome};

// ============================================================================
// SCANNER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    Seeking,
    Collecting(Vec<String>),
}

/// Two-state walker that slices an ordered action stream into paths.
#[derive(Debug, Clone)]
pub struct PathScanner<'t> {
    target: &'t str,
    state: ScanState,
    emitted: Vec<ActionPath>,
}

impl<'t> PathScanner<'t> {
    pub fn new(target: &'t str) -> Self {
        Self {
            target,
            state: ScanState::Seeking,
            emitted: Vec::new(),
        }
    }

    /// Feed the next action in walk order.
    pub fn feed(&mut self, action: &str) {
        if action == self.target {
            // close is a no-op while seeking
            self.close();
            self.state = ScanState::Collecting(vec![action.to_string()]);
        } else if let ScanState::Collecting(actions) = &mut self.state {
            actions.push(action.to_string());
        }
    }

    /// True while an accumulator is open.
    pub fn is_collecting(&self) -> bool {
        matches!(self.state, ScanState::Collecting(_))
    }

    /// Close any open accumulator and return every qualifying path.
    pub fn finish(mut self) -> Vec<ActionPath> {
        self.close();
        self.emitted
    }

    fn close(&mut self) {
        if let ScanState::Collecting(actions) =
            std::mem::replace(&mut self.state, ScanState::Seeking)
        {
            if let Some(path) = ActionPath::from_actions(actions) {
                self.emitted.push(path);
            }
        }
    }
}

/// Order records newest first by string timestamp. Ties keep arrival order.
pub fn order_newest_first(records: &mut [EventRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Order one partition and extract its paths.
pub fn extract_paths(mut records: Vec<EventRecord>, target_action: &str) -> Vec<ActionPath> {
    order_newest_first(&mut records);
    let mut scanner = PathScanner::new(target_action);
    for record in &records {
        scanner.feed(&record.action);
    }
    scanner.finish()
}

// ============================================================================
// STAGE
// ============================================================================

/// Counters for one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Partition files visited.
    pub partitions: u64,
    /// Paths written across all path files.
    pub paths: u64,
    /// Partition rows skipped as malformed.
    pub skipped_records: u64,
    /// Partitions that could not be read at all.
    pub unreadable_partitions: u64,
}

/// Load a partition leniently: malformed rows are skipped, an unreadable or
/// empty file yields no records.
pub fn load_partition(path: &Path, delimiter: u8) -> (Vec<EventRecord>, u64, bool) {
    let reader = match RecordReader::open(path, delimiter) {
        Ok(reader) => reader,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Partition unreadable, no paths extracted");
            return (Vec::new(), 0, false);
        }
    };

    let mut records = Vec::new();
    let mut skipped = 0;
    for result in reader {
        match result {
            Ok(record) => records.push(record),
            Err(TrailmapError::Record(err)) => {
                tracing::warn!(path = %path.display(), error = %err, "Skipping malformed partition row");
                skipped += 1;
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Partition read failed, keeping rows read so far");
                return (records, skipped, false);
            }
        }
    }
    (records, skipped, true)
}

/// Extract every partition under `user_data` into `user_paths`.
///
/// Each partition's path file shares its name stem. A digest-named partition
/// takes its owner from its first record, and the path file records it.
pub fn extract_all(
    user_data: &Path,
    user_paths: &Path,
    delimiter: u8,
    target_action: &str,
) -> TrailmapResult<ExtractStats> {
    let mut stats = ExtractStats::default();
    for UserFile { owner, stem, path } in list_user_files(user_data, FileKind::Partition)? {
        let (records, skipped, readable) = load_partition(&path, delimiter);
        let owner_row = match owner {
            FileOwner::Named(_) => None,
            FileOwner::Digest => records.first().map(|record| record.user.clone()),
        };
        let record_count = records.len();
        let paths = extract_paths(records, target_action);
        write_path_file(
            &user_paths.join(FileKind::Paths.name_for_stem(&stem)),
            owner_row.as_ref(),
            &paths,
        )?;

        tracing::debug!(partition = %stem, records = record_count, paths = paths.len(), "Partition extracted");
        stats.partitions += 1;
        stats.paths += paths.len() as u64;
        stats.skipped_records += skipped;
        if !readable {
            stats.unreadable_partitions += 1;
        }
    }
    Ok(stats)
}

/// Run extraction with checkpoint semantics.
pub fn run_extract(config: &TrailmapConfig) -> TrailmapResult<StageOutcome<ExtractStats>> {
    let out_dir = &config.directories.user_paths;
    match checkpoint::inspect(out_dir, FileKind::Paths)? {
        DirState::Complete(record) => return Ok(Stage::Extract.skipped(&record)),
        DirState::Partial { entries } => Stage::Extract.clearing_partial(out_dir, entries),
        DirState::Empty => {}
    }
    checkpoint::reset(out_dir, FileKind::Paths)?;

    Stage::Extract.started();
    let stats = extract_all(
        &config.directories.user_data,
        out_dir,
        config.delimiter(),
        &config.target_action,
    )?;
    checkpoint::mark_complete(out_dir, Stage::Extract.name(), stats.paths, stats.partitions)?;
    tracing::info!(
        stage = Stage::Extract.name(),
        partitions = stats.partitions,
        paths = stats.paths,
        skipped_records = stats.skipped_records,
        "Path extraction complete"
    );
    Ok(StageOutcome::Ran(stats))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use trailmap_core::UserKey;
    use trailmap_storage::read_path_file;

    fn canon(paths: &[ActionPath]) -> Vec<String> {
        paths.iter().map(ActionPath::canonical).collect()
    }

    fn scan(actions: &[&str]) -> Vec<String> {
        let mut scanner = PathScanner::new("A");
        for a in actions {
            scanner.feed(a);
        }
        canon(&scanner.finish())
    }

    #[test]
    fn test_seeking_ignores_leading_non_triggers() {
        assert_eq!(scan(&["D", "C", "A", "B"]), vec!["A -> B"]);
    }

    #[test]
    fn test_trigger_closes_and_reopens() {
        assert_eq!(scan(&["A", "B", "C", "A", "D"]), vec!["A -> B -> C", "A -> D"]);
    }

    #[test]
    fn test_back_to_back_triggers_discard_single() {
        assert_eq!(scan(&["A", "A", "B"]), vec!["A -> B"]);
        assert_eq!(scan(&["A", "A"]), Vec::<String>::new());
    }

    #[test]
    fn test_trailing_trigger_is_discarded() {
        assert_eq!(scan(&["A", "B", "A"]), vec!["A -> B"]);
    }

    #[test]
    fn test_no_trigger_no_paths() {
        assert!(scan(&["B", "C", "D"]).is_empty());
        assert!(scan(&[]).is_empty());
    }

    #[test]
    fn test_scanner_state_transitions() {
        let mut scanner = PathScanner::new("A");
        assert!(!scanner.is_collecting());
        scanner.feed("B");
        assert!(!scanner.is_collecting());
        scanner.feed("A");
        assert!(scanner.is_collecting());
        scanner.feed("C");
        assert!(scanner.is_collecting());
    }

    #[test]
    fn test_documented_walk_yields_single_path() {
        // t1..t5 = A, B, A, C, D; newest first walks D, C, A, B, A
        let records = vec![
            EventRecord::new("t1", "user1", "A"),
            EventRecord::new("t2", "user1", "B"),
            EventRecord::new("t3", "user1", "A"),
            EventRecord::new("t4", "user1", "C"),
            EventRecord::new("t5", "user1", "D"),
        ];
        assert_eq!(canon(&extract_paths(records, "A")), vec!["A -> B"]);
    }

    #[test]
    fn test_ordering_is_string_comparison() {
        // "9" sorts after "10" as strings
        let mut records = vec![
            EventRecord::new("10", "u", "B"),
            EventRecord::new("9", "u", "A"),
        ];
        order_newest_first(&mut records);
        assert_eq!(records[0].timestamp, "9");
        assert_eq!(canon(&extract_paths(records, "A")), vec!["A -> B"]);
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        let mut records = vec![
            EventRecord::new("t", "u", "X"),
            EventRecord::new("t", "u", "Y"),
            EventRecord::new("u", "u", "Z"),
        ];
        order_newest_first(&mut records);
        let actions: Vec<&str> = records.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["Z", "X", "Y"]);
    }

    #[test]
    fn test_load_partition_skips_malformed_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("u1.csv");
        std::fs::write(&file, "Date;User;Action\nt1;u1;A\nt2;u1;\nt3;u1;B\n").expect("write");
        let (records, skipped, readable) = load_partition(&file, b';');
        assert_eq!(records.len(), 2);
        assert_eq!(skipped, 1);
        assert!(readable);
    }

    #[test]
    fn test_load_partition_empty_file_yields_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("u1.csv");
        std::fs::write(&file, "").expect("write");
        let (records, _, readable) = load_partition(&file, b';');
        assert!(records.is_empty());
        assert!(!readable);
    }

    #[test]
    fn test_extract_all_writes_one_file_per_partition() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data = dir.path().join("user_data");
        let paths = dir.path().join("user_paths");
        std::fs::create_dir_all(&data).expect("mkdir");
        std::fs::create_dir_all(&paths).expect("mkdir");
        std::fs::write(
            data.join("u1.csv"),
            "Date;User;Action\nt1;u1;A\nt2;u1;B\nt3;u1;A\nt4;u1;C\n",
        )
        .expect("write");
        std::fs::write(data.join("u2.csv"), "Date;User;Action\nt1;u2;B\n").expect("write");

        let stats = extract_all(&data, &paths, b';', "A").expect("extract");
        assert_eq!(stats.partitions, 2);
        assert_eq!(stats.paths, 2);
        assert_eq!(
            std::fs::read_to_string(paths.join("u1_paths.csv")).expect("read"),
            "A -> C\nA -> B\n"
        );
        assert_eq!(
            std::fs::read_to_string(paths.join("u2_paths.csv")).expect("read"),
            ""
        );
    }

    #[test]
    fn test_digest_named_partition_records_its_owner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data = dir.path().join("user_data");
        let paths = dir.path().join("user_paths");
        std::fs::create_dir_all(&data).expect("mkdir");

        let user = UserKey::new("ユーザー".repeat(25));
        let partition = FileKind::Partition.path_in(&data, &user);
        std::fs::write(
            &partition,
            format!("Date;User;Action\nt1;{0};A\nt2;{0};B\n", user),
        )
        .expect("write");

        let stats = extract_all(&data, &paths, b';', "A").expect("extract");
        assert_eq!(stats.paths, 1);
        let contents =
            read_path_file(&FileKind::Paths.path_in(&paths, &user)).expect("path file");
        assert_eq!(contents.owner, Some(user));
        assert_eq!(contents.lines, vec!["A -> B"]);
    }
}
