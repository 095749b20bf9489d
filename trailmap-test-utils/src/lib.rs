//! Trailmap Test Utilities
//!
//! Shared test infrastructure for the trailmap workspace:
//! - Proptest generators for event records, logs and paths
//! - Scratch workspaces with a ready-made configuration
//! - Assertions over the error taxonomy

// Re-export core types for convenience
pub use trailmap_core::{
    ActionPath, ConfigError, CsvConfig, DirectoriesConfig, EventRecord, OutputFilesConfig,
    PartitionConfig, RecordError, StorageError, TrailmapConfig, TrailmapError, TrailmapResult,
    UserKey, PATH_SEPARATOR,
};

use std::path::Path;

/// Trigger action used by fixtures and generators.
pub const TRIGGER: &str = "A";

/// Actions drawn by generators. The trigger is one of them.
pub const ACTIONS: [&str; 5] = ["A", "B", "C", "D", "E"];

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for trailmap inputs.

    use super::*;
    use proptest::prelude::*;

    // === Scalar Generators ===

    /// One of [`ACTIONS`].
    pub fn arb_action() -> impl Strategy<Value = String> {
        prop::sample::select(ACTIONS.to_vec()).prop_map(str::to_string)
    }

    /// A non-trigger action.
    pub fn arb_follow_action() -> impl Strategy<Value = String> {
        prop::sample::select(ACTIONS[1..].to_vec()).prop_map(str::to_string)
    }

    /// A user key, including some that need escaping in file names.
    pub fn arb_user_key() -> impl Strategy<Value = UserKey> {
        prop_oneof![
            4 => (1u32..6).prop_map(|n| UserKey::new(format!("user{}", n))),
            1 => prop::sample::select(vec!["user_6", "ops team", "a/b", ".hidden", "näme"])
                .prop_map(UserKey::from),
        ]
    }

    /// A `YYYY-MM-DD HH:MM:SS` timestamp within one day, so string order
    /// matches time order.
    pub fn arb_timestamp() -> impl Strategy<Value = String> {
        (0u32..24, 0u32..60, 0u32..60)
            .prop_map(|(h, m, s)| format!("2024-03-15 {:02}:{:02}:{:02}", h, m, s))
    }

    // === Record Generators ===

    pub fn arb_event_record() -> impl Strategy<Value = EventRecord> {
        (arb_timestamp(), arb_user_key(), arb_action())
            .prop_map(|(timestamp, user, action)| EventRecord::new(timestamp, user, action))
    }

    /// An interleaved multi-user log.
    pub fn arb_event_log(max_len: usize) -> impl Strategy<Value = Vec<EventRecord>> {
        prop::collection::vec(arb_event_record(), 0..=max_len)
    }

    /// Records for a single user with distinct timestamps.
    pub fn arb_user_log(max_len: usize) -> impl Strategy<Value = Vec<EventRecord>> {
        prop::collection::vec(arb_action(), 0..=max_len).prop_map(|actions| {
            actions
                .into_iter()
                .enumerate()
                .map(|(i, action)| {
                    EventRecord::new(format!("2024-03-15 00:00:{:05}", i), "user1", action)
                })
                .collect()
        })
    }

    // === Path Generators ===

    /// A qualifying path: the trigger followed by one or more other actions.
    pub fn arb_action_path() -> impl Strategy<Value = ActionPath> {
        prop::collection::vec(arb_follow_action(), 1..6).prop_filter_map(
            "path must qualify",
            |rest| {
                let mut actions = vec![TRIGGER.to_string()];
                actions.extend(rest);
                ActionPath::from_actions(actions)
            },
        )
    }

    /// Per-user path lists, as the extractor would write them.
    pub fn arb_user_paths() -> impl Strategy<Value = Vec<(UserKey, Vec<ActionPath>)>> {
        prop::collection::btree_map(
            (1u32..8).prop_map(|n| format!("user{}", n)),
            prop::collection::vec(arb_action_path(), 0..6),
            0..6,
        )
        .prop_map(|users| {
            users
                .into_iter()
                .map(|(user, paths)| (UserKey::new(user), paths))
                .collect()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Scratch directories and canned inputs.

    use super::*;
    use tempfile::TempDir;
    use trailmap_storage::{record_writer, write_record};

    /// Configuration with every path rooted at `root`.
    pub fn config_in(root: &Path) -> TrailmapConfig {
        TrailmapConfig {
            target_action: TRIGGER.to_string(),
            input_file: root.join("input.csv"),
            csv: CsvConfig {
                delimiter: ";".to_string(),
            },
            directories: DirectoriesConfig {
                user_data: root.join("user_data"),
                user_paths: root.join("user_paths"),
            },
            output_files: OutputFilesConfig {
                summary: root.join("paths_summary.csv"),
                detailed: root.join("paths_detailed.csv"),
                plantuml: root.join("paths_graph.puml"),
            },
            partition: PartitionConfig { max_open_files: 4 },
        }
    }

    /// Write `records` as a `;`-delimited source log with header.
    pub fn write_source(path: &Path, records: &[EventRecord]) {
        let file = std::fs::File::create(path).expect("create source file");
        let mut writer = record_writer(file, b';', true, path).expect("source writer");
        for record in records {
            write_record(&mut writer, record, path).expect("write source record");
        }
        writer.flush().expect("flush source file");
    }

    /// The five-row log whose newest-first walk is `D, C, A, B, A`.
    pub fn documented_user1_records() -> Vec<EventRecord> {
        vec![
            EventRecord::new("t1", "user1", "A"),
            EventRecord::new("t2", "user1", "B"),
            EventRecord::new("t3", "user1", "A"),
            EventRecord::new("t4", "user1", "C"),
            EventRecord::new("t5", "user1", "D"),
        ]
    }

    /// A temporary directory paired with a configuration pointing into it.
    pub struct TestWorkspace {
        dir: TempDir,
        pub config: TrailmapConfig,
    }

    impl TestWorkspace {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().expect("create temp dir");
            let config = config_in(dir.path());
            Self { dir, config }
        }

        /// New workspace whose source log holds `records`.
        pub fn with_records(records: &[EventRecord]) -> Self {
            let workspace = Self::new();
            write_source(&workspace.config.input_file, records);
            workspace
        }

        /// New workspace whose source log is `contents` verbatim.
        pub fn with_source_text(contents: &str) -> Self {
            let workspace = Self::new();
            std::fs::write(&workspace.config.input_file, contents).expect("write source");
            workspace
        }

        pub fn root(&self) -> &Path {
            self.dir.path()
        }

        /// Read an output file, panicking if absent.
        pub fn read(&self, path: &Path) -> String {
            std::fs::read_to_string(path)
                .unwrap_or_else(|err| panic!("read {}: {}", path.display(), err))
        }

        /// Every output artifact as `(relative path, bytes)`, sorted by path.
        pub fn snapshot(&self) -> Vec<(String, Vec<u8>)> {
            let mut files = Vec::new();
            collect_files(self.root(), self.root(), &mut files);
            files.sort();
            files
        }
    }

    impl Default for TestWorkspace {
        fn default() -> Self {
            Self::new()
        }
    }

    fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
        let entries = std::fs::read_dir(dir).expect("read_dir");
        for entry in entries {
            let path = entry.expect("dir entry").path();
            if path.is_dir() {
                collect_files(root, &path, out);
            } else if path.file_name().and_then(|n| n.to_str()) != Some(".trailmap-complete") {
                let rel = path
                    .strip_prefix(root)
                    .expect("under root")
                    .display()
                    .to_string();
                out.push((rel, std::fs::read(&path).expect("read file")));
            }
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over [`TrailmapError`] variants.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &TrailmapResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &TrailmapResult<T>) {
        match result {
            Err(TrailmapError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &TrailmapResult<T>) {
        match result {
            Err(TrailmapError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert a malformed-record error naming `field`.
    #[track_caller]
    pub fn assert_missing_field<T: std::fmt::Debug>(result: &TrailmapResult<T>, field: &str) {
        match result {
            Err(TrailmapError::Record(RecordError::MissingField { field: f, .. })) => {
                assert_eq!(*f, field, "Wrong field in MissingField error");
            }
            other => panic!("Expected MissingField({}) error, got: {:?}", field, other),
        }
    }

    /// Assert a malformed-record error for a row that could not be parsed.
    #[track_caller]
    pub fn assert_unparseable<T: std::fmt::Debug>(result: &TrailmapResult<T>) {
        match result {
            Err(TrailmapError::Record(RecordError::Unparseable { .. })) => {}
            other => panic!("Expected Unparseable error, got: {:?}", other),
        }
    }

    /// Assert every path is well-formed for `trigger`.
    #[track_caller]
    pub fn assert_well_formed(path: &ActionPath, trigger: &str) {
        assert!(path.len() >= ActionPath::MIN_LEN, "path too short: {}", path);
        assert_eq!(path.head(), trigger, "path does not start with trigger: {}", path);
        assert!(
            path.actions()[1..].iter().all(|a| a != trigger),
            "trigger inside path: {}",
            path
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
