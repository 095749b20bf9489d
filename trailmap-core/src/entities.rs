//! Entity types flowing through the pipeline

use crate::UserKey;
use std::fmt;

/// Separator between actions in the canonical form of an [`ActionPath`].
///
/// Actions are joined unescaped, so an action may not contain the arrow
/// itself; see [`is_path_safe_action`].
pub const PATH_SEPARATOR: &str = " -> ";

/// True when `action` can be joined into a canonical path and split back out
/// unchanged. Every occurrence of the arrow in a canonical path is then a
/// separator.
pub fn is_path_safe_action(action: &str) -> bool {
    !action.contains(PATH_SEPARATOR.trim())
}

/// Header of source and partition files, in column order.
pub const RECORD_HEADER: [&str; 3] = ["Date", "User", "Action"];

// ============================================================================
// EVENT RECORD
// ============================================================================

/// One row of the event log.
///
/// Timestamps stay in their stored string form: ordering is a plain string
/// comparison, so zero-padded ISO-8601-like values sort chronologically while
/// mixed formats do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventRecord {
    pub timestamp: String,
    pub user: UserKey,
    pub action: String,
}

impl EventRecord {
    pub fn new(
        timestamp: impl Into<String>,
        user: impl Into<UserKey>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            user: user.into(),
            action: action.into(),
        }
    }

    /// True when this record's action opens a new path.
    pub fn is_trigger(&self, target_action: &str) -> bool {
        self.action == target_action
    }
}

// ============================================================================
// ACTION PATH
// ============================================================================

/// An ordered run of actions opened by the trigger action.
///
/// Paths are only ever built with at least two actions; anything shorter is
/// discarded by the extractor and rejected by [`ActionPath::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionPath {
    actions: Vec<String>,
}

impl ActionPath {
    /// Minimum number of actions for a path to qualify.
    pub const MIN_LEN: usize = 2;

    /// Build a path from its actions. Returns `None` below [`Self::MIN_LEN`].
    pub fn from_actions(actions: Vec<String>) -> Option<Self> {
        if actions.len() < Self::MIN_LEN {
            return None;
        }
        Some(Self { actions })
    }

    /// Parse the canonical joined form back into actions.
    ///
    /// Lines without a separator, or with an empty segment, are rejected.
    pub fn parse(canonical: &str) -> Option<Self> {
        let actions: Vec<String> = canonical
            .split(PATH_SEPARATOR)
            .map(str::to_string)
            .collect();
        if actions.iter().any(|a| a.is_empty()) {
            return None;
        }
        Self::from_actions(actions)
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// The opening action.
    pub fn head(&self) -> &str {
        &self.actions[0]
    }

    /// Canonical joined form, used as the aggregation key.
    pub fn canonical(&self) -> String {
        self.actions.join(PATH_SEPARATOR)
    }

    /// `(position, action)` pairs with 1-based positions.
    pub fn positions(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.actions
            .iter()
            .enumerate()
            .map(|(idx, action)| (idx + 1, action.as_str()))
    }

    /// Consecutive `(from, to)` action pairs.
    pub fn transitions(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.actions
            .windows(2)
            .map(|pair| (pair[0].as_str(), pair[1].as_str()))
    }
}

impl fmt::Display for ActionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

// ============================================================================
// TESTS
// ============================================================================
