//! Transition graph over the aggregated paths.
//!
//! Nodes are every action seen in any path; edges are every ordered pair of
//! adjacent actions. Both are sets, so a transition repeated across many
//! paths renders once. Rendering is PlantUML state-diagram text with nodes
//! then edges, each in sorted order.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use trailmap_core::{ActionPath, TrailmapConfig, TrailmapResult};
use trailmap_storage::{read_table, StagedFile};

use crate::aggregate::{PathAggregate, SUMMARY_HEADER};
use crate::stage::{Stage, StageOutcome};

/// Directed, unweighted action graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionGraph {
    nodes: BTreeSet<String>,
    edges: BTreeSet<(String, String)>,
}

impl TransitionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a ActionPath>) -> Self {
        let mut graph = Self::new();
        for path in paths {
            graph.add_path(path);
        }
        graph
    }

    pub fn add_path(&mut self, path: &ActionPath) {
        for action in path.actions() {
            if !self.nodes.contains(action) {
                self.nodes.insert(action.clone());
            }
        }
        for (from, to) in path.transitions() {
            self.edges.insert((from.to_string(), to.to_string()));
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_edge(&self, from: &str, to: &str) -> bool {
        self.edges.contains(&(from.to_string(), to.to_string()))
    }

    pub fn render_plantuml(&self) -> String {
        let mut out = String::from("@startuml\n");
        for node in &self.nodes {
            let _ = writeln!(out, "state \"{}\" as {}", label(node), alias(node));
        }
        for (from, to) in &self.edges {
            let _ = writeln!(out, "{} --> {}", alias(from), alias(to));
        }
        out.push_str("@enduml\n");
        out
    }
}

/// Identifier-safe alias. ASCII alphanumerics pass through; every other byte,
/// `_` included, becomes `_xHH`, so distinct actions never share an alias.
fn alias(action: &str) -> String {
    let mut out = String::with_capacity(action.len() + 2);
    out.push_str("s_");
    for byte in action.bytes() {
        if byte.is_ascii_alphanumeric() {
            out.push(byte as char);
        } else {
            let _ = write!(out, "_x{:02X}", byte);
        }
    }
    out
}

/// Quoted state label. Quotes become `'` and line breaks are written as
/// escapes so a label never spans more than one line.
fn label(action: &str) -> String {
    let mut out = String::with_capacity(action.len());
    for ch in action.chars() {
        match ch {
            '"' => out.push('\''),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Rebuild the distinct paths from a written summary table.
pub fn paths_from_summary(summary: &Path) -> TrailmapResult<Vec<ActionPath>> {
    let rows = read_table(summary, &SUMMARY_HEADER)?;
    let mut paths = Vec::with_capacity(rows.len());
    for row in rows {
        match row.get(0).and_then(ActionPath::parse) {
            Some(path) => paths.push(path),
            None => {
                tracing::warn!(path = %summary.display(), row = ?row, "Skipping malformed summary row")
            }
        }
    }
    Ok(paths)
}

/// Counters for one render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub nodes: u64,
    pub edges: u64,
}

/// Render the graph. Skipped when the output file exists.
///
/// Uses `aggregate` when the aggregation stage ran in this process, otherwise
/// reads the summary table back.
pub fn run_graph(
    config: &TrailmapConfig,
    aggregate: Option<&PathAggregate>,
) -> TrailmapResult<StageOutcome<GraphStats>> {
    let output = &config.output_files.plantuml;
    if output.exists() {
        return Ok(Stage::Graph.skipped_existing(&[output.as_path()]));
    }

    Stage::Graph.started();
    let graph = match aggregate {
        Some(aggregate) => TransitionGraph::from_paths(aggregate.paths()),
        None => {
            let paths = paths_from_summary(&config.output_files.summary)?;
            TransitionGraph::from_paths(&paths)
        }
    };

    let mut staged = StagedFile::create(output)?;
    staged.write_all(graph.render_plantuml().as_bytes())?;
    staged.commit()?;

    let stats = GraphStats {
        nodes: graph.node_count() as u64,
        edges: graph.edge_count() as u64,
    };
    tracing::info!(
        stage = Stage::Graph.name(),
        nodes = stats.nodes,
        edges = stats.edges,
        output = %output.display(),
        "Graph written"
    );
    Ok(StageOutcome::Ran(stats))
}

// ============================================================================
// TESTS
// ============================================================================
