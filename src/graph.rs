//! Thematic connection graph.
//!
//! Turns a list of analyzed entries into nodes and a pruned set of weighted,
//! undirected edges connecting entries that share theme labels. The output
//! is renderer-agnostic; layout and styling belong to whoever draws it.
//!
//! # Pruning
//!
//! Every pair of eligible entries sharing at least one theme is a candidate
//! edge weighted by the number of distinct shared labels. Each node ranks
//! its candidates by weight (stable over pair-generation order) and keeps
//! its top `max_links_per_node`. An edge survives if *either* endpoint kept
//! it, so a node's single strong tie is never dropped just because the
//! partner has stronger ties elsewhere.
//!
//! Ties between equal-weight candidates resolve by pair-generation order,
//! which follows the input order. Callers that need a specific tie order
//! should sort their entries first.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::{Entry, EntryId};

/// Default number of strongest candidate edges each node keeps.
pub const MAX_LINKS_PER_NODE: usize = 5;

/// Maximum node label length in characters, before the ellipsis.
pub const LABEL_MAX_CHARS: usize = 80;

/// Tunables for graph construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphConfig {
    /// How many strongest candidate edges each node admits.
    pub max_links_per_node: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_links_per_node: MAX_LINKS_PER_NODE,
        }
    }
}

/// One node per entry carrying at least one theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: EntryId,
    /// Whitespace-collapsed, length-capped preview of the entry text.
    pub label: String,
    pub themes: Vec<String>,
    /// Size hint for renderers: the theme count, at least 1.
    #[serde(rename = "val")]
    pub weight: usize,
}

impl GraphNode {
    fn from_entry(entry: &Entry) -> Self {
        let themes = entry.themes().to_vec();
        Self {
            id: entry.id.clone(),
            label: node_label(&entry.text),
            weight: themes.len().max(1),
            themes,
        }
    }
}

/// Undirected edge between two nodes; `source` always sorts before `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub source: EntryId,
    pub target: EntryId,
    /// Number of distinct theme labels both endpoints carry.
    #[serde(rename = "value")]
    pub weight: usize,
}

impl GraphEdge {
    fn between(a: &EntryId, b: &EntryId, weight: usize) -> Self {
        let (source, target) = if a <= b { (a, b) } else { (b, a) };
        Self {
            source: source.clone(),
            target: target.clone(),
            weight,
        }
    }

    /// Returns true if the edge touches the given node.
    pub fn touches(&self, id: &EntryId) -> bool {
        &self.source == id || &self.target == id
    }
}

/// Render-ready graph data.
///
/// Serializes as `{"nodes": [...], "links": [...]}` with `val`/`value`
/// weights, the shape force-directed graph renderers consume directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    #[serde(rename = "links")]
    pub edges: Vec<GraphEdge>,
}

impl Graph {
    /// True when there is nothing worth drawing: fewer than two nodes or no edges.
    pub fn is_sparse(&self) -> bool {
        self.nodes.len() < 2 || self.edges.is_empty()
    }

    /// Number of output edges touching the given node.
    pub fn degree(&self, id: &EntryId) -> usize {
        self.edges.iter().filter(|edge| edge.touches(id)).count()
    }

    pub fn node(&self, id: &EntryId) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| &node.id == id)
    }
}

/// A candidate edge, by index into the eligible entry list.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    a: usize,
    b: usize,
    shared: usize,
}

/// Builds the thematic graph with the default per-node link cap.
///
/// # Examples
///
/// ```
/// use vaulta::EntryBuilder;
/// use vaulta::graph::build_graph;
///
/// let entries = vec![
///     EntryBuilder::new().id("a").text("first").themes(["x", "y"]).build(),
///     EntryBuilder::new().id("b").text("second").themes(["x"]).build(),
///     EntryBuilder::new().id("c").text("third").build(),
/// ];
///
/// let graph = build_graph(&entries);
/// assert_eq!(graph.nodes.len(), 2);
/// assert_eq!(graph.edges.len(), 1);
/// assert_eq!(graph.edges[0].weight, 1);
/// ```
pub fn build_graph(entries: &[Entry]) -> Graph {
    build_graph_with(entries, &GraphConfig::default())
}

/// Builds the thematic graph with an explicit configuration.
pub fn build_graph_with(entries: &[Entry], config: &GraphConfig) -> Graph {
    // First occurrence wins when ids repeat.
    let mut seen = HashSet::new();
    let eligible: Vec<&Entry> = entries
        .iter()
        .filter(|entry| !entry.themes().is_empty())
        .filter(|entry| seen.insert(&entry.id))
        .collect();

    let nodes: Vec<GraphNode> = eligible.iter().map(|e| GraphNode::from_entry(e)).collect();

    let theme_sets: Vec<HashSet<&str>> = eligible
        .iter()
        .map(|entry| entry.themes().iter().map(String::as_str).collect())
        .collect();

    let mut candidates: Vec<Candidate> = Vec::new();
    // Candidate indices touching each node, in generation order.
    let mut touching: Vec<Vec<usize>> = vec![Vec::new(); eligible.len()];

    for a in 0..eligible.len() {
        for b in (a + 1)..eligible.len() {
            let shared = theme_sets[a].intersection(&theme_sets[b]).count();
            if shared > 0 {
                let index = candidates.len();
                candidates.push(Candidate { a, b, shared });
                touching[a].push(index);
                touching[b].push(index);
            }
        }
    }

    let mut keep = vec![false; candidates.len()];
    for list in &mut touching {
        // sort_by is stable, so equal weights keep generation order
        list.sort_by(|&x, &y| candidates[y].shared.cmp(&candidates[x].shared));
        for &index in list.iter().take(config.max_links_per_node) {
            keep[index] = true;
        }
    }

    let edges: Vec<GraphEdge> = candidates
        .iter()
        .zip(&keep)
        .filter(|(_, kept)| **kept)
        .map(|(c, _)| GraphEdge::between(&eligible[c.a].id, &eligible[c.b].id, c.shared))
        .collect();

    tracing::debug!(
        nodes = nodes.len(),
        candidates = candidates.len(),
        edges = edges.len(),
        max_links_per_node = config.max_links_per_node,
        "built thematic graph"
    );

    Graph { nodes, edges }
}

/// Produces a single-line preview of entry text for use as a node label.
///
/// Trims, collapses whitespace runs to a single space and caps the result
/// at [`LABEL_MAX_CHARS`] characters, appending `…` when truncated.
///
/// ```
/// use vaulta::graph::node_label;
///
/// assert_eq!(node_label("  two\n\nlines  "), "two lines");
/// ```
pub fn node_label(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > LABEL_MAX_CHARS {
        let mut label: String = collapsed.chars().take(LABEL_MAX_CHARS).collect();
        label.push('…');
        label
    } else {
        collapsed
    }
}
