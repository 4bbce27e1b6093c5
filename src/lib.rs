pub mod analyzer;
pub mod db;
pub mod doctor;
pub mod export;
pub mod filter;
pub mod graph;
pub mod models;
pub mod ollama;
pub mod reflection;
pub mod reminder;
pub mod service;
pub mod themes;
pub mod utils;

pub use analyzer::EntryAnalyzer;
pub use db::Database;
pub use filter::{DateFilter, EntryFilter, KindFilter};
pub use graph::{Graph, GraphConfig, GraphEdge, GraphNode, build_graph, build_graph_with};
pub use models::{
    Entry, EntryBuilder, EntryId, EntryKind, EntryMeta, Reflection, ReflectionId, Tone,
};
pub use ollama::{OllamaClient, OllamaClientBuilder, OllamaClientTrait, OllamaError};
pub use reflection::{ReflectError, Reflector};
pub use service::{ListEntriesOptions, SortOrder, VaultService};
pub use themes::{ThemeCount, theme_counts};
