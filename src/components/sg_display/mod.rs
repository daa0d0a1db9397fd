//! Statement graph display.
//!
//! Snapshots pushed by the reasoning service are merged into an [`SgDisplay`]
//! and handed to the viewport as a [`Graph`](super::sg_graph::Graph). The
//! merge keeps every statement that survives a snapshot as the same object,
//! so the viewport keeps its position and collapse state.

mod merge;
pub mod model;

pub use merge::{MergeCounts, MergeOutcome, SgDisplay};
pub use model::{ElementId, SgEdge, Snapshot, Statement, StatementGraph};

use serde_json::{Value, json};

use super::sg_graph::GraphConfig;

/// Layout used for statement graphs: layered, bottom to top.
pub const LAYOUT: &str = "dagre";

pub fn layout_settings() -> Value {
	json!({ "orientation": "BT" })
}

/// Viewport configuration for statement graphs.
pub fn graph_config() -> GraphConfig {
	GraphConfig::statement_display()
}
