//! Interactive statement graph viewport.
//!
//! Renders a directed graph of statements on an HTML canvas with:
//! - Pluggable layouts (layered `dagre`, force-directed `d3ForceDirected`)
//! - Pan, anchored zoom, zoom-to-fit and centring
//! - Node dragging with live edge re-routing
//! - Ancestor collapse/expand on double-click and hover highlighting
//!
//! All behaviour lives in [`GraphViewState`], which has no DOM dependency;
//! [`StatementGraphCanvas`] only feeds it input and draws its output.
//!
//! # Example
//!
//! ```ignore
//! use sg_graph::components::sg_graph::{Edge, Graph, Node, StatementGraphCanvas};
//!
//! let graph = Graph::new(
//!     vec![Node::new("a").with_label("Premise"), Node::new("b").with_label("Claim")],
//!     vec![Edge::new("e1", "a", "b")],
//! );
//!
//! view! { <StatementGraphCanvas data=Signal::stored(graph) fullscreen=true /> }
//! ```

mod commands;
mod component;
mod config;
mod layout;
mod line;
mod render;
mod scale;
mod state;
mod theme;
mod transform;
mod types;

pub use commands::{CommandError, CommandSender, ViewCommand};
pub use component::StatementGraphCanvas;
pub use config::GraphConfig;
pub use layout::{Layout, LayoutError, LayoutKind, LayoutRegistry, LayoutRun, create_layout};
pub use state::{GraphViewState, NodeMeasurement, NodeMeasurer, ZoomDirection};
pub use line::Curve;
pub use theme::Theme;
pub use transform::Matrix;
pub use types::{Dimension, DominantBaseline, Edge, Graph, Node, Point};
