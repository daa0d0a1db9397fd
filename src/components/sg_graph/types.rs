//! Graph data structures shared by the layouts, the viewport controller and
//! the renderer.
//!
//! Nodes and edges are plain records keyed by `id`. Edges reference their
//! endpoints by id, so every lookup goes through [`Graph::node`] and a
//! dangling reference simply yields `None`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A point in graph space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	pub fn is_finite(&self) -> bool {
		self.x.is_finite() && self.y.is_finite()
	}
}

/// Width and height of a rendered node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
	pub width: f64,
	pub height: f64,
}

impl Dimension {
	pub const fn new(width: f64, height: f64) -> Self {
		Self { width, height }
	}
}

/// Which side of an edge path its label text hangs from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DominantBaseline {
	#[default]
	TextAfterEdge,
	TextBeforeEdge,
}

impl DominantBaseline {
	/// Equivalent canvas `textBaseline`: text after the edge hangs below it.
	pub fn canvas_baseline(self) -> &'static str {
		match self {
			DominantBaseline::TextAfterEdge => "top",
			DominantBaseline::TextBeforeEdge => "bottom",
		}
	}
}

/// A node in the displayed graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
	/// Unique identifier within a [`Graph`].
	pub id: String,
	/// Display label. Nodes with a label are sized to their text.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	/// Centre of the node, set by a layout run.
	#[serde(default)]
	pub position: Option<Point>,
	/// Measured or defaulted size. Always present before a position is computed.
	#[serde(default)]
	pub dimension: Option<Dimension>,
	#[serde(skip)]
	pub transform: Option<String>,
	#[serde(skip)]
	pub old_transform: Option<String>,
	#[serde(default)]
	pub collapsed: bool,
	#[serde(default)]
	pub unhighlight: bool,
	/// Opaque payload carried through to the renderer.
	#[serde(default)]
	pub data: Value,
}

impl Node {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			..Self::default()
		}
	}

	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	/// SVG-style translation that puts the node's top-left corner in place.
	pub fn render_transform(&self) -> Option<String> {
		let (position, dimension) = (self.position?, self.dimension?);
		let x = position.x - dimension.width / 2.0;
		let y = position.y - dimension.height / 2.0;
		Some(format!(
			"translate({}, {})",
			if x.is_finite() { x } else { 0.0 },
			if y.is_finite() { y } else { 0.0 }
		))
	}

	/// Whether `point` lies inside the node's box.
	pub fn contains(&self, point: Point) -> bool {
		let (Some(position), Some(dimension)) = (self.position, self.dimension) else {
			return false;
		};
		(point.x - position.x).abs() <= dimension.width / 2.0
			&& (point.y - position.y).abs() <= dimension.height / 2.0
	}

	/// Value of a string field in the opaque payload, e.g. the statement type.
	pub fn data_str(&self, key: &str) -> Option<&str> {
		self.data.get(key).and_then(Value::as_str)
	}
}

/// A directed edge between two nodes, referenced by id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
	pub id: String,
	pub source: String,
	pub target: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	/// Route from source to target, set by a layout run.
	#[serde(default)]
	pub points: Option<Vec<Point>>,
	#[serde(skip)]
	pub line: Option<String>,
	#[serde(skip)]
	pub old_line: Option<String>,
	#[serde(skip)]
	pub text_path: Option<String>,
	#[serde(skip)]
	pub old_text_path: Option<String>,
	#[serde(skip)]
	pub dominant_baseline: DominantBaseline,
	#[serde(default)]
	pub collapsed: bool,
	#[serde(default)]
	pub unhighlight: bool,
	#[serde(default)]
	pub data: Value,
}

impl Edge {
	pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			source: source.into(),
			target: target.into(),
			..Self::default()
		}
	}

	pub fn touches(&self, node_id: &str) -> bool {
		self.source == node_id || self.target == node_id
	}
}

/// The nodes and edges currently displayed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
	pub nodes: Vec<Node>,
	pub edges: Vec<Edge>,
}

impl Graph {
	pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
		Self { nodes, edges }
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty() && self.edges.is_empty()
	}

	pub fn node(&self, id: &str) -> Option<&Node> {
		self.nodes.iter().find(|n| n.id == id)
	}

	pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
		self.nodes.iter_mut().find(|n| n.id == id)
	}

	pub fn edge(&self, id: &str) -> Option<&Edge> {
		self.edges.iter().find(|e| e.id == id)
	}

	pub fn edge_mut(&mut self, id: &str) -> Option<&mut Edge> {
		self.edges.iter_mut().find(|e| e.id == id)
	}

	/// Ids of the edges with `node_id` as source or target.
	pub fn edges_touching(&self, node_id: &str) -> Vec<String> {
		self.edges
			.iter()
			.filter(|e| e.touches(node_id))
			.map(|e| e.id.clone())
			.collect()
	}

	/// Every node reachable from `node_id` by walking edges backwards
	/// (target to source), in discovery order. The start node is only
	/// included when it sits on a cycle back to itself.
	pub fn ancestors(&self, node_id: &str) -> Vec<String> {
		let mut sources_by_target: HashMap<&str, Vec<&str>> = HashMap::new();
		for edge in &self.edges {
			sources_by_target
				.entry(edge.target.as_str())
				.or_default()
				.push(edge.source.as_str());
		}

		let mut visited: HashSet<&str> = HashSet::new();
		let mut found = Vec::new();
		let mut stack = vec![node_id];
		while let Some(current) = stack.pop() {
			let Some(sources) = sources_by_target.get(current) else {
				continue;
			};
			for &source in sources {
				if visited.insert(source) {
					found.push(source.to_string());
					stack.push(source);
				}
			}
		}
		found
	}

	/// Copies the geometry of a layout frame onto the matching elements by id.
	///
	/// UI state (collapse, highlight, cached paths) is left alone. Returns the
	/// number of frame elements that had no counterpart in this graph.
	pub fn apply_layout(&mut self, frame: &Graph) -> usize {
		let mut unmatched = 0;

		let node_slots: HashMap<&str, usize> = frame
			.nodes
			.iter()
			.enumerate()
			.map(|(i, n)| (n.id.as_str(), i))
			.collect();
		let mut matched_nodes = 0;
		for node in &mut self.nodes {
			let Some(&slot) = node_slots.get(node.id.as_str()) else {
				continue;
			};
			matched_nodes += 1;
			let laid_out = &frame.nodes[slot];
			if let Some(position) = laid_out.position {
				node.position = Some(position);
			}
			if let Some(dimension) = laid_out.dimension {
				node.dimension = Some(dimension);
			}
		}
		unmatched += frame.nodes.len().saturating_sub(matched_nodes);

		let edge_slots: HashMap<&str, usize> = frame
			.edges
			.iter()
			.enumerate()
			.map(|(i, e)| (e.id.as_str(), i))
			.collect();
		let mut matched_edges = 0;
		for edge in &mut self.edges {
			let Some(&slot) = edge_slots.get(edge.id.as_str()) else {
				continue;
			};
			matched_edges += 1;
			if let Some(points) = &frame.edges[slot].points {
				edge.points = Some(points.clone());
			}
		}
		unmatched += frame.edges.len().saturating_sub(matched_edges);

		unmatched
	}

	/// Furthest right/bottom extent of all positioned nodes.
	pub fn extent(&self) -> Dimension {
		let mut extent = Dimension::new(0.0, 0.0);
		let mut any = false;
		for node in &self.nodes {
			let (Some(position), Some(dimension)) = (node.position, node.dimension) else {
				continue;
			};
			let right = position.x + dimension.width;
			let bottom = position.y + dimension.height;
			if !any {
				extent = Dimension::new(right, bottom);
				any = true;
			} else {
				extent.width = extent.width.max(right);
				extent.height = extent.height.max(bottom);
			}
		}
		extent
	}
}
