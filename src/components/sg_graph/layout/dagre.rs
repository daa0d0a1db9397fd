//! Layered (Sugiyama-style) layout for mostly-acyclic graphs.
//!
//! Phases:
//!   1. Cycle breaking (DFS back edges or greedy feedback arc set)
//!   2. Rank assignment (longest path, optionally tightened/balanced)
//!   3. Dummy nodes for edges spanning several ranks
//!   4. Crossing reduction (barycenter sweeps, best ordering kept)
//!   5. Coordinate assignment (alignment-biased median passes)
//!   6. Edge routing (dummy chain clipped to the endpoint boxes)
//!
//! Everything runs in a top-to-bottom frame; other orientations are produced
//! by rotating the result. Iteration follows input order throughout, so the
//! same graph and settings always produce the same geometry.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsEvent, depth_first_search};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Layout, LayoutError, LayoutRun};
use crate::components::sg_graph::types::{Dimension, Edge, Graph, Node, Point};

const DEFAULT_NODE_WIDTH: f64 = 20.0;
const DEFAULT_NODE_HEIGHT: f64 = 30.0;
/// Upper bound on ordering sweeps.
const MAX_ORDER_SWEEPS: usize = 24;
/// Sweeps without improvement before ordering stops.
const MAX_STALE_SWEEPS: usize = 4;
const MAX_RANK_PASSES: usize = 64;
const COORDINATE_PASSES: usize = 8;
const SELF_LOOP_REACH: f64 = 20.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
	#[default]
	#[serde(rename = "LR")]
	LeftToRight,
	#[serde(rename = "RL")]
	RightToLeft,
	#[serde(rename = "TB")]
	TopToBottom,
	#[serde(rename = "BT")]
	BottomToTop,
}

impl Orientation {
	fn is_horizontal(self) -> bool {
		matches!(self, Orientation::LeftToRight | Orientation::RightToLeft)
	}

	/// Maps a point from the top-to-bottom working frame.
	fn orient(self, p: Point) -> Point {
		match self {
			Orientation::TopToBottom => p,
			Orientation::BottomToTop => Point::new(p.x, -p.y),
			Orientation::LeftToRight => Point::new(p.y, p.x),
			Orientation::RightToLeft => Point::new(-p.y, p.x),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
	#[serde(rename = "C")]
	Center,
	#[serde(rename = "UL")]
	UpLeft,
	#[serde(rename = "UR")]
	UpRight,
	#[serde(rename = "DL")]
	DownLeft,
	#[serde(rename = "DR")]
	DownRight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acyclicer {
	Greedy,
	Dfs,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ranker {
	#[default]
	NetworkSimplex,
	TightTree,
	LongestPath,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DagreSettings {
	pub orientation: Orientation,
	pub margin_x: f64,
	pub margin_y: f64,
	/// Separation between edge routes within a rank.
	pub edge_padding: f64,
	/// Separation between ranks.
	pub rank_padding: f64,
	/// Separation between nodes within a rank.
	pub node_padding: f64,
	pub align: Option<Alignment>,
	/// Cycle breaking strategy; DFS when unset.
	pub acyclicer: Option<Acyclicer>,
	pub ranker: Ranker,
}

impl Default for DagreSettings {
	fn default() -> Self {
		Self {
			orientation: Orientation::LeftToRight,
			margin_x: 20.0,
			margin_y: 20.0,
			edge_padding: 100.0,
			rank_padding: 100.0,
			node_padding: 50.0,
			align: None,
			acyclicer: None,
			ranker: Ranker::NetworkSimplex,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bias {
	Left,
	Right,
	Balanced,
}

/// A real node or a routing dummy in the layered working graph.
#[derive(Clone, Debug)]
struct LayerNode {
	/// Position in `Graph::nodes`; `None` for dummies.
	source: Option<usize>,
	width: f64,
	height: f64,
	rank: usize,
	x: f64,
	y: f64,
}

impl LayerNode {
	fn center(&self) -> Point {
		Point::new(self.x, self.y)
	}
}

/// Layer nodes an edge passes through, tail first in rank order.
struct Route {
	edge: usize,
	reversed: bool,
	chain: Vec<usize>,
}

/// Deterministic layered layout.
#[derive(Clone, Debug, Default)]
pub struct DagreLayout {
	pub settings: DagreSettings,
}

impl DagreLayout {
	pub fn new(settings: DagreSettings) -> Self {
		Self { settings }
	}

	/// Computes the complete layout of `graph` synchronously.
	pub fn compute(&self, graph: &Graph, ignore_collapsed: bool) -> Graph {
		let orientation = self.settings.orientation;
		let mut output = graph.clone();

		// Internal multigraph over visible nodes. Weights point back into `graph`.
		let mut dag: DiGraph<usize, usize> = DiGraph::new();
		let mut slots: HashMap<&str, NodeIndex> = HashMap::new();
		let mut real_sizes: Vec<Dimension> = Vec::new();
		for (i, node) in graph.nodes.iter().enumerate() {
			if ignore_collapsed && node.collapsed {
				continue;
			}
			if slots.contains_key(node.id.as_str()) {
				warn!("dagre: duplicate node id '{}' ignored", node.id);
				continue;
			}
			slots.insert(node.id.as_str(), dag.add_node(i));
			real_sizes.push(node_size(node));
		}
		if dag.node_count() == 0 {
			return output;
		}

		let mut links: Vec<(NodeIndex, NodeIndex, usize)> = Vec::new();
		let mut self_loops: Vec<(usize, NodeIndex)> = Vec::new();
		for (i, edge) in graph.edges.iter().enumerate() {
			if ignore_collapsed && edge.collapsed {
				continue;
			}
			let (Some(&source), Some(&target)) = (
				slots.get(edge.source.as_str()),
				slots.get(edge.target.as_str()),
			) else {
				debug!("dagre: edge '{}' references a missing node, skipped", edge.id);
				continue;
			};
			if source == target {
				self_loops.push((i, source));
			} else {
				links.push((source, target, i));
			}
		}

		let reversed = match self.settings.acyclicer {
			Some(Acyclicer::Greedy) => greedy_reversals(dag.node_count(), &links),
			Some(Acyclicer::Dfs) | None => dfs_reversals(dag.node_count(), &links),
		};
		for (k, &(source, target, i)) in links.iter().enumerate() {
			if reversed[k] {
				dag.add_edge(target, source, i);
			} else {
				dag.add_edge(source, target, i);
			}
		}

		let ranks = assign_ranks(&dag, self.settings.ranker);

		let mut nodes: Vec<LayerNode> = real_sizes
			.iter()
			.enumerate()
			.map(|(k, size)| {
				let (width, height) = if orientation.is_horizontal() {
					(size.height, size.width)
				} else {
					(size.width, size.height)
				};
				LayerNode {
					source: Some(dag[NodeIndex::new(k)]),
					width,
					height,
					rank: ranks[k],
					x: 0.0,
					y: 0.0,
				}
			})
			.collect();

		let mut routes = Vec::with_capacity(links.len());
		let mut segments: Vec<(usize, usize)> = Vec::new();
		for (k, &(source, target, i)) in links.iter().enumerate() {
			let (tail, head) = if reversed[k] {
				(target.index(), source.index())
			} else {
				(source.index(), target.index())
			};
			let mut chain = vec![tail];
			for rank in ranks[tail] + 1..ranks[head] {
				chain.push(nodes.len());
				nodes.push(LayerNode {
					source: None,
					width: 0.0,
					height: 0.0,
					rank,
					x: 0.0,
					y: 0.0,
				});
			}
			chain.push(head);
			segments.extend(chain.windows(2).map(|pair| (pair[0], pair[1])));
			routes.push(Route {
				edge: i,
				reversed: reversed[k],
				chain,
			});
		}

		let rank_count = ranks.iter().copied().max().unwrap_or(0) + 1;
		let mut up: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
		let mut down: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
		for &(upper, lower) in &segments {
			down[upper].push(lower);
			up[lower].push(upper);
		}

		let layers = order_layers(&nodes, &up, &down, rank_count);
		self.assign_y(&mut nodes, &layers);
		self.assign_x(&mut nodes, &layers, &up, &down);

		// Routes in the working frame.
		let mut edge_points: Vec<(usize, Vec<Point>)> = Vec::with_capacity(routes.len());
		for route in &routes {
			let (Some(&first), Some(&last)) = (route.chain.first(), route.chain.last()) else {
				continue;
			};
			let (tail, head) = (&nodes[first], &nodes[last]);
			let inner: Vec<Point> = route.chain[1..route.chain.len() - 1]
				.iter()
				.map(|&d| nodes[d].center())
				.collect();
			let mut points = Vec::with_capacity(inner.len() + 2);
			points.push(intersect_rect(
				tail,
				inner.first().copied().unwrap_or_else(|| head.center()),
			));
			points.extend(inner.iter().copied());
			points.push(intersect_rect(
				head,
				inner.last().copied().unwrap_or_else(|| tail.center()),
			));
			if route.reversed {
				points.reverse();
			}
			edge_points.push((route.edge, points));
		}
		for &(i, node) in &self_loops {
			let n = &nodes[node.index()];
			let right = n.x + n.width / 2.0;
			edge_points.push((
				i,
				vec![
					Point::new(right, n.y - n.height / 4.0),
					Point::new(right + SELF_LOOP_REACH, n.y - n.height / 2.0),
					Point::new(right + SELF_LOOP_REACH, n.y + n.height / 2.0),
					Point::new(right, n.y + n.height / 4.0),
				],
			));
		}

		// Rotate into the requested orientation, then shift onto the margins.
		let positions: Vec<Point> = (0..dag.node_count())
			.map(|k| orientation.orient(nodes[k].center()))
			.collect();
		for (_, points) in &mut edge_points {
			for p in points.iter_mut() {
				*p = orientation.orient(*p);
			}
		}

		let mut min_x = f64::INFINITY;
		let mut min_y = f64::INFINITY;
		for (p, size) in positions.iter().zip(&real_sizes) {
			min_x = min_x.min(p.x - size.width / 2.0);
			min_y = min_y.min(p.y - size.height / 2.0);
		}
		for (_, points) in &edge_points {
			for p in points {
				min_x = min_x.min(p.x);
				min_y = min_y.min(p.y);
			}
		}
		let dx = self.settings.margin_x - min_x;
		let dy = self.settings.margin_y - min_y;

		for (k, p) in positions.into_iter().enumerate() {
			let node = &mut output.nodes[dag[NodeIndex::new(k)]];
			node.position = Some(Point::new(p.x + dx, p.y + dy));
			node.dimension = Some(real_sizes[k]);
		}
		for (i, points) in edge_points {
			output.edges[i].points = Some(
				points
					.into_iter()
					.map(|p| Point::new(p.x + dx, p.y + dy))
					.collect(),
			);
		}

		output
	}

	fn assign_y(&self, nodes: &mut [LayerNode], layers: &[Vec<usize>]) {
		let mut y = 0.0;
		let mut previous_height = 0.0;
		for (r, layer) in layers.iter().enumerate() {
			let height = layer
				.iter()
				.map(|&v| nodes[v].height)
				.fold(0.0, f64::max);
			y = if r == 0 {
				height / 2.0
			} else {
				y + previous_height / 2.0 + self.settings.rank_padding + height / 2.0
			};
			for &v in layer {
				nodes[v].y = y;
			}
			previous_height = height;
		}
	}

	fn separation(&self, left: &LayerNode, right: &LayerNode) -> f64 {
		let padding = |n: &LayerNode| {
			if n.source.is_some() {
				self.settings.node_padding
			} else {
				self.settings.edge_padding
			}
		};
		left.width / 2.0 + padding(left) / 2.0 + padding(right) / 2.0 + right.width / 2.0
	}

	fn assign_x(
		&self,
		nodes: &mut [LayerNode],
		layers: &[Vec<usize>],
		up: &[Vec<usize>],
		down: &[Vec<usize>],
	) {
		// Packed start, each layer centred on zero.
		for layer in layers {
			let mut x = 0.0;
			for (i, &v) in layer.iter().enumerate() {
				if i > 0 {
					x += self.separation(&nodes[layer[i - 1]], &nodes[v]);
				}
				nodes[v].x = x;
			}
			let shift = x / 2.0;
			for &v in layer {
				nodes[v].x -= shift;
			}
		}

		let (fixed_upper, bias) = match self.settings.align {
			Some(Alignment::UpLeft) => (Some(true), Bias::Left),
			Some(Alignment::UpRight) => (Some(true), Bias::Right),
			Some(Alignment::DownLeft) => (Some(false), Bias::Left),
			Some(Alignment::DownRight) => (Some(false), Bias::Right),
			Some(Alignment::Center) | None => (None, Bias::Balanced),
		};

		for pass in 0..COORDINATE_PASSES {
			let use_upper = fixed_upper.unwrap_or(pass % 2 == 0);
			let sweep: Vec<usize> = if use_upper {
				(1..layers.len()).collect()
			} else {
				(0..layers.len().saturating_sub(1)).rev().collect()
			};
			let neighbors = if use_upper { up } else { down };
			for r in sweep {
				let layer = &layers[r];
				let desired: Vec<f64> = layer
					.iter()
					.map(|&v| median(neighbors[v].iter().map(|&w| nodes[w].x)).unwrap_or(nodes[v].x))
					.collect();
				let placed = self.place_layer(nodes, layer, &desired, bias);
				for (&v, x) in layer.iter().zip(placed) {
					nodes[v].x = x;
				}
			}
		}
	}

	/// Moves a layer towards `desired` while keeping its order and spacing.
	fn place_layer(
		&self,
		nodes: &[LayerNode],
		layer: &[usize],
		desired: &[f64],
		bias: Bias,
	) -> Vec<f64> {
		let pack_left = || {
			let mut xs: Vec<f64> = Vec::with_capacity(layer.len());
			for (i, &v) in layer.iter().enumerate() {
				let x = match xs.last() {
					Some(&prev) => desired[i].max(prev + self.separation(&nodes[layer[i - 1]], &nodes[v])),
					None => desired[i],
				};
				xs.push(x);
			}
			xs
		};
		let pack_right = || {
			let mut xs = vec![0.0; layer.len()];
			for i in (0..layer.len()).rev() {
				xs[i] = if i + 1 < layer.len() {
					desired[i].min(xs[i + 1] - self.separation(&nodes[layer[i]], &nodes[layer[i + 1]]))
				} else {
					desired[i]
				};
			}
			xs
		};
		match bias {
			Bias::Left => pack_left(),
			Bias::Right => pack_right(),
			Bias::Balanced => pack_left()
				.into_iter()
				.zip(pack_right())
				.map(|(l, r)| (l + r) / 2.0)
				.collect(),
		}
	}
}

impl Layout for DagreLayout {
	fn name(&self) -> &'static str {
		"dagre"
	}

	fn apply_settings(&mut self, settings: &Value) -> Result<(), LayoutError> {
		self.settings = if settings.is_null() {
			DagreSettings::default()
		} else {
			serde_json::from_value(settings.clone()).map_err(|source| {
				LayoutError::InvalidSettings {
					layout: "dagre",
					source,
				}
			})?
		};
		Ok(())
	}

	fn run(&mut self, graph: &Graph, ignore_collapsed: bool) -> LayoutRun {
		LayoutRun::once(self.compute(graph, ignore_collapsed))
	}

	/// Straight two-point route between the endpoints, leaving and entering
	/// through the facing sides of the two boxes.
	fn update_edge(&mut self, graph: &Graph, edge: &Edge) -> LayoutRun {
		let (Some(source), Some(target)) = (graph.node(&edge.source), graph.node(&edge.target)) else {
			warn!("dagre: cannot re-route edge '{}', endpoint missing", edge.id);
			return LayoutRun::empty();
		};
		let (Some(from), Some(to)) = (source.position, target.position) else {
			warn!("dagre: cannot re-route edge '{}', endpoint not positioned", edge.id);
			return LayoutRun::empty();
		};
		let height = |n: &Node| n.dimension.map_or(DEFAULT_NODE_HEIGHT, |d| d.height);

		let dir = if from.y <= to.y { -1.0 } else { 1.0 };
		let start = Point::new(from.x, from.y - dir * height(source) / 2.0);
		let end = Point::new(to.x, to.y + dir * height(target) / 2.0);

		let mut routed = edge.clone();
		routed.points = Some(vec![start, end]);
		LayoutRun::once(Graph::new(Vec::new(), vec![routed]))
	}
}

fn node_size(node: &Node) -> Dimension {
	let dimension = node.dimension.unwrap_or(Dimension::new(0.0, 0.0));
	let positive = |v: f64, fallback: f64| if v > 0.0 && v.is_finite() { v } else { fallback };
	Dimension::new(
		positive(dimension.width, DEFAULT_NODE_WIDTH),
		positive(dimension.height, DEFAULT_NODE_HEIGHT),
	)
}

fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
	let mut values: Vec<f64> = values.collect();
	if values.is_empty() {
		return None;
	}
	values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
	let mid = values.len() / 2;
	Some(if values.len() % 2 == 0 {
		(values[mid - 1] + values[mid]) / 2.0
	} else {
		values[mid]
	})
}

/// Point where the segment from the centre of `node` to `toward` leaves its box.
fn intersect_rect(node: &LayerNode, toward: Point) -> Point {
	let (dx, dy) = (toward.x - node.x, toward.y - node.y);
	if dx == 0.0 && dy == 0.0 {
		return node.center();
	}
	let (mut w, mut h) = (node.width / 2.0, node.height / 2.0);
	let (sx, sy) = if dy.abs() * w > dx.abs() * h {
		if dy < 0.0 {
			h = -h;
		}
		(h * dx / dy, h)
	} else {
		if dx < 0.0 {
			w = -w;
		}
		(w, w * dy / dx)
	};
	Point::new(node.x + sx, node.y + sy)
}

/// Marks the links closing a cycle during a depth-first traversal.
fn dfs_reversals(node_count: usize, links: &[(NodeIndex, NodeIndex, usize)]) -> Vec<bool> {
	let mut walk: DiGraph<(), ()> = DiGraph::with_capacity(node_count, links.len());
	for _ in 0..node_count {
		walk.add_node(());
	}
	for &(source, target, _) in links {
		walk.add_edge(source, target, ());
	}

	let mut back_edges: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
	depth_first_search(&walk, walk.node_indices(), |event| {
		if let DfsEvent::BackEdge(u, v) = event {
			back_edges.insert((u, v));
		}
	});
	links
		.iter()
		.map(|&(source, target, _)| back_edges.contains(&(source, target)))
		.collect()
}

/// Greedy feedback arc set (Eades, Lin & Smyth): peel sinks and sources,
/// otherwise take the node with the largest out-in surplus. Links pointing
/// backwards in the resulting sequence are reversed.
fn greedy_reversals(node_count: usize, links: &[(NodeIndex, NodeIndex, usize)]) -> Vec<bool> {
	let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); node_count];
	let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); node_count];
	for &(source, target, _) in links {
		outgoing[source.index()].push(target.index());
		incoming[target.index()].push(source.index());
	}
	let mut out_degree: Vec<i64> = outgoing.iter().map(|o| o.len() as i64).collect();
	let mut in_degree: Vec<i64> = incoming.iter().map(|i| i.len() as i64).collect();
	let mut removed = vec![false; node_count];

	let mut head: Vec<usize> = Vec::new();
	let mut tail: Vec<usize> = Vec::new();
	loop {
		let sink = (0..node_count).find(|&v| !removed[v] && out_degree[v] == 0);
		let source = (0..node_count).find(|&v| !removed[v] && in_degree[v] == 0);
		let v = if let Some(v) = sink {
			tail.push(v);
			v
		} else if let Some(v) = source {
			head.push(v);
			v
		} else {
			let Some(v) = (0..node_count).filter(|&v| !removed[v]).max_by(|&a, &b| {
				(out_degree[a] - in_degree[a])
					.cmp(&(out_degree[b] - in_degree[b]))
					.then(b.cmp(&a))
			}) else {
				break;
			};
			head.push(v);
			v
		};

		removed[v] = true;
		for &w in &outgoing[v] {
			in_degree[w] -= 1;
		}
		for &u in &incoming[v] {
			out_degree[u] -= 1;
		}
	}

	let mut sequence = vec![0usize; node_count];
	for (position, v) in head.into_iter().chain(tail.into_iter().rev()).enumerate() {
		sequence[v] = position;
	}
	links
		.iter()
		.map(|&(source, target, _)| sequence[source.index()] > sequence[target.index()])
		.collect()
}

/// Ranks every node so each edge points at least one rank down. Ranks start at 0.
fn assign_ranks(dag: &DiGraph<usize, usize>, ranker: Ranker) -> Vec<usize> {
	let order: Vec<NodeIndex> = match toposort(dag, None) {
		Ok(order) => order,
		Err(cycle) => {
			warn!(
				"dagre: graph still cyclic at node {:?} after cycle breaking",
				cycle.node_id()
			);
			dag.node_indices().collect()
		}
	};

	// Longest path: sinks on the bottom rank, everything else as low as it fits.
	let mut rank = vec![0i64; dag.node_count()];
	for &v in order.iter().rev() {
		rank[v.index()] = dag
			.neighbors_directed(v, Direction::Outgoing)
			.map(|w| rank[w.index()] - 1)
			.min()
			.unwrap_or(0);
	}

	match ranker {
		Ranker::LongestPath => {}
		Ranker::TightTree => balance_ranks(dag, &order, &mut rank, 1),
		Ranker::NetworkSimplex => balance_ranks(dag, &order, &mut rank, MAX_RANK_PASSES),
	}

	let min = rank.iter().copied().min().unwrap_or(0);
	rank.into_iter().map(|r| (r - min) as usize).collect()
}

/// Shortens total edge length by moving each node to the end of its feasible
/// range that its heavier side pulls towards, until nothing moves.
fn balance_ranks(
	dag: &DiGraph<usize, usize>,
	order: &[NodeIndex],
	rank: &mut [i64],
	passes: usize,
) {
	for _ in 0..passes {
		let mut changed = false;
		for &v in order {
			let lowest = dag
				.neighbors_directed(v, Direction::Incoming)
				.map(|u| rank[u.index()] + 1)
				.max();
			let highest = dag
				.neighbors_directed(v, Direction::Outgoing)
				.map(|w| rank[w.index()] - 1)
				.min();
			let ins = dag.edges_directed(v, Direction::Incoming).count();
			let outs = dag.edges_directed(v, Direction::Outgoing).count();
			let target = match ins.cmp(&outs) {
				Ordering::Greater => lowest,
				Ordering::Less => highest,
				Ordering::Equal => None,
			};
			match target {
				Some(target) if target != rank[v.index()] => {
					rank[v.index()] = target;
					changed = true;
				}
				_ => {}
			}
		}
		if !changed {
			break;
		}
	}
}

/// Orders every rank to reduce crossings. Returns layer members left to right.
fn order_layers(
	nodes: &[LayerNode],
	up: &[Vec<usize>],
	down: &[Vec<usize>],
	rank_count: usize,
) -> Vec<Vec<usize>> {
	let mut layers: Vec<Vec<usize>> = vec![Vec::new(); rank_count];
	let mut visited = vec![false; nodes.len()];
	let mut starts: Vec<usize> = (0..nodes.len()).collect();
	starts.sort_by_key(|&v| nodes[v].rank);
	for start in starts {
		let mut stack = vec![start];
		while let Some(v) = stack.pop() {
			if visited[v] {
				continue;
			}
			visited[v] = true;
			layers[nodes[v].rank].push(v);
			stack.extend(down[v].iter().rev().filter(|&&w| !visited[w]));
		}
	}

	let mut position = vec![0usize; nodes.len()];
	let refresh = |layer: &[usize], position: &mut [usize]| {
		for (i, &v) in layer.iter().enumerate() {
			position[v] = i;
		}
	};
	for layer in &layers {
		refresh(layer, &mut position);
	}

	let mut best = layers.clone();
	let mut best_crossings = count_crossings(&layers, down, &position);
	let mut stale = 0;
	for sweep in 0..MAX_ORDER_SWEEPS {
		if best_crossings == 0 {
			break;
		}
		if sweep % 2 == 0 {
			for r in 1..rank_count {
				reorder_by_barycenter(&mut layers[r], &position, up);
				refresh(&layers[r], &mut position);
			}
		} else {
			for r in (0..rank_count.saturating_sub(1)).rev() {
				reorder_by_barycenter(&mut layers[r], &position, down);
				refresh(&layers[r], &mut position);
			}
		}

		let crossings = count_crossings(&layers, down, &position);
		if crossings < best_crossings {
			best = layers.clone();
			best_crossings = crossings;
			stale = 0;
		} else {
			stale += 1;
			if stale >= MAX_STALE_SWEEPS {
				break;
			}
		}
	}
	debug!("dagre: ordering settled with {} crossings", best_crossings);
	best
}

fn reorder_by_barycenter(layer: &mut Vec<usize>, position: &[usize], neighbors: &[Vec<usize>]) {
	let mut keyed: Vec<(f64, usize, usize)> = layer
		.iter()
		.enumerate()
		.map(|(i, &v)| {
			let adjacent = &neighbors[v];
			let barycenter = if adjacent.is_empty() {
				i as f64
			} else {
				adjacent.iter().map(|&w| position[w] as f64).sum::<f64>() / adjacent.len() as f64
			};
			(barycenter, i, v)
		})
		.collect();
	keyed.sort_by(|a, b| {
		a.0.partial_cmp(&b.0)
			.unwrap_or(Ordering::Equal)
			.then(a.1.cmp(&b.1))
	});
	*layer = keyed.into_iter().map(|(_, _, v)| v).collect();
}

fn count_crossings(layers: &[Vec<usize>], down: &[Vec<usize>], position: &[usize]) -> usize {
	let mut total = 0;
	for layer in layers {
		let segments: Vec<(usize, usize)> = layer
			.iter()
			.flat_map(|&u| down[u].iter().map(move |&w| (position[u], position[w])))
			.collect();
		for (i, a) in segments.iter().enumerate() {
			for b in &segments[i + 1..] {
				if (a.0 < b.0 && a.1 > b.1) || (a.0 > b.0 && a.1 < b.1) {
					total += 1;
				}
			}
		}
	}
	total
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> Graph {
		Graph::new(
			nodes.iter().map(|id| Node::new(*id)).collect(),
			edges
				.iter()
				.map(|(s, t)| Edge::new(format!("{s}{t}"), *s, *t))
				.collect(),
		)
	}

	fn layout(orientation: Orientation) -> DagreLayout {
		DagreLayout::new(DagreSettings {
			orientation,
			..DagreSettings::default()
		})
	}

	fn pos(graph: &Graph, id: &str) -> Point {
		graph.node(id).and_then(|n| n.position).unwrap()
	}

	#[test]
	fn two_nodes_get_distinct_positions_and_a_route() {
		let input = graph(&["a", "b"], &[("a", "b")]);
		let frames: Vec<Graph> = DagreLayout::default().run(&input, false).collect();
		assert_eq!(frames.len(), 1);
		let out = &frames[0];
		let (a, b) = (pos(out, "a"), pos(out, "b"));
		assert!(a.is_finite() && b.is_finite());
		assert_ne!(a, b);
		let points = out.edge("ab").and_then(|e| e.points.clone()).unwrap();
		assert!(points.len() >= 2);
		assert!(points.iter().all(Point::is_finite));
	}

	#[test]
	fn same_input_same_output() {
		let input = graph(
			&["a", "b", "c", "d", "e"],
			&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("a", "e"), ("e", "d")],
		);
		let dagre = DagreLayout::default();
		assert_eq!(dagre.compute(&input, false), dagre.compute(&input, false));
	}

	#[test]
	fn orientation_controls_flow_direction() {
		let input = graph(&["a", "b"], &[("a", "b")]);
		let tb = layout(Orientation::TopToBottom).compute(&input, false);
		assert!(pos(&tb, "b").y > pos(&tb, "a").y);
		let bt = layout(Orientation::BottomToTop).compute(&input, false);
		assert!(pos(&bt, "b").y < pos(&bt, "a").y);
		let lr = layout(Orientation::LeftToRight).compute(&input, false);
		assert!(pos(&lr, "b").x > pos(&lr, "a").x);
		let rl = layout(Orientation::RightToLeft).compute(&input, false);
		assert!(pos(&rl, "b").x < pos(&rl, "a").x);
	}

	#[test]
	fn missing_dimensions_fall_back_to_defaults_and_margins_apply() {
		let input = graph(&["a", "b"], &[("a", "b")]);
		let out = layout(Orientation::TopToBottom).compute(&input, false);
		let a = out.node("a").unwrap();
		assert_eq!(a.dimension, Some(Dimension::new(DEFAULT_NODE_WIDTH, DEFAULT_NODE_HEIGHT)));
		let left = out
			.nodes
			.iter()
			.map(|n| n.position.unwrap().x - n.dimension.unwrap().width / 2.0)
			.fold(f64::INFINITY, f64::min);
		let top = out
			.nodes
			.iter()
			.map(|n| n.position.unwrap().y - n.dimension.unwrap().height / 2.0)
			.fold(f64::INFINITY, f64::min);
		assert!((left - 20.0).abs() < 1e-9);
		assert!((top - 20.0).abs() < 1e-9);
	}

	#[test]
	fn long_edges_route_through_intermediate_ranks() {
		let input = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("a", "c")]);
		let out = layout(Orientation::TopToBottom).compute(&input, false);
		assert_eq!(out.edge("ab").unwrap().points.as_ref().unwrap().len(), 2);
		assert_eq!(out.edge("ac").unwrap().points.as_ref().unwrap().len(), 3);
	}

	#[test]
	fn cycles_are_laid_out_with_either_acyclicer() {
		let input = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
		for acyclicer in [Acyclicer::Dfs, Acyclicer::Greedy] {
			let dagre = DagreLayout::new(DagreSettings {
				acyclicer: Some(acyclicer),
				..DagreSettings::default()
			});
			let out = dagre.compute(&input, false);
			for node in &out.nodes {
				assert!(node.position.unwrap().is_finite());
			}
			for edge in &out.edges {
				let points = edge.points.as_ref().unwrap();
				assert!(points.len() >= 2);
			}
		}
	}

	#[test]
	fn reversed_edges_still_run_source_to_target() {
		let input = graph(&["a", "b"], &[("a", "b"), ("b", "a")]);
		let out = layout(Orientation::TopToBottom).compute(&input, false);
		let (a, b) = (pos(&out, "a"), pos(&out, "b"));
		let back = out.edge("ba").unwrap().points.clone().unwrap();
		let (first, last) = (back[0], back[back.len() - 1]);
		assert!((first.y - b.y).abs() < (first.y - a.y).abs());
		assert!((last.y - a.y).abs() < (last.y - b.y).abs());
	}

	#[test]
	fn collapsed_elements_are_left_out_when_requested() {
		let mut input = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
		input.node_mut("a").unwrap().collapsed = true;
		input.edge_mut("ab").unwrap().collapsed = true;

		let out = DagreLayout::default().compute(&input, true);
		assert!(out.node("a").unwrap().position.is_none());
		assert!(out.edge("ab").unwrap().points.is_none());
		assert!(out.node("b").unwrap().position.is_some());

		let all = DagreLayout::default().compute(&input, false);
		assert!(all.node("a").unwrap().position.is_some());
	}

	#[test]
	fn dangling_edges_and_self_loops_do_not_abort() {
		let mut input = graph(&["a", "b"], &[("a", "b"), ("a", "a")]);
		input.edges.push(Edge::new("dangling", "a", "nowhere"));
		let out = DagreLayout::default().compute(&input, false);
		assert!(out.edge("dangling").unwrap().points.is_none());
		assert_eq!(out.edge("aa").unwrap().points.as_ref().unwrap().len(), 4);
		assert!(out.node("b").unwrap().position.is_some());
	}

	#[test]
	fn rankers_differ_on_short_branches() {
		let input = graph(&["a", "b", "c", "d"], &[("a", "b"), ("a", "c"), ("c", "d")]);
		let with = |ranker| {
			DagreLayout::new(DagreSettings {
				orientation: Orientation::TopToBottom,
				ranker,
				..DagreSettings::default()
			})
			.compute(&input, false)
		};
		let longest = with(Ranker::LongestPath);
		assert_eq!(pos(&longest, "b").y, pos(&longest, "d").y);
		let simplex = with(Ranker::NetworkSimplex);
		assert_eq!(pos(&simplex, "b").y, pos(&simplex, "c").y);
	}

	#[test]
	fn nodes_in_a_rank_do_not_overlap() {
		let input = graph(
			&["root", "a", "b", "c", "d"],
			&[("root", "a"), ("root", "b"), ("root", "c"), ("root", "d")],
		);
		let out = layout(Orientation::TopToBottom).compute(&input, false);
		let mut xs: Vec<f64> = ["a", "b", "c", "d"].iter().map(|id| pos(&out, id).x).collect();
		xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
		for pair in xs.windows(2) {
			assert!(pair[1] - pair[0] >= DEFAULT_NODE_WIDTH + 50.0 - 1e-9);
		}
	}

	#[test]
	fn update_edge_draws_a_straight_route_between_facing_sides() {
		let mut input = graph(&["a", "b"], &[("a", "b")]);
		for (id, y) in [("a", 0.0), ("b", 100.0)] {
			let node = input.node_mut(id).unwrap();
			node.position = Some(Point::new(10.0, y));
			node.dimension = Some(Dimension::new(20.0, 30.0));
		}
		let edge = input.edge("ab").unwrap().clone();
		let frame = DagreLayout::default().update_edge(&input, &edge).next().unwrap();
		let points = frame.edge("ab").unwrap().points.clone().unwrap();
		assert_eq!(points, vec![Point::new(10.0, 15.0), Point::new(10.0, 85.0)]);
	}

	#[test]
	fn update_edge_without_positions_yields_nothing() {
		let input = graph(&["a", "b"], &[("a", "b")]);
		let edge = input.edge("ab").unwrap().clone();
		assert!(DagreLayout::default().update_edge(&input, &edge).next().is_none());
	}

	#[test]
	fn settings_merge_over_defaults() {
		let mut dagre = DagreLayout::default();
		dagre.apply_settings(&json!({ "orientation": "BT", "ranker": "longest-path" })).unwrap();
		assert_eq!(dagre.settings.orientation, Orientation::BottomToTop);
		assert_eq!(dagre.settings.ranker, Ranker::LongestPath);
		assert_eq!(dagre.settings.node_padding, 50.0);

		let err = dagre.apply_settings(&json!({ "orientation": "diagonal" })).unwrap_err();
		assert!(matches!(err, LayoutError::InvalidSettings { layout: "dagre", .. }));
	}
}
