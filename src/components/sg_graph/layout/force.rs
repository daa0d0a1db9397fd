//! Force-directed layout on top of the `force_graph` simulation.
//!
//! `force_graph` supplies charge repulsion, spring attraction and damping.
//! On top of it each tick applies a rest length for links, a small collision
//! radius and a centring translation, all scaled by a decaying `alpha` so the
//! simulation cools down and stops emitting frames once it settles.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use std::rc::Rc;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Layout, LayoutError, LayoutRun};
use crate::components::sg_graph::types::{Dimension, Edge, Graph, Node, Point};

const DEFAULT_NODE_SIZE: f64 = 20.0;
const SEED_RADIUS: f64 = 100.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForceDirectedSettings {
	/// Repulsion between every pair of nodes.
	pub charge: f32,
	/// Spring constant of links.
	pub spring: f32,
	pub max_force: f32,
	pub node_speed: f32,
	pub damping: f32,
	pub mass: f32,
	/// Minimum distance kept between node centres, per node.
	pub collide_radius: f64,
	/// Rest length of links.
	pub link_distance: f64,
	pub link_strength: f64,
	/// Alpha a fresh run starts with.
	pub alpha: f64,
	/// The run stops once alpha falls below this.
	pub alpha_min: f64,
	pub alpha_decay: f64,
	/// Alpha is held around this value while a node is dragged.
	pub drag_alpha_target: f64,
	/// Simulated seconds per frame.
	pub tick: f64,
}

impl Default for ForceDirectedSettings {
	fn default() -> Self {
		Self {
			charge: 150.0,
			spring: 0.05,
			max_force: 100.0,
			node_speed: 3000.0,
			damping: 0.9,
			mass: 10.0,
			collide_radius: 5.0,
			link_distance: 100.0,
			link_strength: 0.5,
			alpha: 0.5,
			alpha_min: 0.001,
			alpha_decay: 0.0228,
			drag_alpha_target: 0.3,
			tick: 0.016,
		}
	}
}

/// Id carried by each simulated node.
#[derive(Clone, Debug)]
struct SimNode {
	id: String,
}

struct Drag {
	idx: DefaultNodeIdx,
	/// Pointer minus node centre at drag start.
	offset: Point,
}

struct Simulation {
	graph: ForceGraph<SimNode, ()>,
	slots: HashMap<String, DefaultNodeIdx>,
	links: Vec<(DefaultNodeIdx, DefaultNodeIdx)>,
	frame: Graph,
	center: Point,
	alpha: f64,
	alpha_target: f64,
	drag: Option<Drag>,
	settings: ForceDirectedSettings,
}

impl Simulation {
	fn new(input: &Graph, ignore_collapsed: bool, settings: ForceDirectedSettings) -> Self {
		let mut graph = ForceGraph::new(SimulationParameters {
			force_charge: settings.charge,
			force_spring: settings.spring,
			force_max: settings.max_force,
			node_speed: settings.node_speed,
			damping_factor: settings.damping,
		});

		let nodes: Vec<Node> = input
			.nodes
			.iter()
			.filter(|n| !(ignore_collapsed && n.collapsed))
			.cloned()
			.map(|mut n| {
				n.dimension.get_or_insert(Dimension::new(DEFAULT_NODE_SIZE, DEFAULT_NODE_SIZE));
				n
			})
			.collect();

		let placed: Vec<Point> = nodes
			.iter()
			.filter_map(|n| n.position)
			.filter(Point::is_finite)
			.collect();
		let center = if placed.is_empty() {
			Point::default()
		} else {
			let n = placed.len() as f64;
			Point::new(
				placed.iter().map(|p| p.x).sum::<f64>() / n,
				placed.iter().map(|p| p.y).sum::<f64>() / n,
			)
		};

		let mut slots = HashMap::new();
		let mut taken: HashSet<(u64, u64)> = HashSet::new();
		for (i, node) in nodes.iter().enumerate() {
			// Coincident nodes have no direction to repel along; reseed them.
			let start = node
				.position
				.filter(|p| p.is_finite() && taken.insert((p.x.to_bits(), p.y.to_bits())))
				.unwrap_or_else(|| {
					let angle = i as f64 * 2.0 * PI / nodes.len() as f64;
					Point::new(
						center.x + SEED_RADIUS * angle.cos(),
						center.y + SEED_RADIUS * angle.sin(),
					)
				});
			let idx = graph.add_node(NodeData {
				x: start.x as f32,
				y: start.y as f32,
				mass: settings.mass,
				is_anchor: false,
				user_data: SimNode { id: node.id.clone() },
			});
			slots.insert(node.id.clone(), idx);
		}

		let mut links = Vec::new();
		let mut edges = Vec::new();
		for edge in &input.edges {
			if ignore_collapsed && edge.collapsed {
				continue;
			}
			let (Some(&source), Some(&target)) = (slots.get(&edge.source), slots.get(&edge.target))
			else {
				debug!("force: edge '{}' references a missing node, skipped", edge.id);
				continue;
			};
			if source != target {
				graph.add_edge(source, target, EdgeData::default());
				links.push((source, target));
			}
			edges.push(edge.clone());
		}

		let alpha = settings.alpha;
		Self {
			graph,
			slots,
			links,
			frame: Graph::new(nodes, edges),
			center,
			alpha,
			alpha_target: 0.0,
			drag: None,
			settings,
		}
	}

	fn settled(&self) -> bool {
		self.alpha < self.settings.alpha_min && self.alpha_target < self.settings.alpha_min
	}

	fn positions(&self) -> HashMap<DefaultNodeIdx, Point> {
		let mut positions = HashMap::with_capacity(self.slots.len());
		self.graph.visit_nodes(|node| {
			positions.insert(node.index(), Point::new(node.x() as f64, node.y() as f64));
		});
		positions
	}

	/// Advances one tick and returns the resulting frame, or `None` once settled.
	fn step(&mut self) -> Option<Graph> {
		if self.settled() {
			return None;
		}
		self.alpha += (self.alpha_target - self.alpha) * self.settings.alpha_decay;

		let heat = if self.settings.alpha > 0.0 {
			(self.alpha / self.settings.alpha).min(1.0)
		} else {
			1.0
		};
		self.graph.update((self.settings.tick * heat) as f32);

		let positions = self.positions();
		let mut shift: HashMap<DefaultNodeIdx, Point> = HashMap::new();
		let mut push = |idx: DefaultNodeIdx, dx: f64, dy: f64| {
			let entry = shift.entry(idx).or_default();
			entry.x += dx;
			entry.y += dy;
		};

		for &(source, target) in &self.links {
			let (Some(a), Some(b)) = (positions.get(&source), positions.get(&target)) else {
				continue;
			};
			let (dx, dy) = (b.x - a.x, b.y - a.y);
			let distance = (dx * dx + dy * dy).sqrt();
			if distance == 0.0 {
				continue;
			}
			let k = (distance - self.settings.link_distance) / distance
				* self.settings.link_strength
				* self.alpha
				/ 2.0;
			push(source, dx * k, dy * k);
			push(target, -dx * k, -dy * k);
		}

		let nodes: Vec<(DefaultNodeIdx, Point)> =
			positions.iter().map(|(&i, &p)| (i, p)).collect();
		let reach = 2.0 * self.settings.collide_radius;
		for (i, (a_idx, a)) in nodes.iter().enumerate() {
			for (b_idx, b) in &nodes[i + 1..] {
				let (dx, dy) = (b.x - a.x, b.y - a.y);
				let distance = (dx * dx + dy * dy).sqrt();
				if distance >= reach || distance == 0.0 {
					continue;
				}
				let k = (reach - distance) / distance / 2.0;
				push(*a_idx, -dx * k, -dy * k);
				push(*b_idx, dx * k, dy * k);
			}
		}

		let free: Vec<Point> = nodes
			.iter()
			.map(|(i, p)| {
				let s = shift.get(i).copied().unwrap_or_default();
				Point::new(p.x + s.x, p.y + s.y)
			})
			.collect();
		let recenter = if free.is_empty() {
			Point::default()
		} else {
			let n = free.len() as f64;
			Point::new(
				self.center.x - free.iter().map(|p| p.x).sum::<f64>() / n,
				self.center.y - free.iter().map(|p| p.y).sum::<f64>() / n,
			)
		};

		self.graph.visit_nodes_mut(|node| {
			if node.data.is_anchor {
				return;
			}
			let s = shift.get(&node.index()).copied().unwrap_or_default();
			let x = node.x() as f64 + s.x + recenter.x;
			let y = node.y() as f64 + s.y + recenter.y;
			if x.is_finite() && y.is_finite() {
				node.data.x = x as f32;
				node.data.y = y as f32;
			}
		});

		Some(self.snapshot())
	}

	fn snapshot(&mut self) -> Graph {
		let positions = self.positions();
		for node in &mut self.frame.nodes {
			if let Some(p) = self.slots.get(&node.id).and_then(|idx| positions.get(idx)) {
				node.position = Some(*p);
			}
		}
		let by_id: HashMap<&str, Point> = self
			.frame
			.nodes
			.iter()
			.filter_map(|n| Some((n.id.as_str(), n.position?)))
			.collect();
		let routes: Vec<Option<Vec<Point>>> = self
			.frame
			.edges
			.iter()
			.map(|e| {
				Some(vec![
					*by_id.get(e.source.as_str())?,
					*by_id.get(e.target.as_str())?,
				])
			})
			.collect();
		for (edge, route) in self.frame.edges.iter_mut().zip(routes) {
			edge.points = route;
		}
		self.frame.clone()
	}

	fn pin(&mut self, idx: DefaultNodeIdx, at: Option<Point>) {
		self.graph.visit_nodes_mut(|node| {
			if node.index() != idx {
				return;
			}
			match at {
				Some(p) => {
					node.data.x = p.x as f32;
					node.data.y = p.y as f32;
					node.data.is_anchor = true;
				}
				None => node.data.is_anchor = false,
			}
		});
	}
}

/// Shared handle on the live simulation. Every [`LayoutRun`] it hands out
/// remembers the generation it was created for and dries up once a newer
/// run replaces the simulation.
#[derive(Clone, Default)]
struct Shared {
	simulation: Rc<RefCell<Option<Simulation>>>,
	generation: Rc<Cell<u64>>,
}

impl Shared {
	fn frames(&self) -> LayoutRun {
		let simulation = Rc::clone(&self.simulation);
		let generation = Rc::clone(&self.generation);
		let born = generation.get();
		LayoutRun::from_fn(move || {
			if generation.get() != born {
				return None;
			}
			simulation.borrow_mut().as_mut()?.step()
		})
	}
}

/// Iterative force-directed layout. Emits a frame per simulation tick.
#[derive(Clone, Default)]
pub struct ForceDirectedLayout {
	pub settings: ForceDirectedSettings,
	shared: Shared,
}

impl ForceDirectedLayout {
	pub fn new(settings: ForceDirectedSettings) -> Self {
		Self {
			settings,
			shared: Shared::default(),
		}
	}

	fn with_node<R>(
		&self,
		node: &Node,
		f: impl FnOnce(&mut Simulation, DefaultNodeIdx) -> R,
	) -> Option<R> {
		let mut guard = self.shared.simulation.borrow_mut();
		let simulation = guard.as_mut()?;
		let Some(&idx) = simulation.slots.get(&node.id) else {
			warn!("force: node '{}' is not part of the simulation", node.id);
			return None;
		};
		Some(f(simulation, idx))
	}
}

impl std::fmt::Debug for ForceDirectedLayout {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ForceDirectedLayout")
			.field("settings", &self.settings)
			.field("generation", &self.shared.generation.get())
			.finish()
	}
}

impl Layout for ForceDirectedLayout {
	fn name(&self) -> &'static str {
		"d3ForceDirected"
	}

	fn is_simulation(&self) -> bool {
		true
	}

	fn apply_settings(&mut self, settings: &Value) -> Result<(), LayoutError> {
		self.settings = if settings.is_null() {
			ForceDirectedSettings::default()
		} else {
			serde_json::from_value(settings.clone()).map_err(|source| {
				LayoutError::InvalidSettings {
					layout: "d3ForceDirected",
					source,
				}
			})?
		};
		Ok(())
	}

	fn run(&mut self, graph: &Graph, ignore_collapsed: bool) -> LayoutRun {
		let simulation = Simulation::new(graph, ignore_collapsed, self.settings.clone());
		debug!(
			"force: starting simulation with {} nodes, {} links",
			simulation.slots.len(),
			simulation.links.len()
		);
		*self.shared.simulation.borrow_mut() = Some(simulation);
		self.shared.generation.set(self.shared.generation.get() + 1);
		self.shared.frames()
	}

	/// Routes follow the simulation, so an edge update simply keeps the
	/// current simulation ticking.
	fn update_edge(&mut self, _graph: &Graph, edge: &Edge) -> LayoutRun {
		if self.shared.simulation.borrow().is_none() {
			warn!("force: edge '{}' updated before any run", edge.id);
			return LayoutRun::empty();
		}
		self.shared.frames()
	}

	fn on_drag_start(&mut self, node: &Node, pointer: Point) {
		self.with_node(node, |simulation, idx| {
			let centre = simulation.positions().get(&idx).copied().unwrap_or(pointer);
			simulation.alpha_target = simulation.settings.drag_alpha_target;
			simulation.alpha = simulation.alpha.max(simulation.alpha_target);
			simulation.drag = Some(Drag {
				idx,
				offset: Point::new(pointer.x - centre.x, pointer.y - centre.y),
			});
			simulation.pin(idx, Some(centre));
		});
	}

	fn on_drag(&mut self, node: &Node, pointer: Point) {
		self.with_node(node, |simulation, idx| {
			let offset = match &simulation.drag {
				Some(drag) if drag.idx == idx => drag.offset,
				_ => Point::default(),
			};
			simulation.pin(idx, Some(Point::new(pointer.x - offset.x, pointer.y - offset.y)));
		});
	}

	fn on_drag_end(&mut self, node: &Node, _pointer: Point) {
		self.with_node(node, |simulation, idx| {
			simulation.alpha_target = 0.0;
			simulation.drag = None;
			simulation.pin(idx, None);
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn pair() -> Graph {
		Graph::new(
			vec![Node::new("a"), Node::new("b")],
			vec![Edge::new("ab", "a", "b")],
		)
	}

	#[test]
	fn frames_carry_positions_default_sizes_and_straight_routes() {
		let mut layout = ForceDirectedLayout::default();
		let frame = layout.run(&pair(), false).next().unwrap();
		let a = frame.node("a").unwrap();
		let b = frame.node("b").unwrap();
		assert_eq!(a.dimension, Some(Dimension::new(20.0, 20.0)));
		assert!(a.position.unwrap().is_finite());
		assert_ne!(a.position, b.position);
		let route = frame.edge("ab").unwrap().points.clone().unwrap();
		assert_eq!(route, vec![a.position.unwrap(), b.position.unwrap()]);
	}

	#[test]
	fn simulation_settles_and_stops() {
		let mut layout = ForceDirectedLayout::default();
		let frames = layout.run(&pair(), false).take(10_000).count();
		assert!(frames > 1);
		assert!(frames < 10_000);
	}

	#[test]
	fn a_new_run_retires_the_previous_one() {
		let mut layout = ForceDirectedLayout::default();
		let mut first = layout.run(&pair(), false);
		assert!(first.next().is_some());
		let mut second = layout.run(&pair(), false);
		assert!(first.next().is_none());
		assert!(second.next().is_some());
	}

	#[test]
	fn dragging_pins_the_node_under_the_pointer() {
		let mut layout = ForceDirectedLayout::default();
		let mut run = layout.run(&pair(), false);
		let frame = run.next().unwrap();
		let a = frame.node("a").unwrap().clone();
		let centre = a.position.unwrap();

		layout.on_drag_start(&a, Point::new(centre.x + 2.0, centre.y));
		layout.on_drag(&a, Point::new(502.0, 300.0));
		let frame = run.next().unwrap();
		assert_eq!(frame.node("a").unwrap().position, Some(Point::new(500.0, 300.0)));

		layout.on_drag_end(&a, Point::new(502.0, 300.0));
		let settled = run.take(10_000).count();
		assert!(settled < 10_000);
	}

	#[test]
	fn collapsed_elements_are_left_out_when_requested() {
		let mut graph = pair();
		graph.node_mut("b").unwrap().collapsed = true;
		let mut layout = ForceDirectedLayout::default();
		let frame = layout.run(&graph, true).next().unwrap();
		assert!(frame.node("b").is_none());
		assert!(frame.edge("ab").is_none());
	}

	#[test]
	fn settings_merge_over_defaults() {
		let mut layout = ForceDirectedLayout::default();
		layout.apply_settings(&json!({ "linkDistance": 40.0 })).unwrap();
		assert_eq!(layout.settings.link_distance, 40.0);
		assert_eq!(layout.settings.collide_radius, 5.0);
		assert!(layout.apply_settings(&json!({ "charge": "lots" })).is_err());
	}
}
