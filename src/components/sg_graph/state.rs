//! Viewport controller for the statement graph.
//!
//! [`GraphViewState`] is the single owner of the displayed [`Graph`], the
//! pan/zoom [`Matrix`] and the active [`LayoutRun`]. Pointer handlers, layout
//! frames and external commands all mutate the graph through it. The canvas
//! component calls [`GraphViewState::frame`] once per animation frame; that is
//! where queued commands are processed, pending layouts start and the next
//! layout frame is pulled.
//!
//! Screen coordinates are canvas-relative pixels. Graph coordinates are what
//! the layouts produce; the matrix maps graph space to screen space.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};
use serde_json::{Map, Value};

use super::commands::{CommandQueue, CommandSender, ViewCommand};
use super::config::GraphConfig;
use super::layout::{DagreLayout, Layout, LayoutError, LayoutRegistry, LayoutRun};
use super::line::text_path;
use super::transform::Matrix;
use super::types::{Dimension, Graph, Node, Point};

/// Padding added around a node's label text.
const NODE_TEXT_PADDING: f64 = 20.0;
/// Size given to nodes before their first measurement.
const INITIAL_NODE_SIZE: f64 = 30.0;
const COMMAND_CAPACITY: usize = 16;

/// Size of a node as rendered, before configured overrides and clamps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeMeasurement {
	pub width: f64,
	pub height: f64,
	/// Width of the label text, when the node shows one.
	pub text_width: Option<f64>,
}

/// Measures rendered nodes. `None` means the node cannot be measured yet
/// (not rendered, zero-size); it keeps its previous size until the next pass.
pub trait NodeMeasurer {
	/// Rendered size of `node`, if it can be measured yet.
	fn measure(&self, node: &Node) -> Option<NodeMeasurement>;
}

impl<F> NodeMeasurer for F
where
	F: Fn(&Node) -> Option<NodeMeasurement>,
{
	fn measure(&self, node: &Node) -> Option<NodeMeasurement> {
		self(node)
	}
}

/// Direction of a single zoom step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoomDirection {
	In,
	Out,
}

/// Viewport controller: owns the displayed graph, the transform and the
/// active layout run.
pub struct GraphViewState {
	config: GraphConfig,
	graph: Graph,
	matrix: Matrix,
	registry: LayoutRegistry,
	layout: Box<dyn Layout>,
	layout_settings: Value,
	run: Option<LayoutRun>,
	commands: CommandQueue,
	dims: Dimension,
	graph_dims: Dimension,
	panning: bool,
	dragging: Option<String>,
	hovered: Option<String>,
	pointer_last: Option<Point>,
	touch_last: Option<Point>,
	attached: bool,
	initialized: bool,
	needs_update: bool,
	needs_draw: bool,
	torn_down: bool,
}

impl GraphViewState {
	/// A detached controller using the layered layout.
	pub fn new(config: GraphConfig) -> Self {
		Self {
			config,
			graph: Graph::default(),
			matrix: Matrix::identity(),
			registry: LayoutRegistry::default(),
			layout: Box::new(DagreLayout::default()),
			layout_settings: Value::Null,
			run: None,
			commands: CommandQueue::bounded(COMMAND_CAPACITY),
			dims: Dimension::new(0.0, 0.0),
			graph_dims: Dimension::new(0.0, 0.0),
			panning: false,
			dragging: None,
			hovered: None,
			pointer_last: None,
			touch_last: None,
			attached: false,
			initialized: false,
			needs_update: false,
			needs_draw: false,
			torn_down: false,
		}
	}

	pub fn config(&self) -> &GraphConfig {
		&self.config
	}

	pub fn set_config(&mut self, config: GraphConfig) {
		self.config = config;
		self.needs_update = true;
	}

	pub fn registry_mut(&mut self) -> &mut LayoutRegistry {
		&mut self.registry
	}

	/// Switches to the layout registered as `name` (`dagre` when `None`) and
	/// re-applies the current settings. An unknown name leaves the current
	/// layout in place.
	pub fn set_layout(&mut self, name: Option<&str>) -> Result<(), LayoutError> {
		let layout = self.registry.create(name.unwrap_or("dagre"))?;
		self.set_layout_instance(layout)
	}

	pub fn set_layout_instance(&mut self, mut layout: Box<dyn Layout>) -> Result<(), LayoutError> {
		layout.apply_settings(&self.layout_settings)?;
		self.cancel_run();
		info!("graph view: using layout '{}'", layout.name());
		self.layout = layout;
		self.initialized = false;
		self.needs_update = true;
		Ok(())
	}

	pub fn set_layout_settings(&mut self, settings: Value) -> Result<(), LayoutError> {
		self.layout.apply_settings(&settings)?;
		self.layout_settings = settings;
		self.needs_update = true;
		Ok(())
	}

	pub fn layout_name(&self) -> &'static str {
		self.layout.name()
	}

	/// Replaces the displayed nodes and edges. Elements whose id is already
	/// displayed keep their geometry and UI state.
	pub fn set_data(&mut self, mut graph: Graph) {
		let mut old_nodes: HashMap<String, Node> =
			self.graph.nodes.drain(..).map(|n| (n.id.clone(), n)).collect();
		for node in &mut graph.nodes {
			if let Some(old) = old_nodes.remove(&node.id) {
				node.position = node.position.or(old.position);
				node.dimension = node.dimension.or(old.dimension);
				node.transform = old.transform;
				node.old_transform = old.old_transform;
				node.collapsed = old.collapsed;
				node.unhighlight = old.unhighlight;
			}
		}

		let mut old_edges: HashMap<String, _> =
			self.graph.edges.drain(..).map(|e| (e.id.clone(), e)).collect();
		for edge in &mut graph.edges {
			if let Some(old) = old_edges.remove(&edge.id) {
				if edge.points.is_none() {
					edge.points = old.points;
				}
				edge.line = old.line;
				edge.old_line = old.old_line;
				edge.text_path = old.text_path;
				edge.old_text_path = old.old_text_path;
				edge.dominant_baseline = old.dominant_baseline;
				edge.collapsed = old.collapsed;
				edge.unhighlight = old.unhighlight;
			}
		}

		debug!(
			"graph view: data set ({} nodes, {} edges, {} nodes dropped)",
			graph.nodes.len(),
			graph.edges.len(),
			old_nodes.len()
		);
		self.graph = graph;
		self.needs_update = true;
	}

	/// Sending end for [`ViewCommand`]s, processed on the next frame.
	pub fn commands(&self) -> CommandSender {
		self.commands.sender()
	}

	/// Binds the controller to a rendered viewport of the given size. The
	/// first layout runs on the next frame, once nodes can be measured.
	pub fn attach(&mut self, width: f64, height: f64) {
		self.dims = Dimension::new(width, height);
		self.attached = true;
		self.needs_update = true;
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.dims = Dimension::new(width, height);
	}

	/// Prepares the graph for a fresh layout pass: every node gets a size and
	/// a data object, and the previous run is cancelled.
	pub fn update(&mut self) {
		self.cancel_run();
		for node in &mut self.graph.nodes {
			node.dimension
				.get_or_insert(Dimension::new(INITIAL_NODE_SIZE, INITIAL_NODE_SIZE));
			if node.data.is_null() {
				node.data = Value::Object(Map::new());
			}
		}
		self.needs_update = false;
		self.needs_draw = true;
		self.initialized = true;
	}

	/// Advances the view by one animation frame. Returns whether the graph
	/// geometry or the transform changed.
	pub fn frame(&mut self, measurer: &dyn NodeMeasurer) -> bool {
		if self.torn_down {
			return false;
		}

		let mut changed = false;
		for command in self.commands.drain() {
			match command {
				ViewCommand::Update => self.needs_update = true,
				ViewCommand::Center => {
					self.center();
					changed = true;
				}
				ViewCommand::ZoomToFit => {
					self.zoom_to_fit();
					changed = true;
				}
			}
		}

		if !self.attached {
			return changed;
		}
		if self.needs_update {
			self.update();
		}
		if self.needs_draw {
			self.draw(measurer);
			return true;
		}

		let Some(run) = self.run.as_mut() else {
			return changed;
		};
		match run.next() {
			Some(frame) => {
				self.apply_frame(&frame);
				self.apply_node_dimensions(measurer);
				true
			}
			None => {
				self.run = None;
				changed
			}
		}
	}

	/// Measures nodes and starts a new layout run, applying its first frame.
	fn draw(&mut self, measurer: &dyn NodeMeasurer) {
		self.needs_draw = false;
		self.apply_node_dimensions(measurer);
		self.cancel_run();

		let mut run = self
			.layout
			.run(&self.graph, self.config.compute_positions_after_collapse);
		match run.next() {
			Some(frame) => {
				self.apply_frame(&frame);
				self.apply_node_dimensions(measurer);
			}
			None => debug!("graph view: layout '{}' produced no frame", self.layout.name()),
		}
		self.run = Some(run);
	}

	fn cancel_run(&mut self) {
		if let Some(run) = self.run.take() {
			run.cancel();
		}
	}

	/// Whether a layout run is still producing frames.
	pub fn is_running(&self) -> bool {
		self.run.as_ref().is_some_and(|run| !run.is_cancelled())
	}

	/// Sizes every measurable node from its rendered content, honouring the
	/// configured fixed sizes and clamps.
	pub fn apply_node_dimensions(&mut self, measurer: &dyn NodeMeasurer) {
		let config = &self.config;
		for node in &mut self.graph.nodes {
			let Some(measured) = measurer.measure(node) else {
				debug!("graph view: node '{}' not measurable yet", node.id);
				continue;
			};
			let height = config.node_height.unwrap_or(measured.height);
			let width = config.node_width.unwrap_or_else(|| {
				measured
					.text_width
					.map_or(measured.width, |text| text + NODE_TEXT_PADDING)
			});
			node.dimension = Some(Dimension::new(
				config.clamp_width(width),
				config.clamp_height(height),
			));
		}
	}

	fn apply_frame(&mut self, frame: &Graph) {
		let unmatched = self.graph.apply_layout(frame);
		if unmatched > 0 {
			debug!("graph view: {} layout elements had no counterpart", unmatched);
		}
		self.refresh_geometry();
	}

	/// Recomputes transforms, edge paths and the graph extent after new
	/// positions arrived.
	fn refresh_geometry(&mut self) {
		for node in &mut self.graph.nodes {
			node.old_transform = node.transform.take();
			node.transform = node.render_transform();
		}

		let curve = self.config.curve;
		for edge in &mut self.graph.edges {
			let Some(points) = edge.points.as_deref().filter(|p| !p.is_empty()) else {
				if !edge.collapsed {
					debug!("graph view: edge '{}' has no route, skipped", edge.id);
				}
				continue;
			};
			edge.old_line = edge.line.take();
			edge.line = curve.path(points);
			if edge.old_line.is_none() {
				edge.old_line = edge.line.clone();
			}
			edge.old_text_path = edge.text_path.take();
			let (path, baseline) = text_path(curve, points, edge.line.as_deref());
			edge.text_path = path;
			edge.dominant_baseline = baseline;
		}

		if !self.graph.nodes.is_empty() {
			self.graph_dims = self.graph.extent();
		}
		if self.config.auto_zoom {
			self.zoom_to_fit();
		}
		if self.config.auto_center {
			self.center();
		}
	}

	fn redraw_edge(&mut self, edge_id: &str) {
		let curve = self.config.curve;
		let Some(edge) = self.graph.edge_mut(edge_id) else {
			return;
		};
		let Some(points) = edge.points.as_deref().filter(|p| !p.is_empty()) else {
			warn!("graph view: edge '{}' has no route after update", edge_id);
			return;
		};
		let line = curve.path(points);
		edge.old_text_path = edge.text_path.take();
		let (path, baseline) = text_path(curve, points, line.as_deref());
		edge.text_path = path;
		edge.dominant_baseline = baseline;
		edge.old_line = std::mem::replace(&mut edge.line, line);
	}

	pub fn graph(&self) -> &Graph {
		&self.graph
	}

	pub fn matrix(&self) -> &Matrix {
		&self.matrix
	}

	/// Viewport size in pixels.
	pub fn dims(&self) -> Dimension {
		self.dims
	}

	/// Right/bottom extent of the laid out graph.
	pub fn graph_dims(&self) -> Dimension {
		self.graph_dims
	}

	pub fn zoom_level(&self) -> f64 {
		self.matrix.a
	}

	pub fn pan_offset_x(&self) -> f64 {
		self.matrix.e
	}

	pub fn pan_offset_y(&self) -> f64 {
		self.matrix.f
	}

	pub fn is_panning(&self) -> bool {
		self.panning
	}

	pub fn dragging(&self) -> Option<&str> {
		self.dragging.as_deref()
	}

	pub fn hovered(&self) -> Option<&str> {
		self.hovered.as_deref()
	}

	pub fn is_initialized(&self) -> bool {
		self.initialized
	}

	pub fn is_torn_down(&self) -> bool {
		self.torn_down
	}

	pub fn screen_to_graph(&self, screen: Point) -> Option<Point> {
		Some(self.matrix.inverse()?.apply(screen))
	}

	pub fn graph_to_screen(&self, point: Point) -> Point {
		self.matrix.apply(point)
	}

	/// Topmost visible node under a screen position.
	pub fn node_at(&self, screen: Point) -> Option<String> {
		let point = self.screen_to_graph(screen)?;
		self.graph
			.nodes
			.iter()
			.rev()
			.filter(|n| !n.collapsed)
			.find(|n| n.contains(point))
			.map(|n| n.id.clone())
	}

	// Pan and zoom

	/// Pans by a screen-pixel delta; the graph moves `delta / zoom` graph units.
	pub fn pan(&mut self, dx: f64, dy: f64) {
		self.pan_at_level(dx, dy, self.zoom_level());
	}

	pub fn pan_at_level(&mut self, dx: f64, dy: f64, level: f64) {
		if !(level.is_finite() && level > 0.0) {
			return;
		}
		self.matrix
			.compose(Matrix::translate(dx / level, dy / level));
	}

	/// Moves the translation to a fixed screen offset. Missing or non-finite
	/// coordinates keep their current value.
	pub fn pan_to(&mut self, x: Option<f64>, y: Option<f64>) {
		if let Some(x) = x.filter(|x| x.is_finite()) {
			self.matrix.e = x;
		}
		if let Some(y) = y.filter(|y| y.is_finite()) {
			self.matrix.f = y;
		}
	}

	pub fn zoom(&mut self, factor: f64) {
		self.matrix.compose(Matrix::scale(factor, factor));
	}

	/// Sets the zoom level. Non-positive or non-finite levels are ignored.
	pub fn zoom_to(&mut self, level: f64) {
		if !(level.is_finite() && level > 0.0) {
			debug!("graph view: zoom level {level} ignored");
			return;
		}
		self.matrix.a = level;
		self.matrix.d = level;
	}

	/// One zoom step. With pan-on-zoom and a pointer, the graph point under
	/// the pointer stays where it is. Returns whether the step was taken.
	pub fn on_zoom(&mut self, pointer: Option<Point>, direction: ZoomDirection) -> bool {
		let factor = 1.0
			+ match direction {
				ZoomDirection::In => self.config.zoom_speed,
				ZoomDirection::Out => -self.config.zoom_speed,
			};
		let level = self.zoom_level() * factor;
		if level < self.config.min_zoom_level || level > self.config.max_zoom_level {
			debug!("graph view: zoom to {level} rejected");
			return false;
		}
		if !self.config.enable_zoom {
			return false;
		}

		let anchor = pointer
			.filter(|_| self.config.pan_on_zoom)
			.and_then(|p| self.screen_to_graph(p));
		match anchor {
			Some(p) => {
				self.pan_at_level(p.x, p.y, 1.0);
				self.zoom(factor);
				self.pan_at_level(-p.x, -p.y, 1.0);
			}
			None => self.zoom(factor),
		}
		true
	}

	/// Zooms out (never in past 1.0) until the whole graph fits, then centres it.
	pub fn zoom_to_fit(&mut self) {
		let Dimension { width, height } = self.graph_dims;
		if width <= 0.0 || height <= 0.0 {
			debug!("graph view: nothing to fit");
			return;
		}
		if self.dims.width <= 0.0 || self.dims.height <= 0.0 {
			debug!("graph view: viewport not measured, fit skipped");
			return;
		}
		let level = (self.dims.height / height)
			.min(self.dims.width / width)
			.min(1.0);
		if level != self.zoom_level() {
			self.zoom_to(level);
			self.center();
		}
	}

	pub fn center(&mut self) {
		let zoom = self.zoom_level();
		self.pan_to(
			Some(self.dims.width / 2.0 - self.graph_dims.width * zoom / 2.0),
			Some(self.dims.height / 2.0 - self.graph_dims.height * zoom / 2.0),
		);
	}

	// Pointer input

	pub fn on_pointer_down(&mut self, screen: Point) {
		self.pointer_last = Some(screen);
		match self.node_at(screen) {
			Some(id) => self.on_node_mouse_down(&id, screen),
			None => self.panning = true,
		}
	}

	pub fn on_pointer_move(&mut self, screen: Point) {
		let movement = self
			.pointer_last
			.map_or(Point::default(), |last| Point::new(screen.x - last.x, screen.y - last.y));
		self.pointer_last = Some(screen);

		if self.panning && self.config.panning_enabled {
			self.pan(movement.x, movement.y);
		} else if self.dragging.is_some() && self.config.dragging_enabled {
			self.on_drag(movement, screen);
		} else if self.dragging.is_none() {
			let over = self.node_at(screen);
			if over != self.hovered {
				self.on_node_mouse_leave();
				if let Some(id) = over {
					self.on_node_mouse_enter(&id);
				}
			}
		}
	}

	/// Ends panning and dragging, tells the layout a drag finished and clears
	/// any hover highlight.
	pub fn on_pointer_up(&mut self, screen: Option<Point>) {
		self.panning = false;
		if let Some(id) = self.dragging.take() {
			let pointer = screen
				.and_then(|s| self.screen_to_graph(s))
				.unwrap_or_default();
			if let Some(node) = self.graph.node(&id) {
				self.layout.on_drag_end(node, pointer);
			}
		}
		self.pointer_last = None;
		self.on_node_mouse_leave();
	}

	pub fn on_pointer_leave(&mut self) {
		self.on_pointer_up(None);
	}

	pub fn on_wheel(&mut self, screen: Point, delta_y: f64) -> bool {
		let direction = if delta_y < 0.0 {
			ZoomDirection::In
		} else {
			ZoomDirection::Out
		};
		self.on_zoom(Some(screen), direction)
	}

	pub fn on_double_click(&mut self, screen: Point) {
		if let Some(id) = self.node_at(screen) {
			self.on_node_double_click(&id);
		}
	}

	pub fn on_touch_start(&mut self, screen: Point) {
		self.touch_last = Some(screen);
		self.panning = true;
	}

	pub fn on_touch_move(&mut self, screen: Point) {
		if !(self.panning && self.config.panning_enabled) {
			return;
		}
		if let Some(last) = self.touch_last.replace(screen) {
			self.pan(screen.x - last.x, screen.y - last.y);
		}
	}

	pub fn on_touch_end(&mut self) {
		self.panning = false;
		self.touch_last = None;
	}

	pub fn on_node_mouse_down(&mut self, id: &str, screen: Point) {
		if !self.config.dragging_enabled {
			return;
		}
		let Some(node) = self.graph.node(id) else {
			warn!("graph view: drag on unknown node '{}'", id);
			return;
		};
		let pointer = self.screen_to_graph(screen).unwrap_or_default();
		self.layout.on_drag_start(node, pointer);
		self.dragging = Some(id.to_string());
	}

	/// Moves the dragged node by a screen delta and re-routes its edges.
	fn on_drag(&mut self, movement: Point, screen: Point) {
		let Some(id) = self.dragging.clone() else {
			return;
		};
		let pointer = self.screen_to_graph(screen).unwrap_or_default();
		if let Some(node) = self.graph.node(&id) {
			self.layout.on_drag(node, pointer);
		}

		let zoom = self.zoom_level();
		let Some(node) = self.graph.node_mut(&id) else {
			warn!("graph view: dragged node '{}' disappeared", id);
			self.dragging = None;
			return;
		};
		let Some(position) = node.position.as_mut() else {
			debug!("graph view: dragged node '{}' has no position yet", id);
			return;
		};
		position.x += movement.x / zoom;
		position.y += movement.y / zoom;
		node.old_transform = node.transform.take();
		node.transform = node.render_transform();

		let touching = self.graph.edges_touching(&id);
		let mut latest = None;
		if self.layout.is_simulation() {
			// one tick moves every edge along with the dragged node
			if let Some(edge) = touching.first().and_then(|e| self.graph.edge(e)).cloned() {
				let mut run = self.layout.update_edge(&self.graph, &edge);
				if let Some(frame) = run.next() {
					self.apply_frame(&frame);
				}
				latest = Some(run);
			}
		} else {
			for edge_id in &touching {
				let Some(edge) = self.graph.edge(edge_id).cloned() else {
					continue;
				};
				let mut run = self.layout.update_edge(&self.graph, &edge);
				if let Some(frame) = run.next() {
					self.graph.apply_layout(&frame);
					self.redraw_edge(edge_id);
				}
				latest = Some(run);
			}
		}
		if let Some(run) = latest {
			self.cancel_run();
			self.run = Some(run);
		}
		self.graph_dims = self.graph.extent();
	}

	/// Marks every node not on a path into `id` (and every edge not pointing
	/// at such a path) as unhighlighted.
	pub fn on_node_mouse_enter(&mut self, id: &str) {
		if !self.config.hovering_enabled || self.dragging.is_some() {
			return;
		}
		let mut on_path: HashSet<String> = self.graph.ancestors(id).into_iter().collect();
		on_path.insert(id.to_string());

		for node in &mut self.graph.nodes {
			node.unhighlight = !on_path.contains(&node.id);
		}
		for edge in &mut self.graph.edges {
			edge.unhighlight = !on_path.contains(&edge.target);
		}
		self.hovered = Some(id.to_string());
	}

	pub fn on_node_mouse_leave(&mut self) {
		if !self.config.hovering_enabled || self.dragging.is_some() {
			return;
		}
		for node in &mut self.graph.nodes {
			node.unhighlight = false;
		}
		for edge in &mut self.graph.edges {
			edge.unhighlight = false;
		}
		self.hovered = None;
	}

	/// Toggles the collapse state of everything upstream of `id`.
	///
	/// Expands only when every ancestor is collapsed and so are the direct
	/// parents; otherwise collapses. Edges into a node that stays collapsed
	/// remain collapsed.
	pub fn on_node_double_click(&mut self, id: &str) {
		let ancestors: HashSet<String> = self.graph.ancestors(id).into_iter().collect();
		if ancestors.is_empty() {
			debug!("graph view: '{}' has nothing to collapse", id);
			return;
		}

		let all_collapsed = self
			.graph
			.nodes
			.iter()
			.filter(|n| ancestors.contains(&n.id))
			.all(|n| n.collapsed);
		let direct_parents: HashSet<&str> = self
			.graph
			.edges
			.iter()
			.filter(|e| e.target == id)
			.map(|e| e.source.as_str())
			.collect();
		let direct_parent_open = self
			.graph
			.nodes
			.iter()
			.any(|n| direct_parents.contains(n.id.as_str()) && !n.collapsed);
		let collapse = !all_collapsed || direct_parent_open;

		for node in &mut self.graph.nodes {
			if ancestors.contains(&node.id) {
				node.collapsed = collapse;
			}
		}
		let open_nodes: HashSet<String> = self
			.graph
			.nodes
			.iter()
			.filter(|n| !n.collapsed)
			.map(|n| n.id.clone())
			.collect();
		for edge in &mut self.graph.edges {
			if ancestors.contains(&edge.source) || ancestors.contains(&edge.target) {
				edge.collapsed = collapse || !open_nodes.contains(&edge.target);
			}
		}

		info!(
			"graph view: {} {} ancestors of '{}'",
			if collapse { "collapsed" } else { "expanded" },
			ancestors.len(),
			id
		);
		if self.config.compute_positions_after_collapse {
			self.needs_update = true;
		}
	}

	/// Cancels the active run and closes the command queue. The controller
	/// ignores every further frame.
	pub fn teardown(&mut self) {
		self.cancel_run();
		self.commands.close();
		self.dragging = None;
		self.panning = false;
		self.torn_down = true;
		debug!("graph view: torn down");
	}
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;
	use std::rc::Rc;

	use super::*;
	use crate::components::sg_graph::types::Edge;
	use proptest::prelude::*;
	use serde_json::json;

	fn measure_fixed(_: &Node) -> Option<NodeMeasurement> {
		Some(NodeMeasurement {
			width: 40.0,
			height: 30.0,
			text_width: None,
		})
	}

	fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> Graph {
		Graph::new(
			nodes.iter().map(|id| Node::new(*id)).collect(),
			edges
				.iter()
				.map(|(s, t)| Edge::new(format!("{s}{t}"), *s, *t))
				.collect(),
		)
	}

	fn laid_out(input: Graph) -> GraphViewState {
		let mut view = GraphViewState::new(GraphConfig::default());
		view.set_data(input);
		view.attach(800.0, 600.0);
		assert!(view.frame(&measure_fixed));
		view
	}

	fn screen_of(view: &GraphViewState, id: &str) -> Point {
		view.graph_to_screen(view.graph().node(id).and_then(|n| n.position).unwrap())
	}

	#[test]
	fn nothing_happens_before_attach() {
		let mut view = GraphViewState::new(GraphConfig::default());
		view.set_data(graph(&["a"], &[]));
		assert!(!view.frame(&measure_fixed));
		assert!(!view.is_initialized());
	}

	#[test]
	fn first_frame_lays_out_and_builds_geometry() {
		let view = laid_out(graph(&["a", "b"], &[("a", "b")]));
		let a = view.graph().node("a").unwrap();
		assert_eq!(a.dimension, Some(Dimension::new(40.0, 30.0)));
		assert!(a.transform.as_deref().unwrap().starts_with("translate("));
		let edge = view.graph().edge("ab").unwrap();
		assert!(edge.line.as_deref().unwrap().starts_with('M'));
		assert_eq!(edge.old_line, edge.line);
		assert!(view.graph_dims().width > 0.0);
		assert!(view.is_initialized());
	}

	#[test]
	fn measurement_prefers_config_then_text_then_box() {
		let mut view = GraphViewState::new(GraphConfig {
			node_height: Some(50.0),
			node_max_width: Some(100.0),
			..GraphConfig::default()
		});
		view.set_data(graph(&["short", "long", "boxed"], &[]));
		let measurer = |node: &Node| {
			let text_width = match node.id.as_str() {
				"short" => Some(30.0),
				"long" => Some(400.0),
				_ => None,
			};
			Some(NodeMeasurement {
				width: 60.0,
				height: 10.0,
				text_width,
			})
		};
		view.apply_node_dimensions(&measurer);
		let size = |id: &str| view.graph().node(id).unwrap().dimension.unwrap();
		assert_eq!(size("short"), Dimension::new(50.0, 50.0));
		assert_eq!(size("long"), Dimension::new(100.0, 50.0));
		assert_eq!(size("boxed"), Dimension::new(60.0, 50.0));
	}

	#[test]
	fn unmeasurable_nodes_keep_their_size() {
		let mut view = GraphViewState::new(GraphConfig::default());
		view.set_data(graph(&["a"], &[]));
		view.update();
		view.apply_node_dimensions(&|_: &Node| -> Option<NodeMeasurement> { None });
		assert_eq!(
			view.graph().node("a").unwrap().dimension,
			Some(Dimension::new(30.0, 30.0))
		);
		assert_eq!(view.graph().node("a").unwrap().data, json!({}));
	}

	#[test]
	fn dangling_edges_do_not_abort_rendering() {
		let mut input = graph(&["a", "b"], &[("a", "b")]);
		input.edges.push(Edge::new("ghost", "a", "missing"));
		let view = laid_out(input);
		assert!(view.graph().edge("ghost").unwrap().line.is_none());
		assert!(view.graph().edge("ab").unwrap().line.is_some());
	}

	#[test]
	fn panning_is_zoom_invariant() {
		let mut view = laid_out(graph(&["a"], &[]));
		view.zoom_to(2.0);
		let probe = Point::new(100.0, 100.0);
		let before = view.screen_to_graph(probe).unwrap();
		view.pan(30.0, -10.0);
		let after = view.screen_to_graph(probe).unwrap();
		assert!((before.x - after.x - 15.0).abs() < 1e-9);
		assert!((before.y - after.y + 5.0).abs() < 1e-9);
	}

	#[test]
	fn zoom_keeps_the_point_under_the_pointer() {
		let mut view = laid_out(graph(&["a"], &[]));
		view.pan(40.0, 25.0);
		let pointer = Point::new(320.0, 240.0);
		let before = view.screen_to_graph(pointer).unwrap();
		assert!(view.on_wheel(pointer, -1.0));
		assert!((view.zoom_level() - 1.1).abs() < 1e-9);
		let after = view.screen_to_graph(pointer).unwrap();
		assert!((before.x - after.x).abs() < 1e-9);
		assert!((before.y - after.y).abs() < 1e-9);
	}

	#[test]
	fn disabled_zoom_rejects_steps() {
		let mut view = GraphViewState::new(GraphConfig {
			enable_zoom: false,
			..GraphConfig::default()
		});
		assert!(!view.on_zoom(None, ZoomDirection::In));
		assert_eq!(view.zoom_level(), 1.0);
	}

	proptest! {
		#[test]
		fn zoom_stays_within_bounds(steps in proptest::collection::vec(any::<bool>(), 0..120)) {
			let mut view = GraphViewState::new(GraphConfig::default());
			for zoom_in in steps {
				let direction = if zoom_in { ZoomDirection::In } else { ZoomDirection::Out };
				view.on_zoom(Some(Point::new(50.0, 50.0)), direction);
				prop_assert!(view.zoom_level() <= view.config().max_zoom_level);
				prop_assert!(view.zoom_level() >= view.config().min_zoom_level);
			}
		}
	}

	#[test]
	fn zoom_to_fit_shrinks_and_centres() {
		let mut view = laid_out(graph(&["a"], &[]));
		view.graph_dims = Dimension::new(1600.0, 300.0);
		view.zoom_to_fit();
		assert_eq!(view.zoom_level(), 0.5);
		assert_eq!(view.pan_offset_x(), 0.0);
		assert_eq!(view.pan_offset_y(), 300.0 - 75.0);
	}

	#[test]
	fn commands_are_processed_on_the_next_frame() {
		let mut view = laid_out(graph(&["a"], &[]));
		view.graph_dims = Dimension::new(1600.0, 300.0);
		let tx = view.commands();
		tx.send(ViewCommand::ZoomToFit).unwrap();
		assert!(view.frame(&measure_fixed));
		assert_eq!(view.zoom_level(), 0.5);

		view.teardown();
		assert!(tx.send(ViewCommand::Center).is_err());
		assert!(!view.frame(&measure_fixed));
		assert!(!view.is_running());
	}

	#[test]
	fn dragging_moves_the_node_and_reroutes_its_edges() {
		let mut view = laid_out(graph(&["a", "b"], &[("a", "b")]));
		let start = screen_of(&view, "a");
		let before = view.graph().node("a").unwrap().position.unwrap();
		let old_route = view.graph().edge("ab").unwrap().points.clone();

		view.on_pointer_down(start);
		assert_eq!(view.dragging(), Some("a"));
		view.on_pointer_move(Point::new(start.x + 10.0, start.y + 4.0));
		let after = view.graph().node("a").unwrap().position.unwrap();
		assert_eq!(after, Point::new(before.x + 10.0, before.y + 4.0));
		let route = view.graph().edge("ab").unwrap().points.clone().unwrap();
		assert_eq!(route.len(), 2);
		assert_eq!(route[0].x, after.x);
		assert_ne!(Some(route), old_route);

		view.on_pointer_up(Some(start));
		assert_eq!(view.dragging(), None);
	}

	#[test]
	fn background_drag_pans() {
		let mut view = laid_out(graph(&["a"], &[]));
		let (x, y) = (view.pan_offset_x(), view.pan_offset_y());
		view.on_pointer_down(Point::new(790.0, 590.0));
		assert!(view.is_panning());
		view.on_pointer_move(Point::new(770.0, 600.0));
		assert_eq!(view.pan_offset_x(), x - 20.0);
		assert_eq!(view.pan_offset_y(), y + 10.0);
		view.on_pointer_up(None);
		assert!(!view.is_panning());
	}

	#[test]
	fn touch_drag_pans() {
		let mut view = GraphViewState::new(GraphConfig::default());
		view.on_touch_start(Point::new(0.0, 0.0));
		view.on_touch_move(Point::new(5.0, 7.0));
		view.on_touch_move(Point::new(6.0, 7.0));
		assert_eq!((view.pan_offset_x(), view.pan_offset_y()), (6.0, 7.0));
		view.on_touch_end();
		view.on_touch_move(Point::new(50.0, 50.0));
		assert_eq!(view.pan_offset_x(), 6.0);
	}

	#[test]
	fn hover_dims_everything_off_the_path() {
		let mut view = laid_out(graph(&["a", "b", "c", "x"], &[("a", "b"), ("b", "c"), ("x", "a")]));
		view.on_node_mouse_enter("b");
		let dim = |id: &str| view.graph().node(id).unwrap().unhighlight;
		assert!(!dim("a") && !dim("b") && !dim("x"));
		assert!(dim("c"));
		assert!(view.graph().edge("bc").unwrap().unhighlight);
		assert!(!view.graph().edge("ab").unwrap().unhighlight);

		view.on_pointer_up(None);
		assert!(view.graph().nodes.iter().all(|n| !n.unhighlight));
		assert!(view.graph().edges.iter().all(|e| !e.unhighlight));
	}

	#[test]
	fn double_click_collapses_then_expands_the_chain() {
		let mut view = laid_out(graph(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "d")]));
		view.on_node_double_click("d");
		for id in ["a", "b", "c"] {
			assert!(view.graph().node(id).unwrap().collapsed);
		}
		assert!(!view.graph().node("d").unwrap().collapsed);
		assert!(view.graph().edges.iter().all(|e| e.collapsed));

		view.on_node_double_click("d");
		assert!(view.graph().nodes.iter().all(|n| !n.collapsed));
		assert!(view.graph().edges.iter().all(|e| !e.collapsed));
	}

	#[test]
	fn edges_into_collapsed_nodes_stay_collapsed() {
		let mut view = laid_out(graph(&["a", "b", "c", "e"], &[("a", "b"), ("b", "c"), ("a", "e")]));
		view.on_node_double_click("c");
		view.graph.node_mut("e").unwrap().collapsed = true;

		view.on_node_double_click("c");
		assert!(!view.graph().node("a").unwrap().collapsed);
		assert!(!view.graph().edge("ab").unwrap().collapsed);
		assert!(view.graph().edge("ae").unwrap().collapsed);
	}

	#[test]
	fn collapse_terminates_on_cycles_and_relayouts() {
		let mut view = laid_out(graph(&["a", "b"], &[("a", "b"), ("b", "a")]));
		view.on_node_double_click("a");
		assert!(view.graph().node("b").unwrap().collapsed);
		assert!(view.frame(&measure_fixed));
		assert!(view.graph().node("b").unwrap().collapsed);
	}

	#[test]
	fn set_data_keeps_state_of_known_ids() {
		let mut view = laid_out(graph(&["a", "b"], &[("a", "b")]));
		view.graph.node_mut("a").unwrap().collapsed = true;
		let position = view.graph().node("a").unwrap().position;

		view.set_data(graph(&["a", "c"], &[("a", "c")]));
		let a = view.graph().node("a").unwrap();
		assert!(a.collapsed);
		assert_eq!(a.position, position);
		assert!(view.graph().node("b").is_none());
		assert!(view.graph().node("c").unwrap().position.is_none());
	}

	#[test]
	fn unknown_layout_keeps_the_current_one() {
		let mut view = GraphViewState::new(GraphConfig::default());
		assert!(view.set_layout(Some("radial")).is_err());
		assert_eq!(view.layout_name(), "dagre");
		view.set_layout(Some("d3ForceDirected")).unwrap();
		assert_eq!(view.layout_name(), "d3ForceDirected");
		view.set_layout(None).unwrap();
		assert_eq!(view.layout_name(), "dagre");
	}

	#[test]
	fn invalid_settings_are_reported() {
		let mut view = GraphViewState::new(GraphConfig::default());
		assert!(view.set_layout_settings(json!({ "orientation": 7 })).is_err());
		view.set_layout_settings(json!({ "orientation": "BT" })).unwrap();
	}

	#[test]
	fn force_runs_stream_until_torn_down() {
		let mut view = GraphViewState::new(GraphConfig::default());
		view.set_layout(Some("d3ForceDirected")).unwrap();
		view.set_data(graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]));
		view.attach(800.0, 600.0);
		for _ in 0..5 {
			assert!(view.frame(&measure_fixed));
		}
		assert!(view.is_running());
		assert!(view.graph().nodes.iter().all(|n| n.position.unwrap().is_finite()));

		view.commands().send(ViewCommand::Update).unwrap();
		assert!(view.frame(&measure_fixed));
		assert!(view.is_running());

		view.teardown();
		assert!(!view.is_running());
	}

	#[test]
	fn unmeasured_viewport_keeps_the_transform_usable() {
		let mut view = GraphViewState::new(GraphConfig::default());
		view.set_data(graph(&["a", "b"], &[("a", "b")]));
		view.attach(0.0, 0.0);
		view.frame(&measure_fixed);

		view.zoom_to_fit();
		assert_eq!(view.zoom_level(), 1.0);
		view.zoom_to(0.0);
		view.zoom_to(-2.0);
		assert_eq!(view.zoom_level(), 1.0);
		assert!(view.screen_to_graph(Point::new(5.0, 5.0)).is_some());

		view.pan(10.0, 5.0);
		assert_eq!((view.pan_offset_x(), view.pan_offset_y()), (10.0, 5.0));
		assert!(view.on_zoom(None, ZoomDirection::In));
		assert!(view.zoom_level() > 1.0);
	}

	#[test]
	fn auto_zoom_fits_and_centres_after_each_frame() {
		let mut view = GraphViewState::new(GraphConfig {
			auto_zoom: true,
			..GraphConfig::default()
		});
		view.set_data(graph(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "d")]));
		view.attach(200.0, 100.0);
		assert!(view.frame(&measure_fixed));

		let zoom = view.zoom_level();
		let dims = view.graph_dims();
		assert!(zoom < 1.0);
		assert!(dims.width * zoom <= 200.0 + 1e-9);
		assert!(dims.height * zoom <= 100.0 + 1e-9);
		assert!((view.pan_offset_x() - (100.0 - dims.width * zoom / 2.0)).abs() < 1e-9);
		assert!((view.pan_offset_y() - (50.0 - dims.height * zoom / 2.0)).abs() < 1e-9);
	}

	#[test]
	fn auto_center_recentres_without_zooming() {
		let mut view = GraphViewState::new(GraphConfig {
			auto_center: true,
			..GraphConfig::default()
		});
		view.set_data(graph(&["a", "b"], &[("a", "b")]));
		view.attach(800.0, 600.0);
		assert!(view.frame(&measure_fixed));

		let dims = view.graph_dims();
		assert_eq!(view.zoom_level(), 1.0);
		assert!((view.pan_offset_x() - (400.0 - dims.width / 2.0)).abs() < 1e-9);
		assert!((view.pan_offset_y() - (300.0 - dims.height / 2.0)).abs() < 1e-9);
	}

	/// Places nodes on a grid and counts `update_edge` calls.
	struct Counting {
		simulation: bool,
		calls: Rc<Cell<usize>>,
	}

	impl Layout for Counting {
		fn name(&self) -> &'static str {
			"counting"
		}

		fn apply_settings(&mut self, _settings: &Value) -> Result<(), LayoutError> {
			Ok(())
		}

		fn run(&mut self, graph: &Graph, _ignore_collapsed: bool) -> LayoutRun {
			let mut frame = graph.clone();
			for (i, node) in frame.nodes.iter_mut().enumerate() {
				node.position = Some(Point::new(100.0 + 200.0 * i as f64, 100.0));
			}
			LayoutRun::once(frame)
		}

		fn update_edge(&mut self, graph: &Graph, _edge: &Edge) -> LayoutRun {
			self.calls.set(self.calls.get() + 1);
			LayoutRun::once(graph.clone())
		}

		fn is_simulation(&self) -> bool {
			self.simulation
		}
	}

	fn drag_hub(simulation: bool) -> usize {
		let calls = Rc::new(Cell::new(0));
		let mut view = GraphViewState::new(GraphConfig::default());
		view.set_layout_instance(Box::new(Counting {
			simulation,
			calls: calls.clone(),
		}))
		.unwrap();
		view.set_data(graph(&["a", "b", "c", "d"], &[("a", "b"), ("a", "c"), ("d", "a")]));
		view.attach(800.0, 600.0);
		assert!(view.frame(&measure_fixed));

		let start = screen_of(&view, "a");
		view.on_pointer_down(start);
		assert_eq!(view.dragging(), Some("a"));
		view.on_pointer_move(Point::new(start.x + 5.0, start.y + 5.0));
		assert!(view.is_running());
		calls.get()
	}

	#[test]
	fn simulations_advance_once_per_drag_move() {
		assert_eq!(drag_hub(true), 1);
		assert_eq!(drag_hub(false), 3);
	}
}
