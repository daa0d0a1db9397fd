//! Pluggable layout algorithms.
//!
//! A [`Layout`] turns a [`Graph`] into positioned frames. Deterministic
//! algorithms emit a single frame; iterative ones keep emitting until their
//! simulation settles. Frames are pulled lazily through a [`LayoutRun`], which
//! the viewport cancels before starting the next run so a stale run can never
//! overwrite newer geometry.
//!
//! Algorithms are looked up by name through a [`LayoutRegistry`]; adding a new
//! one means implementing [`Layout`] and registering a constructor.

mod dagre;
mod force;

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;

use super::types::{Edge, Graph, Node, Point};

pub use dagre::{Acyclicer, Alignment, DagreLayout, DagreSettings, Orientation, Ranker};
pub use force::{ForceDirectedLayout, ForceDirectedSettings};

#[derive(Debug, Error)]
pub enum LayoutError {
	#[error("unknown layout type '{0}'")]
	UnknownLayout(String),
	#[error("invalid settings for layout '{layout}': {source}")]
	InvalidSettings {
		layout: &'static str,
		#[source]
		source: serde_json::Error,
	},
}

/// Shared flag that stops a [`LayoutRun`] from yielding further frames.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.set(true);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.get()
	}
}

/// Lazy sequence of layout frames.
pub struct LayoutRun {
	frames: Box<dyn Iterator<Item = Graph>>,
	token: CancelToken,
}

impl LayoutRun {
	/// A run that yields `graph` once.
	pub fn once(graph: Graph) -> Self {
		Self::from_iter(std::iter::once(graph))
	}

	/// A run that yields nothing.
	pub fn empty() -> Self {
		Self::from_iter(std::iter::empty())
	}

	/// A run driven by `next` until it returns `None`.
	pub fn from_fn(next: impl FnMut() -> Option<Graph> + 'static) -> Self {
		Self::from_iter(std::iter::from_fn(next))
	}

	fn from_iter(frames: impl Iterator<Item = Graph> + 'static) -> Self {
		Self {
			frames: Box::new(frames),
			token: CancelToken::new(),
		}
	}

	pub fn token(&self) -> CancelToken {
		self.token.clone()
	}

	pub fn cancel(&self) {
		self.token.cancel();
	}

	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}
}

impl Iterator for LayoutRun {
	type Item = Graph;

	fn next(&mut self) -> Option<Graph> {
		if self.token.is_cancelled() {
			return None;
		}
		self.frames.next()
	}
}

impl fmt::Debug for LayoutRun {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LayoutRun")
			.field("cancelled", &self.token.is_cancelled())
			.finish_non_exhaustive()
	}
}

/// A layout algorithm.
///
/// Implementations receive the graph by reference for the duration of a call
/// and copy whatever they need; frames carry the computed geometry back.
pub trait Layout {
	fn name(&self) -> &'static str;

	/// Replaces the algorithm settings from a free-form JSON object. Missing
	/// keys fall back to the algorithm defaults.
	fn apply_settings(&mut self, settings: &Value) -> Result<(), LayoutError>;

	/// Lays out every visible node and edge. With `ignore_collapsed`, collapsed
	/// elements are left out of the computation entirely.
	fn run(&mut self, graph: &Graph, ignore_collapsed: bool) -> LayoutRun;

	/// Cheap re-route of a single edge while one of its endpoints is dragged.
	fn update_edge(&mut self, graph: &Graph, edge: &Edge) -> LayoutRun;

	/// Whether frames come from one live simulation. Such a layout advances
	/// the whole graph on every `update_edge` call, so a drag asks it once
	/// per move instead of once per edge.
	fn is_simulation(&self) -> bool {
		false
	}

	fn on_drag_start(&mut self, _node: &Node, _pointer: Point) {}

	fn on_drag(&mut self, _node: &Node, _pointer: Point) {}

	fn on_drag_end(&mut self, _node: &Node, _pointer: Point) {}
}

/// The built-in algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutKind {
	Dagre,
	D3ForceDirected,
}

impl LayoutKind {
	pub fn name(self) -> &'static str {
		match self {
			LayoutKind::Dagre => "dagre",
			LayoutKind::D3ForceDirected => "d3ForceDirected",
		}
	}

	pub fn create(self) -> Box<dyn Layout> {
		match self {
			LayoutKind::Dagre => Box::new(DagreLayout::default()),
			LayoutKind::D3ForceDirected => Box::new(ForceDirectedLayout::default()),
		}
	}
}

pub type LayoutConstructor = fn() -> Box<dyn Layout>;

/// Name-keyed layout factory. The default registry knows every [`LayoutKind`].
#[derive(Clone)]
pub struct LayoutRegistry {
	constructors: BTreeMap<String, LayoutConstructor>,
}

impl Default for LayoutRegistry {
	fn default() -> Self {
		let mut registry = Self::empty();
		registry.register(LayoutKind::Dagre.name(), || LayoutKind::Dagre.create());
		registry.register(LayoutKind::D3ForceDirected.name(), || {
			LayoutKind::D3ForceDirected.create()
		});
		registry
	}
}

impl LayoutRegistry {
	pub fn empty() -> Self {
		Self {
			constructors: BTreeMap::new(),
		}
	}

	/// Registers (or replaces) the constructor for `name`.
	pub fn register(&mut self, name: impl Into<String>, constructor: LayoutConstructor) {
		self.constructors.insert(name.into(), constructor);
	}

	pub fn create(&self, name: &str) -> Result<Box<dyn Layout>, LayoutError> {
		self.constructors
			.get(name)
			.map(|constructor| constructor())
			.ok_or_else(|| LayoutError::UnknownLayout(name.to_string()))
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.constructors.keys().map(String::as_str)
	}
}

impl fmt::Debug for LayoutRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.names()).finish()
	}
}

/// Resolves a built-in layout by name.
pub fn create_layout(name: &str) -> Result<Box<dyn Layout>, LayoutError> {
	LayoutRegistry::default().create(name)
}
