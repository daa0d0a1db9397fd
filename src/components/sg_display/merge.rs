//! Identity-preserving merge of pushed snapshots into the displayed graph.
//!
//! Snapshots are full states. After a merge the display holds exactly the
//! snapshot's elements: ids already displayed keep their `Rc` and are updated
//! in place, new ids are appended in snapshot order and ids missing from the
//! snapshot are dropped. Within one snapshot the first occurrence of an id
//! wins.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

use log::{debug, info};

use super::model::{ElementId, SgEdge, Snapshot, Statement, StatementGraph};
use crate::components::sg_graph::{Edge, Graph, Node};

/// What a merge changed, per element kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeCounts {
	pub added: usize,
	pub updated: usize,
	pub removed: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
	pub statements: MergeCounts,
	pub edges: MergeCounts,
	/// The snapshot was `None` and nothing happened.
	pub skipped: bool,
}

trait Keyed {
	type Key: Eq + Hash + Clone;

	fn key(&self) -> &Self::Key;

	fn assign(&mut self, other: &Self);
}

impl Keyed for Statement {
	type Key = ElementId;

	fn key(&self) -> &ElementId {
		&self.id
	}

	fn assign(&mut self, other: &Self) {
		Statement::assign(self, other);
	}
}

impl Keyed for SgEdge {
	type Key = String;

	fn key(&self) -> &String {
		&self.id
	}

	fn assign(&mut self, other: &Self) {
		SgEdge::assign(self, other);
	}
}

/// The statements and edges currently on screen.
#[derive(Debug, Default)]
pub struct SgDisplay {
	statements: Vec<Rc<RefCell<Statement>>>,
	edges: Vec<Rc<RefCell<SgEdge>>>,
}

impl SgDisplay {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.statements.is_empty() && self.edges.is_empty()
	}

	pub fn statements(&self) -> &[Rc<RefCell<Statement>>] {
		&self.statements
	}

	pub fn edges(&self) -> &[Rc<RefCell<SgEdge>>] {
		&self.edges
	}

	pub fn statement(&self, id: &ElementId) -> Option<Rc<RefCell<Statement>>> {
		self.statements
			.iter()
			.find(|s| &s.borrow().id == id)
			.cloned()
	}

	/// Merges `snapshot` into the display. `None` is ignored.
	pub fn merge(&mut self, snapshot: Option<Snapshot>) -> MergeOutcome {
		let Some(snapshot) = snapshot else {
			debug!("sg-display: empty snapshot ignored");
			return MergeOutcome {
				skipped: true,
				..MergeOutcome::default()
			};
		};

		let mut statements = snapshot.statements;
		statements.extend(snapshot.query_statements);

		let outcome = MergeOutcome {
			statements: merge_list(&mut self.statements, statements),
			edges: merge_list(&mut self.edges, snapshot.edges),
			skipped: false,
		};
		info!(
			"sg-display: merged snapshot (statements +{} ~{} -{}, edges +{} ~{} -{})",
			outcome.statements.added,
			outcome.statements.updated,
			outcome.statements.removed,
			outcome.edges.added,
			outcome.edges.updated,
			outcome.edges.removed
		);
		outcome
	}

	/// Owned copy of the current state.
	pub fn snapshot(&self) -> StatementGraph {
		StatementGraph {
			statements: self.statements.iter().map(|s| s.borrow().clone()).collect(),
			edges: self.edges.iter().map(|e| e.borrow().clone()).collect(),
		}
	}

	/// The display as a graph for the viewport. Statement and edge records
	/// travel along as node and edge data.
	pub fn to_graph(&self) -> Graph {
		let nodes = self
			.statements
			.iter()
			.map(|statement| {
				let statement = statement.borrow();
				let mut node = Node::new(statement.id.to_string());
				node.label = statement.display_label().map(str::to_string);
				node.data = serde_json::to_value(&*statement).unwrap_or_default();
				node
			})
			.collect();
		let edges = self
			.edges
			.iter()
			.map(|edge| {
				let edge = edge.borrow();
				let mut out = Edge::new(
					edge.id.clone(),
					edge.source.to_string(),
					edge.target.to_string(),
				);
				out.label = edge.label.clone();
				out.data = serde_json::to_value(&*edge).unwrap_or_default();
				out
			})
			.collect();
		Graph::new(nodes, edges)
	}
}

fn merge_list<T: Keyed>(current: &mut Vec<Rc<RefCell<T>>>, incoming: Vec<T>) -> MergeCounts {
	let mut seen = HashSet::new();
	let incoming: Vec<T> = incoming
		.into_iter()
		.filter(|item| seen.insert(item.key().clone()))
		.collect();

	if current.is_empty() {
		let added = incoming.len();
		*current = incoming.into_iter().map(|i| Rc::new(RefCell::new(i))).collect();
		return MergeCounts {
			added,
			..MergeCounts::default()
		};
	}

	let by_key: HashMap<T::Key, usize> = incoming
		.iter()
		.enumerate()
		.map(|(index, item)| (item.key().clone(), index))
		.collect();

	let mut counts = MergeCounts::default();
	let mut kept = HashSet::new();
	let mut merged = Vec::with_capacity(incoming.len());
	for element in current.drain(..) {
		let matched = by_key.get(element.borrow().key()).copied();
		match matched {
			Some(index) => {
				element.borrow_mut().assign(&incoming[index]);
				kept.insert(index);
				counts.updated += 1;
				merged.push(element);
			}
			None => counts.removed += 1,
		}
	}
	for (index, item) in incoming.into_iter().enumerate() {
		if !kept.contains(&index) {
			counts.added += 1;
			merged.push(Rc::new(RefCell::new(item)));
		}
	}
	*current = merged;
	counts
}
