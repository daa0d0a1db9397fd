//! Statement graph records as pushed by the reasoning service.
//!
//! Records are open: fields this crate does not know about are kept in
//! `extra` and survive a merge or a round trip.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Statement ids arrive as strings or numbers. `1` and `"1"` are different
/// ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementId {
	Number(Number),
	Text(String),
}

impl fmt::Display for ElementId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ElementId::Number(n) => write!(f, "{n}"),
			ElementId::Text(s) => f.write_str(s),
		}
	}
}

impl From<&str> for ElementId {
	fn from(id: &str) -> Self {
		ElementId::Text(id.to_string())
	}
}

impl From<u64> for ElementId {
	fn from(id: u64) -> Self {
		ElementId::Number(id.into())
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Statement {
	pub id: ElementId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
	pub kind: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub authors: Option<Vec<String>>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl Statement {
	pub fn new(id: impl Into<ElementId>) -> Self {
		Self {
			id: id.into(),
			title: None,
			kind: None,
			label: None,
			authors: None,
			extra: Map::new(),
		}
	}

	/// Copies every field present in `other` onto `self`; absent fields keep
	/// their current value.
	pub fn assign(&mut self, other: &Statement) {
		self.id = other.id.clone();
		assign_present(&mut self.title, &other.title);
		assign_present(&mut self.kind, &other.kind);
		assign_present(&mut self.label, &other.label);
		assign_present(&mut self.authors, &other.authors);
		for (key, value) in &other.extra {
			self.extra.insert(key.clone(), value.clone());
		}
	}

	/// Text shown in the statement box.
	pub fn display_label(&self) -> Option<&str> {
		self.label.as_deref().or(self.title.as_deref())
	}
}

/// An edge between two statements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SgEdge {
	pub id: String,
	pub source: ElementId,
	pub target: ElementId,
	#[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
	pub kind: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl SgEdge {
	pub fn new(
		id: impl Into<String>,
		source: impl Into<ElementId>,
		target: impl Into<ElementId>,
	) -> Self {
		Self {
			id: id.into(),
			source: source.into(),
			target: target.into(),
			kind: None,
			label: None,
			extra: Map::new(),
		}
	}

	pub fn assign(&mut self, other: &SgEdge) {
		self.id = other.id.clone();
		self.source = other.source.clone();
		self.target = other.target.clone();
		assign_present(&mut self.kind, &other.kind);
		assign_present(&mut self.label, &other.label);
		for (key, value) in &other.extra {
			self.extra.insert(key.clone(), value.clone());
		}
	}
}

fn assign_present<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
	if let Some(value) = value {
		*slot = Some(value.clone());
	}
}

/// A plain statement graph, as exported or persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementGraph {
	pub statements: Vec<Statement>,
	pub edges: Vec<SgEdge>,
}

/// One complete state pushed from outside. `queryStatements` are displayed
/// alongside the ordinary statements.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Snapshot {
	pub statements: Vec<Statement>,
	pub query_statements: Vec<Statement>,
	pub edges: Vec<SgEdge>,
}

impl Snapshot {
	/// Parses a snapshot; a JSON `null` is no snapshot at all.
	pub fn from_json(json: &str) -> Result<Option<Snapshot>, serde_json::Error> {
		serde_json::from_str(json)
	}
}
