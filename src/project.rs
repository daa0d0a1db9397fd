//! Projects and their knowledge bases, with JSON file import and export.

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Argumentation semantics a query can be evaluated under, as
/// `(value, description)`. The first entry is the default.
pub const SEMANTICS: [(&str, &str); 4] = [
	("BDLwithoutTD", "Ambiguity Blocking without Team Defeat"),
	("BDLwithTD", "Ambiguity Blocking with Team Defeat"),
	("PDLwithoutTD", "Ambiguity Propagating without Team Defeat"),
	("PDLwithTD", "Ambiguity Propagating with Team Defeat"),
];

pub const DEFAULT_SEMANTIC: &str = SEMANTICS[0].0;

#[derive(Debug, Error)]
pub enum ProjectError {
	#[error("malformed project file: {0}")]
	Parse(#[source] serde_json::Error),
	#[error("could not serialise project '{name}': {source}")]
	Serialize {
		name: String,
		#[source]
		source: serde_json::Error,
	},
}

/// One agent's knowledge, written in DLGP.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBase {
	/// Unset until the knowledge base has been saved once.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub dlgp: String,
	pub source: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub agent_id: Option<String>,
	pub selected: bool,
	/// `common` for the shared knowledge base.
	#[serde(rename = "type")]
	pub kind: String,
	pub locked: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub editors: Option<Vec<String>>,
}

impl Default for KnowledgeBase {
	fn default() -> Self {
		Self {
			id: None,
			dlgp: String::new(),
			source: String::new(),
			agent_id: None,
			selected: true,
			kind: String::new(),
			locked: false,
			editors: None,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(rename = "isPublic")]
	pub is_public: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub creator_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub contributors: Option<Vec<Value>>,
	pub kbs: Vec<KnowledgeBase>,
	pub query: String,
	pub semantic: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

impl Default for Project {
	fn default() -> Self {
		Self {
			name: String::new(),
			id: None,
			is_public: true,
			creator_id: None,
			contributors: None,
			kbs: Vec::new(),
			query: String::new(),
			semantic: DEFAULT_SEMANTIC.to_string(),
			description: None,
		}
	}
}

/// The parts of a project file an import takes over.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProjectFile {
	kbs: Vec<KnowledgeBase>,
	query: Option<String>,
	semantic: Option<String>,
}

impl Project {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	pub fn export_json(&self) -> Result<String, ProjectError> {
		serde_json::to_string(self).map_err(|source| ProjectError::Serialize {
			name: self.name.clone(),
			source,
		})
	}

	pub fn export_file_name(&self) -> String {
		format!("{}.json", self.name)
	}

	/// Replaces the knowledge bases with those of a project file. Query and
	/// semantic are taken over only when the file sets them.
	pub fn import_json(&mut self, json: &str) -> Result<(), ProjectError> {
		let file: ProjectFile = serde_json::from_str(json).map_err(ProjectError::Parse)?;
		self.kbs = file.kbs;
		if let Some(query) = file.query.filter(|q| !q.is_empty()) {
			self.query = query;
		}
		if let Some(semantic) = file.semantic.filter(|s| !s.is_empty()) {
			self.semantic = semantic;
		}
		info!(
			"project '{}': imported {} knowledge bases",
			self.name,
			self.kbs.len()
		);
		Ok(())
	}

	/// Selects every knowledge base, or deselects them all when all are
	/// already selected.
	pub fn toggle_all_kbs(&mut self) {
		let select = self.kbs.iter().any(|kb| !kb.selected);
		for kb in &mut self.kbs {
			kb.selected = select;
		}
	}

	pub fn selected_kbs(&self) -> impl Iterator<Item = &KnowledgeBase> {
		self.kbs.iter().filter(|kb| kb.selected)
	}

	/// Applies a saved knowledge base: matched by id, else by source (a base
	/// saved for the first time), else appended.
	pub fn update_kb(&mut self, kb: KnowledgeBase) {
		let index = self
			.kbs
			.iter()
			.position(|k| k.id.is_some() && k.id == kb.id)
			.or_else(|| self.kbs.iter().position(|k| k.source == kb.source));
		match index {
			Some(index) => {
				let current = &mut self.kbs[index];
				current.id = kb.id;
				current.dlgp = kb.dlgp;
				current.source = kb.source;
				current.agent_id = kb.agent_id;
				current.editors = kb.editors;
			}
			None => self.kbs.push(kb),
		}
	}

	pub fn remove_kb(&mut self, id: &str) {
		self.kbs.retain(|kb| kb.id.as_deref() != Some(id));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn kb(id: Option<&str>, source: &str) -> KnowledgeBase {
		KnowledgeBase {
			id: id.map(str::to_string),
			source: source.to_string(),
			..KnowledgeBase::default()
		}
	}

	#[test]
	fn new_projects_use_the_default_semantic() {
		let project = Project::new("p");
		assert_eq!(project.semantic, "BDLwithoutTD");
		assert!(project.is_public);
		assert_eq!(project.export_file_name(), "p.json");
	}

	#[test]
	fn export_then_import_restores_the_knowledge() {
		let mut exported = Project::new("p");
		exported.kbs = vec![kb(Some("1"), "alice"), kb(None, "common")];
		exported.query = "flies(tweety)".into();
		exported.semantic = "PDLwithTD".into();
		let json = exported.export_json().unwrap();

		let mut restored = Project::new("other");
		restored.import_json(&json).unwrap();
		assert_eq!(restored.kbs, exported.kbs);
		assert_eq!(restored.query, exported.query);
		assert_eq!(restored.semantic, exported.semantic);
		assert_eq!(restored.name, "other");
	}

	#[test]
	fn import_keeps_query_and_semantic_when_absent_or_empty() {
		let mut project = Project::new("p");
		project.query = "q".into();
		project.kbs = vec![kb(None, "old")];
		project
			.import_json(r#"{"kbs":[{"source":"new","dlgp":"a."}],"query":""}"#)
			.unwrap();
		assert_eq!(project.query, "q");
		assert_eq!(project.semantic, DEFAULT_SEMANTIC);
		assert_eq!(project.kbs.len(), 1);
		assert_eq!(project.kbs[0].source, "new");
		assert!(project.kbs[0].selected);
	}

	#[test]
	fn malformed_file_is_rejected() {
		let mut project = Project::new("p");
		let err = project.import_json("{\"kbs\": 4}").unwrap_err();
		assert!(matches!(err, ProjectError::Parse(_)));
		assert!(err.to_string().starts_with("malformed project file"));
	}

	#[test]
	fn saved_knowledge_bases_are_matched_by_id_then_source() {
		let mut project = Project::new("p");
		project.kbs = vec![kb(Some("1"), "alice"), kb(None, "bob")];

		let mut saved = kb(Some("2"), "bob");
		saved.dlgp = "b.".into();
		project.update_kb(saved);
		assert_eq!(project.kbs[1].id.as_deref(), Some("2"));
		assert_eq!(project.kbs[1].dlgp, "b.");

		project.update_kb(kb(Some("3"), "carol"));
		assert_eq!(project.kbs.len(), 3);

		project.remove_kb("1");
		assert_eq!(project.kbs.len(), 2);
		assert_eq!(project.kbs[0].source, "bob");
	}

	#[test]
	fn toggling_selection() {
		let mut project = Project::new("p");
		project.kbs = vec![kb(None, "a"), kb(None, "b")];
		project.kbs[0].selected = false;
		project.toggle_all_kbs();
		assert_eq!(project.selected_kbs().count(), 2);
		project.toggle_all_kbs();
		assert_eq!(project.selected_kbs().count(), 0);
	}
}
