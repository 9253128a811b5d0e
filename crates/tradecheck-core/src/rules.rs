//! Rule selection (document type → rule ids) and the on-disk rule library.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{DocumentType, RuleDocument};

/// Which rule documents apply to which document type.
///
/// `general_rules` always apply. `document_specific_rules` is keyed by the
/// display name of a [`DocumentType`] (e.g. `"BILL OF LADING"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSelection {
    pub general_rules: Vec<String>,
    pub document_specific_rules: BTreeMap<String, Vec<String>>,
}

impl RuleSelection {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig(format!("rules selection: {e}")))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// General rules first, then the type-specific ones; duplicates dropped.
    pub fn rule_ids_for(&self, doc_type: DocumentType) -> Vec<String> {
        let specific = self
            .document_specific_rules
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(doc_type.as_str()))
            .map(|(_, v)| v.as_slice())
            .unwrap_or_default();
        let mut seen = HashSet::new();
        self.general_rules
            .iter()
            .chain(specific)
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }

    /// Every id referenced anywhere in the selection, first occurrence order.
    pub fn referenced_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.general_rules
            .iter()
            .chain(self.document_specific_rules.values().flatten())
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }
}

/// Rule documents loaded into memory, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct RuleLibrary {
    documents: BTreeMap<String, String>,
}

impl RuleLibrary {
    pub fn new() -> Self { Self::default() }

    /// Loads every `.txt` file under `dir`. Invalid UTF-8 is decoded lossily.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("rules directory {}", dir.display())));
        }
        let mut library = Self::new();
        for path in list_txt_files(dir) {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else { continue };
            let text = read_file_content(&path)?;
            if library.documents.insert(name.clone(), text).is_some() {
                warn!(rule = %name, path = %path.display(), "duplicate rule file name; later file wins");
            }
        }
        debug!(dir = %dir.display(), rules = library.len(), "loaded rule library");
        Ok(library)
    }

    pub fn insert(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(id.into(), text.into());
    }

    pub fn get(&self, id: &str) -> Option<&str> { self.documents.get(id).map(String::as_str) }

    pub fn len(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }

    pub fn ids(&self) -> impl Iterator<Item = &str> { self.documents.keys().map(String::as_str) }

    /// The requested documents in request order. Absent ids are skipped and logged.
    pub fn select(&self, ids: &[String]) -> Vec<RuleDocument> {
        ids.iter()
            .filter_map(|id| match self.get(id) {
                Some(text) => Some(RuleDocument::new(id.clone(), text)),
                None => {
                    warn!(rule = %id, "rule file referenced but not loaded");
                    None
                }
            })
            .collect()
    }

    /// Ids referenced by `selection` that this library does not hold.
    pub fn missing(&self, selection: &RuleSelection) -> Vec<String> {
        selection.referenced_ids().into_iter().filter(|id| !self.documents.contains_key(id)).collect()
    }
}

fn read_file_content(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
        .collect();
    txt_files.sort();
    txt_files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> RuleSelection {
        RuleSelection::from_json_str(
            r#"{
                "general_rules": ["general.txt", "presentation.txt"],
                "document_specific_rules": {
                    "BILL OF LADING": ["transport.txt", "general.txt"],
                    "COMMERCIAL INVOICE": ["invoice.txt"]
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn general_rules_come_first_without_duplicates() {
        let ids = selection().rule_ids_for(DocumentType::BillOfLading);
        assert_eq!(ids, ["general.txt", "presentation.txt", "transport.txt"]);
    }

    #[test]
    fn unknown_type_gets_general_rules_only() {
        let ids = selection().rule_ids_for(DocumentType::Unknown);
        assert_eq!(ids, ["general.txt", "presentation.txt"]);
    }

    #[test]
    fn missing_lists_unloaded_references() {
        let mut library = RuleLibrary::new();
        library.insert("general.txt", "g");
        library.insert("invoice.txt", "i");
        assert_eq!(library.missing(&selection()), ["presentation.txt", "transport.txt"]);
    }

    #[test]
    fn select_skips_absent_ids_and_keeps_order() {
        let mut library = RuleLibrary::new();
        library.insert("b.txt", "bee");
        library.insert("a.txt", "ay");
        let docs = library.select(&["b.txt".into(), "zzz.txt".into(), "a.txt".into()]);
        assert_eq!(docs, vec![RuleDocument::new("b.txt", "bee"), RuleDocument::new("a.txt", "ay")]);
    }

    #[test]
    fn malformed_selection_is_a_config_error() {
        assert!(matches!(RuleSelection::from_json_str("{\"general_rules\": 3}"), Err(Error::InvalidConfig(_))));
    }
}
