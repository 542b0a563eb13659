use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use starloc_core::{PathAddress, StarlocError};

pub const SCHEMA_VERSION: u32 = 1;

/// Provenance of a label: document id to the addresses the text sits at.
pub type Provenance = BTreeMap<String, BTreeSet<PathAddress>>;

/// One entry of a storage file.
///
/// Fields are declared in wire-name order so the persisted object has sorted keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LabelRecord {
    /// Section the label was classified into, if any.
    #[serde(rename = "Comment", default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "DeniedAlternatives", default)]
    pub denied_alternatives: BTreeSet<String>,
    #[serde(rename = "Files", default)]
    #[schemars(with = "BTreeMap<String, Vec<String>>")]
    pub files: Provenance,
    /// Language code to text; the source language holds the dedup key.
    #[serde(rename = "Texts")]
    pub texts: BTreeMap<String, String>,
}

impl LabelRecord {
    pub fn source_text(&self, source_lang: &str) -> &str {
        self.texts.get(source_lang).map(String::as_str).unwrap_or("")
    }

    /// Translation in `lang`; an empty string counts as untranslated.
    pub fn translation(&self, lang: &str) -> Option<&str> {
        self.texts
            .get(lang)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }

    pub fn set_translation(&mut self, lang: &str, text: impl Into<String>) {
        self.texts.insert(lang.to_string(), text.into());
    }

    pub fn references(&self, document: &str, address: &PathAddress) -> bool {
        self.files
            .get(document)
            .map(|addrs| addrs.contains(address))
            .unwrap_or(false)
    }
}

/// Routing overrides: document id → address → storage file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SubstitutionTable(
    #[schemars(with = "BTreeMap<String, BTreeMap<String, String>>")]
    pub BTreeMap<String, BTreeMap<PathAddress, String>>,
);

impl SubstitutionTable {
    pub fn get(&self, document: &str, address: &PathAddress) -> Option<&str> {
        self.0
            .get(document)
            .and_then(|m| m.get(address))
            .map(String::as_str)
    }

    pub fn for_document(&self, document: &str) -> Option<&BTreeMap<PathAddress, String>> {
        self.0.get(document)
    }

    pub fn insert(&mut self, document: &str, address: PathAddress, storage: impl Into<String>) {
        self.0
            .entry(document.to_string())
            .or_default()
            .insert(address, storage.into());
    }

    /// Fold `other` in; entries already present win.
    pub fn absorb(&mut self, other: SubstitutionTable) {
        for (doc, fields) in other.0 {
            let entry = self.0.entry(doc).or_default();
            for (addr, file) in fields {
                entry.entry(addr).or_insert(file);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }
}

/// A single operation of a `.patch` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PatchOperation {
    pub op: String,
    /// Kept raw so one bad path only skips its own operation.
    pub path: String,
    pub value: serde_json::Value,
}

impl PatchOperation {
    pub fn replace(path: &PathAddress, value: impl Into<String>) -> Self {
        Self {
            op: "replace".into(),
            path: path.to_string(),
            value: serde_json::Value::String(value.into()),
        }
    }

    pub fn address(&self) -> Result<PathAddress, StarlocError> {
        PathAddress::parse(&self.path)
    }
}

/// Label counts nested by storage-file path segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CounterTree {
    Count(usize),
    Dir(BTreeMap<String, CounterTree>),
}

impl Default for CounterTree {
    fn default() -> Self {
        CounterTree::Dir(BTreeMap::new())
    }
}

impl CounterTree {
    /// Set the count at the leaf addressed by `segments`, creating directories on the way.
    pub fn set(&mut self, segments: &[&str], value: usize) {
        let Some((last, dirs)) = segments.split_last() else {
            *self = CounterTree::Count(value);
            return;
        };
        let mut node = self;
        for seg in dirs {
            node = node.dir_mut().entry(seg.to_string()).or_default();
        }
        node.dir_mut()
            .insert(last.to_string(), CounterTree::Count(value));
    }

    pub fn add(&mut self, segments: &[&str], delta: usize) {
        let current = self.get(segments).unwrap_or(0);
        self.set(segments, current + delta);
    }

    pub fn get(&self, segments: &[&str]) -> Option<usize> {
        let mut node = self;
        for seg in segments {
            match node {
                CounterTree::Dir(children) => node = children.get(*seg)?,
                CounterTree::Count(_) => return None,
            }
        }
        match node {
            CounterTree::Count(n) => Some(*n),
            CounterTree::Dir(_) => None,
        }
    }

    pub fn total(&self) -> usize {
        match self {
            CounterTree::Count(n) => *n,
            CounterTree::Dir(children) => children.values().map(CounterTree::total).sum(),
        }
    }

    fn dir_mut(&mut self) -> &mut BTreeMap<String, CounterTree> {
        if let CounterTree::Count(_) = self {
            *self = CounterTree::Dir(BTreeMap::new());
        }
        match self {
            CounterTree::Dir(children) => children,
            CounterTree::Count(_) => unreachable!("replaced by a directory above"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractSummary {
    pub schema_version: u32,
    pub documents: usize,
    pub skipped_documents: usize,
    pub records: usize,
    pub labels: usize,
    pub storage_files: usize,
    pub substitutions: usize,
    pub dangling: Vec<String>,
    /// Existing storage files that could not be read; their translations are lost on write.
    pub unreadable_storage: Vec<String>,
    pub cancelled: bool,
    pub written: usize,
    pub deleted: usize,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExportSummary {
    pub schema_version: u32,
    pub storage_files: usize,
    pub patch_files: usize,
    pub operations: usize,
    pub total_labels: usize,
    pub translated_labels: usize,
    /// Percentage of labels carrying a translation.
    pub completion: f64,
    pub passthrough_files: usize,
    pub long_codex_entries: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MergeSummary {
    pub schema_version: u32,
    pub patch_files: usize,
    pub operations: usize,
    pub accepted: usize,
    pub unchanged: usize,
    pub denied_skipped: usize,
    pub conflicts_new: usize,
    pub conflicts_old: usize,
    pub conflicts_manual: usize,
    pub routing_misses: usize,
    pub ambiguous_splits: usize,
    pub malformed: usize,
    pub invalid_paths: usize,
    pub files_written: usize,
    pub passthrough_files: usize,
    pub failed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_record_keys_are_sorted_on_the_wire() {
        let mut rec = LabelRecord::default();
        rec.texts.insert("Eng".into(), "Hello".into());
        rec.files.entry("a.item".into()).or_default().insert(
            PathAddress::parse("/description").unwrap(),
        );
        rec.comment = Some("npcnames".into());
        let json = serde_json::to_string(&rec).unwrap();
        let c = json.find("\"Comment\"").unwrap();
        let d = json.find("\"DeniedAlternatives\"").unwrap();
        let f = json.find("\"Files\"").unwrap();
        let t = json.find("\"Texts\"").unwrap();
        assert!(c < d && d < f && f < t, "{json}");
    }

    #[test]
    fn missing_denied_alternatives_default_to_empty() {
        let rec: LabelRecord =
            serde_json::from_str(r#"{"Texts":{"Eng":"Hi"},"Files":{"x.item":["/a"]}}"#).unwrap();
        assert!(rec.denied_alternatives.is_empty());
        assert!(rec.references("x.item", &PathAddress::parse("/a").unwrap()));
        assert_eq!(rec.translation("Rus"), None);
    }

    #[test]
    fn counter_tree_nests_and_totals() {
        let mut tree = CounterTree::default();
        tree.set(&["texts", "items", "a.json"], 3);
        tree.set(&["texts", "b.json"], 2);
        tree.add(&["texts", "b.json"], 1);
        assert_eq!(tree.get(&["texts", "b.json"]), Some(3));
        assert_eq!(tree.total(), 6);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["texts"]["items"]["a.json"], 3);
    }

    #[test]
    fn substitution_table_round_trips_address_keys() {
        let mut subs = SubstitutionTable::default();
        subs.insert(
            "npcs/a.npctype",
            PathAddress::parse("/greeting/glitchEmote").unwrap(),
            "texts/glitchEmotes.json",
        );
        let json = serde_json::to_string(&subs).unwrap();
        let back: SubstitutionTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, subs);
        assert_eq!(back.len(), 1);
    }
}
