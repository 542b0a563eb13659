use crate::util::anchored;
use regex::Regex;
use serde_json::Value;
use starloc_core::PathAddress;

const WILDCARD: &str = "*";

/// Patterns selecting text addresses in documents whose name ends with `suffix`.
#[derive(Debug, Clone)]
pub struct FieldRule {
    suffix: String,
    patterns: Vec<Regex>,
}

impl FieldRule {
    pub fn new(suffix: &str, patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| anchored(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            suffix: suffix.to_string(),
            patterns,
        })
    }

    fn applies_to(&self, document: &str) -> bool {
        self.suffix == WILDCARD || document.ends_with(&self.suffix)
    }

    fn selects(&self, address: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(address))
    }
}

/// Decides which leaves of a document are candidate text.
#[derive(Debug, Clone)]
pub struct FieldSelector {
    rules: Vec<FieldRule>,
    dialog_dir_suffix: String,
}

impl FieldSelector {
    pub fn new(rules: Vec<FieldRule>, dialog_dir_suffix: impl Into<String>) -> Self {
        Self {
            rules,
            dialog_dir_suffix: dialog_dir_suffix.into(),
        }
    }

    /// File name suffixes that make a file part of the scan. Wildcard rules
    /// only widen the field selection of files picked by these.
    pub fn scanned_suffixes(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .rules
            .iter()
            .filter(|r| r.suffix != WILDCARD)
            .map(|r| r.suffix.clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Dialog documents live in a directory whose name ends with the dialog suffix.
    pub fn is_dialog(&self, document: &str) -> bool {
        let parent = document.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        parent.ends_with(&self.dialog_dir_suffix)
    }

    /// Non-empty string leaves of `doc` that hold translatable text, in document order.
    pub fn select(&self, document: &str, doc: &Value) -> Vec<(PathAddress, String)> {
        let dialog = self.is_dialog(document);
        let rules: Vec<&FieldRule> = self.rules.iter().filter(|r| r.applies_to(document)).collect();
        let mut out = Vec::new();
        for address in starloc_parsers_json::flatten_paths(doc) {
            if !dialog {
                let rendered = address.to_string();
                if !rules.iter().any(|r| r.selects(&rendered)) {
                    continue;
                }
            }
            let value = match starloc_parsers_json::get(doc, &address) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(event = "select_unreachable", document = document, error = %e);
                    continue;
                }
            };
            match value {
                Value::String(s) if s.is_empty() => {}
                Value::String(s) => out.push((address, s.clone())),
                _ if dialog => {}
                _ => {
                    let err = starloc_core::StarlocError::NotAString {
                        document: document.to_string(),
                        address,
                    };
                    tracing::warn!(event = "not_a_string", error = %err);
                }
            }
        }
        out
    }
}
