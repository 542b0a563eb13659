//! Merge translator patches back into the label database.
//!
//! Patches are processed one operation at a time. A storage file is written
//! as soon as one of its labels changes, so stopping mid-run keeps every
//! decision already taken.

use crate::database::load_storage;
use crate::handlers::split_glitch;
use crate::prompt::Operator;
use crate::routing::resolve_storage;
use crate::settings::Settings;
use crate::util::{join_slash, read_json, rel_slash, write_json_pretty};
use crate::Result;
use color_eyre::eyre::WrapErr;
use serde_json::Value;
use starloc_core::{PathAddress, StarlocError, GLITCH_EMOTE, GLITCH_EMOTED_TEXT};
use starloc_domain::{LabelRecord, MergeSummary, PatchOperation, SubstitutionTable, SCHEMA_VERSION};
use std::collections::{BTreeMap, BTreeSet};
use walkdir::WalkDir;

/// What an incoming text means for a label before asking anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Empty or equal to the current translation.
    Unchanged,
    /// Rejected for this label before.
    PreviouslyDenied,
    /// No translation yet.
    Accept,
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    AcceptNew,
    KeepOld,
    Manual(String),
}

pub fn decide(record: &LabelRecord, lang: &str, new_text: &str) -> Decision {
    let old = record.translation(lang).unwrap_or("");
    if new_text.is_empty() || new_text == old {
        Decision::Unchanged
    } else if record.denied_alternatives.contains(new_text) {
        Decision::PreviouslyDenied
    } else if old.is_empty() {
        Decision::Accept
    } else {
        Decision::Conflict
    }
}

/// Apply a conflict resolution; the losing text(s) become denied alternatives.
pub fn apply_resolution(record: &mut LabelRecord, lang: &str, new_text: &str, resolution: Resolution) {
    let old = record.translation(lang).unwrap_or("").to_string();
    let denied = &mut record.denied_alternatives;
    match resolution {
        Resolution::AcceptNew => {
            denied.insert(old);
            denied.remove(new_text);
            record.set_translation(lang, new_text);
        }
        Resolution::KeepOld => {
            denied.insert(new_text.to_string());
            denied.remove(&old);
        }
        Resolution::Manual(manual) => {
            if new_text != manual {
                denied.insert(new_text.to_string());
            }
            if old != manual {
                denied.insert(old);
            }
            denied.remove(&manual);
            record.set_translation(lang, manual);
        }
    }
}

pub struct MergeEngine<'a> {
    settings: &'a Settings,
    operator: &'a mut dyn Operator,
    substitutions: SubstitutionTable,
    /// Storage files loaded so far; `None` when unreadable.
    cache: BTreeMap<String, Option<Vec<LabelRecord>>>,
    written: BTreeSet<String>,
    summary: MergeSummary,
}

impl<'a> MergeEngine<'a> {
    pub fn new(
        settings: &'a Settings,
        operator: &'a mut dyn Operator,
        substitutions: SubstitutionTable,
    ) -> Self {
        Self {
            settings,
            operator,
            substitutions,
            cache: BTreeMap::new(),
            written: BTreeSet::new(),
            summary: MergeSummary {
                schema_version: SCHEMA_VERSION,
                ..Default::default()
            },
        }
    }

    /// Load `substitutions.json`; a missing file means no overrides.
    pub fn load_substitutions(settings: &Settings) -> Result<SubstitutionTable> {
        let path = settings.layout.substitutions_path();
        if !path.exists() {
            tracing::warn!(event = "substitutions_absent", path = %path.display());
            return Ok(SubstitutionTable::default());
        }
        read_json(&path).wrap_err_with(|| format!("reading {}", path.display()))
    }

    /// Process every file of the mod directory in path order.
    pub fn run(mut self) -> Result<MergeSummary> {
        let mod_dir = self.settings.mod_dir.clone();
        let mut files: Vec<_> = WalkDir::new(&mod_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        files.sort();

        for path in files {
            let rel = rel_slash(&mod_dir, &path);
            match rel.strip_suffix(".patch") {
                Some(document) => self.merge_patch_file(&path, document)?,
                None => self.keep_passthrough(&path, &rel),
            }
        }
        self.summary.files_written = self.written.len();
        tracing::info!(
            event = "merge_done",
            accepted = self.summary.accepted,
            conflicts = self.summary.conflicts_new + self.summary.conflicts_old + self.summary.conflicts_manual,
            misses = self.summary.routing_misses,
            written = self.summary.files_written
        );
        Ok(self.summary)
    }

    fn keep_passthrough(&mut self, path: &std::path::Path, rel: &str) {
        let dest = join_slash(&self.settings.layout.others_dir(), rel);
        if dest.exists() {
            tracing::warn!(event = "passthrough_replaced", path = %dest.display());
        }
        let copied = dest
            .parent()
            .map(std::fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|_| std::fs::copy(path, &dest));
        match copied {
            Ok(_) => self.summary.passthrough_files += 1,
            Err(source) => {
                let e = StarlocError::Persistence { path: dest, source };
                tracing::error!(event = "passthrough_failed", error = %e);
                self.summary.failed.push(e.to_string());
            }
        }
    }

    pub fn merge_patch_file(&mut self, path: &std::path::Path, document: &str) -> Result<()> {
        let ops: Vec<PatchOperation> = match read_json(path) {
            Ok(ops) => ops,
            Err(e) => {
                tracing::warn!(event = "patch_malformed", path = %path.display(), error = %e);
                self.summary.malformed += 1;
                return Ok(());
            }
        };
        self.summary.patch_files += 1;
        for op in ops {
            self.summary.operations += 1;
            if op.op != "replace" {
                tracing::warn!(event = "patch_op_skipped", document = document, op = %op.op, address = %op.path);
                continue;
            }
            let address = match op.address() {
                Ok(address) => address,
                Err(e) => {
                    tracing::warn!(event = "patch_path_invalid", document = document, error = %e);
                    self.summary.invalid_paths += 1;
                    continue;
                }
            };
            match &op.value {
                Value::String(text) => self.process(document, &address, text)?,
                Value::Array(_) | Value::Object(_) => {
                    for leaf in starloc_parsers_json::flatten_paths(&op.value) {
                        if let Ok(Value::String(text)) = starloc_parsers_json::get(&op.value, &leaf) {
                            self.process(document, &address.join(&leaf), text)?;
                        }
                    }
                }
                other => {
                    tracing::debug!(event = "patch_value_skipped", document = document, address = %address, value = %other);
                }
            }
        }
        Ok(())
    }

    /// Route one incoming text and merge it.
    pub fn process(&mut self, document: &str, address: &PathAddress, text: &str) -> Result<()> {
        if let Some(storage) = self.substitutions.get(document, address) {
            let storage = storage.to_string();
            return self.replace(&storage, document, address, text);
        }
        let emote_addr = address.child(GLITCH_EMOTE);
        let text_addr = address.child(GLITCH_EMOTED_TEXT);
        let is_glitch = self
            .substitutions
            .for_document(document)
            .map(|m| m.contains_key(&emote_addr) || m.contains_key(&text_addr))
            .unwrap_or(false);
        if is_glitch {
            return match split_glitch(text) {
                Ok((emote, rest)) => {
                    let layout = &self.settings.layout;
                    let emote_storage = resolve_storage(layout, &self.substitutions, document, &emote_addr);
                    let text_storage = resolve_storage(layout, &self.substitutions, document, &text_addr);
                    self.replace(&emote_storage, document, &emote_addr, &emote)?;
                    self.replace(&text_storage, document, &text_addr, &rest)
                }
                Err(e) => {
                    tracing::warn!(event = "glitch_split_rejected", document = document, address = %address, error = %e);
                    self.summary.ambiguous_splits += 1;
                    Ok(())
                }
            };
        }
        let storage = self.settings.layout.default_storage(document);
        self.replace(&storage, document, address, text)
    }

    fn replace(&mut self, storage: &str, document: &str, address: &PathAddress, new_text: &str) -> Result<()> {
        let settings = self.settings;
        let layout = &settings.layout;
        let lang = layout.target_lang.as_str();
        if !self.cache.contains_key(storage) {
            let loaded = match load_storage(layout, storage) {
                Ok(records) => Some(records),
                Err(e) => {
                    tracing::warn!(event = "storage_unreadable", storage = storage, error = %e);
                    None
                }
            };
            self.cache.insert(storage.to_string(), loaded);
        }
        let index = self
            .cache
            .get(storage)
            .and_then(Option::as_ref)
            .and_then(|records| records.iter().position(|r| r.references(document, address)));
        let (Some(index), Some(Some(records))) = (index, self.cache.get_mut(storage)) else {
            let miss = StarlocError::RoutingMiss {
                document: document.to_string(),
                address: address.clone(),
                storage: storage.to_string(),
            };
            tracing::warn!(event = "routing_miss", error = %miss, text = new_text);
            self.summary.routing_misses += 1;
            return Ok(());
        };
        let record = &mut records[index];
        let before = record.clone();

        match decide(record, lang, new_text) {
            Decision::Unchanged => self.summary.unchanged += 1,
            Decision::PreviouslyDenied => self.summary.denied_skipped += 1,
            Decision::Accept => {
                record.set_translation(lang, new_text);
                self.summary.accepted += 1;
            }
            Decision::Conflict => {
                show_conflict(
                    &mut *self.operator,
                    &layout.storage_path(storage).display().to_string(),
                    document,
                    address,
                    record,
                    &layout.source_lang,
                    lang,
                    new_text,
                    settings.list_limit,
                )?;
                let resolution = match self.operator.choose(&["n", "o", "e"])?.as_str() {
                    "n" => {
                        self.operator.say("Setting to the new data...")?;
                        self.summary.conflicts_new += 1;
                        Resolution::AcceptNew
                    }
                    "e" => {
                        self.operator.say("Enter new data:")?;
                        let manual = self.operator.enter_text(3)?;
                        self.operator.say(&format!("Written: {manual}"))?;
                        self.summary.conflicts_manual += 1;
                        Resolution::Manual(manual)
                    }
                    _ => {
                        self.operator.say("Keeping old data...")?;
                        self.summary.conflicts_old += 1;
                        Resolution::KeepOld
                    }
                };
                apply_resolution(record, lang, new_text, resolution);
            }
        }

        if *record != before {
            match write_json_pretty(&layout.storage_path(storage), &*records) {
                Ok(()) => {
                    self.written.insert(storage.to_string());
                }
                Err(e) => {
                    tracing::error!(event = "storage_write_failed", error = %e);
                    self.summary.failed.push(e.to_string());
                }
            }
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn show_conflict(
    op: &mut dyn Operator,
    target: &str,
    document: &str,
    address: &PathAddress,
    record: &LabelRecord,
    source_lang: &str,
    lang: &str,
    new_text: &str,
    list_limit: usize,
) -> Result<()> {
    op.say(&format!("Target: {target}"))?;
    op.say(&format!("Origin: {document}"))?;
    op.say("Used in:")?;
    for (shown, (file, addresses)) in record.files.iter().enumerate() {
        if shown >= list_limit {
            op.say(&format!("...and in {} more files", record.files.len() - shown))?;
            break;
        }
        op.say(&format!("   {file}"))?;
        for a in addresses {
            op.say(&format!("     at {a}"))?;
        }
    }
    op.say("Denied variants:")?;
    for d in &record.denied_alternatives {
        op.say(&format!("  {d}"))?;
    }
    op.say(&format!("Field: {address}"))?;
    op.say(&format!("{source_lang} text:"))?;
    op.say(&format!("  \"{}\"", record.source_text(source_lang)))?;
    op.say(&format!("Old {lang} text:"))?;
    op.say(&format!("  \"{}\"", record.translation(lang).unwrap_or("")))?;
    op.say(&format!("New {lang} text:"))?;
    op.say(&format!("  \"{new_text}\""))?;
    op.say("What text should be used?")?;
    op.say(" n - new text")?;
    op.say(" o - old text")?;
    op.say(" e - enter manually")
}

/// Merge every patch under the configured mod directory.
pub fn run_merge(settings: &Settings, operator: &mut dyn Operator) -> Result<MergeSummary> {
    let substitutions = MergeEngine::load_substitutions(settings)?;
    tracing::info!(event = "merge_start", mod_dir = %settings.mod_dir.display(), substitutions = substitutions.len());
    MergeEngine::new(settings, operator, substitutions).run()
}
