//! Patch emission: turn the label database back into per-document
//! `.patch` files plus completion counters.

use crate::handlers::join_glitch;
use crate::settings::{Settings, SUBSTITUTIONS_FILE, TOTAL_LABELS_FILE, TRANSLATED_LABELS_FILE};
use crate::util::{join_slash, read_json, rel_slash, write_json_pretty};
use crate::Result;
use starloc_core::{PathAddress, StarlocError, GLITCH_EMOTE, GLITCH_EMOTED_TEXT};
use starloc_domain::{CounterTree, ExportSummary, LabelRecord, PatchOperation, SCHEMA_VERSION};
use std::collections::BTreeMap;
use walkdir::WalkDir;

#[derive(Debug, Default)]
struct GlitchHalves {
    emote: Option<String>,
    text: Option<String>,
}

/// Collects replace operations per document.
#[derive(Debug, Default)]
pub struct PatchEmitter {
    patches: BTreeMap<String, Vec<PatchOperation>>,
    glitch: BTreeMap<String, BTreeMap<PathAddress, GlitchHalves>>,
}

impl PatchEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `translation` at every address of `record`. Glitch halves wait
    /// for their sibling and become one operation on the parent address.
    pub fn add_label(&mut self, record: &LabelRecord, translation: &str) {
        for (document, addresses) in &record.files {
            for address in addresses {
                let leaf = address.leaf_name();
                let half = match leaf.as_deref() {
                    Some(GLITCH_EMOTE) => Some(true),
                    Some(GLITCH_EMOTED_TEXT) => Some(false),
                    _ => None,
                };
                let parent = address.parent();
                match (half, parent) {
                    (Some(is_emote), Some(parent)) => {
                        let slot = self
                            .glitch
                            .entry(document.clone())
                            .or_default()
                            .entry(parent)
                            .or_default();
                        if is_emote {
                            slot.emote = Some(translation.to_string());
                        } else {
                            slot.text = Some(translation.to_string());
                        }
                    }
                    _ => self
                        .patches
                        .entry(document.clone())
                        .or_default()
                        .push(PatchOperation::replace(address, translation)),
                }
            }
        }
    }

    /// Per-document operations sorted by path.
    pub fn finish(mut self) -> BTreeMap<String, Vec<PatchOperation>> {
        for (document, parents) in std::mem::take(&mut self.glitch) {
            for (parent, halves) in parents {
                match (halves.emote, halves.text) {
                    (Some(emote), Some(text)) => self
                        .patches
                        .entry(document.clone())
                        .or_default()
                        .push(PatchOperation::replace(&parent, join_glitch(&emote, &text))),
                    _ => {
                        tracing::debug!(event = "glitch_half_untranslated", document = %document, address = %parent);
                    }
                }
            }
        }
        for ops in self.patches.values_mut() {
            ops.sort_by_cached_key(|op| op.address().ok());
        }
        self.patches
    }
}

/// Whether `text` fits a codex page of `width` columns and `height` lines
/// when wrapped at spaces.
pub fn fits_codex_page(text: &str, width: usize, height: usize) -> bool {
    let width = width as i64;
    let mut w = width;
    let mut h = height as i64;
    for word in text.split(' ') {
        if word.ends_with('\n') {
            h -= 1;
            w = width;
            continue;
        }
        let len = word.chars().count() as i64;
        w -= len;
        if w < 0 {
            w = width - len;
            h -= 1;
        }
        w -= 1;
    }
    h >= 0
}

fn counter_path(storage: &str) -> Vec<&str> {
    storage.split('/').filter(|s| !s.is_empty()).collect()
}

pub fn run_export(settings: &Settings) -> Result<ExportSummary> {
    let layout = &settings.layout;
    let out_dir = &settings.export_dir;
    let others = layout.others_dir();
    let target = layout.target_lang.as_str();

    let mut summary = ExportSummary {
        schema_version: SCHEMA_VERSION,
        ..Default::default()
    };
    let mut totals = CounterTree::default();
    let mut translated = CounterTree::default();
    let mut emitter = PatchEmitter::new();

    let mut files: Vec<_> = WalkDir::new(&layout.translations_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if [SUBSTITUTIONS_FILE, TOTAL_LABELS_FILE, TRANSLATED_LABELS_FILE].contains(&name.as_str()) {
            continue;
        }
        if path.starts_with(&others) {
            let rel = rel_slash(&others, &path);
            let dest = join_slash(out_dir, &rel);
            let copied = dest
                .parent()
                .map(std::fs::create_dir_all)
                .unwrap_or(Ok(()))
                .and_then(|_| std::fs::copy(&path, &dest));
            match copied {
                Ok(_) => summary.passthrough_files += 1,
                Err(source) => {
                    let e = StarlocError::Persistence { path: dest, source };
                    tracing::error!(event = "passthrough_failed", error = %e);
                    summary.failed.push(e.to_string());
                }
            }
            continue;
        }

        let storage = rel_slash(&layout.translations_dir, &path);
        let records: Vec<LabelRecord> = match read_json(&path) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(event = "storage_unreadable", storage = %storage, error = %e);
                continue;
            }
        };
        summary.storage_files += 1;
        let segments = counter_path(&storage);
        totals.set(&segments, records.len());
        translated.set(&segments, 0);

        for record in &records {
            let Some(translation) = record.translation(target) else {
                continue;
            };
            translated.add(&segments, 1);
            if storage.ends_with("codex.json")
                && !fits_codex_page(translation, settings.codex_width, settings.codex_height)
            {
                tracing::warn!(event = "codex_too_long", storage = %storage, label = record.source_text(&layout.source_lang));
                summary
                    .long_codex_entries
                    .push(format!("{storage}: {}", record.source_text(&layout.source_lang)));
            }
            emitter.add_label(record, translation);
        }
    }

    for (document, ops) in emitter.finish() {
        let patch = join_slash(out_dir, &format!("{document}.patch"));
        match write_json_pretty(&patch, &ops) {
            Ok(()) => {
                summary.patch_files += 1;
                summary.operations += ops.len();
            }
            Err(e) => {
                tracing::error!(event = "patch_write_failed", error = %e);
                summary.failed.push(e.to_string());
            }
        }
    }

    for (file, tree) in [(TOTAL_LABELS_FILE, &totals), (TRANSLATED_LABELS_FILE, &translated)] {
        if let Err(e) = write_json_pretty(&layout.translations_dir.join(file), tree) {
            tracing::error!(event = "counter_write_failed", error = %e);
            summary.failed.push(e.to_string());
        }
    }

    summary.total_labels = totals.total();
    summary.translated_labels = translated.total();
    summary.completion = if summary.total_labels == 0 {
        0.0
    } else {
        summary.translated_labels as f64 * 100.0 / summary.total_labels as f64
    };
    tracing::info!(
        event = "export_done",
        patches = summary.patch_files,
        operations = summary.operations,
        translated = summary.translated_labels,
        total = summary.total_labels
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn label(eng: &str, rus: &str, files: &[(&str, &str)]) -> LabelRecord {
        let mut rec = LabelRecord::default();
        rec.texts.insert("Eng".into(), eng.into());
        rec.texts.insert("Rus".into(), rus.into());
        for (doc, addr) in files {
            rec.files
                .entry(doc.to_string())
                .or_insert_with(BTreeSet::new)
                .insert(PathAddress::parse(addr).unwrap());
        }
        rec
    }

    #[test]
    fn glitch_halves_recombine_on_parent() {
        let mut emitter = PatchEmitter::new();
        let emote = label("Hi.", "Привет.", &[("a.object", "/glitchDescription/glitchEmote")]);
        let text = label(
            "This is a robot.",
            "Это робот.",
            &[("a.object", "/glitchDescription/glitchEmotedText")],
        );
        emitter.add_label(&emote, "Привет.");
        emitter.add_label(&text, "Это робот.");
        let patches = emitter.finish();
        let ops = &patches["a.object"];
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path.to_string(), "/glitchDescription");
        assert_eq!(ops[0].value, serde_json::json!("Привет. Это робот."));
    }

    #[test]
    fn lone_glitch_half_is_not_emitted() {
        let mut emitter = PatchEmitter::new();
        let emote = label("Hi.", "Привет.", &[("a.object", "/glitchDescription/glitchEmote")]);
        emitter.add_label(&emote, "Привет.");
        assert!(emitter.finish().is_empty());
    }

    #[test]
    fn operations_are_sorted_by_path() {
        let mut emitter = PatchEmitter::new();
        emitter.add_label(&label("B", "Б", &[("a.item", "/title")]), "Б");
        emitter.add_label(&label("A", "А", &[("a.item", "/description")]), "А");
        let ops = &emitter.finish()["a.item"];
        let paths: Vec<String> = ops.iter().map(|o| o.path.to_string()).collect();
        assert_eq!(paths, vec!["/description", "/title"]);
    }

    #[test]
    fn codex_page_overflow() {
        assert!(fits_codex_page("A short entry.", 36, 15));
        let long = "word ".repeat(200);
        assert!(!fits_codex_page(&long, 36, 15));
        let lines = "line\n ".repeat(16);
        assert!(!fits_codex_page(&lines, 36, 15));
    }

    #[test]
    fn export_writes_patches_counters_and_passthrough() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let mut cfg = starloc_config::load_config_from(None, None)?;
        cfg.translations_dir = Some(tmp.path().join("translations").display().to_string());
        let mut settings = Settings::from_config(&cfg)?;
        settings.export_dir = tmp.path().join("out");
        let layout = &settings.layout;

        write_json_pretty(
            &layout.storage_path("texts/items/a.item.json"),
            &vec![
                label("Sword", "Меч", &[("items/a.item", "/shortdescription")]),
                label("Sharp.", "", &[("items/a.item", "/description")]),
            ],
        )?;
        std::fs::create_dir_all(layout.others_dir().join("interface"))?;
        std::fs::write(layout.others_dir().join("interface/font.png"), b"png")?;

        let summary = run_export(&settings)?;
        assert_eq!(summary.total_labels, 2);
        assert_eq!(summary.translated_labels, 1);
        assert!((summary.completion - 50.0).abs() < f64::EPSILON);
        assert_eq!(summary.passthrough_files, 1);
        assert!(tmp.path().join("out/interface/font.png").exists());

        let ops: Vec<PatchOperation> = read_json(&tmp.path().join("out/items/a.item.patch"))?;
        assert_eq!(ops, vec![PatchOperation::replace(&PathAddress::parse("/shortdescription")?, "Меч")]);

        let totals: CounterTree = read_json(&layout.translations_dir.join(TOTAL_LABELS_FILE))?;
        assert_eq!(totals.get(&["texts", "items", "a.item.json"]), Some(2));
        Ok(())
    }
}
