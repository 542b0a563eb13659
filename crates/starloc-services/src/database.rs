//! The deduplicated label database: construction from extraction records,
//! carry-forward from the persisted copy, and the per-file write buffer.

use crate::routing::SharedPathResolver;
use crate::settings::Layout;
use crate::util::{read_json, rel_slash, write_json_pretty};
use crate::Result;
use rayon::prelude::*;
use starloc_core::{ExtractionRecord, StarlocError};
use starloc_domain::{LabelRecord, Provenance, SubstitutionTable};
use std::collections::{BTreeMap, BTreeSet};
use walkdir::WalkDir;

/// Dedup key of a label. Exact text equality, whitespace included.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelKey {
    pub section: Option<String>,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct LabelDatabase {
    labels: BTreeMap<LabelKey, Provenance>,
}

impl LabelDatabase {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ExtractionRecord>,
    {
        let mut labels: BTreeMap<LabelKey, Provenance> = BTreeMap::new();
        for rec in records {
            let key = LabelKey {
                section: rec.section,
                text: rec.text,
            };
            labels
                .entry(key)
                .or_default()
                .entry(rec.document)
                .or_default()
                .insert(rec.address);
        }
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LabelKey, &Provenance)> {
        self.labels.iter()
    }
}

/// Entries of the persisted database, grouped by label key.
#[derive(Debug, Default)]
pub struct PriorDatabase {
    /// Storage-file order within each key.
    entries: BTreeMap<LabelKey, Vec<(String, LabelRecord)>>,
    source_lang: String,
    unreadable: Vec<String>,
}

impl PriorDatabase {
    /// Read every storage file under the texts directory. Unreadable files
    /// contribute nothing and are listed in [`PriorDatabase::unreadable`];
    /// their translations will not be carried forward.
    pub fn load(layout: &Layout) -> Self {
        let mut db = PriorDatabase {
            source_lang: layout.source_lang.clone(),
            ..Default::default()
        };
        let texts_dir = layout.texts_dir();
        if !texts_dir.exists() {
            tracing::info!(event = "prior_database_absent", dir = %texts_dir.display());
            return db;
        }
        let mut files: Vec<_> = WalkDir::new(&texts_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        files.sort();
        for path in files {
            let storage = rel_slash(&layout.translations_dir, &path);
            let records: Vec<LabelRecord> = match read_json(&path) {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(event = "prior_storage_unreadable", storage = %storage, error = %e);
                    db.unreadable.push(storage);
                    continue;
                }
            };
            for rec in records {
                db.push(storage.clone(), rec);
            }
        }
        db
    }

    pub fn push(&mut self, storage: String, record: LabelRecord) {
        let key = LabelKey {
            section: record.comment.clone(),
            text: record.source_text(&self.source_lang).to_string(),
        };
        self.entries.entry(key).or_default().push((storage, record));
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Storage files that existed but could not be parsed.
    pub fn unreadable(&self) -> &[String] {
        &self.unreadable
    }

    /// Copy translation state of `key` into `record`, which is about to be
    /// written to `storage`. Denials from every prior entry are unioned;
    /// translations from the same storage file are preferred.
    pub fn carry_forward(&self, key: &LabelKey, storage: &str, record: &mut LabelRecord) {
        let Some(entries) = self.entries.get(key) else {
            return;
        };
        let ordered = entries
            .iter()
            .filter(|(s, _)| s == storage)
            .chain(entries.iter().filter(|(s, _)| s != storage));
        for (_, prior) in ordered {
            record
                .denied_alternatives
                .extend(prior.denied_alternatives.iter().cloned());
            for (lang, text) in &prior.texts {
                if lang == &self.source_lang || text.is_empty() {
                    continue;
                }
                record
                    .texts
                    .entry(lang.clone())
                    .or_insert_with(|| text.clone());
            }
        }
        for (_, prior) in entries {
            for lang in prior.texts.keys() {
                record.texts.entry(lang.clone()).or_default();
            }
        }
    }
}

/// Storage files and substitution entries ready to be flushed.
#[derive(Debug, Default)]
pub struct FileBuffer {
    pub files: BTreeMap<String, Vec<LabelRecord>>,
    pub substitutions: SubstitutionTable,
}

#[derive(Default)]
struct Fragment {
    records: Vec<(String, LabelRecord)>,
    substitutions: SubstitutionTable,
}

impl FileBuffer {
    /// Assign every label to its storage file(s). Labels are processed in
    /// parallel and folded single-threaded, so the result does not depend on
    /// scheduling.
    pub fn prepare(
        db: &LabelDatabase,
        prior: &PriorDatabase,
        resolver: &SharedPathResolver<'_>,
        source_lang: &str,
    ) -> Self {
        let labels: Vec<(&LabelKey, &Provenance)> = db.iter().collect();
        let fragments: Vec<Fragment> = labels
            .par_iter()
            .map(|(key, provenance)| place_label(key, provenance, prior, resolver, source_lang))
            .collect();

        let mut buffer = FileBuffer::default();
        for frag in fragments {
            for (storage, record) in frag.records {
                buffer.files.entry(storage).or_default().push(record);
            }
            buffer.substitutions.absorb(frag.substitutions);
        }
        for records in buffer.files.values_mut() {
            records.sort_by(|a, b| {
                a.source_text(source_lang)
                    .cmp(b.source_text(source_lang))
                    .then_with(|| a.comment.cmp(&b.comment))
            });
        }
        buffer
    }
}

fn place_label(
    key: &LabelKey,
    provenance: &Provenance,
    prior: &PriorDatabase,
    resolver: &SharedPathResolver<'_>,
    source_lang: &str,
) -> Fragment {
    let shared = resolver.shared_storage(provenance.keys().map(String::as_str));
    let mut by_storage: BTreeMap<String, Provenance> = BTreeMap::new();
    let mut frag = Fragment::default();
    for (document, addresses) in provenance {
        for address in addresses {
            let route = resolver.route(&shared, document, address);
            if route.substitute {
                frag.substitutions
                    .insert(document, address.clone(), route.storage.clone());
            }
            by_storage
                .entry(route.storage)
                .or_default()
                .entry(document.clone())
                .or_insert_with(BTreeSet::new)
                .insert(address.clone());
        }
    }
    for (storage, files) in by_storage {
        let mut record = LabelRecord {
            comment: key.section.clone(),
            denied_alternatives: BTreeSet::new(),
            files,
            texts: BTreeMap::from([(source_lang.to_string(), key.text.clone())]),
        };
        prior.carry_forward(key, &storage, &mut record);
        frag.records.push((storage, record));
    }
    frag
}

/// Files under the texts directory that the buffer no longer accounts for.
pub fn find_dangling(layout: &Layout, buffer: &FileBuffer) -> Vec<String> {
    let texts_dir = layout.texts_dir();
    let mut out: Vec<String> = WalkDir::new(&texts_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| rel_slash(&layout.translations_dir, e.path()))
        .filter(|storage| !buffer.files.contains_key(storage))
        .collect();
    out.sort();
    out
}

#[derive(Debug, Default)]
pub struct FlushReport {
    pub written: usize,
    pub deleted: usize,
    pub failed: Vec<String>,
}

/// Delete `dangling` and write every buffered file plus the substitution
/// table. Deletions and writes run in parallel; a failing file does not stop
/// the others.
pub fn flush(layout: &Layout, buffer: &FileBuffer, dangling: &[String]) -> FlushReport {
    let (deletions, writes): (Vec<std::result::Result<(), StarlocError>>, Vec<_>) = rayon::join(
        || {
            dangling
                .par_iter()
                .map(|storage| {
                    let path = layout.storage_path(storage);
                    std::fs::remove_file(&path)
                        .map_err(|source| StarlocError::Persistence { path, source })
                })
                .collect()
        },
        || {
            buffer
                .files
                .par_iter()
                .map(|(storage, records)| write_json_pretty(&layout.storage_path(storage), records))
                .collect::<Vec<_>>()
        },
    );

    let mut report = FlushReport::default();
    for res in deletions {
        match res {
            Ok(()) => report.deleted += 1,
            Err(e) => {
                tracing::error!(event = "delete_failed", error = %e);
                report.failed.push(e.to_string());
            }
        }
    }
    for res in writes {
        match res {
            Ok(()) => report.written += 1,
            Err(e) => {
                tracing::error!(event = "write_failed", error = %e);
                report.failed.push(e.to_string());
            }
        }
    }
    match write_json_pretty(&layout.substitutions_path(), &buffer.substitutions) {
        Ok(()) => report.written += 1,
        Err(e) => {
            tracing::error!(event = "write_failed", error = %e);
            report.failed.push(e.to_string());
        }
    }
    report
}

/// Load one storage file.
pub fn load_storage(layout: &Layout, storage: &str) -> Result<Vec<LabelRecord>> {
    read_json(&layout.storage_path(storage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use starloc_core::PathAddress;
    use std::path::Path;

    fn layout(root: &Path) -> Layout {
        Layout {
            assets_dir: root.join("assets"),
            translations_dir: root.join("translations"),
            texts_prefix: "texts".into(),
            source_lang: "Eng".into(),
            target_lang: "Rus".into(),
        }
    }

    fn rec(text: &str, document: &str, address: &str) -> ExtractionRecord {
        ExtractionRecord {
            section: None,
            text: text.into(),
            document: document.into(),
            address: PathAddress::parse(address).unwrap(),
        }
    }

    #[test]
    fn identical_text_collapses_across_documents() {
        let db = LabelDatabase::from_records(vec![
            rec("Sword", "items/a.item", "/shortdescription"),
            rec("Sword", "items/b.item", "/shortdescription"),
            rec("Sword ", "items/c.item", "/shortdescription"),
        ]);
        assert_eq!(db.len(), 2);
        let key = LabelKey {
            section: None,
            text: "Sword".into(),
        };
        let prov = db.labels.get(&key).unwrap();
        assert_eq!(prov.len(), 2);
        assert!(prov.contains_key("items/a.item"));
        assert!(prov.contains_key("items/b.item"));
    }

    #[test]
    fn sections_keep_equal_text_apart() {
        let mut named = rec("Bob", "names/a.namesource", "/sourceNames/0");
        named.section = Some("npcnames".into());
        let db = LabelDatabase::from_records(vec![named, rec("Bob", "items/a.item", "/description")]);
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn carry_forward_prefers_same_storage_and_unions_denials() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = layout(tmp.path());
        let mut prior = PriorDatabase {
            source_lang: "Eng".into(),
            ..Default::default()
        };
        let mut other = LabelRecord::default();
        other.texts.insert("Eng".into(), "Sword".into());
        other.texts.insert("Rus".into(), "Сабля".into());
        other.denied_alternatives.insert("Нож".into());
        let mut same = LabelRecord::default();
        same.texts.insert("Eng".into(), "Sword".into());
        same.texts.insert("Rus".into(), "Меч".into());
        same.denied_alternatives.insert("Шпага".into());
        prior.push("texts/a.json".into(), other);
        prior.push("texts/items.json".into(), same);

        let key = LabelKey {
            section: None,
            text: "Sword".into(),
        };
        let mut record = LabelRecord::default();
        record.texts.insert(layout.source_lang.clone(), "Sword".into());
        prior.carry_forward(&key, "texts/items.json", &mut record);
        assert_eq!(record.translation("Rus"), Some("Меч"));
        assert_eq!(record.denied_alternatives.len(), 2);
    }

    #[test]
    fn multi_bucket_label_is_written_once_per_file() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = layout(tmp.path());
        let special = BTreeMap::from([("glitchEmote".to_string(), "glitchEmotes".to_string())]);
        let pinned = SubstitutionTable::default();
        let resolver = SharedPathResolver::new(&layout, "wide_spread_fields", &special, &pinned);
        let db = LabelDatabase::from_records(vec![
            rec("Hi.", "objects/a.object", "/glitchDescription/glitchEmote"),
            rec("Hi.", "objects/a.object", "/greeting"),
        ]);
        let buffer = FileBuffer::prepare(&db, &PriorDatabase::default(), &resolver, "Eng");
        assert_eq!(buffer.files.len(), 2);
        assert!(buffer.files.contains_key("texts/glitchEmotes.json"));
        assert!(buffer.files.contains_key("texts/objects/a.object.json"));
        assert_eq!(buffer.substitutions.len(), 1);
    }

    #[test]
    fn flush_writes_then_dangling_is_detected_and_removed() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let layout = layout(tmp.path());
        let special = BTreeMap::new();
        let pinned = SubstitutionTable::default();
        let resolver = SharedPathResolver::new(&layout, "wide_spread_fields", &special, &pinned);
        let stale = layout.storage_path("texts/gone.item.json");
        write_json_pretty(&stale, &Vec::<LabelRecord>::new())?;

        let db = LabelDatabase::from_records(vec![rec("Sword", "a.item", "/description")]);
        let buffer = FileBuffer::prepare(&db, &PriorDatabase::load(&layout), &resolver, "Eng");
        let dangling = find_dangling(&layout, &buffer);
        assert_eq!(dangling, vec!["texts/gone.item.json".to_string()]);

        let report = flush(&layout, &buffer, &dangling);
        assert!(report.failed.is_empty());
        assert_eq!(report.deleted, 1);
        assert!(!stale.exists());
        let records = load_storage(&layout, "texts/a.item.json")?;
        assert_eq!(records.len(), 1);
        assert!(layout.substitutions_path().exists());
        Ok(())
    }

    #[test]
    fn blocked_storage_file_fails_alone() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let layout = layout(tmp.path());
        let special = BTreeMap::new();
        let pinned = SubstitutionTable::default();
        let resolver = SharedPathResolver::new(&layout, "wide_spread_fields", &special, &pinned);
        std::fs::create_dir_all(layout.storage_path("texts/a.item.json"))?;

        let db = LabelDatabase::from_records(vec![
            rec("Sword", "a.item", "/shortdescription"),
            rec("Knife", "b.item", "/shortdescription"),
        ]);
        let buffer = FileBuffer::prepare(&db, &PriorDatabase::default(), &resolver, "Eng");
        let report = flush(&layout, &buffer, &[]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].contains("a.item.json"));
        assert_eq!(report.written, 2);
        assert_eq!(load_storage(&layout, "texts/b.item.json")?.len(), 1);
        assert!(layout.substitutions_path().exists());
        Ok(())
    }

    #[test]
    fn unreadable_prior_file_is_reported() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let layout = layout(tmp.path());
        let mut good = LabelRecord::default();
        good.texts.insert("Eng".into(), "Sword".into());
        good.texts.insert("Rus".into(), "Меч".into());
        write_json_pretty(&layout.storage_path("texts/a.item.json"), &vec![good])?;
        let broken = layout.storage_path("texts/b.item.json");
        std::fs::write(&broken, "[{\"Texts\": ")?;

        let prior = PriorDatabase::load(&layout);
        assert_eq!(prior.len(), 1);
        assert_eq!(prior.unreadable(), &["texts/b.item.json".to_string()]);
        Ok(())
    }
}
