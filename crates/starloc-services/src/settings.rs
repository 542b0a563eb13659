use crate::handlers::HandlerChain;
use crate::sections::{SectionClassifier, SectionRule};
use crate::select::{FieldRule, FieldSelector};
use crate::util::join_slash;
use crate::Result;
use color_eyre::eyre::{eyre, WrapErr};
use starloc_config::StarlocConfig;
use starloc_core::PathAddress;
use starloc_domain::SubstitutionTable;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const SUBSTITUTIONS_FILE: &str = "substitutions.json";
pub const TOTAL_LABELS_FILE: &str = "totallabels.json";
pub const TRANSLATED_LABELS_FILE: &str = "translatedlabels.json";
pub const OTHERS_DIR: &str = "others";

/// Where things live and which languages are involved.
#[derive(Debug, Clone)]
pub struct Layout {
    pub assets_dir: PathBuf,
    pub translations_dir: PathBuf,
    pub texts_prefix: String,
    pub source_lang: String,
    pub target_lang: String,
}

impl Layout {
    /// Storage file a document's labels go to when nothing reroutes them.
    pub fn default_storage(&self, document: &str) -> String {
        format!("{}/{}.json", self.texts_prefix, document)
    }

    pub fn bucket_storage(&self, bucket: &str) -> String {
        format!("{}/{}.json", self.texts_prefix, bucket)
    }

    pub fn storage_path(&self, storage: &str) -> PathBuf {
        join_slash(&self.translations_dir, storage)
    }

    pub fn texts_dir(&self) -> PathBuf {
        self.translations_dir.join(&self.texts_prefix)
    }

    pub fn others_dir(&self) -> PathBuf {
        self.translations_dir.join(OTHERS_DIR)
    }

    pub fn substitutions_path(&self) -> PathBuf {
        self.translations_dir.join(SUBSTITUTIONS_FILE)
    }
}

/// Everything a run needs, resolved once from configuration.
pub struct Settings {
    pub layout: Layout,
    pub selector: FieldSelector,
    pub sections: SectionClassifier,
    pub handlers: HandlerChain,
    pub wide_spread_bucket: String,
    pub special_buckets: BTreeMap<String, String>,
    pub pinned: SubstitutionTable,
    pub list_limit: usize,
    pub export_dir: PathBuf,
    pub mod_dir: PathBuf,
    pub codex_width: usize,
    pub codex_height: usize,
}

impl Settings {
    /// Expects a config already merged with the built-in defaults.
    pub fn from_config(cfg: &StarlocConfig) -> Result<Self> {
        let extract = cfg.extract.clone().unwrap_or_default();
        let export = cfg.export.clone().unwrap_or_default();
        let merge = cfg.merge.clone().unwrap_or_default();

        let layout = Layout {
            assets_dir: PathBuf::from(required(&cfg.assets_dir, "assets_dir")?),
            translations_dir: PathBuf::from(required(&cfg.translations_dir, "translations_dir")?),
            texts_prefix: required(&cfg.texts_prefix, "texts_prefix")?,
            source_lang: required(&cfg.source_lang, "source_lang")?,
            target_lang: required(&cfg.target_lang, "target_lang")?,
        };

        let mut field_rules = Vec::new();
        for rule in extract.fields.unwrap_or_default() {
            field_rules.push(
                FieldRule::new(&rule.suffix, &rule.patterns)
                    .wrap_err_with(|| format!("field rule for '{}'", rule.suffix))?,
            );
        }
        let selector = FieldSelector::new(
            field_rules,
            extract.dialog_dir_suffix.unwrap_or_else(|| "dialog".into()),
        );

        let mut section_rules = Vec::new();
        for rule in extract.sections.unwrap_or_default() {
            section_rules.push(
                SectionRule::new(
                    &rule.name,
                    &rule.file_patterns,
                    &rule.address_patterns,
                    rule.all_conditions,
                )
                .wrap_err_with(|| format!("section rule '{}'", rule.name))?,
            );
        }

        let mut pinned = SubstitutionTable::default();
        for (document, fields) in extract.pinned.unwrap_or_default() {
            for (address, storage) in fields {
                let address = PathAddress::parse(&address)
                    .wrap_err_with(|| format!("pinned route for {document}"))?;
                pinned.insert(&document, address, storage);
            }
        }

        Ok(Settings {
            layout,
            selector,
            sections: SectionClassifier::new(section_rules),
            handlers: HandlerChain::standard(),
            wide_spread_bucket: extract
                .wide_spread_bucket
                .unwrap_or_else(|| "wide_spread_fields".into()),
            special_buckets: extract.special_buckets.unwrap_or_default(),
            pinned,
            list_limit: cfg.list_limit.unwrap_or(5),
            export_dir: PathBuf::from(export.out_dir.unwrap_or_else(|| "./new_mod".into())),
            mod_dir: PathBuf::from(merge.mod_dir.unwrap_or_else(|| "./mod_old".into())),
            codex_width: export.codex_width.unwrap_or(36),
            codex_height: export.codex_height.unwrap_or(15),
        })
    }
}

fn required(value: &Option<String>, key: &str) -> Result<String> {
    value
        .clone()
        .ok_or_else(|| eyre!("configuration key '{key}' is not set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_from_defaults() -> Result<()> {
        let cfg = starloc_config::load_config_from(None, None)?;
        let settings = Settings::from_config(&cfg)?;
        assert_eq!(settings.layout.target_lang, "Rus");
        assert_eq!(
            settings.layout.default_storage("items/a.item"),
            "texts/items/a.item.json"
        );
        assert_eq!(
            settings.special_buckets.get("glitchEmote").map(String::as_str),
            Some("glitchEmotes")
        );
        assert!(settings
            .selector
            .scanned_suffixes()
            .iter()
            .any(|s| s == ".codex"));
        Ok(())
    }

    #[test]
    fn bad_pinned_address_is_rejected() -> Result<()> {
        let mut cfg = starloc_config::load_config_from(None, None)?;
        let mut pinned = BTreeMap::new();
        pinned.insert(
            "a.item".to_string(),
            BTreeMap::from([("no-slash".to_string(), "texts/x.json".to_string())]),
        );
        if let Some(extract) = cfg.extract.as_mut() {
            extract.pinned = Some(pinned);
        }
        assert!(Settings::from_config(&cfg).is_err());
        Ok(())
    }
}
