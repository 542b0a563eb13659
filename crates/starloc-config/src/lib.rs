use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

const EMBEDDED_DEFAULTS: &str = include_str!("defaults.toml");
const CONFIG_FILE: &str = "starloc.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StarlocConfig {
    pub assets_dir: Option<String>,
    pub translations_dir: Option<String>,
    pub texts_prefix: Option<String>,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub list_limit: Option<usize>,
    pub extract: Option<ExtractCfg>,
    pub export: Option<ExportCfg>,
    pub merge: Option<MergeCfg>,
    pub schema: Option<SchemaCfg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractCfg {
    pub wide_spread_bucket: Option<String>,
    pub dialog_dir_suffix: Option<String>,
    pub fields: Option<Vec<FieldRuleCfg>>,
    pub sections: Option<Vec<SectionRuleCfg>>,
    /// Address leaf name to bucket name.
    pub special_buckets: Option<BTreeMap<String, String>>,
    /// Hand-maintained routes: document id to address to storage file.
    pub pinned: Option<BTreeMap<String, BTreeMap<String, String>>>,
}

/// Addresses of documents whose name ends with `suffix` ("*" for any) that
/// match one of `patterns` hold translatable text.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldRuleCfg {
    pub suffix: String,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionRuleCfg {
    pub name: String,
    #[serde(default)]
    pub file_patterns: Vec<String>,
    #[serde(default)]
    pub address_patterns: Vec<String>,
    #[serde(default)]
    pub all_conditions: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportCfg {
    pub out_dir: Option<String>,
    pub codex_width: Option<usize>,
    pub codex_height: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeCfg {
    pub mod_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaCfg {
    pub out_dir: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("built-in defaults are broken: {0}")]
    Defaults(#[source] toml::de::Error),
}

/// Built-in configuration shipped with the binary.
pub fn embedded_defaults() -> Result<StarlocConfig, ConfigError> {
    toml::from_str(EMBEDDED_DEFAULTS).map_err(ConfigError::Defaults)
}

pub fn load_config() -> Result<StarlocConfig, ConfigError> {
    // Search order: CWD/starloc.toml, $CONFIG/starloc/starloc.toml, built-in defaults
    let cwd = std::env::current_dir().ok();
    let user = dirs::config_dir().map(|base| base.join("starloc"));
    load_config_from(cwd.as_deref(), user.as_deref())
}

/// Same as [`load_config`] with explicit search directories.
pub fn load_config_from(
    project_dir: Option<&Path>,
    user_dir: Option<&Path>,
) -> Result<StarlocConfig, ConfigError> {
    let mut merged = StarlocConfig::default();
    for dir in [project_dir, user_dir].into_iter().flatten() {
        if let Some(cfg) = read_config_file(&dir.join(CONFIG_FILE))? {
            merged = merge(merged, cfg);
        }
    }
    Ok(merge(merged, embedded_defaults()?))
}

fn read_config_file(path: &Path) -> Result<Option<StarlocConfig>, ConfigError> {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Ok(None);
    };
    toml::from_str::<StarlocConfig>(&s)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn merge(mut a: StarlocConfig, b: StarlocConfig) -> StarlocConfig {
    if a.assets_dir.is_none() {
        a.assets_dir = b.assets_dir;
    }
    if a.translations_dir.is_none() {
        a.translations_dir = b.translations_dir;
    }
    if a.texts_prefix.is_none() {
        a.texts_prefix = b.texts_prefix;
    }
    if a.source_lang.is_none() {
        a.source_lang = b.source_lang;
    }
    if a.target_lang.is_none() {
        a.target_lang = b.target_lang;
    }
    if a.list_limit.is_none() {
        a.list_limit = b.list_limit;
    }
    a.extract = merge_opt(a.extract, b.extract, merge_extract);
    a.export = merge_opt(a.export, b.export, merge_export);
    a.merge = merge_opt(a.merge, b.merge, merge_merge);
    a.schema = merge_opt(a.schema, b.schema, merge_schema);
    a
}

fn merge_opt<T: Default>(a: Option<T>, b: Option<T>, f: fn(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (None, Some(b)) => Some(b),
        (Some(a), None) => Some(a),
        (None, None) => None,
    }
}

fn merge_extract(mut a: ExtractCfg, b: ExtractCfg) -> ExtractCfg {
    if a.wide_spread_bucket.is_none() {
        a.wide_spread_bucket = b.wide_spread_bucket;
    }
    if a.dialog_dir_suffix.is_none() {
        a.dialog_dir_suffix = b.dialog_dir_suffix;
    }
    if a.fields.is_none() {
        a.fields = b.fields;
    }
    if a.sections.is_none() {
        a.sections = b.sections;
    }
    if a.special_buckets.is_none() {
        a.special_buckets = b.special_buckets;
    }
    if a.pinned.is_none() {
        a.pinned = b.pinned;
    }
    a
}

fn merge_export(mut a: ExportCfg, b: ExportCfg) -> ExportCfg {
    if a.out_dir.is_none() {
        a.out_dir = b.out_dir;
    }
    if a.codex_width.is_none() {
        a.codex_width = b.codex_width;
    }
    if a.codex_height.is_none() {
        a.codex_height = b.codex_height;
    }
    a
}

fn merge_merge(mut a: MergeCfg, b: MergeCfg) -> MergeCfg {
    if a.mod_dir.is_none() {
        a.mod_dir = b.mod_dir;
    }
    a
}

fn merge_schema(mut a: SchemaCfg, b: SchemaCfg) -> SchemaCfg {
    if a.out_dir.is_none() {
        a.out_dir = b.out_dir;
    }
    a
}
