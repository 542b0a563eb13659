use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use starloc_core::StarlocError;
use std::path::{Path, PathBuf};

/// Compile `pattern` so it only matches at the start of the haystack.
pub fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})"))
}

/// Write through a sibling temp file so readers never see a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StarlocError> {
    let persist = |source| StarlocError::Persistence {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(persist)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, bytes).map_err(persist)?;
    std::fs::rename(&tmp, path).map_err(persist)
}

/// Pretty JSON (two-space indent, UTF-8 unescaped) with a trailing newline.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StarlocError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| StarlocError::Persistence {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> crate::Result<T> {
    let file = std::fs::File::open(path)?;
    let value = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(value)
}

/// `/`-joined path of `path` relative to `base`.
pub fn rel_slash(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a `/`-separated relative id onto `base`.
pub fn join_slash(base: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|s| !s.is_empty())
        .fold(base.to_path_buf(), |acc, seg| acc.join(seg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchored_matches_prefix_only() {
        let re = anchored("/description").unwrap();
        assert!(re.is_match("/description"));
        assert!(re.is_match("/descriptionExtra"));
        assert!(!re.is_match("/x/description"));
    }

    #[test]
    fn write_atomic_creates_parents_and_leaves_no_temp() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("texts/items/a.item.json");
        write_json_pretty(&target, &vec!["x"])?;
        assert_eq!(std::fs::read_to_string(&target)?, "[\n  \"x\"\n]\n");
        assert!(!dir.path().join("texts/items/a.item.json.tmp").exists());
        Ok(())
    }

    #[test]
    fn slash_ids_round_trip() {
        let base = Path::new("/tmp/tr");
        let p = join_slash(base, "texts/items/a.json");
        assert_eq!(rel_slash(base, &p), "texts/items/a.json");
    }
}
