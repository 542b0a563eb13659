use serde_json::{Map, Value};
use starloc_core::{PathAddress, Result, Segment, StarlocError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One asset file picked up by [`scan_assets`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    pub path: PathBuf,
    /// Path relative to the asset root, `/`-separated.
    pub document: String,
}

/// Walk `root` and collect files whose name ends with one of `suffixes`.
/// Output is sorted by document id.
pub fn scan_assets(root: &Path, suffixes: &[String]) -> Result<Vec<AssetFile>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(event = "asset_walk_error", root = %root.display(), error = %e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            continue;
        }
        let path = entry.path();
        out.push(AssetFile {
            document: document_id(root, path),
            path: path.to_path_buf(),
        });
    }
    out.sort_by(|a, b| a.document.cmp(&b.document));
    Ok(out)
}

/// Normalized, `/`-separated path of `path` relative to `root`.
pub fn document_id(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut parts: Vec<String> = Vec::new();
    for c in rel.components() {
        match c {
            std::path::Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
            std::path::Component::ParentDir => {
                parts.pop();
            }
            _ => {}
        }
    }
    parts.join("/")
}

/// Remove `//` and `/* */` comments that sit outside string literals.
/// Newlines are kept so parser error positions still point at the source line.
pub fn strip_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Parse an asset document, tolerating comments.
pub fn parse_document(text: &str, document: &str) -> std::result::Result<Value, StarlocError> {
    serde_json::from_str(&strip_comments(text)).map_err(|e| StarlocError::MalformedDocument {
        document: document.to_string(),
        reason: e.to_string(),
    })
}

/// Read and parse an asset file.
pub fn read_document(file: &AssetFile) -> std::result::Result<Value, StarlocError> {
    let text = std::fs::read_to_string(&file.path).map_err(|e| StarlocError::MalformedDocument {
        document: file.document.clone(),
        reason: e.to_string(),
    })?;
    parse_document(&text, &file.document)
}

/// Every scalar leaf of `doc`, depth-first in document order.
pub fn flatten_paths(doc: &Value) -> Vec<PathAddress> {
    let mut out = Vec::new();
    collect_leaves(doc, &PathAddress::root(), &mut out);
    out
}

fn collect_leaves(node: &Value, at: &PathAddress, out: &mut Vec<PathAddress>) {
    match node {
        Value::Object(map) => {
            for (k, v) in map {
                collect_leaves(v, &at.child(k), out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                collect_leaves(v, &at.index(i), out);
            }
        }
        _ => out.push(at.clone()),
    }
}

pub fn get<'a>(doc: &'a Value, address: &PathAddress) -> std::result::Result<&'a Value, StarlocError> {
    let mut node = doc;
    for seg in address.segments() {
        let current = node;
        node = step(current, seg).ok_or_else(|| shape(address, seg, current))?;
    }
    Ok(node)
}

fn step<'a>(node: &'a Value, seg: &Segment) -> Option<&'a Value> {
    match (node, seg) {
        (Value::Object(map), seg) => map.get(&*seg.as_key()),
        (Value::Array(items), Segment::Index(i)) => items.get(*i),
        _ => None,
    }
}

/// Write `value` at `address`, creating missing intermediate objects.
pub fn set(doc: &mut Value, address: &PathAddress, value: Value) -> std::result::Result<(), StarlocError> {
    let Some((last, parents)) = address.segments().split_last() else {
        *doc = value;
        return Ok(());
    };
    let mut node = doc;
    for seg in parents {
        node = match node {
            Value::Object(map) => map
                .entry(seg.as_key().into_owned())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => match seg {
                Segment::Index(i) if *i < items.len() => &mut items[*i],
                _ => return Err(shape(address, seg, &Value::Array(Vec::new()))),
            },
            other => return Err(shape(address, seg, other)),
        };
    }
    match (node, last) {
        (Value::Object(map), seg) => {
            map.insert(seg.as_key().into_owned(), value);
        }
        (Value::Array(items), Segment::Index(i)) if *i < items.len() => items[*i] = value,
        (Value::Array(items), Segment::Index(i)) if *i == items.len() => items.push(value),
        (other, seg) => return Err(shape(address, seg, other)),
    }
    Ok(())
}

fn shape(address: &PathAddress, seg: &Segment, node: &Value) -> StarlocError {
    let kind = match node {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "bool",
        Value::Null => "null",
    };
    StarlocError::TreeShape {
        address: address.clone(),
        reason: format!("cannot step into '{}' of {kind}", seg.as_key()),
    }
}
