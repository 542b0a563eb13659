use std::fmt;

use serde::{Deserialize, Serialize};

use crate::StarlocError;

/// One step inside a document tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    /// The segment as it appears in a rendered address, before escaping.
    pub fn as_key(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Segment::Key(k) => std::borrow::Cow::Borrowed(k.as_str()),
            Segment::Index(i) => std::borrow::Cow::Owned(i.to_string()),
        }
    }
}

/// Location of one scalar inside a structured document.
///
/// Rendered JSON Pointer style (`/dialog/0/text`); `~` and `/` inside keys
/// are escaped as `~0` and `~1`. The empty address is the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathAddress {
    segments: Vec<Segment>,
}

impl PathAddress {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(s: &str) -> Result<Self, StarlocError> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = s.strip_prefix('/') else {
            return Err(StarlocError::InvalidAddress(s.to_string()));
        };
        let segments = rest.split('/').map(parse_segment).collect();
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// A new address one object key deeper. Numeric keys become index
    /// segments so the result equals its own parsed rendering.
    pub fn child(&self, key: &str) -> Self {
        let mut out = self.clone();
        out.segments.push(match index_of(key) {
            Some(i) => Segment::Index(i),
            None => Segment::Key(key.to_string()),
        });
        out
    }

    pub fn index(&self, idx: usize) -> Self {
        let mut out = self.clone();
        out.segments.push(Segment::Index(idx));
        out
    }

    /// Append every segment of `tail`.
    pub fn join(&self, tail: &PathAddress) -> Self {
        let mut out = self.clone();
        out.segments.extend(tail.segments.iter().cloned());
        out
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut out = self.clone();
        out.segments.pop();
        Some(out)
    }

    pub fn leaf_name(&self) -> Option<std::borrow::Cow<'_, str>> {
        self.segments.last().map(Segment::as_key)
    }
}

fn index_of(raw: &str) -> Option<usize> {
    let is_index = !raw.is_empty()
        && raw.bytes().all(|b| b.is_ascii_digit())
        && (raw == "0" || !raw.starts_with('0'));
    if is_index {
        raw.parse().ok()
    } else {
        None
    }
}

fn parse_segment(raw: &str) -> Segment {
    match index_of(raw) {
        Some(i) => Segment::Index(i),
        None => Segment::Key(raw.replace("~1", "/").replace("~0", "~")),
    }
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.segments {
            match seg {
                Segment::Key(k) => write!(f, "/{}", k.replace('~', "~0").replace('/', "~1"))?,
                Segment::Index(i) => write!(f, "/{i}")?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for PathAddress {
    type Err = StarlocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PathAddress {
    type Error = StarlocError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PathAddress> for String {
    fn from(value: PathAddress) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_render_round_trip() {
        let addr = PathAddress::parse("/dialog/0/text").unwrap();
        assert_eq!(
            addr.segments(),
            &[
                Segment::Key("dialog".into()),
                Segment::Index(0),
                Segment::Key("text".into())
            ]
        );
        assert_eq!(addr.to_string(), "/dialog/0/text");
    }

    #[test]
    fn escapes_slash_and_tilde_in_keys() {
        let addr = PathAddress::root().child("a/b").child("c~d");
        assert_eq!(addr.to_string(), "/a~1b/c~0d");
        assert_eq!(PathAddress::parse("/a~1b/c~0d").unwrap(), addr);
    }

    #[test]
    fn leading_zero_stays_a_key() {
        let addr = PathAddress::parse("/007").unwrap();
        assert_eq!(addr.segments(), &[Segment::Key("007".into())]);
    }

    #[test]
    fn numeric_object_key_matches_parsed_form() {
        let addr = PathAddress::root().child("names").child("2");
        assert_eq!(PathAddress::parse(&addr.to_string()).unwrap(), addr);
    }

    #[test]
    fn rejects_relative_address() {
        assert!(matches!(
            PathAddress::parse("dialog/0"),
            Err(StarlocError::InvalidAddress(_))
        ));
    }

    #[test]
    fn parent_and_leaf() {
        let addr = PathAddress::parse("/greeting/glitchEmote").unwrap();
        assert_eq!(addr.leaf_name().as_deref(), Some("glitchEmote"));
        assert_eq!(addr.parent().unwrap().to_string(), "/greeting");
        assert!(PathAddress::root().parent().is_none());
    }

    #[test]
    fn serializes_as_string() {
        let addr = PathAddress::parse("/a/1").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"/a/1\"");
        let back: PathAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
