//! Storage-file selection for labels.

use crate::settings::Layout;
use starloc_core::{PathAddress, GLITCH_EMOTED_TEXT};
use starloc_domain::SubstitutionTable;
use std::collections::BTreeMap;

/// Where one `(document, address)` pair of a label is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub storage: String,
    /// Needs a substitution entry so merge-back can find it.
    pub substitute: bool,
}

pub struct SharedPathResolver<'a> {
    layout: &'a Layout,
    wide_spread_bucket: &'a str,
    special_buckets: &'a BTreeMap<String, String>,
    pinned: &'a SubstitutionTable,
}

impl<'a> SharedPathResolver<'a> {
    pub fn new(
        layout: &'a Layout,
        wide_spread_bucket: &'a str,
        special_buckets: &'a BTreeMap<String, String>,
        pinned: &'a SubstitutionTable,
    ) -> Self {
        Self {
            layout,
            wide_spread_bucket,
            special_buckets,
            pinned,
        }
    }

    /// Deepest common ancestor of `documents` as a `/`-separated id. A single
    /// document is its own ancestor; an empty result means the tree root.
    pub fn common_ancestor<'d, I>(documents: I) -> String
    where
        I: IntoIterator<Item = &'d str>,
    {
        let mut prefix: Option<Vec<&str>> = None;
        for doc in documents {
            let parts: Vec<&str> = doc.split('/').filter(|s| !s.is_empty()).collect();
            prefix = Some(match prefix {
                None => parts,
                Some(current) => current
                    .iter()
                    .zip(parts.iter())
                    .take_while(|(a, b)| a == b)
                    .map(|(a, _)| *a)
                    .collect(),
            });
        }
        prefix.unwrap_or_default().join("/")
    }

    /// Storage file owning a label referenced by `documents`.
    pub fn shared_storage<'d, I>(&self, documents: I) -> String
    where
        I: IntoIterator<Item = &'d str>,
    {
        let ancestor = Self::common_ancestor(documents);
        if ancestor.is_empty() {
            self.layout.bucket_storage(self.wide_spread_bucket)
        } else {
            self.layout.bucket_storage(&ancestor)
        }
    }

    /// Route one contributing address. Pinned entries beat special buckets,
    /// which beat the label's shared storage.
    pub fn route(&self, shared: &str, document: &str, address: &PathAddress) -> Route {
        if let Some(storage) = self.pinned.get(document, address) {
            return Route {
                storage: storage.to_string(),
                substitute: true,
            };
        }
        let leaf = address.leaf_name();
        let storage = leaf
            .as_deref()
            .and_then(|name| self.special_buckets.get(name))
            .map(|bucket| self.layout.bucket_storage(bucket))
            .unwrap_or_else(|| shared.to_string());
        let substitute = storage != self.layout.default_storage(document)
            || leaf.as_deref() == Some(GLITCH_EMOTED_TEXT);
        Route {
            storage,
            substitute,
        }
    }
}

/// Storage file merge-back looks in for `(document, address)`.
pub fn resolve_storage(
    layout: &Layout,
    substitutions: &SubstitutionTable,
    document: &str,
    address: &PathAddress,
) -> String {
    substitutions
        .get(document, address)
        .map(str::to_string)
        .unwrap_or_else(|| layout.default_storage(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn layout() -> Layout {
        Layout {
            assets_dir: PathBuf::from("assets"),
            translations_dir: PathBuf::from("translations"),
            texts_prefix: "texts".into(),
            source_lang: "Eng".into(),
            target_lang: "Rus".into(),
        }
    }

    fn addr(s: &str) -> PathAddress {
        PathAddress::parse(s).unwrap()
    }

    #[test]
    fn common_subdirectory_owns_the_label() {
        let layout = layout();
        let special = BTreeMap::new();
        let pinned = SubstitutionTable::default();
        let r = SharedPathResolver::new(&layout, "wide_spread_fields", &special, &pinned);
        assert_eq!(
            r.shared_storage(["items/weapons/a.item", "items/tools/b.item"]),
            "texts/items.json"
        );
        assert_eq!(
            r.shared_storage(["items/a.item", "objects/b.object"]),
            "texts/wide_spread_fields.json"
        );
        assert_eq!(r.shared_storage(["items/a.item"]), "texts/items/a.item.json");
    }

    #[test]
    fn shared_route_needs_substitution_default_does_not() {
        let layout = layout();
        let special = BTreeMap::new();
        let pinned = SubstitutionTable::default();
        let r = SharedPathResolver::new(&layout, "wide_spread_fields", &special, &pinned);
        let own = r.route("texts/items/a.item.json", "items/a.item", &addr("/description"));
        assert!(!own.substitute);
        let shared = r.route("texts/items.json", "items/a.item", &addr("/description"));
        assert_eq!(shared.storage, "texts/items.json");
        assert!(shared.substitute);
    }

    #[test]
    fn special_leaf_goes_to_its_bucket() {
        let layout = layout();
        let special = BTreeMap::from([("glitchEmote".to_string(), "glitchEmotes".to_string())]);
        let pinned = SubstitutionTable::default();
        let r = SharedPathResolver::new(&layout, "wide_spread_fields", &special, &pinned);
        let emote = r.route(
            "texts/a.object.json",
            "a.object",
            &addr("/glitchDescription/glitchEmote"),
        );
        assert_eq!(emote.storage, "texts/glitchEmotes.json");
        assert!(emote.substitute);
        let text = r.route(
            "texts/a.object.json",
            "a.object",
            &addr("/glitchDescription/glitchEmotedText"),
        );
        assert_eq!(text.storage, "texts/a.object.json");
        assert!(text.substitute);
    }

    #[test]
    fn pinned_entry_wins_and_merge_resolves_it() {
        let layout = layout();
        let special = BTreeMap::new();
        let mut pinned = SubstitutionTable::default();
        pinned.insert("a.item", addr("/description"), "texts/pool.json");
        let r = SharedPathResolver::new(&layout, "wide_spread_fields", &special, &pinned);
        let route = r.route("texts/a.item.json", "a.item", &addr("/description"));
        assert_eq!(route.storage, "texts/pool.json");
        assert_eq!(
            resolve_storage(&layout, &pinned, "a.item", &addr("/description")),
            "texts/pool.json"
        );
        assert_eq!(
            resolve_storage(&layout, &pinned, "a.item", &addr("/title")),
            "texts/a.item.json"
        );
    }
}
