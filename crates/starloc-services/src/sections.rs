//! Grouping tags for labels. A section is translator context and part of the
//! dedup key, so equal text in different sections never collapses.

use crate::util::anchored;
use regex::Regex;
use starloc_core::PathAddress;

#[derive(Debug, Clone)]
pub struct SectionRule {
    name: String,
    file_patterns: Vec<Regex>,
    address_patterns: Vec<Regex>,
    all_conditions: bool,
}

impl SectionRule {
    pub fn new(
        name: &str,
        file_patterns: &[String],
        address_patterns: &[String],
        all_conditions: bool,
    ) -> Result<Self, regex::Error> {
        let compile = |pats: &[String]| {
            pats.iter()
                .map(|p| anchored(p))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            name: name.to_string(),
            file_patterns: compile(file_patterns)?,
            address_patterns: compile(address_patterns)?,
            all_conditions,
        })
    }

    /// With `all_conditions` both a file and an address pattern must match,
    /// otherwise either one is enough.
    pub fn matches(&self, document: &str, address: &str) -> bool {
        let file_match = self.file_patterns.iter().any(|re| re.is_match(document));
        if file_match && !self.all_conditions {
            return true;
        }
        let address_match = self.address_patterns.iter().any(|re| re.is_match(address));
        address_match && (file_match || !self.all_conditions)
    }
}

/// Ordered rule list; the first matching rule names the section.
#[derive(Debug, Clone, Default)]
pub struct SectionClassifier {
    rules: Vec<SectionRule>,
}

impl SectionClassifier {
    pub fn new(rules: Vec<SectionRule>) -> Self {
        Self { rules }
    }

    pub fn classify(&self, document: &str, address: &PathAddress) -> Option<String> {
        let rendered = address.to_string();
        self.rules
            .iter()
            .find(|r| r.matches(document, &rendered))
            .map(|r| r.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Vec<String> {
        vec![s.to_string()]
    }

    #[test]
    fn file_pattern_alone_is_enough_by_default() {
        let rule = SectionRule::new("npcnames", &p(".*\\.namesource$"), &[], false).unwrap();
        let classifier = SectionClassifier::new(vec![rule]);
        let addr = PathAddress::parse("/sourceNames/3").unwrap();
        assert_eq!(
            classifier.classify("names/human.namesource", &addr).as_deref(),
            Some("npcnames")
        );
        assert_eq!(classifier.classify("items/a.item", &addr), None);
    }

    #[test]
    fn all_conditions_needs_both() {
        let rule = SectionRule::new("quests", &p("quests/"), &p("/title$"), true).unwrap();
        assert!(rule.matches("quests/a.questtemplate", "/title"));
        assert!(!rule.matches("quests/a.questtemplate", "/text"));
        assert!(!rule.matches("items/a.item", "/title"));
    }

    #[test]
    fn first_matching_rule_wins() {
        let a = SectionRule::new("first", &[], &p("/title"), false).unwrap();
        let b = SectionRule::new("second", &[], &p("/title"), false).unwrap();
        let classifier = SectionClassifier::new(vec![a, b]);
        let addr = PathAddress::parse("/title").unwrap();
        assert_eq!(classifier.classify("x.item", &addr).as_deref(), Some("first"));
    }
}
