//! Text handlers turn one selected string into extraction records.
//!
//! The chain asks each handler in order and keeps the first non-empty answer;
//! a pass-through handler always terminates it.

use once_cell::sync::Lazy;
use regex::Regex;
use starloc_core::{ExtractionRecord, PathAddress, StarlocError, GLITCH_EMOTE, GLITCH_EMOTED_TEXT};

static GLITCH_UTTERANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{0,3}\s?[A-Za-z]+\.)\s+((?s:.*))$").expect("glitch utterance regex")
});
static GLITCH_CONTEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[gG]litch").expect("glitch context regex"));

pub trait TextHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when this handler does not apply to the value.
    fn try_extract(
        &self,
        value: &str,
        document: &str,
        address: &PathAddress,
    ) -> Option<Vec<ExtractionRecord>>;
}

fn record(text: &str, document: &str, address: PathAddress) -> ExtractionRecord {
    ExtractionRecord {
        section: None,
        text: text.to_string(),
        document: document.to_string(),
        address,
    }
}

/// Takes the string as one record at its own address.
pub struct PassThrough;

impl TextHandler for PassThrough {
    fn name(&self) -> &'static str {
        "pass-through"
    }

    fn try_extract(
        &self,
        value: &str,
        document: &str,
        address: &PathAddress,
    ) -> Option<Vec<ExtractionRecord>> {
        Some(vec![record(value, document, address.clone())])
    }
}

/// Splits `"Hi. This is a robot."` at a glitch-context address into an emote
/// record and a text record at synthetic sibling addresses.
pub struct GlitchSplitter;

impl TextHandler for GlitchSplitter {
    fn name(&self) -> &'static str {
        "glitch-emote"
    }

    fn try_extract(
        &self,
        value: &str,
        document: &str,
        address: &PathAddress,
    ) -> Option<Vec<ExtractionRecord>> {
        if !GLITCH_CONTEXT.is_match(&address.to_string()) {
            return None;
        }
        let caps = GLITCH_UTTERANCE.captures(value)?;
        let emote = caps.get(1)?.as_str();
        let text = caps.get(2)?.as_str();
        if text.is_empty() {
            return None;
        }
        Some(vec![
            record(text, document, address.child(GLITCH_EMOTED_TEXT)),
            record(emote, document, address.child(GLITCH_EMOTE)),
        ])
    }
}

pub struct HandlerChain {
    handlers: Vec<Box<dyn TextHandler>>,
}

impl HandlerChain {
    /// `handlers` run in order before the pass-through terminator.
    pub fn new(mut handlers: Vec<Box<dyn TextHandler>>) -> Self {
        handlers.push(Box::new(PassThrough));
        Self { handlers }
    }

    pub fn standard() -> Self {
        Self::new(vec![Box::new(GlitchSplitter)])
    }

    pub fn extract(&self, value: &str, document: &str, address: &PathAddress) -> Vec<ExtractionRecord> {
        for handler in &self.handlers {
            if let Some(records) = handler.try_extract(value, document, address) {
                if !records.is_empty() {
                    tracing::trace!(event = "text_handled", handler = handler.name(), document = document, address = %address);
                    return records;
                }
            }
        }
        Vec::new()
    }
}

/// Recombine the two halves of a split glitch utterance.
pub fn join_glitch(emote: &str, text: &str) -> String {
    format!("{emote} {text}")
}

/// Split a combined glitch utterance at its first period.
///
/// One leading repeat of the emote is dropped from the text half; a text
/// that still starts with the emote afterwards is rejected.
pub fn split_glitch(combined: &str) -> Result<(String, String), StarlocError> {
    let ambiguous = || StarlocError::AmbiguousGlitchSplit {
        text: combined.to_string(),
    };
    let offset = combined.find('.').ok_or_else(ambiguous)?;
    let emote = &combined[..=offset];
    let mut rest = combined[offset + 1..].chars();
    rest.next();
    let mut text = rest.as_str();
    if let Some(stripped) = text.strip_prefix(emote) {
        let mut after = stripped.chars();
        after.next();
        text = after.as_str();
        if text.starts_with(emote) {
            return Err(ambiguous());
        }
    }
    if text.is_empty() {
        return Err(ambiguous());
    }
    Ok((emote.to_string(), text.to_string()))
}
