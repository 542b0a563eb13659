use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod address;

pub use address::{PathAddress, Segment};

/// Workspace-wide result alias.
pub type Result<T> = color_eyre::eyre::Result<T>;

/// Leaf name of the synthetic address holding the emote half of a split glitch utterance.
pub const GLITCH_EMOTE: &str = "glitchEmote";
/// Leaf name of the synthetic address holding the text half of a split glitch utterance.
pub const GLITCH_EMOTED_TEXT: &str = "glitchEmotedText";

/// One translatable string found in an asset document.
///
/// Produced by text handlers during extraction. Many records may share the
/// same `(section, text)` pair; they collapse into one label later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub section: Option<String>,
    pub text: String,
    /// Asset path relative to the asset root, `/`-separated.
    pub document: String,
    pub address: PathAddress,
}

/// Error taxonomy shared by the parsing, extraction and merge layers.
///
/// Every variant except `Persistence` and `InputClosed` is recovered by the
/// caller: the offending document, leaf or replacement is skipped and logged.
#[derive(Debug, Error)]
pub enum StarlocError {
    #[error("malformed document {document}: {reason}")]
    MalformedDocument { document: String, reason: String },

    #[error("{document}: value at {address} is not a string")]
    NotAString {
        document: String,
        address: PathAddress,
    },

    #[error("address {address} does not fit the document: {reason}")]
    TreeShape {
        address: PathAddress,
        reason: String,
    },

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("no label for {document} at {address} in {storage}")]
    RoutingMiss {
        document: String,
        address: PathAddress,
        storage: String,
    },

    #[error("cannot split glitch utterance '{text}'")]
    AmbiguousGlitchSplit { text: String },

    #[error("cannot write {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("operator input closed")]
    InputClosed,
}
