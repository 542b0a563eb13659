//! Orchestration over the lower-level crates: extraction, routing,
//! persistence, patch emission and merge-back. The CLI only talks to this crate.

pub mod database;
pub mod export;
pub mod extract;
pub mod handlers;
pub mod merge;
pub mod prompt;
pub mod routing;
pub mod sections;
pub mod select;
pub mod settings;
pub mod util;

pub use starloc_core::{ExtractionRecord, PathAddress, Result, StarlocError};

pub use export::run_export;
pub use extract::run_extract;
pub use merge::{run_merge, MergeEngine};
pub use prompt::{LinePrompt, Operator};
pub use settings::{Layout, Settings};
