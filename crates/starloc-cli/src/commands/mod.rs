pub mod export;
pub mod extract;
pub mod merge;
pub mod schema;

use color_eyre::eyre::{eyre, Result};
use serde::Serialize;
use starloc_services::{LinePrompt, Operator, Settings};
use std::path::PathBuf;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Settings from the discovered config with command-line directory overrides applied.
pub fn load_settings(assets: Option<PathBuf>, translations: Option<PathBuf>) -> Result<Settings> {
    let cfg = starloc_config::load_config()?;
    let mut settings = Settings::from_config(&cfg)?;
    if let Some(dir) = assets {
        settings.layout.assets_dir = dir;
    }
    if let Some(dir) = translations {
        settings.layout.translations_dir = dir;
    }
    Ok(settings)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    serde_json::to_writer_pretty(&mut lock, value)?;
    use std::io::Write;
    writeln!(lock)?;
    Ok(())
}

/// Turn collected per-file failures into a non-zero exit once everything else is done.
pub fn fail_on(failed: &[String]) -> Result<()> {
    if failed.is_empty() {
        return Ok(());
    }
    for f in failed {
        crate::ui_err!("{f}");
    }
    Err(eyre!("{} file(s) could not be written", failed.len()))
}

/// Prompts go to stderr when stdout carries JSON.
pub fn operator_for(format: OutputFormat) -> Box<dyn Operator> {
    match format {
        OutputFormat::Text => Box::new(LinePrompt::stdio()),
        OutputFormat::Json => Box::new(LinePrompt::new(std::io::stdin().lock(), std::io::stderr())),
    }
}
