use super::{fail_on, load_settings, operator_for, print_json, OutputFormat};
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub fn run_extract_cmd(
    assets: Option<PathBuf>,
    translations: Option<PathBuf>,
    yes: bool,
    format: OutputFormat,
    use_color: bool,
) -> color_eyre::Result<()> {
    let settings = load_settings(assets, translations)?;
    let mut operator = operator_for(format);
    let summary = starloc_services::run_extract(&settings, operator.as_mut(), yes)?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text if summary.cancelled => {
            crate::ui_warn!("Extraction cancelled, nothing was written")
        }
        OutputFormat::Text => {
            let labels = if use_color {
                summary.labels.green().to_string()
            } else {
                summary.labels.to_string()
            };
            crate::ui_ok!(
                "{} labels from {} documents in {} storage files",
                labels,
                summary.documents,
                summary.storage_files
            );
            for storage in &summary.unreadable_storage {
                crate::ui_err!("{} could not be read, its translations were not carried over", storage);
            }
            if summary.skipped_documents > 0 {
                crate::ui_warn!("{} documents skipped as malformed", summary.skipped_documents);
            }
            crate::ui_info!(
                "{} substitutions, {} files written, {} deleted",
                summary.substitutions,
                summary.written,
                summary.deleted
            );
        }
    }
    fail_on(&summary.failed)
}
