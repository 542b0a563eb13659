use super::{fail_on, load_settings, print_json, OutputFormat};
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub fn run_export_cmd(
    translations: Option<PathBuf>,
    out_mod: Option<PathBuf>,
    format: OutputFormat,
    use_color: bool,
) -> color_eyre::Result<()> {
    let mut settings = load_settings(None, translations)?;
    if let Some(dir) = out_mod {
        settings.export_dir = dir;
    }
    let summary = starloc_services::run_export(&settings)?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            for entry in &summary.long_codex_entries {
                crate::ui_warn!("String too long for a codex page: {entry}");
            }
            let completion = format!("{:.2}%", summary.completion);
            let completion = if use_color {
                completion.cyan().to_string()
            } else {
                completion
            };
            crate::ui_ok!(
                "{} patch files ({} operations) written to {}",
                summary.patch_files,
                summary.operations,
                settings.export_dir.display()
            );
            crate::ui_info!("Translated labels: {}", summary.translated_labels);
            crate::ui_info!("Summary labels: {}", summary.total_labels);
            crate::ui_info!("Completion: {completion}");
        }
    }
    fail_on(&summary.failed)
}
