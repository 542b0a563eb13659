use super::{fail_on, load_settings, operator_for, print_json, OutputFormat};
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub fn run_merge_cmd(
    mod_dir: Option<PathBuf>,
    translations: Option<PathBuf>,
    format: OutputFormat,
    use_color: bool,
) -> color_eyre::Result<()> {
    let mut settings = load_settings(None, translations)?;
    if let Some(dir) = mod_dir {
        settings.mod_dir = dir;
    }
    let mut operator = operator_for(format);
    let summary = starloc_services::run_merge(&settings, operator.as_mut())?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            let accepted = if use_color {
                summary.accepted.green().to_string()
            } else {
                summary.accepted.to_string()
            };
            crate::ui_ok!(
                "{} accepted, {} unchanged, {} previously denied",
                accepted,
                summary.unchanged,
                summary.denied_skipped
            );
            crate::ui_info!(
                "conflicts: {} new, {} old, {} manual; {} storage files written",
                summary.conflicts_new,
                summary.conflicts_old,
                summary.conflicts_manual,
                summary.files_written
            );
            if summary.routing_misses > 0 {
                crate::ui_warn!("{} replacements had no matching label", summary.routing_misses);
            }
            if summary.ambiguous_splits > 0 {
                crate::ui_warn!("{} glitch texts could not be split", summary.ambiguous_splits);
            }
            if summary.malformed > 0 {
                crate::ui_warn!("{} patch files could not be parsed", summary.malformed);
            }
            if summary.invalid_paths > 0 {
                crate::ui_warn!("{} patch operations had an invalid path", summary.invalid_paths);
            }
        }
    }
    fail_on(&summary.failed)
}
