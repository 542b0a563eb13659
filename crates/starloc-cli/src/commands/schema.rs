use std::fs;
use std::path::PathBuf;

pub fn run_schema(out_dir: Option<PathBuf>) -> color_eyre::Result<()> {
    let out_dir = match out_dir {
        Some(dir) => dir,
        None => {
            let cfg = starloc_config::load_config()?;
            PathBuf::from(
                cfg.schema
                    .and_then(|s| s.out_dir)
                    .unwrap_or_else(|| "./docs/assets/schemas".to_string()),
            )
        }
    };
    fs::create_dir_all(&out_dir)?;
    macro_rules! dump {
        ($ty:ty, $name:literal) => {{
            let schema = schemars::schema_for!($ty);
            let path = out_dir.join($name);
            let f = std::fs::File::create(&path)?;
            serde_json::to_writer_pretty(f, &schema)?;
        }};
    }
    dump!(Vec<starloc_domain::LabelRecord>, "storage_file.schema.json");
    dump!(starloc_domain::SubstitutionTable, "substitutions.schema.json");
    dump!(Vec<starloc_domain::PatchOperation>, "patch.schema.json");
    dump!(starloc_domain::CounterTree, "counters.schema.json");
    dump!(starloc_domain::ExtractSummary, "extract_summary.schema.json");
    dump!(starloc_domain::ExportSummary, "export_summary.schema.json");
    dump!(starloc_domain::MergeSummary, "merge_summary.schema.json");
    crate::ui_ok!("Schemas written to {}", out_dir.display());
    Ok(())
}
