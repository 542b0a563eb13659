use crate::database::{find_dangling, flush, FileBuffer, LabelDatabase, PriorDatabase};
use crate::prompt::Operator;
use crate::routing::SharedPathResolver;
use crate::settings::Settings;
use crate::Result;
use rayon::prelude::*;
use starloc_core::{ExtractionRecord, StarlocError};
use starloc_domain::{ExtractSummary, SCHEMA_VERSION};
use starloc_parsers_json::{read_document, scan_assets, AssetFile};

/// Mine every scanned asset. Documents are parsed in parallel and the
/// results concatenated in document order. Returns the records and the
/// number of documents skipped as malformed.
pub fn mine_assets(settings: &Settings, files: &[AssetFile]) -> (Vec<ExtractionRecord>, usize) {
    let mined: Vec<std::result::Result<Vec<ExtractionRecord>, StarlocError>> = files
        .par_iter()
        .map(|file| mine_document(settings, file))
        .collect();

    let mut records = Vec::new();
    let mut skipped = 0;
    for res in mined {
        match res {
            Ok(mut recs) => records.append(&mut recs),
            Err(e) => {
                skipped += 1;
                tracing::warn!(event = "document_skipped", error = %e);
            }
        }
    }
    (records, skipped)
}

fn mine_document(
    settings: &Settings,
    file: &AssetFile,
) -> std::result::Result<Vec<ExtractionRecord>, StarlocError> {
    let doc = read_document(file)?;
    let mut out = Vec::new();
    for (address, text) in settings.selector.select(&file.document, &doc) {
        for mut record in settings.handlers.extract(&text, &file.document, &address) {
            record.section = settings.sections.classify(&record.document, &record.address);
            out.push(record);
        }
    }
    Ok(out)
}

/// Rebuild the label database from the asset tree.
///
/// Stale storage files are only removed after the operator confirms (or
/// `assume_yes` is set); declining leaves everything on disk untouched.
pub fn run_extract(
    settings: &Settings,
    operator: &mut dyn Operator,
    assume_yes: bool,
) -> Result<ExtractSummary> {
    let layout = &settings.layout;
    let files = scan_assets(&layout.assets_dir, &settings.selector.scanned_suffixes())?;
    tracing::info!(event = "extract_scan", assets = %layout.assets_dir.display(), documents = files.len());

    let (records, skipped) = mine_assets(settings, &files);
    let record_count = records.len();
    let db = LabelDatabase::from_records(records);
    tracing::info!(event = "extract_labels", records = record_count, labels = db.len());

    let prior = PriorDatabase::load(layout);
    tracing::debug!(event = "prior_loaded", entries = prior.len());
    let resolver = SharedPathResolver::new(
        layout,
        &settings.wide_spread_bucket,
        &settings.special_buckets,
        &settings.pinned,
    );
    let mut buffer = FileBuffer::prepare(&db, &prior, &resolver, &layout.source_lang);
    buffer.substitutions.absorb(settings.pinned.clone());

    let dangling = find_dangling(layout, &buffer);
    let mut summary = ExtractSummary {
        schema_version: SCHEMA_VERSION,
        documents: files.len(),
        skipped_documents: skipped,
        records: record_count,
        labels: db.len(),
        storage_files: buffer.files.len(),
        substitutions: buffer.substitutions.len(),
        dangling: dangling.clone(),
        unreadable_storage: prior.unreadable().to_vec(),
        ..Default::default()
    };

    if !dangling.is_empty() && !assume_yes {
        operator.say("These files will be deleted:")?;
        for d in &dangling {
            operator.say(&format!("  {d}"))?;
        }
        operator.say("continue? (y/n)")?;
        if operator.choose(&["y", "n"])? == "n" {
            operator.say("Cancelled!")?;
            tracing::info!(event = "extract_cancelled", dangling = dangling.len());
            summary.cancelled = true;
            return Ok(summary);
        }
    }

    let report = flush(layout, &buffer, &dangling);
    summary.written = report.written;
    summary.deleted = report.deleted;
    summary.failed = report.failed;
    tracing::info!(
        event = "extract_done",
        written = summary.written,
        deleted = summary.deleted,
        failed = summary.failed.len()
    );
    Ok(summary)
}
