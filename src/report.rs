use crate::dataset::Dataset;
use crate::deduplicator::DedupOutcome;
use anyhow::{Context, Result};
use csv::Writer;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEDUPED_FILE: &str = "deduped.csv";
pub const REMOVED_LOG_FILE: &str = "removed_log.csv";
pub const SUMMARY_FILE: &str = "dedup_summary.txt";

/// Write the deduplicated dataset, its audit log and a summary into `output_dir`.
pub fn write_outcome(outcome: &DedupOutcome, source: &str, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    write_dataset_csv(&outcome.dataset, &output_dir.join(DEDUPED_FILE))?;
    write_dataset_csv(&outcome.audit.to_dataset(), &output_dir.join(REMOVED_LOG_FILE))?;
    fs::write(output_dir.join(SUMMARY_FILE), summary_text(outcome, source))?;
    Ok(())
}

pub fn write_dataset_csv(dataset: &Dataset, path: &Path) -> Result<()> {
    let mut writer = Writer::from_path(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;

    if !dataset.columns().is_empty() {
        writer.write_record(dataset.columns())?;
    }
    for row in dataset.rows() {
        writer.write_record(row.iter().map(|value| value.render()))?;
    }

    writer.flush()?;
    Ok(())
}

pub fn summary_text(outcome: &DedupOutcome, source: &str) -> String {
    let stats = &outcome.stats;
    let mut content = String::new();
    content.push_str(&format!("Deduplication Summary for: {}\n", source));
    content.push_str("==========================\n\n");
    content.push_str(&format!(
        "Total rows: {}\n\
        Removed rows: {}\n\
        Kept rows: {}\n\
        Removed share: {:.2}%\n",
        stats.total_rows,
        stats.removed_rows,
        outcome.dataset.len(),
        stats.removed_share * 100.0,
    ));

    match stats.threshold {
        Some(threshold) => {
            content.push_str(&format!("Threshold: {:.2}%\n", threshold * 100.0));
            if stats.exceeds_threshold() {
                content.push_str("⚠️  Removed share exceeds threshold\n");
            } else {
                content.push_str("✅ Removed share within threshold\n");
            }
        }
        None => content.push_str("Threshold: not set\n"),
    }

    if !outcome.audit.is_empty() {
        content.push_str("\nRemovals by reason:\n");
        let mut counts: Vec<(&'static str, usize)> = Vec::new();
        for entry in outcome.audit.entries() {
            let label = entry.reason.label();
            match counts.iter_mut().find(|(l, _)| *l == label) {
                Some((_, count)) => *count += 1,
                None => counts.push((label, 1)),
            }
        }
        for (label, count) in counts {
            content.push_str(&format!("   - {}: {}\n", label, count));
        }
    }

    content
}

/// Remove results of a previous run.
///
/// Only this tool's own files are deleted, one level deep in per-source
/// directories. Anything listed in `inputs` is never touched, and a source
/// directory is removed only once it is empty.
pub fn clean_output_directory(output_dir: &str, inputs: &[&Path]) -> Result<()> {
    let output_path = Path::new(output_dir);
    if !output_path.is_dir() {
        return Ok(());
    }

    let protected: Vec<PathBuf> = inputs
        .iter()
        .filter_map(|input| fs::canonicalize(input).ok())
        .collect();
    let items_to_clean = [DEDUPED_FILE, REMOVED_LOG_FILE, SUMMARY_FILE];

    let mut source_dirs = vec![output_path.to_path_buf()];
    for entry in fs::read_dir(output_path)? {
        let entry_path = entry?.path();
        if entry_path.is_dir() {
            source_dirs.push(entry_path);
        }
    }

    for source_dir in &source_dirs {
        let mut removed_any = false;
        for item in &items_to_clean {
            let item_path = source_dir.join(item);
            if !item_path.is_file() {
                continue;
            }
            let is_input = fs::canonicalize(&item_path)
                .map(|p| protected.contains(&p))
                .unwrap_or(false);
            if is_input {
                continue;
            }
            fs::remove_file(&item_path)?;
            debug!(path = %item_path.display(), "Removed previous result");
            removed_any = true;
        }

        if removed_any && source_dir.as_path() != output_path {
            // Fails while the directory still holds other files
            let _ = fs::remove_dir(source_dir);
        }
    }

    Ok(())
}
