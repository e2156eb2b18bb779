use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::inventory::inventory_manifest_path;
use crate::model::{ExtractRunManifest, PatientInventoryManifest};
use crate::util::latest_manifest;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.output_dir.join("manifests");
    let inventory_path = inventory_manifest_path(&args.output_dir);

    info!(output_dir = %args.output_dir.display(), "status requested");

    if inventory_path.exists() {
        let inventory: PatientInventoryManifest = read_manifest(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            source = %inventory.source_directory,
            document_count = inventory.document_count,
            patient_count = inventory.patient_count,
            incomplete = inventory.incomplete.len(),
            ignored = inventory.ignored_files.len(),
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    match latest_manifest(&manifest_dir, "extract_run_")? {
        Some(run_path) => {
            let run: ExtractRunManifest = read_manifest(&run_path)?;
            info!(
                path = %run_path.display(),
                run_id = %run.run_id,
                status = %run.status,
                started_at = %run.started_at,
                updated_at = %run.updated_at,
                written = run.counts.records_written,
                failed = run.counts.records_failed,
                incomplete = run.counts.incomplete_skipped,
                filtered_out = run.counts.filtered_out,
                "loaded latest extract run manifest"
            );
            for failure in &run.failures {
                warn!(code = %failure.code, error = %failure.error, "patient failed in latest run");
            }
        }
        None => warn!(path = %manifest_dir.display(), "no extract run manifest found"),
    }

    let record_count = count_records(&args.output_dir)?;
    info!(
        output_dir = %args.output_dir.display(),
        records = record_count,
        "patient records on disk"
    );

    Ok(())
}

fn read_manifest<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn count_records(output_dir: &Path) -> Result<usize> {
    if !output_dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    let entries = fs::read_dir(output_dir)
        .with_context(|| format!("failed to read {}", output_dir.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", output_dir.display()))?;
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json && path.is_file() {
            count += 1;
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::write_json_pretty;

    #[test]
    fn counts_only_top_level_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("P001.json"), b"{}").expect("write");
        fs::write(dir.path().join("P002.json"), b"{}").expect("write");
        fs::write(dir.path().join("readme.txt"), b"text").expect("write");
        write_json_pretty(
            &dir.path().join("manifests").join("extract_run_20240101T000000Z.json"),
            &serde_json::json!({}),
        )
        .expect("write manifest");

        assert_eq!(count_records(dir.path()).expect("count"), 2);
        assert_eq!(count_records(&dir.path().join("missing")).expect("count"), 0);
    }

    #[test]
    fn latest_run_manifest_is_picked_by_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in [
            "extract_run_20240101T000000Z.json",
            "extract_run_20240301T000000Z.json",
            "patient_inventory.json",
        ] {
            fs::write(dir.path().join(name), b"{}").expect("write");
        }

        let latest = latest_manifest(dir.path(), "extract_run_")
            .expect("scan manifests")
            .expect("latest manifest");
        assert!(latest.ends_with("extract_run_20240301T000000Z.json"));
    }
}
