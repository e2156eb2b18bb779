use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::cli::ExtractArgs;
use crate::commands::inventory::{PairingRules, build_inventory, inventory_manifest_path};
use crate::extract::{Extractor, assemble};
use crate::model::{
    ExtractCounts, ExtractPaths, ExtractRunManifest, PatientFailure, PatientPair,
};
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub codes: BTreeSet<String>,
    pub run_manifest_path: Option<PathBuf>,
    pub pairing: PairingRules,
}

impl ExtractConfig {
    pub fn from_args(args: ExtractArgs) -> Self {
        Self {
            input_dir: args.input_dir,
            output_dir: args.output_dir,
            codes: args
                .codes
                .iter()
                .map(|code| code.trim().to_uppercase())
                .filter(|code| !code.is_empty())
                .collect(),
            run_manifest_path: args.run_manifest_path,
            pairing: PairingRules::default(),
        }
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.output_dir.join("manifests")
    }

    fn command(&self) -> String {
        let mut parts = vec![
            "genoreport extract".to_string(),
            format!("--input-dir {}", self.input_dir.display()),
            format!("--output-dir {}", self.output_dir.display()),
        ];
        parts.extend(self.codes.iter().map(|code| format!("--code {code}")));
        parts.join(" ")
    }
}

pub fn run(args: ExtractArgs) -> Result<()> {
    let config = ExtractConfig::from_args(args);
    let manifest = run_with_config(&config)?;

    info!(
        run_id = %manifest.run_id,
        written = manifest.counts.records_written,
        failed = manifest.counts.records_failed,
        incomplete = manifest.counts.incomplete_skipped,
        "extraction completed"
    );

    Ok(())
}

pub fn run_with_config(config: &ExtractConfig) -> Result<ExtractRunManifest> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let manifest_dir = config.manifest_dir();
    ensure_directory(&config.output_dir)?;
    ensure_directory(&manifest_dir)?;

    let run_manifest_path = config.run_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "extract_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });

    info!(
        input_dir = %config.input_dir.display(),
        output_dir = %config.output_dir.display(),
        run_id = %run_id,
        "starting extraction"
    );

    let inventory = build_inventory(&config.input_dir, &config.pairing)?;
    let inventory_path = inventory_manifest_path(&config.output_dir);
    write_json_pretty(&inventory_path, &inventory)?;
    info!(
        path = %inventory_path.display(),
        patient_count = inventory.patient_count,
        "wrote inventory manifest"
    );

    let mut warnings = inventory.warnings.clone();
    for patient in &inventory.incomplete {
        warn!(
            code = %patient.code,
            missing = patient.missing.as_str(),
            "incomplete patient documents, skipping"
        );
        warnings.push(format!(
            "incomplete documents for {}: missing {}",
            patient.code,
            patient.missing.as_str()
        ));
    }

    let extractor = Extractor::new()?;
    let mut counts = ExtractCounts {
        patients_total: inventory.patient_count,
        incomplete_skipped: inventory.incomplete.len(),
        ..ExtractCounts::default()
    };
    let mut written = Vec::new();
    let mut failures = Vec::new();

    for pair in &inventory.patients {
        if !config.codes.is_empty() && !config.codes.contains(&pair.code) {
            counts.filtered_out += 1;
            continue;
        }

        match process_patient(&extractor, pair, &config.output_dir) {
            Ok(path) => {
                info!(code = %pair.code, path = %path.display(), "wrote patient record");
                counts.records_written += 1;
                written.push(pair.code.clone());
            }
            Err(err) => {
                let message = format!("{err:#}");
                error!(code = %pair.code, error = %message, "patient extraction failed");
                counts.records_failed += 1;
                failures.push(PatientFailure {
                    code: pair.code.clone(),
                    error: message,
                });
            }
        }
    }

    for code in &config.codes {
        if !inventory.patients.iter().any(|pair| &pair.code == code) {
            warn!(code = %code, "requested patient code not found");
            warnings.push(format!("requested patient code not found: {code}"));
        }
    }

    let status = if failures.is_empty() {
        "completed"
    } else {
        "completed_with_failures"
    };

    let manifest = ExtractRunManifest {
        manifest_version: 1,
        run_id,
        status: status.to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: config.command(),
        paths: ExtractPaths {
            input_dir: config.input_dir.display().to_string(),
            output_dir: config.output_dir.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            inventory_manifest_path: inventory_path.display().to_string(),
        },
        counts,
        written,
        failures,
        warnings,
    };

    write_json_pretty(&run_manifest_path, &manifest)?;
    info!(path = %run_manifest_path.display(), "wrote extract run manifest");

    Ok(manifest)
}

fn process_patient(extractor: &Extractor, pair: &PatientPair, output_dir: &Path) -> Result<PathBuf> {
    let note = extractor
        .extract_clinical_note(Path::new(&pair.note.path))
        .with_context(|| format!("failed to extract clinical note for {}", pair.code))?;
    let report = extractor
        .extract_mutation_report(Path::new(&pair.mutation.path))
        .with_context(|| format!("failed to extract mutation report for {}", pair.code))?;

    let record = assemble(&pair.code, note, report);
    let path = output_dir.join(format!("{}.json", pair.code));
    write_json_pretty(&path, &record)?;

    Ok(path)
}
