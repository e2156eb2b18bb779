use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::cli::InventoryArgs;
use crate::model::{
    DocumentKind, IncompletePatient, PatientInventoryManifest, PatientPair, SourceDocument,
};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

#[derive(Debug, Clone)]
pub struct PairingRules {
    pub mutation_markers: Vec<String>,
    pub note_markers: Vec<String>,
}

impl Default for PairingRules {
    fn default() -> Self {
        Self {
            mutation_markers: ["stanford", "mutation", "mutations", "mut"]
                .into_iter()
                .map(ToOwned::to_owned)
                .collect(),
            note_markers: ["tr", "note"].into_iter().map(ToOwned::to_owned).collect(),
        }
    }
}

impl PairingRules {
    pub fn classify_stem(&self, stem: &str) -> Option<(DocumentKind, String)> {
        let tokens = stem
            .split(|character: char| matches!(character, '_' | '-' | ' ' | '.'))
            .filter(|token| !token.is_empty())
            .collect::<Vec<&str>>();

        let has_marker = |markers: &[String]| {
            tokens
                .iter()
                .any(|token| markers.iter().any(|marker| marker.eq_ignore_ascii_case(token)))
        };

        let kind = if has_marker(&self.mutation_markers) {
            DocumentKind::Mutation
        } else if has_marker(&self.note_markers) {
            DocumentKind::Note
        } else {
            return None;
        };

        let code = tokens
            .iter()
            .filter(|token| !self.is_marker(token))
            .copied()
            .collect::<Vec<&str>>()
            .join("_")
            .to_uppercase();

        if code.is_empty() {
            return None;
        }

        Some((kind, code))
    }

    fn is_marker(&self, token: &str) -> bool {
        self.mutation_markers
            .iter()
            .chain(&self.note_markers)
            .any(|marker| marker.eq_ignore_ascii_case(token))
    }
}

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_inventory(&args.input_dir, &PairingRules::default())?;

    for patient in &manifest.incomplete {
        warn!(
            code = %patient.code,
            missing = patient.missing.as_str(),
            present = %patient.present.path,
            "incomplete patient documents"
        );
    }

    if args.dry_run {
        info!(
            document_count = manifest.document_count,
            patient_count = manifest.patient_count,
            incomplete = manifest.incomplete.len(),
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| inventory_manifest_path(&args.output_dir));

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(
        patient_count = manifest.patient_count,
        incomplete = manifest.incomplete.len(),
        "inventory completed"
    );

    Ok(())
}

pub fn inventory_manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join("manifests").join("patient_inventory.json")
}

#[derive(Default)]
struct PendingPatient {
    note: Option<SourceDocument>,
    mutation: Option<SourceDocument>,
}

pub fn build_inventory(input_dir: &Path, rules: &PairingRules) -> Result<PatientInventoryManifest> {
    let mut paths = Vec::new();
    discover_documents(input_dir, &mut paths)?;
    paths.sort();

    if paths.is_empty() {
        bail!("no .docx documents found in {}", input_dir.display());
    }

    let document_count = paths.len();
    let mut pending: BTreeMap<String, PendingPatient> = BTreeMap::new();
    let mut ignored_files = Vec::new();
    let mut warnings = Vec::new();

    for path in paths {
        let shown = path.display().to_string();
        let Some((kind, code)) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| rules.classify_stem(stem))
        else {
            debug!(path = %shown, "ignoring unclassified document");
            ignored_files.push(shown);
            continue;
        };

        let entry = pending.entry(code.clone()).or_default();
        let slot = match kind {
            DocumentKind::Note => &mut entry.note,
            DocumentKind::Mutation => &mut entry.mutation,
        };

        if let Some(existing) = slot.as_ref() {
            let message = format!(
                "duplicate {} document for {code}: keeping {}, ignoring {shown}",
                kind.as_str(),
                existing.path
            );
            warn!(code = %code, kept = %existing.path, ignored = %shown, "duplicate document");
            warnings.push(message);
            continue;
        }

        *slot = Some(SourceDocument {
            sha256: document_digest(&path, &mut warnings),
            path: shown,
            kind,
        });
    }

    let mut patients = Vec::new();
    let mut incomplete = Vec::new();
    for (code, patient) in pending {
        match (patient.note, patient.mutation) {
            (Some(note), Some(mutation)) => patients.push(PatientPair {
                code,
                note,
                mutation,
            }),
            (Some(present), None) => incomplete.push(IncompletePatient {
                code,
                missing: DocumentKind::Mutation,
                present,
            }),
            (None, Some(present)) => incomplete.push(IncompletePatient {
                code,
                missing: DocumentKind::Note,
                present,
            }),
            (None, None) => {}
        }
    }

    Ok(PatientInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: input_dir.display().to_string(),
        document_count,
        patient_count: patients.len(),
        patients,
        incomplete,
        ignored_files,
        warnings,
    })
}

// An unreadable document stays in the inventory without a digest; its
// patient then fails on its own during extraction.
fn document_digest(path: &Path, warnings: &mut Vec<String>) -> Option<String> {
    match sha256_file(path) {
        Ok(digest) => Some(digest),
        Err(err) => {
            let message = format!("{err:#}");
            warn!(path = %path.display(), error = %message, "failed to hash document");
            warnings.push(format!("failed to hash {}: {message}", path.display()));
            None
        }
    }
}

fn discover_documents(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?;

        if file_type.is_dir() {
            discover_documents(&path, found)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let is_lock_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("~$"))
            .unwrap_or(false);
        let is_docx = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("docx"))
            .unwrap_or(false);

        if is_docx && !is_lock_file {
            found.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_note_and_mutation_stems() {
        let rules = PairingRules::default();
        let cases = [
            ("P001_note", Some((DocumentKind::Note, "P001"))),
            ("P001_TR", Some((DocumentKind::Note, "P001"))),
            ("p001-mutation", Some((DocumentKind::Mutation, "P001"))),
            ("Stanford P002", Some((DocumentKind::Mutation, "P002"))),
            ("P003_mut", Some((DocumentKind::Mutation, "P003"))),
            ("P004_mutations", Some((DocumentKind::Mutation, "P004"))),
            ("TR_mutation_P005", Some((DocumentKind::Mutation, "P005"))),
            ("CHU.12_note", Some((DocumentKind::Note, "CHU_12"))),
            ("random_report", None),
            ("note", None),
        ];

        for (stem, expected) in cases {
            let expected = expected.map(|(kind, code)| (kind, code.to_string()));
            assert_eq!(rules.classify_stem(stem), expected, "stem {stem:?}");
        }
    }

    #[test]
    fn inventory_pairs_documents_recursively() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("site_a");
        fs::create_dir_all(&nested).expect("create nested dir");

        fs::write(dir.path().join("P001_note.docx"), b"note").expect("write");
        fs::write(nested.join("P001_mutation.docx"), b"mutation").expect("write");
        fs::write(dir.path().join("P002_TR.docx"), b"note").expect("write");
        fs::write(dir.path().join("~$P001_note.docx"), b"lock").expect("write");
        fs::write(dir.path().join("summary.docx"), b"other").expect("write");
        fs::write(dir.path().join("P001_note.txt"), b"text").expect("write");

        let manifest =
            build_inventory(dir.path(), &PairingRules::default()).expect("build inventory");

        assert_eq!(manifest.document_count, 4);
        assert_eq!(manifest.patient_count, 1);
        assert_eq!(manifest.patients[0].code, "P001");
        assert!(manifest.patients[0].mutation.path.ends_with("P001_mutation.docx"));
        assert_eq!(
            manifest.patients[0].note.sha256.as_deref().map(str::len),
            Some(64)
        );

        assert_eq!(manifest.incomplete.len(), 1);
        assert_eq!(manifest.incomplete[0].code, "P002");
        assert_eq!(manifest.incomplete[0].missing, DocumentKind::Mutation);

        assert_eq!(manifest.ignored_files.len(), 1);
        assert!(manifest.ignored_files[0].ends_with("summary.docx"));
        assert!(manifest.warnings.is_empty());
    }

    #[test]
    fn duplicate_documents_keep_first_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("P001_mut.docx"), b"first").expect("write");
        fs::write(dir.path().join("P001_mutation.docx"), b"second").expect("write");
        fs::write(dir.path().join("P001_note.docx"), b"note").expect("write");

        let manifest =
            build_inventory(dir.path(), &PairingRules::default()).expect("build inventory");

        assert_eq!(manifest.patient_count, 1);
        assert!(manifest.patients[0].mutation.path.ends_with("P001_mut.docx"));
        assert_eq!(manifest.warnings.len(), 1);
    }

    #[test]
    fn unreadable_document_is_warned_without_digest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("P009_note.docx");
        let mut warnings = Vec::new();

        assert_eq!(document_digest(&missing, &mut warnings), None);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("P009_note.docx"));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(build_inventory(dir.path(), &PairingRules::default()).is_err());
    }
}
