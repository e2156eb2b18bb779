use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Note,
    Mutation,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Mutation => "mutation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub path: String,
    pub kind: DocumentKind,
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientPair {
    pub code: String,
    pub note: SourceDocument,
    pub mutation: SourceDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompletePatient {
    pub code: String,
    pub missing: DocumentKind,
    pub present: SourceDocument,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub document_count: usize,
    pub patient_count: usize,
    pub patients: Vec<PatientPair>,
    pub incomplete: Vec<IncompletePatient>,
    pub ignored_files: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractPaths {
    pub input_dir: String,
    pub output_dir: String,
    pub manifest_dir: String,
    pub inventory_manifest_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractCounts {
    pub patients_total: usize,
    pub records_written: usize,
    pub records_failed: usize,
    pub incomplete_skipped: usize,
    pub filtered_out: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientFailure {
    pub code: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub paths: ExtractPaths,
    pub counts: ExtractCounts,
    pub written: Vec<String>,
    pub failures: Vec<PatientFailure>,
    pub warnings: Vec<String>,
}
