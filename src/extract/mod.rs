use std::path::Path;

use anyhow::Result;
use tracing::info;

pub mod assemble;
pub mod dates;
pub mod document;
pub mod mutations;
pub mod normalize;
pub mod note;
pub mod scores;
pub mod types;

pub use assemble::assemble;
pub use document::{Block, read_blocks};
pub use types::{ClinicalNote, MutationDocument};

use document::full_text;
use mutations::MutationExtractor;
use note::NoteExtractor;
use scores::ScoreExtractor;

pub struct Extractor {
    mutations: MutationExtractor,
    scores: ScoreExtractor,
    note: NoteExtractor,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            mutations: MutationExtractor::new()?,
            scores: ScoreExtractor::new()?,
            note: NoteExtractor::new()?,
        })
    }

    pub fn extract_mutation_report(&self, path: &Path) -> Result<MutationDocument> {
        let blocks = read_blocks(path)?;
        let report = self.mutation_report_from_blocks(&blocks);
        info!(
            path = %path.display(),
            sections = report.mutations.len(),
            score_blocks = report.scores.len(),
            "extracted mutation report"
        );
        Ok(report)
    }

    pub fn extract_clinical_note(&self, path: &Path) -> Result<ClinicalNote> {
        let blocks = read_blocks(path)?;
        let note = self.clinical_note_from_blocks(&blocks);
        info!(
            path = %path.display(),
            viral_loads = note.viral_loads.len(),
            cd4_counts = note.cd4_counts.len(),
            "extracted clinical note"
        );
        Ok(note)
    }

    pub fn mutation_report_from_blocks(&self, blocks: &[Block]) -> MutationDocument {
        let text = full_text(blocks);
        MutationDocument {
            subtype: self.mutations.subtype(&text),
            mutations: self.mutations.extract_mutations(&text),
            comments: self.mutations.comments(&text),
            scores: self.scores.extract(blocks),
        }
    }

    pub fn clinical_note_from_blocks(&self, blocks: &[Block]) -> ClinicalNote {
        self.note.extract(blocks)
    }
}
