use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use super::dates::{parse_birth_date, parse_date, starts_with_date, starts_with_full_date};
use super::document::{Block, full_text, tables};
use super::normalize::{digits_only, normalize};
use super::types::{ClinicalNote, Measurement, Sex};

pub const RESULTS_NOT_FOUND: &str = "RESULTATS : Non trouvés";
pub const NOTE_NOT_FOUND: &str = "NOTE : Non trouvée";
pub const INTERPRETATION_NOT_FOUND: &str = "INTERPRETATION VIROLOGIQUE : Non trouvée";

pub struct NoteExtractor {
    results: Regex,
    note: Regex,
    interpretation: Regex,
}

impl NoteExtractor {
    pub fn new() -> Result<Self> {
        let results = Regex::new(r"(?is)R[ÉE]SULTATS\s*:?\s*(.*?)\s*(?:NOTE|INTERPR[ÉE]TATION|\z)")
            .context("failed to compile results section regex")?;
        let note = Regex::new(r"(?is)NOTE\s*:?\s*(.*?)(?:INTERPR[ÉE]TATION\s+VIROLOGIQUE|\z)")
            .context("failed to compile note section regex")?;
        let interpretation =
            Regex::new(r"(?is)INTERPR[ÉE]TATION\s+VIROLOGIQUE\s*(?:\([^)]*\))?\s*:?\s*(.*)")
                .context("failed to compile interpretation section regex")?;

        Ok(Self {
            results,
            note,
            interpretation,
        })
    }

    pub fn extract(&self, blocks: &[Block]) -> ClinicalNote {
        let mut note = ClinicalNote::default();
        for rows in tables(blocks) {
            for row in rows {
                let cells = row.iter().map(|cell| normalize(cell)).collect::<Vec<String>>();
                scan_row(&cells, &mut note);
            }
        }

        let text = full_text(blocks);
        note.results =
            section_text(&self.results, &text).unwrap_or_else(|| RESULTS_NOT_FOUND.to_string());
        note.note = section_text(&self.note, &text).unwrap_or_else(|| NOTE_NOT_FOUND.to_string());
        note.interpretation = section_text(&self.interpretation, &text)
            .unwrap_or_else(|| INTERPRETATION_NOT_FOUND.to_string());

        debug!(
            viral_loads = note.viral_loads.len(),
            cd4_counts = note.cd4_counts.len(),
            birth_date = note.birth_date.is_some(),
            "extracted clinical note"
        );
        note
    }
}

fn section_text(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|body| body.as_str().trim().to_string())
}

fn scan_row(cells: &[String], note: &mut ClinicalNote) {
    if cells.len() < 3 {
        return;
    }

    if note.birth_date.is_none() && starts_with_full_date(&cells[0]) {
        match parse_birth_date(&cells[0]) {
            Ok(date) => {
                note.birth_date = Some(date);
                note.sex = Some(Sex::from_marker(&cells[1]));
            }
            Err(err) => debug!(error = %err, "skipping demographics row"),
        }
        return;
    }

    if !starts_with_date(&cells[2]) {
        return;
    }

    let Ok(date) = parse_date(&cells[2]) else {
        debug!(cell = %cells[2], "skipping row with invalid measurement date");
        return;
    };

    if let Some(value) = cells
        .get(5)
        .map(|cell| digits_only(cell))
        .filter(|value| !value.is_empty())
    {
        note.viral_loads.push(Measurement { value, date });
    }

    if let Some(value) = cells
        .get(3)
        .map(|cell| digits_only(cell))
        .filter(|value| !value.is_empty())
    {
        note.cd4_counts.push(Measurement { value, date });
    }
}
