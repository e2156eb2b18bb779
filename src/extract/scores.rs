use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use super::document::Block;
use super::normalize::normalize;
use super::types::{DrugClass, DrugScore, Efficacy, ScoreBlock, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScoreHeader {
    section: Section,
    drug_class: Option<DrugClass>,
}

enum ScanState {
    Scanning,
    AwaitingTable(Vec<ScoreHeader>),
}

pub struct ScoreExtractor {
    header: Regex,
}

impl ScoreExtractor {
    pub fn new() -> Result<Self> {
        let header = Regex::new(
            r"(?i)(Mutation scoring|Drug resistance mutation scores of)\s*:?\s*(PR|RT|IN|NRTI|NNRTI|INSTI)?",
        )
        .context("failed to compile score header regex")?;
        Ok(Self { header })
    }

    pub fn extract(&self, blocks: &[Block]) -> Vec<ScoreBlock> {
        let mut state = ScanState::Scanning;
        let mut score_blocks = Vec::new();

        for block in blocks {
            state = match (state, block) {
                (state, Block::Paragraph(text)) => match self.parse_header(&normalize(text)) {
                    Some(header) => {
                        let mut pending = match state {
                            ScanState::Scanning => Vec::new(),
                            ScanState::AwaitingTable(pending) => pending,
                        };
                        pending.push(header);
                        ScanState::AwaitingTable(pending)
                    }
                    None => state,
                },
                (ScanState::Scanning, Block::Table(_)) => ScanState::Scanning,
                (ScanState::AwaitingTable(pending), Block::Table(rows)) => {
                    if rows.len() < 2 {
                        debug!(
                            headers = pending.len(),
                            rows = rows.len(),
                            "score table too short, dropping headers"
                        );
                    } else {
                        score_blocks.extend(
                            pending
                                .into_iter()
                                .filter_map(|header| score_block(header, rows)),
                        );
                    }
                    ScanState::Scanning
                }
            };
        }

        if let ScanState::AwaitingTable(pending) = state {
            debug!(
                headers = pending.len(),
                "score headers without a following table"
            );
        }

        score_blocks
    }

    fn parse_header(&self, text: &str) -> Option<ScoreHeader> {
        let caps = self.header.captures(text)?;
        let token = caps
            .get(2)
            .map(|token| token.as_str().to_ascii_uppercase())
            .unwrap_or_else(|| "RT".to_string());

        let section = Section::from_token(&token).unwrap_or(Section::ReverseTranscriptase);
        let drug_class = match section {
            Section::ReverseTranscriptase if token == "NNRTI" => Some(DrugClass::Nnrti),
            Section::ReverseTranscriptase => Some(DrugClass::Nrti),
            Section::Protease | Section::Integrase => None,
        };

        Some(ScoreHeader {
            section,
            drug_class,
        })
    }
}

fn score_block(header: ScoreHeader, rows: &[Vec<String>]) -> Option<ScoreBlock> {
    let (header_row, data_rows) = rows.split_first()?;
    let columns = header_row
        .iter()
        .map(|cell| normalize(cell))
        .collect::<Vec<String>>();
    let data_rows = data_rows
        .iter()
        .map(|row| row.iter().map(|cell| normalize(cell)).collect::<Vec<String>>())
        .collect::<Vec<_>>();

    let total_row = data_rows
        .iter()
        .find(|row| {
            row.first()
                .is_some_and(|cell| cell.trim().to_lowercase() == "total")
        })
        .or_else(|| {
            data_rows
                .iter()
                .rev()
                .find(|row| row.iter().skip(1).any(|cell| !cell.is_empty()))
        });

    let Some(total_row) = total_row else {
        debug!(
            section = header.section.as_str(),
            "score table has no total row"
        );
        return None;
    };

    let mut scores: Vec<DrugScore> = Vec::new();
    for (drug, value) in columns.iter().skip(1).zip(total_row.iter().skip(1)) {
        let score = DrugScore {
            drug: drug.clone(),
            value: value.clone(),
            efficacy: Efficacy::from_cell(value),
        };
        match scores.iter_mut().find(|existing| existing.drug == score.drug) {
            Some(existing) => *existing = score,
            None => scores.push(score),
        }
    }

    Some(ScoreBlock {
        section: header.section,
        drug_class: header.drug_class,
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(text: &str) -> Block {
        Block::Paragraph(text.to_string())
    }

    fn table(rows: &[&[&str]]) -> Block {
        Block::Table(
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn header_without_token_defaults_to_nrti() {
        let extractor = ScoreExtractor::new().expect("score extractor");
        let blocks = vec![
            paragraph("Mutation scoring:"),
            table(&[&["Drug", "ABC", "AZT"], &["M184V", "15", "-10"]]),
        ];

        let found = extractor.extract(&blocks);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].section, Section::ReverseTranscriptase);
        assert_eq!(found[0].drug_class, Some(DrugClass::Nrti));
        assert_eq!(found[0].scores[0].efficacy, Efficacy::GoodResidualActivity);
        assert_eq!(found[0].scores[1].efficacy, Efficacy::Hyperactive);
    }

    #[test]
    fn insti_token_reads_as_integrase() {
        let extractor = ScoreExtractor::new().expect("score extractor");
        let blocks = vec![
            paragraph("Drug resistance mutation scores of INSTI"),
            table(&[&["Drug", "DTG"], &["Total", "5"]]),
        ];

        let found = extractor.extract(&blocks);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].section, Section::Integrase);
        assert_eq!(found[0].drug_class, None);
        assert_eq!(found[0].scores[0].efficacy, Efficacy::FullyActive);
    }

    #[test]
    fn total_row_wins_over_last_row() {
        let extractor = ScoreExtractor::new().expect("score extractor");
        let blocks = vec![
            paragraph("Mutation scoring: PR"),
            table(&[
                &["Drug", "ATV/r", "LPV/r"],
                &["I54V", "10", "10"],
                &["TOTAL", "45", "x"],
                &["L90M", "15", "10"],
            ]),
        ];

        let found = extractor.extract(&blocks);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].section, Section::Protease);
        assert_eq!(found[0].drug_class, None);
        assert_eq!(found[0].scores[0].value, "45");
        assert_eq!(found[0].scores[0].efficacy, Efficacy::PartiallyActive);
        assert_eq!(found[0].scores[1].efficacy, Efficacy::NotInterpretable);
    }

    #[test]
    fn falls_back_to_last_row_with_values() {
        let extractor = ScoreExtractor::new().expect("score extractor");
        let blocks = vec![
            paragraph("Mutation scoring: IN"),
            table(&[
                &["Drug", "DTG", "RAL"],
                &["N155H", "30", "60"],
                &["", "", ""],
            ]),
        ];

        let found = extractor.extract(&blocks);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].scores[0].value, "30");
        assert_eq!(found[0].scores[1].efficacy, Efficacy::Inactive);
    }

    #[test]
    fn short_table_drops_pending_header() {
        let extractor = ScoreExtractor::new().expect("score extractor");
        let blocks = vec![
            paragraph("Mutation scoring: PR"),
            table(&[&["Drug", "ATV/r"]]),
            table(&[&["Drug", "ATV/r"], &["Total", "5"]]),
        ];

        assert!(extractor.extract(&blocks).is_empty());
    }

    #[test]
    fn headers_before_one_table_share_it() {
        let extractor = ScoreExtractor::new().expect("score extractor");
        let blocks = vec![
            paragraph("Mutation scoring: NRTI"),
            paragraph("Mutation scoring: NNRTI"),
            table(&[&["Drug", "EFV"], &["Total", "60"]]),
        ];

        let found = extractor.extract(&blocks);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].drug_class, Some(DrugClass::Nrti));
        assert_eq!(found[1].drug_class, Some(DrugClass::Nnrti));
    }
}
