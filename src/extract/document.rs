use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use docx_rs::{
    DocumentChild, Docx, InsertChild, Paragraph, ParagraphChild, Run, RunChild,
    StructuredDataTagChild, Table, TableCell, TableCellContent, TableChild, TableRowChild,
};
use tracing::debug;

use super::normalize::normalize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(String),
    Table(Vec<Vec<String>>),
}

pub fn read_blocks(path: &Path) -> Result<Vec<Block>> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read document: {}", path.display()))?;
    let docx = docx_rs::read_docx(&bytes)
        .map_err(|err| anyhow!("{err}"))
        .with_context(|| format!("failed to parse docx document: {}", path.display()))?;

    let blocks = blocks_from_docx(&docx);
    debug!(
        path = %path.display(),
        blocks = blocks.len(),
        "read document blocks"
    );
    Ok(blocks)
}

pub fn blocks_from_docx(docx: &Docx) -> Vec<Block> {
    docx.document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(paragraph) => Some(Block::Paragraph(paragraph_text(paragraph))),
            DocumentChild::Table(table) => Some(Block::Table(table_rows(table))),
            _ => None,
        })
        .collect()
}

pub fn full_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            Block::Paragraph(text) => Some(normalize(text)),
            Block::Table(_) => None,
        })
        .collect::<Vec<String>>()
        .join("\n")
}

pub fn tables(blocks: &[Block]) -> impl Iterator<Item = &Vec<Vec<String>>> {
    blocks.iter().filter_map(|block| match block {
        Block::Table(rows) => Some(rows),
        Block::Paragraph(_) => None,
    })
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    push_paragraph_children(&paragraph.children, &mut text);
    text
}

fn push_paragraph_children(children: &[ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => push_run(run, text),
            ParagraphChild::Hyperlink(link) => push_paragraph_children(&link.children, text),
            ParagraphChild::Insert(insert) => {
                for child in &insert.children {
                    if let InsertChild::Run(run) = child {
                        push_run(run, text);
                    }
                }
            }
            ParagraphChild::StructuredDataTag(tag) => push_tag_children(&tag.children, text),
            _ => {}
        }
    }
}

fn push_tag_children(children: &[StructuredDataTagChild], text: &mut String) {
    for child in children {
        match child {
            StructuredDataTagChild::Run(run) => push_run(run, text),
            StructuredDataTagChild::StructuredDataTag(tag) => push_tag_children(&tag.children, text),
            _ => {}
        }
    }
}

fn push_run(run: &Run, text: &mut String) {
    for child in &run.children {
        match child {
            RunChild::Text(value) => text.push_str(&value.text),
            RunChild::Tab(_) => text.push('\t'),
            RunChild::Break(_) => text.push('\n'),
            _ => {}
        }
    }
}

fn table_rows(table: &Table) -> Vec<Vec<String>> {
    table
        .rows
        .iter()
        .map(|row| {
            let TableChild::TableRow(row) = row;
            let mut cells = Vec::new();
            for cell in &row.cells {
                let TableRowChild::TableCell(cell) = cell;
                let value = cell_text(cell);
                for _ in 1..grid_span(cell) {
                    cells.push(value.clone());
                }
                cells.push(value);
            }
            cells
        })
        .collect()
}

// A merged cell is repeated once per grid column it covers.
fn grid_span(cell: &TableCell) -> usize {
    serde_json::to_value(&cell.property)
        .ok()
        .and_then(|property| property.get("gridSpan").and_then(serde_json::Value::as_u64))
        .and_then(|span| usize::try_from(span).ok())
        .unwrap_or(1)
        .max(1)
}

fn cell_text(cell: &TableCell) -> String {
    cell.children
        .iter()
        .filter_map(|content| match content {
            TableCellContent::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            TableCellContent::Table(_) => {
                debug!("skipping nested table inside cell");
                None
            }
            _ => None,
        })
        .collect::<Vec<String>>()
        .join("\n")
}

#[cfg(test)]
pub fn write_docx(path: &Path, blocks: &[Block]) -> Result<()> {
    use docx_rs::TableRow;

    fn paragraph(text: &str) -> Paragraph {
        Paragraph::new().add_run(Run::new().add_text(text))
    }

    let mut docx = Docx::new();
    for block in blocks {
        docx = match block {
            Block::Paragraph(text) => docx.add_paragraph(paragraph(text)),
            Block::Table(rows) => {
                let rows = rows
                    .iter()
                    .map(|cells| {
                        TableRow::new(
                            cells
                                .iter()
                                .map(|value| {
                                    value
                                        .split('\n')
                                        .fold(TableCell::new(), |cell, line| {
                                            cell.add_paragraph(paragraph(line))
                                        })
                                })
                                .collect(),
                        )
                    })
                    .collect();
                docx.add_table(Table::new(rows))
            }
        };
    }

    let file = fs::File::create(path)
        .with_context(|| format!("failed to create docx fixture: {}", path.display()))?;
    docx.build()
        .pack(file)
        .with_context(|| format!("failed to write docx fixture: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use docx_rs::{BreakType, Hyperlink, HyperlinkType, Insert, TableRow};

    use super::*;

    #[test]
    fn runs_render_tabs_and_breaks() {
        let docx = Docx::new().add_paragraph(
            Paragraph::new().add_run(
                Run::new()
                    .add_text("Subtype")
                    .add_tab()
                    .add_text("B")
                    .add_break(BreakType::TextWrapping)
                    .add_text("PR"),
            ),
        );

        assert_eq!(
            blocks_from_docx(&docx),
            vec![Block::Paragraph("Subtype\tB\nPR".to_string())]
        );
        assert_eq!(full_text(&blocks_from_docx(&docx)), "Subtype B PR");
    }

    #[test]
    fn hyperlinked_and_inserted_runs_keep_their_text() {
        let docx = Docx::new().add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text("NRTI Mutations: "))
                .add_hyperlink(
                    Hyperlink::new("https://hivdb.stanford.edu", HyperlinkType::External)
                        .add_run(Run::new().add_text("M184V")),
                )
                .add_insert(Insert::new(Run::new().add_text(", K65R"))),
        );

        assert_eq!(
            blocks_from_docx(&docx),
            vec![Block::Paragraph("NRTI Mutations: M184V, K65R".to_string())]
        );
    }

    #[test]
    fn merged_cells_repeat_across_their_columns() {
        let cell = |text: &str| {
            TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
        };
        let docx = Docx::new().add_table(Table::new(vec![TableRow::new(vec![
            cell("V1"),
            cell("CHU").grid_span(2),
            cell("350"),
            cell(""),
            cell("1200"),
        ])]));

        assert_eq!(
            blocks_from_docx(&docx),
            vec![Block::Table(vec![vec![
                "V1".to_string(),
                "CHU".to_string(),
                "CHU".to_string(),
                "350".to_string(),
                "".to_string(),
                "1200".to_string(),
            ]])]
        );
    }
}
