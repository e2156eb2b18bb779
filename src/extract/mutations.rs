use std::collections::BTreeSet;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use super::normalize::normalize;
use super::types::{MutationSet, Section, SectionMutations};

pub const PR_ACCESSORY_POSITIONS: [u32; 7] = [10, 20, 36, 46, 63, 84, 89];

pub struct MutationExtractor {
    section_heading: Regex,
    mutation_code: Regex,
    pr_major: Regex,
    pr_accessory: Regex,
    pr_other: Regex,
    rt_nrti: Regex,
    rt_nnrti: Regex,
    in_major: Regex,
    in_accessory: Regex,
    other_mutations: Regex,
    subtype: Regex,
    comments: Vec<(Section, Regex)>,
}

impl MutationExtractor {
    pub fn new() -> Result<Self> {
        let section_heading = Regex::new(r"(?i)Drug resistance interpretation:\s*(PR|RT|IN)")
            .context("failed to compile section heading regex")?;
        let mutation_code = Regex::new(r"\b[A-Z]\d{1,3}[A-Z]{1,6}\b")
            .context("failed to compile mutation code regex")?;
        let pr_other = Regex::new(
            r"(?is)(?:PR\s+)?Other(?: Resistance)? Mutations:\s*(.*?)(?:\n[A-Z]|Comments|Mutation scoring|\z)",
        )
        .context("failed to compile PR other mutations regex")?;
        let subtype =
            Regex::new(r"(?i)Subtype\s*[:\-]\s*(\S+)").context("failed to compile subtype regex")?;

        let mut comments = Vec::with_capacity(Section::ALL.len());
        for section in Section::ALL {
            let pattern = format!(
                r"(?i){} comments[:\s]*([\s\S]*?)(?:Mutation scoring|Drug resistance mutation scores|\z)",
                section.as_str()
            );
            let regex = Regex::new(&pattern).with_context(|| {
                format!("failed to compile {} comments regex", section.as_str())
            })?;
            comments.push((section, regex));
        }

        Ok(Self {
            section_heading,
            mutation_code,
            pr_major: labeled_block_regex(r"PI Major(?: Resistance)? Mutations:")?,
            pr_accessory: labeled_block_regex(r"PI Accessory(?: Resistance)? Mutations:")?,
            pr_other,
            rt_nrti: labeled_block_regex(r"NRTI(?: Resistance)? Mutations:")?,
            rt_nnrti: labeled_block_regex(r"NNRTI(?: Resistance)? Mutations:")?,
            in_major: labeled_block_regex(r"IN(?:STI)? Major(?: Resistance)? Mutations:")?,
            in_accessory: labeled_block_regex(r"IN(?:STI)? Accessory(?: Resistance)? Mutations:")?,
            other_mutations: labeled_block_regex(r"Other Mutations:")?,
            subtype,
            comments,
        })
    }

    pub fn extract_mutations(&self, text: &str) -> Vec<SectionMutations> {
        let headings = self
            .section_heading
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let section = Section::from_token(caps.get(1)?.as_str())?;
                Some((whole.start(), whole.end(), section))
            })
            .collect::<Vec<_>>();

        let mut seen = BTreeSet::new();
        let mut blocks = Vec::new();

        for (index, (_, body_start, section)) in headings.iter().enumerate() {
            if !seen.insert(*section) {
                debug!(section = section.as_str(), "ignoring repeated section heading");
                continue;
            }

            let body_end = headings
                .get(index + 1)
                .map(|(next_start, _, _)| *next_start)
                .unwrap_or(text.len());
            let body = &text[*body_start..body_end];

            let block = match section {
                Section::Protease => SectionMutations::Protease(self.protease(body, text)),
                Section::ReverseTranscriptase => SectionMutations::ReverseTranscriptase {
                    nrti: self.labeled_codes(&self.rt_nrti, body),
                    nnrti: self.labeled_codes(&self.rt_nnrti, body),
                    other: self.labeled_codes(&self.other_mutations, body),
                },
                Section::Integrase => SectionMutations::Integrase(MutationSet {
                    major: self.labeled_codes(&self.in_major, body),
                    accessory: self.labeled_codes(&self.in_accessory, body),
                    other: self.labeled_codes(&self.other_mutations, body),
                }),
            };
            blocks.push(block);
        }

        debug!(sections = blocks.len(), "extracted mutation sections");
        blocks
    }

    pub fn subtype(&self, text: &str) -> Option<String> {
        self.subtype
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|value| value.as_str().to_string())
    }

    pub fn comments(&self, text: &str) -> Vec<(Section, String)> {
        self.comments
            .iter()
            .filter_map(|(section, regex)| {
                let body = regex.captures(text)?.get(1)?;
                Some((*section, normalize(body.as_str())))
            })
            .collect()
    }

    // "Other Mutations" for PR is searched across the whole report, not the
    // section body, and split between accessory and minor by codon.
    fn protease(&self, body: &str, text: &str) -> MutationSet {
        let major = self.codes(&labeled_text(&self.pr_major, body));
        let mut accessory = self.codes(&labeled_text(&self.pr_accessory, body));
        let mut other = Vec::new();

        if let Some(span) = self.pr_other.captures(text).and_then(|caps| caps.get(1)) {
            let span = normalize(span.as_str());
            if span.to_lowercase() != "none" {
                for code in self.codes(&span) {
                    match codon_position(&code) {
                        Some(position) if PR_ACCESSORY_POSITIONS.contains(&position) => {
                            accessory.push(code)
                        }
                        _ => other.push(code),
                    }
                }
            }
        }

        MutationSet {
            major: canonical(major),
            accessory: canonical(accessory),
            other: canonical(other),
        }
    }

    fn labeled_codes(&self, label: &Regex, body: &str) -> Vec<String> {
        canonical(self.codes(&labeled_text(label, body)))
    }

    fn codes(&self, text: &str) -> Vec<String> {
        self.mutation_code
            .find_iter(text)
            .map(|code| code.as_str().to_string())
            .collect()
    }
}

fn labeled_block_regex(label: &str) -> Result<Regex> {
    Regex::new(&format!(r"(?is){label}\s*(.*?)(?:\n[A-Z]|\z)"))
        .with_context(|| format!("failed to compile mutation label regex: {label}"))
}

fn labeled_text(label: &Regex, body: &str) -> String {
    label
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|value| normalize(value.as_str()))
        .unwrap_or_default()
}

pub fn codon_position(code: &str) -> Option<u32> {
    let digits = code
        .chars()
        .skip_while(|character| !character.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    digits.parse().ok()
}

fn canonical(mut codes: Vec<String>) -> Vec<String> {
    codes.sort();
    codes.dedup();
    codes
}
