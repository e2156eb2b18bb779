use chrono::NaiveDate;

use super::types::{
    ClinicalNote, DISPLAY_DATE_FORMAT, MutationDocument, NoteSections, PatientRecord,
    ReportOutput, SectionMutations, UNKNOWN_OBSERVANCE,
};

pub fn default_birth_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

pub fn assemble(code: &str, note: ClinicalNote, report: MutationDocument) -> PatientRecord {
    let mut record = PatientRecord {
        code: code.to_string(),
        sex: note.sex.unwrap_or_default(),
        birth_date: note.birth_date.unwrap_or_else(default_birth_date),
        viral_loads: note.viral_loads,
        cd4_counts: note.cd4_counts,
        therapy_history: Vec::new(),
        co_infections: Vec::new(),
        observance: UNKNOWN_OBSERVANCE.to_string(),
        mutation_report: report,
        results: NoteSections {
            note: note.note.clone(),
            interpretation: note.interpretation.clone(),
            results: note.results.clone(),
        },
        input: String::new(),
        output: ReportOutput {
            results: note.results,
            note: note.note,
            clinical_interpretation: note.interpretation,
        },
    };
    record.input = render_input(&record);
    record
}

pub fn render_input(record: &PatientRecord) -> String {
    let mut lines = vec![
        format!("Code du patient: {}", record.code),
        format!("Sexe: {}", record.sex.as_str()),
        format!(
            "Date naissance: {}",
            record.birth_date.format(DISPLAY_DATE_FORMAT)
        ),
        format!("Observance: {}", record.observance),
    ];

    for period in &record.therapy_history {
        lines.push(format!(
            "Traitement: {} | Début: {} | Fin: {} | Raison: {}",
            period.regimen, period.start, period.end, period.change_reason
        ));
    }
    for load in &record.viral_loads {
        lines.push(format!("CV: {} copies/ml le {}", load.value, load.date));
    }
    for count in &record.cd4_counts {
        lines.push(format!(
            "Taux_CD4: {} cellules/ml le {}",
            count.value, count.date
        ));
    }

    for block in &record.mutation_report.mutations {
        let parts = mutation_parts(block);
        if !parts.is_empty() {
            lines.push(format!(
                "Mutation {}: {}",
                block.section().as_str(),
                parts.join(" | ")
            ));
        }
    }

    for block in &record.mutation_report.scores {
        if block.scores.is_empty() {
            continue;
        }
        lines.push(format!("Scores {}:", block.label()));
        for score in &block.scores {
            // Downstream prompts expect the label slot to stay empty.
            lines.push(format!("  - {}: score={}, efficience=", score.drug, score.value));
        }
    }

    lines.join("\n")
}

fn mutation_parts(block: &SectionMutations) -> Vec<String> {
    let labeled: Vec<(&str, &[String])> = match block {
        SectionMutations::ReverseTranscriptase { nrti, nnrti, .. } => {
            vec![("NRTIs", nrti.as_slice()), ("NNRTIs", nnrti.as_slice())]
        }
        SectionMutations::Protease(set) | SectionMutations::Integrase(set) => vec![
            ("Mutations majeures", set.major.as_slice()),
            ("Mutations accessoires", set.accessory.as_slice()),
            ("Autres mutations", set.other.as_slice()),
        ],
    };

    labeled
        .into_iter()
        .filter(|(_, codes)| !codes.is_empty())
        .map(|(label, codes)| format!("{label}: {}", codes.join(", ")))
        .collect()
}
