use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::ser::{SerializeMap, SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};

pub const UNKNOWN_SUBTYPE: &str = "Inconnu";
pub const UNKNOWN_OBSERVANCE: &str = "inconnu";
pub const UNKNOWN_THERAPY_DATE: &str = "inconnue";
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

#[cfg(test)]
pub const ARV_REGIMENS: [&str; 9] = [
    "TDF+3TC+NVP",
    "TDF+3TC+EFV",
    "AZT+3TC+NVP",
    "ABC+3TC+LPV/r",
    "ABC+3TC+ATV/r",
    "TDF+3TC+DTG",
    "TDF+3TC+ATV/r",
    "AZT+3TC+ATV/r",
    "ABC+3TC+NVP",
];

#[cfg(test)]
pub const CHANGE_REASONS: [&str; 6] = [
    "Échec virologique",
    "Stock out",
    "Toxicité",
    "Grossesse",
    "Switch recommandé",
    "Intéruption du traitement",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sex {
    Male,
    Female,
    #[default]
    Other,
}

impl Sex {
    // Substring test kept for parity with existing reports: any cell text
    // containing an "f" reads as female before "m" is even considered.
    pub fn from_marker(cell: &str) -> Self {
        let lowered = cell.to_lowercase();
        if lowered.contains('f') {
            Self::Female
        } else if lowered.contains('m') {
            Self::Male
        } else {
            Self::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Masculin",
            Self::Female => "Féminin",
            Self::Other => "Autre",
        }
    }
}

impl Serialize for Sex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Protease,
    ReverseTranscriptase,
    Integrase,
}

impl Section {
    pub const ALL: [Section; 3] = [
        Section::Protease,
        Section::ReverseTranscriptase,
        Section::Integrase,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "PR" => Some(Self::Protease),
            "RT" => Some(Self::ReverseTranscriptase),
            "IN" => Some(Self::Integrase),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Protease => "PR",
            Self::ReverseTranscriptase => "RT",
            Self::Integrase => "IN",
        }
    }
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrugClass {
    Nrti,
    Nnrti,
}

impl DrugClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nrti => "NRTI",
            Self::Nnrti => "NNRTI",
        }
    }
}

impl Serialize for DrugClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Measurement {
    #[serde(rename = "valeur")]
    pub value: String,
    pub date: NaiveDate,
}

// Therapy periods are only filled in by the record editor.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Regimen {
    Listed(&'static str),
    Other(String),
}

#[cfg(test)]
impl Regimen {
    pub fn parse(label: &str) -> Self {
        let label = label.trim();
        ARV_REGIMENS
            .iter()
            .copied()
            .find(|candidate| *candidate == label)
            .map(Self::Listed)
            .unwrap_or_else(|| Self::Other(label.to_string()))
    }
}

impl fmt::Display for Regimen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listed(label) => f.write_str(label),
            Self::Other(label) => f.write_str(label),
        }
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReason {
    Listed(&'static str),
    Other(String),
}

#[cfg(test)]
impl ChangeReason {
    pub fn parse(label: &str) -> Self {
        let label = label.trim();
        CHANGE_REASONS
            .iter()
            .copied()
            .find(|candidate| *candidate == label)
            .map(Self::Listed)
            .unwrap_or_else(|| Self::Other(label.to_string()))
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listed(label) => f.write_str(label),
            Self::Other(label) => f.write_str(label),
        }
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TherapyDate {
    Known(NaiveDate),
    Unknown,
}

impl fmt::Display for TherapyDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(date) => write!(f, "{}", date.format(DISPLAY_DATE_FORMAT)),
            Self::Unknown => f.write_str(UNKNOWN_THERAPY_DATE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TherapyPeriod {
    pub regimen: Regimen,
    pub start: TherapyDate,
    pub end: TherapyDate,
    pub change_reason: ChangeReason,
}

impl Serialize for TherapyPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TherapyPeriod", 4)?;
        state.serialize_field("arv", &self.regimen.to_string())?;
        state.serialize_field("debut", &self.start.to_string())?;
        state.serialize_field("fin", &self.end.to_string())?;
        state.serialize_field("raison_changement", &self.change_reason.to_string())?;
        state.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoInfection {
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(rename = "duree")]
    pub duration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationSet {
    pub major: Vec<String>,
    pub accessory: Vec<String>,
    pub other: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionMutations {
    Protease(MutationSet),
    ReverseTranscriptase {
        nrti: Vec<String>,
        nnrti: Vec<String>,
        other: Vec<String>,
    },
    Integrase(MutationSet),
}

impl SectionMutations {
    pub fn section(&self) -> Section {
        match self {
            Self::Protease(_) => Section::Protease,
            Self::ReverseTranscriptase { .. } => Section::ReverseTranscriptase,
            Self::Integrase(_) => Section::Integrase,
        }
    }
}

struct DrugClassLists<'a> {
    nrti: &'a [String],
    nnrti: &'a [String],
}

impl Serialize for DrugClassLists<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&BTreeMap::from([("NRTIs", self.nrti)]))?;
        seq.serialize_element(&BTreeMap::from([("NNRTIS", self.nnrti)]))?;
        seq.end()
    }
}

impl Serialize for SectionMutations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SectionMutations", 4)?;
        state.serialize_field("Section", &self.section())?;
        match self {
            Self::Protease(set) | Self::Integrase(set) => {
                state.serialize_field("Mutations_majeures", &set.major)?;
                state.serialize_field("Mutations_accessoires", &set.accessory)?;
                state.serialize_field("Autres_mutations", &set.other)?;
            }
            Self::ReverseTranscriptase { nrti, nnrti, other } => {
                state.serialize_field("Mutations_majeures", &DrugClassLists { nrti, nnrti })?;
                state.serialize_field("Mutations_accessoires", &[] as &[String])?;
                state.serialize_field("Autres_mutations", other)?;
            }
        }
        state.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Efficacy {
    Hyperactive,
    FullyActive,
    GoodResidualActivity,
    PartiallyActive,
    Inactive,
    NotInterpretable,
}

impl Efficacy {
    pub fn from_score(score: i64) -> Self {
        if score < 0 {
            Self::Hyperactive
        } else if score < 10 {
            Self::FullyActive
        } else if score < 30 {
            Self::GoodResidualActivity
        } else if score < 60 {
            Self::PartiallyActive
        } else {
            Self::Inactive
        }
    }

    pub fn from_cell(value: &str) -> Self {
        value
            .trim()
            .parse::<i64>()
            .map(Self::from_score)
            .unwrap_or(Self::NotInterpretable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hyperactive => "Hyper actif",
            Self::FullyActive => "Totalement actif",
            Self::GoodResidualActivity => "Bonne activité résiduelle",
            Self::PartiallyActive => "Partiellement actif",
            Self::Inactive => "Inactif",
            Self::NotInterpretable => "Non interprétable",
        }
    }
}

impl Serialize for Efficacy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrugScore {
    pub drug: String,
    pub value: String,
    pub efficacy: Efficacy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreBlock {
    pub section: Section,
    pub drug_class: Option<DrugClass>,
    pub scores: Vec<DrugScore>,
}

impl ScoreBlock {
    pub fn label(&self) -> String {
        match self.drug_class {
            Some(class) => format!("{} - {}", self.section.as_str(), class.as_str()),
            None => self.section.as_str().to_string(),
        }
    }
}

struct ScoreValues<'a>(&'a [DrugScore]);

impl Serialize for ScoreValues<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for score in self.0 {
            map.serialize_entry(&score.drug, &score.value)?;
        }
        map.end()
    }
}

struct ScoreLabels<'a>(&'a [DrugScore]);

impl Serialize for ScoreLabels<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for score in self.0 {
            map.serialize_entry(&score.drug, &score.efficacy)?;
        }
        map.end()
    }
}

impl Serialize for ScoreBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.drug_class.is_some() { 4 } else { 3 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("section", &self.section)?;
        map.serialize_entry("scores", &ScoreValues(&self.scores))?;
        map.serialize_entry("efficacite", &ScoreLabels(&self.scores))?;
        if let Some(class) = self.drug_class {
            map.serialize_entry("sous_section", &class)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationDocument {
    pub subtype: Option<String>,
    pub mutations: Vec<SectionMutations>,
    pub comments: Vec<(Section, String)>,
    pub scores: Vec<ScoreBlock>,
}

struct SectionComments<'a>(&'a [(Section, String)]);

impl Serialize for SectionComments<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (section, comment) in self.0 {
            map.serialize_entry(section.as_str(), comment)?;
        }
        map.end()
    }
}

impl Serialize for MutationDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let subtype = self.subtype.as_deref().unwrap_or(UNKNOWN_SUBTYPE);
        let mut state = serializer.serialize_struct("MutationDocument", 4)?;
        state.serialize_field("sous_type_viral", &BTreeMap::from([("Subtype", subtype)]))?;
        state.serialize_field("mutations", &self.mutations)?;
        state.serialize_field("commentaires", &SectionComments(&self.comments))?;
        state.serialize_field("scores", &self.scores)?;
        state.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClinicalNote {
    pub sex: Option<Sex>,
    pub birth_date: Option<NaiveDate>,
    pub viral_loads: Vec<Measurement>,
    pub cd4_counts: Vec<Measurement>,
    pub results: String,
    pub note: String,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteSections {
    pub note: String,
    pub interpretation: String,
    #[serde(rename = "resultats")]
    pub results: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportOutput {
    #[serde(rename = "Résultats")]
    pub results: String,
    #[serde(rename = "Note")]
    pub note: String,
    #[serde(rename = "Interprétation_clinique")]
    pub clinical_interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientRecord {
    #[serde(rename = "code_patient")]
    pub code: String,
    #[serde(rename = "sexe")]
    pub sex: Sex,
    #[serde(rename = "date_naissance", serialize_with = "serialize_display_date")]
    pub birth_date: NaiveDate,
    #[serde(rename = "charges_virales")]
    pub viral_loads: Vec<Measurement>,
    #[serde(rename = "taux_cd4")]
    pub cd4_counts: Vec<Measurement>,
    #[serde(rename = "historique_therapeutique")]
    pub therapy_history: Vec<TherapyPeriod>,
    pub co_infections: Vec<CoInfection>,
    pub observance: String,
    #[serde(rename = "extraction_texte")]
    pub mutation_report: MutationDocument,
    pub results: NoteSections,
    pub input: String,
    pub output: ReportOutput,
}

fn serialize_display_date<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format(DISPLAY_DATE_FORMAT))
}
