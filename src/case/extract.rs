//! Extraction of case information from OpenCGA proband and interpretation documents.
//!
//! Note that only the parts of the OpenCGA model are implemented that are needed for
//! building case records.

use crate::err::CaseError;

use super::{Sex, VariantRecord, VariantType};

/// Reference to an ontology term or enumeration value by identifier.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IdRef {
    pub id: String,
}

/// The proband of a clinical analysis.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Proband {
    /// Individual identifier, used as clinical reference.
    pub id: String,
    /// Sex, e.g. `{"id": "MALE"}`.
    #[serde(default)]
    pub sex: Option<IdRef>,
    /// Phenotypes as HPO terms.
    #[serde(default)]
    pub phenotypes: Vec<IdRef>,
}

/// Variant call of a study file.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Call {
    #[serde(rename = "variantId")]
    pub variant_id: Option<String>,
}

/// File entry of a study.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StudyFile {
    pub call: Option<Call>,
}

/// Sample entry of a study, the first data value is the genotype.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StudySample {
    #[serde(default)]
    pub data: Vec<String>,
}

/// Study entry of a finding.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Study {
    #[serde(default)]
    pub samples: Vec<StudySample>,
    #[serde(default)]
    pub files: Vec<StudyFile>,
}

/// A reported variant (primary finding) of an interpretation.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub variant_type: VariantType,
    #[serde(default)]
    pub studies: Vec<Study>,
}

/// Interpretation document, either the full interpretation or just its findings.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Interpretation {
    Full {
        #[serde(rename = "primaryFindings")]
        primary_findings: Vec<Finding>,
    },
    Findings(Vec<Finding>),
}

impl Interpretation {
    pub fn findings(&self) -> &[Finding] {
        match self {
            Interpretation::Full { primary_findings } => primary_findings,
            Interpretation::Findings(findings) => findings,
        }
    }
}

/// Map the proband's sex onto DECIPHER's chromosomal sex.
pub fn extract_proband_sex(proband: &Proband) -> Sex {
    match proband.sex.as_ref().map(|sex| sex.id.as_str()) {
        Some("MALE") => Sex::Xy,
        Some("FEMALE") => Sex::Xx,
        _ => Sex::Unknown,
    }
}

/// HPO term identifiers of the proband, in the order given.
pub fn extract_proband_phenotypes(proband: &Proband) -> Vec<String> {
    proband
        .phenotypes
        .iter()
        .map(|phenotype| phenotype.id.clone())
        .collect()
}

/// Convert the findings of an interpretation into variant records.
///
/// The variant identifier is taken from the first file's call and falls back to the
/// finding's own identifier; the genotype is the first data value of the first sample.
pub fn extract_proband_variants(findings: &[Finding]) -> Result<Vec<VariantRecord>, CaseError> {
    findings
        .iter()
        .enumerate()
        .map(|(no, finding)| {
            let study = finding.studies.first();
            let variant_id = study
                .and_then(|study| study.files.first())
                .and_then(|file| file.call.as_ref())
                .and_then(|call| call.variant_id.clone())
                .or_else(|| finding.id.clone())
                .ok_or(CaseError::MissingVariantId(no))?;
            let zygosity = study
                .and_then(|study| study.samples.first())
                .and_then(|sample| sample.data.first())
                .cloned()
                .ok_or_else(|| CaseError::MissingGenotype(variant_id.clone()))?;

            Ok(VariantRecord {
                variant_id,
                variant_type: finding.variant_type.clone(),
                zygosity,
            })
        })
        .collect()
}
