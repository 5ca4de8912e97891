//! Conversion of case variants and phenotypes into DECIPHER records.

use indexmap::IndexSet;

use crate::case::{zygosity::split_genotype, zygosity::Zygosity, VariantRecord, VariantType};
use crate::common::GenomeRelease;
use crate::err::DecomposeError;

use super::RemoteId;

/// Inheritance reported for all submitted variants.
pub const INHERITANCE_UNKNOWN: &str = "unknown";

/// Variant classes accepted by DECIPHER's variant endpoint.
#[derive(
    serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VariantClass {
    SequenceVariant,
}

/// Map a variant type onto its DECIPHER class.
///
/// Returns `None` for types that cannot be submitted, e.g. CNVs.
pub fn classify_variant_type(variant: &VariantRecord) -> Option<VariantClass> {
    match variant.variant_type {
        VariantType::Snv | VariantType::Indel | VariantType::Insertion | VariantType::Deletion => {
            Some(VariantClass::SequenceVariant)
        }
        VariantType::Cnv | VariantType::Other(_) => None,
    }
}

/// One alternate allele of a variant, ready for submission.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NormalizedVariant {
    pub person_id: RemoteId,
    pub variant_class: VariantClass,
    pub assembly: GenomeRelease,
    pub chr: String,
    pub start: String,
    pub ref_sequence: String,
    pub alt_sequence: String,
    pub inheritance: String,
    pub genotype: Zygosity,
    pub can_be_public: bool,
}

/// Parts of a variant identifier `<chrom>:<pos>:<ref>:<alt1,alt2,...>`.
struct VariantId<'a> {
    chrom: &'a str,
    pos: &'a str,
    reference: &'a str,
    alternatives: Vec<&'a str>,
}

impl<'a> VariantId<'a> {
    fn parse(variant_id: &'a str) -> Result<Self, DecomposeError> {
        let fields = variant_id.split(':').collect::<Vec<_>>();
        match fields.as_slice() {
            [chrom, pos, reference, alternatives]
                if !chrom.is_empty() && !pos.is_empty() && !alternatives.is_empty() =>
            {
                Ok(Self {
                    chrom,
                    pos,
                    reference,
                    alternatives: alternatives.split(',').collect(),
                })
            }
            _ => Err(DecomposeError::MalformedVariantId(variant_id.to_string())),
        }
    }
}

/// Split `variant` into one record per distinct alternate allele of its genotype.
///
/// Repeated genotype indices (homozygous calls) yield a single record.  Returns `Ok(None)`
/// if the genotype only contains the reference allele.
pub fn decompose_alleles(
    variant: &VariantRecord,
    person_id: &RemoteId,
    zygosity: Zygosity,
    variant_class: VariantClass,
    assembly: GenomeRelease,
) -> Result<Option<Vec<NormalizedVariant>>, DecomposeError> {
    let variant_id = VariantId::parse(&variant.variant_id)?;
    let indices = split_genotype(&variant.zygosity)
        .ok_or_else(|| DecomposeError::MalformedGenotype(variant.zygosity.clone()))?;
    let distinct = indices.into_iter().collect::<IndexSet<_>>();

    let alt_indices = distinct
        .into_iter()
        .filter(|index| *index != "0")
        .collect::<Vec<_>>();
    if alt_indices.is_empty() {
        return Ok(None);
    }

    alt_indices
        .into_iter()
        .map(|index| {
            let alt_sequence = index
                .parse::<usize>()
                .ok()
                .and_then(|no| no.checked_sub(1))
                .and_then(|offset| variant_id.alternatives.get(offset))
                .ok_or_else(|| DecomposeError::InvalidAlleleIndex {
                    variant_id: variant.variant_id.clone(),
                    index: index.to_string(),
                })?;
            Ok(NormalizedVariant {
                person_id: person_id.clone(),
                variant_class,
                assembly,
                chr: variant_id.chrom.to_string(),
                start: variant_id.pos.to_string(),
                ref_sequence: variant_id.reference.to_string(),
                alt_sequence: alt_sequence.to_string(),
                inheritance: INHERITANCE_UNKNOWN.to_string(),
                genotype: zygosity,
                can_be_public: false,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// A phenotype observation of a person.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Phenotype {
    pub person_id: RemoteId,
    /// Numeric part of the HPO term identifier.
    pub hpo_term_id: String,
    pub is_present: bool,
}

impl Phenotype {
    /// Present phenotype from an HPO term such as `HP:0000119`.
    pub fn present(person_id: &RemoteId, hpo_term: &str) -> Self {
        Self {
            person_id: person_id.clone(),
            hpo_term_id: hpo_term_id(hpo_term),
            is_present: true,
        }
    }
}

/// Strip the `HP:` prefix from an HPO term identifier.
pub fn hpo_term_id(hpo_term: &str) -> String {
    let hpo_term = hpo_term.trim();
    hpo_term
        .strip_prefix("HP:")
        .unwrap_or(hpo_term)
        .to_string()
}
