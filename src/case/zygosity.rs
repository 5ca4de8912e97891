//! Zygosity of a reported variant, derived from the genotype string and the proband sex.

use crate::common::Chrom;

use super::{Sex, VariantRecord};

/// Zygosity in the vocabulary of DECIPHER's `genotype` attribute.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Zygosity {
    Heterozygous,
    Homozygous,
    Hemizygous,
}

/// Split a diploid genotype string such as `0/1` or `1|2` into its two allele indices.
///
/// Phasing is ignored.  Returns `None` unless there are exactly two non-empty indices.
pub fn split_genotype(genotype: &str) -> Option<[&str; 2]> {
    let mut tokens = genotype.split(['/', '|']).map(str::trim);
    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(first), Some(second), None) if !first.is_empty() && !second.is_empty() => {
            Some([first, second])
        }
        _ => None,
    }
}

/// Resolve the zygosity of `variant` for a proband of the given `sex`.
///
/// Calls on chrX or chrY of a 46,XY proband are always hemizygous.  Otherwise, differing
/// indices are heterozygous and identical indices homozygous.  Returns `None` if the
/// genotype string cannot be interpreted; such variants must not be submitted.
pub fn resolve_zygosity(variant: &VariantRecord, sex: Sex) -> Option<Zygosity> {
    let [first, second] = split_genotype(&variant.zygosity)?;

    let on_gonosome = matches!(variant.chrom().parse::<Chrom>(), Ok(Chrom::X) | Ok(Chrom::Y));
    if sex == Sex::Xy && on_gonosome {
        Some(Zygosity::Hemizygous)
    } else if first != second {
        Some(Zygosity::Heterozygous)
    } else {
        Some(Zygosity::Homozygous)
    }
}
