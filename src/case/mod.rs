//! Case records and the `case assemble` sub command.
//!
//! A case record bundles everything that is pushed to DECIPHER for one proband: the
//! chromosomal sex, the local clinical reference, the HPO terms and the reported variants.

use std::fmt;

use serde_with::{serde_as, DefaultOnNull};

use crate::common::io::{read_json, write_json};

pub mod extract;
pub mod zygosity;

/// Chromosomal sex as understood by DECIPHER.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
)]
pub enum Sex {
    /// male karyotype
    #[serde(rename = "46_xy")]
    #[strum(serialize = "46_xy")]
    Xy,
    /// female karyotype
    #[serde(rename = "46_xx")]
    #[strum(serialize = "46_xx")]
    Xx,
    /// not known
    #[default]
    #[serde(rename = "unknown")]
    #[strum(serialize = "unknown")]
    Unknown,
}

/// Variant type as reported by the laboratory information system.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum VariantType {
    Snv,
    Indel,
    Insertion,
    Deletion,
    Cnv,
    /// Any other type label, e.g. structural variant types.
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantType::Snv => write!(f, "SNV"),
            VariantType::Indel => write!(f, "INDEL"),
            VariantType::Insertion => write!(f, "INSERTION"),
            VariantType::Deletion => write!(f, "DELETION"),
            VariantType::Cnv => write!(f, "CNV"),
            VariantType::Other(label) => write!(f, "{}", label),
        }
    }
}

/// One reported variant of a case.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VariantRecord {
    /// Variant identifier `<chrom>:<pos>:<ref>:<alt1,alt2,...>`.
    pub variant_id: String,
    /// Variant type.
    #[serde(rename = "type")]
    pub variant_type: VariantType,
    /// Genotype as two allele indices, e.g. `0/1` or `1|2`.
    #[serde(alias = "heterozygosity")]
    pub zygosity: String,
}

impl VariantRecord {
    /// Chromosome, i.e., the first field of the variant identifier.
    pub fn chrom(&self) -> &str {
        self.variant_id.split(':').next().unwrap_or_default()
    }
}

/// Everything needed to submit one proband.
#[serde_as]
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CaseRecord {
    /// Chromosomal sex of the proband.
    pub sex: Sex,
    /// Local proband identifier, unique within the registry project.
    pub clinical_reference: String,
    /// HPO term identifiers, e.g. `HP:0000119`.
    #[serde_as(as = "DefaultOnNull")]
    pub phenotype_list: Vec<String>,
    /// Reported variants.
    #[serde_as(as = "DefaultOnNull")]
    pub variant_list: Vec<VariantRecord>,
}

/// Compose a case record from the proband and the already extracted parts.
pub fn assemble_case(
    proband: &extract::Proband,
    sex: Sex,
    phenotypes: Vec<String>,
    variants: Vec<VariantRecord>,
) -> CaseRecord {
    CaseRecord {
        sex,
        clinical_reference: proband.id.clone(),
        phenotype_list: phenotypes,
        variant_list: variants,
    }
}

/// Command line arguments for `case assemble` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Assemble case JSON from proband and interpretation", long_about = None)]
pub struct Args {
    /// Path to the proband JSON (`id`, `sex`, `phenotypes`).
    #[arg(long, required = true)]
    pub path_proband: String,
    /// Path to the interpretation JSON (primary findings).
    #[arg(long, required = true)]
    pub path_interpretation: String,
    /// Path to the output case JSON.
    #[arg(long, required = true)]
    pub path_out: String,
}

/// Main entry point for `case assemble` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    tracing::info!("loading proband and interpretation...");
    let proband: extract::Proband = read_json(&args.path_proband)?;
    let interpretation: extract::Interpretation = read_json(&args.path_interpretation)?;

    let sex = extract::extract_proband_sex(&proband);
    let phenotypes = extract::extract_proband_phenotypes(&proband);
    let variants = extract::extract_proband_variants(interpretation.findings())
        .map_err(|e| anyhow::anyhow!("malformed interpretation: {}", e))?;
    tracing::info!(
        "proband {} ({}) has {} phenotype(s) and {} variant(s)",
        &proband.id,
        sex,
        phenotypes.len(),
        variants.len()
    );

    let case = assemble_case(&proband, sex, phenotypes, variants);
    write_json(&args.path_out, &case)?;

    tracing::info!(
        "All of `case assemble` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}
