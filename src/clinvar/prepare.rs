//! Conversion of classified variants from CSV into ClinVar submission records.

use std::path::{Path, PathBuf};

use serde_with::skip_serializing_none;
use strum::VariantNames;

use crate::common::{
    io::{open_read_maybe_gz, write_json},
    GenomeRelease,
};
use crate::err::ClinvarError;

/// Clinical significance descriptions accepted by ClinVar.
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
    strum::VariantNames,
)]
pub enum ClinicalSignificance {
    #[serde(rename = "Pathogenic")]
    #[strum(serialize = "Pathogenic")]
    Pathogenic,
    #[serde(rename = "Likely pathogenic")]
    #[strum(serialize = "Likely pathogenic")]
    LikelyPathogenic,
    #[serde(rename = "Uncertain significance")]
    #[strum(serialize = "Uncertain significance")]
    UncertainSignificance,
    #[serde(rename = "Likely benign")]
    #[strum(serialize = "Likely benign")]
    LikelyBenign,
    #[serde(rename = "Benign")]
    #[strum(serialize = "Benign")]
    Benign,
    #[serde(rename = "Pathogenic, low penetrance")]
    #[strum(serialize = "Pathogenic, low penetrance")]
    PathogenicLowPenetrance,
    #[serde(rename = "Uncertain risk allele")]
    #[strum(serialize = "Uncertain risk allele")]
    UncertainRiskAllele,
    #[serde(rename = "Likely pathogenic, low penetrance")]
    #[strum(serialize = "Likely pathogenic, low penetrance")]
    LikelyPathogenicLowPenetrance,
    #[serde(rename = "Established risk allele")]
    #[strum(serialize = "Established risk allele")]
    EstablishedRiskAllele,
    #[serde(rename = "Likely risk allele")]
    #[strum(serialize = "Likely risk allele")]
    LikelyRiskAllele,
    #[serde(rename = "affects")]
    #[strum(serialize = "affects")]
    Affects,
    #[serde(rename = "association")]
    #[strum(serialize = "association")]
    Association,
    #[serde(rename = "drug response")]
    #[strum(serialize = "drug response")]
    DrugResponse,
    #[serde(rename = "confers sensitivity")]
    #[strum(serialize = "confers sensitivity")]
    ConfersSensitivity,
    #[serde(rename = "protective")]
    #[strum(serialize = "protective")]
    Protective,
    #[serde(rename = "other")]
    #[strum(serialize = "other")]
    Other,
    #[serde(rename = "not provided")]
    #[strum(serialize = "not provided")]
    NotProvided,
}

/// String values of all accepted clinical significance descriptions.
pub const CLINICAL_SIGNIFICANCE_VALUES: &[&str] = ClinicalSignificance::VARIANTS;

/// Submitting laboratories and their ClinVar organisation identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Organisation {
    /// Cambridge University Hospitals
    #[strum(serialize = "CUH")]
    Cuh,
    /// Nottingham University Hospitals
    #[strum(serialize = "NUH")]
    Nuh,
}

const CUH_ORGANISATION_ID: u64 = 288359;
const NUH_ORGANISATION_ID: u64 = 509428;

impl TryFrom<u64> for Organisation {
    type Error = ClinvarError;

    fn try_from(organisation_id: u64) -> Result<Self, Self::Error> {
        match organisation_id {
            CUH_ORGANISATION_ID => Ok(Organisation::Cuh),
            NUH_ORGANISATION_ID => Ok(Organisation::Nuh),
            _ => Err(ClinvarError::UnknownOrganisation(organisation_id)),
        }
    }
}

impl Organisation {
    /// URL of the classification guidelines document registered for the laboratory.
    pub fn assertion_criteria_url(&self) -> &'static str {
        match self {
            Organisation::Cuh => {
                "https://submit.ncbi.nlm.nih.gov/api/2.0/files/kf4l0sn8/\
                 uk-practice-guidelines-for-variant-classification-v4-01-2020.pdf/?format=attachment"
            }
            Organisation::Nuh => {
                "https://submit.ncbi.nlm.nih.gov/api/2.0/files/iptxgqju/\
                 uk-practice-guidelines-for-variant-classification-v4-01-2020.pdf/?format=attachment"
            }
        }
    }

    /// Organisation that the submission is made on behalf of, if any.
    pub fn behalf_of_id(&self) -> Option<u64> {
        match self {
            Organisation::Cuh => None,
            Organisation::Nuh => Some(NUH_ORGANISATION_ID),
        }
    }
}

/// One row of the variant CSV file.
#[derive(serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VariantRow {
    #[serde(rename = "Local ID")]
    pub local_id: String,
    #[serde(rename = "Linking ID")]
    pub linking_id: String,
    #[serde(rename = "Gene symbol")]
    pub gene_symbol: String,
    #[serde(rename = "Chromosome")]
    pub chromosome: String,
    #[serde(rename = "Start")]
    pub start: u64,
    #[serde(rename = "Reference allele")]
    pub reference_allele: String,
    #[serde(rename = "Alternate allele")]
    pub alternate_allele: String,
    #[serde(rename = "Ref genome")]
    pub ref_genome: String,
    #[serde(rename = "Germline classification")]
    pub germline_classification: String,
    #[serde(rename = "Comment on classification", default)]
    pub comment: String,
    #[serde(rename = "Date last evaluated")]
    pub date_last_evaluated: String,
    #[serde(rename = "Preferred condition name")]
    pub preferred_condition_name: String,
    #[serde(rename = "Affected status")]
    pub affected_status: String,
    #[serde(rename = "Allele origin")]
    pub allele_origin: String,
    #[serde(rename = "Collection method")]
    pub collection_method: String,
    #[serde(rename = "Organisation ID")]
    pub organisation_id: u64,
}

/// Record submission content, as understood by the ClinVar API.
///
/// Note that only the parts of the model are implemented that are used for submitting
/// germline classifications of small variants.
#[skip_serializing_none]
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClinvarRecord {
    pub assertion_criteria: AssertionCriteria,
    pub clinvar_submission: Vec<ClinvarSubmission>,
    #[serde(rename = "behalfOfID", default)]
    pub behalf_of_id: Option<u64>,
}

impl ClinvarRecord {
    /// Local identifier of the first submission.
    pub fn local_id(&self) -> Option<&str> {
        self.clinvar_submission
            .first()
            .map(|submission| submission.local_id.as_str())
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AssertionCriteria {
    pub url: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClinvarSubmission {
    pub clinical_significance: ClinicalSignificanceEntry,
    pub condition_set: ConditionSet,
    #[serde(rename = "localID")]
    pub local_id: String,
    pub local_key: String,
    pub observed_in: Vec<ObservedIn>,
    pub record_status: String,
    pub variant_set: VariantSet,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalSignificanceEntry {
    pub clinical_significance_description: ClinicalSignificance,
    pub comment: String,
    pub date_last_evaluated: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConditionSet {
    pub condition: Vec<Condition>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub name: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObservedIn {
    pub affected_status: String,
    pub allele_origin: String,
    pub collection_method: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VariantSet {
    pub variant: Vec<Variant>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub chromosome_coordinates: ChromosomeCoordinates,
    pub gene: Vec<Gene>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChromosomeCoordinates {
    pub assembly: GenomeRelease,
    pub alternate_allele: String,
    pub reference_allele: String,
    pub chromosome: String,
    pub start: u64,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Gene {
    pub symbol: String,
}

/// Validate the germline classification against ClinVar's vocabulary.
pub fn check_clinical_significance(value: &str) -> Result<ClinicalSignificance, ClinvarError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ClinvarError::MissingClinicalSignificance);
    }
    value
        .parse()
        .map_err(|_| ClinvarError::InvalidClinicalSignificance(value.to_string()))
}

/// ClinVar does not accept empty comments, these become `"None"`.
pub fn check_comment(comment: &str) -> String {
    let comment = comment.trim();
    if comment.is_empty() {
        String::from("None")
    } else {
        comment.to_string()
    }
}

/// Genome build of the annotation reference, only the patch levels in use are accepted.
pub fn determine_assembly(ref_genome: &str) -> Result<GenomeRelease, ClinvarError> {
    match ref_genome.trim() {
        "GRCh37.p13" => Ok(GenomeRelease::Grch37),
        "GRCh38.p13" => Ok(GenomeRelease::Grch38),
        _ => Err(ClinvarError::UnknownRefGenome(ref_genome.to_string())),
    }
}

/// Set guidelines and submitting organisation of the laboratory `organisation_id`.
pub fn add_lab_specific_guidelines(
    organisation_id: u64,
    record: &mut ClinvarRecord,
) -> Result<(), ClinvarError> {
    let organisation = Organisation::try_from(organisation_id)?;
    record.assertion_criteria.url = organisation.assertion_criteria_url().to_string();
    record.behalf_of_id = organisation.behalf_of_id();
    Ok(())
}

/// Build the submission record for one CSV row.
pub fn extract_clinvar_information(row: &VariantRow) -> Result<ClinvarRecord, ClinvarError> {
    let clinical_significance = check_clinical_significance(&row.germline_classification)?;
    let assembly = determine_assembly(&row.ref_genome)?;

    let mut record = ClinvarRecord {
        assertion_criteria: AssertionCriteria { url: String::new() },
        clinvar_submission: vec![ClinvarSubmission {
            clinical_significance: ClinicalSignificanceEntry {
                clinical_significance_description: clinical_significance,
                comment: check_comment(&row.comment),
                date_last_evaluated: row.date_last_evaluated.clone(),
            },
            condition_set: ConditionSet {
                condition: vec![Condition {
                    name: row.preferred_condition_name.clone(),
                }],
            },
            local_id: row.local_id.clone(),
            local_key: row.linking_id.clone(),
            observed_in: vec![ObservedIn {
                affected_status: row.affected_status.clone(),
                allele_origin: row.allele_origin.clone(),
                collection_method: row.collection_method.clone(),
            }],
            record_status: String::from("novel"),
            variant_set: VariantSet {
                variant: vec![Variant {
                    chromosome_coordinates: ChromosomeCoordinates {
                        assembly,
                        alternate_allele: row.alternate_allele.clone(),
                        reference_allele: row.reference_allele.clone(),
                        chromosome: row.chromosome.clone(),
                        start: row.start,
                    },
                    gene: vec![Gene {
                        symbol: row.gene_symbol.clone(),
                    }],
                }],
            },
        }],
        behalf_of_id: None,
    };
    add_lab_specific_guidelines(row.organisation_id, &mut record)?;
    Ok(record)
}

/// Output path `<out_dir>/<csv name up to first dot>-<local id>_clinvar_data.json`.
pub fn output_path(path_csv: &Path, path_out_dir: &Path, local_id: &str) -> PathBuf {
    let stem = path_csv
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .unwrap_or_default();
    path_out_dir.join(format!("{}-{}_clinvar_data.json", stem, local_id))
}

/// Command line arguments for `clinvar prepare` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Prepare ClinVar submission JSON from variant CSV", long_about = None)]
pub struct Args {
    /// Path to the variant CSV file.
    #[arg(long, required = true)]
    pub path_variant_csv: String,
    /// Directory to write the per-variant JSON files to.
    #[arg(long, default_value = ".")]
    pub path_out_dir: String,
}

/// Main entry point for `clinvar prepare` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let path_csv = Path::new(&args.path_variant_csv);
    let path_out_dir = Path::new(&args.path_out_dir);
    std::fs::create_dir_all(path_out_dir)
        .map_err(|e| anyhow::anyhow!("could not create {:?}: {}", path_out_dir, e))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(open_read_maybe_gz(path_csv)?);

    let mut written = 0;
    let mut failed = Vec::new();
    for (no, row) in reader.deserialize::<VariantRow>().enumerate() {
        let result = row
            .map_err(|e| anyhow::anyhow!("could not parse row: {}", e))
            .and_then(|row| {
                let record = extract_clinvar_information(&row)
                    .map_err(|e| anyhow::anyhow!("{}: {}", &row.local_id, e))?;
                let path_out = output_path(path_csv, path_out_dir, &row.local_id);
                write_json(&path_out, &record)?;
                tracing::info!("wrote {:?}", &path_out);
                Ok(())
            });
        match result {
            Ok(()) => written += 1,
            Err(e) => {
                tracing::error!("variant #{} could not be prepared: {}", no + 1, e);
                failed.push(no + 1);
            }
        }
    }
    tracing::info!("prepared {} ClinVar record(s)", written);

    tracing::info!(
        "All of `clinvar prepare` completed in {:?}",
        before_anything.elapsed()
    );
    if !failed.is_empty() {
        anyhow::bail!("{} variant(s) could not be prepared: {:?}", failed.len(), failed);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::{
        check_clinical_significance, check_comment, determine_assembly,
        extract_clinvar_information, ClinicalSignificance, ClinvarRecord, Organisation,
        VariantRow,
    };
    use crate::common::GenomeRelease;
    use crate::err::ClinvarError;

    fn first_row() -> Result<VariantRow, anyhow::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path("tests/clinvar/test_variant.csv")?;
        let row = reader
            .deserialize()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no rows"))??;
        Ok(row)
    }

    #[test]
    fn clinical_significance_values() {
        assert_eq!(super::CLINICAL_SIGNIFICANCE_VALUES.len(), 17);
        assert_eq!(super::CLINICAL_SIGNIFICANCE_VALUES[0], "Pathogenic");
    }

    #[rstest::rstest]
    #[case("Pathogenic", ClinicalSignificance::Pathogenic)]
    #[case("Likely pathogenic, low penetrance", ClinicalSignificance::LikelyPathogenicLowPenetrance)]
    #[case("not provided", ClinicalSignificance::NotProvided)]
    fn clinical_significance_valid(
        #[case] value: &str,
        #[case] expected: ClinicalSignificance,
    ) -> Result<(), anyhow::Error> {
        assert_eq!(check_clinical_significance(value)?, expected);

        Ok(())
    }

    #[test]
    fn clinical_significance_invalid() {
        let result = check_clinical_significance("Invalid");

        assert_eq!(
            result,
            Err(ClinvarError::InvalidClinicalSignificance("Invalid".into()))
        );
        assert!(result
            .expect_err("must fail")
            .to_string()
            .contains("Likely benign, Benign"));
    }

    #[rstest::rstest]
    #[case("")]
    #[case("  ")]
    fn clinical_significance_empty(#[case] value: &str) {
        assert_eq!(
            check_clinical_significance(value),
            Err(ClinvarError::MissingClinicalSignificance)
        );
    }

    #[rstest::rstest]
    #[case("", "None")]
    #[case("Test comment", "Test comment")]
    fn check_comment_cases(#[case] comment: &str, #[case] expected: &str) {
        assert_eq!(check_comment(comment), expected);
    }

    #[rstest::rstest]
    #[case("GRCh37.p13", GenomeRelease::Grch37)]
    #[case("GRCh38.p13", GenomeRelease::Grch38)]
    fn assembly(
        #[case] ref_genome: &str,
        #[case] expected: GenomeRelease,
    ) -> Result<(), anyhow::Error> {
        assert_eq!(determine_assembly(ref_genome)?, expected);

        Ok(())
    }

    #[test]
    fn assembly_invalid() {
        assert_eq!(
            determine_assembly("incorrect_reference_genome.fa.gz"),
            Err(ClinvarError::UnknownRefGenome(
                "incorrect_reference_genome.fa.gz".into()
            ))
        );
    }

    #[rstest::rstest]
    #[case(288359, Organisation::Cuh, "kf4l0sn8", None)]
    #[case(509428, Organisation::Nuh, "iptxgqju", Some(509428))]
    fn organisation(
        #[case] organisation_id: u64,
        #[case] expected: Organisation,
        #[case] file_key: &str,
        #[case] behalf_of_id: Option<u64>,
    ) -> Result<(), anyhow::Error> {
        let organisation = Organisation::try_from(organisation_id)?;

        assert_eq!(organisation, expected);
        assert!(organisation.assertion_criteria_url().contains(file_key));
        assert!(organisation
            .assertion_criteria_url()
            .ends_with("uk-practice-guidelines-for-variant-classification-v4-01-2020.pdf/?format=attachment"));
        assert_eq!(organisation.behalf_of_id(), behalf_of_id);

        Ok(())
    }

    #[test]
    fn guidelines_replace_those_of_other_lab() -> Result<(), anyhow::Error> {
        let mut record = extract_clinvar_information(&first_row()?)?;

        super::add_lab_specific_guidelines(509428, &mut record)?;
        assert!(record.assertion_criteria.url.contains("iptxgqju"));
        assert_eq!(record.behalf_of_id, Some(509428));

        super::add_lab_specific_guidelines(288359, &mut record)?;
        assert!(record.assertion_criteria.url.contains("kf4l0sn8"));
        assert_eq!(record.behalf_of_id, None);

        assert_eq!(
            super::add_lab_specific_guidelines(12345, &mut record),
            Err(ClinvarError::UnknownOrganisation(12345))
        );

        Ok(())
    }

    #[test]
    fn organisation_invalid() {
        assert_eq!(
            Organisation::try_from(12345_u64),
            Err(ClinvarError::UnknownOrganisation(12345))
        );
    }

    #[test]
    fn extract_from_csv_row() -> Result<(), anyhow::Error> {
        let record = extract_clinvar_information(&first_row()?)?;

        assert_eq!(
            serde_json::to_value(&record)?,
            serde_json::json!({
                "assertionCriteria": {
                    "url": "https://submit.ncbi.nlm.nih.gov/api/2.0/files/kf4l0sn8/uk-practice-guidelines-for-variant-classification-v4-01-2020.pdf/?format=attachment"
                },
                "clinvarSubmission": [{
                    "clinicalSignificance": {
                        "clinicalSignificanceDescription": "Pathogenic",
                        "comment": "Test comment",
                        "dateLastEvaluated": "2022-10-18"
                    },
                    "conditionSet": {"condition": [{"name": "Cystic fibrosis"}]},
                    "localID": "uid_xxxx",
                    "localKey": "uid_yyyy",
                    "observedIn": [{
                        "affectedStatus": "yes",
                        "alleleOrigin": "germline",
                        "collectionMethod": "clinical testing"
                    }],
                    "recordStatus": "novel",
                    "variantSet": {"variant": [{
                        "chromosomeCoordinates": {
                            "assembly": "GRCh37",
                            "alternateAllele": "CA",
                            "referenceAllele": "C",
                            "chromosome": "7",
                            "start": 117232266
                        },
                        "gene": [{"symbol": "CFTR"}]
                    }]}
                }]
            })
        );
        assert_eq!(record.local_id(), Some("uid_xxxx"));

        Ok(())
    }

    #[test]
    fn extract_sets_behalf_of_for_nuh() -> Result<(), anyhow::Error> {
        let mut row = first_row()?;
        row.organisation_id = 509428;

        let value = serde_json::to_value(extract_clinvar_information(&row)?)?;

        assert_eq!(value["behalfOfID"], serde_json::json!(509428));

        Ok(())
    }

    #[test]
    fn output_path() {
        assert_eq!(
            super::output_path(
                Path::new("tests/clinvar/test_variant.csv"),
                Path::new("out"),
                "uid_xxxx"
            ),
            Path::new("out/test_variant-uid_xxxx_clinvar_data.json")
        );
    }

    #[test]
    fn run_writes_one_file_per_row() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();

        let args_common = Default::default();
        let args = super::Args {
            path_variant_csv: String::from("tests/clinvar/test_variant.csv"),
            path_out_dir: tmpdir.to_str().expect("invalid path").into(),
        };
        super::run(&args_common, &args)?;

        let record: ClinvarRecord =
            crate::common::io::read_json(tmpdir.join("test_variant-uid_xxxx_clinvar_data.json"))?;
        assert_eq!(record.local_id(), Some("uid_xxxx"));
        assert_eq!(record.behalf_of_id, None);

        Ok(())
    }

    #[test]
    fn run_continues_after_invalid_row() {
        let tmpdir = temp_testdir::TempDir::default();

        let args_common = Default::default();
        let args = super::Args {
            path_variant_csv: String::from("tests/clinvar/test_variants_mixed.csv"),
            path_out_dir: tmpdir.to_str().expect("invalid path").into(),
        };
        let result = super::run(&args_common, &args);

        assert!(result.is_err());
        assert!(tmpdir
            .join("test_variants_mixed-uid_1_clinvar_data.json")
            .exists());
        assert!(!tmpdir
            .join("test_variants_mixed-uid_2_clinvar_data.json")
            .exists());
        assert!(tmpdir
            .join("test_variants_mixed-uid_3_clinvar_data.json")
            .exists());
    }
}
