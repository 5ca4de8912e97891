//! Submission of case records to DECIPHER, the `decipher submit` sub command.

use crate::case::{zygosity::resolve_zygosity, CaseRecord, Sex, VariantRecord, VariantType};
use crate::common::{http::RetryPolicy, io::read_json, io::write_json, GenomeRelease};
use crate::err::{DecomposeError, RegistryError};

use super::api::{ApiError, HttpRegistry, NewPatient, Outcome, RegistryApi};
use super::conf::{self, Credentials, DecipherConfig, DecipherConfigBuilder};
use super::variants::{classify_variant_type, decompose_alleles, NormalizedVariant, Phenotype};
use super::RemoteId;

/// Error detail returned when creating a patient whose clinical reference exists.
pub const DUPLICATE_REFERENCE_DETAIL: &str = "Clinical reference must be unique within the project";
/// Error detail returned when a phenotype batch contains an unknown HPO term.
pub const INVALID_HPO_DETAIL: &str = "Invalid HPO term";

/// Registry identifiers of a submitted proband.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PatientIdentity {
    pub person_id: RemoteId,
    pub patient_id: RemoteId,
}

/// Summary of one case submission.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReport {
    pub clinical_reference: String,
    pub person_id: RemoteId,
    pub patient_id: RemoteId,
    /// Whether the patient already existed and was looked up by clinical reference.
    pub reused_existing_patient: bool,
    pub phenotypes_submitted: usize,
    /// HPO terms removed from the batch after being rejected.
    pub phenotypes_dropped: Vec<String>,
    pub variants_submitted: usize,
    pub variants_skipped: usize,
    pub variants_failed: usize,
    /// Link to the clinical information page of the patient.
    pub deep_link: String,
}

/// Why a variant record is not submitted.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("variant type {0} is not supported")]
    UnsupportedType(VariantType),
    #[error("could not resolve zygosity from genotype {0:?}")]
    UnresolvedZygosity(String),
    #[error("only the reference allele is called")]
    ReferenceOnly,
    #[error(transparent)]
    Undecomposable(#[from] DecomposeError),
}

/// Turn one variant record into the per-allele records to submit.
pub fn prepare_variant(
    variant: &VariantRecord,
    sex: Sex,
    person_id: &RemoteId,
    assembly: GenomeRelease,
) -> Result<Vec<NormalizedVariant>, SkipReason> {
    let variant_class = classify_variant_type(variant)
        .ok_or_else(|| SkipReason::UnsupportedType(variant.variant_type.clone()))?;
    let zygosity = resolve_zygosity(variant, sex)
        .ok_or_else(|| SkipReason::UnresolvedZygosity(variant.zygosity.clone()))?;
    decompose_alleles(variant, person_id, zygosity, variant_class, assembly)?
        .ok_or(SkipReason::ReferenceOnly)
}

/// Error details of a rejection, joined for reporting.
fn error_details(errors: &[ApiError]) -> String {
    errors
        .iter()
        .map(|error| error.detail.clone().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PhenotypeSummary {
    submitted: usize,
    dropped: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct VariantSummary {
    submitted: usize,
    skipped: usize,
    failed: usize,
}

/// Drives the submission of cases against a registry.
#[derive(Debug)]
pub struct Submitter<R: RegistryApi> {
    registry: R,
    config: DecipherConfig,
}

impl<R: RegistryApi> Submitter<R> {
    pub fn new(registry: R, config: DecipherConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Submit patient, phenotypes and variants of one case.
    ///
    /// Failing to obtain the patient or to submit the phenotypes ends the case; rejected
    /// variants are logged and counted.
    pub fn submit_case(&self, case: &CaseRecord) -> Result<SubmissionReport, RegistryError> {
        let (identity, reused_existing_patient) = self.create_or_find_patient(case)?;
        tracing::info!(
            "patient {} has person id {} (existing: {})",
            &identity.patient_id,
            &identity.person_id,
            reused_existing_patient
        );

        let phenotypes = self.submit_phenotypes(&identity.person_id, &case.phenotype_list)?;
        let variants = self.submit_variants(&identity.person_id, case);

        let deep_link = self.config.patient_link(&identity.patient_id.to_string());
        tracing::info!("patient {} available at {}", &case.clinical_reference, &deep_link);

        Ok(SubmissionReport {
            clinical_reference: case.clinical_reference.clone(),
            person_id: identity.person_id,
            patient_id: identity.patient_id,
            reused_existing_patient,
            phenotypes_submitted: phenotypes.submitted,
            phenotypes_dropped: phenotypes.dropped,
            variants_submitted: variants.submitted,
            variants_skipped: variants.skipped,
            variants_failed: variants.failed,
            deep_link,
        })
    }

    /// Create the patient or, if its clinical reference is taken, look it up.
    ///
    /// The flag in the result is set if an existing patient was found.
    pub fn create_or_find_patient(
        &self,
        case: &CaseRecord,
    ) -> Result<(PatientIdentity, bool), RegistryError> {
        let patient = NewPatient {
            contact_account_id: RemoteId::from(self.config.submitter_id.as_str()),
            chromosomal_sex: case.sex,
            has_aneuploidy: false,
            clinical_reference: case.clinical_reference.clone(),
            has_consent: false,
        };

        match self.registry.create_patient(&patient)? {
            Outcome::Accepted(patients) => {
                let patient = patients.first().ok_or_else(|| {
                    RegistryError::UnexpectedResponse(String::from(
                        "patient creation returned no patient",
                    ))
                })?;
                let person_id = patient
                    .person_id()
                    .cloned()
                    .ok_or_else(|| RegistryError::PersonNotFound(patient.id.to_string()))?;
                Ok((
                    PatientIdentity {
                        person_id,
                        patient_id: patient.id.clone(),
                    },
                    false,
                ))
            }
            Outcome::Rejected(errors)
                if errors
                    .first()
                    .map(|error| error.detail_is(DUPLICATE_REFERENCE_DETAIL))
                    .unwrap_or(false) =>
            {
                tracing::info!(
                    "patient with clinical reference {} already exists in registry",
                    &case.clinical_reference
                );
                let identity = self.find_existing_patient(&case.clinical_reference)?;
                Ok((identity, true))
            }
            Outcome::Rejected(errors) => Err(RegistryError::CreatePatient(error_details(&errors))),
        }
    }

    /// Find the patient with the given clinical reference and its person.
    pub fn find_existing_patient(
        &self,
        clinical_reference: &str,
    ) -> Result<PatientIdentity, RegistryError> {
        let patient = self
            .registry
            .list_patients()?
            .into_iter()
            .find(|patient| {
                patient.attributes.clinical_reference.as_deref() == Some(clinical_reference)
            })
            .ok_or_else(|| RegistryError::PatientNotFound(clinical_reference.to_string()))?;
        let person = self
            .registry
            .people_for_patient(&patient.id)?
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::PersonNotFound(patient.id.to_string()))?;

        Ok(PatientIdentity {
            person_id: person.id,
            patient_id: patient.id,
        })
    }

    /// Submit all phenotypes as one batch.
    ///
    /// A term rejected as invalid HPO term is removed and the batch resubmitted once. Any
    /// other failure, including of the resubmission, is an error.
    fn submit_phenotypes(
        &self,
        person_id: &RemoteId,
        hpo_terms: &[String],
    ) -> Result<PhenotypeSummary, RegistryError> {
        let mut summary = PhenotypeSummary::default();
        if hpo_terms.is_empty() {
            tracing::info!("no phenotypes to submit");
            return Ok(summary);
        }

        let mut terms = hpo_terms.to_vec();
        let mut batch = terms
            .iter()
            .map(|term| Phenotype::present(person_id, term))
            .collect::<Vec<_>>();

        let errors = match self.registry.create_phenotypes(&batch)? {
            Outcome::Accepted(()) => {
                summary.submitted = batch.len();
                return Ok(summary);
            }
            Outcome::Rejected(errors) => errors,
        };

        let index = errors
            .first()
            .filter(|error| error.detail_is(INVALID_HPO_DETAIL))
            .and_then(|error| error.pointer_index())
            .filter(|index| *index < batch.len())
            .ok_or_else(|| RegistryError::Phenotypes(error_details(&errors)))?;

        batch.remove(index);
        let term = terms.remove(index);
        tracing::warn!("removing invalid HPO term {} and resubmitting", &term);
        summary.dropped.push(term);
        if batch.is_empty() {
            return Ok(summary);
        }

        match self.registry.create_phenotypes(&batch)? {
            Outcome::Accepted(()) => {
                summary.submitted = batch.len();
                Ok(summary)
            }
            Outcome::Rejected(errors) => Err(RegistryError::Phenotypes(format!(
                "rejected again after removing {}: {}",
                summary.dropped.join(", "),
                error_details(&errors)
            ))),
        }
    }

    /// Submit each allele of each supported variant on its own.
    fn submit_variants(&self, person_id: &RemoteId, case: &CaseRecord) -> VariantSummary {
        let mut summary = VariantSummary::default();
        for variant in &case.variant_list {
            let records =
                match prepare_variant(variant, case.sex, person_id, self.config.assembly) {
                    Ok(records) => records,
                    Err(SkipReason::ReferenceOnly) => {
                        tracing::info!("nothing to submit for {}", &variant.variant_id);
                        summary.skipped += 1;
                        continue;
                    }
                    Err(reason) => {
                        tracing::warn!("skipping variant {}: {}", &variant.variant_id, reason);
                        summary.skipped += 1;
                        continue;
                    }
                };

            for record in &records {
                match self.registry.create_variant(record) {
                    Ok(Outcome::Accepted(())) => summary.submitted += 1,
                    Ok(Outcome::Rejected(errors)) => {
                        tracing::warn!(
                            "variant {} (alt {}) was rejected: {:?}",
                            &variant.variant_id,
                            &record.alt_sequence,
                            &errors
                        );
                        summary.failed += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "could not submit variant {} (alt {}): {}",
                            &variant.variant_id,
                            &record.alt_sequence,
                            e
                        );
                        summary.failed += 1;
                    }
                }
            }
        }
        summary
    }
}

/// Command line arguments for `decipher submit` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Submit case JSON files to DECIPHER", long_about = None)]
pub struct Args {
    /// Path to the JSON file with `CLIENT_KEY` and `USER_KEY`.
    #[arg(long, required = true)]
    pub path_credentials: String,
    /// Path(s) to case JSON files, as written by `case assemble`.
    #[arg(long, required = true, num_args = 1..)]
    pub path_case: Vec<String>,
    /// DECIPHER account id recorded as contact of new patients.
    #[arg(long, required = true)]
    pub submitter_id: String,
    /// Base URL of the DECIPHER API.
    #[arg(long, default_value = conf::DEFAULT_API_URL)]
    pub api_url: String,
    /// Base URL of the DECIPHER web interface.
    #[arg(long, default_value = conf::DEFAULT_WEB_URL)]
    pub web_url: String,
    /// Genome release of the variant coordinates.
    #[arg(long, value_enum, default_value_t = GenomeRelease::Grch38)]
    pub assembly: GenomeRelease,
    /// Maximal number of attempts per request.
    #[arg(long, default_value_t = 10)]
    pub max_attempts: u32,
    /// Optional path to write the submission reports to as JSON.
    #[arg(long)]
    pub path_report: Option<String>,
}

/// Main entry point for `decipher submit` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let config = DecipherConfigBuilder::default()
        .api_url(args.api_url.as_str())
        .web_url(args.web_url.as_str())
        .credentials(Credentials::from_path(&args.path_credentials)?)
        .submitter_id(args.submitter_id.as_str())
        .assembly(args.assembly)
        .retry(RetryPolicy::with_max_attempts(args.max_attempts))
        .build()
        .map_err(|e| anyhow::anyhow!("invalid DECIPHER configuration: {}", e))?;
    let registry = HttpRegistry::new(config.clone())
        .map_err(|e| anyhow::anyhow!("could not set up DECIPHER client: {}", e))?;
    let submitter = Submitter::new(registry, config);

    let mut reports = Vec::new();
    let mut failed = Vec::new();
    for path_case in &args.path_case {
        tracing::info!("submitting case {}...", path_case);
        let result = read_json::<CaseRecord, _>(path_case).and_then(|case| {
            submitter.submit_case(&case).map_err(|e| {
                anyhow::anyhow!("submission of {} failed: {}", &case.clinical_reference, e)
            })
        });
        match result {
            Ok(report) => {
                tracing::info!("report = {:#?}", &report);
                reports.push(report);
            }
            Err(e) => {
                tracing::error!("case {} could not be submitted: {}", path_case, e);
                failed.push(path_case.clone());
            }
        }
    }

    if let Some(path_report) = &args.path_report {
        write_json(path_report, &reports)?;
    }

    tracing::info!(
        "All of `decipher submit` completed in {:?}",
        before_anything.elapsed()
    );
    if !failed.is_empty() {
        anyhow::bail!(
            "{} of {} case(s) failed: {}",
            failed.len(),
            args.path_case.len(),
            failed.join(", ")
        );
    }
    Ok(())
}
