//! Error types shared across the sub commands.

use crate::clinvar::prepare::CLINICAL_SIGNIFICANCE_VALUES;

/// Problems with the upstream case data.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CaseError {
    #[error("finding #{0} has neither a call variant id nor an id")]
    MissingVariantId(usize),
    #[error("finding {0} has no genotype in its first sample")]
    MissingGenotype(String),
}

/// Reasons why a variant record cannot be split into per-allele records.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecomposeError {
    #[error("malformed variant id {0:?}, expected <chrom>:<pos>:<ref>:<alt1,alt2,...>")]
    MalformedVariantId(String),
    #[error("malformed genotype {0:?}, expected two indices separated by '/' or '|'")]
    MalformedGenotype(String),
    #[error("genotype index {index:?} does not point into the alternate alleles of {variant_id:?}")]
    InvalidAlleleIndex { variant_id: String, index: String },
}

/// Failures of the retrying HTTP transport.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("could not set up HTTP client or request: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed after {attempts} attempt(s): {source}")]
    Request {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} failed after {attempts} attempt(s) with status {status}")]
    Status {
        url: String,
        attempts: u32,
        status: reqwest::StatusCode,
    },
}

/// Errors when talking to the patient registry.
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("could not encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("could not parse registry response from {url}: {source}")]
    InvalidBody {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("patient creation was rejected: {0}")]
    CreatePatient(String),
    #[error("no patient with clinical reference {0:?} found in registry")]
    PatientNotFound(String),
    #[error("no person record found for patient {0}")]
    PersonNotFound(String),
    #[error("phenotypes could not be submitted: {0}")]
    Phenotypes(String),
    #[error("unexpected registry response: {0}")]
    UnexpectedResponse(String),
}

/// Problems with ClinVar submission data.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClinvarError {
    #[error(
        "no value provided for clinical significance 'Germline classification', \
         this value is required for submission to ClinVar"
    )]
    MissingClinicalSignificance,
    #[error(
        "clinical significance value {0:?} is not accepted by ClinVar, valid values are: {}",
        CLINICAL_SIGNIFICANCE_VALUES.join(", ")
    )]
    InvalidClinicalSignificance(String),
    #[error("could not determine genome build from ref genome {0:?}")]
    UnknownRefGenome(String),
    #[error("organisation id {0} is not a valid option (288359 - CUH, 509428 - NUH)")]
    UnknownOrganisation(u64),
    #[error("value {0:?} for testing is neither true nor false")]
    InvalidTestingFlag(String),
    #[error("API key contains characters that are not allowed in a header")]
    InvalidApiKey,
}
