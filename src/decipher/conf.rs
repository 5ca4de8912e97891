//! Configuration of the DECIPHER client.

use std::fmt;

use crate::common::{http::RetryPolicy, GenomeRelease};

/// Default base URL of the DECIPHER API.
pub const DEFAULT_API_URL: &str = "https://www.deciphergenomics.org/api/";
/// Default base URL of the DECIPHER web interface.
pub const DEFAULT_WEB_URL: &str = "https://www.deciphergenomics.org";

/// API tokens, as stored in the JSON credentials file.
#[derive(serde::Deserialize, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Client token, sent as `X-Auth-Token-Client`.
    #[serde(rename = "CLIENT_KEY")]
    pub client_key: String,
    /// Account token, sent as `X-Auth-Token-Account`.
    #[serde(rename = "USER_KEY")]
    pub user_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_key", &"<redacted>")
            .field("user_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Load credentials from a JSON file with `CLIENT_KEY` and `USER_KEY`.
    pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, anyhow::Error> {
        crate::common::io::read_json(path.as_ref())
            .map_err(|e| anyhow::anyhow!("problem loading DECIPHER credentials: {}", e))
    }
}

/// Everything the DECIPHER client and submission need to know.
#[derive(Debug, Clone, derive_builder::Builder)]
pub struct DecipherConfig {
    /// Base URL of the API.
    #[builder(setter(into), default = "String::from(DEFAULT_API_URL)")]
    pub api_url: String,
    /// Base URL of the web interface, used for deep links.
    #[builder(setter(into), default = "String::from(DEFAULT_WEB_URL)")]
    pub web_url: String,
    /// API tokens.
    pub credentials: Credentials,
    /// DECIPHER account that is recorded as contact for new patients.
    #[builder(setter(into))]
    pub submitter_id: String,
    /// Genome release of the variant coordinates.
    #[builder(default)]
    pub assembly: GenomeRelease,
    /// Transport retry budget.
    #[builder(default)]
    pub retry: RetryPolicy,
}

impl DecipherConfig {
    /// Full URL of the API endpoint `path`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path)
    }

    /// Web link to the clinical information page of a patient.
    pub fn patient_link(&self, patient_id: &str) -> String {
        format!(
            "{}/patient/{}/overview/clinical-info",
            self.web_url.trim_end_matches('/'),
            patient_id
        )
    }
}
