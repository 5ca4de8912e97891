//! Configuration of the ClinVar client.

use std::{fmt, io::BufRead, path::Path, time::Duration};

use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::common::{http::RetryPolicy, io::open_read_maybe_gz};
use crate::err::ClinvarError;

/// Submission endpoint of the ClinVar test API.
pub const TEST_API_URL: &str = "https://submit.ncbi.nlm.nih.gov/apitest/v1/submissions";
/// Submission endpoint of the live ClinVar API.
pub const LIVE_API_URL: &str = "https://submit.ncbi.nlm.nih.gov/api/v1/submissions";

/// Endpoint to use depending on whether this is a test run.
pub fn select_api_url(testing: bool) -> &'static str {
    if testing {
        TEST_API_URL
    } else {
        LIVE_API_URL
    }
}

/// Parse the value of a `--testing` flag.
pub fn parse_testing_flag(value: &str) -> Result<bool, ClinvarError> {
    match value.trim() {
        "True" | "true" | "TRUE" => Ok(true),
        "False" | "false" | "FALSE" => Ok(false),
        _ => Err(ClinvarError::InvalidTestingFlag(value.to_string())),
    }
}

/// API key, never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: &str) -> Self {
        Self(key.to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

/// Read the API key from the first line of `path`.
pub fn read_api_key<P: AsRef<Path>>(path: P) -> Result<ApiKey, anyhow::Error> {
    let mut line = String::new();
    open_read_maybe_gz(path.as_ref())
        .map_err(|e| anyhow::anyhow!("could not open API key file {:?}: {}", path.as_ref(), e))?
        .read_line(&mut line)?;
    let key = line.trim();
    if key.is_empty() {
        anyhow::bail!("API key file {:?} is empty", path.as_ref());
    }
    Ok(ApiKey::new(key))
}

/// Request headers carrying the API key.
pub fn make_headers(api_key: &str) -> Result<HeaderMap, ClinvarError> {
    let mut value = HeaderValue::from_str(api_key).map_err(|_| ClinvarError::InvalidApiKey)?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert("sp-api-key", value);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Everything the ClinVar client needs to know.
#[derive(Debug, Clone, derive_builder::Builder)]
pub struct ClinvarConfig {
    pub api_key: ApiKey,
    /// Submission endpoint.
    #[builder(setter(into))]
    pub api_url: String,
    /// Whether the test endpoint is used.
    #[builder(default)]
    pub testing: bool,
    #[builder(default)]
    pub retry: RetryPolicy,
    /// Delay between two status checks.
    #[builder(default = "Duration::from_secs(300)")]
    pub poll_interval: Duration,
    /// Number of status re-checks before giving up on an accession.
    #[builder(default = "12")]
    pub max_polls: u32,
}

/// Command line arguments shared by the sub commands talking to ClinVar.
#[derive(Debug, clap::Args)]
pub struct ApiArgs {
    /// Path to the file with the API key in its first line.
    #[arg(long, required = true)]
    pub path_api_key: String,
    /// Whether to use the test endpoint (true/false).
    #[arg(long, required = true, action = clap::ArgAction::Set, value_parser = parse_testing_flag)]
    pub testing: bool,
    /// Override the submission endpoint.
    #[arg(long)]
    pub api_url: Option<String>,
    /// Maximal number of attempts per request.
    #[arg(long, default_value_t = 10)]
    pub max_attempts: u32,
}

impl ApiArgs {
    /// Configuration builder with key, endpoint and retry budget set.
    pub fn config_builder(&self) -> Result<ClinvarConfigBuilder, anyhow::Error> {
        let api_url = self
            .api_url
            .clone()
            .unwrap_or_else(|| String::from(select_api_url(self.testing)));
        tracing::info!(
            "running in {} mode, using {}",
            if self.testing { "test" } else { "live" },
            &api_url
        );

        let mut builder = ClinvarConfigBuilder::default();
        builder
            .api_key(read_api_key(&self.path_api_key)?)
            .api_url(api_url)
            .testing(self.testing)
            .retry(RetryPolicy::with_max_attempts(self.max_attempts));
        Ok(builder)
    }
}
