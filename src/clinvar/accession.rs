//! Retrieval of accessions for submitted records, the `clinvar accession` sub command.

use std::{path::Path, time::Duration};

use crate::common::io::{append_ledger_row, open_read_maybe_gz};

use super::{conf::ApiArgs, submit::SUBMISSION_ERROR_MARKER, ClinvarClient};

/// Header of the accession ledger.
pub const ACCESSION_LEDGER_HEADER: [&str; 2] = ["Local_ID", "ClinVar_Accession_ID"];
/// Ledger value written when no accession could be obtained.
pub const NO_ACCESSION: &str = "None";

/// Status document of a submission, only the parts needed to find the summary file.
#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionStatus {
    #[serde(default)]
    pub actions: Vec<StatusAction>,
}

#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusAction {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub responses: Vec<StatusResponse>,
}

#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusResponse {
    #[serde(default)]
    pub files: Vec<StatusFile>,
}

#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusFile {
    #[serde(default)]
    pub url: Option<String>,
}

/// URL of the summary file of the first response, if any.
pub fn summary_file_url(action: &StatusAction) -> Option<&str> {
    action.responses.first()?.files.first()?.url.as_deref()
}

/// Query the status of a submission.
///
/// Returns the summary file if the submission has been processed, the status document
/// otherwise.
pub fn submission_status_check(
    client: &ClinvarClient,
    submission_id: &str,
) -> Result<serde_json::Value, anyhow::Error> {
    let url = format!(
        "{}/{}/actions",
        client.config().api_url.trim_end_matches('/'),
        submission_id
    );
    let response = client.get(&url)?;
    if response.status != reqwest::StatusCode::OK {
        anyhow::bail!(
            "status check of {} failed with {}: {}",
            submission_id,
            response.status,
            &response.body
        );
    }
    let document: serde_json::Value = serde_json::from_str(&response.body)
        .map_err(|e| anyhow::anyhow!("could not parse status of {}: {}", submission_id, e))?;

    let status: SubmissionStatus = serde_json::from_value(document.clone())?;
    let action = status
        .actions
        .first()
        .ok_or_else(|| anyhow::anyhow!("status of {} lists no actions", submission_id))?;
    tracing::info!(
        "submission {} has status {}",
        submission_id,
        action.status.as_deref().unwrap_or("<unknown>")
    );

    if action.responses.is_empty() {
        tracing::info!("no responses for {} yet, check back later", submission_id);
        return Ok(document);
    }
    let Some(file_url) = summary_file_url(action) else {
        tracing::warn!(
            "no summary file listed for {} in {:?}",
            submission_id,
            &action.responses
        );
        return Ok(document);
    };

    let summary = client.get(file_url)?;
    if summary.status != reqwest::StatusCode::OK {
        anyhow::bail!(
            "fetching summary file of {} failed with {}: {}",
            submission_id,
            summary.status,
            &summary.body
        );
    }
    serde_json::from_str(&summary.body)
        .map_err(|e| anyhow::anyhow!("could not parse summary file of {}: {}", submission_id, e))
}

/// Accession of the first submission in a summary file.
pub fn get_accession_id(response: &serde_json::Value) -> Option<String> {
    response
        .pointer("/submissions/0/identifiers/clinvarAccession")
        .and_then(|accession| accession.as_str())
        .map(String::from)
}

/// Call `check` until it yields an accession, re-checking at most `max_polls` times.
pub fn poll_for_accession<F>(
    max_polls: u32,
    interval: Duration,
    mut check: F,
) -> Result<Option<String>, anyhow::Error>
where
    F: FnMut() -> Result<Option<String>, anyhow::Error>,
{
    let mut accession = check()?;
    let mut polls = 0;
    while accession.is_none() && polls < max_polls {
        tracing::info!(
            "no accession yet, checking again in {:?} ({} of {})",
            interval,
            polls + 1,
            max_polls
        );
        std::thread::sleep(interval);
        accession = check()?;
        polls += 1;
    }
    Ok(accession)
}

/// Fetch the accession of one submission, polling until it is available.
pub fn fetch_accession(
    client: &ClinvarClient,
    submission_id: &str,
) -> Result<Option<String>, anyhow::Error> {
    let config = client.config();
    poll_for_accession(config.max_polls, config.poll_interval, || {
        let response = submission_status_check(client, submission_id)?;
        let accession = get_accession_id(&response);
        if accession.is_none() {
            tracing::info!("clinvarAccession not found for {}", submission_id);
        }
        Ok(accession)
    })
}

/// One row of the submission ledger.
#[derive(serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubmissionLedgerRow {
    #[serde(rename = "Local_ID")]
    pub local_id: String,
    #[serde(rename = "ClinVar_Submission_ID")]
    pub submission_id: String,
}

/// Load the submission ledger written by `clinvar submit`.
pub fn read_submission_ledger<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<SubmissionLedgerRow>, anyhow::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b'\t')
        .trim(csv::Trim::All)
        .from_reader(open_read_maybe_gz(path.as_ref())?);
    reader
        .deserialize()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!("could not read ledger {:?}: {}", path.as_ref(), e))
}

/// Command line arguments for `clinvar accession` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Retrieve ClinVar accessions for submissions", long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub api: ApiArgs,
    /// Path to the submission ledger written by `clinvar submit`.
    #[arg(long, required_unless_present = "submission_id")]
    pub path_submission_ids: Option<String>,
    /// A single submission id to query.
    #[arg(long, requires = "local_id")]
    pub submission_id: Option<String>,
    /// Local id of the single submission.
    #[arg(long)]
    pub local_id: Option<String>,
    /// Path to the TSV ledger that accessions are appended to.
    #[arg(long, default_value = "accession_ids.txt")]
    pub path_accession_ids: String,
    /// Seconds to wait between two status checks.
    #[arg(long, default_value_t = 300)]
    pub poll_interval: u64,
    /// Number of status re-checks before giving up.
    #[arg(long, default_value_t = 12)]
    pub max_polls: u32,
}

/// Main entry point for `clinvar accession` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    if args.api.testing {
        tracing::info!("submissions to the test endpoint are never accessioned, nothing to do");
        return Ok(());
    }

    let config = args
        .api
        .config_builder()?
        .poll_interval(Duration::from_secs(args.poll_interval))
        .max_polls(args.max_polls)
        .build()?;
    let client = ClinvarClient::new(config)?;

    let mut submissions = Vec::new();
    if let Some(path) = &args.path_submission_ids {
        submissions.extend(read_submission_ledger(path)?);
    }
    if let (Some(submission_id), Some(local_id)) = (&args.submission_id, &args.local_id) {
        submissions.push(SubmissionLedgerRow {
            local_id: local_id.clone(),
            submission_id: submission_id.clone(),
        });
    }

    let mut failed = 0;
    for SubmissionLedgerRow {
        local_id,
        submission_id,
    } in &submissions
    {
        let accession = if submission_id == SUBMISSION_ERROR_MARKER {
            tracing::warn!("{} was not submitted successfully, skipping", local_id);
            None
        } else {
            tracing::info!("querying {} for {}", &client.config().api_url, submission_id);
            fetch_accession(&client, submission_id).unwrap_or_else(|e| {
                tracing::error!("could not retrieve accession of {}: {}", submission_id, e);
                failed += 1;
                None
            })
        };
        match &accession {
            Some(accession) => tracing::info!("{} has accession {}", local_id, accession),
            None => tracing::warn!("no accession found for {}", local_id),
        }
        append_ledger_row(
            &args.path_accession_ids,
            &ACCESSION_LEDGER_HEADER,
            &[local_id.as_str(), accession.as_deref().unwrap_or(NO_ACCESSION)],
        )?;
    }

    tracing::info!(
        "All of `clinvar accession` completed in {:?}",
        before_anything.elapsed()
    );
    if failed > 0 {
        anyhow::bail!(
            "status of {} of {} submission(s) could not be retrieved, see {}",
            failed,
            submissions.len(),
            &args.path_accession_ids
        );
    }
    Ok(())
}
