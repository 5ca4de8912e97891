//! Submission of prepared records to ClinVar, the `clinvar submit` sub command.

use crate::common::io::{append_ledger_row, read_json};

use super::{conf::ApiArgs, prepare::ClinvarRecord, ClinvarClient};

/// Header of the submission ledger.
pub const SUBMISSION_LEDGER_HEADER: [&str; 2] = ["Local_ID", "ClinVar_Submission_ID"];
/// Ledger value written when no submission id was returned.
pub const SUBMISSION_ERROR_MARKER: &str = "Submission_error_check_logs";

/// Request body of a submission.
#[derive(serde::Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SubmissionEnvelope<'a> {
    pub actions: Vec<Action<'a>>,
}

#[derive(serde::Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Action<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub target_db: &'static str,
    pub data: ActionData<'a>,
}

#[derive(serde::Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ActionData<'a> {
    pub content: &'a ClinvarRecord,
}

impl<'a> SubmissionEnvelope<'a> {
    /// Wrap `record` into a single `AddData` action.
    pub fn add_data(record: &'a ClinvarRecord) -> Self {
        Self {
            actions: vec![Action {
                kind: "AddData",
                target_db: "clinvar",
                data: ActionData { content: record },
            }],
        }
    }
}

#[derive(serde::Deserialize, Debug)]
struct SubmissionResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Post `record` and return the submission id, if the submission was accepted.
pub fn submit_record(
    client: &ClinvarClient,
    record: &ClinvarRecord,
) -> Result<Option<String>, anyhow::Error> {
    let envelope = SubmissionEnvelope::add_data(record);
    tracing::debug!("submitting {}", serde_json::to_string_pretty(&envelope)?);
    let response = client.post_json(&client.config().api_url, &envelope)?;

    match serde_json::from_str::<SubmissionResponse>(&response.body) {
        Ok(SubmissionResponse { id: Some(id) }) if response.status.is_success() => Ok(Some(id)),
        Ok(_) => {
            tracing::warn!(
                "submission was not accepted ({}): {}",
                response.status,
                &response.body
            );
            Ok(None)
        }
        Err(e) => {
            tracing::warn!("could not parse submission response: {}", e);
            Ok(None)
        }
    }
}

/// Command line arguments for `clinvar submit` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Submit prepared records to ClinVar", long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub api: ApiArgs,
    /// Path(s) to record JSON files, as written by `clinvar prepare`.
    #[arg(long, required = true, num_args = 1..)]
    pub path_clinvar_json: Vec<String>,
    /// Path to the TSV ledger that submission ids are appended to.
    #[arg(long, default_value = "submission_ids.txt")]
    pub path_submission_ids: String,
}

/// Main entry point for `clinvar submit` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let config = args.api.config_builder()?.build()?;
    let client = ClinvarClient::new(config)?;

    let mut failed = 0;
    for path in &args.path_clinvar_json {
        let record: ClinvarRecord = match read_json(path) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("could not load record {}: {}", path, e);
                failed += 1;
                continue;
            }
        };
        let Some(local_id) = record.local_id().map(String::from) else {
            tracing::error!("record {} has no local ID", path);
            failed += 1;
            continue;
        };

        let submission_id = match submit_record(&client, &record) {
            Ok(submission_id) => submission_id,
            Err(e) => {
                tracing::error!("submission of {} failed: {}", &local_id, e);
                None
            }
        };
        match &submission_id {
            Some(submission_id) => tracing::info!("{} submitted as {}", &local_id, submission_id),
            None => failed += 1,
        }
        append_ledger_row(
            &args.path_submission_ids,
            &SUBMISSION_LEDGER_HEADER,
            &[
                local_id.as_str(),
                submission_id.as_deref().unwrap_or(SUBMISSION_ERROR_MARKER),
            ],
        )?;
    }

    tracing::info!(
        "All of `clinvar submit` completed in {:?}",
        before_anything.elapsed()
    );
    if failed > 0 {
        anyhow::bail!(
            "{} of {} record(s) were not submitted, see {}",
            failed,
            args.path_clinvar_json.len(),
            &args.path_submission_ids
        );
    }
    Ok(())
}
