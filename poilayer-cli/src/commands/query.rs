//! Query command - fetch merged elements for a region.
//!
//! Prints each result as JSON on stdout. Logs go to stderr and the log file.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use poilayer::pipeline::{MergeResult, Pipeline};
use poilayer::provider::{AsyncReqwestClient, UpstreamFetcher};
use poilayer::records::InMemoryRecordSource;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the query command.
pub struct QueryArgs {
    pub config: Option<PathBuf>,
    pub bbox: Option<String>,
    pub repeat: u32,
    pub pretty: bool,
}

/// Run the query command.
pub async fn run(args: QueryArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.config.as_deref())?;
    runner.log_startup("query");
    let config = runner.config();

    let timeout = config.upstream_timeout();
    let client = AsyncReqwestClient::with_timeout(timeout, &config.upstream.user_agent)?;
    let upstream = Arc::new(UpstreamFetcher::new(
        client,
        config.upstream.endpoints.clone(),
        timeout,
    ));

    let records = Arc::new(
        InMemoryRecordSource::from_files(
            config.records.curated_file.as_deref(),
            config.records.operator_file.as_deref(),
            config.records.community_file.as_deref(),
        )
        .await?,
    );

    let pipeline = Pipeline::new(config.to_pipeline_config(), upstream, records);

    let mut outcome = Ok(());
    for _ in 0..args.repeat.max(1) {
        match pipeline.get_merged_elements(args.bbox.as_deref()).await {
            Ok(result) => {
                if let Err(e) = print_result(&result, args.pretty) {
                    outcome = Err(e);
                    break;
                }
            }
            Err(e) => {
                outcome = Err(e.into());
                break;
            }
        }
    }

    // Let background revalidations finish before the runtime goes away.
    pipeline.shutdown().await;
    info!("Query finished");
    outcome
}

fn print_result(result: &MergeResult, pretty: bool) -> Result<(), CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{}", json);
    Ok(())
}
