//! litgraph — batch ingestion binary.
//!
//! Usage: litgraph [START [SIZE]]
//!
//! Processes the batch window [START, START+SIZE) of the sorted PDF listing
//! under the configured input directory. Both arguments are optional
//! (defaults: 0 and the configured batch size). Failures are logged; the
//! process always exits 0 so an interrupted run is restarted from a chosen
//! offset rather than inspected by exit code.

use std::sync::Arc;

use anyhow::Context;
use litgraph_agent::ExtractionAgent;
use litgraph_graph::GraphStore;
use litgraph_ingestion::config::{Config, LlmConfig};
use litgraph_ingestion::pipeline::{run_batch, BatchJob, BatchWindow};
use litgraph_llm::backend::{OpenAiBackend, OpenAiCompatibleBackend};
use litgraph_llm::LlmBackend;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "Ingestion run failed");
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;

    let mut args = std::env::args().skip(1);
    let start = args
        .next()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(0);
    let size = args
        .next()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(config.ingestion.batch_size);

    let database_url = config
        .database
        .url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .context("No database URL: set [database].url in litgraph.toml or DATABASE_URL")?;

    let store = GraphStore::connect(&database_url, config.database.max_connections).await?;
    let agent = ExtractionAgent::new(build_backend(&config.llm));

    let job = BatchJob {
        input_dir: config.ingestion.input_dir.clone(),
        window: BatchWindow { start, size },
        max_pages: config.ingestion.max_pages,
        tx_scope: config.ingestion.tx_scope,
    };

    let result = run_batch(job, &store, &agent).await;
    info!(
        job_id = %result.job_id,
        processed = result.papers_processed,
        failed = result.papers_failed,
        "Batch finished"
    );
    Ok(())
}

/// Build the LLM backend from config, resolving the API key from the
/// configured env var with OPENAI_API_KEY as a fallback.
fn build_backend(cfg: &LlmConfig) -> Arc<dyn LlmBackend> {
    let api_key = std::env::var(&cfg.api_key_env)
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .unwrap_or_default();

    match &cfg.base_url {
        Some(base_url) => Arc::new(OpenAiCompatibleBackend::new(
            base_url,
            &cfg.model,
            (!api_key.is_empty()).then_some(api_key),
        )),
        None => {
            if api_key.is_empty() {
                warn!(
                    "No API key found (set {} or OPENAI_API_KEY)",
                    cfg.api_key_env
                );
            }
            Arc::new(OpenAiBackend::new(api_key, &cfg.model))
        }
    }
}
