//! End-to-end ingestion pipeline.
//!
//! Orchestrates the full flow for one batch window:
//!   1. List `*.pdf` files under the input directory, sorted by name
//!   2. Slice the batch window [start, start+size)
//!   3. Per paper: extract text → extract metadata → persist paper/authors →
//!      extract entities → extract relationships → persist entity nodes →
//!      resolve relationship endpoints by name → persist edges
//!
//! PDF and LLM failures are absorbed by the extractor and agent (empty text,
//! fallback metadata, empty entity/relationship lists) and never abort the
//! run. A database failure discards the configured transaction scope: the
//! current paper under `TxScope::PerPaper`, the whole batch under
//! `TxScope::PerBatch`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use litgraph_agent::ExtractionAgent;
use litgraph_graph::{GraphStore, GraphTx};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::pdf;

// ── Job config ────────────────────────────────────────────────────────────────

/// The contiguous slice of the sorted input listing processed in one run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchWindow {
    pub start: usize,
    pub size: usize,
}

impl Default for BatchWindow {
    fn default() -> Self {
        Self { start: 0, size: 10 }
    }
}

/// Transaction scope for a batch run.
///
/// `PerPaper` commits after each paper's full insert sequence, so a fatal
/// database error discards only that paper and the batch continues.
/// `PerBatch` holds one transaction across the run: a fatal error rolls back
/// every paper processed so far and ends the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxScope {
    #[default]
    PerPaper,
    PerBatch,
}

/// Parameters for a single batch run.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub input_dir: PathBuf,
    pub window: BatchWindow,
    pub max_pages: usize,
    pub tx_scope: TxScope,
}

// ── Result summary ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub job_id: Uuid,
    pub papers_total: usize,
    pub papers_processed: usize,
    pub papers_failed: usize,
    pub entity_nodes: usize,
    pub edges_created: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl BatchResult {
    fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            papers_total: 0,
            papers_processed: 0,
            papers_failed: 0,
            entity_nodes: 0,
            edges_created: 0,
            errors: Vec::new(),
            duration_ms: 0,
        }
    }
}

/// Per-paper persistence counts, folded into the batch result.
#[derive(Debug, Default)]
struct PaperOutcome {
    entity_nodes: usize,
    edges_created: usize,
}

// ── Pipeline orchestrator ─────────────────────────────────────────────────────

/// Runs the ingestion pipeline for one batch window.
/// Progress is reported via tracing; the result summarizes counts and errors.
pub async fn run_batch(job: BatchJob, store: &GraphStore, agent: &ExtractionAgent) -> BatchResult {
    let job_id = Uuid::new_v4();
    let t0 = std::time::Instant::now();
    let mut result = BatchResult::new(job_id);

    let pdfs = match list_pdfs(&job.input_dir) {
        Ok(pdfs) => pdfs,
        Err(e) => {
            warn!(error = %e, "Input listing failed");
            result.errors.push(e.to_string());
            result.duration_ms = t0.elapsed().as_millis() as u64;
            return result;
        }
    };
    let batch = batch_window(&pdfs, job.window);
    result.papers_total = batch.len();

    info!(
        job_id = %job_id,
        found = pdfs.len(),
        batch = batch.len(),
        start = job.window.start,
        scope = ?job.tx_scope,
        "Starting ingestion batch"
    );

    match job.tx_scope {
        TxScope::PerBatch => run_batch_atomic(batch, &job, store, agent, &mut result).await,
        TxScope::PerPaper => run_per_paper(batch, &job, store, agent, &mut result).await,
    }

    result.duration_ms = t0.elapsed().as_millis() as u64;
    info!(
        job_id = %job_id,
        processed   = result.papers_processed,
        failed      = result.papers_failed,
        nodes       = result.entity_nodes,
        edges       = result.edges_created,
        duration_ms = result.duration_ms,
        errors      = result.errors.len(),
        "Ingestion batch complete"
    );
    result
}

/// One transaction per paper: failures roll back only the failing paper.
async fn run_per_paper(
    batch: &[PathBuf],
    job: &BatchJob,
    store: &GraphStore,
    agent: &ExtractionAgent,
    result: &mut BatchResult,
) {
    for pdf_path in batch {
        let mut tx = match store.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                warn!(error = %e, "Could not open transaction, ending batch");
                result.errors.push(e.to_string());
                result.papers_failed = result.papers_total - result.papers_processed;
                return;
            }
        };

        match process_paper(&mut tx, agent, pdf_path, job.max_pages).await {
            Ok(outcome) => match tx.commit().await {
                Ok(()) => {
                    result.papers_processed += 1;
                    result.entity_nodes += outcome.entity_nodes;
                    result.edges_created += outcome.edges_created;
                }
                Err(e) => {
                    warn!(path = %pdf_path.display(), error = %e, "Commit failed, paper discarded");
                    result.errors.push(format!("{}: {e}", pdf_path.display()));
                    result.papers_failed += 1;
                }
            },
            Err(e) => {
                // dropping the transaction rolls this paper back
                warn!(path = %pdf_path.display(), error = %e, "Paper failed, continuing with next");
                result.errors.push(format!("{}: {e}", pdf_path.display()));
                result.papers_failed += 1;
            }
        }
    }
}

/// One transaction for the whole window: a fatal error discards every paper
/// processed so far and ends the run.
async fn run_batch_atomic(
    batch: &[PathBuf],
    job: &BatchJob,
    store: &GraphStore,
    agent: &ExtractionAgent,
    result: &mut BatchResult,
) {
    let mut tx = match store.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            warn!(error = %e, "Could not open transaction");
            result.errors.push(e.to_string());
            result.papers_failed = batch.len();
            return;
        }
    };

    for pdf_path in batch {
        match process_paper(&mut tx, agent, pdf_path, job.max_pages).await {
            Ok(outcome) => {
                result.papers_processed += 1;
                result.entity_nodes += outcome.entity_nodes;
                result.edges_created += outcome.edges_created;
            }
            Err(e) => {
                warn!(path = %pdf_path.display(), error = %e, "Paper failed, rolling back batch");
                result.errors.push(format!("{}: {e}", pdf_path.display()));
                result.papers_failed = result.papers_total - result.papers_processed;
                result.papers_processed = 0;
                result.entity_nodes = 0;
                result.edges_created = 0;
                return; // dropping the transaction rolls back the batch
            }
        }
    }

    if let Err(e) = tx.commit().await {
        warn!(error = %e, "Batch commit failed, all papers discarded");
        result.errors.push(e.to_string());
        result.papers_failed = result.papers_total;
        result.papers_processed = 0;
        result.entity_nodes = 0;
        result.edges_created = 0;
    }
}

// ── Per-paper flow ────────────────────────────────────────────────────────────

async fn process_paper(
    tx: &mut GraphTx,
    agent: &ExtractionAgent,
    pdf_path: &Path,
    max_pages: usize,
) -> Result<PaperOutcome> {
    info!(path = %pdf_path.display(), "Processing paper");

    let path = pdf_path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || pdf::extract_text(&path, max_pages))
        .await
        .context("PDF extraction task panicked")?;
    debug!(chars = text.len(), "Text extracted");

    let metadata = agent.extract_metadata(&text).await;
    info!(
        title = %metadata.title,
        year = ?metadata.year,
        authors = metadata.authors.len(),
        "Metadata extracted"
    );

    let ids = tx.insert_paper(&metadata).await?;
    debug!(paper_id = ids.paper_id, node_id = ids.node_id, "Paper stored");

    let entities = agent.extract_entities(&text, &metadata.title).await;
    let relationships = agent
        .extract_relationships(&text, &metadata.title, &entities)
        .await;

    let mut outcome = PaperOutcome::default();

    // Name → node id, seeded with the paper title. Entity names resolve to
    // their own nodes; the first binding of a name wins.
    let mut name_to_node: HashMap<String, i64> = HashMap::new();
    name_to_node.insert(metadata.title.clone(), ids.node_id);

    for (category, name) in entities.by_category() {
        let node_id = tx
            .get_or_create_node(
                category.node_type(),
                &serde_json::json!({"name": name}),
                "name",
            )
            .await?;
        name_to_node.entry(name.to_string()).or_insert(node_id);
        outcome.entity_nodes += 1;
    }

    for rel in &relationships {
        let (Some(&source), Some(&target)) =
            (name_to_node.get(&rel.source), name_to_node.get(&rel.target))
        else {
            debug!(
                source = %rel.source,
                target = %rel.target,
                "Relationship endpoint not in entity set, skipping"
            );
            continue;
        };
        let edge = tx
            .create_edge(
                &rel.relationship,
                source,
                target,
                &serde_json::json!({"evidence": rel.evidence}),
                rel.confidence,
            )
            .await;
        if edge.is_some() {
            outcome.edges_created += 1;
        }
    }

    Ok(outcome)
}

// ── Input listing ─────────────────────────────────────────────────────────────

/// All PDF files directly under `dir`, sorted by path for a stable window.
fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory {}", dir.display()))?;
    let mut pdfs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();
    pdfs.sort();
    Ok(pdfs)
}

fn batch_window(pdfs: &[PathBuf], window: BatchWindow) -> &[PathBuf] {
    let start = window.start.min(pdfs.len());
    let end = start.saturating_add(window.size).min(pdfs.len());
    &pdfs[start..end]
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_batch_window_slices() {
        let pdfs = paths(&["a.pdf", "b.pdf", "c.pdf", "d.pdf"]);
        let window = batch_window(&pdfs, BatchWindow { start: 1, size: 2 });
        assert_eq!(window, &pdfs[1..3]);
    }

    #[test]
    fn test_batch_window_clamps_past_end() {
        let pdfs = paths(&["a.pdf", "b.pdf"]);
        assert_eq!(batch_window(&pdfs, BatchWindow { start: 1, size: 10 }).len(), 1);
        assert!(batch_window(&pdfs, BatchWindow { start: 5, size: 10 }).is_empty());
        assert!(batch_window(&[], BatchWindow::default()).is_empty());
    }

    #[test]
    fn test_list_pdfs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt", "c.pdf"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let pdfs = list_pdfs(dir.path()).unwrap();
        let names: Vec<_> = pdfs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf", "c.pdf"]);
    }

    #[test]
    fn test_list_pdfs_missing_dir_is_an_error() {
        assert!(list_pdfs(Path::new("/nonexistent/input")).is_err());
    }

    #[test]
    fn test_tx_scope_parses_from_config() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            scope: TxScope,
        }
        let parsed: Wrapper = toml::from_str(r#"scope = "per_batch""#).unwrap();
        assert_eq!(parsed.scope, TxScope::PerBatch);
        assert_eq!(TxScope::default(), TxScope::PerPaper);
    }
}
