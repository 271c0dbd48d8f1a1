//! litgraph-ingestion — Batch ingestion of academic PDF papers.
//! - PDF text extraction (first N pages, fail-soft)
//! - LLM metadata/entity/relationship extraction via litgraph-agent
//! - Graph and legacy-table persistence via litgraph-graph
//! - Batch-window orchestration over a sorted input listing

pub mod config;
pub mod pdf;
pub mod pipeline;
