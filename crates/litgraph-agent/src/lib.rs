//! litgraph-agent — LLM-driven extraction of paper metadata, entities, and
//! relationships. Every operation is fail-soft: a malformed model reply
//! degrades that paper's data richness but never aborts the batch.

pub mod extraction;

pub use extraction::ExtractionAgent;
