//! litgraph-llm — LLM backend abstraction layer.
//! Chat-completion plumbing used by the extraction agent.

pub mod backend;

pub use backend::{LlmBackend, LlmError, LlmRequest, LlmResponse, Message};
