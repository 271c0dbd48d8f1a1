//! litgraph-common — Shared types and errors used across all litgraph crates.

pub mod error;
pub mod entities;

pub use entities::{EntityCategory, ExtractedEntities, PaperMetadata, Relationship};
pub use error::{LitgraphError, Result};
