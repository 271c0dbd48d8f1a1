//! litgraph-graph — Property-graph persistence over PostgreSQL.
//!
//! Typed nodes and confidence-scored edges in a conventional relational
//! schema, plus the denormalized legacy papers/authors mirror. Writes happen
//! inside a scoped transaction ([`store::GraphTx`]): commit on clean exit,
//! rollback on drop.

pub mod store;

pub use store::{GraphStore, GraphTx, PaperIds};
