//! Graph store - database access layer.
//!
//! All writes go through a [`GraphTx`]: a transaction that commits on
//! [`GraphTx::commit`] and rolls back when dropped, so a failure partway
//! through a paper's insert sequence discards only that paper's writes
//! (provided the caller scopes one transaction per paper).
//!
//! Node deduplication is a read-then-write on a caller-chosen unique key;
//! this is race-free only because the ingestion pipeline is strictly
//! sequential. Edge deduplication relies on the database uniqueness
//! constraint over (type, source, target).

use anyhow::{Context, Result};
use litgraph_common::entities::{EDGE_TYPE_AUTHORED_BY, NODE_TYPE_AUTHOR, NODE_TYPE_PAPER};
use litgraph_common::PaperMetadata;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::warn;

/// Handle on the graph database. Cheap to clone; holds the pool.
#[derive(Clone)]
pub struct GraphStore {
    pool: PgPool,
}

impl GraphStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to PostgreSQL and build the pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open a write transaction.
    pub async fn begin(&self) -> Result<GraphTx> {
        let tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Ok(GraphTx { tx })
    }
}

/// Ids returned by [`GraphTx::insert_paper`]: the legacy row id and the
/// graph node id.
#[derive(Debug, Clone, Copy)]
pub struct PaperIds {
    pub paper_id: i64,
    pub node_id: i64,
}

/// A scoped write transaction over the graph schema.
pub struct GraphTx {
    tx: Transaction<'static, Postgres>,
}

impl GraphTx {
    /// Commit all writes made through this transaction.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Transaction commit failed")
    }

    // ── Type registry ────────────────────────────────────────────────────────

    /// Resolve a node type name to its registry id, registering it on miss.
    pub async fn node_type_id(&mut self, type_name: &str) -> Result<i32> {
        self.registry_id("node_types", type_name).await
    }

    /// Resolve an edge type name to its registry id, registering it on miss.
    pub async fn edge_type_id(&mut self, type_name: &str) -> Result<i32> {
        self.registry_id("edge_types", type_name).await
    }

    async fn registry_id(&mut self, table: &'static str, type_name: &str) -> Result<i32> {
        let existing: Option<i32> =
            sqlx::query_scalar(&format!("SELECT id FROM {table} WHERE type_name = $1"))
                .bind(type_name)
                .fetch_optional(&mut *self.tx)
                .await
                .with_context(|| format!("{table} lookup failed"))?;
        if let Some(id) = existing {
            return Ok(id);
        }

        // Register on miss; the conflict arm covers a concurrent writer in
        // another process, recovered by re-selecting.
        let inserted: Option<i32> = sqlx::query_scalar(&format!(
            "INSERT INTO {table} (type_name) VALUES ($1) \
             ON CONFLICT (type_name) DO NOTHING RETURNING id"
        ))
        .bind(type_name)
        .fetch_optional(&mut *self.tx)
        .await
        .with_context(|| format!("{table} insert failed"))?;

        match inserted {
            Some(id) => Ok(id),
            None => sqlx::query_scalar(&format!("SELECT id FROM {table} WHERE type_name = $1"))
                .bind(type_name)
                .fetch_one(&mut *self.tx)
                .await
                .with_context(|| format!("{table} reselect failed")),
        }
    }

    // ── Nodes ────────────────────────────────────────────────────────────────

    /// Unconditional node insert. Returns the new node id.
    pub async fn create_node(
        &mut self,
        node_type: &str,
        properties: &serde_json::Value,
    ) -> Result<i64> {
        let type_id = self.node_type_id(node_type).await?;
        sqlx::query_scalar(
            "INSERT INTO nodes (node_type_id, properties) VALUES ($1, $2) RETURNING id",
        )
        .bind(type_id)
        .bind(properties)
        .fetch_one(&mut *self.tx)
        .await
        .context("node insert failed")
    }

    /// Exact-match lookup on one property key within a type.
    pub async fn find_node_by_property(
        &mut self,
        node_type: &str,
        property_key: &str,
        property_value: &str,
    ) -> Result<Option<i64>> {
        let type_id = self.node_type_id(node_type).await?;
        sqlx::query_scalar(
            "SELECT id FROM nodes \
             WHERE node_type_id = $1 AND properties->>$2 = $3 \
             LIMIT 1",
        )
        .bind(type_id)
        .bind(property_key)
        .bind(property_value)
        .fetch_optional(&mut *self.tx)
        .await
        .context("node lookup failed")
    }

    /// Return the existing node whose `unique_key` property matches, or
    /// create a new one. If the property is absent (or not a string) the
    /// lookup is skipped and a node is created unconditionally.
    pub async fn get_or_create_node(
        &mut self,
        node_type: &str,
        properties: &serde_json::Value,
        unique_key: &str,
    ) -> Result<i64> {
        if let Some(unique_val) = properties.get(unique_key).and_then(|v| v.as_str()) {
            let unique_val = unique_val.to_owned();
            if let Some(existing) = self
                .find_node_by_property(node_type, unique_key, &unique_val)
                .await?
            {
                return Ok(existing);
            }
        }
        self.create_node(node_type, properties).await
    }

    // ── Edges ────────────────────────────────────────────────────────────────

    /// Create an edge between two nodes. Returns the new edge id, or `None`
    /// when an edge of this type already exists for the (source, target)
    /// pair or when the insert fails (failures are logged, not propagated).
    pub async fn create_edge(
        &mut self,
        edge_type: &str,
        source_node_id: i64,
        target_node_id: i64,
        properties: &serde_json::Value,
        confidence: f32,
    ) -> Option<i64> {
        match self
            .try_create_edge(edge_type, source_node_id, target_node_id, properties, confidence)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    edge_type,
                    source_node_id,
                    target_node_id,
                    error = %e,
                    "Edge insert failed"
                );
                None
            }
        }
    }

    async fn try_create_edge(
        &mut self,
        edge_type: &str,
        source_node_id: i64,
        target_node_id: i64,
        properties: &serde_json::Value,
        confidence: f32,
    ) -> Result<Option<i64>> {
        let type_id = self.edge_type_id(edge_type).await?;
        sqlx::query_scalar(
            r#"
            INSERT INTO edges
                (edge_type_id, source_node_id, target_node_id, properties, confidence)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (edge_type_id, source_node_id, target_node_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(type_id)
        .bind(source_node_id)
        .bind(target_node_id)
        .bind(properties)
        .bind(confidence)
        .fetch_optional(&mut *self.tx)
        .await
        .context("edge insert failed")
    }

    // ── Papers ───────────────────────────────────────────────────────────────

    /// Insert a paper and its authors: Paper node (unique by title), legacy
    /// paper row (title conflict updates year/abstract), and per author in
    /// order an Author node, a legacy author row, an ordered authorship join
    /// row, and an `authored_by` edge from paper to author.
    pub async fn insert_paper(&mut self, metadata: &PaperMetadata) -> Result<PaperIds> {
        let node_props = serde_json::json!({
            "title": metadata.title,
            "year": metadata.year,
            "abstract": metadata.abstract_text,
        });
        let paper_node_id = self
            .get_or_create_node(NODE_TYPE_PAPER, &node_props, "title")
            .await?;

        let paper_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO papers (node_id, title, year, abstract)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (title) DO UPDATE
            SET year = EXCLUDED.year,
                abstract = EXCLUDED.abstract
            RETURNING id
            "#,
        )
        .bind(paper_node_id)
        .bind(&metadata.title)
        .bind(metadata.year)
        .bind(&metadata.abstract_text)
        .fetch_one(&mut *self.tx)
        .await
        .context("paper upsert failed")?;

        for (idx, author_name) in metadata.authors.iter().enumerate() {
            let author_node_id = self
                .get_or_create_node(
                    NODE_TYPE_AUTHOR,
                    &serde_json::json!({"name": author_name}),
                    "name",
                )
                .await?;

            // Conflict on name is a no-op; recover the id with a re-select.
            let inserted: Option<i64> = sqlx::query_scalar(
                "INSERT INTO authors (node_id, name) VALUES ($1, $2) \
                 ON CONFLICT (name) DO NOTHING RETURNING id",
            )
            .bind(author_node_id)
            .bind(author_name)
            .fetch_optional(&mut *self.tx)
            .await
            .context("author insert failed")?;
            let author_id: i64 = match inserted {
                Some(id) => id,
                None => sqlx::query_scalar("SELECT id FROM authors WHERE name = $1")
                    .bind(author_name)
                    .fetch_one(&mut *self.tx)
                    .await
                    .context("author reselect failed")?,
            };

            sqlx::query(
                "INSERT INTO paper_authors (paper_id, author_id, author_order) \
                 VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(paper_id)
            .bind(author_id)
            .bind(idx as i32)
            .execute(&mut *self.tx)
            .await
            .context("authorship insert failed")?;

            // duplicate authorship edges are silent no-ops
            let _ = self
                .create_edge(
                    EDGE_TYPE_AUTHORED_BY,
                    paper_node_id,
                    author_node_id,
                    &serde_json::json!({}),
                    1.0,
                )
                .await;
        }

        Ok(PaperIds { paper_id, node_id: paper_node_id })
    }
}
