/// Domain value types exchanged between the extraction agent and the graph
/// store. These are Rust representations of the LLM response contracts.

use serde::{Deserialize, Serialize};

/// Node type name for papers in the `node_types` registry.
pub const NODE_TYPE_PAPER: &str = "Paper";
/// Node type name for authors.
pub const NODE_TYPE_AUTHOR: &str = "Author";
/// Edge type linking a paper to each of its authors.
pub const EDGE_TYPE_AUTHORED_BY: &str = "authored_by";

// ---------------------------------------------------------------------------
// Paper metadata
// ---------------------------------------------------------------------------

/// Bibliographic metadata extracted from the opening pages of a paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
}

impl PaperMetadata {
    /// Fallback value when metadata extraction fails. The paper is still
    /// ingested under this placeholder rather than aborting the batch.
    pub fn unknown() -> Self {
        Self {
            title: "Unknown".to_string(),
            authors: Vec::new(),
            year: None,
            abstract_text: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Extracted entities
// ---------------------------------------------------------------------------

/// Entity mentions extracted from one paper, bucketed by category.
/// All fields default to empty so a partial LLM reply still parses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedEntities {
    #[serde(default)]
    pub concepts: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub datasets: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
}

impl ExtractedEntities {
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
            && self.methods.is_empty()
            && self.datasets.is_empty()
            && self.metrics.is_empty()
    }

    /// Iterate entity names together with their category.
    pub fn by_category(&self) -> impl Iterator<Item = (EntityCategory, &str)> {
        EntityCategory::ALL.into_iter().flat_map(move |cat| {
            self.names(cat).iter().map(move |n| (cat, n.as_str()))
        })
    }

    fn names(&self, category: EntityCategory) -> &[String] {
        match category {
            EntityCategory::Concept => &self.concepts,
            EntityCategory::Method  => &self.methods,
            EntityCategory::Dataset => &self.datasets,
            EntityCategory::Metric  => &self.metrics,
        }
    }
}

/// Canonical entity category vocabulary.
///
/// One enum for both sides of the contract: `response_key` is the field name
/// in the LLM reply, `node_type` the name in the `node_types` registry. Every
/// call site routes through this enum so the two spellings cannot drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityCategory {
    Concept,
    Method,
    Dataset,
    Metric,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 4] = [
        EntityCategory::Concept,
        EntityCategory::Method,
        EntityCategory::Dataset,
        EntityCategory::Metric,
    ];

    pub fn node_type(&self) -> &'static str {
        match self {
            EntityCategory::Concept => "Concept",
            EntityCategory::Method  => "Method",
            EntityCategory::Dataset => "Dataset",
            EntityCategory::Metric  => "Metric",
        }
    }

    pub fn response_key(&self) -> &'static str {
        match self {
            EntityCategory::Concept => "concepts",
            EntityCategory::Method  => "methods",
            EntityCategory::Dataset => "datasets",
            EntityCategory::Metric  => "metrics",
        }
    }
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

/// A directed relationship between two named entities, as reported by the
/// LLM. Source and target are entity names, resolved to node ids later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub relationship: String,
    pub target: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub evidence: String,
}

fn default_confidence() -> f32 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entities_parse_with_missing_fields() {
        let parsed: ExtractedEntities =
            serde_json::from_str(r#"{"concepts": ["Gaussian Splatting"]}"#).unwrap();
        assert_eq!(parsed.concepts.len(), 1);
        assert!(parsed.methods.is_empty());
        assert!(!parsed.is_empty());
    }

    #[test]
    fn test_by_category_buckets() {
        let entities = ExtractedEntities {
            concepts: vec!["A".to_string()],
            methods: vec![],
            datasets: vec!["B".to_string()],
            metrics: vec!["C".to_string()],
        };
        let pairs: Vec<_> = entities.by_category().collect();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], (EntityCategory::Concept, "A"));
        assert_eq!(pairs[1], (EntityCategory::Dataset, "B"));
        assert_eq!(pairs[2], (EntityCategory::Metric, "C"));
    }

    #[test]
    fn test_relationship_defaults() {
        let rel: Relationship = serde_json::from_str(
            r#"{"source": "X", "relationship": "introduces", "target": "Foo"}"#,
        )
        .unwrap();
        assert_eq!(rel.confidence, 1.0);
        assert!(rel.evidence.is_empty());
    }

    #[test]
    fn test_metadata_abstract_key() {
        let meta: PaperMetadata = serde_json::from_str(
            r#"{"title": "T", "authors": ["A"], "year": 2023, "abstract": "..."}"#,
        )
        .unwrap();
        assert_eq!(meta.abstract_text, "...");
        assert_eq!(meta.year, Some(2023));
    }

    #[test]
    fn test_category_vocabulary_is_consistent() {
        for cat in EntityCategory::ALL {
            // lowercase plural response keys, PascalCase singular node types
            assert!(cat.response_key().ends_with('s'));
            assert!(cat.node_type().chars().next().unwrap().is_uppercase());
        }
    }
}
