//! Structured-output extraction over an [`LlmBackend`].
//!
//! Three independent operations: metadata, entities, relationships. Each
//! renders a fixed prompt over truncated paper text, requests a JSON-object
//! reply at low temperature, and parses it. Input is truncated because the
//! model context is bounded and the opening pages carry the highest-value
//! signal.

use std::sync::Arc;

use litgraph_common::{ExtractedEntities, PaperMetadata, Relationship};
use litgraph_llm::{LlmBackend, LlmError, LlmRequest, Message};
use tracing::warn;

/// Character budget for metadata prompts (title/authors/abstract sit early).
const METADATA_CHAR_BUDGET: usize = 8000;
/// Character budget for entity and relationship prompts.
const ENTITY_CHAR_BUDGET: usize = 5000;

const METADATA_TEMPERATURE: f32 = 0.1;
const ENTITY_TEMPERATURE: f32 = 0.2;

pub struct ExtractionAgent {
    backend: Arc<dyn LlmBackend>,
}

impl ExtractionAgent {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// Extract title, authors, year, and abstract from the paper text.
    /// On any failure returns the fixed "Unknown" fallback.
    pub async fn extract_metadata(&self, paper_text: &str) -> PaperMetadata {
        let prompt = format!(
            "You are an expert at extracting metadata from academic papers.\n\
             \n\
             Paper Text (first few pages):\n\
             {text}\n\
             \n\
             Extract the following metadata:\n\
             1. **title**: Full paper title\n\
             2. **authors**: List of author names\n\
             3. **year**: Publication year (integer)\n\
             4. **abstract**: Paper abstract (full text)\n\
             \n\
             Return ONLY valid JSON in this exact format:\n\
             {{\n\
               \"title\": \"Full Paper Title\",\n\
               \"authors\": [\"Author One\", \"Author Two\"],\n\
               \"year\": 2024,\n\
               \"abstract\": \"Full abstract text here...\"\n\
             }}\n\
             \n\
             Do not include explanations, only the JSON object.",
            text = truncate_chars(paper_text, METADATA_CHAR_BUDGET),
        );

        let reply = self
            .complete_json(
                "You are a precise metadata extractor. Return only valid JSON.",
                prompt,
                METADATA_TEMPERATURE,
            )
            .await;

        match reply
            .and_then(|v| serde_json::from_value::<PaperMetadata>(v).map_err(LlmError::from))
        {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(error = %e, "Metadata extraction failed, using fallback");
                PaperMetadata::unknown()
            }
        }
    }

    /// Extract concept/method/dataset/metric mentions from the paper.
    /// On any failure returns all-empty buckets.
    pub async fn extract_entities(&self, paper_text: &str, paper_title: &str) -> ExtractedEntities {
        let prompt = format!(
            "You are an expert at analyzing academic papers.\n\
             \n\
             Paper Title: {title}\n\
             Paper Text: {text}\n\
             \n\
             Extract the following entities from the paper:\n\
             1. **Concepts**: Key ideas or theoretical contributions\n\
             2. **Methods**: Algorithms or technical approaches\n\
             3. **Datasets**: Evaluation datasets\n\
             4. **Metrics**: Performance measurements\n\
             \n\
             Return the entities as JSON with this structure:\n\
             {{\n\
               \"concepts\": [\"concept1\", \"concept2\"],\n\
               \"methods\": [\"method1\", \"method2\"],\n\
               \"datasets\": [\"dataset1\", \"dataset2\"],\n\
               \"metrics\": [\"metric1\", \"metric2\"]\n\
             }}\n\
             \n\
             Do not include explanations, just the JSON.",
            title = paper_title,
            text = truncate_chars(paper_text, ENTITY_CHAR_BUDGET),
        );

        let reply = self
            .complete_json(
                "You are an expert at analyzing academic papers. Return only valid JSON.",
                prompt,
                ENTITY_TEMPERATURE,
            )
            .await;

        match reply
            .and_then(|v| serde_json::from_value::<ExtractedEntities>(v).map_err(LlmError::from))
        {
            Ok(entities) => entities,
            Err(e) => {
                warn!(error = %e, "Entity extraction failed, returning empty buckets");
                ExtractedEntities::default()
            }
        }
    }

    /// Extract directed relationships between the paper and its entities.
    ///
    /// The model is asked for a bare JSON array but sometimes wraps it in an
    /// object under a `relationships` key; both shapes are accepted. Anything
    /// else normalizes to an empty list, as does any call failure.
    pub async fn extract_relationships(
        &self,
        paper_text: &str,
        paper_title: &str,
        entities: &ExtractedEntities,
    ) -> Vec<Relationship> {
        let entities_json = serde_json::to_string_pretty(entities)
            .unwrap_or_else(|_| "{}".to_string());

        let prompt = format!(
            "You are an expert at identifying relationships in academic papers.\n\
             \n\
             Paper Title: {title}\n\
             \n\
             Extracted Entities: {entities}\n\
             \n\
             Paper Text: {text}\n\
             \n\
             Extract the following relationships from the paper:\n\
             1. **introduces**: Paper introduces a concept or method\n\
             2. **improves_on**: A method improves upon another method\n\
             3. **evaluates_on**: A paper evaluates performance on a dataset\n\
             4. **measures_with**: Paper measures results with a metric\n\
             5. **extends**: Work extends or builds upon previous research\n\
             6. **compares_with**: Compares performance with another method\n\
             \n\
             Return the relationships as a JSON array:\n\
             [\n\
               {{\n\
                 \"source\": \"entity_name\",\n\
                 \"relationship\": \"relationship_name\",\n\
                 \"confidence\": 0.95,\n\
                 \"target\": \"entity_name\",\n\
                 \"evidence\": \"very brief explanation from the paper\"\n\
               }}\n\
             ]\n\
             Rules:\n\
             - Source should be the paper title or an entity from the extracted list\n\
             - Target should be an entity from the extracted list\n\
             - Confidence: 0.0 to 1.0 (how confident you are)\n\
             - Evidence: 1-2 sentence quote or explanation\n\
             \n\
             Return only the JSON array, no other text.",
            title = paper_title,
            entities = entities_json,
            text = truncate_chars(paper_text, ENTITY_CHAR_BUDGET),
        );

        let reply = self
            .complete_json(
                "You are a precise relationship extractor. Return only valid JSON.",
                prompt,
                ENTITY_TEMPERATURE,
            )
            .await;

        match reply {
            Ok(value) => parse_relationships(value),
            Err(e) => {
                warn!(error = %e, "Relationship extraction failed, returning none");
                Vec::new()
            }
        }
    }

    async fn complete_json(
        &self,
        system: &str,
        user: String,
        temperature: f32,
    ) -> Result<serde_json::Value, LlmError> {
        let resp = self
            .backend
            .complete(LlmRequest {
                messages: vec![Message::system(system), Message::user(user)],
                model: None,
                max_tokens: None,
                temperature: Some(temperature),
                json_response: true,
            })
            .await?;
        Ok(serde_json::from_str(&resp.content)?)
    }
}

/// Normalize a relationship reply: bare array, or an object wrapping the
/// array under `relationships`. Any other shape yields an empty list.
fn parse_relationships(value: serde_json::Value) -> Vec<Relationship> {
    let array = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut map) => match map.remove("relationships") {
            Some(inner @ serde_json::Value::Array(_)) => inner,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    serde_json::from_value(array).unwrap_or_default()
}

/// Truncate to at most `max_chars` characters on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use litgraph_llm::LlmResponse;

    /// Backend returning a canned reply, recording nothing.
    struct CannedBackend {
        reply: String,
    }

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
            assert!(req.json_response);
            Ok(LlmResponse {
                content: self.reply.clone(),
                model: "mock".to_string(),
                prompt_tokens: 0,
                completion_tokens: 0,
            })
        }

        fn model_id(&self) -> &str { "mock" }
    }

    /// Backend that always fails with an API error.
    struct FailingBackend;

    #[async_trait]
    impl LlmBackend for FailingBackend {
        async fn complete(&self, _req: LlmRequest) -> Result<LlmResponse, LlmError> {
            Err(LlmError::ApiError { status: 500, message: "boom".to_string() })
        }

        fn model_id(&self) -> &str { "failing" }
    }

    fn agent(reply: &str) -> ExtractionAgent {
        ExtractionAgent::new(Arc::new(CannedBackend { reply: reply.to_string() }))
    }

    #[tokio::test]
    async fn test_extract_metadata() {
        let agent = agent(
            r#"{"title": "X", "authors": ["A", "B"], "year": 2023, "abstract": "..."}"#,
        );
        let meta = agent.extract_metadata("paper text").await;
        assert_eq!(meta.title, "X");
        assert_eq!(meta.authors, vec!["A", "B"]);
        assert_eq!(meta.year, Some(2023));
    }

    #[tokio::test]
    async fn test_extract_metadata_malformed_reply_falls_back() {
        let agent = agent("not json at all");
        let meta = agent.extract_metadata("paper text").await;
        assert_eq!(meta.title, "Unknown");
        assert!(meta.authors.is_empty());
        assert_eq!(meta.year, None);
        assert!(meta.abstract_text.is_empty());
    }

    #[tokio::test]
    async fn test_extract_metadata_backend_error_falls_back() {
        let agent = ExtractionAgent::new(Arc::new(FailingBackend));
        let meta = agent.extract_metadata("paper text").await;
        assert_eq!(meta.title, "Unknown");
    }

    #[tokio::test]
    async fn test_extract_entities_failure_is_empty() {
        let agent = ExtractionAgent::new(Arc::new(FailingBackend));
        let entities = agent.extract_entities("text", "title").await;
        assert!(entities.is_empty());
    }

    #[tokio::test]
    async fn test_extract_relationships_bare_array() {
        let agent = agent(
            r#"[{"source": "X", "relationship": "introduces", "confidence": 0.9,
                 "target": "Foo", "evidence": "Section 3"}]"#,
        );
        let rels = agent
            .extract_relationships("text", "X", &ExtractedEntities::default())
            .await;
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].relationship, "introduces");
        assert_eq!(rels[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn test_extract_relationships_wrapped_object() {
        let agent = agent(
            r#"{"relationships": [{"source": "X", "relationship": "extends", "target": "Y"}]}"#,
        );
        let rels = agent
            .extract_relationships("text", "X", &ExtractedEntities::default())
            .await;
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].target, "Y");
        assert_eq!(rels[0].confidence, 1.0); // serde default
    }

    #[tokio::test]
    async fn test_extract_relationships_unexpected_shape_is_empty() {
        let agent = agent(r#"{"answer": 42}"#);
        let rels = agent
            .extract_relationships("text", "X", &ExtractedEntities::default())
            .await;
        assert!(rels.is_empty());
    }

    #[test]
    fn test_truncate_chars_ascii() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        // must cut on a char boundary, not a byte offset
        let s = "αβγδ";
        assert_eq!(truncate_chars(s, 2), "αβ");
    }
}
