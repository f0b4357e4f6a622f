use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::AgentError;

pub const NO_RESULT_MESSAGE: &str = "No relevant information was found in the knowledge base.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub source: String,
    pub text: String,
    pub score: f32,
}

/// Ranked retrieval over industry documents.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<Passage>, AgentError>;
}

/// Formats knowledge base results for the controller's history. Never
/// fails: low scores and collaborator errors become explanatory text.
#[derive(Clone)]
pub struct KnowledgeGateway {
    base: Arc<dyn KnowledgeBase>,
    top_k: usize,
    min_score: f32,
}

impl KnowledgeGateway {
    pub fn new(base: Arc<dyn KnowledgeBase>) -> Self {
        Self {
            base,
            top_k: 3,
            min_score: 0.5,
        }
    }

    pub fn with_limits(mut self, top_k: usize, min_score: f32) -> Self {
        self.top_k = top_k.max(1);
        self.min_score = min_score;
        self
    }

    pub async fn query(&self, text: &str) -> String {
        let passages = match self.base.query(text, self.top_k).await {
            Ok(passages) => passages,
            Err(err) => {
                warn!(target: "controller", ?err, "knowledge base query failed");
                return format!("Knowledge base query failed: {err}");
            }
        };
        let mut relevant: Vec<Passage> = passages
            .into_iter()
            .filter(|passage| passage.score >= self.min_score)
            .collect();
        relevant.sort_by(|a, b| b.score.total_cmp(&a.score));
        relevant.truncate(self.top_k);
        debug!(target: "controller", hits = relevant.len(), "knowledge base answered");
        if relevant.is_empty() {
            return NO_RESULT_MESSAGE.to_string();
        }
        relevant
            .iter()
            .enumerate()
            .map(|(idx, passage)| {
                format!(
                    "--- reference document {} (source: {}) ---\n{}",
                    idx + 1,
                    passage.source,
                    passage.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<Vec<Passage>, String>);

    #[async_trait]
    impl KnowledgeBase for Fixed {
        async fn query(&self, _text: &str, _top_k: usize) -> Result<Vec<Passage>, AgentError> {
            self.0.clone().map_err(AgentError::knowledge_base)
        }
    }

    fn passage(source: &str, score: f32) -> Passage {
        Passage {
            source: source.into(),
            text: format!("text of {source}"),
            score,
        }
    }

    #[tokio::test]
    async fn keeps_best_passages_above_threshold() {
        let gateway = KnowledgeGateway::new(Arc::new(Fixed(Ok(vec![
            passage("a.md", 0.6),
            passage("b.md", 0.2),
            passage("c.md", 0.9),
            passage("d.md", 0.55),
            passage("e.md", 0.7),
        ]))));
        let text = gateway.query("汽车玻璃").await;
        assert!(text.starts_with("--- reference document 1 (source: c.md) ---\ntext of c.md"));
        assert!(text.contains("--- reference document 3 (source: a.md) ---"));
        assert!(!text.contains("b.md"));
        assert!(!text.contains("d.md"));
    }

    #[tokio::test]
    async fn low_scores_yield_explicit_message() {
        let gateway = KnowledgeGateway::new(Arc::new(Fixed(Ok(vec![passage("a.md", 0.1)]))));
        assert_eq!(gateway.query("x").await, NO_RESULT_MESSAGE);
    }

    #[tokio::test]
    async fn errors_become_text() {
        let gateway = KnowledgeGateway::new(Arc::new(Fixed(Err("index offline".into()))));
        let text = gateway.query("x").await;
        assert!(text.starts_with("Knowledge base query failed:"));
        assert!(text.contains("index offline"));
    }
}
