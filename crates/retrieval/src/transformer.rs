//! Query expansion and decomposition through the generative model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use docqa_core::{GenerationRequest, GenerativeModel};

/// Variant counts and sampling for [`QueryTransformer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerConfig {
    /// Sampling temperature for transform prompts; kept above the answer
    /// temperature so rewrites actually vary
    pub temperature: f32,
    pub max_expansions: usize,
    pub max_sub_questions: usize,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_expansions: 3,
            max_sub_questions: 4,
        }
    }
}

/// Rewrites a query into alternative phrasings and sub-questions.
///
/// Transformation is best-effort: any model failure or unparseable
/// response falls back to the original query so retrieval never dies
/// on a rewrite.
pub struct QueryTransformer {
    model: Arc<dyn GenerativeModel>,
    config: TransformerConfig,
}

impl QueryTransformer {
    pub fn new(model: Arc<dyn GenerativeModel>, config: TransformerConfig) -> Self {
        Self { model, config }
    }

    /// Alternative phrasings of the query, at most `max_expansions`.
    pub async fn expand(&self, query: &str) -> Vec<String> {
        let prompt = format!(
            "Generate {} different versions of this question to improve document \
             retrieval. Return ONLY a JSON array of strings.\n\n\
             Question: {query}\n\nJSON array:",
            self.config.max_expansions
        );
        self.transform(query, &prompt, self.config.max_expansions).await
    }

    /// Standalone sub-questions of a complex query, at most
    /// `max_sub_questions`.
    pub async fn decompose(&self, query: &str) -> Vec<String> {
        let prompt = format!(
            "Break this complex question into 2-{} standalone sub-questions that \
             can be answered independently. Return ONLY a JSON array of strings.\n\n\
             Question: {query}\n\nJSON array:",
            self.config.max_sub_questions
        );
        self.transform(query, &prompt, self.config.max_sub_questions).await
    }

    async fn transform(&self, query: &str, prompt: &str, cap: usize) -> Vec<String> {
        let request = GenerationRequest::new(prompt).with_temperature(self.config.temperature);
        let response = match self.model.complete(&request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "query transform failed, using original query");
                return vec![query.to_string()];
            }
        };

        match serde_json::from_str::<Vec<String>>(response.trim()) {
            Ok(mut variants) => {
                variants.truncate(cap);
                if variants.is_empty() {
                    vec![query.to_string()]
                } else {
                    variants
                }
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "transform response was not a JSON array, using original query"
                );
                vec![query.to_string()]
            }
        }
    }
}
