//! Prompt construction for grounded question answering.

use unicode_segmentation::UnicodeSegmentation;

use docqa_core::RankedResult;

/// Builds the grounded answer prompt from retrieved context.
///
/// Context blocks are added in rank order, so truncation drops the
/// weakest sources first.
#[derive(Debug, Clone)]
pub struct AnswerPromptBuilder {
    question: String,
    language: Option<String>,
    context_blocks: Vec<String>,
}

impl AnswerPromptBuilder {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            language: None,
            context_blocks: Vec::new(),
        }
    }

    /// Ask for the answer in a specific language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Add one retrieved result as a context block.
    pub fn with_result(mut self, result: &RankedResult) -> Self {
        let source = result.source().unwrap_or("unknown");
        self.context_blocks.push(format!(
            "Source: {}\nSimilarity Score: {:.4}\nContent: {}",
            source,
            result.similarity(),
            result.content
        ));
        self
    }

    pub fn with_results<'a>(mut self, results: impl IntoIterator<Item = &'a RankedResult>) -> Self {
        for result in results {
            self = self.with_result(result);
        }
        self
    }

    /// Render the full prompt.
    pub fn build(&self) -> String {
        let language_line = match &self.language {
            Some(language) => format!("- Answer in {}\n", language),
            None => String::new(),
        };

        format!(
            "**INSTRUCTIONS:**\n\
             - Answer concisely using ONLY the context below\n\
             - Cite sources using [Source: filename] notation\n\
             - If unsure, say \"I couldn't find definitive information\"\n\
             {language_line}\n\
             **QUESTION:** {question}\n\n\
             **CONTEXT:**\n\
             {context}\n\n\
             **ANSWER:**",
            language_line = language_line,
            question = self.question,
            context = self.context_blocks.join("\n\n"),
        )
    }

    /// Render the prompt, dropping trailing context blocks until it fits
    /// within `max_chars` graphemes.
    pub fn build_with_limit(&self, max_chars: usize) -> String {
        let mut trimmed = self.clone();
        loop {
            let rendered = trimmed.build();
            if rendered.graphemes(true).count() <= max_chars || trimmed.context_blocks.is_empty() {
                return rendered;
            }
            trimmed.context_blocks.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use docqa_core::{Metadata, Representation};

    use super::*;

    fn result(source: &str, similarity: f32, content: &str) -> RankedResult {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), source.into());
        metadata.insert("similarity".to_string(), similarity.into());
        RankedResult {
            content: content.to_string(),
            score: similarity,
            representation: Representation::Dense,
            metadata,
        }
    }

    #[test]
    fn test_build_contains_sections() {
        let prompt = AnswerPromptBuilder::new("What is the refund policy?")
            .with_result(&result("policy.txt", 0.91, "Refunds are issued within 30 days."))
            .build();

        assert!(prompt.contains("**INSTRUCTIONS:**"));
        assert!(prompt.contains("**QUESTION:** What is the refund policy?"));
        assert!(prompt.contains("**CONTEXT:**"));
        assert!(prompt.contains("Source: policy.txt"));
        assert!(prompt.contains("Similarity Score: 0.9100"));
        assert!(prompt.contains("Refunds are issued within 30 days."));
        assert!(prompt.ends_with("**ANSWER:**"));
    }

    #[test]
    fn test_language_instruction() {
        let without = AnswerPromptBuilder::new("q").build();
        assert!(!without.contains("- Answer in"));

        let with = AnswerPromptBuilder::new("q").with_language("French").build();
        assert!(with.contains("- Answer in French"));
    }

    #[test]
    fn test_blocks_joined_in_order() {
        let prompt = AnswerPromptBuilder::new("q")
            .with_result(&result("a.txt", 0.9, "first block"))
            .with_result(&result("b.txt", 0.8, "second block"))
            .build();

        let first = prompt.find("first block").expect("Should contain first");
        let second = prompt.find("second block").expect("Should contain second");
        assert!(first < second);
    }

    #[test]
    fn test_build_with_limit_drops_weakest_blocks() {
        let long = "x".repeat(400);
        let builder = AnswerPromptBuilder::new("q")
            .with_result(&result("a.txt", 0.9, &long))
            .with_result(&result("b.txt", 0.8, &long))
            .with_result(&result("c.txt", 0.7, &long));

        let full = builder.build();
        let limited = builder.build_with_limit(700);

        assert!(full.graphemes(true).count() > 700);
        assert!(limited.graphemes(true).count() <= 700);
        assert!(limited.contains("a.txt"));
        assert!(!limited.contains("c.txt"));
    }

    #[test]
    fn test_build_with_limit_keeps_small_prompt() {
        let builder = AnswerPromptBuilder::new("q").with_result(&result("a.txt", 0.9, "short"));
        assert_eq!(builder.build(), builder.build_with_limit(10_000));
    }
}
