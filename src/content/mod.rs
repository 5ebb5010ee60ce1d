//! Article content: prompt construction, response parsing and slugs.

pub mod parse;
pub mod prompt;
pub mod slug;

use std::sync::Arc;

use crate::error::GenerationError;
use crate::llm::TextGenerator;

pub use parse::{fallback_meta_description, parse_response, GenerationResult};
pub use prompt::{build_prompt, sanitize_title};
pub use slug::{slugify, DEFAULT_SLUG};

/// Generates raw article text for a title through one model credential.
pub struct ArticleGenerator {
    llm: Arc<dyn TextGenerator>,
}

impl ArticleGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    /// Requests an article for `title` and returns the trimmed raw output.
    ///
    /// # Errors
    ///
    /// Propagates the classified API error, and returns
    /// `GenerationError::EmptyResponse` when the model answered with nothing.
    pub async fn generate(&self, title: &str) -> Result<String, GenerationError> {
        let prompt = build_prompt(title);
        let raw = self.llm.generate(&prompt).await?;
        let raw = raw.trim();

        if raw.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        Ok(raw.to_string())
    }
}
