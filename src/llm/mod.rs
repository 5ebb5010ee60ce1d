//! Generative API integration for article-forge.
//!
//! The worker only needs one operation from the model: turn a prompt into
//! text. [`TextGenerator`] is that seam; [`GeminiClient`] implements it over
//! the Gemini REST API and reports failures already classified into
//! credential, quota and transient errors (see [`classify`]).
//!
//! ```ignore
//! use article_forge::llm::{GeminiClient, TextGenerator};
//! use article_forge::credentials::Credential;
//! use std::time::Duration;
//!
//! let client = GeminiClient::new(Credential::new(key), "gemini-2.5-flash", Duration::from_secs(300))?;
//! let text = client.generate("Write a haiku about queues").await?;
//! ```

pub mod classify;
pub mod gemini;

use async_trait::async_trait;

use crate::error::GenerationError;

pub use classify::{classify_api_error, classify_message, parse_retry_delay};
pub use gemini::GeminiClient;

/// Trait for models that can turn a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for the given prompt.
    ///
    /// An empty string is a valid return value; callers decide what an
    /// empty answer means.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
