//! External generation collaborators.
//!
//! The orchestrator only sees the [`ContentGenerator`] and [`ImageGenerator`]
//! traits. The concrete implementations here talk to a hosted language model
//! ([`gemini`]) and a hosted image-inference endpoint ([`imaging`]).

pub mod copywriter;
pub mod gemini;
pub mod imaging;
pub mod logo;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::runtime::params::MarketingParams;
use crate::runtime::retry::Transient;
use crate::runtime::types::MarketingCopy;

pub use copywriter::Copywriter;
pub use gemini::GeminiClient;
pub use imaging::{HostedImageGenerator, ImageEndpoint};
pub use logo::LogoPlacement;

/// Errors raised by generation collaborators.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The upstream answered 503/429; worth retrying.
    #[error("upstream temporarily unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    /// Connection, timeout or other transport failure; worth retrying.
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// The upstream rejected the call.
    #[error("upstream rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The upstream answered 2xx with something unusable.
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    /// Decoding, compositing or encoding an image failed.
    #[error("image processing failed: {0}")]
    Image(String),

    /// The collaborator is missing required configuration.
    #[error("generation backend not configured: {0}")]
    NotConfigured(&'static str),
}

impl Transient for GenerationError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::Unavailable { .. } | GenerationError::Transport(_)
        )
    }
}

impl GenerationError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 | 503 => GenerationError::Unavailable { status, message },
            _ => GenerationError::Rejected { status, message },
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GenerationError::InvalidResponse(e.to_string())
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

impl From<image::ImageError> for GenerationError {
    fn from(e: image::ImageError) -> Self {
        GenerationError::Image(e.to_string())
    }
}

/// A hosted text-completion model.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Turns request parameters into marketing copy.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_copy(&self, params: &MarketingParams)
    -> Result<MarketingCopy, GenerationError>;
}

/// Produces the final composited marketing image (JPEG bytes).
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(
        &self,
        copy: &MarketingCopy,
        img_prompt: &str,
        logo: &str,
    ) -> Result<Bytes, GenerationError>;
}
