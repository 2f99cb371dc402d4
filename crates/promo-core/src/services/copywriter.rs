use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::runtime::params::MarketingParams;
use crate::runtime::types::MarketingCopy;
use crate::services::{ContentGenerator, GenerationError, TextModel};

const TWITTER_CONSTRAINT: &str = "Ensure the full content is below 270 characters to be \
     compatible with Twitter while remaining engaging for other platforms.";
const DEFAULT_CONSTRAINT: &str = "Ensure content is engaging and effective.";

/// Constraint applied when a single, known platform other than Twitter is targeted.
fn single_platform_constraint(platform: &str) -> Option<&'static str> {
    match platform {
        "LinkedIn" => Some("Content should be professional and detailed (up to 125 words)."),
        "Instagram" => Some("Make the content engaging."),
        "Facebook" => Some("Create balanced content suitable for a broad audience."),
        _ => None,
    }
}

/// Pick the length/tone constraint for a set of target platforms.
///
/// Twitter anywhere in the list wins, since its limit binds every platform.
pub fn platform_constraint(platforms: &[&str]) -> &'static str {
    if platforms.contains(&"Twitter") {
        return TWITTER_CONSTRAINT;
    }
    match platforms {
        [only] => single_platform_constraint(only).unwrap_or(DEFAULT_CONSTRAINT),
        _ => DEFAULT_CONSTRAINT,
    }
}

/// Build the copywriting prompt sent to the text model.
pub fn build_prompt(params: &MarketingParams) -> String {
    let platforms = params.platform.names();
    let constraint = platform_constraint(&platforms);
    format!(
        "You are an expert in generating marketing content. Create unique marketing content \
based on the details below:
- Prompt: {prompt}
- Target Platform(s): {platforms}
- Product/Service: {product}

Platform-Specific Constraint: {constraint}

Content Requirements:
- Title: Short and engaging
- Punchline: Attention-grabbing one-liner
- Platform-optimized content: Must be 270 characters or less if Twitter is a target platform
- 5 relevant hashtags
- 5 important keywords

Instructions:
- Use plain text only (no special characters like *, _, or markdown symbols).
- Return the response in JSON format with the keys: \"Title\", \"Punchline\", \"Content\", \"Hashtags\", \"Keywords\".",
        prompt = params.prompt,
        platforms = platforms.join(", "),
        product = params.product,
    )
}

/// Remove a surrounding fenced code block, if the model added one.
fn strip_code_fence(reply: &str) -> &str {
    let reply = reply.trim();
    let Some(rest) = reply.strip_prefix("```") else {
        return reply;
    };
    // Drop an info string such as `json` on the opening fence.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a model reply into [`MarketingCopy`].
pub fn parse_copy(reply: &str) -> Result<MarketingCopy, GenerationError> {
    serde_json::from_str(strip_code_fence(reply))
        .map_err(|e| GenerationError::InvalidResponse(format!("marketing copy is not valid JSON: {e}")))
}

/// [`ContentGenerator`] that prompts a [`TextModel`] for JSON marketing copy.
#[derive(Clone)]
pub struct Copywriter {
    model: Arc<dyn TextModel>,
}

impl Copywriter {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ContentGenerator for Copywriter {
    #[instrument(skip_all, fields(product = %params.product))]
    async fn generate_copy(
        &self,
        params: &MarketingParams,
    ) -> Result<MarketingCopy, GenerationError> {
        let reply = self.model.complete(&build_prompt(params)).await?;
        let copy = parse_copy(&reply)?;
        debug!(title = %copy.title, hashtags = copy.hashtags.len(), "marketing copy parsed");
        Ok(copy)
    }
}
