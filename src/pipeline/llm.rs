//! VLM interaction: build a vision request and call the provider.
//!
//! Both model-backed stages (OCR and classification) go through
//! [`ask_vision_model`]. It is intentionally thin: prompt wording lives in
//! [`crate::prompts`] and reply parsing lives with each stage.
//!
//! There is no retry loop and no per-call timeout here. A failed call is
//! reported to the stage, which degrades instead of failing the request.

use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Sampling settings shared by the vision backends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionSettings {
    /// Sampling temperature. Default: 0.0 (recognition wants determinism).
    pub temperature: f32,
    /// Upper bound on reply tokens. Default: 1024.
    pub max_tokens: usize,
    /// Longest image side sent to the model, in pixels. Default: 1600.
    pub max_image_dimension: u32,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 1024,
            max_image_dimension: 1600,
        }
    }
}

/// Raw reply plus call latency. Token counts are logged, not returned.
#[derive(Debug, Clone)]
pub struct VisionReply {
    pub content: String,
    pub duration_ms: u64,
}

/// Send one image with a system prompt and an instruction.
///
/// ## Message Layout
///
/// 1. **System message** — the stage prompt (output format and rules)
/// 2. **User message** — the instruction text with the image attached
pub async fn ask_vision_model(
    provider: &Arc<dyn LLMProvider>,
    system_prompt: &str,
    instruction: &str,
    image_data: ImageData,
    settings: &VisionSettings,
) -> Result<VisionReply, String> {
    let start = Instant::now();

    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user_with_images(instruction, vec![image_data]),
    ];
    let options = build_options(settings);

    let response = provider
        .chat(&messages, Some(&options))
        .await
        .map_err(|e| format!("{}", e))?;

    let duration = start.elapsed();
    debug!(
        "Vision call: {} input tokens, {} output tokens, {:?}",
        response.prompt_tokens,
        response.completion_tokens,
        duration
    );

    Ok(VisionReply {
        content: response.content,
        duration_ms: duration.as_millis() as u64,
    })
}

fn build_options(settings: &VisionSettings) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(settings.temperature),
        max_tokens: Some(settings.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&VisionSettings::default());
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(1024));
    }
}
