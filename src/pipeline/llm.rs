//! Model interaction: build message lists and call the provider.
//!
//! This module is intentionally thin: all prompt wording lives in
//! [`crate::prompts`] and all reply decoding in [`super::decode`].
//!
//! Calls are single-attempt. A failed or timed-out call becomes a
//! [`SourceError`] for the input being processed and the run moves on.

use crate::catalog::{ChatMessage, ChatRole};
use crate::error::SourceError;
use edgequake_llm::{ChatMessage as LlmMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Provider error details are cut to this many characters in failure reports.
const MAX_ERROR_DETAIL: usize = 100;

/// Sampling settings shared by every call.
#[derive(Debug, Clone, Copy)]
pub struct CallSettings {
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

/// System prompt plus one user turn carrying every page image.
pub fn document_messages(system_prompt: &str, instruction: &str, pages: Vec<ImageData>) -> Vec<LlmMessage> {
    vec![
        LlmMessage::system(system_prompt),
        LlmMessage::user_with_images(instruction, pages),
    ]
}

/// System prompt plus one plain-text user turn.
pub fn text_messages(system_prompt: Option<&str>, user_text: &str) -> Vec<LlmMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt {
        messages.push(LlmMessage::system(system));
    }
    messages.push(LlmMessage::user(user_text));
    messages
}

/// System prompt, prior turns, then the new user message.
pub fn chat_messages(system_prompt: &str, history: &[ChatMessage], message: &str) -> Vec<LlmMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(LlmMessage::system(system_prompt));
    messages.extend(history.iter().map(|turn| match turn.role {
        ChatRole::User => LlmMessage::user(turn.text.as_str()),
        ChatRole::Model => LlmMessage::assistant(turn.text.as_str()),
    }));
    messages.push(LlmMessage::user(message));
    messages
}

/// Make one provider call and return the reply text.
///
/// `label` names the input in log lines.
pub async fn complete(
    provider: &Arc<dyn LLMProvider>,
    messages: &[LlmMessage],
    settings: CallSettings,
    label: &str,
) -> Result<String, SourceError> {
    let start = Instant::now();
    let options = build_options(settings);

    let call = provider.chat(messages, Some(&options));
    let response = tokio::time::timeout(Duration::from_secs(settings.timeout_secs), call)
        .await
        .map_err(|_| SourceError::Timeout {
            secs: settings.timeout_secs,
        })?
        .map_err(|e| SourceError::RequestFailed {
            detail: truncate_detail(&e.to_string()),
        })?;

    debug!(
        "{}: {} input tokens, {} output tokens, {:?}",
        label,
        response.prompt_tokens,
        response.completion_tokens,
        start.elapsed()
    );
    Ok(response.content)
}

fn build_options(settings: CallSettings) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(settings.temperature),
        max_tokens: Some(settings.max_tokens),
        ..Default::default()
    }
}

fn truncate_detail(detail: &str) -> String {
    match detail.char_indices().nth(MAX_ERROR_DETAIL) {
        Some((idx, _)) => format!("{}...", &detail[..idx]),
        None => detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CallSettings {
        CallSettings {
            temperature: 0.1,
            max_tokens: 16384,
            timeout_secs: 300,
        }
    }

    #[test]
    fn build_options_carries_settings() {
        let opts = build_options(settings());
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(16384));
    }

    #[test]
    fn chat_messages_order() {
        let history = vec![ChatMessage::user("Which pumps?"), ChatMessage::model("P100 and P200.")];
        let messages = chat_messages("system", &history, "Cheapest?");
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn text_messages_without_system_prompt() {
        assert_eq!(text_messages(None, "hi").len(), 1);
        assert_eq!(text_messages(Some("sys"), "hi").len(), 2);
    }

    #[test]
    fn long_error_details_are_truncated() {
        let long = "x".repeat(500);
        let cut = truncate_detail(&long);
        assert_eq!(cut.len(), MAX_ERROR_DETAIL + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_detail("short"), "short");
    }
}
