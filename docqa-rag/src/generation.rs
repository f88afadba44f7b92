//! Generation backend trait and response parsing.
//!
//! A [`GenerationBackend`] performs exactly one remote call and returns the
//! raw JSON reply. Interpreting that reply is isolated in
//! [`parse_completion`], so a change in the provider's response shape only
//! touches one function.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GenerationError;

/// Parameters of one text-generation call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    /// The full prompt, already validated and truncated.
    pub prompt: String,
    /// Maximum number of tokens to generate.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// A remote text-generation capability.
///
/// Implementations must not retry; retries, timeouts and parsing belong to
/// [`ResilientGenerationClient`](crate::resilient::ResilientGenerationClient).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Perform one call and return the raw response body.
    ///
    /// # Errors
    ///
    /// [`GenerationError::RateLimited`] for HTTP 429,
    /// [`GenerationError::Http`] for other non-success statuses,
    /// [`GenerationError::Transport`] when no response arrived and
    /// [`GenerationError::MalformedResponse`] when the body is not JSON.
    async fn complete(&self, request: &GenerationRequest) -> Result<Value, GenerationError>;
}

/// Outcome of interpreting a backend reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCompletion {
    /// The generated text.
    Parsed(String),
    /// The reply did not have the expected shape.
    ParseFailure(String),
}

/// Extract the generated text from an OpenAI-compatible completion reply.
///
/// Accepts `choices[0].message.content` (chat) and `choices[0].text`
/// (legacy completions). Any other shape, or a non-string content, is a
/// [`ParsedCompletion::ParseFailure`].
pub fn parse_completion(body: &Value) -> ParsedCompletion {
    let Some(choices) = body.get("choices") else {
        let reason = match body.pointer("/error/message").and_then(Value::as_str) {
            Some(message) => format!("error payload: {message}"),
            None => "missing 'choices' field".to_string(),
        };
        return ParsedCompletion::ParseFailure(reason);
    };
    let Some(first) = choices.as_array().and_then(|c| c.first()) else {
        return ParsedCompletion::ParseFailure("'choices' is empty or not an array".to_string());
    };

    let content = first
        .pointer("/message/content")
        .or_else(|| first.get("text"))
        .and_then(Value::as_str);

    match content {
        Some(text) => ParsedCompletion::Parsed(text.to_string()),
        None => ParsedCompletion::ParseFailure("first choice has no text content".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_chat_completion() {
        let body = json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Beta." } }]
        });
        assert_eq!(parse_completion(&body), ParsedCompletion::Parsed("Beta.".into()));
    }

    #[test]
    fn parses_legacy_completion() {
        let body = json!({ "choices": [{ "text": "Beta." }] });
        assert_eq!(parse_completion(&body), ParsedCompletion::Parsed("Beta.".into()));
    }

    #[test]
    fn reports_shape_deviations() {
        let cases = [
            json!({}),
            json!({ "choices": [] }),
            json!({ "choices": "oops" }),
            json!({ "choices": [{ "message": { "content": null } }] }),
            json!({ "choices": [{ "message": { "content": 42 } }] }),
        ];
        for body in cases {
            assert!(
                matches!(parse_completion(&body), ParsedCompletion::ParseFailure(_)),
                "expected parse failure for {body}"
            );
        }
    }

    #[test]
    fn surfaces_provider_error_message() {
        let body = json!({ "error": { "message": "model overloaded" } });
        assert_eq!(
            parse_completion(&body),
            ParsedCompletion::ParseFailure("error payload: model overloaded".into())
        );
    }
}
