//! Gemini `generateContent` client.
//!
//! The API key travels in the `x-goog-api-key` header so request URLs
//! are safe to log. Replies must be JSON (`responseMimeType`), which the
//! classifier parses into a decision.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use scoptics_core::config::LlmConfig;

use crate::llm::{LlmClient, LlmError, LlmRequest};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiClientConfig {
    pub api_key: String,
    /// Base endpoint URL, without a trailing slash.
    pub endpoint: String,
    pub timeout: Duration,
}

impl GeminiClientConfig {
    pub fn from_llm_config(config: &LlmConfig, api_key: String) -> Self {
        Self {
            api_key,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl Default for GeminiClientConfig {
    fn default() -> Self {
        Self::from_llm_config(&LlmConfig::default(), String::new())
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(config: GeminiClientConfig) -> Result<Self, LlmError> {
        let mut key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| LlmError::Http("API key is not a valid header value".to_string()))?;
        key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint,
        })
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, model)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        let url = self.generate_url(&request.model);
        debug!(url = %url, "Calling Gemini");

        let response = self
            .http
            .post(&url)
            .json(&GenerateRequest::from_request(&request))
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        reply_text(&body)
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [TextPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

impl<'a> GenerateRequest<'a> {
    fn from_request(request: &'a LlmRequest) -> Self {
        let system = (!request.system.is_empty()).then(|| Content {
            role: None,
            parts: [TextPart {
                text: &request.system,
            }],
        });
        Self {
            contents: [Content {
                role: Some("user"),
                parts: [TextPart {
                    text: &request.user,
                }],
            }],
            system_instruction: system,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                response_mime_type: "application/json",
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Text of the first candidate, with its parts joined.
fn reply_text(body: &str) -> Result<String, LlmError> {
    let reply: GenerateResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Serialization(e.to_string()))?;

    if let Some(reason) = reply.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::Response(format!("prompt blocked: {}", reason)));
    }
    let Some(candidate) = reply.candidates.into_iter().next() else {
        return Err(LlmError::Response("no candidates in reply".to_string()));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        return Err(LlmError::Response(format!(
            "empty reply (finish reason {})",
            reason
        )));
    }
    Ok(text)
}

/// Error for a non-2xx reply, using the API's error envelope when present.
fn status_error(status: StatusCode, body: &str) -> LlmError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => match error.status {
            Some(code) => format!("{} ({})", error.message, code),
            None => error.message,
        },
        Err(_) => body.chars().take(200).collect(),
    };
    LlmError::Status {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(system: &str) -> LlmRequest {
        LlmRequest {
            system: system.to_string(),
            user: "passes in match_1".to_string(),
            model: "gemini-1.5-pro-latest".to_string(),
            temperature: 0.0,
        }
    }

    #[test]
    fn test_default_config() {
        let config = GeminiClientConfig::default();
        assert!(config.endpoint.contains("generativelanguage.googleapis.com"));
        assert!(!config.endpoint.ends_with('/'));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_url_carries_no_key() {
        let client = GeminiClient::new(GeminiClientConfig {
            api_key: "secret-key".to_string(),
            ..Default::default()
        })
        .unwrap();
        let url = client.generate_url("gemini-1.5-pro-latest");
        assert!(url.ends_with("/models/gemini-1.5-pro-latest:generateContent"));
        assert!(!url.contains("secret-key"));
    }

    #[test]
    fn test_key_must_be_header_safe() {
        let err = GeminiClient::new(GeminiClientConfig {
            api_key: "bad\nkey".to_string(),
            ..Default::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, LlmError::Http(_)));
    }

    #[test]
    fn test_request_shape() {
        let req = request("classify");
        let json = serde_json::to_value(GenerateRequest::from_request(&req)).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "passes in match_1");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "classify");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");

        let req = request("");
        let json = serde_json::to_value(GenerateRequest::from_request(&req)).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_reply_parts_are_joined() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"decision\":"},{"text":"\"unresolvable\"}"}]},"finishReason":"STOP"}]}"#;
        assert_eq!(reply_text(body).unwrap(), r#"{"decision":"unresolvable"}"#);
    }

    #[test]
    fn test_unusable_replies() {
        let blocked = r#"{"candidates":[],"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let err = reply_text(blocked).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        let empty = r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#;
        let err = reply_text(empty).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));

        assert!(matches!(reply_text("{}"), Err(LlmError::Response(_))));
        assert!(matches!(reply_text("not json"), Err(LlmError::Serialization(_))));
    }

    #[test]
    fn test_status_error_reads_envelope() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, body);
        assert_eq!(
            err.to_string(),
            "provider returned HTTP 429: Quota exceeded (RESOURCE_EXHAUSTED)"
        );

        let err = status_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, LlmError::Status { status: 502, .. }));
    }
}
