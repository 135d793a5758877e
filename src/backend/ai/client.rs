/**
 * LLM Client
 *
 * Thin reqwest wrapper over the Gemini `generateContent` REST endpoint. One
 * prompt in, one completion out. Callers decide how to degrade when a call
 * fails; most fall back to placeholder JSON.
 *
 * `generate_stream` uses `streamGenerateContent?alt=sse` and yields the text
 * of each server-sent event as it arrives.
 */

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::ai::parse::strip_code_fences;
use crate::shared::config::LlmSection;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("LLM API key is not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("provider returned no text")]
    EmptyResponse,

    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
}

/// A single completion request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub temperature: f32,
    /// Base64-encoded PNG sent alongside the prompt.
    pub image_png_base64: Option<String>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            image_png_base64: None,
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image_png_base64 = image.filter(|i| !i.is_empty());
        self
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'static str,
    data: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Text parts of the first candidate, concatenated.
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("configured", &self.api_key.is_some())
            .finish()
    }
}

impl LlmClient {
    pub fn new(config: &LlmSection) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn post(&self, method: &str, request: &LlmRequest) -> Result<reqwest::Response, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::NotConfigured)?;

        let mut parts = vec![Part::Text { text: &request.prompt }];
        if let Some(image) = request.image_png_base64.as_deref() {
            parts.push(Part::Image {
                inline_data: InlineData {
                    mime_type: "image/png",
                    data: image,
                },
            });
        }
        let body = GenerateRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        };

        let url = format!("{}/models/{}:{}", self.base_url, self.model, method);
        tracing::debug!("Calling LLM model {} ({} prompt chars)", self.model, request.prompt.len());

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!("LLM provider returned {}: {}", status, message);
            return Err(AiError::Provider {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Run one completion and return the concatenated text parts.
    pub async fn generate(&self, request: LlmRequest) -> Result<String, AiError> {
        let response = self.post("generateContent", &request).await?;
        let parsed: GenerateResponse = response.json().await?;
        let text = parsed.into_text();

        if text.trim().is_empty() {
            return Err(AiError::EmptyResponse);
        }
        Ok(text)
    }

    /// Stream one completion as text chunks.
    ///
    /// Setup failures (no key, provider status) are returned before any chunk;
    /// transport errors mid-stream arrive as `Err` items.
    pub async fn generate_stream(
        &self,
        request: LlmRequest,
    ) -> Result<BoxStream<'static, Result<String, AiError>>, AiError> {
        let response = self.post("streamGenerateContent?alt=sse", &request).await?;

        let chunks = response
            .bytes_stream()
            .scan(SseDecoder::default(), |decoder, chunk| {
                let item = chunk.map(|bytes| decoder.push(&bytes)).map_err(AiError::from);
                futures_util::future::ready(Some(item))
            })
            .flat_map(|item| {
                let texts: Vec<Result<String, AiError>> = match item {
                    Ok(texts) => texts.into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                };
                stream::iter(texts)
            });
        Ok(chunks.boxed())
    }

    /// Run one completion and decode it as JSON, ignoring markdown code fences.
    pub async fn generate_json<T: DeserializeOwned>(&self, request: LlmRequest) -> Result<T, AiError> {
        let text = self.generate(request).await?;
        serde_json::from_str(strip_code_fences(&text)).map_err(|e| {
            tracing::warn!("Invalid JSON from LLM: {}", e);
            AiError::InvalidJson(e.to_string())
        })
    }
}

/// Splits a server-sent event byte stream into the text of each `data:` line.
///
/// Bytes are buffered until a full line is available, so chunk boundaries may
/// fall anywhere, including inside a multi-byte character.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut texts = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            let Some(data) = line.trim_end().strip_prefix("data:") else {
                continue;
            };
            match serde_json::from_str::<GenerateResponse>(data.trim()) {
                Ok(event) => {
                    let text = event.into_text();
                    if !text.is_empty() {
                        texts.push(text);
                    }
                }
                Err(e) => tracing::warn!("Skipping malformed stream event: {}", e),
            }
        }
        texts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, key: Option<&str>) -> LlmClient {
        LlmClient::new(&LlmSection {
            api_key: key.map(str::to_string),
            model: "test-model".to_string(),
            base_url: server.uri(),
        })
    }

    fn completion(text: &str) -> serde_json::Value {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
    }

    #[tokio::test]
    async fn test_generate_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test-model:generateContent"))
            .and(header("x-goog-api-key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hello there")))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server, Some("k")).generate(LlmRequest::new("hi", 0.7)).await.unwrap();
        assert_eq!(text, "Hello there");
    }

    #[tokio::test]
    async fn test_generate_json_strips_fences() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("```json\n{\"total_marks\": 7}\n```")))
            .mount(&server)
            .await;

        let value: serde_json::Value = client_for(&server, Some("k"))
            .generate_json(LlmRequest::new("grade", 0.2))
            .await
            .unwrap();
        assert_eq!(value["total_marks"], 7);
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("I think it was fine")))
            .mount(&server)
            .await;

        let result = client_for(&server, Some("k"))
            .generate_json::<serde_json::Value>(LlmRequest::new("grade", 0.2))
            .await;
        assert_matches!(result, Err(AiError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn test_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let result = client_for(&server, Some("k")).generate(LlmRequest::new("hi", 0.7)).await;
        assert_matches!(result, Err(AiError::Provider { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let result = client_for(&server, Some("k")).generate(LlmRequest::new("hi", 0.7)).await;
        assert_matches!(result, Err(AiError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_not_configured_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("unused")))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        assert!(!client.is_configured());
        tokio_test::assert_err!(client.generate(LlmRequest::new("hi", 0.7)).await);
    }

    fn sse(texts: &[&str]) -> String {
        texts
            .iter()
            .map(|t| format!("data: {}\r\n\r\n", completion(t)))
            .collect()
    }

    #[tokio::test]
    async fn test_generate_stream_yields_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test-model:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .and(header("x-goog-api-key", "k"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse(&["Why is ", "the sky ", "blue?"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let chunks: Vec<String> = client_for(&server, Some("k"))
            .generate_stream(LlmRequest::new("explain", 0.7))
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.concat(), "Why is the sky blue?");
    }

    #[tokio::test]
    async fn test_generate_stream_provider_error_before_first_chunk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let result = client_for(&server, Some("k")).generate_stream(LlmRequest::new("hi", 0.7)).await;
        assert_matches!(result.err(), Some(AiError::Provider { status: 500, .. }));
        let result = client_for(&server, None).generate_stream(LlmRequest::new("hi", 0.7)).await;
        assert_matches!(result.err(), Some(AiError::NotConfigured));
    }

    #[test]
    fn test_sse_decoder_handles_split_events() {
        let body = sse(&["héllo", " world"]);
        let bytes = body.as_bytes();
        let mut decoder = SseDecoder::default();
        let mut texts = Vec::new();
        // Split inside the multi-byte character.
        let cut = body.find('é').unwrap() + 1;
        texts.extend(decoder.push(&bytes[..cut]));
        assert!(texts.is_empty());
        texts.extend(decoder.push(&bytes[cut..]));
        assert_eq!(texts, vec!["héllo".to_string(), " world".to_string()]);

        assert!(decoder.push(b": keep-alive\n\ndata: not json\n").is_empty());
    }

    #[test]
    fn test_empty_image_is_dropped() {
        let request = LlmRequest::new("p", 0.1).with_image(Some(String::new()));
        assert!(request.image_png_base64.is_none());
    }
}
