use crate::error::NarrativeError;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Future returned by [`NarrativeBackend::generate`]
pub type GenerateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, NarrativeError>> + Send + 'a>>;

/// Trait for hosted language-model services that turn a prompt into text
pub trait NarrativeBackend: Send + Sync {
    /// Send a prompt and return the model's reply verbatim
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a>;

    /// Short name used in log lines
    fn name(&self) -> &str;
}

/// Sampling settings shared by the HTTP backends
const TEMPERATURE: f32 = 0.2;
const MAX_OUTPUT_TOKENS: u32 = 1024;

fn build_client(connect_timeout: Duration) -> Result<Client, NarrativeError> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| {
            NarrativeError::ServiceUnavailable(format!("Failed to create HTTP client: {}", e))
        })
}

/// Read the body of a non-success response into a `ServiceUnavailable` error
async fn status_error(service: &str, response: reqwest::Response) -> NarrativeError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    NarrativeError::ServiceUnavailable(format!(
        "{} API returned error {}: {}",
        service, status, error_text
    ))
}

/// Google Generative Language backend (Gemini models)
///
/// Talks to the `generateContent` REST endpoint. The API key is sent in the
/// `x-goog-api-key` header rather than the query string so it never ends up
/// in request logs.
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

/// Request format for the Gemini API
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

/// Response format from the Gemini API
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GeminiBackend {
    /// Create a new Gemini backend
    ///
    /// # Arguments
    /// * `api_key` - Google API key
    /// * `model` - Model name to use (e.g., "gemini-pro")
    pub fn new(api_key: String, model: String) -> Result<Self, NarrativeError> {
        Self::with_base_url(
            api_key,
            model,
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
        )
    }

    /// Create a new Gemini backend against a custom endpoint
    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
    ) -> Result<Self, NarrativeError> {
        Ok(Self {
            client: build_client(Duration::from_secs(10))?,
            api_key,
            model,
            base_url,
        })
    }

    /// Format the generateContent endpoint URL
    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Join the text parts of the first candidate
    fn extract_text(response: GeminiResponse) -> Result<String, NarrativeError> {
        if let Some(error) = response.error {
            return Err(NarrativeError::ServiceUnavailable(format!(
                "Gemini API error ({}): {}",
                error.status.unwrap_or_else(|| "UNKNOWN".to_string()),
                error.message
            )));
        }

        let content = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| {
                NarrativeError::InvalidResponse("No candidates in Gemini response".to_string())
            })?;

        let text = content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(NarrativeError::InvalidResponse(
                "Gemini response contained no text".to_string(),
            ));
        }
        Ok(text)
    }
}

impl NarrativeBackend for GeminiBackend {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            let request = GeminiRequest {
                contents: vec![GeminiContent {
                    parts: vec![GeminiPart {
                        text: prompt.to_string(),
                    }],
                }],
                generation_config: GeminiGenerationConfig {
                    temperature: TEMPERATURE,
                    max_output_tokens: MAX_OUTPUT_TOKENS,
                },
            };

            debug!("Sending {} byte prompt to Gemini", prompt.len());
            let response = self
                .client
                .post(self.api_url())
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(status_error("Gemini", response).await);
            }

            let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
                NarrativeError::InvalidResponse(format!("Failed to parse Gemini response: {}", e))
            })?;

            Self::extract_text(gemini_response)
        })
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// OpenAI backend for cloud-based LLM inference
///
/// Works with any service implementing the chat completions API.
pub struct OpenAIBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

/// Request format for OpenAI Chat Completions API
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Message format for OpenAI API
#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

/// Response format from OpenAI API
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    error: Option<OpenAIError>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend
    pub fn new(api_key: String, model: String) -> Result<Self, NarrativeError> {
        Self::with_base_url(api_key, model, "https://api.openai.com/v1".to_string())
    }

    /// Create a new OpenAI backend with custom base URL
    ///
    /// This allows using OpenAI-compatible APIs or custom endpoints.
    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
    ) -> Result<Self, NarrativeError> {
        Ok(Self {
            client: build_client(Duration::from_secs(10))?,
            api_key,
            model,
            base_url,
        })
    }

    /// Format the OpenAI API endpoint URL
    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn system_prompt() -> &'static str {
        "You are an occupational health and safety analyst reviewing data from wearable IoT sensors. Answer concisely in plain text."
    }
}

impl NarrativeBackend for OpenAIBackend {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            let request = OpenAIRequest {
                model: self.model.clone(),
                messages: vec![
                    OpenAIMessage {
                        role: "system".to_string(),
                        content: Self::system_prompt().to_string(),
                    },
                    OpenAIMessage {
                        role: "user".to_string(),
                        content: prompt.to_string(),
                    },
                ],
                temperature: TEMPERATURE,
                max_tokens: MAX_OUTPUT_TOKENS,
            };

            let response = self
                .client
                .post(self.api_url())
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(status_error("OpenAI", response).await);
            }

            let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
                NarrativeError::InvalidResponse(format!("Failed to parse OpenAI response: {}", e))
            })?;

            if let Some(error) = openai_response.error {
                return Err(NarrativeError::ServiceUnavailable(format!(
                    "OpenAI API error ({}): {}",
                    error.error_type, error.message
                )));
            }

            openai_response
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or_else(|| {
                    NarrativeError::InvalidResponse("No choices in OpenAI response".to_string())
                })
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Ollama backend for local LLM inference
pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    model: String,
}

/// Request format for Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response format from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    ///
    /// # Arguments
    /// * `endpoint` - Ollama server URL (e.g., "http://localhost:11434")
    /// * `model` - Model name to use (e.g., "llama3")
    pub fn new(endpoint: String, model: String) -> Result<Self, NarrativeError> {
        Ok(Self {
            client: build_client(Duration::from_secs(5))?,
            endpoint,
            model,
        })
    }

    /// Format the Ollama API endpoint URL
    fn api_url(&self) -> String {
        format!("{}/api/generate", self.endpoint.trim_end_matches('/'))
    }
}

impl NarrativeBackend for OllamaBackend {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            let request = OllamaRequest {
                model: self.model.clone(),
                prompt: prompt.to_string(),
                stream: false,
                options: OllamaOptions {
                    temperature: TEMPERATURE,
                    num_predict: MAX_OUTPUT_TOKENS,
                },
            };

            let response = self
                .client
                .post(self.api_url())
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(status_error("Ollama", response).await);
            }

            let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
                NarrativeError::InvalidResponse(format!("Failed to parse Ollama response: {}", e))
            })?;

            if let Some(error) = ollama_response.error {
                return Err(NarrativeError::ServiceUnavailable(format!(
                    "Ollama error: {}",
                    error
                )));
            }

            Ok(ollama_response.response)
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Mock backend for tests and offline runs
///
/// Returns scripted responses in order, cycling back to the first after the
/// last, and records every prompt it receives.
pub struct MockBackend {
    responses: Vec<Result<String, NarrativeError>>,
    current_index: Arc<Mutex<usize>>,
    delay: Option<Duration>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// Create a mock backend with a single response
    pub fn with_response(response: Result<String, NarrativeError>) -> Self {
        Self::with_responses(vec![response])
    }

    /// Create a mock backend with multiple responses
    pub fn with_responses(responses: Vec<Result<String, NarrativeError>>) -> Self {
        Self {
            responses,
            current_index: Arc::new(Mutex::new(0)),
            delay: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock backend that always succeeds with canned text
    pub fn success() -> Self {
        Self::with_response(Ok(
            "All monitored readings look stable. No immediate risks identified.".to_string(),
        ))
    }

    /// Create a mock backend that always fails as if the service were down
    pub fn unavailable(message: &str) -> Self {
        Self::with_response(Err(NarrativeError::ServiceUnavailable(message.to_string())))
    }

    /// Add a delay to all responses (useful for testing timeout behavior)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of times generate() has been called
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Get the last prompt passed to generate()
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

impl NarrativeBackend for MockBackend {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            self.prompts.lock().unwrap().push(prompt.to_string());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if self.responses.is_empty() {
                return Err(NarrativeError::InvalidResponse(
                    "Mock backend has no scripted responses".to_string(),
                ));
            }

            let response_index = {
                let mut index = self.current_index.lock().unwrap();
                let current = *index % self.responses.len();
                *index += 1;
                current
            };

            self.responses[response_index].clone()
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_api_url() {
        let backend = GeminiBackend::new("key".to_string(), "gemini-pro".to_string()).unwrap();
        assert_eq!(
            backend.api_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
        );

        let custom = GeminiBackend::with_base_url(
            "key".to_string(),
            "gemini-1.5-flash".to_string(),
            "http://localhost:8080/v1/".to_string(),
        )
        .unwrap();
        assert_eq!(
            custom.api_url(),
            "http://localhost:8080/v1/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_gemini_request_serialization() {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: "Summarize".to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.2,
                max_output_tokens: 256,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Summarize");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 256);
    }

    #[test]
    fn test_gemini_extract_text_joins_parts() {
        let json = r#"{
            "candidates": [
                {
                    "content": {"parts": [{"text": "Heat stress "}, {"text": "is likely."}]},
                    "finishReason": "STOP"
                }
            ]
        }"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            GeminiBackend::extract_text(response).unwrap(),
            "Heat stress is likely."
        );
    }

    #[test]
    fn test_gemini_error_body_is_unavailable() {
        let json = r#"{"error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}}"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        match GeminiBackend::extract_text(response) {
            Err(NarrativeError::ServiceUnavailable(msg)) => {
                assert!(msg.contains("PERMISSION_DENIED"));
                assert!(msg.contains("API key not valid"));
            }
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_gemini_no_candidates_is_invalid() {
        let response: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            GeminiBackend::extract_text(response),
            Err(NarrativeError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_openai_backend_urls() {
        let backend = OpenAIBackend::new("sk-test".to_string(), "gpt-4o-mini".to_string()).unwrap();
        assert_eq!(
            backend.api_url(),
            "https://api.openai.com/v1/chat/completions"
        );

        let custom = OpenAIBackend::with_base_url(
            "sk-test".to_string(),
            "gpt-4o-mini".to_string(),
            "https://custom-api.example.com/v1/".to_string(),
        )
        .unwrap();
        assert_eq!(
            custom.api_url(),
            "https://custom-api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_openai_response_deserialization() {
        let json = r#"{
            "choices": [
                {"message": {"content": "Noise exposure is high."}, "finish_reason": "stop"}
            ]
        }"#;

        let response: OpenAIResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.choices[0].message.content, "Noise exposure is high.");
    }

    #[test]
    fn test_openai_error_response_deserialization() {
        let json = r#"{"error": {"message": "Invalid API key", "type": "invalid_request_error"}}"#;

        let response: OpenAIResponse = serde_json::from_str(json).unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.message, "Invalid API key");
        assert_eq!(error.error_type, "invalid_request_error");
    }

    #[test]
    fn test_ollama_api_url_formatting() {
        let with_slash =
            OllamaBackend::new("http://localhost:11434/".to_string(), "llama3".to_string())
                .unwrap();
        assert_eq!(with_slash.api_url(), "http://localhost:11434/api/generate");

        let without_slash =
            OllamaBackend::new("http://localhost:11434".to_string(), "llama3".to_string())
                .unwrap();
        assert_eq!(without_slash.api_url(), "http://localhost:11434/api/generate");
    }

    #[tokio::test]
    async fn test_mock_backend_cycles_responses() {
        let backend = MockBackend::with_responses(vec![
            Ok("first".to_string()),
            Err(NarrativeError::ServiceUnavailable("down".to_string())),
        ]);

        assert_eq!(backend.generate("a").await.unwrap(), "first");
        assert!(backend.generate("b").await.is_err());
        assert_eq!(backend.generate("c").await.unwrap(), "first");

        assert_eq!(backend.call_count(), 3);
        assert_eq!(backend.last_prompt(), Some("c".to_string()));
    }

    #[tokio::test]
    async fn test_mock_backend_without_responses() {
        let backend = MockBackend::with_responses(Vec::new());
        assert!(matches!(
            backend.generate("hello").await,
            Err(NarrativeError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        // Port 9 (discard) on localhost is closed on test machines.
        let backend =
            OllamaBackend::new("http://127.0.0.1:9".to_string(), "llama3".to_string()).unwrap();

        let result = backend.generate("hello").await;
        assert!(matches!(result, Err(NarrativeError::ServiceUnavailable(_))));
    }

    #[tokio::test]
    #[ignore = "Requires GOOGLE_API_KEY and network access"]
    async fn test_gemini_backend_integration() {
        let api_key =
            std::env::var("GOOGLE_API_KEY").expect("GOOGLE_API_KEY environment variable not set");
        let backend = GeminiBackend::new(api_key, "gemini-pro".to_string()).unwrap();

        match backend.generate("Reply with the single word OK.").await {
            Ok(text) => assert!(!text.is_empty()),
            Err(e) => println!("Expected error (no network): {:?}", e),
        }
    }
}
