//! Google Gemini client for diagnosis generation.
//!
//! Thin blocking wrapper around the `generateContent` endpoint. Text-only
//! requests go to the text model, requests carrying an image go to the
//! vision model.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::oracle::{
    GenerationConfig, GenerationRequest, OracleError, OracleResult, TextOracle, DEFAULT_TIMEOUT,
};

pub const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash-lite";
pub const DEFAULT_VISION_MODEL: &str = "gemini-2.0-pro-vision";

/// Longest error body echoed back in [`OracleError::Api`].
const MAX_ERROR_BODY: usize = 200;

pub struct GeminiOracle {
    client: reqwest::blocking::Client,
    api_key: String,
    endpoint: String,
    text_model: String,
    vision_model: String,
    generation: GenerationConfig,
    timeout: Duration,
}

// -- Response types --

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

impl GeminiOracle {
    pub fn new(api_key: &str) -> OracleResult<Self> {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(api_key: &str, timeout: Duration) -> OracleResult<Self> {
        if api_key.trim().is_empty() {
            return Err(OracleError::NotConfigured(
                "GEMINI_API_KEY is not set".to_string(),
            ));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            endpoint: GEMINI_ENDPOINT.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            generation: GenerationConfig::default(),
            timeout,
        })
    }

    pub fn with_models(mut self, text_model: &str, vision_model: &str) -> Self {
        self.text_model = text_model.to_string();
        self.vision_model = vision_model.to_string();
        self
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    /// Model used for the given request.
    pub fn model_for(&self, request: &GenerationRequest) -> &str {
        if request.image.is_some() {
            &self.vision_model
        } else {
            &self.text_model
        }
    }

    pub fn build_request_body(
        request: &GenerationRequest,
        generation: &GenerationConfig,
    ) -> serde_json::Value {
        let mut parts = vec![serde_json::json!({ "text": request.prompt })];
        if let Some(image) = &request.image {
            parts.push(serde_json::json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": image.to_base64(),
                }
            }));
        }

        serde_json::json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "temperature": generation.temperature,
                "maxOutputTokens": generation.max_output_tokens,
                "topP": generation.top_p,
                "topK": generation.top_k,
            }
        })
    }

    /// Concatenated text parts of the first candidate.
    pub fn extract_text(response: &GeminiResponse) -> Option<String> {
        let candidate = response.candidates.first()?;
        let text: String = candidate
            .content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn classify(&self, e: reqwest::Error) -> OracleError {
        if e.is_timeout() {
            OracleError::Timeout(self.timeout.as_secs())
        } else if e.is_connect() {
            OracleError::Connection(self.endpoint.clone())
        } else {
            OracleError::Unavailable(e.to_string())
        }
    }
}

impl TextOracle for GeminiOracle {
    fn generate(&self, request: &GenerationRequest) -> OracleResult<String> {
        let model = self.model_for(request);
        let url = format!("{}/{}:generateContent", self.endpoint, model);
        let body = Self::build_request_body(request, &self.generation);

        info!(
            model = %model,
            prompt_chars = request.prompt.len(),
            with_image = request.image.is_some(),
            "Gemini generateContent"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().unwrap_or_default();
            // Truncate on a char boundary
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(OracleError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GeminiResponse = response
            .json()
            .map_err(|e| OracleError::ResponseParsing(e.to_string()))?;

        let text = Self::extract_text(&parsed).ok_or_else(|| {
            OracleError::ResponseParsing("response contained no text".to_string())
        })?;
        debug!(reply_chars = text.len(), "Gemini reply received");
        Ok(text)
    }
}
