//! Text-generation oracle abstraction.

use std::sync::Mutex;
use std::time::Duration;

use base64::Engine as _;
use thiserror::Error;

/// Default request timeout for oracle calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Diagnosis text stored when the oracle cannot answer.
pub const UNAVAILABLE_RESPONSE: &str = "Unable to process request. Please try again.";

/// Oracle errors.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Oracle not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot reach oracle at {0}")]
    Connection(String),

    #[error("Oracle returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse oracle response: {0}")]
    ResponseParsing(String),

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

pub type OracleResult<T> = Result<T, OracleError>;

/// Sampling parameters sent with each request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_output_tokens: 1000,
            top_p: 1.0,
            top_k: 32,
        }
    }
}

/// Image sent inline with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Base64 payload as expected by JSON APIs.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

/// A single generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Full prompt text, system prompt included
    pub prompt: String,
    /// Optional image for multimodal analysis
    pub image: Option<InlineImage>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// A text-generation backend.
///
/// Implementations block until the reply arrives or their timeout expires.
pub trait TextOracle {
    fn generate(&self, request: &GenerationRequest) -> OracleResult<String>;
}

impl<T: TextOracle + ?Sized> TextOracle for &T {
    fn generate(&self, request: &GenerationRequest) -> OracleResult<String> {
        (**self).generate(request)
    }
}

impl<T: TextOracle + ?Sized> TextOracle for Box<T> {
    fn generate(&self, request: &GenerationRequest) -> OracleResult<String> {
        (**self).generate(request)
    }
}

/// Oracle standing in when no backend is configured; every call fails.
pub struct UnconfiguredOracle {
    reason: String,
}

impl UnconfiguredOracle {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TextOracle for UnconfiguredOracle {
    fn generate(&self, _request: &GenerationRequest) -> OracleResult<String> {
        Err(OracleError::NotConfigured(self.reason.clone()))
    }
}

/// Mock oracle for testing without network access.
pub struct MockOracle {
    reply: Result<String, String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockOracle {
    /// Oracle that always answers with `reply`.
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Oracle that always fails with [`OracleError::Unavailable`].
    pub fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl TextOracle for MockOracle {
    fn generate(&self, request: &GenerationRequest) -> OracleResult<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.reply
            .clone()
            .map_err(OracleError::Unavailable)
    }
}
