//! Vision model client
//!
//! Sends one prompt plus one inline image to a `generateContent` endpoint and
//! returns the model's free-form text answer.

use super::types::{
    ApiErrorBody, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    InlineData, Part,
};
use crate::extraction::SourceImage;
use base64::Engine;
use eyre::{Result, eyre};
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default public endpoint
pub const DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model name
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Stand-in for secrets in debug output
pub const REDACTED: &str = "<redacted>";

/// Failure of a single model call
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("model overloaded ({status}): {message}")]
    Overloaded { status: u16, message: String },
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl VisionError {
    /// Classify a non-success response
    ///
    /// 503, 529 and error bodies reporting `UNAVAILABLE` or mentioning
    /// "overloaded" count as overload; everything else is a plain API error.
    pub fn from_api_response(status: u16, body: &str) -> Self {
        let (message, api_status) = match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(parsed) => (parsed.error.message, parsed.error.status),
            Err(_) => (body.to_string(), String::new()),
        };

        let overloaded = matches!(status, 503 | 529)
            || api_status.eq_ignore_ascii_case("UNAVAILABLE")
            || message.to_lowercase().contains("overloaded");

        if overloaded {
            Self::Overloaded { status, message }
        } else {
            Self::Api { status, message }
        }
    }

    pub fn is_overloaded(&self) -> bool {
        matches!(self, Self::Overloaded { .. })
    }
}

/// A model that reads an image and answers a prompt
pub trait VisionModel: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        image: &SourceImage,
    ) -> impl std::future::Future<Output = Result<String, VisionError>> + Send;
}

/// HTTP client for a `generateContent` style endpoint
///
/// # Example
/// ```no_run
/// use formfill::client::VisionClient;
/// use url::Url;
///
/// # fn example() -> eyre::Result<()> {
/// let url = Url::parse(formfill::client::DEFAULT_URL)?;
/// let client = VisionClient::try_new(url, "gemini-2.5-flash", "secret")?;
/// assert_eq!(client.model(), "gemini-2.5-flash");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct VisionClient {
    client: Client,
    url: Url,
    model: String,
    api_key: String,
    generation: GenerationConfig,
}

impl fmt::Debug for VisionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionClient")
            .field("url", &self.url.as_str())
            .field("model", &self.model)
            .field("api_key", &REDACTED)
            .field("generation", &self.generation)
            .finish()
    }
}

impl VisionClient {
    /// Create a client for a base URL, model name and API key
    ///
    /// # Errors
    /// Returns an error if the API key is empty or the HTTP client cannot be built
    pub fn try_new(url: Url, model: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(eyre!("Vision API key is empty"));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            url,
            model: model.into(),
            api_key,
            generation: GenerationConfig::default(),
        })
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.url.as_str().trim_end_matches('/'),
            self.model
        )
    }

    fn request_body(&self, prompt: &str, image: &SourceImage) -> GenerateContentRequest {
        let data = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::Text {
                        text: prompt.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime.clone(),
                            data,
                        },
                    },
                ],
            }],
            generation_config: self.generation.clone(),
        }
    }
}

impl VisionModel for VisionClient {
    async fn generate(&self, prompt: &str, image: &SourceImage) -> Result<String, VisionError> {
        let body = self.request_body(prompt, image);

        log::debug!(
            "POST {} ({} bytes of {})",
            self.endpoint(),
            image.bytes.len(),
            image.mime
        );

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| VisionError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| VisionError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(VisionError::from_api_response(status.as_u16(), &text));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| VisionError::InvalidResponse(e.to_string()))?;

        parsed
            .text()
            .ok_or_else(|| VisionError::InvalidResponse("response has no candidates".to_string()))
    }
}

impl std::fmt::Display for VisionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (model: {})", self.url, self.model)
    }
}
