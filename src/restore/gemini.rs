use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::foundation::core::EncodedImage;
use crate::restore::{RESTORATION_PROMPT, RestoreFailure, Restorer};

const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings for [`GeminiRestorer`].
#[derive(Clone)]
pub struct RestorerConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Whole-request timeout. There are no retries.
    pub timeout: Duration,
}

impl RestorerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub(crate) fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl std::fmt::Debug for RestorerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestorerConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Restorer backed by the Gemini `generateContent` endpoint.
pub struct GeminiRestorer {
    config: RestorerConfig,
    http_client: reqwest::blocking::Client,
}

impl GeminiRestorer {
    /// Build the HTTP client. Fails only on an empty key or TLS/client initialization.
    pub fn new(config: RestorerConfig) -> Result<Self, RestoreFailure> {
        if config.api_key.trim().is_empty() {
            return Err(RestoreFailure::Configuration(
                "api key must not be empty".to_string(),
            ));
        }
        if config.model.trim().is_empty() {
            return Err(RestoreFailure::Configuration(
                "model must not be empty".to_string(),
            ));
        }

        let http_client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(15).min(config.timeout))
            .timeout(config.timeout)
            .build()
            .map_err(|error| RestoreFailure::Configuration(error.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &RestorerConfig {
        &self.config
    }
}

impl Restorer for GeminiRestorer {
    #[tracing::instrument(skip_all, fields(model = %self.config.model, len = image.len()))]
    fn restore(&self, image: &EncodedImage) -> Result<EncodedImage, RestoreFailure> {
        let payload = GenerateContentRequest::for_image(image);

        let response = self
            .http_client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&payload)
            .send()
            .map_err(|error| RestoreFailure::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "unable to read error body".to_string());
            return Err(RestoreFailure::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .map_err(|error| RestoreFailure::MalformedResponse(error.to_string()))?;
        let restored = first_inline_image(&body)?;
        tracing::info!(mime = restored.mime(), len = restored.len(), "model returned image");
        Ok(restored)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateContentRequest {
    contents: Vec<Content>,
}

impl GenerateContentRequest {
    pub(crate) fn for_image(image: &EncodedImage) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![
                    Part {
                        inline_data: Some(InlineData {
                            mime_type: image.mime().to_string(),
                            data: image.base64_payload(),
                        }),
                        text: None,
                    },
                    Part {
                        inline_data: None,
                        text: Some(RESTORATION_PROMPT.to_string()),
                    },
                ],
            }],
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    inline_data: Option<InlineData>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

/// First inline image of the first candidate, typed by its content.
pub(crate) fn first_inline_image(
    body: &GenerateContentResponse,
) -> Result<EncodedImage, RestoreFailure> {
    let inline = body
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(|content| content.parts.iter().find_map(|p| p.inline_data.as_ref()))
        .ok_or(RestoreFailure::NoImage)?;

    let payload = EncodedImage::from_base64(inline.mime_type.as_str(), &inline.data)
        .map_err(|e| RestoreFailure::MalformedResponse(e.to_string()))?;
    // The declared MIME type is not trusted; the bytes must be a known raster format.
    let restored = EncodedImage::sniff(payload.into_bytes())
        .map_err(|e| RestoreFailure::MalformedResponse(e.to_string()))?;
    if restored.mime() != inline.mime_type {
        tracing::debug!(
            declared = %inline.mime_type,
            detected = restored.mime(),
            "model image type differs from declared type"
        );
    }
    Ok(restored)
}
