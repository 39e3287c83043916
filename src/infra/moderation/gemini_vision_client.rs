// =============================================================================
// GEMINI VISION CLIENT - image moderation via generateContent
// =============================================================================
//
// Implements `ImageInspector` against Google's Gemini API
// (https://ai.google.dev/gemini-api/docs/vision).
//
// Flow for each image:
// 1. Download the bytes from the submitted URL (size-capped).
// 2. Send them inline (base64) next to the policy prompt, asking for a JSON
//    response at temperature 0.
// 3. Take the first candidate's text, strip any ``` fences, parse as JSON.
//
// The verdict is returned untyped; validation happens in the core adapter.
//
// **Environment Variables:**
// - `GEMINI_API_KEY` - API key from https://aistudio.google.com/apikey
// - `GEMINI_VISION_MODEL` - model name, defaults to `gemini-2.0-flash`

use crate::core::moderation::{ClassifierError, ImageInspector};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Largest image we are willing to download and forward.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================
//
// See: https://ai.google.dev/api/generate-content

/// Base64 image payload sent inline with the request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

/// A downloaded image ready to be sent inline.
#[derive(Debug)]
struct FetchedImage {
    mime_type: String,
    bytes: Vec<u8>,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GeminiVisionClient {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
    timeout: Duration,
}

impl GeminiVisionClient {
    /// Creates a client for `model`; every HTTP request is bounded by `timeout`.
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model,
            api_base: API_BASE.to_string(),
            timeout,
        })
    }

    /// Point the client at a different API base (everything before `/<model>`).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn transport_error(&self, e: reqwest::Error) -> ClassifierError {
        if e.is_timeout() {
            ClassifierError::Timeout(self.timeout)
        } else {
            ClassifierError::Transport(e.to_string())
        }
    }

    async fn fetch_image(&self, image_url: &str) -> Result<FetchedImage, ClassifierError> {
        let mut response = self
            .client
            .get(image_url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: format!("image download failed for {}", image_url),
            });
        }

        if let Some(length) = response.content_length() {
            if length as usize > MAX_IMAGE_BYTES {
                return Err(ClassifierError::Malformed(format!(
                    "image is {} bytes, limit is {}",
                    length, MAX_IMAGE_BYTES
                )));
            }
        }

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());

        // Content-Length can be missing or wrong, so the cap is enforced while
        // reading.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.transport_error(e))? {
            push_capped(&mut bytes, &chunk, MAX_IMAGE_BYTES)?;
        }

        Ok(FetchedImage {
            mime_type: resolve_mime_type(header_mime.as_deref(), image_url),
            bytes,
        })
    }

    fn build_request(image: &FetchedImage, policy_prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part {
                        text: Some(policy_prompt.to_string()),
                        inline_data: None,
                    },
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: image.mime_type.clone(),
                            data: STANDARD.encode(&image.bytes),
                        }),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json".to_string(),
            },
        }
    }

    /// Pull the verdict JSON out of a `generateContent` response body.
    fn extract_verdict(body: &str) -> Result<serde_json::Value, ClassifierError> {
        let response: GenerateContentResponse = serde_json::from_str(body)
            .map_err(|e| ClassifierError::Malformed(format!("invalid response body: {}", e)))?;

        let text = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.parts.iter().find_map(|p| p.text.as_deref()))
            .ok_or_else(|| {
                ClassifierError::Malformed(
                    "no text in Gemini response, the model may have been blocked".to_string(),
                )
            })?;

        serde_json::from_str(strip_code_fences(text))
            .map_err(|e| ClassifierError::Malformed(format!("verdict is not JSON: {}", e)))
    }
}

/// MIME type from the `Content-Type` header when it names an image, otherwise
/// guessed from the URL's file extension.
fn resolve_mime_type(header: Option<&str>, image_url: &str) -> String {
    if let Some(mime) = header.filter(|m| m.starts_with("image/")) {
        return mime.to_string();
    }

    let path = image_url.split(['?', '#']).next().unwrap_or(image_url);
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => "image/jpeg",
    }
    .to_string()
}

/// Append a downloaded chunk, failing once the total would exceed `limit`.
/// The buffer is left untouched on failure.
fn push_capped(buf: &mut Vec<u8>, chunk: &[u8], limit: usize) -> Result<(), ClassifierError> {
    let total = buf.len() + chunk.len();
    if total > limit {
        return Err(ClassifierError::Malformed(format!(
            "image exceeds {} bytes (read {} so far)",
            limit, total
        )));
    }
    buf.extend_from_slice(chunk);
    Ok(())
}

/// Remove a surrounding markdown code fence (``` or ```json) if present.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
impl ImageInspector for GeminiVisionClient {
    async fn inspect_image(
        &self,
        image_url: &str,
        policy_prompt: &str,
    ) -> Result<serde_json::Value, ClassifierError> {
        let image = self.fetch_image(image_url).await?;
        let request = Self::build_request(&image, policy_prompt);

        tracing::debug!(
            "Gemini vision request to model {}: {} bytes of {}",
            self.model,
            image.bytes.len(),
            image.mime_type
        );

        let url = format!("{}/{}:generateContent", self.api_base, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Self::extract_verdict(&body)
    }
}
