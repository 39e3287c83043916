// External image classifier adapter.
//
// Same shape as the text adapter: the inspector (port) returns the vision
// service's raw JSON verdict, and this adapter validates it, bounds the call
// with a timeout and fails open.

use super::classifier_models::{fail_open, ClassifierError, ImageClassification};
use async_trait::async_trait;
use std::time::Duration;

/// Policy instruction sent with every image.
///
/// Strict on purpose: artistic or educational nudity is not exempt.
pub const IMAGE_POLICY_PROMPT: &str = "\
You are a strict content moderator for a social platform. Examine the attached image \
and decide whether it violates platform policy. An image is UNSAFE if it contains any of:
- nudity or sexually explicit content, including artistic, partial or suggestive nudity
- violence, gore, blood or graphic injury
- hate symbols, extremist imagery or hateful gestures
- drugs, drug paraphernalia or other illegal activity
- self-harm or content encouraging it
Do not make exceptions for artistic, historical or educational context.
Respond with JSON only, exactly in this shape:
{\"safe\": true|false, \"reason\": \"short category name or null\", \"confidence\": 0.0-1.0}";

// ============================================================================
// INSPECTOR TRAIT (PORT)
// ============================================================================

/// A remote vision service that judges an image against a policy prompt.
#[async_trait]
pub trait ImageInspector: Send + Sync {
    /// Fetch the image at `image_url`, submit it with `policy_prompt` and
    /// return the service's verdict as untyped JSON.
    async fn inspect_image(
        &self,
        image_url: &str,
        policy_prompt: &str,
    ) -> Result<serde_json::Value, ClassifierError>;
}

#[async_trait]
impl ImageInspector for Box<dyn ImageInspector> {
    async fn inspect_image(
        &self,
        image_url: &str,
        policy_prompt: &str,
    ) -> Result<serde_json::Value, ClassifierError> {
        (**self).inspect_image(image_url, policy_prompt).await
    }
}

// ============================================================================
// ADAPTER
// ============================================================================

pub struct ImageClassifier<I: ImageInspector> {
    inspector: Option<I>,
    timeout: Duration,
}

impl<I: ImageInspector> ImageClassifier<I> {
    pub fn new(inspector: Option<I>, timeout: Duration) -> Self {
        Self { inspector, timeout }
    }

    pub fn is_enabled(&self) -> bool {
        self.inspector.is_some()
    }

    /// Classify the image at `image_url`, surfacing failures as errors.
    pub async fn try_classify_image(
        &self,
        image_url: &str,
    ) -> Result<ImageClassification, ClassifierError> {
        let Some(inspector) = &self.inspector else {
            return Ok(ImageClassification::safe());
        };
        if image_url.trim().is_empty() {
            return Ok(ImageClassification::safe());
        }

        let raw = tokio::time::timeout(
            self.timeout,
            inspector.inspect_image(image_url, IMAGE_POLICY_PROMPT),
        )
        .await
        .map_err(|_| ClassifierError::Timeout(self.timeout))??;

        ImageClassification::from_untyped(&raw)
    }

    /// Classify the image at `image_url`; any failure counts as safe.
    pub async fn classify_image(&self, image_url: &str) -> ImageClassification {
        fail_open(self.try_classify_image(image_url).await, "image")
    }
}
