// =============================================================================
// PERSPECTIVE CLIENT - Google Perspective API text scoring
// =============================================================================
//
// Implements `TextScoringOracle` against `comments:analyze`
// (https://developers.perspectiveapi.com/s/about-the-api-methods).
//
// - Authentication: API key as a query parameter (`?key=API_KEY`).
// - Request: the comment text plus one empty object per requested attribute.
// - Response: scores at `attributeScores.<ATTR>.summaryScore.value`.
//
// **Environment Variables:**
// - `PERSPECTIVE_API_KEY`

use crate::core::moderation::{ClassifierError, TextAttribute, TextScoringOracle};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://commentanalyzer.googleapis.com/v1alpha1/comments:analyze";

// =============================================================================
// PERSPECTIVE API DATA STRUCTURES
// =============================================================================

#[derive(Debug, Serialize)]
struct CommentText {
    text: String,
}

/// Per-attribute options. Empty means "use the service defaults".
#[derive(Debug, Serialize, Default)]
struct AttributeOptions {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    comment: CommentText,
    languages: Vec<String>,
    requested_attributes: BTreeMap<String, AttributeOptions>,
    /// Ask the service not to retain the submitted text.
    do_not_store: bool,
}

#[derive(Debug, Deserialize)]
struct SummaryScore {
    value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributeScore {
    summary_score: Option<SummaryScore>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    attribute_scores: Option<HashMap<String, AttributeScore>>,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct PerspectiveClient {
    client: Client,
    api_key: String,
    endpoint: String,
    timeout: Duration,
}

impl PerspectiveClient {
    /// Creates a client whose every request is bounded by `timeout`.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout,
        })
    }

    /// Point the client at a different analyze endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn build_request(text: &str, attributes: &[TextAttribute]) -> AnalyzeRequest {
        AnalyzeRequest {
            comment: CommentText {
                text: text.to_string(),
            },
            languages: vec!["en".to_string()],
            requested_attributes: attributes
                .iter()
                .map(|a| (a.api_name().to_string(), AttributeOptions::default()))
                .collect(),
            do_not_store: true,
        }
    }

    /// Flatten a response body into `attribute -> score`.
    ///
    /// Attributes without a summary score are left out; the adapter scores
    /// them as 0.
    fn parse_scores(body: &str) -> Result<HashMap<String, f64>, ClassifierError> {
        let response: AnalyzeResponse = serde_json::from_str(body)
            .map_err(|e| ClassifierError::Malformed(format!("invalid response body: {}", e)))?;

        let attribute_scores = response.attribute_scores.ok_or_else(|| {
            ClassifierError::Malformed("response has no attributeScores".to_string())
        })?;

        Ok(attribute_scores
            .into_iter()
            .filter_map(|(name, score)| score.summary_score.map(|s| (name, s.value)))
            .collect())
    }
}

#[async_trait]
impl TextScoringOracle for PerspectiveClient {
    async fn score_text(
        &self,
        text: &str,
        attributes: &[TextAttribute],
    ) -> Result<HashMap<String, f64>, ClassifierError> {
        let request = Self::build_request(text, attributes);

        // Never log the key or the text itself
        tracing::debug!(
            "Perspective request: {} attributes, {} chars",
            attributes.len(),
            text.chars().count()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout(self.timeout)
                } else {
                    ClassifierError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Self::parse_scores(&body)
    }
}
