// External text classifier adapter.
//
// The oracle (port) only knows how to turn text into raw attribute scores.
// This adapter owns everything around that call: skipping it when the service
// is unconfigured, bounding it with a timeout, validating the raw scores,
// applying the threshold table, and failing open.

use super::classifier_models::{
    fail_open, AttributeScores, ClassifierError, TextAttribute, TextClassification,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

// ============================================================================
// ORACLE TRAIT (PORT)
// ============================================================================

/// A remote service that scores text on a set of attributes.
#[async_trait]
pub trait TextScoringOracle: Send + Sync {
    /// Score `text` on each of `attributes`.
    ///
    /// Returns the service's raw `attribute name -> score` map. Attributes the
    /// service didn't return may simply be absent.
    async fn score_text(
        &self,
        text: &str,
        attributes: &[TextAttribute],
    ) -> Result<HashMap<String, f64>, ClassifierError>;
}

// Blanket implementation for Box<dyn TextScoringOracle> so the composition
// root can pick a concrete oracle at runtime.
#[async_trait]
impl TextScoringOracle for Box<dyn TextScoringOracle> {
    async fn score_text(
        &self,
        text: &str,
        attributes: &[TextAttribute],
    ) -> Result<HashMap<String, f64>, ClassifierError> {
        (**self).score_text(text, attributes).await
    }
}

// ============================================================================
// ADAPTER
// ============================================================================

pub struct TextClassifier<O: TextScoringOracle> {
    /// `None` when no credentials are configured; every check is then safe.
    oracle: Option<O>,
    timeout: Duration,
}

impl<O: TextScoringOracle> TextClassifier<O> {
    pub fn new(oracle: Option<O>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    pub fn is_enabled(&self) -> bool {
        self.oracle.is_some()
    }

    /// Classify `text`, surfacing classifier failures as errors.
    ///
    /// Unconfigured classifiers and empty input are not errors: both return
    /// `Ok(safe)` without a network call.
    pub async fn try_classify_text(
        &self,
        text: &str,
    ) -> Result<TextClassification, ClassifierError> {
        let Some(oracle) = &self.oracle else {
            return Ok(TextClassification::safe());
        };
        if text.trim().is_empty() {
            return Ok(TextClassification::safe());
        }

        let raw = tokio::time::timeout(self.timeout, oracle.score_text(text, &TextAttribute::ALL))
            .await
            .map_err(|_| ClassifierError::Timeout(self.timeout))??;

        let verdict = TextClassification::from_scores(AttributeScores::from_raw(&raw));
        if !verdict.safe {
            tracing::debug!(reason = ?verdict.reason, "Text classifier flagged content");
        }
        Ok(verdict)
    }

    /// Classify `text`; any classifier failure counts as safe.
    pub async fn classify_text(&self, text: &str) -> TextClassification {
        fail_open(self.try_classify_text(text).await, "text")
    }
}
