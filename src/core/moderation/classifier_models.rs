// Classifier domain models - verdicts, scores and the transport error taxonomy.
//
// External classifiers speak untyped JSON. Everything in this file is the
// typed side of that boundary; the adapters convert into these types before
// anything else in the crate sees a result.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// TEXT ATTRIBUTES
// ============================================================================

/// Attributes requested from the text classifier, in threshold-table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextAttribute {
    Toxicity,
    SevereToxicity,
    IdentityAttack,
    Insult,
    Profanity,
    Threat,
    SexuallyExplicit,
    Spam,
}

impl TextAttribute {
    /// Every attribute, in the order thresholds are evaluated.
    pub const ALL: [TextAttribute; 8] = [
        TextAttribute::Toxicity,
        TextAttribute::SevereToxicity,
        TextAttribute::IdentityAttack,
        TextAttribute::Insult,
        TextAttribute::Profanity,
        TextAttribute::Threat,
        TextAttribute::SexuallyExplicit,
        TextAttribute::Spam,
    ];

    /// Attribute name as the classification service spells it.
    pub fn api_name(&self) -> &'static str {
        match self {
            TextAttribute::Toxicity => "TOXICITY",
            TextAttribute::SevereToxicity => "SEVERE_TOXICITY",
            TextAttribute::IdentityAttack => "IDENTITY_ATTACK",
            TextAttribute::Insult => "INSULT",
            TextAttribute::Profanity => "PROFANITY",
            TextAttribute::Threat => "THREAT",
            TextAttribute::SexuallyExplicit => "SEXUALLY_EXPLICIT",
            TextAttribute::Spam => "SPAM",
        }
    }

    pub fn from_api_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.api_name() == name)
    }

    /// Score at or above which content is blocked.
    pub fn threshold(&self) -> f64 {
        match self {
            TextAttribute::Toxicity => 0.70,
            TextAttribute::SevereToxicity => 0.50,
            TextAttribute::IdentityAttack => 0.60,
            TextAttribute::Insult => 0.70,
            TextAttribute::Profanity => 0.80,
            TextAttribute::Threat => 0.50,
            TextAttribute::SexuallyExplicit => 0.60,
            TextAttribute::Spam => 0.80,
        }
    }

    /// Human-readable reason shown when this attribute blocks content.
    pub fn label(&self) -> &'static str {
        match self {
            TextAttribute::Toxicity => "toxic language",
            TextAttribute::SevereToxicity => "severely toxic language",
            TextAttribute::IdentityAttack => "identity-based attack",
            TextAttribute::Insult => "insulting language",
            TextAttribute::Profanity => "profanity",
            TextAttribute::Threat => "threatening language",
            TextAttribute::SexuallyExplicit => "sexually explicit content",
            TextAttribute::Spam => "spam",
        }
    }
}

impl std::fmt::Display for TextAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.api_name())
    }
}

// ============================================================================
// SCORES
// ============================================================================

/// Per-attribute scores in [0, 1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeScores(BTreeMap<TextAttribute, f64>);

impl AttributeScores {
    /// Convert a raw `name -> score` map from the wire.
    ///
    /// Every known attribute gets an entry; missing ones score 0. Unknown
    /// names are dropped, NaN becomes 0 and everything is clamped to [0, 1].
    pub fn from_raw(raw: &HashMap<String, f64>) -> Self {
        let scores = TextAttribute::ALL
            .into_iter()
            .map(|attribute| {
                let score = raw
                    .get(attribute.api_name())
                    .copied()
                    .filter(|v| !v.is_nan())
                    .unwrap_or(0.0)
                    .clamp(0.0, 1.0);
                (attribute, score)
            })
            .collect();
        Self(scores)
    }

    /// Every attribute at 1.0; used when the lexicon has already decided.
    pub fn maximal() -> Self {
        Self(TextAttribute::ALL.into_iter().map(|a| (a, 1.0)).collect())
    }

    pub fn get(&self, attribute: TextAttribute) -> f64 {
        self.0.get(&attribute).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextAttribute, f64)> + '_ {
        self.0.iter().map(|(a, s)| (*a, *s))
    }

    /// First attribute, in table order, whose score meets its threshold.
    pub fn first_violation(&self) -> Option<TextAttribute> {
        TextAttribute::ALL
            .into_iter()
            .find(|a| self.get(*a) >= a.threshold())
    }
}

// ============================================================================
// VERDICTS
// ============================================================================

/// Result of moderating a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextClassification {
    pub safe: bool,
    pub reason: Option<String>,
    pub scores: AttributeScores,
}

impl TextClassification {
    /// Allowed, with no scores (nothing was consulted).
    pub fn safe() -> Self {
        Self {
            safe: true,
            reason: None,
            scores: AttributeScores::default(),
        }
    }

    /// Blocked for `reason`.
    pub fn blocked(reason: impl Into<String>, scores: AttributeScores) -> Self {
        Self {
            safe: false,
            reason: Some(reason.into()),
            scores,
        }
    }

    /// Apply the threshold table to a set of scores.
    pub fn from_scores(scores: AttributeScores) -> Self {
        match scores.first_violation() {
            Some(attribute) => Self::blocked(attribute.label(), scores),
            None => Self {
                safe: true,
                reason: None,
                scores,
            },
        }
    }
}

/// Result of moderating an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageClassification {
    pub safe: bool,
    pub reason: Option<String>,
    pub confidence: f64,
}

impl ImageClassification {
    pub fn safe() -> Self {
        Self {
            safe: true,
            reason: None,
            confidence: 0.0,
        }
    }

    /// Validate the vision classifier's JSON verdict.
    ///
    /// `safe` must be a boolean. `reason` may be a string or null (an empty
    /// string counts as null). `confidence` defaults to 0 and is clamped to [0, 1].
    pub fn from_untyped(value: &serde_json::Value) -> Result<Self, ClassifierError> {
        let safe = value
            .get("safe")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| ClassifierError::Malformed("missing boolean `safe`".to_string()))?;

        let reason = match value.get("reason") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
            Some(serde_json::Value::String(s)) => Some(s.trim().to_string()),
            Some(other) => {
                return Err(ClassifierError::Malformed(format!(
                    "`reason` must be a string or null, got {}",
                    other
                )))
            }
        };

        let confidence = value
            .get("confidence")
            .and_then(|v| v.as_f64())
            .filter(|v| !v.is_nan())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        Ok(Self {
            safe,
            reason,
            confidence,
        })
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Everything that can go wrong talking to an external classifier.
///
/// None of these reach the caller of `moderate_*`; see [`fail_open`].
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Classifier returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed classifier response: {0}")]
    Malformed(String),

    #[error("Classifier call timed out after {0:?}")]
    Timeout(Duration),
}

// ============================================================================
// FAIL-OPEN POLICY
// ============================================================================

/// Verdicts that have a "let it through" value.
pub trait FailOpen {
    fn permitted() -> Self;
}

impl FailOpen for TextClassification {
    fn permitted() -> Self {
        Self::safe()
    }
}

impl FailOpen for ImageClassification {
    fn permitted() -> Self {
        Self::safe()
    }
}

/// Any classifier error maps to a permitted verdict.
///
/// Third-party outages must not block legitimate content, so the error is
/// logged and swallowed here rather than propagated.
pub fn fail_open<T: FailOpen>(outcome: Result<T, ClassifierError>, classifier: &str) -> T {
    match outcome {
        Ok(verdict) => verdict,
        Err(err) => {
            tracing::warn!(classifier, error = %err, "Classifier failed; allowing content");
            T::permitted()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_api_names_round_trip() {
        for attribute in TextAttribute::ALL {
            assert_eq!(TextAttribute::from_api_name(attribute.api_name()), Some(attribute));
        }
        assert_eq!(TextAttribute::from_api_name("FLIRTATION"), None);
    }

    #[test]
    fn test_missing_attributes_score_zero() {
        let scores = AttributeScores::from_raw(&raw(&[("INSULT", 0.4)]));

        assert_eq!(scores.get(TextAttribute::Insult), 0.4);
        assert_eq!(scores.get(TextAttribute::Toxicity), 0.0);
        assert_eq!(scores.iter().count(), TextAttribute::ALL.len());
    }

    #[test]
    fn test_scores_are_clamped_and_unknown_names_dropped() {
        let scores = AttributeScores::from_raw(&raw(&[
            ("TOXICITY", 1.7),
            ("THREAT", -0.2),
            ("SPAM", f64::NAN),
            ("FLIRTATION", 0.99),
        ]));

        assert_eq!(scores.get(TextAttribute::Toxicity), 1.0);
        assert_eq!(scores.get(TextAttribute::Threat), 0.0);
        assert_eq!(scores.get(TextAttribute::Spam), 0.0);
        assert_eq!(scores.iter().count(), TextAttribute::ALL.len());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let verdict =
            TextClassification::from_scores(AttributeScores::from_raw(&raw(&[("THREAT", 0.5)])));
        assert!(!verdict.safe);
        assert_eq!(verdict.reason.as_deref(), Some("threatening language"));

        let verdict =
            TextClassification::from_scores(AttributeScores::from_raw(&raw(&[("THREAT", 0.49)])));
        assert!(verdict.safe);
        assert_eq!(verdict.reason, None);
    }

    #[test]
    fn test_table_order_decides_reason() {
        // Both insult and threat exceed their thresholds; insult comes first.
        let scores = AttributeScores::from_raw(&raw(&[("THREAT", 0.95), ("INSULT", 0.75)]));
        let verdict = TextClassification::from_scores(scores);

        assert!(!verdict.safe);
        assert_eq!(verdict.reason.as_deref(), Some("insulting language"));
    }

    #[test]
    fn test_profanity_needs_point_eight() {
        let scores = AttributeScores::from_raw(&raw(&[("PROFANITY", 0.79)]));
        assert!(TextClassification::from_scores(scores).safe);

        let scores = AttributeScores::from_raw(&raw(&[("PROFANITY", 0.8)]));
        let verdict = TextClassification::from_scores(scores);
        assert_eq!(verdict.reason.as_deref(), Some("profanity"));
    }

    #[test]
    fn test_scores_serialize_with_api_names() {
        let scores = AttributeScores::from_raw(&raw(&[("SEVERE_TOXICITY", 0.25)]));
        let json = serde_json::to_value(&scores).unwrap();

        assert_eq!(json["SEVERE_TOXICITY"], json!(0.25));
        assert_eq!(json["TOXICITY"], json!(0.0));
    }

    #[test]
    fn test_image_verdict_passes_through_unmodified() {
        let value = json!({ "safe": false, "reason": "nudity", "confidence": 0.92 });
        let verdict = ImageClassification::from_untyped(&value).unwrap();

        assert_eq!(
            verdict,
            ImageClassification {
                safe: false,
                reason: Some("nudity".to_string()),
                confidence: 0.92,
            }
        );
    }

    #[test]
    fn test_image_verdict_defaults() {
        let verdict = ImageClassification::from_untyped(&json!({ "safe": true })).unwrap();
        assert!(verdict.safe);
        assert_eq!(verdict.reason, None);
        assert_eq!(verdict.confidence, 0.0);

        let verdict =
            ImageClassification::from_untyped(&json!({ "safe": true, "reason": "", "confidence": 3 }))
                .unwrap();
        assert_eq!(verdict.reason, None);
        assert_eq!(verdict.confidence, 1.0);
    }

    #[test]
    fn test_image_verdict_requires_boolean_safe() {
        assert!(matches!(
            ImageClassification::from_untyped(&json!({ "safe": "no" })),
            Err(ClassifierError::Malformed(_))
        ));
        assert!(matches!(
            ImageClassification::from_untyped(&json!({ "reason": "gore" })),
            Err(ClassifierError::Malformed(_))
        ));
        assert!(matches!(
            ImageClassification::from_untyped(&json!({ "safe": false, "reason": 7 })),
            Err(ClassifierError::Malformed(_))
        ));
    }

    #[test]
    fn test_fail_open_maps_every_error_to_safe() {
        let errors = vec![
            ClassifierError::Transport("connection refused".to_string()),
            ClassifierError::Status {
                status: 503,
                body: "unavailable".to_string(),
            },
            ClassifierError::Malformed("not json".to_string()),
            ClassifierError::Timeout(Duration::from_secs(5)),
        ];

        for err in errors {
            let verdict: TextClassification = fail_open(Err(err), "text");
            assert_eq!(verdict, TextClassification::safe());
        }

        let verdict: ImageClassification =
            fail_open(Err(ClassifierError::Malformed("x".to_string())), "image");
        assert_eq!(verdict, ImageClassification::safe());
    }

    #[test]
    fn test_fail_open_keeps_successful_verdicts() {
        let blocked = TextClassification::blocked("spam", AttributeScores::maximal());
        assert_eq!(fail_open(Ok(blocked.clone()), "text"), blocked);
    }
}
