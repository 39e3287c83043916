// Moderation decision aggregator - one verdict per submission.
//
// Text path: the local lexicon runs first and is final when it matches; the
// external classifier is only consulted when the lexicon finds nothing.
// Image path: straight to the vision classifier.
//
// NO HTTP or storage here - the classifiers are injected.

use super::classifier_models::{AttributeScores, ImageClassification, TextClassification};
use super::image_classifier::{ImageClassifier, ImageInspector};
use super::lexicon::LexiconMatcher;
use super::text_classifier::{TextClassifier, TextScoringOracle};

/// Reason reported when the lexicon blocks text.
pub const PROFANITY_REASON: &str = "profane language";

pub struct ModerationService<T: TextScoringOracle, I: ImageInspector> {
    lexicon: LexiconMatcher,
    text: TextClassifier<T>,
    image: ImageClassifier<I>,
}

impl<T: TextScoringOracle, I: ImageInspector> ModerationService<T, I> {
    pub fn new(lexicon: LexiconMatcher, text: TextClassifier<T>, image: ImageClassifier<I>) -> Self {
        Self {
            lexicon,
            text,
            image,
        }
    }

    /// Decide whether a piece of text may be published.
    ///
    /// A lexicon hit is fail-closed: it blocks with maximal scores and the
    /// external classifier is never called. Otherwise the classifier decides,
    /// failing open on any error.
    pub async fn moderate_text(&self, text: &str) -> TextClassification {
        if let Some(hit) = self.lexicon.match_bad_content(text) {
            tracing::info!(term = %hit.term, kind = ?hit.kind, "Lexicon blocked text");
            return TextClassification::blocked(PROFANITY_REASON, AttributeScores::maximal());
        }

        let verdict = self.text.classify_text(text).await;
        if !verdict.safe {
            tracing::info!(reason = ?verdict.reason, "Text classifier blocked text");
        }
        verdict
    }

    /// Decide whether an uploaded image may be published.
    pub async fn moderate_image(&self, image_url: &str) -> ImageClassification {
        let verdict = self.image.classify_image(image_url).await;
        if !verdict.safe {
            tracing::info!(
                reason = ?verdict.reason,
                confidence = verdict.confidence,
                "Image classifier blocked image"
            );
        }
        verdict
    }
}
