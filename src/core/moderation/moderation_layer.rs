// Core moderation module - decides whether a submission is allowed.
//
// Text goes through the local lexicon first and only then to the external
// classifier; images go straight to the vision classifier.

pub mod classifier_models;
pub mod image_classifier;
pub mod lexicon;
pub mod moderation_service;
pub mod normalizer;
pub mod text_classifier;

pub use classifier_models::*;
pub use image_classifier::{ImageClassifier, ImageInspector, IMAGE_POLICY_PROMPT};
pub use lexicon::{FuzzyConfig, Lexicon, LexiconHit, LexiconMatcher, MatchKind};
pub use moderation_service::{ModerationService, PROFANITY_REASON};
pub use normalizer::normalize;
pub use text_classifier::{TextClassifier, TextScoringOracle};
