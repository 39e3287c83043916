// This is the entry point of the enforcement engine.
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Feed submissions from stdin through moderation and enforcement
//
// Input is one submission per line:
//   text <user_id> <content>
//   image <user_id> <url>
// and each line produces one JSON object on stdout.

use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use trust_safety_engine::config::EngineConfig;
use trust_safety_engine::core::enforcement::{ContentType, EnforcementService, TrustStore};
use trust_safety_engine::core::moderation::{
    ImageClassifier, ImageInspector, Lexicon, LexiconMatcher, ModerationService, TextClassifier,
    TextScoringOracle,
};
use trust_safety_engine::infra::enforcement::{InMemoryTrustStore, SqliteTrustStore};
use trust_safety_engine::infra::moderation::{GeminiVisionClient, PerspectiveClient};

type Moderation = ModerationService<Box<dyn TextScoringOracle>, Box<dyn ImageInspector>>;
type Enforcement = EnforcementService<Box<dyn TrustStore>>;

/// Fallback reason when a classifier blocks without naming one.
const GENERIC_REASON: &str = "policy violation";

#[derive(Debug, PartialEq)]
enum Submission {
    Text { user_id: u64, content: String },
    Image { user_id: u64, url: String },
}

fn parse_submission(line: &str) -> Result<Submission, String> {
    let mut fields = line.trim().splitn(3, char::is_whitespace);
    let kind = fields.next().unwrap_or_default();
    let user_id = fields
        .next()
        .ok_or_else(|| "missing user id".to_string())?
        .parse::<u64>()
        .map_err(|e| format!("invalid user id: {}", e))?;
    let payload = fields.next().unwrap_or_default().trim().to_string();

    match kind {
        "text" => Ok(Submission::Text {
            user_id,
            content: payload,
        }),
        "image" => Ok(Submission::Image {
            user_id,
            url: payload,
        }),
        other => Err(format!("unknown submission kind {:?}", other)),
    }
}

async fn handle_submission(
    moderation: &Moderation,
    enforcement: &Enforcement,
    submission: Submission,
) -> anyhow::Result<serde_json::Value> {
    let (user_id, content_type, safe, reason, verdict) = match submission {
        Submission::Text { user_id, content } => {
            let verdict = moderation.moderate_text(&content).await;
            (
                user_id,
                ContentType::Comment,
                verdict.safe,
                verdict.reason.clone(),
                serde_json::to_value(&verdict)?,
            )
        }
        Submission::Image { user_id, url } => {
            let verdict = moderation.moderate_image(&url).await;
            (
                user_id,
                ContentType::Image,
                verdict.safe,
                verdict.reason.clone(),
                serde_json::to_value(&verdict)?,
            )
        }
    };

    if safe {
        return Ok(json!({ "user_id": user_id, "verdict": verdict }));
    }

    let reason = reason.unwrap_or_else(|| GENERIC_REASON.to_string());
    let outcome = enforcement
        .record_warning(user_id, &reason, content_type)
        .await?;
    let notice = outcome.notice(&reason);

    Ok(json!({
        "user_id": user_id,
        "verdict": verdict,
        "enforcement": outcome,
        "notice": notice,
    }))
}

fn build_moderation(config: &EngineConfig) -> anyhow::Result<Moderation> {
    let lexicon = match &config.lexicon_file {
        Some(path) => {
            tracing::info!("Loading lexicon from {}", path.display());
            Lexicon::from_json_file(path)?
        }
        None => Lexicon::default(),
    };

    let text_oracle: Option<Box<dyn TextScoringOracle>> = match &config.perspective_api_key {
        Some(key) => Some(Box::new(PerspectiveClient::new(
            key.clone(),
            config.classifier_timeout,
        )?)),
        None => {
            tracing::warn!("PERSPECTIVE_API_KEY not set, text classification disabled");
            None
        }
    };

    let image_inspector: Option<Box<dyn ImageInspector>> = match &config.gemini_api_key {
        Some(key) => Some(Box::new(GeminiVisionClient::new(
            key.clone(),
            config.gemini_vision_model.clone(),
            config.classifier_timeout,
        )?)),
        None => {
            tracing::warn!("GEMINI_API_KEY not set, image classification disabled");
            None
        }
    };

    Ok(ModerationService::new(
        LexiconMatcher::new(lexicon, config.fuzzy),
        TextClassifier::new(text_oracle, config.classifier_timeout),
        ImageClassifier::new(image_inspector, config.classifier_timeout),
    ))
}

async fn build_trust_store(config: &EngineConfig) -> anyhow::Result<Box<dyn TrustStore>> {
    if config.uses_in_memory_store() {
        tracing::warn!("Using in-memory trust store, records will not survive a restart");
        return Ok(Box::new(InMemoryTrustStore::new()));
    }

    tracing::info!("Opening trust store at {}", config.trust_db_path);
    Ok(Box::new(SqliteTrustStore::new(&config.trust_db_path).await?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (so we can see what's happening)
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = EngineConfig::from_env();
    let moderation = build_moderation(&config)?;
    let enforcement = EnforcementService::new(build_trust_store(&config).await?);

    tracing::info!("Engine ready, reading submissions from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let output = match parse_submission(&line) {
            Ok(submission) => handle_submission(&moderation, &enforcement, submission)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("Failed to process submission: {}", e);
                    json!({ "error": e.to_string() })
                }),
            Err(e) => {
                tracing::warn!("Skipping malformed line: {}", e);
                json!({ "error": e })
            }
        };

        println!("{}", output);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trust_safety_engine::core::enforcement::TrustState;
    use trust_safety_engine::core::moderation::FuzzyConfig;

    fn offline_engine() -> (Moderation, Enforcement) {
        let moderation = ModerationService::new(
            LexiconMatcher::new(Lexicon::default(), FuzzyConfig::default()),
            TextClassifier::new(None, std::time::Duration::from_secs(5)),
            ImageClassifier::new(None, std::time::Duration::from_secs(5)),
        );
        let store: Box<dyn TrustStore> = Box::new(InMemoryTrustStore::new());
        (moderation, EnforcementService::new(store))
    }

    #[test]
    fn test_parse_submission() {
        assert_eq!(
            parse_submission("text 42 hello there  world"),
            Ok(Submission::Text {
                user_id: 42,
                content: "hello there  world".to_string()
            })
        );
        assert_eq!(
            parse_submission("image 7 https://cdn.example/a.png"),
            Ok(Submission::Image {
                user_id: 7,
                url: "https://cdn.example/a.png".to_string()
            })
        );
        assert_eq!(
            parse_submission("text 3"),
            Ok(Submission::Text {
                user_id: 3,
                content: String::new()
            })
        );
        assert!(parse_submission("video 1 x").is_err());
        assert!(parse_submission("text abc hi").is_err());
        assert!(parse_submission("text").is_err());
    }

    #[tokio::test]
    async fn test_clean_submission_has_no_enforcement() {
        let (moderation, enforcement) = offline_engine();

        let output = handle_submission(
            &moderation,
            &enforcement,
            parse_submission("text 1 have a nice day").unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(output["verdict"]["safe"], true);
        assert!(output.get("enforcement").is_none());
    }

    #[tokio::test]
    async fn test_third_profane_submission_suspends() {
        let (moderation, enforcement) = offline_engine();

        let mut output = serde_json::Value::Null;
        for _ in 0..3 {
            output = handle_submission(
                &moderation,
                &enforcement,
                parse_submission("text 5 u bhnchod").unwrap(),
            )
            .await
            .unwrap();
        }

        assert_eq!(output["verdict"]["safe"], false);
        assert_eq!(output["enforcement"]["warning_count"], 3);
        assert_eq!(output["enforcement"]["newly_banned"], true);
        assert!(output["notice"]
            .as_str()
            .unwrap()
            .starts_with("Blocked: profane language."));

        let record = enforcement.trust_record(5).await.unwrap();
        assert_eq!(record.state(), TrustState::Banned);
    }
}
