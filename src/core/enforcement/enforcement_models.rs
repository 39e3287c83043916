// Enforcement domain models - per-user trust records and their states.
//
// These are pure domain types with no storage dependencies.
// Stores persist them; the service decides how they change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Total warnings at which a user is banned.
pub const BAN_THRESHOLD: u32 = 3;

/// Ban reason recorded when the threshold is crossed.
pub const BAN_REASON: &str = "Multiple policy violations";

/// What kind of submission earned a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Comment,
    Image,
    Other,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Comment => write!(f, "comment"),
            ContentType::Image => write!(f, "image"),
            ContentType::Other => write!(f, "other"),
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "comment" => Ok(ContentType::Comment),
            "image" => Ok(ContentType::Image),
            "other" => Ok(ContentType::Other),
            other => Err(format!("unknown content type: {}", other)),
        }
    }
}

/// One recorded policy violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningEntry {
    pub reason: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub date: DateTime<Utc>,
}

/// Why and since when a user is banned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanRecord {
    pub reason: String,
    pub since: DateTime<Utc>,
}

/// Where a user sits on the escalation ladder.
///
/// `Banned` is absorbing: nothing in this crate moves a user out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "warnings", rename_all = "lowercase")]
pub enum TrustState {
    Clean,
    Warned(u32),
    Banned,
}

/// A user's persistent trust record.
///
/// Warnings only ever grow and a ban is never lifted from here; fields are
/// private so the only ways to change a record are [`push_warning`] and
/// [`apply_ban`].
///
/// [`push_warning`]: UserTrustRecord::push_warning
/// [`apply_ban`]: UserTrustRecord::apply_ban
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTrustRecord {
    user_id: u64,
    warnings: Vec<WarningEntry>,
    ban: Option<BanRecord>,
}

impl UserTrustRecord {
    /// A user with no history.
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            warnings: Vec::new(),
            ban: None,
        }
    }

    /// Rebuild a record from storage.
    pub fn from_parts(user_id: u64, warnings: Vec<WarningEntry>, ban: Option<BanRecord>) -> Self {
        Self {
            user_id,
            warnings,
            ban,
        }
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn warnings(&self) -> &[WarningEntry] {
        &self.warnings
    }

    pub fn warning_count(&self) -> u32 {
        self.warnings.len() as u32
    }

    pub fn is_banned(&self) -> bool {
        self.ban.is_some()
    }

    pub fn ban_reason(&self) -> Option<&str> {
        self.ban.as_ref().map(|b| b.reason.as_str())
    }

    pub fn ban(&self) -> Option<&BanRecord> {
        self.ban.as_ref()
    }

    pub fn state(&self) -> TrustState {
        if self.is_banned() {
            TrustState::Banned
        } else if self.warnings.is_empty() {
            TrustState::Clean
        } else {
            TrustState::Warned(self.warning_count())
        }
    }

    /// Has the record reached the threshold without being banned yet?
    pub fn should_ban(&self) -> bool {
        !self.is_banned() && self.warning_count() >= BAN_THRESHOLD
    }

    /// Append a warning. Returns the new total.
    pub fn push_warning(&mut self, warning: WarningEntry) -> u32 {
        self.warnings.push(warning);
        self.warning_count()
    }

    /// Ban the user. Returns `true` only if this call flipped the flag; an
    /// existing ban (and its original reason) is left untouched.
    pub fn apply_ban(&mut self, ban: BanRecord) -> bool {
        if self.ban.is_some() {
            return false;
        }
        self.ban = Some(ban);
        true
    }
}

/// Result of appending a warning: the record afterwards, and whether that
/// same write is the one that banned the user.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWarning {
    pub record: UserTrustRecord,
    pub newly_banned: bool,
}

impl RecordedWarning {
    /// Append `warning` to `record`, banning with `ban` if the threshold is
    /// now reached. Stores call this on their own copy while holding
    /// whatever lock makes the write atomic.
    pub fn apply(mut record: UserTrustRecord, warning: WarningEntry, ban: BanRecord) -> Self {
        record.push_warning(warning);
        let newly_banned = record.should_ban() && record.apply_ban(ban);
        Self {
            record,
            newly_banned,
        }
    }
}

/// What `record_warning` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcementOutcome {
    pub user_id: u64,
    /// Total warnings after this one.
    pub warning_count: u32,
    pub state: TrustState,
    /// `true` only on the call that moved the user into `Banned`.
    pub newly_banned: bool,
}

impl EnforcementOutcome {
    pub fn is_banned(&self) -> bool {
        self.state == TrustState::Banned
    }

    /// User-facing message for a blocked submission.
    pub fn notice(&self, reason: &str) -> String {
        if self.is_banned() {
            format!(
                "Blocked: {}. Your account has been suspended after {}/{} warnings for multiple policy violations.",
                reason, self.warning_count, BAN_THRESHOLD
            )
        } else {
            format!(
                "Blocked: {}. Warning {}/{}.",
                reason, self.warning_count, BAN_THRESHOLD
            )
        }
    }
}
