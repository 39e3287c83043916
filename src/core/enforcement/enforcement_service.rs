// Enforcement service - turns blocked submissions into warnings and bans.
// NO storage code here - persistence goes through the TrustStore port.

use super::enforcement_models::{
    BanRecord, ContentType, EnforcementOutcome, RecordedWarning, UserTrustRecord, WarningEntry,
    BAN_REASON,
};
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum EnforcementError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid user ID")]
    InvalidId,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence for per-user trust records.
///
/// Only the trust fields of a user are touched here. Writes are narrow and
/// atomic so concurrent warnings for the same user can't overwrite each
/// other, and a record never holds `BAN_THRESHOLD` warnings without a ban.
#[async_trait]
pub trait TrustStore: Send + Sync {
    /// Current record for `user_id`. Unknown users get an empty record.
    async fn load_record(&self, user_id: u64) -> Result<UserTrustRecord, EnforcementError>;

    /// Atomically append a warning and return the record as it is afterwards.
    ///
    /// If the warning brings an unbanned user to `BAN_THRESHOLD`, `ban` is
    /// applied in the same write (see [`RecordedWarning::apply`]). Either
    /// both land or neither does.
    async fn append_warning(
        &self,
        user_id: u64,
        warning: WarningEntry,
        ban: BanRecord,
    ) -> Result<RecordedWarning, EnforcementError>;

    /// Ban `user_id` unless already banned, regardless of warning count.
    ///
    /// Returns `true` only when this call set the flag. Never clears a ban.
    async fn mark_banned(&self, user_id: u64, ban: BanRecord) -> Result<bool, EnforcementError>;
}

#[async_trait]
impl TrustStore for Box<dyn TrustStore> {
    async fn load_record(&self, user_id: u64) -> Result<UserTrustRecord, EnforcementError> {
        (**self).load_record(user_id).await
    }

    async fn append_warning(
        &self,
        user_id: u64,
        warning: WarningEntry,
        ban: BanRecord,
    ) -> Result<RecordedWarning, EnforcementError> {
        (**self).append_warning(user_id, warning, ban).await
    }

    async fn mark_banned(&self, user_id: u64, ban: BanRecord) -> Result<bool, EnforcementError> {
        (**self).mark_banned(user_id, ban).await
    }
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct EnforcementService<S: TrustStore> {
    store: S,
}

impl<S: TrustStore> EnforcementService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record a policy violation for `user_id` and escalate if needed.
    ///
    /// Reaching `BAN_THRESHOLD` warnings bans the user. Banned users keep
    /// collecting warnings and stay banned.
    pub async fn record_warning(
        &self,
        user_id: u64,
        reason: &str,
        content_type: ContentType,
    ) -> Result<EnforcementOutcome, EnforcementError> {
        if user_id == 0 {
            return Err(EnforcementError::InvalidId);
        }

        let now = Utc::now();
        let warning = WarningEntry {
            reason: reason.to_string(),
            content_type,
            date: now,
        };
        let ban = BanRecord {
            reason: BAN_REASON.to_string(),
            since: now,
        };
        let RecordedWarning {
            record,
            newly_banned,
        } = self.store.append_warning(user_id, warning, ban).await?;

        tracing::info!(
            user_id,
            reason,
            content_type = %content_type,
            warnings = record.warning_count(),
            "Recorded warning"
        );
        if newly_banned {
            tracing::warn!(
                user_id,
                warnings = record.warning_count(),
                "User banned for {}",
                BAN_REASON
            );
        }

        Ok(EnforcementOutcome {
            user_id,
            warning_count: record.warning_count(),
            state: record.state(),
            newly_banned,
        })
    }

    /// Read-only view of a user's record.
    pub async fn trust_record(&self, user_id: u64) -> Result<UserTrustRecord, EnforcementError> {
        if user_id == 0 {
            return Err(EnforcementError::InvalidId);
        }
        self.store.load_record(user_id).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
