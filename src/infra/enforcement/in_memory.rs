// In-memory implementation of TrustStore.
//
// Used by tests and by deployments that don't need records to survive a
// restart. Each write happens under the DashMap entry lock for that user, so
// concurrent warnings for the same user are serialised.

use crate::core::enforcement::{
    BanRecord, EnforcementError, RecordedWarning, TrustStore, UserTrustRecord, WarningEntry,
};
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Default)]
pub struct InMemoryTrustStore {
    records: DashMap<u64, UserTrustRecord>,
}

impl InMemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with any trust history.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TrustStore for InMemoryTrustStore {
    async fn load_record(&self, user_id: u64) -> Result<UserTrustRecord, EnforcementError> {
        Ok(self
            .records
            .get(&user_id)
            .map(|r| r.value().clone())
            .unwrap_or_else(|| UserTrustRecord::new(user_id)))
    }

    async fn append_warning(
        &self,
        user_id: u64,
        warning: WarningEntry,
        ban: BanRecord,
    ) -> Result<RecordedWarning, EnforcementError> {
        let mut entry = self
            .records
            .entry(user_id)
            .or_insert_with(|| UserTrustRecord::new(user_id));
        let recorded = RecordedWarning::apply(entry.value().clone(), warning, ban);
        *entry = recorded.record.clone();
        Ok(recorded)
    }

    async fn mark_banned(&self, user_id: u64, ban: BanRecord) -> Result<bool, EnforcementError> {
        let mut entry = self
            .records
            .entry(user_id)
            .or_insert_with(|| UserTrustRecord::new(user_id));
        Ok(entry.apply_ban(ban))
    }
}
