// SQLite-backed trust store.
//
// Tables:
// - user_trust: one row per banned user (flag, reason, timestamp)
// - user_warnings: append-only warning log
//
// Only trust data lives here; the rest of the user entity is owned elsewhere.

use crate::core::enforcement::{
    BanRecord, EnforcementError, RecordedWarning, TrustStore, UserTrustRecord, WarningEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

pub struct SqliteTrustStore {
    pool: Pool<Sqlite>,
}

fn storage_error(e: sqlx::Error) -> EnforcementError {
    EnforcementError::StorageError(e.to_string())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, EnforcementError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EnforcementError::StorageError(format!("bad timestamp {:?}: {}", raw, e)))
}

impl SqliteTrustStore {
    /// Open (creating if needed) the database at `database_url` and migrate it.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new().connect(&conn_str).await?;

        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool. Call [`migrate`](Self::migrate) before use.
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), EnforcementError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_trust (
                user_id INTEGER PRIMARY KEY,
                is_banned BOOLEAN NOT NULL DEFAULT 0,
                ban_reason TEXT,
                banned_at TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_warnings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                reason TEXT NOT NULL,
                content_type TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_user_warnings_user
                ON user_warnings(user_id, id);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn fetch_record(
        conn: &mut SqliteConnection,
        user_id: u64,
    ) -> Result<UserTrustRecord, EnforcementError> {
        let ban_row = sqlx::query(
            r#"
            SELECT ban_reason, banned_at
            FROM user_trust
            WHERE user_id = ? AND is_banned = 1
            "#,
        )
        .bind(user_id as i64)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        let ban = match ban_row {
            Some(row) => {
                let reason: Option<String> = row.get("ban_reason");
                let banned_at: Option<String> = row.get("banned_at");
                Some(BanRecord {
                    reason: reason.unwrap_or_default(),
                    since: match banned_at {
                        Some(raw) => parse_timestamp(&raw)?,
                        None => Utc::now(),
                    },
                })
            }
            None => None,
        };

        let rows = sqlx::query(
            r#"
            SELECT reason, content_type, created_at
            FROM user_warnings
            WHERE user_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(user_id as i64)
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_error)?;

        let mut warnings = Vec::with_capacity(rows.len());
        for row in rows {
            let content_type: String = row.get("content_type");
            let created_at: String = row.get("created_at");
            warnings.push(WarningEntry {
                reason: row.get("reason"),
                content_type: content_type.parse().map_err(|e: String| {
                    EnforcementError::StorageError(format!(
                        "bad content type {:?}: {}",
                        content_type, e
                    ))
                })?,
                date: parse_timestamp(&created_at)?,
            });
        }

        Ok(UserTrustRecord::from_parts(user_id, warnings, ban))
    }

    /// Set the ban flag unless it is already set. Returns `true` if this
    /// statement flipped it.
    async fn insert_ban(
        conn: &mut SqliteConnection,
        user_id: u64,
        ban: &BanRecord,
    ) -> Result<bool, EnforcementError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_trust (user_id, is_banned, ban_reason, banned_at)
            VALUES (?, 1, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                is_banned = 1,
                ban_reason = excluded.ban_reason,
                banned_at = excluded.banned_at
            WHERE user_trust.is_banned = 0
            "#,
        )
        .bind(user_id as i64)
        .bind(&ban.reason)
        .bind(ban.since.to_rfc3339())
        .execute(&mut *conn)
        .await
        .map_err(storage_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TrustStore for SqliteTrustStore {
    async fn load_record(&self, user_id: u64) -> Result<UserTrustRecord, EnforcementError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        Self::fetch_record(&mut conn, user_id).await
    }

    async fn append_warning(
        &self,
        user_id: u64,
        warning: WarningEntry,
        ban: BanRecord,
    ) -> Result<RecordedWarning, EnforcementError> {
        // Insert, read back and ban in one transaction: the warning that
        // reaches the threshold is never committed without the ban.
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query(
            r#"
            INSERT INTO user_warnings (user_id, reason, content_type, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id as i64)
        .bind(&warning.reason)
        .bind(warning.content_type.to_string())
        .bind(warning.date.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        let mut record = Self::fetch_record(&mut tx, user_id).await?;
        let mut newly_banned = false;
        if record.should_ban() {
            newly_banned = Self::insert_ban(&mut tx, user_id, &ban).await?;
            record.apply_ban(ban);
        }
        tx.commit().await.map_err(storage_error)?;

        Ok(RecordedWarning {
            record,
            newly_banned,
        })
    }

    async fn mark_banned(&self, user_id: u64, ban: BanRecord) -> Result<bool, EnforcementError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        Self::insert_ban(&mut conn, user_id, &ban).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::enforcement::{ContentType, EnforcementService, TrustState, BAN_REASON};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open(dir: &TempDir) -> SqliteTrustStore {
        let path = dir.path().join("trust.db");
        SqliteTrustStore::new(path.to_str().unwrap()).await.unwrap()
    }

    fn warning(reason: &str, content_type: ContentType) -> WarningEntry {
        WarningEntry {
            reason: reason.to_string(),
            content_type,
            date: Utc::now(),
        }
    }

    fn threshold_ban() -> BanRecord {
        BanRecord {
            reason: BAN_REASON.to_string(),
            since: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_load() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        assert_eq!(store.load_record(5).await.unwrap().state(), TrustState::Clean);

        store
            .append_warning(5, warning("spam", ContentType::Comment), threshold_ban())
            .await
            .unwrap();
        let recorded = store
            .append_warning(5, warning("nudity", ContentType::Image), threshold_ban())
            .await
            .unwrap();
        let record = recorded.record;

        assert_eq!(record.warning_count(), 2);
        assert_eq!(record.warnings()[0].reason, "spam");
        assert_eq!(record.warnings()[1].content_type, ContentType::Image);
        assert_eq!(store.load_record(5).await.unwrap(), record);
        assert_eq!(store.load_record(6).await.unwrap().warning_count(), 0);
        assert!(!recorded.newly_banned);
    }

    #[tokio::test]
    async fn test_threshold_warning_commits_with_ban() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        for expected in 1..=2 {
            let recorded = store
                .append_warning(14, warning("spam", ContentType::Comment), threshold_ban())
                .await
                .unwrap();
            assert_eq!(recorded.record.state(), TrustState::Warned(expected));
            assert!(!recorded.newly_banned);
        }

        let third = store
            .append_warning(14, warning("spam", ContentType::Comment), threshold_ban())
            .await
            .unwrap();
        assert!(third.newly_banned);
        assert_eq!(third.record.state(), TrustState::Banned);
        assert_eq!(store.load_record(14).await.unwrap(), third.record);

        let fourth = store
            .append_warning(14, warning("spam", ContentType::Comment), threshold_ban())
            .await
            .unwrap();
        assert!(!fourth.newly_banned);
        assert_eq!(fourth.record.warning_count(), 4);
        assert_eq!(fourth.record.state(), TrustState::Banned);
    }

    #[tokio::test]
    async fn test_unknown_content_type_is_a_storage_error() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        sqlx::query(
            "INSERT INTO user_warnings (user_id, reason, content_type, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(17_i64)
        .bind("spam")
        .bind("video")
        .bind(Utc::now().to_rfc3339())
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store.load_record(17).await.unwrap_err();
        assert!(matches!(err, EnforcementError::StorageError(ref msg) if msg.contains("video")));
    }

    #[tokio::test]
    async fn test_ban_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        let first = BanRecord {
            reason: BAN_REASON.to_string(),
            since: Utc::now(),
        };
        let second = BanRecord {
            reason: "Something else".to_string(),
            since: Utc::now(),
        };

        assert!(store.mark_banned(9, first).await.unwrap());
        assert!(!store.mark_banned(9, second).await.unwrap());

        let record = store.load_record(9).await.unwrap();
        assert!(record.is_banned());
        assert_eq!(record.ban_reason(), Some(BAN_REASON));
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let service = EnforcementService::new(open(&dir).await);
            for _ in 0..3 {
                service
                    .record_warning(21, "profane language", ContentType::Comment)
                    .await
                    .unwrap();
            }
        }

        let reopened = open(&dir).await;
        let record = reopened.load_record(21).await.unwrap();

        assert_eq!(record.warning_count(), 3);
        assert_eq!(record.state(), TrustState::Banned);
        assert_eq!(record.ban_reason(), Some(BAN_REASON));
    }

    #[tokio::test]
    async fn test_concurrent_warnings_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let service = Arc::new(EnforcementService::new(open(&dir).await));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .record_warning(33, "spam", ContentType::Comment)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut newly_banned = 0;
        for handle in handles {
            if handle.await.unwrap().newly_banned {
                newly_banned += 1;
            }
        }

        let record = service.trust_record(33).await.unwrap();
        assert_eq!(record.warning_count(), 6);
        assert!(record.is_banned());
        assert_eq!(newly_banned, 1);
    }
}
