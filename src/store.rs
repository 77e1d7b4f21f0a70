//! Verdict store - durable, authoritative hash -> verdict mapping

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::VerdictRecord;

/// Durable source of truth for verdicts.
#[async_trait]
pub trait VerdictStore: Send + Sync {
    async fn find(&self, hash: &str) -> Result<Option<VerdictRecord>, StoreError>;

    /// Insert a verdict. Re-inserting an existing hash overwrites it
    /// (last write wins). Callers must only insert levels >= 0.
    async fn insert(&self, record: &VerdictRecord) -> Result<(), StoreError>;
}

/// PostgreSQL-backed store
pub struct PgVerdictStore {
    pool: PgPool,
}

impl PgVerdictStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerdictStore for PgVerdictStore {
    async fn find(&self, hash: &str) -> Result<Option<VerdictRecord>, StoreError> {
        let record = sqlx::query_as::<_, VerdictRecord>(
            "SELECT hash, risk_level FROM verdicts WHERE hash = $1"
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert(&self, record: &VerdictRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO verdicts (hash, risk_level)
            VALUES ($1, $2)
            ON CONFLICT (hash) DO UPDATE SET
                risk_level = EXCLUDED.risk_level,
                updated_at = NOW()
            "#
        )
        .bind(&record.hash)
        .bind(record.risk_level)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
