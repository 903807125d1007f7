//! PostgreSQL Repository Implementation

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::{BucketIdentity, BucketWindow, RateLimitBucket};
use crate::domain::repository::UsageCounterRepository;
use crate::domain::value_objects::{ResourceType, SessionHash};
use crate::error::{QuotaError, QuotaResult};

/// PostgreSQL-backed usage counters (`rate_limits` table)
#[derive(Clone)]
pub struct PgUsageRepository {
    pool: PgPool,
}

impl PgUsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UsageCounterRepository for PgUsageRepository {
    async fn increment(
        &self,
        identity: &BucketIdentity,
        resource_type: &ResourceType,
        window: &BucketWindow,
    ) -> QuotaResult<i64> {
        // Each partial unique index covers one identity column; the conflict
        // target must name the matching predicate.
        let count: i64 = match identity {
            BucketIdentity::User(user_id) => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO rate_limits (
                        user_id,
                        session_hash,
                        resource_type,
                        bucket_start,
                        bucket_end,
                        count
                    ) VALUES ($1, NULL, $2, $3, $4, 1)
                    ON CONFLICT (user_id, resource_type, bucket_start)
                        WHERE session_hash IS NULL
                    DO UPDATE SET
                        count = rate_limits.count + 1,
                        updated_at = NOW()
                    RETURNING count
                    "#,
                )
                .bind(user_id.as_uuid())
                .bind(resource_type.as_str())
                .bind(window.start)
                .bind(window.end)
                .fetch_one(&self.pool)
                .await?
            }
            BucketIdentity::Session(hash) => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO rate_limits (
                        user_id,
                        session_hash,
                        resource_type,
                        bucket_start,
                        bucket_end,
                        count
                    ) VALUES (NULL, $1, $2, $3, $4, 1)
                    ON CONFLICT (session_hash, resource_type, bucket_start)
                        WHERE user_id IS NULL
                    DO UPDATE SET
                        count = rate_limits.count + 1,
                        updated_at = NOW()
                    RETURNING count
                    "#,
                )
                .bind(hash.as_str())
                .bind(resource_type.as_str())
                .bind(window.start)
                .bind(window.end)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(count)
    }

    async fn find(
        &self,
        identity: &BucketIdentity,
        resource_type: &ResourceType,
        bucket_start: DateTime<Utc>,
    ) -> QuotaResult<Option<RateLimitBucket>> {
        let row = match identity {
            BucketIdentity::User(user_id) => {
                sqlx::query_as::<_, BucketRow>(
                    r#"
                    SELECT
                        user_id,
                        session_hash,
                        resource_type,
                        bucket_start,
                        bucket_end,
                        count
                    FROM rate_limits
                    WHERE user_id = $1
                      AND session_hash IS NULL
                      AND resource_type = $2
                      AND bucket_start = $3
                    "#,
                )
                .bind(user_id.as_uuid())
                .bind(resource_type.as_str())
                .bind(bucket_start)
                .fetch_optional(&self.pool)
                .await?
            }
            BucketIdentity::Session(hash) => {
                sqlx::query_as::<_, BucketRow>(
                    r#"
                    SELECT
                        user_id,
                        session_hash,
                        resource_type,
                        bucket_start,
                        bucket_end,
                        count
                    FROM rate_limits
                    WHERE session_hash = $1
                      AND user_id IS NULL
                      AND resource_type = $2
                      AND bucket_start = $3
                    "#,
                )
                .bind(hash.as_str())
                .bind(resource_type.as_str())
                .bind(bucket_start)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(|r| r.into_bucket()).transpose()
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct BucketRow {
    user_id: Option<Uuid>,
    session_hash: Option<String>,
    resource_type: String,
    bucket_start: DateTime<Utc>,
    bucket_end: DateTime<Utc>,
    count: i64,
}

impl BucketRow {
    fn into_bucket(self) -> QuotaResult<RateLimitBucket> {
        let identity = match (self.user_id, self.session_hash) {
            (Some(user_id), None) => BucketIdentity::User(UserId::from_uuid(user_id)),
            (None, Some(hash)) => BucketIdentity::Session(SessionHash::from_hex(hash)),
            _ => {
                return Err(QuotaError::CorruptRow(
                    "exactly one of user_id and session_hash must be set".to_string(),
                ));
            }
        };
        if self.count < 0 {
            return Err(QuotaError::CorruptRow(format!("negative count {}", self.count)));
        }

        Ok(RateLimitBucket {
            identity,
            resource_type: ResourceType::new(self.resource_type),
            bucket_start: self.bucket_start,
            bucket_end: self.bucket_end,
            count: self.count,
        })
    }
}
