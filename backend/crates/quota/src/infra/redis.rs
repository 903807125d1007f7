//! Redis Counter Implementation

use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::domain::repository::GuestIpCounter;
use crate::error::QuotaResult;

/// Redis-backed guest IP counters
///
/// The connection manager is created on first use, so an unreachable Redis
/// at startup does not prevent boot; until it connects every call errors
/// and the limiter fails open.
pub struct RedisGuestCounter {
    client: redis::Client,
    manager: OnceCell<ConnectionManager>,
}

impl RedisGuestCounter {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            manager: OnceCell::new(),
        }
    }

    /// Parse `url` without connecting
    pub fn open(url: &str) -> QuotaResult<Self> {
        Ok(Self::new(redis::Client::open(url)?))
    }

    async fn connection(&self) -> QuotaResult<ConnectionManager> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                let manager = ConnectionManager::new(self.client.clone()).await?;
                tracing::info!("Connected to Redis for guest rate limiting");
                Ok::<_, redis::RedisError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }
}

impl GuestIpCounter for RedisGuestCounter {
    async fn hit(&self, key: &str, ttl: Duration) -> QuotaResult<u64> {
        let mut conn = self.connection().await?;

        // MULTI/EXEC so the counter never exists without its expiry
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, ttl.as_secs().max(1) as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }

    async fn peek(&self, key: &str) -> QuotaResult<u64> {
        let mut conn = self.connection().await?;

        let count: Option<u64> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;

        Ok(count.unwrap_or(0))
    }
}
