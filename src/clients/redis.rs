use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use tracing::{debug, info};

use crate::{
    clients::status_store::{DeliveryStatusStore, StatusObservation},
    models::retry::RetryPolicy,
    retry::retry_with_backoff,
};

/// Delivery-status store backed by Redis string keys `delivery:{key}`.
pub struct RedisStatusStore {
    connection: MultiplexedConnection,
    ttl_seconds: u64,
    retry_policy: RetryPolicy,
}

impl RedisStatusStore {
    pub async fn connect(
        redis_url: &str,
        ttl_seconds: u64,
        retry_policy: RetryPolicy,
    ) -> Result<Self, Error> {
        info!("Connecting to Redis delivery-status store");

        let client = Client::open(redis_url)
            .map_err(|e| anyhow!("Failed to create redis client: {}", e))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| anyhow!("Failed to connect to redis: {}", e))?;

        info!("Redis connection established");

        Ok(Self {
            connection,
            ttl_seconds,
            retry_policy,
        })
    }

    fn key(key: &str) -> String {
        format!("delivery:{}", key)
    }

    /// Writes a status the way the upstream consumer does.
    pub async fn publish(&self, key: &str, status: &str) -> Result<(), Error> {
        let key = Self::key(key);
        let value = serde_json::to_string(&StatusObservation::new(status))?;

        retry_with_backoff(&self.retry_policy, || {
            let key = key.clone();
            let value = value.clone();
            let mut conn = self.connection.clone();
            let ttl = self.ttl_seconds;

            async move {
                conn.set_ex::<_, _, ()>(&key, value, ttl)
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await
        .map_err(|e| anyhow!("Failed to publish delivery status: {}", e))?;

        debug!(key = %key, status, "Delivery status published");

        Ok(())
    }
}

#[async_trait]
impl DeliveryStatusStore for RedisStatusStore {
    async fn read(&self, key: &str) -> Result<Option<StatusObservation>, Error> {
        let mut conn = self.connection.clone();

        let value: Option<String> = conn
            .get(Self::key(key))
            .await
            .map_err(|e| anyhow!("Failed to read delivery status: {}", e))?;

        Ok(value.as_deref().map(StatusObservation::parse))
    }

    async fn health_check(&self) -> Result<(), Error> {
        let mut conn = self.connection.clone();

        conn.ping::<String>()
            .await
            .map_err(|e| anyhow!("Redis ping failed: {}", e))?;

        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
