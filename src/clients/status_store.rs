use std::{
    collections::HashMap,
    sync::atomic::{AtomicU32, Ordering},
};

use anyhow::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::status::DeliveryStatus;

/// A value written by the upstream consumer for one notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusObservation {
    pub status: String,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl StatusObservation {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Accepts either the JSON form or a bare status string.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str::<Self>(raw).unwrap_or_else(|_| Self {
            status: raw.trim().trim_matches('"').to_string(),
            timestamp: None,
        })
    }

    pub fn delivery_status(&self) -> Option<DeliveryStatus> {
        DeliveryStatus::from_observed(&self.status)
    }
}

/// Read side of the delivery-status store.
///
/// The verifier only ever reads; writes belong to the upstream consumer and
/// go through each backend's own `publish`.
#[async_trait]
pub trait DeliveryStatusStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<StatusObservation>, Error>;

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }

    fn backend(&self) -> &'static str;
}

#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    entries: RwLock<HashMap<String, StatusObservation>>,
    reads: AtomicU32,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, key: &str, status: &str) {
        debug!(key, status, "Delivery status published");

        self.entries
            .write()
            .await
            .insert(key.to_string(), StatusObservation::new(status));
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryStatusStore for InMemoryStatusStore {
    async fn read(&self, key: &str) -> Result<Option<StatusObservation>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.read().await.get(key).cloned())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
