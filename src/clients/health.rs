use std::{collections::BTreeMap, sync::Arc, time::Instant};

use tracing::{debug, warn};

use crate::{
    clients::{
        channel::AdapterRegistry, schema_store::SchemaStore, status_store::DeliveryStatusStore,
    },
    models::{
        channel::Channel,
        health::{ComponentHealth, HealthReport},
    },
};

const CRITICAL_CHECKS: [&str; 2] = ["delivery_status_store", "schema_store"];

pub struct HealthChecker {
    status_store: Arc<dyn DeliveryStatusStore>,
    schema_store: Arc<SchemaStore>,
    adapters: AdapterRegistry,
}

impl HealthChecker {
    pub fn new(
        status_store: Arc<dyn DeliveryStatusStore>,
        schema_store: Arc<SchemaStore>,
        adapters: AdapterRegistry,
    ) -> Self {
        Self {
            status_store,
            schema_store,
            adapters,
        }
    }

    pub async fn check_all(&self) -> HealthReport {
        let mut checks = BTreeMap::new();

        checks.insert(
            "delivery_status_store".to_string(),
            self.check_status_store().await,
        );
        checks.insert("schema_store".to_string(), self.check_schema_store());
        checks.insert("channel_adapters".to_string(), self.check_adapters());

        HealthReport::from_checks(checks, &CRITICAL_CHECKS)
    }

    async fn check_status_store(&self) -> ComponentHealth {
        let start = Instant::now();
        let backend = self.status_store.backend();

        match self.status_store.health_check().await {
            Ok(()) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(
                    backend,
                    response_time_ms = elapsed,
                    "Delivery-status store health check passed"
                );
                ComponentHealth::healthy(elapsed).with_detail(backend)
            }
            Err(e) => {
                warn!(backend, error = %e, "Delivery-status store health check failed");
                ComponentHealth::unhealthy(format!("{} store unavailable: {}", backend, e))
            }
        }
    }

    fn check_schema_store(&self) -> ComponentHealth {
        let count = self.schema_store.contract_count();

        if count == 0 {
            return ComponentHealth::unhealthy("No schema contracts loaded");
        }

        ComponentHealth::healthy(0).with_detail(format!("{} contracts", count))
    }

    fn check_adapters(&self) -> ComponentHealth {
        let registered = self.adapters.channels();
        let missing: Vec<&str> = Channel::ALL
            .iter()
            .filter(|channel| !registered.contains(channel))
            .map(Channel::as_str)
            .collect();

        if registered.is_empty() {
            ComponentHealth::unhealthy("No channel adapters configured")
        } else if missing.is_empty() {
            ComponentHealth::healthy(0)
        } else {
            ComponentHealth::degraded(format!("Not configured: {}", missing.join(", ")))
        }
    }
}
