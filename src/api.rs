use std::{collections::BTreeMap, path::Path, sync::Arc};

use anyhow::{Error, Result, anyhow};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    clients::{
        channel::{AdapterRegistry, ChannelAdapter},
        health::HealthChecker,
        http::HttpChannelAdapter,
        redis::RedisStatusStore,
        schema_store::SchemaStore,
        status_store::{DeliveryStatusStore, InMemoryStatusStore},
        stub::StubChannelAdapter,
    },
    config::{AdapterMode, Config},
    coordinator::DispatchCoordinator,
    models::{
        channel::Channel,
        error::DispatchError,
        health::HealthStatus,
        request::{NotificationRequest, Payload, SubmitOptions},
        response::ApiResponse,
        result::DispatchResult,
    },
};

pub struct AppState {
    pub coordinator: DispatchCoordinator,
    pub health_checker: HealthChecker,
}

impl AppState {
    pub fn new(coordinator: DispatchCoordinator, health_checker: HealthChecker) -> Self {
        Self {
            coordinator,
            health_checker,
        }
    }

    /// Wires stores, adapters and the coordinator from configuration.
    pub async fn from_config(config: &Config) -> Result<Self, Error> {
        let settings = config.dispatch_settings()?;
        let mode = config.adapter_mode()?;

        let mut schemas = SchemaStore::builtin()?;
        if let Some(dir) = &config.schema_dir {
            schemas.load_dir(Path::new(dir))?;
        }
        let schemas = Arc::new(schemas);

        let mut adapters = AdapterRegistry::new();

        let status_store: Arc<dyn DeliveryStatusStore> = match mode {
            AdapterMode::Stub => {
                if config.redis_url.is_some() {
                    warn!(
                        "Stub adapter mode ignores REDIS_URL and uses the in-memory status store"
                    );
                }

                let store = Arc::new(InMemoryStatusStore::new());
                for channel in Channel::ALL {
                    let adapter = StubChannelAdapter::new(channel).with_simulated_consumer(
                        Arc::clone(&store),
                        settings.verification.poll_interval,
                        "delivered",
                    );
                    adapters.register(Arc::new(adapter));
                }
                store
            }
            AdapterMode::Http => {
                for channel in Channel::ALL {
                    let Some(endpoint) = config.channel_endpoint(channel) else {
                        info!(%channel, "Channel not configured, skipping adapter");
                        continue;
                    };
                    let adapter: Arc<dyn ChannelAdapter> = Arc::new(HttpChannelAdapter::new(
                        channel,
                        endpoint.base_url,
                        endpoint.token,
                        config.http_timeout(),
                    )?);
                    adapters.register(adapter);
                }

                match &config.redis_url {
                    Some(url) => Arc::new(
                        RedisStatusStore::connect(
                            url,
                            config.delivery_status_ttl_seconds,
                            settings.retry_policy.clone(),
                        )
                        .await?,
                    ),
                    None => {
                        warn!("REDIS_URL not set, using the in-memory delivery-status store");
                        Arc::new(InMemoryStatusStore::new())
                    }
                }
            }
        };

        if adapters.is_empty() {
            return Err(anyhow!("No channel adapters configured"));
        }

        let health_checker =
            HealthChecker::new(Arc::clone(&status_store), Arc::clone(&schemas), adapters.clone());

        let coordinator = DispatchCoordinator::builder()
            .adapters(adapters)
            .schemas(schemas)
            .status_store(status_store)
            .settings(settings)
            .build()?;

        Ok(Self::new(coordinator, health_checker))
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitNotificationBody {
    #[serde(default)]
    pub id: Option<String>,
    pub channel: Channel,
    pub payload: Payload,
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub bypass_schema: bool,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl SubmitNotificationBody {
    pub fn into_parts(self) -> (NotificationRequest, SubmitOptions) {
        let id = self.id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut request = NotificationRequest::new(id, self.channel, self.payload);
        if let Some(version) = self.schema_version {
            request = request.with_schema_version(version);
        }

        let options = SubmitOptions {
            bypass_schema: self.bypass_schema,
            owner: self.owner,
            labels: self.labels,
            retry_policy: None,
        };

        (request, options)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/notifications", post(submit_notification))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server(config: Config) -> Result<(), Error> {
    let state = Arc::new(AppState::from_config(&config).await?);
    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, environment = %config.environment, "Delivery service listening");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn submit_notification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitNotificationBody>,
) -> impl IntoResponse {
    let (request, options) = body.into_parts();
    let result = state.coordinator.submit_with(request, options).await;

    let status_code = status_for(&result);

    (status_code, Json(ApiResponse::from_dispatch(result)))
}

pub fn status_for(result: &DispatchResult) -> StatusCode {
    match &result.error {
        None => StatusCode::OK,
        Some(DispatchError::SchemaViolation { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(DispatchError::AlreadyInFlight { .. }) => StatusCode::CONFLICT,
        Some(DispatchError::Configuration { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        Some(DispatchError::VerificationTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        Some(
            DispatchError::TransientSend { .. }
            | DispatchError::TerminalSend { .. }
            | DispatchError::DeliveryRejected { .. },
        ) => StatusCode::BAD_GATEWAY,
    }
}
