use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::json;
use tokio::time::sleep;
use tracing::debug;

use crate::{
    clients::{channel::ChannelAdapter, status_store::InMemoryStatusStore},
    models::{
        channel::{AckMode, Channel},
        request::NotificationRequest,
        send::{SendError, SendResult},
    },
};

/// One scripted reply of a [`StubChannelAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubReply {
    Accept,
    Status(u16),
    NetworkError,
}

/// Writes a delivery status for accepted sends after a delay, standing in for
/// the message-queue consumer that confirms delivery in production.
#[derive(Debug, Clone)]
pub struct SimulatedConsumer {
    pub store: Arc<InMemoryStatusStore>,
    pub delay: Duration,
    pub status: String,
}

/// In-process channel adapter for test and local modes.
#[derive(Debug)]
pub struct StubChannelAdapter {
    channel: Channel,
    ack_mode: AckMode,
    script: Mutex<VecDeque<StubReply>>,
    fallback: StubReply,
    latency: Duration,
    consumer: Option<SimulatedConsumer>,
    calls: AtomicU32,
}

impl StubChannelAdapter {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            ack_mode: channel.ack_mode(),
            script: Mutex::new(VecDeque::new()),
            fallback: StubReply::Accept,
            latency: Duration::ZERO,
            consumer: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Replies consumed in order before falling back.
    pub fn with_script(self, replies: impl IntoIterator<Item = StubReply>) -> Self {
        *self.script.lock().unwrap_or_else(PoisonError::into_inner) = replies.into_iter().collect();
        self
    }

    pub fn with_fallback(mut self, reply: StubReply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_simulated_consumer(
        mut self,
        store: Arc<InMemoryStatusStore>,
        delay: Duration,
        status: impl Into<String>,
    ) -> Self {
        self.consumer = Some(SimulatedConsumer {
            store,
            delay,
            status: status.into(),
        });
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> StubReply {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn accept(&self, request: &NotificationRequest, status: u16) -> SendResult {
        match self.ack_mode {
            AckMode::Synchronous => SendResult::delivered(status, "ok".to_string()),
            AckMode::Asynchronous => {
                let tracking_id = request.id().to_string();

                if let Some(consumer) = self.consumer.clone() {
                    let key = tracking_id.clone();
                    tokio::spawn(async move {
                        sleep(consumer.delay).await;
                        consumer.store.publish(&key, &consumer.status).await;
                    });
                }

                let body = json!({ "trace_id": tracking_id }).to_string();
                SendResult::accepted(status, body, tracking_id)
            }
        }
    }
}

#[async_trait]
impl ChannelAdapter for StubChannelAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }

    async fn send(&self, request: &NotificationRequest) -> SendResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        let reply = self.next_reply();
        debug!(channel = %self.channel, call, reply = ?reply, "Stub channel reply");

        match reply {
            StubReply::Accept => self.accept(request, 200),
            StubReply::Status(status) if (200..300).contains(&status) => {
                self.accept(request, status)
            }
            StubReply::Status(status) => SendResult::failed(
                SendError::from_status(status, ""),
                Some(status),
                String::new(),
            ),
            StubReply::NetworkError => SendResult::failed(
                SendError::transient("network error: connection refused"),
                None,
                String::new(),
            ),
        }
    }
}
