use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

use crate::models::{
    channel::{AckMode, Channel},
    request::NotificationRequest,
    send::SendResult,
};

/// Uniform send interface over one notification platform.
///
/// Implementations fold every failure (network, non-2xx, unreadable response)
/// into the returned [`SendResult`]; nothing escapes as an error or panic.
/// A failure reported after a 2xx is terminal, so an accepted request is
/// never sent twice.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn channel(&self) -> Channel;

    fn ack_mode(&self) -> AckMode {
        self.channel().ack_mode()
    }

    async fn send(&self, request: &NotificationRequest) -> SendResult;
}

#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<Channel, Arc<dyn ChannelAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own channel, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn ChannelAdapter>) {
        self.adapters.insert(adapter.channel(), adapter);
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel).cloned()
    }

    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.adapters.keys().copied().collect();
        channels.sort();
        channels
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
