use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
    TimedOut,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }

    /// Maps a status string written by the upstream consumer.
    ///
    /// Returns `None` for values the consumer is not known to write.
    pub fn from_observed(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "delivered" | "sent" | "success" => Some(DeliveryStatus::Delivered),
            "failed" | "error" | "rejected" => Some(DeliveryStatus::Failed),
            "pending" | "processing" | "queued" | "accepted" => Some(DeliveryStatus::Pending),
            _ => None,
        }
    }
}

impl Display for DeliveryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Delivered => write!(f, "delivered"),
            DeliveryStatus::Failed => write!(f, "failed"),
            DeliveryStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}
