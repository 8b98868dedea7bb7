//! Event model and push messages for operator consoles.
//!
//! This module provides:
//! - [`Event`], the immutable domain record produced by detection cycles and the
//!   synthetic live feed
//! - [`BroadcastMessage`], the `{channel, data}` envelope pushed over `/ws`
//! - [`Broadcaster`] and [`LiveConnection`], the fan-out seam used by services

mod broadcaster;

pub use broadcaster::{Broadcaster, LiveConnection, SendError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event severity. Only `low` and `medium` are produced today; `critical` is
/// reserved for operator-raised alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::Critical => "critical",
        }
    }
}

/// Origin of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Camera,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
        }
    }
}

/// One detection as recorded in event metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub class: String,
    pub confidence: f64,
}

/// Free-form event metadata. Absent fields are omitted from the wire form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detections: Option<Vec<DetectionSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_classes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_realtime: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_fallback: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_count: Option<u32>,
}

/// A domain event. Never mutated after the normalizer builds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    pub source_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub severity: Severity,
    pub description: String,
    pub industry: String,
    pub zone: String,
    pub acknowledged: bool,
    pub metadata: EventMetadata,
}

/// Payload of the `connected` welcome message.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedPayload {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Synthetic sensor reading pushed on the `sensor_update` channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub sensor_id: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStats {
    /// Round-trip latency in milliseconds.
    pub latency: u32,
}

/// Host health heartbeat pushed on the `system_health` channel.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealthSnapshot {
    pub timestamp: DateTime<Utc>,
    /// CPU utilisation in percent.
    pub cpu: f64,
    /// Memory utilisation in percent.
    pub memory: u32,
    pub network: NetworkStats,
}

/// Push envelope sent to live connections as `{"channel": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "channel", content = "data", rename_all = "snake_case")]
pub enum BroadcastMessage {
    Connected(ConnectedPayload),
    Event(Event),
    SensorUpdate(SensorReading),
    SystemHealth(SystemHealthSnapshot),
}

impl BroadcastMessage {
    /// Creates the welcome message sent when a connection is established.
    pub fn connected(message: impl Into<String>) -> Self {
        Self::Connected(ConnectedPayload {
            message: message.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn channel(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::Event(_) => "event",
            Self::SensorUpdate(_) => "sensor_update",
            Self::SystemHealth(_) => "system_health",
        }
    }

    /// Encodes the envelope as JSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
