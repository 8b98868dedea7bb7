//! Converts worker results and synthetic draws into [`Event`]s.

use chrono::Utc;

use crate::directory::CameraRecord;
use crate::events::{DetectionSummary, Event, EventMetadata, EventSource, Severity};
use crate::protocol_constants::{
    FALLBACK_CONFIDENCE, MEDIUM_SEVERITY_CONFIDENCE, MODEL_TAG, MOTION_DETECTED_TYPE,
    OBJECT_DETECTION_TYPE,
};
use crate::utils::{now_millis, pick, rand_float, rand_int};
use crate::worker::payload::RawDetection;

/// Event kind drawn by the synthetic live feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticEventKind {
    pub event_type: &'static str,
    pub severity: Severity,
    pub template: &'static str,
}

/// Event kinds the live feed synthesizes.
pub const SYNTHETIC_EVENT_KINDS: [SyntheticEventKind; 4] = [
    SyntheticEventKind {
        event_type: "person_detected",
        severity: Severity::Low,
        template: "Person detected in monitored area",
    },
    SyntheticEventKind {
        event_type: "vehicle_detected",
        severity: Severity::Low,
        template: "Vehicle detected in zone",
    },
    SyntheticEventKind {
        event_type: "loitering_detected",
        severity: Severity::Medium,
        template: "Loitering detected",
    },
    SyntheticEventKind {
        event_type: "motion_detected",
        severity: Severity::Low,
        template: "Motion detected",
    },
];

/// Builds events. Stateless; every call stamps a fresh id and timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventNormalizer;

impl EventNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Aggregates all detections of one cycle into a single event.
    ///
    /// Returns `None` for an empty detection list.
    pub fn detection_event(
        &self,
        camera: &CameraRecord,
        detections: &[RawDetection],
        image_url: Option<String>,
    ) -> Option<Event> {
        if detections.is_empty() {
            return None;
        }

        let classes = unique_classes(detections);
        let summaries = detections
            .iter()
            .map(|d| DetectionSummary {
                class: d.class.clone(),
                confidence: d.confidence,
            })
            .collect();

        Some(Event {
            id: format!("AI-{}-{}", now_millis(), rand_int(10, 99)),
            timestamp: Utc::now(),
            source: EventSource::Camera,
            source_id: camera.id.clone(),
            event_type: OBJECT_DETECTION_TYPE.to_string(),
            severity: severity_for(detections),
            description: format!(
                "[AI YOLO11] Object detection at {}: {}",
                camera.name,
                classes.join(", ")
            ),
            industry: camera.industry.clone(),
            zone: camera.zone.clone(),
            acknowledged: false,
            metadata: EventMetadata {
                detections: Some(summaries),
                detected_classes: Some(classes),
                image_url,
                model: Some(MODEL_TAG.to_string()),
                is_realtime: Some(true),
                ..Default::default()
            },
        })
    }

    /// Low-confidence event emitted when the worker reports an error.
    pub fn fallback_event(&self, camera: &CameraRecord) -> Event {
        Event {
            id: format!("EVT-AI-FB-{}-{}", now_millis(), rand_int(1000, 9999)),
            timestamp: Utc::now(),
            source: EventSource::Camera,
            source_id: camera.id.clone(),
            event_type: MOTION_DETECTED_TYPE.to_string(),
            severity: Severity::Low,
            description: format!(
                "[AI FALLBACK] Motion detected (Detection Fallback) at {}",
                camera.name
            ),
            industry: camera.industry.clone(),
            zone: camera.zone.clone(),
            acknowledged: false,
            metadata: EventMetadata {
                confidence: Some(FALLBACK_CONFIDENCE),
                is_fallback: Some(true),
                ..Default::default()
            },
        }
    }

    /// Random synthetic live event for a camera.
    pub fn synthetic_event(&self, camera: &CameraRecord) -> Event {
        let kind = pick(&SYNTHETIC_EVENT_KINDS).copied().unwrap_or(SYNTHETIC_EVENT_KINDS[3]);
        self.synthetic_event_of(camera, kind, rand_float(0.85, 0.98), rand_int(1, 3))
    }

    /// Synthetic live event with explicit draws.
    pub fn synthetic_event_of(
        &self,
        camera: &CameraRecord,
        kind: SyntheticEventKind,
        confidence: f64,
        object_count: u32,
    ) -> Event {
        Event {
            id: format!("EVT-LIVE-{}-{}", now_millis(), rand_int(1000, 9999)),
            timestamp: Utc::now(),
            source: EventSource::Camera,
            source_id: camera.id.clone(),
            event_type: kind.event_type.to_string(),
            severity: kind.severity,
            description: format!("{} at {}", kind.template, camera.name),
            industry: camera.industry.clone(),
            zone: camera.zone.clone(),
            acknowledged: false,
            metadata: EventMetadata {
                confidence: Some(confidence),
                object_count: Some(object_count),
                ..Default::default()
            },
        }
    }
}

/// Distinct class names in first-occurrence order (case-sensitive).
pub fn unique_classes(detections: &[RawDetection]) -> Vec<String> {
    let mut classes: Vec<String> = Vec::new();
    for detection in detections {
        if !classes.iter().any(|c| c == &detection.class) {
            classes.push(detection.class.clone());
        }
    }
    classes
}

/// `medium` if any confidence is strictly above the threshold, else `low`.
pub fn severity_for(detections: &[RawDetection]) -> Severity {
    if detections
        .iter()
        .any(|d| d.confidence > MEDIUM_SEVERITY_CONFIDENCE)
    {
        Severity::Medium
    } else {
        Severity::Low
    }
}
