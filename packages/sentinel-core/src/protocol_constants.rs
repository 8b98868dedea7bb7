//! Fixed protocol constants that should NOT be changed.
//!
//! These values are part of the contract with the inference worker, the operator
//! consoles and the persisted event store. Changing them breaks consumers that
//! match on the exact strings.

// ─────────────────────────────────────────────────────────────────────────────
// Worker Protocol
// ─────────────────────────────────────────────────────────────────────────────

/// Marker line a worker may print before and after its JSON result.
///
/// When both markers are present only the text between them is parsed, which
/// keeps JSON-looking diagnostic output from being mistaken for the payload.
pub const RESULT_MARKER: &str = "@@SENTINEL-RESULT@@";

/// Default worker deadline (seconds) before the child process is killed.
pub const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 120;

// ─────────────────────────────────────────────────────────────────────────────
// Event Conventions
// ─────────────────────────────────────────────────────────────────────────────

/// Model tag recorded in the metadata of every real detection event.
pub const MODEL_TAG: &str = "ultralytics-yolo-v11";

/// Confidence strictly above this value raises an aggregate event to `medium`.
pub const MEDIUM_SEVERITY_CONFIDENCE: f64 = 0.8;

/// Confidence recorded on fallback events emitted for worker-reported errors.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Event type for aggregated object detections.
pub const OBJECT_DETECTION_TYPE: &str = "object_detection";

/// Event type for fallback events.
pub const MOTION_DETECTED_TYPE: &str = "motion_detected";

// ─────────────────────────────────────────────────────────────────────────────
// Camera Placeholders
// ─────────────────────────────────────────────────────────────────────────────

/// Zone assigned to cameras known to neither the directory nor the fallback catalog.
pub const DEFAULT_ZONE: &str = "Default Zone";

/// Industry assigned to placeholder cameras.
pub const DEFAULT_INDUSTRY: &str = "Security";

/// Stream locator handed to the worker for placeholder cameras.
pub const DEFAULT_STREAM_LOCATOR: &str = "rtsp://127.0.0.1:8554/default";

// ─────────────────────────────────────────────────────────────────────────────
// Live Feed
// ─────────────────────────────────────────────────────────────────────────────

/// Welcome text sent on the `connected` channel.
pub const WELCOME_MESSAGE: &str = "Connected to SENTINEL Intelligence Feed";

/// Service identifier reported by the health endpoint.
pub const SERVICE_ID: &str = "sentinel";

/// Number of synthetic sensors the feed draws identifiers from (`SNS-0001`..).
pub const SYNTHETIC_SENSOR_COUNT: u32 = 96;

/// Bounds of the synthetic network latency reported in health heartbeats (ms).
pub const SYNTHETIC_LATENCY_MS: (u32, u32) = (2, 6);

/// Port range tried when no preferred port is configured.
pub const FALLBACK_PORT_RANGE: (u16, u16) = (3001, 3011);
