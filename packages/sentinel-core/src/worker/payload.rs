//! Worker stdout interpretation.
//!
//! Workers print noise (model loading banners, progress lines) around exactly one
//! JSON object shaped either `{"error": "..."}` or
//! `{"detections": [{"class", "confidence", ...}], "imageUrl"?: "..."}`.
//!
//! Extraction rules:
//! 1. If the output contains two [`RESULT_MARKER`] lines, only the text between
//!    the first two markers is considered.
//! 2. Within the considered text, the payload spans the first `{` to the last `}`.

use serde_json::Value;
use thiserror::Error;

use crate::protocol_constants::RESULT_MARKER;

/// One detection reported by the worker. Extra fields such as `box` are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class: String,
    pub confidence: f64,
}

/// Interpreted worker result.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerPayload {
    /// The worker reported a failure of its own.
    Error(String),
    /// Detections (possibly empty) and an optional annotated image reference.
    Detections {
        detections: Vec<RawDetection>,
        image_url: Option<String>,
    },
}

/// Reasons stdout could not be interpreted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("worker produced no output")]
    Empty,

    #[error("no JSON object found in worker output")]
    NoJson,

    #[error("malformed JSON in worker output: {0}")]
    Malformed(String),

    #[error("worker payload is not a JSON object")]
    NotAnObject,
}

/// Returns the candidate JSON text of a worker's stdout, if any.
pub fn extract_json_region(output: &str) -> Option<&str> {
    let region = marked_region(output).unwrap_or(output);
    let start = region.find('{')?;
    let end = region.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&region[start..=end])
}

fn marked_region(output: &str) -> Option<&str> {
    let open = output.find(RESULT_MARKER)?;
    let body_start = open + RESULT_MARKER.len();
    let close = output[body_start..].find(RESULT_MARKER)?;
    Some(&output[body_start..body_start + close])
}

/// Parses a worker's stdout into a [`WorkerPayload`].
pub fn parse_payload(output: &str) -> Result<WorkerPayload, PayloadError> {
    if output.trim().is_empty() {
        return Err(PayloadError::Empty);
    }
    let json = extract_json_region(output).ok_or(PayloadError::NoJson)?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| PayloadError::Malformed(e.to_string()))?;
    let object = value.as_object().ok_or(PayloadError::NotAnObject)?;

    if let Some(error) = object.get("error").filter(|v| is_truthy(v)) {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Ok(WorkerPayload::Error(message));
    }

    let detections = object
        .get("detections")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(parse_detection).collect())
        .unwrap_or_default();

    let image_url = object
        .get("imageUrl")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(WorkerPayload::Detections {
        detections,
        image_url,
    })
}

fn parse_detection(entry: &Value) -> Option<RawDetection> {
    let class = entry.get("class").and_then(Value::as_str);
    let confidence = entry.get("confidence").and_then(Value::as_f64);
    match (class, confidence) {
        (Some(class), Some(confidence)) => Some(RawDetection {
            class: class.to_string(),
            confidence,
        }),
        _ => {
            log::warn!("[Worker] Skipping malformed detection entry: {}", entry);
            None
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}
