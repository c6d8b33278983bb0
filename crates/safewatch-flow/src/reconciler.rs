//! Response reconciliation.
//!
//! Turns whatever the backend answered with into one [`DetectionResult`].
//! JSON bodies become structured results; anything else is treated as the
//! annotated media itself. Structured parsing is lenient: fields that are
//! missing or malformed are dropped with a warning, never propagated.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use safewatch_client::RawResponse;
use safewatch_models::{
    Checkpoint, Detection, DetectionResult, DisplayUrl, MediaAsset, ViolationSummary,
};

use crate::registry::DisplayUrlRegistry;

const ORIGINAL_KEYS: [&str; 2] = ["original_image", "original"];
const ANNOTATED_KEYS: [&str; 3] = ["annotated_image", "annotated", "processed_image"];

/// Fallback MIME type for binary bodies without a content type.
const DEFAULT_BINARY_MIME: &str = "image/jpeg";

pub struct Reconciler {
    base_url: Url,
    registry: Arc<DisplayUrlRegistry>,
}

impl Reconciler {
    pub fn new(base_url: Url, registry: Arc<DisplayUrlRegistry>) -> Self {
        Self { base_url, registry }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Interpret a complete response to a submission of `original`.
    pub fn reconcile(&self, response: &RawResponse, original: &MediaAsset) -> DetectionResult {
        let sniffed_json = response.content_type.is_none() && is_json_object(&response.body);
        if response.is_json() || sniffed_json {
            self.structured(&response.body)
        } else {
            self.media(response, original)
        }
    }

    /// Qualify a backend media URL. Relative paths are rooted at the backend origin.
    pub fn resolve_url(&self, raw: &str) -> Option<DisplayUrl> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let resolved = match Url::parse(raw) {
            Ok(absolute) if matches!(absolute.scheme(), "http" | "https") => absolute,
            Ok(absolute) => {
                warn!("Dropping media URL with scheme {:?}: {:?}", absolute.scheme(), raw);
                return None;
            }
            Err(url::ParseError::RelativeUrlWithoutBase) => match self.base_url.join(raw) {
                Ok(joined) => joined,
                Err(e) => {
                    warn!("Dropping unresolvable media URL {:?}: {}", raw, e);
                    return None;
                }
            },
            Err(e) => {
                warn!("Dropping malformed media URL {:?}: {}", raw, e);
                return None;
            }
        };

        Some(DisplayUrl::new(resolved.to_string()))
    }

    fn media(&self, response: &RawResponse, original: &MediaAsset) -> DetectionResult {
        let mime = response.mime().unwrap_or(DEFAULT_BINARY_MIME);
        let is_video = mime.to_ascii_lowercase().starts_with("video/");
        let annotated_url = self.registry.allocate(Arc::from(response.body.as_slice()), mime);

        debug!(mime, bytes = response.body.len(), "Reconciled binary response");

        DetectionResult::Media {
            original_url: original.display_url.clone(),
            annotated_url,
            is_video,
        }
    }

    fn structured(&self, body: &[u8]) -> DetectionResult {
        let object = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(object)) => object,
            Ok(other) => {
                warn!(
                    "Structured response is not an object ({}), using empty result",
                    type_name(&other)
                );
                Map::new()
            }
            Err(e) => {
                warn!("Structured response is not valid JSON ({}), using empty result", e);
                Map::new()
            }
        };

        let detections = parse_detections(object.get("detections"));
        let summary = parse_summary(object.get("summary"));
        let checkpoints = parse_checkpoints(object.get("checkpoints"));
        let original_url =
            first_string(&object, &ORIGINAL_KEYS).and_then(|s| self.resolve_url(s));
        let annotated_url =
            first_string(&object, &ANNOTATED_KEYS).and_then(|s| self.resolve_url(s));

        if let Some(Value::String(error)) = object.get("error") {
            warn!("Backend reported an error in a successful response: {}", error);
        }

        debug!(
            detections = detections.len(),
            violations = summary.total(),
            checkpoints = checkpoints.len(),
            "Reconciled structured response"
        );

        DetectionResult::Structured {
            detections,
            summary,
            checkpoints,
            original_url,
            annotated_url,
        }
    }
}

fn is_json_object(body: &[u8]) -> bool {
    matches!(serde_json::from_slice::<Value>(body), Ok(Value::Object(_)))
}

fn first_string<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(Value::as_str)
}

fn parse_detections(value: Option<&Value>) -> Vec<Detection> {
    let items = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            warn!("Ignoring detections of type {}", type_name(other));
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(|item| {
            let class = item.get("class").and_then(Value::as_str);
            let confidence = item.get("confidence").and_then(Value::as_f64);
            match (class, confidence) {
                (Some(class), Some(confidence)) => Some(Detection::new(class, confidence)),
                _ => {
                    warn!("Skipping malformed detection: {}", item);
                    None
                }
            }
        })
        .collect()
}

fn parse_summary(value: Option<&Value>) -> ViolationSummary {
    let entries = match value {
        None | Some(Value::Null) => return ViolationSummary::new(),
        Some(Value::Object(entries)) => entries,
        Some(other) => {
            warn!("Ignoring summary of type {}", type_name(other));
            return ViolationSummary::new();
        }
    };

    let mut summary = ViolationSummary::new();
    for (label, count) in entries {
        match as_count(count) {
            Some(count) => summary.record(label.as_str(), count),
            None => warn!("Skipping summary entry {} with count {}", label, count),
        }
    }
    summary
}

fn parse_checkpoints(value: Option<&Value>) -> Vec<Checkpoint> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let name = item.get("name").and_then(Value::as_str)?;
            let passed = item.get("passed").and_then(Value::as_bool)?;
            Some(Checkpoint {
                name: name.to_string(),
                passed,
            })
        })
        .collect()
}

/// Non-negative integer counts; whole floats are accepted.
fn as_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
