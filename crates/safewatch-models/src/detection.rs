//! Detection results returned by the inference backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::media::DisplayUrl;

/// One object class reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label (e.g. `helmet`, `no_gloves`)
    pub class: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl Detection {
    pub fn new(class: impl Into<String>, confidence: f64) -> Self {
        Self {
            class: class.into(),
            confidence,
        }
    }

    /// Confidence as a percentage with one decimal, e.g. `92.0%`.
    pub fn confidence_percent(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }

    /// Row as shown in the detections list.
    pub fn display_row(&self) -> String {
        format!("{} {}", self.class, self.confidence_percent())
    }
}

/// Machine checkpoint verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    pub passed: bool,
}

/// Violation label to occurrence count, kept in label order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViolationSummary(BTreeMap<String, u64>);

impl ViolationSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` occurrences of `label`.
    pub fn record(&mut self, label: impl Into<String>, count: u64) {
        let entry = self.0.entry(label.into()).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        self.0.get(label).copied()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.0.values().copied().fold(0u64, u64::saturating_add)
    }

    /// True when at least one violation was counted.
    pub fn has_violations(&self) -> bool {
        self.total() > 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(label, count)| (label.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for ViolationSummary {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut summary = Self::new();
        for (label, count) in iter {
            summary.record(label, count);
        }
        summary
    }
}

/// Which interpretation of a response is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Media,
    Structured,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Media => "media",
            ResultKind::Structured => "structured",
        }
    }
}

/// Reconciled outcome of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionResult {
    /// The backend answered with the annotated media itself
    Media {
        original_url: DisplayUrl,
        annotated_url: DisplayUrl,
        is_video: bool,
    },

    /// The backend answered with JSON
    Structured {
        detections: Vec<Detection>,
        summary: ViolationSummary,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        checkpoints: Vec<Checkpoint>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        original_url: Option<DisplayUrl>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        annotated_url: Option<DisplayUrl>,
    },
}

impl DetectionResult {
    pub fn kind(&self) -> ResultKind {
        match self {
            DetectionResult::Media { .. } => ResultKind::Media,
            DetectionResult::Structured { .. } => ResultKind::Structured,
        }
    }

    /// Structured detections; always empty for media results.
    pub fn detections(&self) -> &[Detection] {
        match self {
            DetectionResult::Media { .. } => &[],
            DetectionResult::Structured { detections, .. } => detections,
        }
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        match self {
            DetectionResult::Media { .. } => &[],
            DetectionResult::Structured { checkpoints, .. } => checkpoints,
        }
    }

    pub fn summary(&self) -> Option<&ViolationSummary> {
        match self {
            DetectionResult::Media { .. } => None,
            DetectionResult::Structured { summary, .. } => Some(summary),
        }
    }

    /// Violations derived from this result (empty for media results).
    pub fn violation_summary(&self) -> ViolationSummary {
        self.summary().cloned().unwrap_or_default()
    }

    pub fn original_url(&self) -> Option<&DisplayUrl> {
        match self {
            DetectionResult::Media { original_url, .. } => Some(original_url),
            DetectionResult::Structured { original_url, .. } => original_url.as_ref(),
        }
    }

    pub fn annotated_url(&self) -> Option<&DisplayUrl> {
        match self {
            DetectionResult::Media { annotated_url, .. } => Some(annotated_url),
            DetectionResult::Structured { annotated_url, .. } => annotated_url.as_ref(),
        }
    }

    /// Locally allocated URLs referenced by this result.
    pub fn local_urls(&self) -> Vec<&DisplayUrl> {
        self.original_url()
            .into_iter()
            .chain(self.annotated_url())
            .filter(|url| url.is_local())
            .collect()
    }
}
