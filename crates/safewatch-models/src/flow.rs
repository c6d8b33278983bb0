//! Upload flow states and events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detection::ResultKind;

/// Identifies one capture → submit → result cycle.
///
/// Identifiers only grow; a response tagged with anything but the current
/// cycle is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(pub u64);

impl CycleId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the pending asset comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    #[default]
    File,
    Camera,
}

/// Upload flow state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    #[default]
    Idle,
    /// Waiting for a camera frame
    Capturing,
    /// A pending asset is available
    Ready,
    /// Upload in flight
    Submitting,
    Succeeded,
    Failed,
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::Capturing => "capturing",
            FlowState::Ready => "ready",
            FlowState::Submitting => "submitting",
            FlowState::Succeeded => "succeeded",
            FlowState::Failed => "failed",
        }
    }

    /// True when the cycle has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Succeeded | FlowState::Failed)
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events published by the flow for whoever renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    StateChanged {
        cycle: CycleId,
        state: FlowState,
        timestamp: DateTime<Utc>,
    },

    /// Upload progress (0-100)
    Progress {
        cycle: CycleId,
        value: u8,
    },

    Succeeded {
        cycle: CycleId,
        kind: ResultKind,
        violations: u64,
    },

    Failed {
        cycle: CycleId,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl FlowEvent {
    pub fn state_changed(cycle: CycleId, state: FlowState) -> Self {
        FlowEvent::StateChanged {
            cycle,
            state,
            timestamp: Utc::now(),
        }
    }

    pub fn progress(cycle: CycleId, value: u8) -> Self {
        FlowEvent::Progress {
            cycle,
            value: value.min(100),
        }
    }

    pub fn succeeded(cycle: CycleId, kind: ResultKind, violations: u64) -> Self {
        FlowEvent::Succeeded {
            cycle,
            kind,
            violations,
        }
    }

    pub fn failed(cycle: CycleId, message: impl Into<String>) -> Self {
        FlowEvent::Failed {
            cycle,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn cycle(&self) -> CycleId {
        match self {
            FlowEvent::StateChanged { cycle, .. }
            | FlowEvent::Progress { cycle, .. }
            | FlowEvent::Succeeded { cycle, .. }
            | FlowEvent::Failed { cycle, .. } => *cycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_ids_grow() {
        let first = CycleId::default();
        assert!(first.next() > first);
        assert_eq!(first.next().next(), CycleId(2));
    }

    #[test]
    fn test_terminal_states() {
        assert!(FlowState::Succeeded.is_terminal());
        assert!(FlowState::Failed.is_terminal());
        assert!(!FlowState::Submitting.is_terminal());
        assert!(!FlowState::Idle.is_terminal());
    }

    #[test]
    fn test_progress_event_clamps() {
        match FlowEvent::progress(CycleId(1), 150) {
            FlowEvent::Progress { value, .. } => assert_eq!(value, 100),
            other => panic!("Expected Progress event, got {other:?}"),
        }
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&FlowEvent::failed(CycleId(3), "boom")).unwrap();
        assert!(json.contains("\"type\":\"failed\""));
        assert!(json.contains("\"cycle\":3"));
    }
}
