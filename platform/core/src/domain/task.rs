// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Task Domain Model
//!
//! Durable background work. State moves only forward along
//! pending → started → (success | failure | cancelled); progress messages
//! are advisory and never authoritative for success.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SOFT_TIME_LIMIT_ERROR_TYPE: &str = "SoftTimeLimitExceeded";

/// Failure messages are truncated to this length before persisting.
pub const MAX_FAILURE_MESSAGE_LEN: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Started,
    Success,
    Failure,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Cancelled)
    }

    /// Monotonic transition check. A state never regresses and terminal
    /// states never change.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        match (self, next) {
            (Self::Pending, Self::Started) => true,
            (Self::Pending, Self::Cancelled) => true,
            (Self::Started, Self::Success | Self::Failure | Self::Cancelled) => true,
            (a, b) if *a == b => false,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskProgress {
    pub current: u32,
    pub total: u32,
    pub message: String,
}

/// Snapshot returned by `status(task_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub state: TaskState,
    pub progress: Option<TaskProgress>,
    pub result: Option<serde_json::Value>,
    pub failure: Option<TaskFailure>,
    pub updated_at: DateTime<Utc>,
}

impl TaskStatus {
    pub fn ready(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn successful(&self) -> bool {
        self.state == TaskState::Success
    }

    pub fn failed(&self) -> bool {
        self.state == TaskState::Failure
    }
}

/// Safely serialized failure meta for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailure {
    pub error: String,
    pub error_type: String,
    pub timestamp: DateTime<Utc>,
}

impl TaskFailure {
    /// Capture an error, truncating the message so broker payload caps are
    /// never the thing that decides whether a failure is recorded.
    pub fn capture(error_type: impl Into<String>, message: &str) -> Self {
        let mut error = message.to_string();
        if error.len() > MAX_FAILURE_MESSAGE_LEN {
            error.truncate(MAX_FAILURE_MESSAGE_LEN);
        }
        Self {
            error,
            error_type: error_type.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn soft_time_limit() -> Self {
        Self::capture(SOFT_TIME_LIMIT_ERROR_TYPE, "soft time limit exceeded")
    }
}

/// Result envelope for anything crossing the task-fabric boundary, so
/// callers can distinguish retryable from terminal without downcasting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TaskEnvelope {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_type: None,
            timestamp: Utc::now(),
        }
    }

    pub fn err(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_type: Some(error_type.into()),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        use TaskState::*;
        assert!(Pending.can_transition_to(Started));
        assert!(Started.can_transition_to(Success));
        assert!(Started.can_transition_to(Failure));
        assert!(Started.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Cancelled));

        assert!(!Started.can_transition_to(Pending));
        assert!(!Success.can_transition_to(Failure));
        assert!(!Failure.can_transition_to(Started));
        assert!(!Cancelled.can_transition_to(Success));
        assert!(!Pending.can_transition_to(Success));
    }

    #[test]
    fn failure_message_is_truncated() {
        let long = "x".repeat(5000);
        let failure = TaskFailure::capture("ValueError", &long);
        assert_eq!(failure.error.len(), MAX_FAILURE_MESSAGE_LEN);
        assert_eq!(failure.error_type, "ValueError");
    }
}
