//! Push-message wire types.
//!
//! Every frame on the status socket is a JSON envelope:
//!
//! ```json
//! { "type": "activity_status_change", "data": { "scheduleId": 42, "planStatus": "in_progress" } }
//! ```
//!
//! The envelope is matched on its `type` string rather than deserialized as
//! a closed enum so that kinds this client does not know about are skipped,
//! not treated as errors. Servers are free to add kinds without breaking
//! deployed clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Lifecycle status of a planned lesson activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Scheduled but not started.
    Planned,
    /// Currently running.
    InProgress,
    /// Finished.
    Completed,
}

impl PlanStatus {
    /// Wire string for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed status-socket message, inbound or outbound.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncMessage {
    /// A schedule's contents changed; consumers should refetch.
    ScheduleUpdate {
        /// Schedule that changed.
        schedule_id: i64,
    },
    /// An activity's plan status changed.
    ActivityStatusChange {
        /// Schedule the activity belongs to.
        schedule_id: i64,
        /// New status.
        plan_status: PlanStatus,
        /// Optional human-readable note.
        message: Option<String>,
    },
    /// A server- or transport-level error.
    Error {
        /// Human-readable cause.
        message: String,
    },
}

impl SyncMessage {
    /// Wire `type` string for this message.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ScheduleUpdate { .. } => "schedule_update",
            Self::ActivityStatusChange { .. } => "activity_status_change",
            Self::Error { .. } => "error",
        }
    }

    /// Serialize into the `{ "type": ..., "data": ... }` envelope.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let data = match self {
            Self::ScheduleUpdate { schedule_id } => {
                serde_json::json!({ "scheduleId": schedule_id })
            }
            Self::ActivityStatusChange {
                schedule_id,
                plan_status,
                message,
            } => {
                let mut data = serde_json::json!({
                    "scheduleId": schedule_id,
                    "planStatus": plan_status,
                });
                if let Some(note) = message {
                    data["message"] = Value::String(note.clone());
                }
                data
            }
            Self::Error { message } => serde_json::json!({ "message": message }),
        };
        serde_json::to_string(&serde_json::json!({ "type": self.kind(), "data": data }))
    }
}

/// Failure to interpret an inbound frame.
#[derive(Debug, Error)]
pub enum MessageParseError {
    /// The frame was not a JSON envelope at all.
    #[error("unparseable frame: {0}")]
    Json(#[from] serde_json::Error),
    /// The `type` was recognized but its `data` did not match.
    #[error("bad `{kind}` payload: {source}")]
    Payload {
        /// Envelope `type` string.
        kind: String,
        /// Underlying deserialization error.
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleUpdateData {
    schedule_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityStatusChangeData {
    schedule_id: i64,
    plan_status: PlanStatus,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorData {
    #[serde(default)]
    message: Option<String>,
}

/// Parse one inbound text frame.
///
/// Returns `Ok(Some(msg))` for a recognized message, `Ok(None)` for a
/// well-formed envelope whose `type` this client does not know (forward
/// compatibility), and `Err` for anything that is not a valid envelope.
pub fn parse_frame(text: &str) -> Result<Option<SyncMessage>, MessageParseError> {
    let envelope: Envelope = serde_json::from_str(text)?;

    let payload = |source| MessageParseError::Payload {
        kind: envelope.kind.clone(),
        source,
    };

    let message = match envelope.kind.as_str() {
        "schedule_update" => {
            let data: ScheduleUpdateData =
                serde_json::from_value(envelope.data).map_err(payload)?;
            SyncMessage::ScheduleUpdate {
                schedule_id: data.schedule_id,
            }
        }
        "activity_status_change" => {
            let data: ActivityStatusChangeData =
                serde_json::from_value(envelope.data).map_err(payload)?;
            SyncMessage::ActivityStatusChange {
                schedule_id: data.schedule_id,
                plan_status: data.plan_status,
                message: data.message,
            }
        }
        "error" => {
            let data: ErrorData = serde_json::from_value(envelope.data).map_err(payload)?;
            SyncMessage::Error {
                message: data.message.unwrap_or_default(),
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(message))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
