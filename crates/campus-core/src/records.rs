//! REST payload types for active lesson activities.
//!
//! Shapes match the backend's snake_case JSON:
//!
//! ```json
//! {
//!   "results": [
//!     { "id": 42, "schedule_id": 42, "title": "Fractions lab",
//!       "plan_status": "in_progress", "started_at": "2026-03-02T09:15:00Z" }
//!   ]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::messages::PlanStatus;

/// One active lesson activity as returned by the REST backend.
///
/// Owned exclusively by the consumer that fetched it; the sync plumbing
/// never mutates records, it only tells consumers to re-pull them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Record identity.
    pub id: i64,
    /// Schedule this activity belongs to.
    pub schedule_id: i64,
    /// Display label.
    #[serde(default)]
    pub title: String,
    /// Current lifecycle status.
    pub plan_status: PlanStatus,
    /// When the activity was started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the activity was completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// The `{ "results": [...] }` list envelope used by the backend.
///
/// An absent `results` key means "no items", not an error.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ActiveEnvelope {
    /// The active records, possibly empty.
    #[serde(default)]
    pub results: Vec<ActivityRecord>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
