//! Call records used for service-level computation.

use serde::{Deserialize, Serialize};

/// One call ("case") of the current day as reported by upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CallRecord {
    /// Queue the call waited in.
    pub queue_id: String,
    /// Seconds the caller waited before answer or abandon.
    pub wait_seconds: u32,
    /// Whether an agent picked the call up.
    pub answered: bool,
}

impl CallRecord {
    /// Construct an answered call.
    #[must_use]
    pub fn answered(queue_id: impl Into<String>, wait_seconds: u32) -> Self {
        Self {
            queue_id: queue_id.into(),
            wait_seconds,
            answered: true,
        }
    }

    /// Construct an abandoned call.
    #[must_use]
    pub fn abandoned(queue_id: impl Into<String>, wait_seconds: u32) -> Self {
        Self {
            queue_id: queue_id.into(),
            wait_seconds,
            answered: false,
        }
    }
}
