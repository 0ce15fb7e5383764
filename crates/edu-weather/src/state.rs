//! Refresh state machine.
//!
//! Ensures only one weather batch runs at a time. Used by `WeatherBoard`.

use serde::{Deserialize, Serialize};

/// Board refresh status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    /// The last batch produced no snapshot for any location.
    Failed,
}

impl RefreshStatus {
    /// True if a new refresh can be started.
    pub fn can_start_refresh(self) -> bool {
        !matches!(self, RefreshStatus::Loading)
    }

    /// Settled state for a finished batch.
    pub fn after_batch(any_available: bool) -> Self {
        if any_available {
            RefreshStatus::Ready
        } else {
            RefreshStatus::Failed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RefreshStatus::Idle => "idle",
            RefreshStatus::Loading => "loading",
            RefreshStatus::Ready => "ready",
            RefreshStatus::Failed => "failed",
        }
    }
}
