// SPDX-License-Identifier: GPL-3.0-only

//! Events published to presenters

use super::chat::ChatMessage;
use super::state::{FailureOrigin, SessionState};
use crate::errors::AcquisitionError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

/// Operator-facing notification (a toast, in UI terms)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notice {
    fn info(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            severity: Severity::Info,
        }
    }

    /// Diagnostic for a failed acquisition, keyed by error kind
    pub fn acquisition_failed(origin: FailureOrigin, error: &AcquisitionError) -> Self {
        let title = match origin {
            FailureOrigin::GoLive => "Camera Access Required",
            FailureOrigin::VideoToggle => "Video Unavailable",
            FailureOrigin::Preview => "Camera Access Failed",
        };
        Self {
            title: title.to_string(),
            description: error.user_message(),
            severity: Severity::Error,
        }
    }

    pub fn live_started() -> Self {
        Self::info("You're Live!", "Your live stream has started successfully.")
    }

    pub fn stream_ended() -> Self {
        Self::info("Stream Ended", "Your live stream has been ended.")
    }
}

/// Everything a presenter can observe
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SessionEvent {
    StateChanged {
        #[serde(serialize_with = "state_name")]
        from: SessionState,
        #[serde(serialize_with = "state_name")]
        to: SessionState,
    },
    Notice(Notice),
    Chat(ChatMessage),
}

fn state_name<S: serde::Serializer>(state: &SessionState, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(state)
}
