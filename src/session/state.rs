// SPDX-License-Identifier: GPL-3.0-only

//! Session state and the small value types that travel with it

use crate::backends::capture::TrackKind;
use crate::errors::{AcquisitionError, SessionError, SessionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which operation an acquisition failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureOrigin {
    Preview,
    GoLive,
    VideoToggle,
}

/// Why a session ended up in [`SessionState::Failed`]
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReason {
    pub origin: FailureOrigin,
    pub error: AcquisitionError,
}

/// Broadcast session lifecycle
///
/// ```text
/// Idle → PreviewAcquiring → Previewing → LiveAcquiring → Live → Ending → Ended
///              └──────────────┬───────────────┘
///                             ▼
///                       Failed(reason)
/// ```
///
/// A capture resource exists exactly while the state is `Previewing` or `Live`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    PreviewAcquiring,
    Previewing,
    LiveAcquiring,
    Live,
    Ending,
    Ended,
    Failed(FailureReason),
}

impl SessionState {
    pub fn is_acquiring(&self) -> bool {
        matches!(self, SessionState::PreviewAcquiring | SessionState::LiveAcquiring)
    }

    /// States in which the session owns a capture resource
    pub fn holds_resource(&self) -> bool {
        matches!(self, SessionState::Previewing | SessionState::Live)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SessionState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::PreviewAcquiring => "preview-acquiring",
            SessionState::Previewing => "previewing",
            SessionState::LiveAcquiring => "live-acquiring",
            SessionState::Live => "live",
            SessionState::Ending => "ending",
            SessionState::Ended => "ended",
            SessionState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Failed(reason) => write!(f, "failed ({})", reason.error.kind),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Operator's desired video/audio state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enablement {
    pub video: bool,
    pub audio: bool,
}

impl Default for Enablement {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

impl Enablement {
    pub fn get(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Video => self.video,
            TrackKind::Audio => self.audio,
        }
    }

    pub fn set(&mut self, kind: TrackKind, enabled: bool) {
        match kind {
            TrackKind::Video => self.video = enabled,
            TrackKind::Audio => self.audio = enabled,
        }
    }
}

/// Operator-supplied details for going live
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveMetadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl LiveMetadata {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Trimmed copy; a blank title is rejected
    pub fn validated(&self) -> SessionResult<LiveMetadata> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(SessionError::MissingTitle);
        }
        Ok(LiveMetadata {
            title: title.to_string(),
            description: self.description.trim().to_string(),
        })
    }
}

/// An on-air broadcast, created when going live succeeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveBroadcast {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub owner: String,
    pub started_at: DateTime<Utc>,
}

impl LiveBroadcast {
    pub fn start(metadata: LiveMetadata, owner: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: metadata.title,
            description: metadata.description,
            owner: owner.into(),
            started_at: Utc::now(),
        }
    }
}
