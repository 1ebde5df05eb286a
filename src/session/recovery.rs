// SPDX-License-Identifier: GPL-3.0-only

//! One-shot recovery from under-provisioned video output

use crate::errors::SessionError;
use tracing::debug;

/// What the supervisor wants done about one metadata report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    Healthy,
    /// Degenerate output, first time: reacquire once
    Remediate,
    /// Degenerate output, already tried: live with it
    StandDown,
}

/// Result of [`BroadcastSession::observe_metadata`](super::BroadcastSession::observe_metadata)
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    Healthy,
    /// Metadata only matters while live
    NotLive,
    /// Video is intentionally off; the report is ignored
    VideoOff,
    /// A video replacement is already running; the report describes the old track
    ReplacementPending,
    StandDown,
    /// The automatic reacquire installed a new video track
    Reacquired,
    /// The automatic reacquire did not install a track
    Abandoned(SessionError),
}

/// Session-scoped recovery policy holding the `has_attempted` flag
#[derive(Debug, Clone)]
pub struct RecoverySupervisor {
    min_dimension: u32,
    has_attempted: bool,
}

impl RecoverySupervisor {
    pub fn new(min_dimension: u32) -> Self {
        Self {
            min_dimension,
            has_attempted: false,
        }
    }

    /// Classify one metadata report; sets the flag the first time it remediates
    pub fn assess(&mut self, width: u32, height: u32) -> RecoveryDecision {
        if width >= self.min_dimension && height >= self.min_dimension {
            return RecoveryDecision::Healthy;
        }
        if self.has_attempted {
            debug!(width, height, "Degenerate video again, automatic recovery already used");
            return RecoveryDecision::StandDown;
        }
        self.has_attempted = true;
        RecoveryDecision::Remediate
    }

    pub fn has_attempted(&self) -> bool {
        self.has_attempted
    }

    /// Re-arm for a new broadcast
    pub fn reset(&mut self) {
        self.has_attempted = false;
    }
}
