// SPDX-License-Identifier: GPL-3.0-only

//! Per-kind toggle serialization
//!
//! At most one toggle per track kind may be in flight. A second request for
//! the same kind is rejected with [`SessionError::Busy`] instead of queued, so
//! a control showing "pending" never lies about what will happen next.

use crate::backends::capture::TrackKind;
use crate::errors::{SessionError, SessionResult};
use tokio::time::Instant;
use tracing::debug;

/// An accepted, unresolved toggle intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleRequest {
    pub kind: TrackKind,
    pub target_enabled: bool,
    pub requested_at: Instant,
}

#[derive(Debug, Default)]
pub struct ToggleCoordinator {
    in_flight: [Option<ToggleRequest>; 2],
}

impl ToggleCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a toggle for `kind`, or fail with `Busy` if one is pending
    pub fn try_begin(&mut self, kind: TrackKind, target_enabled: bool) -> SessionResult<ToggleRequest> {
        let slot = &mut self.in_flight[kind.index()];
        if let Some(pending) = slot {
            debug!(%kind, pending_target = pending.target_enabled, "Toggle rejected, one already in flight");
            return Err(SessionError::Busy(kind));
        }

        let request = ToggleRequest {
            kind,
            target_enabled,
            requested_at: Instant::now(),
        };
        *slot = Some(request);
        Ok(request)
    }

    /// Resolve the in-flight toggle for `kind`
    pub fn finish(&mut self, kind: TrackKind) -> Option<ToggleRequest> {
        self.in_flight[kind.index()].take()
    }

    pub fn in_flight(&self, kind: TrackKind) -> Option<ToggleRequest> {
        self.in_flight[kind.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_request_same_kind_is_busy() {
        let mut coordinator = ToggleCoordinator::new();
        coordinator.try_begin(TrackKind::Video, true).unwrap();

        assert_eq!(
            coordinator.try_begin(TrackKind::Video, false),
            Err(SessionError::Busy(TrackKind::Video))
        );
        // Kinds are independent
        assert!(coordinator.try_begin(TrackKind::Audio, false).is_ok());
    }

    #[test]
    fn test_finish_frees_the_slot() {
        let mut coordinator = ToggleCoordinator::new();
        coordinator.try_begin(TrackKind::Audio, true).unwrap();

        let done = coordinator.finish(TrackKind::Audio).unwrap();
        assert!(done.target_enabled);
        assert!(coordinator.in_flight(TrackKind::Audio).is_none());
        assert!(coordinator.try_begin(TrackKind::Audio, false).is_ok());
    }
}
