// SPDX-License-Identifier: GPL-3.0-only

//! Device-capture abstraction
//!
//! This module hides the platform's camera/microphone API behind two traits
//! and builds the session's capture resources on top of them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  BroadcastSession   │  ← owns the one CaptureResource
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  ConstraintCascade  │  ← tier fallback, supplementary audio
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureDevice trait │  ← one awaitable request per tier
//! └──────────┬──────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │ SimulatedDevice │  ← scriptable platform (CLI, tests)
//!   └─────────────────┘
//! ```

pub mod cascade;
pub mod resource;
pub mod simulated;
pub mod types;

pub use cascade::{ConstraintCascade, ConstraintTier};
pub use resource::CaptureResource;
pub use simulated::{ScriptedOutcome, SimulatedCamera, SimulatedDevice};
pub use types::*;

use crate::errors::AcquisitionError;
use std::future::Future;

/// Platform device-capture API
///
/// Each call to [`get_user_media`](CaptureDevice::get_user_media) is a single
/// request: the platform either grants tracks for every requested kind or
/// rejects the whole request. Implementations must not retry internally.
pub trait CaptureDevice: Send + Sync + 'static {
    /// Request tracks satisfying `request`
    ///
    /// # Returns
    /// * `Ok(MediaTracks)` - Granted tracks (the platform may omit audio)
    /// * `Err(AcquisitionError)` - Rejection classified by kind
    fn get_user_media(
        &self,
        request: &CaptureRequest,
    ) -> impl Future<Output = Result<MediaTracks, AcquisitionError>> + Send;
}

/// A live hardware track handed out by the platform
///
/// Stopping is permanent: a stopped track cannot be re-enabled and must be
/// re-acquired.
pub trait MediaTrack: Send + Sync + std::fmt::Debug {
    fn id(&self) -> TrackId;

    fn kind(&self) -> TrackKind;

    /// Settings negotiated for this track
    fn settings(&self) -> TrackSettings;

    /// Hardware-level mute/unmute; no reacquisition
    fn set_enabled(&self, enabled: bool);

    /// Stop the track and release the device indicator
    fn stop(&self);
}
