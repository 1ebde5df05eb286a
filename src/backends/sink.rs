// SPDX-License-Identifier: GPL-3.0-only

//! Viewer sink: the opaque consumer of the on-air capture output
//!
//! The session hands the sink a [`CaptureView`] when it goes live and again
//! whenever the video track is replaced. Sinks never receive track handles, so
//! nothing outside the session can keep a device open.

use super::capture::CaptureView;
use tracing::info;

/// Consumer of the produced capture output (display or transmission)
///
/// Called outside the session lock; implementations may call back into the
/// session's read accessors.
pub trait ViewerSink: Send + Sync {
    /// Start consuming, or switch to a replaced track set
    fn attach(&self, view: &CaptureView);

    /// Stop consuming; the tracks are about to be released
    fn detach(&self);
}

/// Sink that only logs what it would show
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl ViewerSink for LoggingSink {
    fn attach(&self, view: &CaptureView) {
        info!(
            video = ?view.video.as_ref().map(|t| t.id),
            audio = ?view.audio.as_ref().map(|t| t.id),
            tier = ?view.tier_used,
            "Viewer sink attached"
        );
    }

    fn detach(&self) {
        info!("Viewer sink detached");
    }
}
