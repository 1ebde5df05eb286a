// SPDX-License-Identifier: GPL-3.0-only

//! Owned capture resource (zero-or-one video track, zero-or-one audio track)

use super::{CaptureView, MediaTrack, MediaTracks, TrackId, TrackKind, TrackSettings, TrackView};
use crate::errors::{SessionError, SessionResult};
use tracing::{debug, info};

/// One half of a capture resource
#[derive(Debug)]
struct SubResource {
    track: Box<dyn MediaTrack>,
    enabled: bool,
}

impl SubResource {
    fn new(track: Box<dyn MediaTrack>) -> Self {
        Self {
            track,
            enabled: true,
        }
    }

    fn view(&self) -> TrackView {
        TrackView {
            id: self.track.id(),
            enabled: self.enabled,
            settings: self.track.settings(),
        }
    }
}

/// Camera/microphone handle owned by the session
///
/// Releasing is idempotent and also happens on drop, so a resource can never
/// outlive its owner with the device indicator still on.
#[derive(Debug, Default)]
pub struct CaptureResource {
    video: Option<SubResource>,
    audio: Option<SubResource>,
    tier_used: Option<usize>,
}

impl CaptureResource {
    /// Take ownership of granted tracks; everything starts enabled
    pub fn from_tracks(mut tracks: MediaTracks, tier_used: Option<usize>) -> Self {
        Self {
            video: tracks.video.take().map(SubResource::new),
            audio: tracks.audio.take().map(SubResource::new),
            tier_used,
        }
    }

    fn slot(&self, kind: TrackKind) -> Option<&SubResource> {
        match kind {
            TrackKind::Video => self.video.as_ref(),
            TrackKind::Audio => self.audio.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: TrackKind) -> &mut Option<SubResource> {
        match kind {
            TrackKind::Video => &mut self.video,
            TrackKind::Audio => &mut self.audio,
        }
    }

    /// Whether a track of this kind is held (enabled or not)
    pub fn has(&self, kind: TrackKind) -> bool {
        self.slot(kind).is_some()
    }

    /// Enabled flag; false when the track is absent
    pub fn is_enabled(&self, kind: TrackKind) -> bool {
        self.slot(kind).is_some_and(|s| s.enabled)
    }

    pub fn video_enabled(&self) -> bool {
        self.is_enabled(TrackKind::Video)
    }

    pub fn audio_enabled(&self) -> bool {
        self.is_enabled(TrackKind::Audio)
    }

    /// Cascade tier index that produced the video track
    pub fn tier_used(&self) -> Option<usize> {
        self.tier_used
    }

    pub fn track_id(&self, kind: TrackKind) -> Option<TrackId> {
        self.slot(kind).map(|s| s.track.id())
    }

    pub fn settings(&self, kind: TrackKind) -> Option<TrackSettings> {
        self.slot(kind).map(|s| s.track.settings())
    }

    /// True once every sub-resource has been released
    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }

    /// Mute/unmute a sub-resource in place
    ///
    /// Never reacquires. Returns whether the flag actually changed.
    pub fn set_subresource_enabled(&mut self, kind: TrackKind, enabled: bool) -> SessionResult<bool> {
        let sub = self
            .slot_mut(kind)
            .as_mut()
            .ok_or(SessionError::SubresourceUnavailable(kind))?;

        if sub.enabled == enabled {
            return Ok(false);
        }

        sub.track.set_enabled(enabled);
        sub.enabled = enabled;
        debug!(%kind, enabled, track = %sub.track.id(), "Sub-resource toggled in place");
        Ok(true)
    }

    /// Stop and discard one sub-resource, keeping the other
    pub fn release_subresource(&mut self, kind: TrackKind) {
        if let Some(sub) = self.slot_mut(kind).take() {
            info!(%kind, track = %sub.track.id(), "Stopping track");
            sub.track.stop();
        }
    }

    /// Move `other`'s track of `kind` into this resource
    ///
    /// Any track of that kind already held here is stopped first. The adopted
    /// track takes the given enabled flag; `other` keeps its remaining tracks.
    pub fn adopt(&mut self, other: &mut CaptureResource, kind: TrackKind, enabled: bool) {
        let Some(sub) = other.slot_mut(kind).take() else {
            return;
        };
        self.release_subresource(kind);

        sub.track.set_enabled(enabled);
        let adopted = SubResource {
            track: sub.track,
            enabled,
        };
        debug!(%kind, track = %adopted.track.id(), enabled, "Adopted track into resource");
        *self.slot_mut(kind) = Some(adopted);

        if kind == TrackKind::Video {
            self.tier_used = other.tier_used;
        }
    }

    /// Attach a supplementary track obtained by a separate request
    pub(crate) fn merge_track(&mut self, track: Box<dyn MediaTrack>) {
        let kind = track.kind();
        self.release_subresource(kind);
        *self.slot_mut(kind) = Some(SubResource::new(track));
    }

    /// Stop every track; safe to call any number of times
    pub fn release(&mut self) {
        if self.is_empty() {
            return;
        }
        for kind in TrackKind::ALL {
            self.release_subresource(kind);
        }
        info!("Capture resource released");
    }

    /// Snapshot for sinks and presenters
    pub fn view(&self) -> CaptureView {
        CaptureView {
            video: self.video.as_ref().map(SubResource::view),
            audio: self.audio.as_ref().map(SubResource::view),
            tier_used: self.tier_used,
        }
    }
}

impl Drop for CaptureResource {
    fn drop(&mut self) {
        self.release();
    }
}
