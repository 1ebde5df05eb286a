// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the capture backend abstraction

//! Shared types for capture backends

use super::MediaTrack;
use serde::{Deserialize, Serialize};

/// Which half of a capture resource a track belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    pub const ALL: [TrackKind; 2] = [TrackKind::Video, TrackKind::Audio];

    /// Stable slot index (video = 0, audio = 1)
    pub fn index(&self) -> usize {
        match self {
            TrackKind::Video => 0,
            TrackKind::Audio => 1,
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
        }
    }
}

/// Platform-assigned hardware track handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

/// A single device-capability requirement
///
/// `Exact` values must be met or the request is rejected; `Ideal` values
/// are a target the platform approaches without going below `min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constraint<T> {
    Exact(T),
    Ideal { ideal: T, min: Option<T> },
}

impl<T: Copy> Constraint<T> {
    pub fn ideal(ideal: T) -> Self {
        Constraint::Ideal { ideal, min: None }
    }

    pub fn ideal_with_min(ideal: T, min: T) -> Self {
        Constraint::Ideal {
            ideal,
            min: Some(min),
        }
    }

    /// The value the platform should aim for
    pub fn target(&self) -> T {
        match self {
            Constraint::Exact(v) => *v,
            Constraint::Ideal { ideal, .. } => *ideal,
        }
    }
}

/// Camera facing direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front / selfie camera
    User,
    /// Rear camera
    Environment,
}

/// Video capability request for one tier
///
/// All fields `None` is the boolean "any camera will do" request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConstraints {
    pub width: Option<Constraint<u32>>,
    pub height: Option<Constraint<u32>>,
    pub frame_rate: Option<Constraint<u32>>,
    pub aspect_ratio: Option<Constraint<f64>>,
    pub facing_mode: Option<FacingMode>,
}

impl VideoConstraints {
    /// Boolean `true` request: any camera mode
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_any(&self) -> bool {
        *self == Self::default()
    }
}

impl std::fmt::Display for VideoConstraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_any() {
            return write!(f, "any");
        }
        let describe = |c: &Constraint<u32>| match c {
            Constraint::Exact(v) => format!("={}", v),
            Constraint::Ideal { ideal, min: Some(m) } => format!("~{}(>={})", ideal, m),
            Constraint::Ideal { ideal, min: None } => format!("~{}", ideal),
        };
        let mut parts = Vec::new();
        if let Some(w) = &self.width {
            parts.push(format!("w{}", describe(w)));
        }
        if let Some(h) = &self.height {
            parts.push(format!("h{}", describe(h)));
        }
        if let Some(fps) = &self.frame_rate {
            parts.push(format!("fps{}", describe(fps)));
        }
        if let Some(facing) = &self.facing_mode {
            parts.push(format!("facing={:?}", facing).to_lowercase());
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// Audio capability request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConstraints {
    pub echo_cancellation: Option<bool>,
    pub noise_suppression: Option<bool>,
}

impl AudioConstraints {
    /// Boolean `true` request: any microphone
    pub fn any() -> Self {
        Self::default()
    }
}

/// One device-capture request as handed to the platform
///
/// `None` for a kind means that kind is not requested at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub video: Option<VideoConstraints>,
    pub audio: Option<AudioConstraints>,
}

impl CaptureRequest {
    pub fn audio_only(audio: AudioConstraints) -> Self {
        Self {
            video: None,
            audio: Some(audio),
        }
    }

    pub fn wants(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Video => self.video.is_some(),
            TrackKind::Audio => self.audio.is_some(),
        }
    }
}

/// Settings the platform actually negotiated for a track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<u32>,
}

impl std::fmt::Display for TrackSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.width, self.height) {
            (Some(w), Some(h)) => match self.frame_rate {
                Some(fps) => write!(f, "{}x{} @ {}fps", w, h, fps),
                None => write!(f, "{}x{}", w, h),
            },
            _ => write!(f, "n/a"),
        }
    }
}

/// Tracks returned by one successful platform request
///
/// Tracks that are not moved into a `CaptureResource` are stopped when this
/// value is dropped.
#[derive(Debug, Default)]
pub struct MediaTracks {
    pub video: Option<Box<dyn MediaTrack>>,
    pub audio: Option<Box<dyn MediaTrack>>,
}

impl MediaTracks {
    pub fn has(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Video => self.video.is_some(),
            TrackKind::Audio => self.audio.is_some(),
        }
    }
}

impl Drop for MediaTracks {
    fn drop(&mut self) {
        for track in [self.video.take(), self.audio.take()].into_iter().flatten() {
            track.stop();
        }
    }
}

/// Read-only view of one track, safe to hand to presenters and sinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackView {
    pub id: TrackId,
    pub enabled: bool,
    pub settings: TrackSettings,
}

/// Read-only view of a capture resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureView {
    pub video: Option<TrackView>,
    pub audio: Option<TrackView>,
    /// Index into the cascade of the tier that produced the video track
    pub tier_used: Option<usize>,
}

impl CaptureView {
    pub fn track(&self, kind: TrackKind) -> Option<&TrackView> {
        match kind {
            TrackKind::Video => self.video.as_ref(),
            TrackKind::Audio => self.audio.as_ref(),
        }
    }
}
