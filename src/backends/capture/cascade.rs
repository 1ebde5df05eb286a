// SPDX-License-Identifier: GPL-3.0-only

//! Constraint cascade: ordered capability tiers tried until one is granted
//!
//! The first tier the platform accepts wins, even when a later tier would have
//! looked better. Retrying is not this module's job; callers above decide
//! whether another acquisition is warranted.

use super::{
    AudioConstraints, CaptureDevice, CaptureRequest, CaptureResource, Constraint, FacingMode,
    TrackKind, VideoConstraints,
};
use crate::constants::capture;
use crate::errors::AcquisitionError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One device-capability request tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintTier {
    /// Lower is tried first
    pub priority: u32,
    /// Short description for logs and the CLI
    pub label: String,
    #[serde(default)]
    pub video: VideoConstraints,
    #[serde(default)]
    pub audio: AudioConstraints,
}

impl ConstraintTier {
    pub fn new(priority: u32, label: impl Into<String>, video: VideoConstraints) -> Self {
        Self {
            priority,
            label: label.into(),
            video,
            audio: AudioConstraints::any(),
        }
    }

    /// Platform request for this tier
    pub fn request(&self, want_audio: bool) -> CaptureRequest {
        CaptureRequest {
            video: Some(self.video.clone()),
            audio: want_audio.then_some(self.audio),
        }
    }
}

/// Ordered, immutable table of constraint tiers
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintCascade {
    tiers: Vec<ConstraintTier>,
}

impl ConstraintCascade {
    /// Build a cascade; tiers are ordered by ascending priority (stable)
    pub fn new(mut tiers: Vec<ConstraintTier>) -> Self {
        tiers.sort_by_key(|t| t.priority);
        Self { tiers }
    }

    /// Default broadcast cascade: exact 720p down to "any camera"
    pub fn standard() -> Self {
        Self::new(standard_tiers())
    }

    pub fn tiers(&self) -> &[ConstraintTier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Acquire a capture resource, walking the tiers top-down
    ///
    /// # Returns
    /// * `Ok(CaptureResource)` - Resource from the first granted tier; audio
    ///   is best-effort and may be missing
    /// * `Err(AcquisitionError)` - The first tier's rejection, once every tier
    ///   has failed
    pub async fn acquire<D: CaptureDevice>(
        &self,
        device: &D,
        want_video: bool,
        want_audio: bool,
    ) -> Result<CaptureResource, AcquisitionError> {
        if !want_video && !want_audio {
            return Err(AcquisitionError::unknown(
                "Nothing to capture: video and audio are both turned off",
            ));
        }

        let audio_spec = self.tiers.first().map(|t| t.audio).unwrap_or_default();

        if !want_video {
            debug!("Requesting audio-only capture");
            let tracks = device
                .get_user_media(&CaptureRequest::audio_only(audio_spec))
                .await?;
            return Ok(CaptureResource::from_tracks(tracks, None));
        }

        if self.tiers.is_empty() {
            return Err(AcquisitionError::unknown("Constraint cascade has no tiers"));
        }

        let mut first_error: Option<AcquisitionError> = None;

        for (index, tier) in self.tiers.iter().enumerate() {
            info!(tier = index, label = %tier.label, video = %tier.video, want_audio, "Trying constraint tier");

            let outcome = match device.get_user_media(&tier.request(want_audio)).await {
                Ok(tracks) if !tracks.has(TrackKind::Video) => Err(AcquisitionError::unknown(
                    "Platform granted the request without a video track",
                )),
                other => other,
            };

            match outcome {
                Ok(tracks) => {
                    let mut resource = CaptureResource::from_tracks(tracks, Some(index));
                    if want_audio && !resource.has(TrackKind::Audio) {
                        supplement_audio(device, &mut resource, tier.audio).await;
                    }
                    info!(
                        tier = index,
                        settings = %resource.settings(TrackKind::Video).unwrap_or_default(),
                        audio = resource.has(TrackKind::Audio),
                        "Constraint tier granted"
                    );
                    return Ok(resource);
                }
                Err(err) => {
                    debug!(tier = index, kind = %err.kind, error = %err.message, "Constraint tier rejected");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        let err = first_error
            .unwrap_or_else(|| AcquisitionError::unknown("Could not access camera with any constraints"));
        warn!(kind = %err.kind, tiers = self.tiers.len(), "All constraint tiers rejected");
        Err(err)
    }
}

impl Default for ConstraintCascade {
    fn default() -> Self {
        Self::standard()
    }
}

/// Best-effort microphone request merged into a resource that came back without audio
async fn supplement_audio<D: CaptureDevice>(
    device: &D,
    resource: &mut CaptureResource,
    audio: AudioConstraints,
) {
    debug!("Granted tracks lack audio, requesting microphone separately");

    match device.get_user_media(&CaptureRequest::audio_only(audio)).await {
        Ok(mut tracks) => match tracks.audio.take() {
            Some(track) => {
                info!(track = %track.id(), "Supplementary audio track added");
                resource.merge_track(track);
            }
            None => debug!("Supplementary request returned no audio track"),
        },
        Err(err) => {
            // Audio is optional; carry on video-only
            debug!(kind = %err.kind, "Supplementary audio request failed, continuing without audio");
        }
    }
}

/// The standard five-tier broadcast cascade
pub fn standard_tiers() -> Vec<ConstraintTier> {
    use capture::*;

    let exact_720p = VideoConstraints {
        width: Some(Constraint::Exact(TARGET_WIDTH)),
        height: Some(Constraint::Exact(TARGET_HEIGHT)),
        frame_rate: Some(Constraint::Exact(TARGET_FRAME_RATE)),
        aspect_ratio: Some(Constraint::Exact(TARGET_ASPECT_RATIO)),
        facing_mode: None,
    };

    vec![
        ConstraintTier::new(
            0,
            "exact 720p, front camera",
            VideoConstraints {
                facing_mode: Some(FacingMode::User),
                ..exact_720p.clone()
            },
        ),
        ConstraintTier::new(1, "exact 720p", exact_720p),
        ConstraintTier::new(
            2,
            "ideal 720p, front camera",
            VideoConstraints {
                width: Some(Constraint::ideal_with_min(TARGET_WIDTH, MIN_WIDTH)),
                height: Some(Constraint::ideal_with_min(TARGET_HEIGHT, MIN_HEIGHT)),
                frame_rate: Some(Constraint::ideal_with_min(TARGET_FRAME_RATE, MIN_FRAME_RATE)),
                aspect_ratio: Some(Constraint::ideal(TARGET_ASPECT_RATIO)),
                facing_mode: Some(FacingMode::User),
            },
        ),
        ConstraintTier::new(
            3,
            "basic 480p",
            VideoConstraints {
                width: Some(Constraint::ideal_with_min(BASIC_WIDTH, BASIC_MIN_WIDTH)),
                height: Some(Constraint::ideal_with_min(BASIC_HEIGHT, BASIC_MIN_HEIGHT)),
                frame_rate: Some(Constraint::ideal_with_min(TARGET_FRAME_RATE, MIN_FRAME_RATE)),
                aspect_ratio: None,
                facing_mode: None,
            },
        ),
        ConstraintTier::new(4, "any camera", VideoConstraints::any()),
    ]
}
