// SPDX-License-Identifier: GPL-3.0-only

//! Scriptable in-process capture device
//!
//! Stands in for the platform camera API in the CLI and in tests. Each request
//! consumes the next [`ScriptedOutcome`] (default: grant), is checked against
//! the [`SimulatedCamera`] capabilities, and hands out tracks whose state stays
//! observable through the device handle after the session has taken them.
//!
//! Acquisitions can be held at a gate so callers can observe the session while
//! a request is outstanding.

use super::{
    CaptureDevice, CaptureRequest, Constraint, FacingMode, MediaTrack, MediaTracks, TrackId,
    TrackKind, TrackSettings, VideoConstraints,
};
use crate::errors::{AcquisitionError, AcquisitionErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Semaphore, watch};
use tracing::{debug, trace};

/// Hardware capabilities of the simulated camera and microphone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedCamera {
    pub max_width: u32,
    pub max_height: u32,
    pub max_frame_rate: u32,
    pub has_camera: bool,
    pub has_microphone: bool,
    /// Front (user-facing) rather than rear camera
    pub front_facing: bool,
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            max_frame_rate: 60,
            has_camera: true,
            has_microphone: true,
            front_facing: true,
        }
    }
}

/// Forced result for the next platform request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// Evaluate the request against the camera capabilities
    Grant,
    /// Grant, but omit the audio track
    GrantWithoutAudio,
    /// Grant with a 2x2 video track, as an under-provisioned device would
    GrantDegenerate,
    /// Reject the request outright
    Reject(AcquisitionErrorKind),
}

#[derive(Debug, Clone, Copy)]
struct TrackRecord {
    kind: TrackKind,
    enabled: bool,
}

#[derive(Debug, Default)]
struct SimState {
    camera: SimulatedCamera,
    script: VecDeque<ScriptedOutcome>,
    /// Live tracks only; a record is dropped when its track stops
    tracks: BTreeMap<TrackId, TrackRecord>,
    next_id: u64,
    requests: Vec<CaptureRequest>,
    gate: Option<Arc<Semaphore>>,
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated platform device
///
/// Cloning yields another handle onto the same device.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    state: Arc<Mutex<SimState>>,
    seen: Arc<watch::Sender<usize>>,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new(SimulatedCamera::default())
    }
}

impl SimulatedDevice {
    pub fn new(camera: SimulatedCamera) -> Self {
        let (seen, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(SimState {
                camera,
                ..SimState::default()
            })),
            seen: Arc::new(seen),
        }
    }

    pub fn camera(&self) -> SimulatedCamera {
        lock(&self.state).camera
    }

    /// Swap hardware capabilities (e.g. unplug the microphone)
    pub fn set_camera(&self, camera: SimulatedCamera) {
        lock(&self.state).camera = camera;
    }

    /// Queue the outcome for the next unscripted request
    pub fn push_outcome(&self, outcome: ScriptedOutcome) {
        lock(&self.state).script.push_back(outcome);
    }

    pub fn push_outcomes(&self, outcomes: impl IntoIterator<Item = ScriptedOutcome>) {
        lock(&self.state).script.extend(outcomes);
    }

    /// Hold every subsequent request until [`open_gate`](Self::open_gate)
    pub fn gate_acquisitions(&self) {
        lock(&self.state).gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `count` held requests through
    pub fn open_gate(&self, count: usize) {
        if let Some(gate) = &lock(&self.state).gate {
            gate.add_permits(count);
        }
    }

    /// Remove the gate; requests already waiting stay held
    pub fn ungate(&self) {
        lock(&self.state).gate = None;
    }

    /// Wait until at least `count` requests have reached the device
    pub async fn wait_for_requests(&self, count: usize) {
        let mut rx = self.seen.subscribe();
        // The sender lives as long as self, so this cannot fail
        let _ = rx.wait_for(|seen| *seen >= count).await;
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<CaptureRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.state).requests.len()
    }

    /// Tracks handed out and not yet stopped
    pub fn live_track_count(&self) -> usize {
        lock(&self.state).tracks.len()
    }

    pub fn live_tracks_of(&self, kind: TrackKind) -> Vec<TrackId> {
        lock(&self.state)
            .tracks
            .iter()
            .filter(|(_, t)| t.kind == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Hardware enabled flag of a live track; `None` once stopped or never issued
    pub fn track_enabled(&self, id: TrackId) -> Option<bool> {
        lock(&self.state).tracks.get(&id).map(|t| t.enabled)
    }

    /// Whether `id` was issued by this device and has since been stopped
    pub fn is_stopped(&self, id: TrackId) -> bool {
        let s = lock(&self.state);
        (1..=s.next_id).contains(&id.0) && !s.tracks.contains_key(&id)
    }
}

impl CaptureDevice for SimulatedDevice {
    fn get_user_media(
        &self,
        request: &CaptureRequest,
    ) -> impl Future<Output = Result<MediaTracks, AcquisitionError>> + Send {
        let request = request.clone();
        let state = Arc::clone(&self.state);
        let seen = Arc::clone(&self.seen);

        async move {
            let (outcome, gate) = {
                let mut s = lock(&state);
                s.requests.push(request.clone());
                let outcome = s.script.pop_front().unwrap_or(ScriptedOutcome::Grant);
                (outcome, s.gate.clone())
            };
            seen.send_modify(|count| *count += 1);
            trace!(?outcome, video = request.video.is_some(), audio = request.audio.is_some(), "Simulated request received");

            if let Some(gate) = gate {
                gate.acquire()
                    .await
                    .map_err(|_| AcquisitionError::unknown("Simulated device closed"))?
                    .forget();
            }

            resolve(&state, &request, outcome)
        }
    }
}

fn resolve(
    state: &Arc<Mutex<SimState>>,
    request: &CaptureRequest,
    outcome: ScriptedOutcome,
) -> Result<MediaTracks, AcquisitionError> {
    if let ScriptedOutcome::Reject(kind) = outcome {
        debug!(%kind, "Simulated request rejected by script");
        return Err(AcquisitionError::new(kind, scripted_message(kind)));
    }

    let mut s = lock(state);
    let camera = s.camera;

    let video = match &request.video {
        Some(constraints) => Some(negotiate(&camera, constraints)?),
        None => None,
    };
    if request.audio.is_some() && !camera.has_microphone {
        return Err(AcquisitionError::new(
            AcquisitionErrorKind::DeviceNotFound,
            "Requested microphone not found",
        ));
    }

    let video = video.map(|settings| match outcome {
        ScriptedOutcome::GrantDegenerate => TrackSettings {
            width: Some(2),
            height: Some(2),
            ..settings
        },
        _ => settings,
    });
    let audio = (request.audio.is_some() && outcome != ScriptedOutcome::GrantWithoutAudio)
        .then_some(TrackSettings::default());

    let mut tracks = MediaTracks::default();
    if let Some(settings) = video {
        tracks.video = Some(s.issue(TrackKind::Video, settings, state));
    }
    if let Some(settings) = audio {
        tracks.audio = Some(s.issue(TrackKind::Audio, settings, state));
    }
    Ok(tracks)
}

impl SimState {
    fn issue(
        &mut self,
        kind: TrackKind,
        settings: TrackSettings,
        handle: &Arc<Mutex<SimState>>,
    ) -> Box<dyn MediaTrack> {
        self.next_id += 1;
        let id = TrackId(self.next_id);
        self.tracks.insert(
            id,
            TrackRecord { kind, enabled: true },
        );
        debug!(%id, %kind, %settings, "Simulated track issued");
        Box::new(SimTrack {
            id,
            kind,
            settings,
            state: Arc::clone(handle),
        })
    }
}

fn scripted_message(kind: AcquisitionErrorKind) -> &'static str {
    match kind {
        AcquisitionErrorKind::PermissionDenied => "NotAllowedError: Permission denied",
        AcquisitionErrorKind::DeviceNotFound => "NotFoundError: Requested device not found",
        AcquisitionErrorKind::DeviceBusy => "NotReadableError: Could not start video source",
        AcquisitionErrorKind::OverConstrained => "OverconstrainedError: Constraints could not be satisfied",
        AcquisitionErrorKind::Unknown => "Simulated platform failure",
    }
}

fn over_constrained(what: &str) -> AcquisitionError {
    AcquisitionError::new(
        AcquisitionErrorKind::OverConstrained,
        format!("OverconstrainedError: {} cannot be satisfied", what),
    )
}

/// Resolve one dimension against the hardware maximum
fn fit(
    constraint: Option<&Constraint<u32>>,
    max: u32,
    fallback: u32,
    what: &str,
) -> Result<u32, AcquisitionError> {
    match constraint {
        None => Ok(fallback.min(max)),
        Some(Constraint::Exact(v)) if *v > max => Err(over_constrained(what)),
        Some(Constraint::Exact(v)) => Ok(*v),
        Some(Constraint::Ideal { min: Some(m), .. }) if *m > max => Err(over_constrained(what)),
        Some(Constraint::Ideal { ideal, .. }) => Ok((*ideal).min(max)),
    }
}

fn negotiate(
    camera: &SimulatedCamera,
    constraints: &VideoConstraints,
) -> Result<TrackSettings, AcquisitionError> {
    if !camera.has_camera {
        return Err(AcquisitionError::new(
            AcquisitionErrorKind::DeviceNotFound,
            "NotFoundError: Requested device not found",
        ));
    }

    match constraints.facing_mode {
        Some(FacingMode::User) if !camera.front_facing => return Err(over_constrained("facingMode")),
        Some(FacingMode::Environment) if camera.front_facing => {
            return Err(over_constrained("facingMode"));
        }
        _ => {}
    }

    let width = fit(constraints.width.as_ref(), camera.max_width, 640, "width")?;
    let height = fit(constraints.height.as_ref(), camera.max_height, 480, "height")?;
    let frame_rate = fit(constraints.frame_rate.as_ref(), camera.max_frame_rate, 30, "frameRate")?;

    if let Some(Constraint::Exact(ratio)) = constraints.aspect_ratio {
        let actual = width as f64 / height.max(1) as f64;
        if (actual - ratio).abs() > 0.01 {
            return Err(over_constrained("aspectRatio"));
        }
    }

    Ok(TrackSettings {
        width: Some(width),
        height: Some(height),
        frame_rate: Some(frame_rate),
    })
}

struct SimTrack {
    id: TrackId,
    kind: TrackKind,
    settings: TrackSettings,
    state: Arc<Mutex<SimState>>,
}

impl std::fmt::Debug for SimTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl MediaTrack for SimTrack {
    fn id(&self) -> TrackId {
        self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn settings(&self) -> TrackSettings {
        self.settings
    }

    fn set_enabled(&self, enabled: bool) {
        if let Some(record) = lock(&self.state).tracks.get_mut(&self.id) {
            record.enabled = enabled;
        }
    }

    fn stop(&self) {
        if lock(&self.state).tracks.remove(&self.id).is_some() {
            trace!(id = %self.id, kind = %self.kind, "Simulated track stopped");
        }
    }
}
