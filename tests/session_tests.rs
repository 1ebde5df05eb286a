// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the broadcast session state machine

use livecast::backends::capture::{
    CaptureView, Constraint, ConstraintCascade, ConstraintTier, ScriptedOutcome, SimulatedDevice, TrackKind,
    VideoConstraints,
};
use livecast::backends::sink::ViewerSink;
use livecast::errors::{AcquisitionErrorKind, SessionError};
use livecast::session::{
    BroadcastSession, ChatKind, Enablement, FailureOrigin, LiveMetadata, RecoveryOutcome, SessionEvent,
    SessionOptions, SessionState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Default)]
struct RecordingSink {
    attached: Mutex<Vec<CaptureView>>,
    detached: AtomicUsize,
}

impl RecordingSink {
    fn attach_count(&self) -> usize {
        self.attached.lock().unwrap().len()
    }

    fn detach_count(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }
}

impl ViewerSink for RecordingSink {
    fn attach(&self, view: &CaptureView) {
        self.attached.lock().unwrap().push(view.clone());
    }

    fn detach(&self) {
        self.detached.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    device: Arc<SimulatedDevice>,
    sink: Arc<RecordingSink>,
    session: BroadcastSession<SimulatedDevice>,
}

fn harness_with(options: SessionOptions) -> Harness {
    let device = Arc::new(SimulatedDevice::default());
    let sink = Arc::new(RecordingSink::default());
    let session = BroadcastSession::new(Arc::clone(&device), options.with_sink(sink.clone()));
    Harness { device, sink, session }
}

fn harness() -> Harness {
    harness_with(SessionOptions::default())
}

fn quiet_options() -> SessionOptions {
    SessionOptions {
        greet_on_go_live: false,
        ..SessionOptions::default()
    }
}

fn metadata() -> LiveMetadata {
    LiveMetadata::new("Autumn lookbook", "Walkthrough of the new pieces")
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn notices(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Notice(n) => Some(n.title.clone()),
            _ => None,
        })
        .collect()
}

fn reject_all(device: &SimulatedDevice, kind: AcquisitionErrorKind, count: usize) {
    device.push_outcomes(std::iter::repeat_n(ScriptedOutcome::Reject(kind), count));
}

async fn go_live(h: &Harness) {
    h.session.start_preview().await.unwrap();
    h.session.go_live(metadata()).await.unwrap();
    assert_eq!(h.session.state(), SessionState::Live);
}

fn video_id(session: &BroadcastSession<SimulatedDevice>) -> Option<livecast::backends::capture::TrackId> {
    session.capture_view().and_then(|v| v.video).map(|t| t.id)
}

// ===== Cascade scenarios =====

#[tokio::test]
async fn test_preview_falls_back_to_boolean_tier() {
    let cascade = ConstraintCascade::new(vec![
        ConstraintTier::new(
            0,
            "exact 720p",
            VideoConstraints {
                width: Some(Constraint::Exact(1280)),
                height: Some(Constraint::Exact(720)),
                ..VideoConstraints::any()
            },
        ),
        ConstraintTier::new(
            1,
            "ideal 480p",
            VideoConstraints {
                width: Some(Constraint::ideal(640)),
                height: Some(Constraint::ideal(480)),
                ..VideoConstraints::any()
            },
        ),
        ConstraintTier::new(2, "any", VideoConstraints::any()),
    ]);
    let h = harness_with(SessionOptions::default().with_cascade(cascade));
    reject_all(&h.device, AcquisitionErrorKind::OverConstrained, 2);

    let view = h.session.start_preview().await.unwrap();

    assert_eq!(h.session.state(), SessionState::Previewing);
    assert_eq!(view.tier_used, Some(2));
    assert_eq!(h.device.request_count(), 3);
}

#[tokio::test]
async fn test_preview_failure_surfaces_diagnostic_and_allows_retry() {
    let h = harness();
    let mut rx = h.session.subscribe();
    reject_all(&h.device, AcquisitionErrorKind::DeviceBusy, 5);

    let err = h.session.start_preview().await.unwrap_err();
    assert!(matches!(
        &err,
        SessionError::Acquisition(e) if e.kind == AcquisitionErrorKind::DeviceBusy
    ));
    assert!(matches!(
        h.session.state(),
        SessionState::Failed(reason) if reason.origin == FailureOrigin::Preview
    ));
    assert_eq!(h.device.live_track_count(), 0);

    let events = drain(&mut rx);
    let notice = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::Notice(n) => Some(n.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(notice.title, "Camera Access Failed");
    assert!(notice.description.contains("another application"));

    h.session.start_preview().await.unwrap();
    assert_eq!(h.session.state(), SessionState::Previewing);
}

#[tokio::test]
async fn test_exhausted_cascade_reports_lower_quality() {
    let h = harness();
    let mut rx = h.session.subscribe();
    reject_all(&h.device, AcquisitionErrorKind::OverConstrained, 5);

    let err = h.session.go_live(metadata()).await.unwrap_err();
    assert!(matches!(err, SessionError::Acquisition(_)));

    let events = drain(&mut rx);
    let description = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::Notice(n) if n.title == "Camera Access Required" => Some(n.description.clone()),
            _ => None,
        })
        .unwrap();
    assert!(description.contains("lower quality"));
}

// ===== Going live =====

#[tokio::test]
async fn test_go_live_reuses_satisfying_preview() {
    let h = harness();
    h.session.start_preview().await.unwrap();
    let preview_video = video_id(&h.session);

    let broadcast = h.session.go_live(metadata()).await.unwrap();

    assert_eq!(broadcast.title, "Autumn lookbook");
    assert_eq!(h.device.request_count(), 1);
    assert_eq!(video_id(&h.session), preview_video);
    assert_eq!(h.sink.attach_count(), 1);
    assert_eq!(h.session.broadcast().map(|b| b.id), Some(broadcast.id));
}

#[tokio::test]
async fn test_go_live_reacquires_when_preview_lacks_audio() {
    let h = harness();
    h.device.push_outcomes([
        ScriptedOutcome::GrantWithoutAudio,
        ScriptedOutcome::Reject(AcquisitionErrorKind::DeviceNotFound),
    ]);
    h.session.start_preview().await.unwrap();
    let preview_video = video_id(&h.session).unwrap();
    assert!(h.session.capture_view().unwrap().audio.is_none());

    h.session.go_live(metadata()).await.unwrap();

    assert!(h.device.is_stopped(preview_video));
    assert_ne!(video_id(&h.session), Some(preview_video));
    assert!(h.session.capture_view().unwrap().audio.is_some());
    assert_eq!(h.device.live_track_count(), 2);
}

#[tokio::test]
async fn test_go_live_from_idle() {
    let h = harness();
    h.session.go_live(metadata()).await.unwrap();

    assert_eq!(h.session.state(), SessionState::Live);
    assert_eq!(h.device.live_track_count(), 2);
}

#[tokio::test]
async fn test_blank_title_is_rejected_before_transition() {
    let h = harness();
    let err = h.session.go_live(LiveMetadata::new("   ", "")).await.unwrap_err();

    assert_eq!(err, SessionError::MissingTitle);
    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.device.request_count(), 0);
}

#[tokio::test]
async fn test_double_go_live_is_rejected_while_acquiring() {
    let h = harness();
    h.device.gate_acquisitions();

    let first = {
        let session = h.session.clone();
        tokio::spawn(async move { session.go_live(metadata()).await })
    };
    h.device.wait_for_requests(1).await;
    assert_eq!(h.session.state(), SessionState::LiveAcquiring);

    let second = h.session.go_live(metadata()).await;
    assert!(matches!(
        second,
        Err(SessionError::Reentrant {
            state: SessionState::LiveAcquiring,
            ..
        })
    ));
    assert!(matches!(
        h.session.start_preview().await,
        Err(SessionError::Reentrant { .. })
    ));

    h.device.open_gate(1);
    first.await.unwrap().unwrap();

    assert_eq!(h.session.state(), SessionState::Live);
    assert_eq!(h.device.request_count(), 1);
    assert_eq!(h.device.live_tracks_of(TrackKind::Video).len(), 1);
}

#[tokio::test]
async fn test_go_live_posts_greetings() {
    let h = harness();
    go_live(&h).await;

    let snapshot = h.session.chat_snapshot();
    let bodies: Vec<_> = snapshot.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(
        bodies,
        ["Streamer started the live stream!", "Welcome to the live stream chat!"]
    );
    assert!(snapshot.iter().all(|m| m.kind == ChatKind::System));
}

// ===== Toggles =====

#[tokio::test]
async fn test_second_video_off_is_noop() {
    let h = harness();
    go_live(&h).await;
    let video = video_id(&h.session).unwrap();

    let first = h.session.toggle(TrackKind::Video, false).await.unwrap();
    let second = h.session.toggle(TrackKind::Video, false).await.unwrap();

    assert_eq!(first, second);
    assert!(!second.video);
    assert_eq!(video_id(&h.session), Some(video));
    assert_eq!(h.device.track_enabled(video), Some(false));
    assert_eq!(h.device.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_video_cycle_replaces_track_and_keeps_audio_flag() {
    let h = harness();
    go_live(&h).await;
    h.session.toggle(TrackKind::Audio, false).await.unwrap();
    let old_video = video_id(&h.session).unwrap();
    let audio = h.session.capture_view().unwrap().audio.unwrap();

    h.session.toggle(TrackKind::Video, false).await.unwrap();
    let enablement = h.session.toggle(TrackKind::Video, true).await.unwrap();

    assert_eq!(enablement, Enablement { video: true, audio: false });
    let view = h.session.capture_view().unwrap();
    let new_video = view.video.unwrap();
    assert_ne!(new_video.id, old_video);
    assert!(new_video.enabled);
    assert!(h.device.is_stopped(old_video));

    let new_audio = view.audio.unwrap();
    assert_eq!(new_audio.id, audio.id);
    assert!(!new_audio.enabled);
    assert_eq!(h.device.live_tracks_of(TrackKind::Video).len(), 1);

    // The replaced track is handed to the viewer
    assert_eq!(h.sink.attach_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_video_on_waits_for_debounce() {
    let h = harness();
    go_live(&h).await;
    h.session.toggle(TrackKind::Video, false).await.unwrap();

    let start = tokio::time::Instant::now();
    h.session.toggle(TrackKind::Video, true).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test]
async fn test_preview_video_toggle_is_in_place() {
    let h = harness();
    h.session.start_preview().await.unwrap();
    let video = video_id(&h.session).unwrap();

    h.session.toggle_video().await.unwrap();
    h.session.toggle_video().await.unwrap();

    assert_eq!(video_id(&h.session), Some(video));
    assert_eq!(h.device.track_enabled(video), Some(true));
    assert_eq!(h.device.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_toggle_same_kind_is_busy() {
    let h = harness();
    go_live(&h).await;
    h.session.toggle(TrackKind::Video, false).await.unwrap();

    let pending = {
        let session = h.session.clone();
        tokio::spawn(async move { session.toggle(TrackKind::Video, true).await })
    };
    // Inside the debounce window
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.session.toggle_in_flight(TrackKind::Video));

    assert_eq!(
        h.session.toggle(TrackKind::Video, false).await,
        Err(SessionError::Busy(TrackKind::Video))
    );
    // The other kind is independent
    assert!(h.session.toggle(TrackKind::Audio, false).await.is_ok());

    pending.await.unwrap().unwrap();
    assert!(!h.session.toggle_in_flight(TrackKind::Video));
    assert!(!h.session.capture_view().unwrap().audio.unwrap().enabled);
}

#[tokio::test]
async fn test_audio_on_without_track_is_unavailable() {
    let h = harness();
    h.device.push_outcomes([
        ScriptedOutcome::GrantWithoutAudio,
        ScriptedOutcome::Reject(AcquisitionErrorKind::DeviceNotFound),
    ]);
    h.session.start_preview().await.unwrap();

    assert_eq!(
        h.session.toggle(TrackKind::Audio, true).await,
        Err(SessionError::SubresourceUnavailable(TrackKind::Audio))
    );
    assert!(!h.session.toggle_in_flight(TrackKind::Audio));
    assert_eq!(h.session.state(), SessionState::Previewing);
}

#[tokio::test]
async fn test_toggle_before_capture_only_updates_intent() {
    let h = harness();
    h.session.toggle(TrackKind::Video, false).await.unwrap();
    assert_eq!(h.device.request_count(), 0);

    let view = h.session.start_preview().await.unwrap();

    assert!(view.video.is_none());
    assert!(view.audio.is_some());
    assert_eq!(h.device.requests()[0].video, None);
}

#[tokio::test]
async fn test_toggle_after_end_is_invalid() {
    let h = harness();
    h.session.end();

    assert!(matches!(
        h.session.toggle(TrackKind::Audio, false).await,
        Err(SessionError::InvalidTransition { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_failed_video_reacquire_releases_everything() {
    let h = harness();
    go_live(&h).await;
    let mut rx = h.session.subscribe();
    h.session.toggle(TrackKind::Video, false).await.unwrap();
    reject_all(&h.device, AcquisitionErrorKind::DeviceBusy, 5);

    let err = h.session.toggle(TrackKind::Video, true).await.unwrap_err();

    assert!(matches!(err, SessionError::Acquisition(_)));
    assert!(matches!(
        h.session.state(),
        SessionState::Failed(reason) if reason.origin == FailureOrigin::VideoToggle
    ));
    assert_eq!(h.device.live_track_count(), 0);
    assert!(h.session.capture_view().is_none());
    assert_eq!(h.sink.detach_count(), 1);
    assert!(notices(&drain(&mut rx)).contains(&"Video Unavailable".to_string()));
}

// ===== Recovery =====

#[tokio::test(start_paused = true)]
async fn test_degenerate_output_recovers_once() {
    let h = harness();
    h.device.push_outcome(ScriptedOutcome::GrantDegenerate);
    go_live(&h).await;
    let mut rx = h.session.subscribe();
    let degenerate = h.session.capture_view().unwrap().video.unwrap();
    assert_eq!(degenerate.settings.width, Some(2));

    let outcome = h.session.observe_metadata(2, 2).await;

    assert_eq!(outcome, RecoveryOutcome::Reacquired);
    assert!(h.device.is_stopped(degenerate.id));
    assert_eq!(h.device.request_count(), 2);
    assert!(h.session.recovery_attempted());

    for _ in 0..5 {
        assert_eq!(h.session.observe_metadata(2, 2).await, RecoveryOutcome::StandDown);
    }
    assert_eq!(h.device.request_count(), 2);
    assert!(notices(&drain(&mut rx)).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_recovery_stays_live_without_video() {
    let h = harness();
    h.device.push_outcome(ScriptedOutcome::GrantDegenerate);
    go_live(&h).await;
    let broadcast = h.session.broadcast().unwrap();
    let audio = h.session.capture_view().unwrap().audio.unwrap();
    let mut rx = h.session.subscribe();
    reject_all(&h.device, AcquisitionErrorKind::DeviceBusy, 5);

    let outcome = h.session.observe_metadata(2, 2).await;

    assert!(matches!(outcome, RecoveryOutcome::Abandoned(SessionError::Acquisition(_))));
    assert_eq!(h.session.state(), SessionState::Live);
    assert_eq!(h.session.broadcast().map(|b| b.id), Some(broadcast.id));
    assert!(!h.session.enablement().video);

    let view = h.session.capture_view().unwrap();
    assert!(view.video.is_none());
    assert_eq!(view.audio.map(|t| t.id), Some(audio.id));
    assert_eq!(h.device.live_tracks_of(TrackKind::Audio), [audio.id]);
    assert!(h.device.live_tracks_of(TrackKind::Video).is_empty());

    // Viewers get the audio-only view; nothing is torn down
    assert_eq!(h.sink.attach_count(), 2);
    assert_eq!(h.sink.detach_count(), 0);

    let events = drain(&mut rx);
    assert!(notices(&events).is_empty());
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::StateChanged { .. })));
    assert!(h.session.send_chat_message("still here").is_ok());

    // Turning video back on is the manual retry
    h.session.toggle(TrackKind::Video, true).await.unwrap();
    assert!(h.session.capture_view().unwrap().video.is_some());
    assert_eq!(h.session.observe_metadata(2, 2).await, RecoveryOutcome::StandDown);
}

#[tokio::test]
async fn test_healthy_or_offair_metadata_is_ignored() {
    let h = harness();
    assert_eq!(h.session.observe_metadata(2, 2).await, RecoveryOutcome::NotLive);

    go_live(&h).await;
    assert_eq!(h.session.observe_metadata(1280, 720).await, RecoveryOutcome::Healthy);
    assert!(!h.session.recovery_attempted());
}

// ===== Chat =====

#[tokio::test]
async fn test_chat_order_matches_call_order() {
    let h = harness_with(quiet_options());
    go_live(&h).await;

    for body in ["A", "B", "C"] {
        h.session.send_chat_message(body).unwrap();
    }

    let snapshot = h.session.chat_snapshot();
    let entries: Vec<_> = snapshot.iter().map(|m| (m.id, m.body.as_str())).collect();
    assert_eq!(entries, [(1, "A"), (2, "B"), (3, "C")]);
    assert!(snapshot.iter().all(|m| m.kind == ChatKind::Streamer));
}

#[tokio::test]
async fn test_chat_validation() {
    let h = harness_with(quiet_options());
    assert!(matches!(
        h.session.send_chat_message("hello"),
        Err(SessionError::InvalidTransition { .. })
    ));

    go_live(&h).await;
    assert_eq!(h.session.send_chat_message("   "), Err(SessionError::EmptyMessage));

    let message = h.session.receive_viewer_message("viewer42", "  love it  ").unwrap();
    assert_eq!(message.body, "love it");
    assert_eq!(message.kind, ChatKind::Viewer);
}

// ===== Teardown =====

#[tokio::test]
async fn test_end_releases_and_is_idempotent() {
    let h = harness();
    go_live(&h).await;
    let mut rx = h.session.subscribe();

    h.session.end();

    assert_eq!(h.session.state(), SessionState::Ended);
    assert_eq!(h.device.live_track_count(), 0);
    assert!(h.session.chat_snapshot().is_empty());
    assert!(h.session.broadcast().is_none());
    assert_eq!(h.sink.detach_count(), 1);
    assert_eq!(notices(&drain(&mut rx)), ["Stream Ended"]);

    h.session.end();
    assert_eq!(h.sink.detach_count(), 1);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_end_during_acquisition_releases_late_result() {
    let h = harness();
    h.device.gate_acquisitions();

    let pending = {
        let session = h.session.clone();
        tokio::spawn(async move { session.start_preview().await })
    };
    h.device.wait_for_requests(1).await;

    h.session.end();
    h.device.open_gate(1);

    assert_eq!(pending.await.unwrap(), Err(SessionError::Superseded));
    assert_eq!(h.session.state(), SessionState::Ended);
    assert_eq!(h.device.live_track_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_end_during_debounce_cancels_reacquire() {
    let h = harness();
    go_live(&h).await;
    h.session.toggle(TrackKind::Video, false).await.unwrap();

    let pending = {
        let session = h.session.clone();
        tokio::spawn(async move { session.toggle(TrackKind::Video, true).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.session.end();

    assert_eq!(pending.await.unwrap(), Err(SessionError::Superseded));
    assert_eq!(h.device.request_count(), 1);
    assert_eq!(h.device.live_track_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_end_during_reacquire_releases_fresh_video() {
    let h = harness();
    go_live(&h).await;
    h.session.toggle(TrackKind::Video, false).await.unwrap();
    h.device.gate_acquisitions();

    let pending = {
        let session = h.session.clone();
        tokio::spawn(async move { session.toggle(TrackKind::Video, true).await })
    };
    h.device.wait_for_requests(2).await;

    h.session.end();
    h.device.open_gate(1);

    assert_eq!(pending.await.unwrap(), Err(SessionError::Superseded));
    assert_eq!(h.device.live_track_count(), 0);
    assert!(h.session.capture_view().is_none());
}

#[tokio::test]
async fn test_dropping_session_releases_tracks() {
    let h = harness();
    go_live(&h).await;
    assert_eq!(h.device.live_track_count(), 2);

    let Harness { device, sink, session } = h;
    drop(session);

    assert_eq!(device.live_track_count(), 0);
    assert_eq!(sink.detach_count(), 1);
}
