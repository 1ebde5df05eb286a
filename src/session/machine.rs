// SPDX-License-Identifier: GPL-3.0-only

//! Broadcast session state machine
//!
//! `BroadcastSession` is the only owner of the capture resource. Every
//! operation takes the session lock, decides, and drops the lock before any
//! suspension point (device request, debounce, settle delay). Work that spans
//! a suspension claims an epoch first and re-checks it afterwards: if `end()`
//! or another acquisition moved the epoch on, the stale result is released
//! instead of installed.

use super::chat::{ChatKind, ChatLog, ChatMessage, ChatSnapshot};
use super::events::{Notice, SessionEvent};
use super::recovery::{RecoveryDecision, RecoveryOutcome, RecoverySupervisor};
use super::state::{Enablement, FailureOrigin, FailureReason, LiveBroadcast, LiveMetadata, SessionState};
use super::toggle::ToggleCoordinator;
use crate::backends::capture::{CaptureDevice, CaptureResource, CaptureView, ConstraintCascade, TrackKind};
use crate::backends::sink::ViewerSink;
use crate::config::Config;
use crate::constants::{capture, session as defaults, timing};
use crate::errors::{AcquisitionError, SessionError, SessionResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Construction-time settings for a session
#[derive(Clone)]
pub struct SessionOptions {
    pub cascade: ConstraintCascade,
    /// Initial enablement intent
    pub intent: Enablement,
    pub toggle_debounce: Duration,
    pub recovery_settle: Duration,
    pub min_video_dimension: u32,
    /// Append the system greetings when going live
    pub greet_on_go_live: bool,
    /// Display name of the streamer
    pub operator: String,
    pub sink: Option<Arc<dyn ViewerSink>>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cascade: ConstraintCascade::standard(),
            intent: Enablement::default(),
            toggle_debounce: timing::TOGGLE_DEBOUNCE,
            recovery_settle: timing::RECOVERY_SETTLE,
            min_video_dimension: capture::MIN_VIDEO_DIMENSION,
            greet_on_go_live: true,
            operator: defaults::DEFAULT_OPERATOR.to_string(),
            sink: None,
        }
    }
}

impl SessionOptions {
    /// Options from the user config; a blank operator name falls back to the default
    pub fn from_config(config: &Config) -> Self {
        let operator = match config.operator.trim() {
            "" => {
                warn!("Configured operator name is blank, using the default");
                defaults::DEFAULT_OPERATOR.to_string()
            }
            name => name.to_string(),
        };

        Self {
            cascade: config.cascade(),
            intent: config.intent(),
            toggle_debounce: config.toggle_debounce(),
            recovery_settle: config.recovery_settle(),
            min_video_dimension: config.min_video_dimension,
            greet_on_go_live: config.greet_on_go_live,
            operator,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ViewerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_cascade(mut self, cascade: ConstraintCascade) -> Self {
        self.cascade = cascade;
        self
    }
}

/// Mutable session state, only touched under the lock
struct SessionInner {
    state: SessionState,
    resource: Option<CaptureResource>,
    intent: Enablement,
    /// Bumped by `end()`, by every fresh acquisition and by every video
    /// replacement claim
    epoch: u64,
    chat: ChatLog,
    toggles: ToggleCoordinator,
    recovery: RecoverySupervisor,
    broadcast: Option<LiveBroadcast>,
    /// A video replacement (toggle or recovery) is between claim and install
    replacing: bool,
}

/// What a toggle needs after the synchronous part ran
enum TogglePlan {
    Applied,
    ReplaceVideo,
}

impl SessionInner {
    /// Apply a toggle in place where possible
    fn plan_toggle(&mut self, kind: TrackKind, enabled: bool) -> SessionResult<TogglePlan> {
        if !enabled {
            self.intent.set(kind, false);
            if let Some(resource) = self.resource.as_mut().filter(|r| r.has(kind)) {
                resource.set_subresource_enabled(kind, false)?;
            }
            return Ok(TogglePlan::Applied);
        }

        let Some(resource) = self.resource.as_mut() else {
            // Nothing captured yet; the intent feeds the next acquisition
            self.intent.set(kind, true);
            return Ok(TogglePlan::Applied);
        };

        match kind {
            TrackKind::Audio => {
                resource.set_subresource_enabled(TrackKind::Audio, true)?;
                self.intent.audio = true;
                Ok(TogglePlan::Applied)
            }
            TrackKind::Video if resource.video_enabled() => {
                self.intent.video = true;
                Ok(TogglePlan::Applied)
            }
            TrackKind::Video if self.state != SessionState::Live && resource.has(TrackKind::Video) => {
                resource.set_subresource_enabled(TrackKind::Video, true)?;
                self.intent.video = true;
                Ok(TogglePlan::Applied)
            }
            TrackKind::Video => {
                if self.replacing {
                    return Err(SessionError::Reentrant {
                        operation: "turn video on",
                        state: self.state.clone(),
                    });
                }
                self.intent.video = true;
                Ok(TogglePlan::ReplaceVideo)
            }
        }
    }

    /// Re-apply the intent's enabled flags to the held tracks
    fn apply_intent(&mut self) {
        let intent = self.intent;
        if let Some(resource) = self.resource.as_mut() {
            for kind in TrackKind::ALL {
                if resource.has(kind) {
                    // Presence was just checked
                    let _ = resource.set_subresource_enabled(kind, intent.get(kind));
                }
            }
        }
    }
}

struct Shared<D> {
    device: Arc<D>,
    options: SessionOptions,
    events: broadcast::Sender<SessionEvent>,
    inner: Mutex<SessionInner>,
}

impl<D> Drop for Shared<D> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut resource) = inner.resource.take() {
            info!(state = %inner.state, "Session dropped, releasing capture resource");
            resource.release();
        }
        if inner.broadcast.take().is_some() {
            if let Some(sink) = &self.options.sink {
                sink.detach();
            }
        }
    }
}

/// Which path asked for a video replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplaceOrigin {
    Toggle,
    Recovery,
}

impl ReplaceOrigin {
    fn operation(self) -> &'static str {
        match self {
            ReplaceOrigin::Toggle => "turn video on",
            ReplaceOrigin::Recovery => "recover video",
        }
    }
}

/// Clears the in-flight toggle slot when the toggle resolves or is dropped
struct TogglePermit<'a, D> {
    session: &'a BroadcastSession<D>,
    kind: TrackKind,
}

impl<D> Drop for TogglePermit<'_, D> {
    fn drop(&mut self) {
        self.session.lock().toggles.finish(self.kind);
    }
}

/// Clears the `replacing` flag however the replacement exits
struct ReplacementGuard<'a, D> {
    session: &'a BroadcastSession<D>,
}

impl<D> Drop for ReplacementGuard<'_, D> {
    fn drop(&mut self) {
        self.session.lock().replacing = false;
    }
}

/// A single broadcast session
///
/// Cheap to clone; clones share the same session. Dropping the last clone
/// releases any capture resource still held.
pub struct BroadcastSession<D> {
    shared: Arc<Shared<D>>,
}

impl<D> Clone for BroadcastSession<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D> BroadcastSession<D> {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: CaptureDevice> BroadcastSession<D> {
    pub fn new(device: Arc<D>, options: SessionOptions) -> Self {
        let (events, _) = broadcast::channel(defaults::EVENT_CHANNEL_CAPACITY);
        let inner = SessionInner {
            state: SessionState::Idle,
            resource: None,
            intent: options.intent,
            epoch: 0,
            chat: ChatLog::new(),
            toggles: ToggleCoordinator::new(),
            recovery: RecoverySupervisor::new(options.min_video_dimension),
            broadcast: None,
            replacing: false,
        };

        info!(
            tiers = options.cascade.len(),
            video = options.intent.video,
            audio = options.intent.audio,
            "Creating broadcast session"
        );

        Self {
            shared: Arc::new(Shared {
                device,
                options,
                events,
                inner: Mutex::new(inner),
            }),
        }
    }

    // ===== Observation =====

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn enablement(&self) -> Enablement {
        self.lock().intent
    }

    /// Snapshot of the held capture resource, if any
    pub fn capture_view(&self) -> Option<CaptureView> {
        self.lock().resource.as_ref().map(CaptureResource::view)
    }

    pub fn chat_snapshot(&self) -> ChatSnapshot {
        self.lock().chat.snapshot()
    }

    pub fn broadcast(&self) -> Option<LiveBroadcast> {
        self.lock().broadcast.clone()
    }

    pub fn recovery_attempted(&self) -> bool {
        self.lock().recovery.has_attempted()
    }

    pub fn toggle_in_flight(&self, kind: TrackKind) -> bool {
        self.lock().toggles.in_flight(kind).is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    // ===== Internal helpers =====

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.shared.events.send(event);
    }

    fn transition(&self, inner: &mut SessionInner, to: SessionState) {
        let from = std::mem::replace(&mut inner.state, to.clone());
        info!(%from, %to, "Session state changed");
        self.emit(SessionEvent::StateChanged { from, to });
    }

    fn fail(&self, inner: &mut SessionInner, origin: FailureOrigin, error: &AcquisitionError) {
        warn!(?origin, kind = %error.kind, error = %error.message, "Acquisition failed");
        if let Some(mut resource) = inner.resource.take() {
            resource.release();
        }
        inner.broadcast = None;
        self.transition(
            inner,
            SessionState::Failed(FailureReason {
                origin,
                error: error.clone(),
            }),
        );
        self.emit(SessionEvent::Notice(Notice::acquisition_failed(origin, error)));
    }

    fn append_chat(&self, inner: &mut SessionInner, author: &str, body: &str, kind: ChatKind) -> ChatMessage {
        let message = inner.chat.append(author, body, kind);
        debug!(id = message.id, ?kind, "Chat message appended");
        self.emit(SessionEvent::Chat(message.clone()));
        message
    }

    /// Enter `Live` around the resource already installed in `inner`
    fn enter_live(&self, inner: &mut SessionInner, metadata: LiveMetadata) -> (LiveBroadcast, Option<CaptureView>) {
        let options = &self.shared.options;
        let broadcast = LiveBroadcast::start(metadata, options.operator.clone());
        inner.recovery.reset();
        inner.broadcast = Some(broadcast.clone());
        self.transition(inner, SessionState::Live);

        info!(id = %broadcast.id, title = %broadcast.title, "Broadcast started");
        self.emit(SessionEvent::Notice(Notice::live_started()));

        if options.greet_on_go_live {
            let opening = format!("{} started the live stream!", broadcast.owner);
            self.append_chat(inner, defaults::SYSTEM_AUTHOR, &opening, ChatKind::System);
            self.append_chat(inner, defaults::SYSTEM_AUTHOR, defaults::WELCOME_MESSAGE, ChatKind::System);
        }

        (broadcast, inner.resource.as_ref().map(CaptureResource::view))
    }

    fn attach_sink(&self, view: Option<&CaptureView>) {
        if let (Some(sink), Some(view)) = (&self.shared.options.sink, view) {
            sink.attach(view);
        }
    }

    fn detach_sink(&self) {
        if let Some(sink) = &self.shared.options.sink {
            sink.detach();
        }
    }

    async fn acquire(&self, intent: Enablement) -> Result<CaptureResource, AcquisitionError> {
        self.shared
            .options
            .cascade
            .acquire(&*self.shared.device, intent.video, intent.audio)
            .await
    }

    // ===== Operations =====

    /// Acquire a preview resource with the current intent
    ///
    /// Allowed from `Idle` and, as a retry, from `Failed`.
    pub async fn start_preview(&self) -> SessionResult<CaptureView> {
        let (epoch, intent) = {
            let mut inner = self.lock();
            match &inner.state {
                SessionState::Idle | SessionState::Failed(_) => {}
                state if state.is_acquiring() => {
                    return Err(SessionError::Reentrant {
                        operation: "start preview",
                        state: state.clone(),
                    });
                }
                state => {
                    return Err(SessionError::InvalidTransition {
                        operation: "start preview",
                        state: state.clone(),
                    });
                }
            }
            inner.epoch += 1;
            self.transition(&mut inner, SessionState::PreviewAcquiring);
            (inner.epoch, inner.intent)
        };

        let result = self.acquire(intent).await;

        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!(epoch, current = inner.epoch, "Preview acquisition superseded, releasing result");
            if let Ok(mut stale) = result {
                stale.release();
            }
            return Err(SessionError::Superseded);
        }

        match result {
            Ok(resource) => {
                let view = resource.view();
                inner.resource = Some(resource);
                inner.apply_intent();
                self.transition(&mut inner, SessionState::Previewing);
                Ok(view)
            }
            Err(err) => {
                self.fail(&mut inner, FailureOrigin::Preview, &err);
                Err(err.into())
            }
        }
    }

    /// Put the session on air
    ///
    /// Reuses the preview resource when it satisfies the current intent;
    /// otherwise releases it and acquires afresh.
    pub async fn go_live(&self, metadata: LiveMetadata) -> SessionResult<LiveBroadcast> {
        let metadata = metadata.validated()?;

        let (epoch, intent) = {
            let mut inner = self.lock();
            match &inner.state {
                SessionState::Previewing | SessionState::Idle | SessionState::Failed(_) => {}
                state if state.is_acquiring() => {
                    return Err(SessionError::Reentrant {
                        operation: "go live",
                        state: state.clone(),
                    });
                }
                state => {
                    return Err(SessionError::InvalidTransition {
                        operation: "go live",
                        state: state.clone(),
                    });
                }
            }
            if inner.replacing {
                return Err(SessionError::Reentrant {
                    operation: "go live",
                    state: inner.state.clone(),
                });
            }

            let intent = inner.intent;
            let satisfied = inner.resource.as_ref().is_some_and(|r| {
                (!intent.video || r.has(TrackKind::Video)) && (!intent.audio || r.has(TrackKind::Audio))
            });

            if satisfied {
                debug!("Reusing preview resource for broadcast");
                inner.apply_intent();
                let (broadcast, view) = self.enter_live(&mut inner, metadata);
                drop(inner);
                self.attach_sink(view.as_ref());
                return Ok(broadcast);
            }

            if let Some(mut preview) = inner.resource.take() {
                info!("Preview resource does not match intent, releasing before reacquire");
                preview.release();
            }
            inner.epoch += 1;
            self.transition(&mut inner, SessionState::LiveAcquiring);
            (inner.epoch, intent)
        };

        let result = self.acquire(intent).await;

        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!(epoch, current = inner.epoch, "Live acquisition superseded, releasing result");
            if let Ok(mut stale) = result {
                stale.release();
            }
            return Err(SessionError::Superseded);
        }

        match result {
            Ok(resource) => {
                inner.resource = Some(resource);
                inner.apply_intent();
                let (broadcast, view) = self.enter_live(&mut inner, metadata);
                drop(inner);
                self.attach_sink(view.as_ref());
                Ok(broadcast)
            }
            Err(err) => {
                self.fail(&mut inner, FailureOrigin::GoLive, &err);
                Err(err.into())
            }
        }
    }

    /// Tear the session down; a no-op once `Ended`
    ///
    /// Releases the capture resource synchronously. Any acquisition still in
    /// flight releases its own result when it completes.
    pub fn end(&self) {
        let was_live = {
            let mut inner = self.lock();
            if matches!(inner.state, SessionState::Ended | SessionState::Ending) {
                return;
            }

            inner.epoch += 1;
            self.transition(&mut inner, SessionState::Ending);

            if let Some(mut resource) = inner.resource.take() {
                resource.release();
            }
            inner.chat.clear();
            let was_live = inner.broadcast.take().is_some();

            self.transition(&mut inner, SessionState::Ended);
            if was_live {
                self.emit(SessionEvent::Notice(Notice::stream_ended()));
            }
            was_live
        };

        if was_live {
            self.detach_sink();
        }
    }

    /// Enable or disable one sub-resource
    ///
    /// Disabling is always in place. Enabling video while live replaces the
    /// video track after the debounce window; audio is never touched by it.
    pub async fn toggle(&self, kind: TrackKind, enabled: bool) -> SessionResult<Enablement> {
        {
            let mut inner = self.lock();
            match &inner.state {
                SessionState::Ended => {
                    return Err(SessionError::InvalidTransition {
                        operation: "toggle",
                        state: SessionState::Ended,
                    });
                }
                state if state.is_acquiring() || *state == SessionState::Ending => {
                    return Err(SessionError::Reentrant {
                        operation: "toggle",
                        state: state.clone(),
                    });
                }
                _ => {}
            }

            inner.toggles.try_begin(kind, enabled)?;
            let plan = inner.plan_toggle(kind, enabled);
            info!(%kind, enabled, state = %inner.state, "Toggle requested");

            match plan {
                Ok(TogglePlan::ReplaceVideo) => {}
                Ok(TogglePlan::Applied) => {
                    inner.toggles.finish(kind);
                    return Ok(inner.intent);
                }
                Err(err) => {
                    inner.toggles.finish(kind);
                    return Err(err);
                }
            }
        }

        let _permit = TogglePermit { session: self, kind };
        self.replace_video(ReplaceOrigin::Toggle, self.shared.options.toggle_debounce)
            .await?;
        Ok(self.enablement())
    }

    /// Flip the video intent
    pub async fn toggle_video(&self) -> SessionResult<Enablement> {
        let target = !self.enablement().video;
        self.toggle(TrackKind::Video, target).await
    }

    /// Flip the audio intent
    pub async fn toggle_audio(&self) -> SessionResult<Enablement> {
        let target = !self.enablement().audio;
        self.toggle(TrackKind::Audio, target).await
    }

    /// Replace the video sub-resource: settle, release, acquire, install
    async fn replace_video(&self, origin: ReplaceOrigin, settle: Duration) -> SessionResult<()> {
        let epoch = {
            let mut inner = self.lock();
            if inner.replacing {
                return Err(SessionError::Reentrant {
                    operation: origin.operation(),
                    state: inner.state.clone(),
                });
            }
            if !inner.state.holds_resource() {
                return Err(SessionError::InvalidTransition {
                    operation: origin.operation(),
                    state: inner.state.clone(),
                });
            }
            inner.epoch += 1;
            inner.replacing = true;
            inner.epoch
        };
        let _guard = ReplacementGuard { session: self };

        debug!(?origin, settle_ms = settle.as_millis() as u64, "Waiting before video reacquire");
        tokio::time::sleep(settle).await;

        {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                debug!(?origin, "Session moved on during settle, abandoning reacquire");
                return Err(SessionError::Superseded);
            }
            match inner.resource.as_mut() {
                Some(resource) => resource.release_subresource(TrackKind::Video),
                None => return Err(SessionError::Superseded),
            }
        }

        let result = self
            .shared
            .options
            .cascade
            .acquire(&*self.shared.device, true, false)
            .await;

        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!(?origin, "Session moved on during reacquire, releasing fresh video");
            if let Ok(mut stale) = result {
                stale.release();
            }
            return Err(SessionError::Superseded);
        }

        match result {
            Ok(mut fresh) => {
                let enabled = inner.intent.video;
                let live = inner.state == SessionState::Live;
                let Some(resource) = inner.resource.as_mut() else {
                    fresh.release();
                    return Err(SessionError::Superseded);
                };
                resource.adopt(&mut fresh, TrackKind::Video, enabled);
                let view = resource.view();
                info!(?origin, track = ?view.video.as_ref().map(|t| t.id), "Video track replaced");
                drop(inner);

                if live {
                    self.attach_sink(Some(&view));
                }
                Ok(())
            }
            Err(err) if origin == ReplaceOrigin::Recovery => {
                // Stay on air without video; turning video on again retries
                warn!(kind = %err.kind, error = %err.message, "Automatic reacquire failed, continuing without video");
                inner.intent.video = false;
                let view = inner.resource.as_ref().map(CaptureResource::view);
                let live = inner.state == SessionState::Live;
                drop(inner);

                if live {
                    self.attach_sink(view.as_ref());
                }
                Err(err.into())
            }
            Err(err) => {
                let was_live = inner.broadcast.is_some();
                self.fail(&mut inner, FailureOrigin::VideoToggle, &err);
                drop(inner);

                if was_live {
                    self.detach_sink();
                }
                Err(err.into())
            }
        }
    }

    /// Report the on-air video's first-frame dimensions
    ///
    /// Degenerate output triggers one automatic, silent video reacquire per
    /// broadcast; later reports stand down. If the reacquire fails the
    /// broadcast stays live with audio only.
    pub async fn observe_metadata(&self, width: u32, height: u32) -> RecoveryOutcome {
        {
            let mut inner = self.lock();
            if inner.state != SessionState::Live {
                return RecoveryOutcome::NotLive;
            }
            if inner.replacing {
                return RecoveryOutcome::ReplacementPending;
            }
            if !inner.intent.video {
                return RecoveryOutcome::VideoOff;
            }
            match inner.recovery.assess(width, height) {
                RecoveryDecision::Healthy => return RecoveryOutcome::Healthy,
                RecoveryDecision::StandDown => return RecoveryOutcome::StandDown,
                RecoveryDecision::Remediate => {
                    warn!(width, height, "Degenerate video output, scheduling automatic reacquire");
                }
            }
        }

        match self
            .replace_video(ReplaceOrigin::Recovery, self.shared.options.recovery_settle)
            .await
        {
            Ok(()) => RecoveryOutcome::Reacquired,
            Err(err) => {
                debug!(error = %err, "Automatic reacquire did not complete");
                RecoveryOutcome::Abandoned(err)
            }
        }
    }

    /// Append the streamer's own chat message
    pub fn send_chat_message(&self, text: &str) -> SessionResult<ChatMessage> {
        let author = self.shared.options.operator.clone();
        self.post_chat(&author, text, ChatKind::Streamer, "send chat message")
    }

    /// Append a message received from a viewer
    pub fn receive_viewer_message(&self, author: &str, text: &str) -> SessionResult<ChatMessage> {
        self.post_chat(author, text, ChatKind::Viewer, "receive chat message")
    }

    fn post_chat(&self, author: &str, text: &str, kind: ChatKind, operation: &'static str) -> SessionResult<ChatMessage> {
        let body = text.trim();
        if body.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let mut inner = self.lock();
        if inner.state != SessionState::Live {
            return Err(SessionError::InvalidTransition {
                operation,
                state: inner.state.clone(),
            });
        }
        Ok(self.append_chat(&mut inner, author, body, kind))
    }
}
