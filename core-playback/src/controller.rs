//! # Session Controller
//!
//! Orchestrates one playback session: resolving content, binding the render
//! resource, driving play/pause/seek/stop, refreshing expired playlists and
//! firing beacons.
//!
//! ## Overview
//!
//! The controller is an actor. [`SessionController::spawn`] starts a tokio
//! task that exclusively owns the session state and every component; the
//! returned handle talks to it over a command channel.
//!
//! ```text
//!  SessionController ──commands──┐
//!                                v
//!  background tasks ──internal──> [ session task ] ──> SessionDelegate
//!   (resolve, seek,                │   owns Session    ──> EventBus
//!    beacons, timers)              └──> watch<SessionSnapshot>
//! ```
//!
//! Background work (resolution and license checks, seeks, beacon I/O,
//! retry delays, scene-search and post-play fetches) runs on spawned tasks
//! and reports back as internal messages. Each message carries the session
//! generation it was started under; `setup`, `stop` and `release` bump the
//! generation so late results of superseded work are dropped.
//!
//! ## Usage
//!
//! ```ignore
//! let controller = SessionController::spawn(core, SessionConfig::default(), collaborators)?;
//! controller.set_delegate(&delegate);
//!
//! controller.setup(ContentSelector::on_demand("SID0042")).await?;
//! controller.play(None, false).await;
//! controller.seek(PlaybackTime::from_secs(600)).await;
//! controller.stop().await;
//! controller.release().await;
//! ```

use crate::beacon::{BeaconContext, BeaconDispatch, BeaconKind, BeaconScheduler};
use crate::buffer::FULL_BUFFER;
use crate::config::{SessionCollaborators, SessionConfig};
use crate::content::{AudioMode, ContentKind, ContentSelector, MediaItem, PostPlayInfo};
use crate::delegate::{DelegateSlot, PlayStatus, SessionDelegate};
use crate::error::{BeaconError, MediaError, PlaybackError, Result};
use crate::refresh::{RefreshRequest, RetryDecision};
use crate::session::{Session, SessionSnapshot, SessionState};
use crate::time::PlaybackTime;
use crate::traits::{
    PlaybackLog, RenderResource, ResolveRequest, ResourceEvent, ResourceStatus, SceneSearchStatus,
};
use bridge_traits::ScreenPolicyViolation;
use bytes::Bytes;
use core_runtime::{BeaconEvent, CoreConfig, CoreEvent, PlaybackEvent};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

// ============================================================================
// Public Types
// ============================================================================

/// Signals from the host environment that affect a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentEvent {
    /// The audio/video output route changed.
    RouteChanged,
    /// An external screen was connected.
    ScreenConnected,
    /// Screen capture started or stopped.
    CaptureChanged { captured: bool },
    /// Network reachability changed.
    ReachabilityChanged,
    /// The network became unreachable.
    NetworkDisconnected,
    /// Playback was interrupted (phone call, another app took audio).
    Interrupted,
}

/// Scene-search preview image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub image: Option<Bytes>,
    /// Capture time of the image, which may differ from the requested time.
    pub exact_time: PlaybackTime,
}

// ============================================================================
// Messages
// ============================================================================

enum Command {
    SetDelegate(Option<Weak<dyn SessionDelegate>>),
    Setup {
        selector: ContentSelector,
        reply: oneshot::Sender<Result<()>>,
    },
    Play {
        from: Option<PlaybackTime>,
        pause: bool,
        reply: oneshot::Sender<bool>,
    },
    Pause(oneshot::Sender<bool>),
    Resume(oneshot::Sender<bool>),
    Stop(oneshot::Sender<bool>),
    Seek {
        to: PlaybackTime,
        reply: oneshot::Sender<bool>,
    },
    RefreshPlaylist {
        should_pause: bool,
        reply: oneshot::Sender<bool>,
    },
    ChangePlayMode {
        mode: AudioMode,
        reply: oneshot::Sender<Result<()>>,
    },
    SetMuted(bool),
    RequestPostPlay(oneshot::Sender<Result<PostPlayInfo>>),
    Thumbnail {
        at: PlaybackTime,
        reply: oneshot::Sender<Option<Thumbnail>>,
    },
    Environment(EnvironmentEvent),
    CurrentTime(oneshot::Sender<Option<PlaybackTime>>),
    Release(oneshot::Sender<()>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolvePurpose {
    Setup,
    ChangeMode,
    Refresh,
}

/// What to do once a seek settles.
enum AfterSeek {
    Seek {
        reply: Option<oneshot::Sender<bool>>,
    },
    Play {
        pause: bool,
        reply: Option<oneshot::Sender<bool>>,
    },
}

enum Internal {
    Resolved {
        generation: u64,
        purpose: ResolvePurpose,
        result: std::result::Result<(MediaItem, Arc<dyn RenderResource>), MediaError>,
    },
    Resource {
        generation: u64,
        event: ResourceEvent,
    },
    SeekFinished {
        generation: u64,
        seq: u64,
        finished: bool,
        after: AfterSeek,
    },
    PositionTick {
        generation: u64,
    },
    SignalBeacon {
        generation: u64,
    },
    BeaconResult {
        generation: u64,
        kind: BeaconKind,
        content_id: String,
        position_ms: Option<u64>,
        result: std::result::Result<(), BeaconError>,
    },
    ResumeReportResult {
        episode_code: String,
        result: std::result::Result<(), BeaconError>,
    },
    RetryRefresh {
        generation: u64,
    },
    SceneSearchFetched {
        generation: u64,
        status: SceneSearchStatus,
    },
    PostPlayFetched {
        generation: u64,
        result: std::result::Result<PostPlayInfo, MediaError>,
        reply: oneshot::Sender<Result<PostPlayInfo>>,
    },
    Connectivity {
        generation: u64,
        offline: bool,
    },
}

/// Caller waiting for a resolve to finish.
enum PendingReply {
    Setup(oneshot::Sender<Result<()>>),
    ChangeMode {
        reply: oneshot::Sender<Result<()>>,
        previous: AudioMode,
    },
}

impl PendingReply {
    fn send(self, result: Result<()>) {
        match self {
            PendingReply::Setup(reply) | PendingReply::ChangeMode { reply, .. } => {
                let _ = reply.send(result);
            }
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Handle to a running playback session.
///
/// Dropping the handle shuts the session down as [`release`](Self::release)
/// would, without waiting for it.
#[derive(Debug)]
pub struct SessionController {
    id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl SessionController {
    /// Start a session task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`core_runtime::Error::Config`] if `config` or `core` fails
    /// validation.
    pub fn spawn(
        core: CoreConfig,
        config: SessionConfig,
        collaborators: SessionCollaborators,
    ) -> core_runtime::Result<Self> {
        config.validate().map_err(core_runtime::Error::Config)?;
        core.validate()?;

        let id = Uuid::new_v4();
        let session = Session::new(&config);
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let actor = SessionActor {
            core,
            config,
            collaborators,
            delegate: DelegateSlot::default(),
            session,
            pending: None,
            internal_tx,
            snapshots: snapshot_tx,
        };

        let span = info_span!("playback_session", session_id = %id);
        let task = tokio::spawn(actor.run(command_rx, internal_rx).instrument(span));

        Ok(Self {
            id,
            commands: command_tx,
            snapshots: snapshot_rx,
            task,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    /// Register the delegate, replacing any previous one.
    ///
    /// Only a weak reference is kept.
    pub fn set_delegate<D>(&self, delegate: &Arc<D>)
    where
        D: SessionDelegate + 'static,
    {
        let delegate: Arc<dyn SessionDelegate> = delegate.clone();
        self.send(Command::SetDelegate(Some(Arc::downgrade(&delegate))));
    }

    pub fn clear_delegate(&self) {
        self.send(Command::SetDelegate(None));
    }

    /// Resolve `selector` and attach its render resource.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::NoDelegate`] if no delegate is registered
    /// - [`PlaybackError::MirroringNotSupported`] / [`PlaybackError::ScreenRecordingNotAllowed`]
    ///   if the screen guard rejects playback
    /// - [`PlaybackError::NoPresentationSurface`] if the delegate supplies no surface
    /// - [`PlaybackError::Media`] if resolution or the license check fails
    /// - [`PlaybackError::Superseded`] if a later setup, stop or release won
    pub async fn setup(&self, selector: ContentSelector) -> Result<()> {
        self.request(|reply| Command::Setup { selector, reply })
            .await
            .unwrap_or(Err(PlaybackError::ControllerClosed))
    }

    /// Seek to `from` (or the resume point, or zero) and start playing
    /// unless `pause` is set. Resolves once the seek settled.
    pub async fn play(&self, from: Option<PlaybackTime>, pause: bool) -> bool {
        self.request(|reply| Command::Play { from, pause, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn pause(&self) -> bool {
        self.request(Command::Pause).await.unwrap_or(false)
    }

    pub async fn resume(&self) -> bool {
        self.request(Command::Resume).await.unwrap_or(false)
    }

    /// Stop and release the resource. Returns `false` if already stopped.
    pub async fn stop(&self) -> bool {
        self.request(Command::Stop).await.unwrap_or(false)
    }

    /// Seek to `to`, kept one margin short of the end. Resolves with whether
    /// the seek finished.
    pub async fn seek(&self, to: PlaybackTime) -> bool {
        self.request(|reply| Command::Seek { to, reply })
            .await
            .unwrap_or(false)
    }

    /// Re-resolve the playlist and resume at the current position.
    ///
    /// Returns `false` if nothing was set up or a refresh is already running.
    pub async fn refresh_playlist(&self, should_pause: bool) -> bool {
        self.request(|reply| Command::RefreshPlaylist { should_pause, reply })
            .await
            .unwrap_or(false)
    }

    /// Reload the current content, paused at the current position.
    pub async fn restart_play(&self) -> bool {
        self.refresh_playlist(true).await
    }

    /// Switch between dubbed and subtitled audio of on-demand content.
    pub async fn change_play_mode(&self, mode: AudioMode) -> Result<()> {
        self.request(|reply| Command::ChangePlayMode { mode, reply })
            .await
            .unwrap_or(Err(PlaybackError::ControllerClosed))
    }

    pub fn set_muted(&self, muted: bool) {
        self.send(Command::SetMuted(muted));
    }

    /// "Next content" for the current on-demand title.
    pub async fn request_post_play(&self) -> Result<PostPlayInfo> {
        self.request(Command::RequestPostPlay)
            .await
            .unwrap_or(Err(PlaybackError::ControllerClosed))
    }

    /// Scene-search preview closest to `at`, once the thumbnail file is available.
    pub async fn thumbnail(&self, at: PlaybackTime) -> Option<Thumbnail> {
        self.request(|reply| Command::Thumbnail { at, reply })
            .await
            .flatten()
    }

    pub fn notify_environment(&self, event: EnvironmentEvent) {
        self.send(Command::Environment(event));
    }

    pub async fn current_time(&self) -> Option<PlaybackTime> {
        self.request(Command::CurrentTime).await.flatten()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Stop playback, drop the delegate and end the session task.
    pub async fn release(self) {
        let _ = self.request(Command::Release).await;
        if let Err(error) = self.task.await {
            warn!(%error, "Playback session task ended abnormally");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!(session_id = %self.id, "Playback session already closed");
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(make(reply)).ok()?;
        response.await.ok()
    }
}

// ============================================================================
// Actor
// ============================================================================

struct SessionActor {
    core: CoreConfig,
    config: SessionConfig,
    collaborators: SessionCollaborators,
    delegate: DelegateSlot,
    session: Session,
    pending: Option<PendingReply>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        info!("Playback session started");
        loop {
            let keep_running = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("Controller handle dropped");
                        self.shutdown();
                        false
                    }
                },
                Some(message) = internal.recv() => {
                    self.handle_internal(message);
                    true
                }
            };
            self.snapshots.send_replace(self.session.snapshot());
            if !keep_running {
                break;
            }
        }
        info!("Playback session ended");
    }

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::SetDelegate(Some(delegate)) => self.delegate.set(delegate),
            Command::SetDelegate(None) => self.delegate.clear(),
            Command::Setup { selector, reply } => self.setup(selector, reply),
            Command::Play { from, pause, reply } => self.start_play(from, pause, Some(reply)),
            Command::Pause(reply) => {
                let _ = reply.send(self.pause());
            }
            Command::Resume(reply) => {
                let _ = reply.send(self.resume());
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.stop_internal(true));
            }
            Command::Seek { to, reply } => {
                if let Err(after) = self.begin_seek(to, AfterSeek::Seek { reply: Some(reply) }) {
                    Self::reject_after_seek(after);
                }
            }
            Command::RefreshPlaylist {
                should_pause,
                reply,
            } => {
                let _ = reply.send(self.refresh(should_pause));
            }
            Command::ChangePlayMode { mode, reply } => self.change_play_mode(mode, reply),
            Command::SetMuted(muted) => {
                self.session.muted = muted;
                if let Some(resource) = self.session.resource() {
                    resource.set_muted(muted);
                }
            }
            Command::RequestPostPlay(reply) => self.request_post_play(reply),
            Command::Thumbnail { at, reply } => {
                let _ = reply.send(self.thumbnail(at));
            }
            Command::Environment(event) => self.on_environment(event),
            Command::CurrentTime(reply) => {
                let _ = reply.send(self.session.current_time());
            }
            Command::Release(reply) => {
                self.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::Resolved {
                generation,
                purpose,
                result,
            } => self.on_resolved(generation, purpose, result),
            Internal::Resource { generation, event } => {
                if self.is_current(generation) {
                    self.on_resource_event(event);
                }
            }
            Internal::SeekFinished {
                generation,
                seq,
                finished,
                after,
            } => self.on_seek_finished(generation, seq, finished, after),
            Internal::PositionTick { generation } => {
                if self.is_current(generation)
                    && self.session.state == SessionState::Playing
                    && !self.session.is_seeking
                    && self.session.is_playing()
                {
                    self.inform_position_updated();
                }
            }
            Internal::SignalBeacon { generation } => {
                if self.is_current(generation) && !self.session.is_stopped {
                    self.fire_beacon(BeaconKind::Signal);
                }
            }
            Internal::BeaconResult {
                generation,
                kind,
                content_id,
                position_ms,
                result,
            } => self.on_beacon_result(generation, kind, content_id, position_ms, result),
            Internal::ResumeReportResult {
                episode_code,
                result,
            } => self.on_resume_report_result(episode_code, result),
            Internal::RetryRefresh { generation } => {
                if self.is_current(generation) && self.session.refresher.is_refreshing() {
                    debug!("Retrying playlist refresh");
                    self.spawn_resolve(ResolvePurpose::Refresh);
                }
            }
            Internal::SceneSearchFetched { generation, status } => {
                if self.is_current(generation) {
                    self.session.scene_search = status;
                    self.notify(|delegate| delegate.on_scene_search_file_status(status));
                }
            }
            Internal::PostPlayFetched {
                generation,
                result,
                reply,
            } => {
                if !self.is_current(generation) {
                    let _ = reply.send(Err(PlaybackError::Superseded));
                    return;
                }
                if let Ok(info) = &result {
                    self.session.post_play_info = Some(info.clone());
                }
                let _ = reply.send(result.map_err(PlaybackError::from));
            }
            Internal::Connectivity {
                generation,
                offline,
            } => {
                if self.is_current(generation) && offline {
                    warn!("Buffer ran dry while offline");
                    self.fail(PlaybackError::ConnectionFailed);
                }
            }
        }
    }

    fn shutdown(&mut self) {
        self.stop_internal(true);
        self.delegate.clear();
        self.session.selector = None;
        self.session.item = None;
        self.session.state = SessionState::Idle;
        self.bump_generation();
    }

    // ========================================================================
    // Setup & Resolution
    // ========================================================================

    fn setup(&mut self, selector: ContentSelector, reply: oneshot::Sender<Result<()>>) {
        if !self.delegate.is_registered() {
            warn!("Setup rejected: no delegate registered");
            let _ = reply.send(Err(PlaybackError::NoDelegate));
            return;
        }
        if let Some(violation) = self.screen_violation() {
            warn!(%violation, "Setup rejected by screen guard");
            self.track_error(&violation);
            let _ = reply.send(Err(violation));
            return;
        }

        info!(content_id = selector.code(), kind = ?selector.kind(), "Setting up playback");
        self.stop_internal(true);
        // The old content's stop beacon carries the stop generation.
        self.bump_generation();
        self.session.reset_for_setup();
        self.session.selector = Some(selector);
        self.session.state = SessionState::Preparing;
        self.pending = Some(PendingReply::Setup(reply));
        self.spawn_resolve(ResolvePurpose::Setup);
    }

    fn spawn_resolve(&self, purpose: ResolvePurpose) {
        let Some(selector) = self.session.selector.clone() else {
            return;
        };
        let request = ResolveRequest {
            selector,
            audio_mode: self.session.audio_mode,
        };
        let source = self.collaborators.media_source.clone();
        let tx = self.internal_tx.clone();
        let generation = self.session.generation;

        tokio::spawn(
            async move {
                let result = async {
                    let item = source.resolve(&request).await?;
                    let resource = source.check_license_and_create(&item).await?;
                    Ok::<_, MediaError>((item, resource))
                }
                .await;
                let _ = tx.send(Internal::Resolved {
                    generation,
                    purpose,
                    result,
                });
            }
            .in_current_span(),
        );
    }

    fn on_resolved(
        &mut self,
        generation: u64,
        purpose: ResolvePurpose,
        result: std::result::Result<(MediaItem, Arc<dyn RenderResource>), MediaError>,
    ) {
        if !self.is_current(generation) {
            debug!(generation, ?purpose, "Dropping superseded resolve result");
            if let Ok((_, resource)) = result {
                resource.release();
            }
            return;
        }

        match result {
            Ok((item, resource)) => self.attach(purpose, item, resource),
            Err(error) => {
                let error = PlaybackError::from(error);
                warn!(%error, ?purpose, "Content resolution failed");
                self.on_resolve_failed(purpose, error);
            }
        }
    }

    fn on_resolve_failed(&mut self, purpose: ResolvePurpose, error: PlaybackError) {
        self.track_error(&error);
        match purpose {
            ResolvePurpose::Refresh => self.on_refresh_attempt_failed(error),
            ResolvePurpose::Setup | ResolvePurpose::ChangeMode => {
                self.session.state = SessionState::Idle;
                match self.pending.take() {
                    Some(PendingReply::ChangeMode { reply, previous }) => {
                        self.session.audio_mode = previous;
                        self.session.state = SessionState::Stopped;
                        let _ = reply.send(Err(error));
                    }
                    Some(pending) => pending.send(Err(error)),
                    None => {}
                }
            }
        }
    }

    fn attach(&mut self, purpose: ResolvePurpose, item: MediaItem, resource: Arc<dyn RenderResource>) {
        let streams_live = self
            .session
            .selector
            .as_ref()
            .is_some_and(|selector| !selector.is_on_demand());
        if streams_live {
            self.collaborators
                .media_source
                .apply_bitrate_policy(resource.as_ref());
        }

        let surface = self
            .delegate
            .get()
            .and_then(|delegate| delegate.on_target_surface_requested());
        self.session.buffer.reset();

        let tx = self.internal_tx.clone();
        let generation = self.session.generation;
        let attached = self.session.binder.attach(resource.clone(), surface, move |event| {
            tx.send(Internal::Resource { generation, event }).is_ok()
        });
        if let Err(error) = attached {
            warn!(%error, "Failed to attach render resource");
            self.on_resolve_failed(purpose, error);
            return;
        }

        resource.set_external_playback_allowed(self.core.features.allow_external_playback);
        resource.set_muted(self.session.muted);
        debug!(
            code = %item.code,
            play_mode = ?item.play_mode,
            beacon_span_secs = item.beacon_span_secs,
            "Render resource attached"
        );
        self.session.item = Some(item);
        self.session.is_stopped = false;
        self.start_signal_timer();
        self.start_scene_search();

        if purpose != ResolvePurpose::Refresh {
            if let Some(pending) = self.pending.take() {
                pending.send(Ok(()));
            }
        }
    }

    fn start_signal_timer(&mut self) {
        let Some(item) = self.session.item.as_ref() else {
            return;
        };
        let tx = self.internal_tx.clone();
        let generation = self.session.generation;
        self.session.beacons.start_signal(item, move || {
            tx.send(Internal::SignalBeacon { generation }).is_ok()
        });
    }

    fn start_position_tracker(&mut self) {
        let tx = self.internal_tx.clone();
        let generation = self.session.generation;
        self.session
            .position
            .start(move || tx.send(Internal::PositionTick { generation }).is_ok());
    }

    // ========================================================================
    // Resource Events
    // ========================================================================

    fn on_resource_event(&mut self, event: ResourceEvent) {
        match event {
            ResourceEvent::StatusChanged(ResourceStatus::ReadyToPlay) => self.on_first_ready(),
            ResourceEvent::StatusChanged(ResourceStatus::Failed) => self.fail(PlaybackError::Unknown),
            ResourceEvent::StatusChanged(ResourceStatus::Unknown) => {}
            ResourceEvent::LoadedUntil(secs) => {
                if let Some(level) = self.session.buffer.on_loaded_until(secs) {
                    self.notify(|delegate| delegate.on_buffer_level_changed(level));
                }
            }
            ResourceEvent::RateChanged { old, new } => {
                if !self.session.is_completed && old != new {
                    let status = if new != 0.0 { PlayStatus::Play } else { PlayStatus::Pause };
                    self.notify(|delegate| delegate.on_status_changed(status));
                }
            }
            ResourceEvent::ExternalPlaybackChanged(active) => {
                debug!(active, "External playback changed");
                if let Some(violation) = self.screen_violation() {
                    self.fail(violation);
                }
            }
            ResourceEvent::BufferEmpty => self.on_buffer_empty(),
            ResourceEvent::PlayedToEnd => self.on_played_to_end(),
            ResourceEvent::FailedToPlayToEnd => {
                let error = if self.core.screen_guard.is_external_playback() {
                    PlaybackError::ExternalPlaybackEnded
                } else {
                    PlaybackError::Unknown
                };
                self.fail(error);
            }
            ResourceEvent::ErrorLogEntry { code } => {
                if self.config.is_refreshable_error(code) {
                    info!(code, "Refreshable resource error; refreshing playlist");
                    self.refresh(true);
                } else {
                    debug!(code, "Resource error log entry");
                }
            }
            ResourceEvent::ItemFailed(error) => self.fail(PlaybackError::Media(error)),
        }
    }

    fn on_first_ready(&mut self) {
        if !self.session.buffer.on_ready() {
            return;
        }
        self.start_position_tracker();
        self.notify(|delegate| delegate.on_buffer_level_changed(FULL_BUFFER));
        if self.session.state == SessionState::Preparing {
            self.session.state = SessionState::Ready;
        }
        self.emit(PlaybackEvent::Prepared {
            content_id: self.session.content_id(),
            duration_ms: self.session.duration().map(PlaybackTime::millis),
        });

        if let Some(request) = self.session.refresher.pending() {
            info!(
                resume_ms = request.resume_time.map(PlaybackTime::millis),
                should_pause = request.should_pause,
                "Playlist refreshed; resuming"
            );
            self.start_play(request.resume_time, request.should_pause, None);
            self.session.refresher.complete();
        }
        self.notify(|delegate| delegate.on_ready());
    }

    fn on_buffer_empty(&mut self) {
        if !self.session.is_streaming() || !self.core.features.enable_network_awareness {
            return;
        }
        let Some(monitor) = self.core.network_monitor.clone() else {
            return;
        };
        let tx = self.internal_tx.clone();
        let generation = self.session.generation;
        tokio::spawn(
            async move {
                let offline = monitor.is_offline().await;
                let _ = tx.send(Internal::Connectivity {
                    generation,
                    offline,
                });
            }
            .in_current_span(),
        );
    }

    fn on_played_to_end(&mut self) {
        info!("Playback reached the end");
        self.session.is_completed = true;
        self.session.state = SessionState::Completed;
        self.notify(|delegate| delegate.on_status_changed(PlayStatus::End));
        if self.session.post_roll.trip() {
            self.inform_post_play_reached();
        }
        self.notify(|delegate| delegate.on_playback_completed());
        self.emit(PlaybackEvent::Completed {
            content_id: self.session.content_id(),
        });
    }

    // ========================================================================
    // Playback Control
    // ========================================================================

    fn start_play(
        &mut self,
        from: Option<PlaybackTime>,
        pause: bool,
        reply: Option<oneshot::Sender<bool>>,
    ) {
        let Some(resource) = self.session.resource().cloned() else {
            Self::reject_after_seek(AfterSeek::Play { pause, reply });
            return;
        };
        if resource.rate() != 0.0 {
            debug!("Play rejected: already playing");
            Self::reject_after_seek(AfterSeek::Play { pause, reply });
            return;
        }

        self.session.is_stopped = false;
        resource.set_external_playback_allowed(self.core.features.allow_external_playback);
        self.session.last_pause_intent = pause;

        let target = from
            .or_else(|| self.session.item.as_ref().and_then(MediaItem::resume_point))
            .unwrap_or(PlaybackTime::ZERO);
        if let Err(after) = self.begin_seek(target, AfterSeek::Play { pause, reply }) {
            self.finish_after_seek(after, false);
        }
    }

    fn pause(&mut self) -> bool {
        let Some(resource) = self.session.resource().cloned() else {
            return false;
        };
        let Some(current) = self.session.current_time() else {
            return false;
        };
        if resource.rate() == 0.0 {
            return false;
        }

        resource.pause();
        self.session.saved_position = current;
        self.session.state = SessionState::Paused;
        self.fire_beacon(BeaconKind::Interruption);
        self.emit(PlaybackEvent::Paused {
            content_id: self.session.content_id(),
            position_ms: current.millis(),
        });
        true
    }

    fn resume(&mut self) -> bool {
        let Some(resource) = self.session.resource().cloned() else {
            return false;
        };
        if resource.rate() != 0.0 {
            return false;
        }

        resource.play();
        self.session.state = SessionState::Playing;
        self.emit(PlaybackEvent::Resumed {
            content_id: self.session.content_id(),
            position_ms: self.current_millis(),
        });
        self.inform_position_updated();
        true
    }

    /// Stop playback and detach the resource.
    ///
    /// With `cancel_outstanding`, a pending refresh and any in-flight
    /// resolution are abandoned as well.
    fn stop_internal(&mut self, cancel_outstanding: bool) -> bool {
        if cancel_outstanding {
            self.session.refresher.cancel();
        }

        let active = self
            .session
            .resource()
            .filter(|_| !self.session.is_stopped)
            .cloned();
        let Some(resource) = active else {
            if cancel_outstanding {
                self.bump_generation();
                if self.session.state == SessionState::Preparing {
                    self.session.state = SessionState::Stopped;
                }
            }
            return false;
        };

        self.session.beacons.stop_signal();
        self.session.is_stopped = true;
        resource.pause();
        self.session.saved_position = self.session.current_time().unwrap_or(PlaybackTime::ZERO);
        resource.set_external_playback_allowed(false);
        self.session.position.stop();
        self.session.binder.detach();
        self.end_tracking();

        self.bump_generation();
        self.fire_beacon(BeaconKind::Stop);

        self.session.is_completed = false;
        self.session.is_seeking = false;
        self.session.state = SessionState::Stopped;
        info!(position_ms = self.session.saved_position.millis(), "Playback stopped");
        self.emit(PlaybackEvent::Stopped {
            content_id: self.session.content_id(),
            position_ms: self.session.saved_position.millis(),
        });
        true
    }

    fn begin_seek(&mut self, to: PlaybackTime, after: AfterSeek) -> std::result::Result<(), AfterSeek> {
        let Some(resource) = self.session.resource().cloned() else {
            return Err(after);
        };
        if resource.status() != ResourceStatus::ReadyToPlay {
            debug!("Seek rejected: resource not ready");
            return Err(after);
        }

        resource.cancel_pending_seeks();
        self.session.is_seeking = true;
        self.session.is_completed = false;

        let target = match resource.duration() {
            Some(duration) => to.min(duration - PlaybackTime::from(self.config.seek_end_margin)),
            None => to,
        };
        self.session.seek_target = target;
        self.session.state = SessionState::Seeking;
        self.notify(|delegate| delegate.on_status_changed(PlayStatus::Seeking));
        self.session.seek_seq += 1;

        let seq = self.session.seek_seq;
        let generation = self.session.generation;
        let tx = self.internal_tx.clone();
        debug!(target_ms = target.millis(), seq, "Seeking");
        tokio::spawn(
            async move {
                let finished = resource.seek(target).await;
                let _ = tx.send(Internal::SeekFinished {
                    generation,
                    seq,
                    finished,
                    after,
                });
            }
            .in_current_span(),
        );
        Ok(())
    }

    fn on_seek_finished(&mut self, generation: u64, seq: u64, finished: bool, after: AfterSeek) {
        if !self.is_current(generation) {
            Self::reject_after_seek(after);
            return;
        }

        if seq == self.session.seek_seq {
            self.session.post_roll.reset();
            self.session.is_seeking = false;
            let playing = self.session.is_playing();
            self.session.state = if playing {
                SessionState::Playing
            } else {
                SessionState::Paused
            };
            let status = if playing { PlayStatus::Play } else { PlayStatus::Pause };
            self.notify(|delegate| delegate.on_status_changed(status));
            self.emit(PlaybackEvent::Seeked {
                content_id: self.session.content_id(),
                position_ms: self.current_millis(),
            });
        }

        self.finish_after_seek(after, finished);
    }

    fn finish_after_seek(&mut self, after: AfterSeek, finished: bool) {
        match after {
            AfterSeek::Seek { reply } => {
                if let Some(reply) = reply {
                    let _ = reply.send(finished);
                }
            }
            AfterSeek::Play { pause, reply } => {
                let started = self.continue_play(pause);
                if let Some(reply) = reply {
                    let _ = reply.send(started);
                }
            }
        }
    }

    fn continue_play(&mut self, pause: bool) -> bool {
        let Some(resource) = self.session.resource().cloned() else {
            return false;
        };
        if pause {
            self.session.state = SessionState::Paused;
        } else {
            resource.play();
            self.session.state = SessionState::Playing;
        }
        self.start_tracking();
        self.emit(PlaybackEvent::Started {
            content_id: self.session.content_id(),
            position_ms: self.current_millis(),
        });
        true
    }

    fn reject_after_seek(after: AfterSeek) {
        let reply = match after {
            AfterSeek::Seek { reply } | AfterSeek::Play { reply, .. } => reply,
        };
        if let Some(reply) = reply {
            let _ = reply.send(false);
        }
    }

    fn inform_position_updated(&mut self) {
        let current = self.session.current_time();
        let duration = self.session.duration();
        if let Some(current) = current {
            let endroll = self.session.endroll_position();
            if self.session.post_roll.check(current, endroll) {
                self.inform_post_play_reached();
            }
        }
        self.notify(|delegate| delegate.on_position_updated(current, duration));
    }

    fn inform_post_play_reached(&mut self) {
        if let (Some(source), Some(item)) = (&self.collaborators.post_play, &self.session.item) {
            if let Some(info) = source.next_downloaded(item) {
                self.session.post_play_info = Some(info);
            }
        }
        info!("End roll reached");
        let info = self.session.post_play_info.clone();
        self.notify(|delegate| delegate.on_post_play_reached(info.as_ref()));
    }

    fn change_play_mode(&mut self, mode: AudioMode, reply: oneshot::Sender<Result<()>>) {
        if mode == self.session.audio_mode {
            let _ = reply.send(Ok(()));
            return;
        }
        let on_demand = self
            .session
            .selector
            .as_ref()
            .is_some_and(ContentSelector::is_on_demand);
        if !on_demand {
            let error = PlaybackError::NoContent;
            self.track_error(&error);
            let _ = reply.send(Err(error));
            return;
        }

        info!(?mode, "Changing audio mode");
        let previous = self.session.audio_mode;
        self.stop_internal(true);
        self.bump_generation();
        self.session.reset_for_setup();
        self.session.audio_mode = mode;
        self.session.state = SessionState::Preparing;
        self.pending = Some(PendingReply::ChangeMode { reply, previous });
        self.spawn_resolve(ResolvePurpose::ChangeMode);
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    fn refresh(&mut self, should_pause: bool) -> bool {
        let Some(selector) = self.session.selector.as_ref() else {
            return false;
        };
        if self.session.refresher.is_refreshing() {
            debug!("Refresh already in flight");
            return false;
        }
        if self.pending.is_some()
            || matches!(
                self.session.state,
                SessionState::Idle | SessionState::Preparing | SessionState::Error
            )
        {
            debug!(state = ?self.session.state, "Refresh rejected in current state");
            return false;
        }

        let resume_time = if selector.is_on_demand() {
            let saved = self.session.saved_position;
            self.session
                .current_time()
                .or_else(|| (!saved.is_zero()).then_some(saved))
        } else {
            None
        };
        self.session.refresher.begin(RefreshRequest {
            resume_time,
            should_pause,
        });
        info!(
            resume_ms = resume_time.map(PlaybackTime::millis),
            should_pause, "Refreshing playlist"
        );

        self.notify(|delegate| delegate.on_refresh_starting());
        self.emit(PlaybackEvent::RefreshStarted {
            content_id: self.session.content_id(),
        });
        self.stop_internal(false);
        self.session.state = SessionState::Preparing;
        self.spawn_resolve(ResolvePurpose::Refresh);
        true
    }

    fn on_refresh_attempt_failed(&mut self, error: PlaybackError) {
        match self.session.refresher.on_attempt_failed() {
            RetryDecision::Retry(delay) => {
                warn!(%error, delay_ms = delay.as_millis() as u64, "Playlist refresh failed; retrying");
                let tx = self.internal_tx.clone();
                let generation = self.session.generation;
                tokio::spawn(
                    async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(Internal::RetryRefresh { generation });
                    }
                    .in_current_span(),
                );
            }
            RetryDecision::GiveUp => {
                error!(%error, "Playlist refresh gave up");
                self.emit(PlaybackEvent::RefreshFailed {
                    content_id: self.session.content_id(),
                    message: error.to_string(),
                });
                self.fail(PlaybackError::escalate_refresh_failure(&error));
            }
        }
    }

    // ========================================================================
    // Beacons
    // ========================================================================

    fn fire_beacon(&mut self, kind: BeaconKind) {
        let (Some(selector), Some(item)) = (&self.session.selector, &self.session.item) else {
            return;
        };
        let plan = BeaconScheduler::plan(&BeaconContext {
            kind,
            selector,
            item,
            current_time: self.session.current_time(),
            saved_position: self.session.saved_position,
            completed: self.session.is_completed,
            now: self.core.clock.now(),
        });
        let content_id = selector.code().to_string();
        let position_ms = selector.is_on_demand().then_some(plan.position.millis());

        if let Some(update) = &plan.resume_update {
            self.collaborators.resume_store.update(update);
            self.emit_beacon(BeaconEvent::ResumePointSaved {
                content_id: content_id.clone(),
                position_ms: update.position.millis(),
                completed: update.completed,
            });
        }

        let Some(dispatch) = plan.dispatch else {
            return;
        };
        debug!(kind = ?dispatch.event_kind(), position_ms = plan.position.millis(), "Sending beacon");

        let sender = self.collaborators.beacon_sender.clone();
        let tx = self.internal_tx.clone();
        let generation = self.session.generation;
        tokio::spawn(
            async move {
                let result = match dispatch {
                    BeaconDispatch::ResumePoint(report) => {
                        let episode_code = report.episode_code.clone();
                        let result = sender.send_resume_point(report).await;
                        let _ = tx.send(Internal::ResumeReportResult {
                            episode_code,
                            result,
                        });
                        return;
                    }
                    BeaconDispatch::Signal(payload) => sender.send_signal(payload).await,
                    BeaconDispatch::Interruption(payload) => sender.send_interruption(payload).await,
                    BeaconDispatch::Stop { payload, completed } => {
                        sender.send_stop(payload, completed).await
                    }
                };
                let _ = tx.send(Internal::BeaconResult {
                    generation,
                    kind,
                    content_id,
                    position_ms,
                    result,
                });
            }
            .in_current_span(),
        );
    }

    fn on_beacon_result(
        &mut self,
        generation: u64,
        kind: BeaconKind,
        content_id: String,
        position_ms: Option<u64>,
        result: std::result::Result<(), BeaconError>,
    ) {
        let event_kind = kind.event_kind();
        match result {
            Ok(()) => self.emit_beacon(BeaconEvent::Sent {
                kind: event_kind,
                content_id,
                position_ms,
            }),
            Err(BeaconError::NeedsPlaylistRefresh) => {
                info!(?kind, "Beacon reports expired playlist");
                self.emit_beacon(BeaconEvent::Failed {
                    kind: event_kind,
                    content_id,
                    reason: BeaconError::NeedsPlaylistRefresh.to_string(),
                });
                if !self.is_current(generation) || self.session.state == SessionState::Error {
                    return;
                }
                let should_pause = match kind {
                    BeaconKind::Stop => self.session.last_pause_intent,
                    BeaconKind::Signal | BeaconKind::Interruption => false,
                };
                self.refresh(should_pause);
            }
            Err(error) => {
                warn!(?kind, %error, "Beacon failed");
                self.emit_beacon(BeaconEvent::Failed {
                    kind: event_kind,
                    content_id,
                    reason: error.to_string(),
                });
            }
        }
    }

    fn on_resume_report_result(
        &mut self,
        episode_code: String,
        result: std::result::Result<(), BeaconError>,
    ) {
        self.collaborators
            .resume_store
            .set_pending_sync(&episode_code, result.is_err());
        match result {
            Ok(()) => self.emit_beacon(BeaconEvent::Sent {
                kind: core_runtime::BeaconKind::ResumePoint,
                content_id: episode_code,
                position_ms: None,
            }),
            Err(error) => {
                warn!(%error, "Resume point report failed; marked for later sync");
                self.emit_beacon(BeaconEvent::Failed {
                    kind: core_runtime::BeaconKind::ResumePoint,
                    content_id: episode_code,
                    reason: error.to_string(),
                });
            }
        }
    }

    // ========================================================================
    // Post-Play & Scene Search
    // ========================================================================

    fn request_post_play(&mut self, reply: oneshot::Sender<Result<PostPlayInfo>>) {
        let Some(source) = self.collaborators.post_play.clone() else {
            let _ = reply.send(Err(PlaybackError::Unknown));
            return;
        };

        if let Some(info) = self.session.item.as_ref().and_then(|item| source.next_downloaded(item)) {
            self.session.post_play_info = Some(info.clone());
            let _ = reply.send(Ok(info));
            return;
        }
        if let Some(info) = self.session.post_play_info.clone() {
            let _ = reply.send(Ok(info));
            return;
        }

        let on_demand = self
            .session
            .selector
            .as_ref()
            .is_some_and(ContentSelector::is_on_demand);
        let episode_code = self.session.item.as_ref().map(|item| {
            item.episode
                .as_ref()
                .map_or_else(|| item.code.clone(), |episode| episode.code.clone())
        });
        let (true, true, Some(episode_code)) = (on_demand, self.session.resource().is_some(), episode_code)
        else {
            let _ = reply.send(Err(PlaybackError::Unknown));
            return;
        };

        let tx = self.internal_tx.clone();
        let generation = self.session.generation;
        tokio::spawn(
            async move {
                let result = source.fetch(&episode_code).await;
                let _ = tx.send(Internal::PostPlayFetched {
                    generation,
                    result,
                    reply,
                });
            }
            .in_current_span(),
        );
    }

    fn scene_search_url(&self) -> Option<String> {
        let content = self.session.selector.as_ref()?.as_on_demand()?;
        self.session
            .item
            .as_ref()?
            .scene_search_urls
            .get(&content.thumbnail_size)
            .cloned()
    }

    fn start_scene_search(&mut self) {
        let Some(source) = self.collaborators.scene_search.clone() else {
            return;
        };
        let Some(url) = self.scene_search_url() else {
            return;
        };

        self.session.scene_search = SceneSearchStatus::Ongoing;
        self.notify(|delegate| delegate.on_scene_search_file_status(SceneSearchStatus::Ongoing));

        let tx = self.internal_tx.clone();
        let generation = self.session.generation;
        tokio::spawn(
            async move {
                let status = source.fetch(&url).await;
                let _ = tx.send(Internal::SceneSearchFetched { generation, status });
            }
            .in_current_span(),
        );
    }

    fn thumbnail(&self, at: PlaybackTime) -> Option<Thumbnail> {
        if !self.session.scene_search.is_available() {
            return None;
        }
        let source = self.collaborators.scene_search.as_ref()?;
        let url = self.scene_search_url()?;
        let exact_time = source.presentation_time(&url, at)?;
        Some(Thumbnail {
            image: source.image(&url, exact_time),
            exact_time,
        })
    }

    // ========================================================================
    // Environment
    // ========================================================================

    fn on_environment(&mut self, event: EnvironmentEvent) {
        debug!(?event, "Environment event");
        let has_selection = self.session.selector.is_some();
        match event {
            EnvironmentEvent::RouteChanged => {
                if !has_selection {
                    return;
                }
                if let Some(violation) = self.screen_violation() {
                    self.fail(violation);
                } else if self.tracking_started() {
                    self.end_tracking();
                    self.start_tracking();
                }
            }
            EnvironmentEvent::ScreenConnected => {
                if has_selection && self.core.screen_guard.is_mirroring() {
                    self.fail(PlaybackError::MirroringNotSupported);
                }
            }
            EnvironmentEvent::CaptureChanged { captured } => {
                if has_selection && captured {
                    self.fail(PlaybackError::ScreenRecordingNotAllowed);
                }
            }
            EnvironmentEvent::ReachabilityChanged => {
                let live = self
                    .session
                    .selector
                    .as_ref()
                    .is_some_and(|selector| !selector.is_on_demand());
                if let (true, Some(resource)) = (live, self.session.resource()) {
                    self.collaborators
                        .media_source
                        .apply_bitrate_policy(resource.as_ref());
                }
            }
            EnvironmentEvent::NetworkDisconnected => {
                let starved = self
                    .session
                    .resource()
                    .map_or(true, |resource| resource.is_buffer_empty());
                if has_selection && self.session.is_streaming() && starved {
                    self.fail(PlaybackError::ConnectionFailed);
                }
            }
            EnvironmentEvent::Interrupted => {
                self.pause();
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn fail(&mut self, error: PlaybackError) {
        error!(%error, "Playback failed");
        self.track_error(&error);
        self.stop_internal(true);
        self.session.state = SessionState::Error;
        self.notify(|delegate| delegate.on_error(&error));
        let content_id = self.session.selector.as_ref().map(|s| s.code().to_string());
        self.emit(PlaybackEvent::Error {
            content_id,
            message: error.to_string(),
        });
    }

    fn bump_generation(&mut self) {
        self.session.generation += 1;
        if let Some(pending) = self.pending.take() {
            pending.send(Err(PlaybackError::Superseded));
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.session.generation
    }

    fn screen_violation(&self) -> Option<PlaybackError> {
        self.core.screen_guard.check().err().map(|violation| match violation {
            ScreenPolicyViolation::Mirroring => PlaybackError::MirroringNotSupported,
            ScreenPolicyViolation::Capture => PlaybackError::ScreenRecordingNotAllowed,
        })
    }

    fn current_millis(&self) -> u64 {
        self.session.current_time().map_or(0, PlaybackTime::millis)
    }

    fn notify(&self, callback: impl FnOnce(&dyn SessionDelegate)) {
        if let Some(delegate) = self.delegate.get() {
            callback(delegate.as_ref());
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        self.core.event_bus.emit(CoreEvent::Playback(event)).ok();
    }

    fn emit_beacon(&self, event: BeaconEvent) {
        self.core.event_bus.emit(CoreEvent::Beacon(event)).ok();
    }

    fn playback_log(&self) -> Option<PlaybackLog> {
        let selector = self.session.selector.as_ref()?;
        let item = self.session.item.as_ref()?;
        let code = match selector.kind() {
            ContentKind::OnDemand => item
                .episode
                .as_ref()
                .map_or_else(|| item.code.clone(), |episode| episode.code.clone()),
            ContentKind::Linear | ContentKind::Live => selector.code().to_string(),
        };
        Some(PlaybackLog {
            kind: selector.kind(),
            code,
            play_mode: item.play_mode,
            tracking: selector.tracking_data(),
        })
    }

    fn tracking_started(&self) -> bool {
        self.collaborators
            .tracker
            .as_ref()
            .is_some_and(|tracker| tracker.is_playback_started())
    }

    fn start_tracking(&self) {
        let (Some(tracker), Some(log)) = (&self.collaborators.tracker, self.playback_log()) else {
            return;
        };
        if !tracker.is_playback_started() {
            tracker.start_playback(&log);
        }
    }

    fn end_tracking(&self) {
        let (Some(tracker), Some(log)) = (&self.collaborators.tracker, self.playback_log()) else {
            return;
        };
        if tracker.is_playback_started() {
            tracker.end_playback(&log);
        }
    }

    fn track_error(&self, error: &PlaybackError) {
        if let Some(tracker) = &self.collaborators.tracker {
            let code = self.session.selector.as_ref().map(ContentSelector::code);
            tracker.error(error, code);
        }
    }
}
