//! In-memory collaborators for driving a real `SessionController` in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{FixedClock, ScreenGuard};
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use core_playback::{
    BeaconError, BeaconPayload, BeaconSender, ContentSelector, EpisodeInfo, MediaError, MediaItem,
    MediaSource, PlayStatus, PlaybackError, PlaybackLog, PlaybackTime, PlaybackTracker,
    PostPlayInfo, PostPlaySource, PresentationSurface, RenderResource, ResolveRequest,
    ResourceEvent, ResourceStatus, ResumePointReport, ResumePointStore, ResumePointUpdate,
    SceneSearchSource, SceneSearchStatus, SessionCollaborators, SessionConfig, SessionController,
    SessionDelegate,
};
use core_runtime::{CoreConfig, EventBus};
use futures::channel::mpsc;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Render Resource
// ============================================================================

#[derive(Debug)]
struct ResourceState {
    status: ResourceStatus,
    duration: Option<PlaybackTime>,
    position: PlaybackTime,
    rate: f32,
    muted: bool,
    external_allowed: bool,
    buffer_empty: bool,
    released: bool,
}

pub struct FakeResource {
    state: Mutex<ResourceState>,
    auto_ready: bool,
    events: Mutex<Option<mpsc::UnboundedSender<ResourceEvent>>>,
    seek_gate: Mutex<Option<Arc<Notify>>>,
    seeks: Mutex<Vec<PlaybackTime>>,
}

impl FakeResource {
    pub fn new(duration: PlaybackTime, auto_ready: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ResourceState {
                status: ResourceStatus::ReadyToPlay,
                duration: Some(duration),
                position: PlaybackTime::ZERO,
                rate: 0.0,
                muted: false,
                external_allowed: false,
                buffer_empty: false,
                released: false,
            }),
            auto_ready,
            events: Mutex::new(None),
            seek_gate: Mutex::new(None),
            seeks: Mutex::new(Vec::new()),
        })
    }

    /// Push an event to the subscribed observer.
    pub fn emit(&self, event: ResourceEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.unbounded_send(event);
        }
    }

    /// Keep subsequent seeks pending until the returned notify fires.
    pub fn hold_seeks(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.seek_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn set_position(&self, position: PlaybackTime) {
        self.state.lock().unwrap().position = position;
    }

    pub fn set_buffer_empty(&self, empty: bool) {
        self.state.lock().unwrap().buffer_empty = empty;
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().unwrap().released
    }

    pub fn is_muted_now(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    pub fn external_allowed(&self) -> bool {
        self.state.lock().unwrap().external_allowed
    }

    pub fn seeks(&self) -> Vec<PlaybackTime> {
        self.seeks.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderResource for FakeResource {
    fn status(&self) -> ResourceStatus {
        self.state.lock().unwrap().status
    }

    fn duration(&self) -> Option<PlaybackTime> {
        self.state.lock().unwrap().duration
    }

    fn position(&self) -> PlaybackTime {
        self.state.lock().unwrap().position
    }

    fn rate(&self) -> f32 {
        self.state.lock().unwrap().rate
    }

    fn play(&self) {
        self.state.lock().unwrap().rate = 1.0;
    }

    fn pause(&self) {
        self.state.lock().unwrap().rate = 0.0;
    }

    async fn seek(&self, to: PlaybackTime) -> bool {
        let gate = self.seek_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.seeks.lock().unwrap().push(to);
        self.state.lock().unwrap().position = to;
        true
    }

    fn cancel_pending_seeks(&self) {}

    fn is_buffer_empty(&self) -> bool {
        self.state.lock().unwrap().buffer_empty
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    fn set_external_playback_allowed(&self, allowed: bool) {
        self.state.lock().unwrap().external_allowed = allowed;
    }

    fn subscribe(&self) -> BoxStream<'static, ResourceEvent> {
        let (tx, rx) = mpsc::unbounded();
        if self.auto_ready {
            let _ = tx.unbounded_send(ResourceEvent::StatusChanged(ResourceStatus::ReadyToPlay));
        }
        *self.events.lock().unwrap() = Some(tx);
        rx.boxed()
    }

    fn release(&self) {
        let mut state = self.state.lock().unwrap();
        state.released = true;
        state.rate = 0.0;
        self.events.lock().unwrap().take();
    }
}

// ============================================================================
// Media Source
// ============================================================================

pub struct FakeMediaSource {
    item: Mutex<MediaItem>,
    duration: PlaybackTime,
    auto_ready: AtomicBool,
    failures_remaining: AtomicUsize,
    held: Mutex<HashMap<String, Arc<Notify>>>,
    requests: Mutex<Vec<ResolveRequest>>,
    resources: Mutex<Vec<Arc<FakeResource>>>,
    bitrate_policies: AtomicUsize,
}

impl FakeMediaSource {
    pub fn new(item: MediaItem, duration: PlaybackTime) -> Arc<Self> {
        Arc::new(Self {
            item: Mutex::new(item),
            duration,
            auto_ready: AtomicBool::new(true),
            failures_remaining: AtomicUsize::new(0),
            held: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            resources: Mutex::new(Vec::new()),
            bitrate_policies: AtomicUsize::new(0),
        })
    }

    /// Fail the next `count` resolutions with a network error.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Block resolution of `code` until the returned notify fires.
    pub fn hold(&self, code: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.held.lock().unwrap().insert(code.to_string(), gate.clone());
        gate
    }

    pub fn set_auto_ready(&self, auto_ready: bool) {
        self.auto_ready.store(auto_ready, Ordering::SeqCst);
    }

    pub fn set_item(&self, item: MediaItem) {
        *self.item.lock().unwrap() = item;
    }

    pub fn resolve_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ResolveRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn resources(&self) -> Vec<Arc<FakeResource>> {
        self.resources.lock().unwrap().clone()
    }

    pub fn latest_resource(&self) -> Arc<FakeResource> {
        self.resources.lock().unwrap().last().cloned().expect("no resource created")
    }

    pub fn bitrate_policy_count(&self) -> usize {
        self.bitrate_policies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for FakeMediaSource {
    async fn resolve(&self, request: &ResolveRequest) -> Result<MediaItem, MediaError> {
        self.requests.lock().unwrap().push(request.clone());

        let gate = self.held.lock().unwrap().get(request.selector.code()).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(MediaError::Network("playlist request timed out".into()));
        }

        let mut item = self.item.lock().unwrap().clone();
        item.code = request.selector.code().to_string();
        Ok(item)
    }

    async fn check_license_and_create(
        &self,
        _item: &MediaItem,
    ) -> Result<Arc<dyn RenderResource>, MediaError> {
        let resource = FakeResource::new(self.duration, self.auto_ready.load(Ordering::SeqCst));
        self.resources.lock().unwrap().push(resource.clone());
        Ok(resource)
    }

    fn apply_bitrate_policy(&self, _resource: &dyn RenderResource) {
        self.bitrate_policies.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Delegate & Surface
// ============================================================================

#[derive(Debug, Default)]
pub struct FakeSurface {
    pub presented: AtomicUsize,
    pub cleared: AtomicUsize,
}

impl PresentationSurface for FakeSurface {
    fn present(&self, _resource: Arc<dyn RenderResource>) {
        self.presented.fetch_add(1, Ordering::SeqCst);
    }

    fn clear(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    BufferLevel(u8),
    RefreshStarting,
    Ready,
    Position(Option<PlaybackTime>, Option<PlaybackTime>),
    Completed,
    Error(PlaybackError),
    PostPlay(Option<PostPlayInfo>),
    Status(PlayStatus),
    SceneSearch(SceneSearchStatus),
}

pub struct RecordingDelegate {
    calls: Mutex<Vec<Call>>,
    pub surface: Option<Arc<FakeSurface>>,
}

impl RecordingDelegate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            surface: Some(Arc::new(FakeSurface::default())),
        })
    }

    pub fn without_surface() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            surface: None,
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| predicate(call)).count()
    }

    pub fn positions(&self) -> Vec<Option<PlaybackTime>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                Call::Position(current, _) => Some(*current),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<PlaybackError> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                Call::Error(error) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    /// Wait (in virtual time) until `predicate` holds for the recorded calls.
    pub async fn wait_until(&self, predicate: impl Fn(&[Call]) -> bool) {
        for _ in 0..2_000 {
            if predicate(&self.calls.lock().unwrap()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached; calls: {:?}", self.calls());
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SessionDelegate for RecordingDelegate {
    fn on_target_surface_requested(&self) -> Option<Arc<dyn PresentationSurface>> {
        self.surface
            .clone()
            .map(|surface| surface as Arc<dyn PresentationSurface>)
    }

    fn on_buffer_level_changed(&self, level: u8) {
        self.record(Call::BufferLevel(level));
    }

    fn on_refresh_starting(&self) {
        self.record(Call::RefreshStarting);
    }

    fn on_ready(&self) {
        self.record(Call::Ready);
    }

    fn on_position_updated(&self, current: Option<PlaybackTime>, duration: Option<PlaybackTime>) {
        self.record(Call::Position(current, duration));
    }

    fn on_playback_completed(&self) {
        self.record(Call::Completed);
    }

    fn on_error(&self, error: &PlaybackError) {
        self.record(Call::Error(error.clone()));
    }

    fn on_post_play_reached(&self, info: Option<&PostPlayInfo>) {
        self.record(Call::PostPlay(info.cloned()));
    }

    fn on_status_changed(&self, status: PlayStatus) {
        self.record(Call::Status(status));
    }

    fn on_scene_search_file_status(&self, status: SceneSearchStatus) {
        self.record(Call::SceneSearch(status));
    }
}

// ============================================================================
// Beacons, Storage & Tracking
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SentBeacon {
    Signal(BeaconPayload),
    Interruption(BeaconPayload),
    Stop(BeaconPayload, bool),
    ResumePoint(ResumePointReport),
}

#[derive(Default)]
pub struct RecordingBeacons {
    sent: Mutex<Vec<SentBeacon>>,
    responses: Mutex<VecDeque<Result<(), BeaconError>>>,
}

impl RecordingBeacons {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer the next beacons with `responses`, in order; `Ok` afterwards.
    pub fn respond_with(&self, responses: impl IntoIterator<Item = Result<(), BeaconError>>) {
        self.responses.lock().unwrap().extend(responses);
    }

    pub fn sent(&self) -> Vec<SentBeacon> {
        self.sent.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|beacon| matches!(beacon, SentBeacon::Stop(..)))
            .count()
    }

    fn record(&self, beacon: SentBeacon) -> Result<(), BeaconError> {
        self.sent.lock().unwrap().push(beacon);
        self.responses.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl BeaconSender for RecordingBeacons {
    async fn send_signal(&self, payload: BeaconPayload) -> Result<(), BeaconError> {
        self.record(SentBeacon::Signal(payload))
    }

    async fn send_interruption(&self, payload: BeaconPayload) -> Result<(), BeaconError> {
        self.record(SentBeacon::Interruption(payload))
    }

    async fn send_stop(&self, payload: BeaconPayload, completed: bool) -> Result<(), BeaconError> {
        self.record(SentBeacon::Stop(payload, completed))
    }

    async fn send_resume_point(&self, report: ResumePointReport) -> Result<(), BeaconError> {
        self.record(SentBeacon::ResumePoint(report))
    }
}

#[derive(Default)]
pub struct MemoryResumeStore {
    updates: Mutex<Vec<ResumePointUpdate>>,
    pending_sync: Mutex<HashMap<String, bool>>,
}

impl MemoryResumeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn updates(&self) -> Vec<ResumePointUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<ResumePointUpdate> {
        self.updates.lock().unwrap().last().cloned()
    }

    pub fn pending_sync(&self, episode_code: &str) -> Option<bool> {
        self.pending_sync.lock().unwrap().get(episode_code).copied()
    }
}

impl ResumePointStore for MemoryResumeStore {
    fn update(&self, update: &ResumePointUpdate) {
        self.updates.lock().unwrap().push(update.clone());
    }

    fn set_pending_sync(&self, episode_code: &str, pending: bool) {
        self.pending_sync
            .lock()
            .unwrap()
            .insert(episode_code.to_string(), pending);
    }
}

#[derive(Default)]
pub struct RecordingTracker {
    started: AtomicBool,
    pub starts: Mutex<Vec<PlaybackLog>>,
    pub ends: Mutex<Vec<PlaybackLog>>,
    pub errors: Mutex<Vec<PlaybackError>>,
}

impl PlaybackTracker for RecordingTracker {
    fn start_playback(&self, log: &PlaybackLog) {
        self.started.store(true, Ordering::SeqCst);
        self.starts.lock().unwrap().push(log.clone());
    }

    fn end_playback(&self, log: &PlaybackLog) {
        self.started.store(false, Ordering::SeqCst);
        self.ends.lock().unwrap().push(log.clone());
    }

    fn error(&self, error: &PlaybackError, _content_code: Option<&str>) {
        self.errors.lock().unwrap().push(error.clone());
    }

    fn is_playback_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

pub struct FakePostPlay {
    pub downloaded: Mutex<Option<PostPlayInfo>>,
    pub fetched: PostPlayInfo,
    pub fetches: AtomicUsize,
}

impl FakePostPlay {
    pub fn new(next: &str) -> Arc<Self> {
        Arc::new(Self {
            downloaded: Mutex::new(None),
            fetched: PostPlayInfo {
                next_content_id: next.to_string(),
                title: Some("Next episode".into()),
                downloaded: false,
            },
            fetches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PostPlaySource for FakePostPlay {
    fn next_downloaded(&self, _current: &MediaItem) -> Option<PostPlayInfo> {
        self.downloaded.lock().unwrap().clone()
    }

    async fn fetch(&self, _episode_code: &str) -> Result<PostPlayInfo, MediaError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.fetched.clone())
    }
}

pub struct FakeSceneSearch {
    pub status: SceneSearchStatus,
    pub urls: Mutex<Vec<String>>,
}

#[async_trait]
impl SceneSearchSource for FakeSceneSearch {
    async fn fetch(&self, url: &str) -> SceneSearchStatus {
        self.urls.lock().unwrap().push(url.to_string());
        self.status
    }

    fn presentation_time(&self, _url: &str, at: PlaybackTime) -> Option<PlaybackTime> {
        // Thumbnails every 10 seconds.
        Some(PlaybackTime::from_secs((at.whole_secs() / 10 * 10) as i64))
    }

    fn image(&self, _url: &str, presentation_time: PlaybackTime) -> Option<Bytes> {
        Some(Bytes::from(format!("jpeg@{}", presentation_time.whole_secs())))
    }
}

/// Screen guard whose answers tests can flip.
#[derive(Default)]
pub struct SwitchableGuard {
    pub mirroring: AtomicBool,
    pub captured: AtomicBool,
    pub external: AtomicBool,
}

impl ScreenGuard for SwitchableGuard {
    fn is_mirroring(&self) -> bool {
        self.mirroring.load(Ordering::SeqCst)
    }

    fn is_captured(&self) -> bool {
        self.captured.load(Ordering::SeqCst)
    }

    fn is_external_playback(&self) -> bool {
        self.external.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub const DURATION_SECS: i64 = 600;

pub fn episode_item(code: &str, duration_secs: i64, endroll_secs: i64) -> MediaItem {
    MediaItem::new(code, "play-token-1")
        .with_beacon_span(0)
        .with_file_code("F-HD")
        .with_episode(EpisodeInfo {
            code: format!("EP-{}", code),
            duration: PlaybackTime::from_secs(duration_secs),
            endroll_position: PlaybackTime::from_secs(endroll_secs),
            resume_point: None,
        })
}

pub struct Harness {
    pub controller: SessionController,
    pub delegate: Arc<RecordingDelegate>,
    pub source: Arc<FakeMediaSource>,
    pub beacons: Arc<RecordingBeacons>,
    pub store: Arc<MemoryResumeStore>,
    pub tracker: Arc<RecordingTracker>,
    pub post_play: Arc<FakePostPlay>,
    pub guard: Arc<SwitchableGuard>,
    pub bus: EventBus,
}

pub struct HarnessOptions {
    pub item: MediaItem,
    pub config: SessionConfig,
    pub scene_search: Option<Arc<FakeSceneSearch>>,
    pub register_delegate: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            item: episode_item("42", DURATION_SECS, 0),
            config: SessionConfig::default(),
            scene_search: None,
            register_delegate: true,
        }
    }
}

pub fn harness() -> Harness {
    harness_with(HarnessOptions::default())
}

pub fn harness_with(options: HarnessOptions) -> Harness {
    let source = FakeMediaSource::new(options.item, PlaybackTime::from_secs(DURATION_SECS));
    let beacons = RecordingBeacons::new();
    let store = MemoryResumeStore::new();
    let tracker = Arc::new(RecordingTracker::default());
    let post_play = FakePostPlay::new("43");
    let guard = Arc::new(SwitchableGuard::default());
    let bus = EventBus::new(256);

    let core = CoreConfig::builder()
        .screen_guard(guard.clone())
        .clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 5, 1, 21, 30, 0).unwrap(),
        )))
        .event_bus(bus.clone())
        .build()
        .expect("core config");

    let mut collaborators = SessionCollaborators::builder()
        .media_source(source.clone())
        .beacon_sender(beacons.clone())
        .resume_store(store.clone())
        .tracker(tracker.clone())
        .post_play(post_play.clone());
    if let Some(scene_search) = options.scene_search {
        collaborators = collaborators.scene_search(scene_search);
    }
    let collaborators = collaborators.build().expect("collaborators");

    let controller =
        SessionController::spawn(core, options.config, collaborators).expect("controller");
    let delegate = RecordingDelegate::new();
    if options.register_delegate {
        controller.set_delegate(&delegate);
    }

    Harness {
        controller,
        delegate,
        source,
        beacons,
        store,
        tracker,
        post_play,
        guard,
        bus,
    }
}

impl Harness {
    /// Set up the default on-demand title and wait for it to become ready.
    pub async fn ready_on_demand(&self) {
        self.controller
            .setup(ContentSelector::on_demand("42"))
            .await
            .expect("setup");
        self.delegate
            .wait_until(|calls| calls.contains(&Call::Ready))
            .await;
    }

    /// Let spawned tasks and the controller drain their queues.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
