//! # Playback Session Example
//!
//! Drives a `SessionController` against an in-memory media source: setup,
//! play, seek near the end, pause, resume and stop, printing delegate
//! callbacks and bus events as they arrive.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use async_trait::async_trait;
use bridge_traits::{LogLevel, PermissiveScreenGuard};
use core_playback::{
    BeaconError, BeaconPayload, BeaconSender, ContentSelector, EpisodeInfo, MediaError, MediaItem,
    MediaSource, PlayStatus, PlaybackError, PlaybackTime, PresentationSurface, RenderResource,
    ResourceEvent, ResourceStatus, ResumePointReport, ResumePointStore, ResumePointUpdate,
    ResolveRequest, SessionCollaborators, SessionConfig, SessionController, SessionDelegate,
};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::CoreConfig;
use futures::channel::mpsc;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// In-Memory Resource
// ============================================================================

struct MemoryResource {
    duration: PlaybackTime,
    position: Mutex<PlaybackTime>,
    rate: Mutex<f32>,
    muted: Mutex<bool>,
}

impl MemoryResource {
    fn new(duration: PlaybackTime) -> Self {
        Self {
            duration,
            position: Mutex::new(PlaybackTime::ZERO),
            rate: Mutex::new(0.0),
            muted: Mutex::new(false),
        }
    }
}

#[async_trait]
impl RenderResource for MemoryResource {
    fn status(&self) -> ResourceStatus {
        ResourceStatus::ReadyToPlay
    }

    fn duration(&self) -> Option<PlaybackTime> {
        Some(self.duration)
    }

    fn position(&self) -> PlaybackTime {
        *self.position.lock().unwrap()
    }

    fn rate(&self) -> f32 {
        *self.rate.lock().unwrap()
    }

    fn play(&self) {
        *self.rate.lock().unwrap() = 1.0;
    }

    fn pause(&self) {
        *self.rate.lock().unwrap() = 0.0;
    }

    async fn seek(&self, to: PlaybackTime) -> bool {
        tokio::time::sleep(Duration::from_millis(50)).await;
        *self.position.lock().unwrap() = to;
        true
    }

    fn cancel_pending_seeks(&self) {}

    fn is_buffer_empty(&self) -> bool {
        false
    }

    fn set_muted(&self, muted: bool) {
        *self.muted.lock().unwrap() = muted;
    }

    fn is_muted(&self) -> bool {
        *self.muted.lock().unwrap()
    }

    fn set_external_playback_allowed(&self, _allowed: bool) {}

    fn subscribe(&self) -> BoxStream<'static, ResourceEvent> {
        let (tx, rx) = mpsc::unbounded();
        for event in [
            ResourceEvent::LoadedUntil(4.0),
            ResourceEvent::LoadedUntil(8.0),
            ResourceEvent::StatusChanged(ResourceStatus::ReadyToPlay),
        ] {
            let _ = tx.unbounded_send(event);
        }
        rx.boxed()
    }

    fn release(&self) {
        println!("  [resource] released");
    }
}

// ============================================================================
// Collaborators
// ============================================================================

struct CatalogSource;

#[async_trait]
impl MediaSource for CatalogSource {
    async fn resolve(&self, request: &ResolveRequest) -> Result<MediaItem, MediaError> {
        println!(
            "  [source] resolving {} ({:?})",
            request.selector.code(),
            request.audio_mode
        );
        Ok(MediaItem::new(request.selector.code(), "demo-token")
            .with_beacon_span(0)
            .with_file_code("HD")
            .with_episode(EpisodeInfo {
                code: format!("EP-{}", request.selector.code()),
                duration: PlaybackTime::from_secs(1_440),
                endroll_position: PlaybackTime::from_secs(1_380),
                resume_point: Some(PlaybackTime::from_secs(300)),
            }))
    }

    async fn check_license_and_create(
        &self,
        item: &MediaItem,
    ) -> Result<Arc<dyn RenderResource>, MediaError> {
        let duration = item
            .episode
            .as_ref()
            .map_or(PlaybackTime::ZERO, |episode| episode.duration);
        Ok(Arc::new(MemoryResource::new(duration)))
    }
}

struct PrintingBeacons;

#[async_trait]
impl BeaconSender for PrintingBeacons {
    async fn send_signal(&self, payload: BeaconPayload) -> Result<(), BeaconError> {
        println!("  [beacon] signal {:?}", payload);
        Ok(())
    }

    async fn send_interruption(&self, payload: BeaconPayload) -> Result<(), BeaconError> {
        println!("  [beacon] interruption {:?}", payload);
        Ok(())
    }

    async fn send_stop(&self, payload: BeaconPayload, completed: bool) -> Result<(), BeaconError> {
        println!("  [beacon] stop {:?} completed={}", payload, completed);
        Ok(())
    }

    async fn send_resume_point(&self, report: ResumePointReport) -> Result<(), BeaconError> {
        println!("  [beacon] resume point {:?}", report);
        Ok(())
    }
}

struct PrintingStore;

impl ResumePointStore for PrintingStore {
    fn update(&self, update: &ResumePointUpdate) {
        println!(
            "  [store] {} resumes at {}",
            update.episode_code, update.position
        );
    }

    fn set_pending_sync(&self, _episode_code: &str, _pending: bool) {}
}

struct NullSurface;

impl PresentationSurface for NullSurface {
    fn present(&self, _resource: Arc<dyn RenderResource>) {
        println!("  [surface] presenting");
    }

    fn clear(&self) {
        println!("  [surface] cleared");
    }
}

struct ConsoleDelegate;

impl SessionDelegate for ConsoleDelegate {
    fn on_target_surface_requested(&self) -> Option<Arc<dyn PresentationSurface>> {
        Some(Arc::new(NullSurface))
    }

    fn on_buffer_level_changed(&self, level: u8) {
        println!("  [delegate] buffer {}%", level);
    }

    fn on_ready(&self) {
        println!("  [delegate] ready");
    }

    fn on_position_updated(&self, current: Option<PlaybackTime>, duration: Option<PlaybackTime>) {
        if let (Some(current), Some(duration)) = (current, duration) {
            println!("  [delegate] {} / {}", current, duration);
        }
    }

    fn on_status_changed(&self, status: PlayStatus) {
        println!("  [delegate] status {:?}", status);
    }

    fn on_error(&self, error: &PlaybackError) {
        println!("  [delegate] error: {}", error);
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Info),
    )?;

    let core = CoreConfig::builder()
        .screen_guard(Arc::new(PermissiveScreenGuard))
        .build()?;
    let collaborators = SessionCollaborators::builder()
        .media_source(Arc::new(CatalogSource))
        .beacon_sender(Arc::new(PrintingBeacons))
        .resume_store(Arc::new(PrintingStore))
        .build()?;

    let mut events = core.event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("  [bus] {}", event.description());
        }
    });

    let controller = SessionController::spawn(core, SessionConfig::default(), collaborators)?;
    let delegate = Arc::new(ConsoleDelegate);
    controller.set_delegate(&delegate);

    println!("=== Setup ===");
    controller.setup(ContentSelector::on_demand("SID0042")).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("\n=== Play from resume point ===");
    controller.play(None, false).await;
    tokio::time::sleep(Duration::from_millis(1_200)).await;

    println!("\n=== Seek past the end ===");
    controller.seek(PlaybackTime::from_secs(5_000)).await;
    println!("  now at {:?}", controller.current_time().await);
    tokio::time::sleep(Duration::from_millis(600)).await;

    println!("\n=== Pause / resume ===");
    controller.pause().await;
    controller.resume().await;

    println!("\n=== Stop ===");
    controller.stop().await;
    println!("  snapshot: {:?}", controller.snapshot());

    controller.release().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("\n✅ Demo complete");
    Ok(())
}
