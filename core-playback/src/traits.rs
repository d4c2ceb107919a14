//! # Collaborator Traits
//!
//! Narrow interfaces the session controller consumes. They differ from
//! `bridge-traits`, which covers platform capabilities: these describe the
//! media stack, the tracking backend and local storage of a specific
//! service.
//!
//! ## Architecture
//!
//! ```text
//!                    resolve + license
//!  ┌──────────────┐ ─────────────────> ┌──────────────────┐
//!  │   Session    │                    │   MediaSource    │
//!  │  controller  │ <───────────────── └──────────────────┘
//!  │              │  Arc<dyn RenderResource>
//!  │              │ ── present/clear ─> PresentationSurface
//!  │              │ ── beacons ───────> BeaconSender
//!  │              │ ── resume point ──> ResumePointStore
//!  └──────────────┘ ── start/end/err ─> PlaybackTracker
//! ```
//!
//! ## Threading Model
//!
//! Every trait is `Send + Sync`. Synchronous methods are called from the
//! controller task and must not block; anything involving I/O is `async`
//! and runs on a spawned task.

use crate::content::{AudioMode, ContentKind, ContentSelector, MediaItem, PlayMode, PostPlayInfo, TrackingData};
use crate::error::{BeaconError, MediaError, PlaybackError};
use crate::time::PlaybackTime;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Media Source & Render Resource
// ============================================================================

/// Parameters for resolving a selector into a playable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub selector: ContentSelector,
    /// Only meaningful for on-demand content.
    pub audio_mode: AudioMode,
}

/// Resolves content into render resources.
///
/// # Example
///
/// ```ignore
/// let item = source.resolve(&request).await?;
/// let resource = source.check_license_and_create(&item).await?;
/// ```
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Fetch playlist information for the selection.
    ///
    /// Implementations decide whether a finished download is played
    /// instead of the stream and report it through [`MediaItem::play_mode`].
    async fn resolve(&self, request: &ResolveRequest) -> Result<MediaItem, MediaError>;

    /// Run the license check and create the render resource for `item`.
    async fn check_license_and_create(
        &self,
        item: &MediaItem,
    ) -> Result<Arc<dyn RenderResource>, MediaError>;

    /// Cap the bitrate of a linear or live resource according to the
    /// current network. Called after creation and on reachability changes.
    fn apply_bitrate_policy(&self, _resource: &dyn RenderResource) {}
}

/// Load status of a render resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    Unknown,
    ReadyToPlay,
    Failed,
}

/// Notification emitted by a render resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    StatusChanged(ResourceStatus),
    /// End (in seconds) of the first loaded time range.
    LoadedUntil(f64),
    RateChanged { old: f32, new: f32 },
    ExternalPlaybackChanged(bool),
    BufferEmpty,
    PlayedToEnd,
    FailedToPlayToEnd,
    /// A new entry was appended to the resource's error log.
    ErrorLogEntry { code: i64 },
    /// The item behind the resource failed (license revoked, download broken).
    ItemFailed(MediaError),
}

/// Handle to an engine-owned media object.
///
/// Only the resource binder and the controller task touch it.
#[async_trait]
pub trait RenderResource: Send + Sync {
    fn status(&self) -> ResourceStatus;

    /// Total duration, once the engine knows it.
    fn duration(&self) -> Option<PlaybackTime>;

    fn position(&self) -> PlaybackTime;

    /// Playback rate; zero means paused.
    fn rate(&self) -> f32;

    fn play(&self);

    fn pause(&self);

    /// Seek exactly to `to`. Resolves to `false` when the seek was
    /// interrupted or rejected.
    async fn seek(&self, to: PlaybackTime) -> bool;

    fn cancel_pending_seeks(&self);

    fn is_buffer_empty(&self) -> bool;

    fn set_muted(&self, muted: bool);

    fn is_muted(&self) -> bool;

    fn set_external_playback_allowed(&self, allowed: bool);

    /// Start observing the resource. The stream ends when the resource is
    /// released.
    fn subscribe(&self) -> BoxStream<'static, ResourceEvent>;

    /// Tear down the engine object. Called exactly once, after observers
    /// are gone.
    fn release(&self);
}

/// Rendering target supplied by the delegate.
pub trait PresentationSurface: Send + Sync {
    fn present(&self, resource: Arc<dyn RenderResource>);

    fn clear(&self);
}

// ============================================================================
// Beacons & Resume Points
// ============================================================================

/// Kind-specific beacon payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "content", rename_all = "snake_case")]
pub enum BeaconPayload {
    OnDemand {
        play_token: String,
        file_code: Option<String>,
        play_time: PlaybackTime,
    },
    Linear {
        play_token: String,
    },
    Live {
        play_token: String,
    },
}

/// Offline playback report sent when a downloaded item stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePointReport {
    pub episode_code: String,
    pub resume_point: PlaybackTime,
    pub completed: bool,
    pub viewed_at: DateTime<Utc>,
    pub play_mode: PlayMode,
}

/// Posts tracking beacons to the remote collector.
#[async_trait]
pub trait BeaconSender: Send + Sync {
    async fn send_signal(&self, payload: BeaconPayload) -> Result<(), BeaconError>;

    async fn send_interruption(&self, payload: BeaconPayload) -> Result<(), BeaconError>;

    async fn send_stop(&self, payload: BeaconPayload, completed: bool) -> Result<(), BeaconError>;

    async fn send_resume_point(&self, report: ResumePointReport) -> Result<(), BeaconError>;
}

/// Resume point written to local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePointUpdate {
    pub episode_code: String,
    pub position: PlaybackTime,
    pub completed: bool,
    pub play_mode: PlayMode,
}

/// Local resume-point persistence.
pub trait ResumePointStore: Send + Sync {
    fn update(&self, update: &ResumePointUpdate);

    /// Mark whether a downloaded episode still has to report its resume
    /// point to the server.
    fn set_pending_sync(&self, episode_code: &str, pending: bool);
}

// ============================================================================
// Tracking, Post-Play & Scene Search
// ============================================================================

/// Subject of a playback tracking log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackLog {
    pub kind: ContentKind,
    pub code: String,
    pub play_mode: PlayMode,
    pub tracking: TrackingData,
}

/// Analytics sink for start/end/error logs.
pub trait PlaybackTracker: Send + Sync {
    fn start_playback(&self, log: &PlaybackLog);

    fn end_playback(&self, log: &PlaybackLog);

    fn error(&self, error: &PlaybackError, content_code: Option<&str>);

    /// Whether a start log is open without a matching end log.
    fn is_playback_started(&self) -> bool;
}

/// Source of "next content" suggestions.
#[async_trait]
pub trait PostPlaySource: Send + Sync {
    /// The next episode if it is already downloaded.
    fn next_downloaded(&self, current: &MediaItem) -> Option<PostPlayInfo>;

    async fn fetch(&self, episode_code: &str) -> Result<PostPlayInfo, MediaError>;
}

/// Progress of a scene-search thumbnail file download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneSearchStatus {
    #[default]
    NotStarted,
    Ongoing,
    Completed,
    Failed,
}

impl SceneSearchStatus {
    /// Thumbnails can be served (possibly partially).
    pub fn is_available(self) -> bool {
        matches!(self, SceneSearchStatus::Ongoing | SceneSearchStatus::Completed)
    }
}

/// Thumbnail store for seek previews.
#[async_trait]
pub trait SceneSearchSource: Send + Sync {
    /// Download the thumbnail file at `url`, returning the final status.
    async fn fetch(&self, url: &str) -> SceneSearchStatus;

    /// Capture time of the thumbnail closest to `at`.
    fn presentation_time(&self, url: &str, at: PlaybackTime) -> Option<PlaybackTime>;

    fn image(&self, url: &str, presentation_time: PlaybackTime) -> Option<Bytes>;
}
