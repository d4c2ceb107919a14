//! # Session Configuration
//!
//! Tunables of a playback session and the collaborators it is built from.

use crate::content::AudioMode;
use crate::traits::{
    BeaconSender, MediaSource, PlaybackTracker, PostPlaySource, ResumePointStore,
    SceneSearchSource,
};
use core_runtime::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Playback session configuration.
///
/// Every field has a default, so an empty JSON object deserializes to
/// [`SessionConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Period of position updates while playing.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_position_interval")]
    pub position_interval: Duration,

    /// Distance kept from the end of the content when seeking, so the
    /// resource still reports reaching the end.
    ///
    /// Default: 1 second.
    #[serde(default = "default_seek_end_margin")]
    pub seek_end_margin: Duration,

    /// Additional resolve attempts after a failed playlist refresh.
    ///
    /// Default: 2.
    #[serde(default = "default_refresh_retries")]
    pub refresh_retries: u32,

    /// Delay between refresh attempts.
    ///
    /// Default: 1 second.
    #[serde(default = "default_refresh_retry_delay")]
    pub refresh_retry_delay: Duration,

    /// Buffer percentage credited per loaded second.
    ///
    /// Default: 10, so ten loaded seconds report a full buffer.
    #[serde(default = "default_buffer_percent_per_second")]
    pub buffer_percent_per_second: u8,

    /// Resource error-log codes that trigger a playlist refresh
    /// (expired segment URLs, cancelled loads).
    ///
    /// Default: `[-1004, -12880]`.
    #[serde(default = "default_refreshable_error_codes")]
    pub refreshable_error_codes: Vec<i64>,

    /// Audio mode used for on-demand content until changed.
    ///
    /// Default: [`AudioMode::Dubbed`].
    #[serde(default)]
    pub default_audio_mode: AudioMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            position_interval: default_position_interval(),
            seek_end_margin: default_seek_end_margin(),
            refresh_retries: default_refresh_retries(),
            refresh_retry_delay: default_refresh_retry_delay(),
            buffer_percent_per_second: default_buffer_percent_per_second(),
            refreshable_error_codes: default_refreshable_error_codes(),
            default_audio_mode: AudioMode::default(),
        }
    }
}

impl SessionConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.position_interval.is_zero() {
            return Err("position_interval must be > 0".to_string());
        }

        if self.buffer_percent_per_second == 0 {
            return Err("buffer_percent_per_second must be > 0".to_string());
        }

        if self.buffer_percent_per_second > 100 {
            return Err("buffer_percent_per_second cannot exceed 100".to_string());
        }

        Ok(())
    }

    pub fn is_refreshable_error(&self, code: i64) -> bool {
        self.refreshable_error_codes.contains(&code)
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_position_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_seek_end_margin() -> Duration {
    Duration::from_secs(1)
}

fn default_refresh_retries() -> u32 {
    2
}

fn default_refresh_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_buffer_percent_per_second() -> u8 {
    10
}

fn default_refreshable_error_codes() -> Vec<i64> {
    vec![-1004, -12880]
}

// ============================================================================
// Collaborators
// ============================================================================

/// External services a session is driven by.
///
/// Use [`SessionCollaborators::builder`]; the media source, beacon sender
/// and resume store are required.
#[derive(Clone)]
pub struct SessionCollaborators {
    pub media_source: Arc<dyn MediaSource>,
    pub beacon_sender: Arc<dyn BeaconSender>,
    pub resume_store: Arc<dyn ResumePointStore>,
    pub tracker: Option<Arc<dyn PlaybackTracker>>,
    pub post_play: Option<Arc<dyn PostPlaySource>>,
    pub scene_search: Option<Arc<dyn SceneSearchSource>>,
}

impl std::fmt::Debug for SessionCollaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCollaborators")
            .field("media_source", &"MediaSource { ... }")
            .field("beacon_sender", &"BeaconSender { ... }")
            .field("resume_store", &"ResumePointStore { ... }")
            .field("tracker", &self.tracker.as_ref().map(|_| "PlaybackTracker { ... }"))
            .field("post_play", &self.post_play.as_ref().map(|_| "PostPlaySource { ... }"))
            .field(
                "scene_search",
                &self.scene_search.as_ref().map(|_| "SceneSearchSource { ... }"),
            )
            .finish()
    }
}

impl SessionCollaborators {
    pub fn builder() -> SessionCollaboratorsBuilder {
        SessionCollaboratorsBuilder::default()
    }
}

fn collaborator_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

/// Builder for [`SessionCollaborators`].
#[derive(Default)]
pub struct SessionCollaboratorsBuilder {
    media_source: Option<Arc<dyn MediaSource>>,
    beacon_sender: Option<Arc<dyn BeaconSender>>,
    resume_store: Option<Arc<dyn ResumePointStore>>,
    tracker: Option<Arc<dyn PlaybackTracker>>,
    post_play: Option<Arc<dyn PostPlaySource>>,
    scene_search: Option<Arc<dyn SceneSearchSource>>,
}

impl SessionCollaboratorsBuilder {
    pub fn media_source(mut self, source: Arc<dyn MediaSource>) -> Self {
        self.media_source = Some(source);
        self
    }

    pub fn beacon_sender(mut self, sender: Arc<dyn BeaconSender>) -> Self {
        self.beacon_sender = Some(sender);
        self
    }

    pub fn resume_store(mut self, store: Arc<dyn ResumePointStore>) -> Self {
        self.resume_store = Some(store);
        self
    }

    pub fn tracker(mut self, tracker: Arc<dyn PlaybackTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn post_play(mut self, source: Arc<dyn PostPlaySource>) -> Self {
        self.post_play = Some(source);
        self
    }

    pub fn scene_search(mut self, source: Arc<dyn SceneSearchSource>) -> Self {
        self.scene_search = Some(source);
        self
    }

    /// Builds the collaborator set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityMissing`] naming the first required
    /// collaborator that was not provided.
    pub fn build(self) -> Result<SessionCollaborators> {
        let media_source = self.media_source.ok_or_else(|| {
            collaborator_missing(
                "MediaSource",
                "A MediaSource is required to resolve content into render resources.",
            )
        })?;
        let beacon_sender = self.beacon_sender.ok_or_else(|| {
            collaborator_missing(
                "BeaconSender",
                "A BeaconSender is required to report playback to the beacon collector.",
            )
        })?;
        let resume_store = self.resume_store.ok_or_else(|| {
            collaborator_missing(
                "ResumePointStore",
                "A ResumePointStore is required to persist resume points.",
            )
        })?;

        Ok(SessionCollaborators {
            media_source,
            beacon_sender,
            resume_store,
            tracker: self.tracker,
            post_play: self.post_play,
            scene_search: self.scene_search,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MediaItem;
    use crate::error::{BeaconError, MediaError};
    use crate::traits::{BeaconPayload, RenderResource, ResolveRequest, ResumePointReport, ResumePointUpdate};
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        Source {}

        #[async_trait]
        impl MediaSource for Source {
            async fn resolve(&self, request: &ResolveRequest) -> std::result::Result<MediaItem, MediaError>;
            async fn check_license_and_create(
                &self,
                item: &MediaItem,
            ) -> std::result::Result<Arc<dyn RenderResource>, MediaError>;
        }
    }

    mock! {
        Sender {}

        #[async_trait]
        impl BeaconSender for Sender {
            async fn send_signal(&self, payload: BeaconPayload) -> std::result::Result<(), BeaconError>;
            async fn send_interruption(&self, payload: BeaconPayload) -> std::result::Result<(), BeaconError>;
            async fn send_stop(&self, payload: BeaconPayload, completed: bool) -> std::result::Result<(), BeaconError>;
            async fn send_resume_point(&self, report: ResumePointReport) -> std::result::Result<(), BeaconError>;
        }
    }

    mock! {
        Store {}

        impl ResumePointStore for Store {
            fn update(&self, update: &ResumePointUpdate);
            fn set_pending_sync(&self, episode_code: &str, pending: bool);
        }
    }

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.position_interval, Duration::from_millis(500));
        assert_eq!(config.refresh_retries, 2);
        assert!(config.is_refreshable_error(-1004));
        assert!(!config.is_refreshable_error(-1));
    }

    #[test]
    fn test_config_validation() {
        let mut config = SessionConfig::default();

        config.position_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.position_interval = Duration::from_millis(250);

        config.buffer_percent_per_second = 0;
        assert!(config.validate().is_err());

        config.buffer_percent_per_second = 101;
        assert!(config.validate().is_err());

        config.buffer_percent_per_second = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SessionConfig::default());

        let config: SessionConfig =
            serde_json::from_str(r#"{"refresh_retries": 5, "default_audio_mode": "subtitled"}"#).unwrap();
        assert_eq!(config.refresh_retries, 5);
        assert_eq!(config.default_audio_mode, AudioMode::Subtitled);
    }

    #[test]
    fn test_builder_requires_media_source() {
        let result = SessionCollaborators::builder()
            .beacon_sender(Arc::new(MockSender::new()))
            .resume_store(Arc::new(MockStore::new()))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => assert_eq!(capability, "MediaSource"),
            other => panic!("expected CapabilityMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_requires_resume_store() {
        let result = SessionCollaborators::builder()
            .media_source(Arc::new(MockSource::new()))
            .beacon_sender(Arc::new(MockSender::new()))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "ResumePointStore"
        ));
    }

    #[test]
    fn test_builder_with_required_collaborators() {
        let collaborators = SessionCollaborators::builder()
            .media_source(Arc::new(MockSource::new()))
            .beacon_sender(Arc::new(MockSender::new()))
            .resume_store(Arc::new(MockStore::new()))
            .build()
            .unwrap();

        assert!(collaborators.tracker.is_none());
        assert!(collaborators.post_play.is_none());
        assert!(format!("{:?}", collaborators).contains("MediaSource { ... }"));
    }
}
