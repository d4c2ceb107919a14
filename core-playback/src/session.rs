//! # Session State
//!
//! Mutable state of one playback attempt, owned by the controller task.

use crate::beacon::BeaconScheduler;
use crate::binder::ResourceBinder;
use crate::buffer::BufferMonitor;
use crate::config::SessionConfig;
use crate::content::{AudioMode, ContentSelector, MediaItem, PlayMode, PostPlayInfo};
use crate::position::{self, PositionPhase, PositionTracker, PostRollLatch};
use crate::refresh::PlaylistRefresher;
use crate::time::PlaybackTime;
use crate::traits::{RenderResource, SceneSearchStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Preparing,
    Ready,
    Playing,
    Paused,
    Seeking,
    Completed,
    Error,
    Stopped,
}

impl SessionState {
    /// Returns `true` while a resource may be attached.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Preparing | Self::Ready | Self::Playing | Self::Paused | Self::Seeking | Self::Completed
        )
    }

    /// Returns `true` if the session ended and needs a new setup.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error | Self::Stopped)
    }
}

/// Read-only view of a session, published after every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub buffer_level: u8,
    pub current_time: Option<PlaybackTime>,
    pub duration: Option<PlaybackTime>,
    pub is_seeking: bool,
    pub is_stopped: bool,
    pub is_completed: bool,
    pub is_playing: bool,
    pub is_paused: bool,
    pub is_muted: bool,
    pub is_refreshing: bool,
    pub play_mode: Option<PlayMode>,
    pub audio_mode: AudioMode,
    pub has_scene_search_file: bool,
}

pub(crate) struct Session {
    pub state: SessionState,
    pub selector: Option<ContentSelector>,
    pub item: Option<MediaItem>,
    pub audio_mode: AudioMode,
    pub muted: bool,

    pub binder: ResourceBinder,
    pub buffer: BufferMonitor,
    pub position: PositionTracker,
    pub refresher: PlaylistRefresher,
    pub beacons: BeaconScheduler,
    pub post_roll: PostRollLatch,

    pub is_seeking: bool,
    pub is_stopped: bool,
    pub is_completed: bool,
    pub seek_target: PlaybackTime,
    /// Sequence number of the latest seek; older completions are ignored.
    pub seek_seq: u64,
    pub saved_position: PlaybackTime,
    /// `pause` flag of the last `play` call, restored after a stop-beacon refresh.
    pub last_pause_intent: bool,

    pub post_play_info: Option<PostPlayInfo>,
    pub scene_search: SceneSearchStatus,

    /// Bumped whenever outstanding background work must be discarded.
    pub generation: u64,
}

impl Session {
    pub(crate) fn new(config: &SessionConfig) -> Self {
        Self {
            state: SessionState::Idle,
            selector: None,
            item: None,
            audio_mode: config.default_audio_mode,
            muted: false,
            binder: ResourceBinder::new(),
            buffer: BufferMonitor::new(config.buffer_percent_per_second),
            position: PositionTracker::new(config.position_interval),
            refresher: PlaylistRefresher::new(config.refresh_retries, config.refresh_retry_delay),
            beacons: BeaconScheduler::new(),
            post_roll: PostRollLatch::default(),
            is_seeking: false,
            is_stopped: true,
            is_completed: false,
            seek_target: PlaybackTime::ZERO,
            seek_seq: 0,
            saved_position: PlaybackTime::ZERO,
            last_pause_intent: false,
            post_play_info: None,
            scene_search: SceneSearchStatus::NotStarted,
            generation: 0,
        }
    }

    /// Forget everything about the previous selection.
    pub(crate) fn reset_for_setup(&mut self) {
        self.item = None;
        self.saved_position = PlaybackTime::ZERO;
        self.is_stopped = false;
        self.is_completed = false;
        self.is_seeking = false;
        self.post_play_info = None;
        self.post_roll.reset();
        self.scene_search = SceneSearchStatus::NotStarted;
    }

    pub(crate) fn resource(&self) -> Option<&Arc<dyn RenderResource>> {
        self.binder.resource()
    }

    pub(crate) fn content_id(&self) -> String {
        self.selector
            .as_ref()
            .map(|selector| selector.code().to_string())
            .unwrap_or_default()
    }

    pub(crate) fn episode_duration(&self) -> Option<PlaybackTime> {
        self.item
            .as_ref()
            .and_then(|item| item.episode.as_ref())
            .map(|episode| episode.duration)
            .filter(|duration| !duration.is_zero())
    }

    pub(crate) fn endroll_position(&self) -> PlaybackTime {
        self.item
            .as_ref()
            .and_then(|item| item.episode.as_ref())
            .map(|episode| episode.endroll_position)
            .unwrap_or(PlaybackTime::ZERO)
    }

    pub(crate) fn current_time(&self) -> Option<PlaybackTime> {
        let phase = if self.is_seeking {
            PositionPhase::Seeking(self.seek_target)
        } else if self.is_completed {
            PositionPhase::Completed(self.episode_duration())
        } else {
            PositionPhase::Playing
        };
        position::current_time(self.resource().map(|resource| resource.as_ref()), phase)
    }

    pub(crate) fn duration(&self) -> Option<PlaybackTime> {
        self.resource()
            .and_then(|resource| resource.duration())
            .or_else(|| self.episode_duration())
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.resource().is_some_and(|resource| resource.rate() != 0.0)
    }

    pub(crate) fn is_streaming(&self) -> bool {
        self.item
            .as_ref()
            .map_or(true, |item| item.play_mode == PlayMode::Streaming)
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        let is_playing = self.is_playing();
        SessionSnapshot {
            state: self.state,
            buffer_level: self.buffer.level(),
            current_time: self.current_time(),
            duration: self.duration(),
            is_seeking: self.is_seeking,
            is_stopped: self.is_stopped,
            is_completed: self.is_completed,
            is_playing,
            is_paused: self.resource().is_some() && !is_playing,
            is_muted: self.muted,
            is_refreshing: self.refresher.is_refreshing(),
            play_mode: self.item.as_ref().map(|item| item.play_mode),
            audio_mode: self.audio_mode,
            has_scene_search_file: self.scene_search.is_available(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::EpisodeInfo;

    #[test]
    fn state_classification() {
        assert!(SessionState::Playing.is_active());
        assert!(SessionState::Preparing.is_active());
        assert!(!SessionState::Idle.is_active());
        assert!(!SessionState::Stopped.is_active());
        assert!(SessionState::Error.is_terminal());
        assert!(!SessionState::Completed.is_terminal());
    }

    #[test]
    fn fresh_session_snapshot() {
        let session = Session::new(&SessionConfig::default());
        let snapshot = session.snapshot();

        assert_eq!(snapshot.state, SessionState::Idle);
        assert_eq!(snapshot.current_time, None);
        assert!(snapshot.is_stopped);
        assert!(!snapshot.is_paused);
        assert_eq!(snapshot.audio_mode, AudioMode::Dubbed);
    }

    #[test]
    fn episode_metadata_accessors() {
        let mut session = Session::new(&SessionConfig::default());
        assert_eq!(session.endroll_position(), PlaybackTime::ZERO);
        assert!(session.is_streaming());

        session.selector = Some(ContentSelector::on_demand("SID42"));
        session.item = Some(MediaItem::new("SID42", "tkn").with_episode(EpisodeInfo {
            code: "EP1".into(),
            duration: PlaybackTime::from_secs(1_440),
            endroll_position: PlaybackTime::from_secs(1_350),
            resume_point: None,
        }));

        assert_eq!(session.content_id(), "SID42");
        assert_eq!(session.episode_duration(), Some(PlaybackTime::from_secs(1_440)));
        assert_eq!(session.endroll_position(), PlaybackTime::from_secs(1_350));
        assert_eq!(session.duration(), Some(PlaybackTime::from_secs(1_440)));
    }
}
