//! # Content Model
//!
//! What a session plays ([`ContentSelector`]) and what the media source
//! resolved it into ([`MediaItem`]).

use crate::time::PlaybackTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Selector
// ============================================================================

/// Size of scene-search thumbnails requested for on-demand content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailSize {
    Small,
    Medium,
    Large,
}

/// How the viewer arrived at the content. Reported with tracking logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayOrigin {
    #[default]
    NormalPlay,
    FromPostPlay,
    FromContinueWatching,
}

/// An on-demand title plus the browsing context it was opened from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnDemandContent {
    pub content_id: String,
    pub thumbnail_size: ThumbnailSize,
    pub play_status: PlayOrigin,
    pub genre: Option<String>,
    pub category: Option<String>,
    pub feature: Option<String>,
}

impl OnDemandContent {
    pub fn new(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            thumbnail_size: ThumbnailSize::Medium,
            play_status: PlayOrigin::NormalPlay,
            genre: None,
            category: None,
            feature: None,
        }
    }

    pub fn with_thumbnail_size(mut self, size: ThumbnailSize) -> Self {
        self.thumbnail_size = size;
        self
    }

    pub fn with_play_status(mut self, status: PlayOrigin) -> Self {
        self.play_status = status;
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = Some(feature.into());
        self
    }
}

/// What to play. Exactly one variant is active per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentSelector {
    OnDemand(OnDemandContent),
    Linear { channel_id: String },
    Live { live_id: String },
}

/// Variant tag of a [`ContentSelector`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    OnDemand,
    Linear,
    Live,
}

impl ContentSelector {
    pub fn on_demand(content_id: impl Into<String>) -> Self {
        ContentSelector::OnDemand(OnDemandContent::new(content_id))
    }

    pub fn linear(channel_id: impl Into<String>) -> Self {
        ContentSelector::Linear {
            channel_id: channel_id.into(),
        }
    }

    pub fn live(live_id: impl Into<String>) -> Self {
        ContentSelector::Live {
            live_id: live_id.into(),
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            ContentSelector::OnDemand(_) => ContentKind::OnDemand,
            ContentSelector::Linear { .. } => ContentKind::Linear,
            ContentSelector::Live { .. } => ContentKind::Live,
        }
    }

    /// Content, channel or live code identifying the selection.
    pub fn code(&self) -> &str {
        match self {
            ContentSelector::OnDemand(content) => &content.content_id,
            ContentSelector::Linear { channel_id } => channel_id,
            ContentSelector::Live { live_id } => live_id,
        }
    }

    pub fn is_on_demand(&self) -> bool {
        matches!(self, ContentSelector::OnDemand(_))
    }

    pub fn as_on_demand(&self) -> Option<&OnDemandContent> {
        match self {
            ContentSelector::OnDemand(content) => Some(content),
            ContentSelector::Linear { .. } | ContentSelector::Live { .. } => None,
        }
    }

    /// Tracking context reported with start/end logs.
    ///
    /// Browsing context (genre, category, feature) is only attributed to a
    /// normal play; resumed or post-play starts report none.
    pub fn tracking_data(&self) -> TrackingData {
        match self {
            ContentSelector::OnDemand(content) => {
                let normal = content.play_status == PlayOrigin::NormalPlay;
                TrackingData {
                    play_status: content.play_status,
                    genre: content.genre.clone().filter(|_| normal),
                    category: content.category.clone().filter(|_| normal),
                    feature: content.feature.clone().filter(|_| normal),
                }
            }
            ContentSelector::Linear { .. } | ContentSelector::Live { .. } => TrackingData::default(),
        }
    }
}

/// Browsing context attached to playback tracking logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingData {
    pub play_status: PlayOrigin,
    pub genre: Option<String>,
    pub category: Option<String>,
    pub feature: Option<String>,
}

// ============================================================================
// Resolved items
// ============================================================================

/// Audio track preference for on-demand content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    #[default]
    Dubbed,
    Subtitled,
}

/// Whether the resolved item streams from the network or plays a finished
/// download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    #[default]
    Streaming,
    Downloaded,
}

/// Episode metadata of an on-demand item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub code: String,
    /// Duration according to catalogue metadata.
    pub duration: PlaybackTime,
    /// Start of the end credits. Zero means unknown.
    pub endroll_position: PlaybackTime,
    /// Where the viewer left off last time.
    pub resume_point: Option<PlaybackTime>,
}

/// A playable item returned by [`MediaSource::resolve`](crate::traits::MediaSource::resolve).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Content, channel or live code.
    pub code: String,
    /// Opaque token identifying this playback to the beacon collector.
    pub play_token: String,
    /// Seconds between signal beacons. Zero or negative disables them.
    pub beacon_span_secs: i64,
    pub play_mode: PlayMode,
    /// Present for on-demand items only.
    pub episode: Option<EpisodeInfo>,
    /// Identifier of the rendition being played, reported in beacons.
    pub file_code: Option<String>,
    #[serde(default)]
    pub scene_search_urls: HashMap<ThumbnailSize, String>,
}

impl MediaItem {
    pub fn new(code: impl Into<String>, play_token: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            play_token: play_token.into(),
            beacon_span_secs: 0,
            play_mode: PlayMode::Streaming,
            episode: None,
            file_code: None,
            scene_search_urls: HashMap::new(),
        }
    }

    pub fn with_beacon_span(mut self, secs: i64) -> Self {
        self.beacon_span_secs = secs;
        self
    }

    pub fn with_play_mode(mut self, mode: PlayMode) -> Self {
        self.play_mode = mode;
        self
    }

    pub fn with_episode(mut self, episode: EpisodeInfo) -> Self {
        self.episode = Some(episode);
        self
    }

    pub fn with_file_code(mut self, file_code: impl Into<String>) -> Self {
        self.file_code = Some(file_code.into());
        self
    }

    pub fn with_scene_search_url(mut self, size: ThumbnailSize, url: impl Into<String>) -> Self {
        self.scene_search_urls.insert(size, url.into());
        self
    }

    pub fn resume_point(&self) -> Option<PlaybackTime> {
        self.episode.as_ref().and_then(|episode| episode.resume_point)
    }

    pub fn signal_interval_secs(&self) -> Option<u64> {
        u64::try_from(self.beacon_span_secs).ok().filter(|secs| *secs > 0)
    }
}

/// "Next content" suggestion shown at the end roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPlayInfo {
    pub next_content_id: String,
    pub title: Option<String>,
    /// The suggestion is already downloaded and can play offline.
    pub downloaded: bool,
}
