//! # Playback Session Module
//!
//! Drives a single media playback session from setup to teardown.
//!
//! ## Overview
//!
//! This module handles:
//! - Resolving a [`ContentSelector`] into a render resource through a [`MediaSource`]
//! - Owning exactly one active resource and its presentation surface
//! - Play, pause, resume, seek and stop with position and buffer reporting
//! - Playlist refresh with bounded retries and resume-position preservation
//! - Signal, interruption and stop beacons with resume-point persistence
//! - Post-play prompts, scene-search thumbnails and audio-mode switching
//!
//! ## Components
//!
//! | Component            | Role |
//! |----------------------|------|
//! | [`SessionController`] | Actor owning the session; the public API |
//! | `ResourceBinder`     | Attach/detach of the render resource and its observers |
//! | `BufferMonitor`      | 0-100 buffer level and the first-ready latch |
//! | `PositionTracker`    | Position polling while playing; post-roll latch |
//! | `PlaylistRefresher`  | Bounded retry state for playlist refreshes |
//! | `BeaconScheduler`    | Beacon planning and the signal timer |
//!
//! Hosts provide the collaborator traits in [`traits`] and receive
//! notifications through [`SessionDelegate`].

pub mod config;
pub mod content;
pub mod controller;
pub mod delegate;
pub mod error;
pub mod refresh;
pub mod session;
pub mod time;
pub mod traits;

mod beacon;
mod binder;
mod buffer;
mod position;
mod timer;

pub use buffer::FULL_BUFFER;
pub use config::{SessionCollaborators, SessionCollaboratorsBuilder, SessionConfig};
pub use content::{
    AudioMode, ContentKind, ContentSelector, EpisodeInfo, MediaItem, OnDemandContent, PlayMode,
    PlayOrigin, PostPlayInfo, ThumbnailSize, TrackingData,
};
pub use controller::{EnvironmentEvent, SessionController, Thumbnail};
pub use delegate::{PlayStatus, SessionDelegate};
pub use error::{BeaconError, MediaError, PlaybackError, Result};
pub use refresh::RefreshRequest;
pub use session::{SessionSnapshot, SessionState};
pub use time::PlaybackTime;
pub use traits::{
    BeaconPayload, BeaconSender, MediaSource, PlaybackLog, PlaybackTracker, PostPlaySource,
    PresentationSurface, RenderResource, ResolveRequest, ResourceEvent, ResourceStatus,
    ResumePointReport, ResumePointStore, ResumePointUpdate, SceneSearchSource, SceneSearchStatus,
};
