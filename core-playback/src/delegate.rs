//! # Session Delegate
//!
//! Notifications produced by the session controller. At most one delegate
//! is registered at a time and the controller only holds a [`Weak`]
//! reference to it: dropping the last `Arc` unregisters it implicitly.
//!
//! Every callback is invoked from the controller task, one at a time, in
//! the order the session observed the underlying events.

use crate::content::PostPlayInfo;
use crate::error::PlaybackError;
use crate::time::PlaybackTime;
use crate::traits::{PresentationSurface, SceneSearchStatus};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// Coarse playback status reported through [`SessionDelegate::on_status_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayStatus {
    Play,
    Pause,
    Seeking,
    End,
}

/// Receiver of session lifecycle notifications.
///
/// All methods except [`on_target_surface_requested`](Self::on_target_surface_requested)
/// have empty default bodies so hosts implement only what they display.
pub trait SessionDelegate: Send + Sync {
    /// Supply the surface the next render resource is presented on.
    /// Returning `None` fails the attach with `NoPresentationSurface`.
    fn on_target_surface_requested(&self) -> Option<Arc<dyn PresentationSurface>>;

    /// Buffered share of the content, `0..=100`, non-decreasing per resource.
    fn on_buffer_level_changed(&self, _level: u8) {}

    fn on_refresh_starting(&self) {}

    /// The resource finished loading (or a refresh completed).
    fn on_ready(&self) {}

    fn on_position_updated(&self, _current: Option<PlaybackTime>, _duration: Option<PlaybackTime>) {}

    fn on_playback_completed(&self) {}

    fn on_error(&self, _error: &PlaybackError) {}

    /// The end roll was reached. Fires once per playback.
    fn on_post_play_reached(&self, _info: Option<&PostPlayInfo>) {}

    fn on_status_changed(&self, _status: PlayStatus) {}

    fn on_scene_search_file_status(&self, _status: SceneSearchStatus) {}
}

/// Non-owning registration slot for the delegate.
#[derive(Default)]
pub(crate) struct DelegateSlot {
    delegate: Option<Weak<dyn SessionDelegate>>,
}

impl DelegateSlot {
    pub(crate) fn set(&mut self, delegate: Weak<dyn SessionDelegate>) {
        self.delegate = Some(delegate);
    }

    pub(crate) fn clear(&mut self) {
        self.delegate = None;
    }

    /// Upgrade the registration for the duration of one callback.
    pub(crate) fn get(&self) -> Option<Arc<dyn SessionDelegate>> {
        self.delegate.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.get().is_some()
    }
}
