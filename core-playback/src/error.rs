//! # Playback Error Types
//!
//! Errors reported by the session controller, its collaborators and the
//! beacon collector.

use thiserror::Error;

/// Failure reported by a [`MediaSource`](crate::traits::MediaSource).
///
/// Messages are already localized by the source and are passed to the
/// delegate untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The playlist or license server could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The license check rejected playback.
    #[error("License error: {0}")]
    License(String),

    /// The content is not (or no longer) available to this viewer.
    #[error("Content unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

impl MediaError {
    pub fn is_network_error(&self) -> bool {
        matches!(self, MediaError::Network(_))
    }
}

/// Failure reported by a [`BeaconSender`](crate::traits::BeaconSender).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BeaconError {
    /// The play token behind the playlist URL expired; the playlist must be
    /// resolved again.
    #[error("Playlist URL needs refresh")]
    NeedsPlaylistRefresh,

    #[error("Beacon transport error: {0}")]
    Transport(String),
}

/// Errors that can occur during a playback session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    // ========================================================================
    // Setup Guards
    // ========================================================================
    /// No delegate is registered with the controller.
    #[error("No delegate registered")]
    NoDelegate,

    /// The screen is mirrored to an external display.
    #[error("Screen mirroring is not supported")]
    MirroringNotSupported,

    /// The screen is being recorded or captured.
    #[error("Screen recording is not allowed")]
    ScreenRecordingNotAllowed,

    /// The delegate did not supply a presentation surface.
    #[error("No presentation surface available")]
    NoPresentationSurface,

    // ========================================================================
    // Playback Failures
    // ========================================================================
    /// The network is unavailable while streaming.
    #[error("Connection failed")]
    ConnectionFailed,

    /// Playback failed for an unspecified reason.
    #[error("Unknown playback error")]
    Unknown,

    /// Beacon-only signal that the playlist must be re-resolved.
    ///
    /// Recovered internally and never reported to the delegate.
    #[error("Playlist URL needs refresh")]
    NeedsPlaylistRefresh,

    /// An external playback route (AirPlay, Cast) forcibly ended playback.
    #[error("External playback ended")]
    ExternalPlaybackEnded,

    /// The operation needs an on-demand title but none is selected.
    #[error("No content selected")]
    NoContent,

    /// Failure passed through from the media source.
    #[error(transparent)]
    Media(#[from] MediaError),

    // ========================================================================
    // Controller Lifecycle
    // ========================================================================
    /// A later setup, stop or release invalidated this pending operation.
    #[error("Operation superseded by a newer request")]
    Superseded,

    /// The controller task has shut down.
    #[error("Playback controller is closed")]
    ControllerClosed,
}

impl PlaybackError {
    /// Returns `false` for errors that are recovered internally.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, PlaybackError::NeedsPlaylistRefresh)
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        match self {
            PlaybackError::ConnectionFailed => true,
            PlaybackError::Media(media) => media.is_network_error(),
            _ => false,
        }
    }

    /// Maps the last error of an exhausted playlist refresh to the error
    /// reported to the delegate.
    pub fn escalate_refresh_failure(error: &PlaybackError) -> PlaybackError {
        if error.is_network_error() {
            PlaybackError::ConnectionFailed
        } else {
            PlaybackError::Unknown
        }
    }
}

impl From<BeaconError> for PlaybackError {
    fn from(error: BeaconError) -> Self {
        match error {
            BeaconError::NeedsPlaylistRefresh => PlaybackError::NeedsPlaylistRefresh,
            BeaconError::Transport(_) => PlaybackError::Unknown,
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_signal_is_not_user_visible() {
        assert!(!PlaybackError::NeedsPlaylistRefresh.is_user_visible());
        assert!(PlaybackError::ConnectionFailed.is_user_visible());
        assert!(PlaybackError::Media(MediaError::License("expired".into())).is_user_visible());
    }

    #[test]
    fn exhausted_refresh_escalation() {
        let network = PlaybackError::Media(MediaError::Network("timeout".into()));
        let license = PlaybackError::Media(MediaError::License("denied".into()));

        assert_eq!(
            PlaybackError::escalate_refresh_failure(&network),
            PlaybackError::ConnectionFailed
        );
        assert_eq!(
            PlaybackError::escalate_refresh_failure(&license),
            PlaybackError::Unknown
        );
        assert_eq!(
            PlaybackError::escalate_refresh_failure(&PlaybackError::NoPresentationSurface),
            PlaybackError::Unknown
        );
    }

    #[test]
    fn media_errors_display_their_message() {
        let error = PlaybackError::from(MediaError::Other("この作品は再生できません".into()));
        assert_eq!(error.to_string(), "この作品は再生できません");
    }

    #[test]
    fn beacon_error_conversion() {
        assert_eq!(
            PlaybackError::from(BeaconError::NeedsPlaylistRefresh),
            PlaybackError::NeedsPlaylistRefresh
        );
    }
}
