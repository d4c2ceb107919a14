//! # Event Bus System
//!
//! Broadcasts session lifecycle events to any number of observers using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The session controller talks to exactly one delegate. Everything else that
//! wants to follow playback (diagnostics overlays, analytics bridges, tests)
//! subscribes here instead. Events are mirrors of the delegate notifications
//! plus beacon outcomes, which the delegate never sees.
//!
//! ```text
//! ┌────────────────────┐    emit     ┌──────────┐   subscribe   ┌────────────┐
//! │ Session controller ├────────────>│ EventBus ├──────────────>│ Subscriber │
//! └────────────────────┘             │(broadcast├──────────────>│ Subscriber │
//!                                    └──────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Paused {
//!     content_id: "SID0042".to_string(),
//!     position_ms: 12_000,
//! }))
//! .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Playback paused");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it may continue.
//! - **`RecvError::Closed`**: every sender is gone; the session was released.
//!
//! Emitting with no subscribers returns `Err`, which publishers ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session lifecycle events
    Playback(PlaybackEvent),
    /// Tracking beacon outcomes
    Beacon(BeaconEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Beacon(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::RefreshFailed { .. }) => EventSeverity::Error,
            CoreEvent::Beacon(BeaconEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::RefreshStarted { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Prepared { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Session lifecycle events.
///
/// `content_id` is the on-demand content code, channel code or live code of the
/// session's selector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A render resource became ready to play.
    Prepared {
        content_id: String,
        /// Total duration if the resource knows it (milliseconds).
        duration_ms: Option<u64>,
    },
    /// Playback started (or was armed paused) after a `play` request.
    Started { content_id: String, position_ms: u64 },
    Paused { content_id: String, position_ms: u64 },
    Resumed { content_id: String, position_ms: u64 },
    /// A seek finished at the given position.
    Seeked { content_id: String, position_ms: u64 },
    /// The session was stopped and its resource released.
    Stopped { content_id: String, position_ms: u64 },
    /// Content played to its end.
    Completed { content_id: String },
    /// The playlist is being re-resolved.
    RefreshStarted { content_id: String },
    /// A playlist refresh gave up after exhausting its retries.
    RefreshFailed { content_id: String, message: String },
    /// Unrecoverable session error reported to the delegate.
    Error {
        content_id: Option<String>,
        message: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Prepared { .. } => "Playback prepared",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Seeked { .. } => "Seek finished",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Playback completed",
            PlaybackEvent::RefreshStarted { .. } => "Playlist refresh started",
            PlaybackEvent::RefreshFailed { .. } => "Playlist refresh failed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Beacon Events
// ============================================================================

/// Kind of tracking beacon, mirrored for observers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BeaconKind {
    Signal,
    Interruption,
    Stop,
    ResumePoint,
}

/// Outcome of a beacon send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum BeaconEvent {
    Sent {
        kind: BeaconKind,
        content_id: String,
        /// Reported position for on-demand beacons (milliseconds).
        position_ms: Option<u64>,
    },
    Failed {
        kind: BeaconKind,
        content_id: String,
        reason: String,
    },
    /// The resume point persisted alongside a beacon.
    ResumePointSaved {
        content_id: String,
        position_ms: u64,
        completed: bool,
    },
}

impl BeaconEvent {
    fn description(&self) -> &str {
        match self {
            BeaconEvent::Sent { .. } => "Beacon sent",
            BeaconEvent::Failed { .. } => "Beacon failed",
            BeaconEvent::ResumePointSaved { .. } => "Resume point saved",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; all clones feed the same subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let beacons_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Beacon(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns the next buffered matching event without waiting.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
