//! # Playlist Refresher
//!
//! Bookkeeping for re-resolving the playlist after a transient failure.
//! The refresher holds no tasks itself; the controller drives the
//! attempts and asks it what to do after each failure.
//!
//! ```text
//! begin ──> attempt ──ok──> complete
//!             │
//!             └─err──> on_attempt_failed ──Retry(delay)──> attempt
//!                                          └─GiveUp──────> error
//! ```

use crate::time::PlaybackTime;
use std::time::Duration;

/// What to restore once the refreshed resource is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRequest {
    /// Position to resume at. `None` plays linear/live content from the
    /// live edge and on-demand content from its resume point.
    pub resume_time: Option<PlaybackTime>,
    pub should_pause: bool,
}

/// Bounded retry state of one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    attempts_remaining: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub(crate) fn new(retries: u32, delay: Duration) -> Self {
        Self {
            attempts_remaining: retries,
            delay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

#[derive(Debug, Clone, Copy)]
struct PendingRefresh {
    request: RefreshRequest,
    retry: RetryPolicy,
}

#[derive(Debug)]
pub(crate) struct PlaylistRefresher {
    retries: u32,
    delay: Duration,
    pending: Option<PendingRefresh>,
}

impl PlaylistRefresher {
    pub(crate) fn new(retries: u32, delay: Duration) -> Self {
        Self {
            retries,
            delay,
            pending: None,
        }
    }

    /// Start a refresh. Returns `false` if one is already in flight.
    pub(crate) fn begin(&mut self, request: RefreshRequest) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(PendingRefresh {
            request,
            retry: RetryPolicy::new(self.retries, self.delay),
        });
        true
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn pending(&self) -> Option<RefreshRequest> {
        self.pending.map(|pending| pending.request)
    }

    /// Consume one retry. Clears the refresh when none are left.
    pub(crate) fn on_attempt_failed(&mut self) -> RetryDecision {
        let Some(pending) = self.pending.as_mut() else {
            return RetryDecision::GiveUp;
        };
        if pending.retry.attempts_remaining == 0 {
            self.pending = None;
            return RetryDecision::GiveUp;
        }
        pending.retry.attempts_remaining -= 1;
        RetryDecision::Retry(pending.retry.delay)
    }

    /// Finish the refresh, returning what it was asked to restore.
    pub(crate) fn complete(&mut self) -> Option<RefreshRequest> {
        self.pending.take().map(|pending| pending.request)
    }

    pub(crate) fn cancel(&mut self) {
        self.pending = None;
    }
}
