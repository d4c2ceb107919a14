//! # Position Tracking
//!
//! Position polling while playing, the position function used by every
//! reader of the current time, and the post-roll latch.

use crate::time::PlaybackTime;
use crate::timer::RepeatingTask;
use crate::traits::{RenderResource, ResourceStatus};
use std::time::Duration;

/// What the session is doing when the current time is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PositionPhase {
    /// A seek is in flight towards the (clamped) target.
    Seeking(PlaybackTime),
    /// Content played to its end. Carries the catalogue duration if known.
    Completed(Option<PlaybackTime>),
    Playing,
}

/// Current playback time.
///
/// `None` until the resource is ready. While seeking the seek target is
/// reported; after completion, the full duration.
pub(crate) fn current_time(
    resource: Option<&dyn RenderResource>,
    phase: PositionPhase,
) -> Option<PlaybackTime> {
    let resource = resource?;
    if resource.status() != ResourceStatus::ReadyToPlay {
        return None;
    }
    match phase {
        PositionPhase::Seeking(target) => Some(target),
        PositionPhase::Completed(duration) => duration.or_else(|| resource.duration()),
        PositionPhase::Playing => Some(resource.position()),
    }
}

/// Ensures the post-play prompt fires once per playback.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PostRollLatch {
    tripped: bool,
}

impl PostRollLatch {
    /// Trip the latch if `current` reached a known end roll.
    pub(crate) fn check(&mut self, current: PlaybackTime, endroll: PlaybackTime) -> bool {
        if endroll.is_zero() || current < endroll {
            return false;
        }
        self.trip()
    }

    /// Trip unconditionally. Returns `false` if already tripped.
    pub(crate) fn trip(&mut self) -> bool {
        !std::mem::replace(&mut self.tripped, true)
    }

    pub(crate) fn reset(&mut self) {
        self.tripped = false;
    }

    #[cfg(test)]
    pub(crate) fn is_tripped(&self) -> bool {
        self.tripped
    }
}

/// Fixed-period poller, running only while the session plays.
#[derive(Debug)]
pub(crate) struct PositionTracker {
    period: Duration,
    task: Option<RepeatingTask>,
}

impl PositionTracker {
    pub(crate) fn new(period: Duration) -> Self {
        Self { period, task: None }
    }

    /// (Re)start polling. `on_tick` returns `false` to stop.
    pub(crate) fn start<F>(&mut self, on_tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.task = Some(RepeatingTask::spawn("position", self.period, on_tick));
    }

    pub(crate) fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}
