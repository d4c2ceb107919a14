//! # Beacon Scheduler
//!
//! Decides what each beacon firing reports and persists, and runs the
//! periodic signal timer.
//!
//! ## Beacon Kinds
//!
//! | Kind           | Fired on                         | Position            |
//! |----------------|----------------------------------|---------------------|
//! | `Signal`       | every `beacon_span_secs` seconds | current time        |
//! | `Interruption` | pause, external interruption     | current time        |
//! | `Stop`         | stop                             | saved position, clamped to duration |
//!
//! Planning is pure: [`BeaconScheduler::plan`] turns a [`BeaconContext`]
//! into a [`BeaconPlan`] and the controller performs the side effects.

use crate::content::{ContentSelector, MediaItem, PlayMode};
use crate::time::PlaybackTime;
use crate::timer::RepeatingTask;
use crate::traits::{BeaconPayload, ResumePointReport, ResumePointUpdate};
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BeaconKind {
    Signal,
    Interruption,
    Stop,
}

impl BeaconKind {
    pub(crate) fn event_kind(self) -> core_runtime::BeaconKind {
        match self {
            BeaconKind::Signal => core_runtime::BeaconKind::Signal,
            BeaconKind::Interruption => core_runtime::BeaconKind::Interruption,
            BeaconKind::Stop => core_runtime::BeaconKind::Stop,
        }
    }
}

/// Session facts a beacon is planned from.
#[derive(Debug, Clone)]
pub(crate) struct BeaconContext<'a> {
    pub kind: BeaconKind,
    pub selector: &'a ContentSelector,
    pub item: &'a MediaItem,
    pub current_time: Option<PlaybackTime>,
    pub saved_position: PlaybackTime,
    pub completed: bool,
    pub now: DateTime<Utc>,
}

/// Network request to perform for one beacon firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BeaconDispatch {
    Signal(BeaconPayload),
    Interruption(BeaconPayload),
    Stop { payload: BeaconPayload, completed: bool },
    ResumePoint(ResumePointReport),
}

impl BeaconDispatch {
    pub(crate) fn event_kind(&self) -> core_runtime::BeaconKind {
        match self {
            BeaconDispatch::Signal(_) => core_runtime::BeaconKind::Signal,
            BeaconDispatch::Interruption(_) => core_runtime::BeaconKind::Interruption,
            BeaconDispatch::Stop { .. } => core_runtime::BeaconKind::Stop,
            BeaconDispatch::ResumePoint(_) => core_runtime::BeaconKind::ResumePoint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BeaconPlan {
    /// Position reported by the beacon.
    pub position: PlaybackTime,
    pub resume_update: Option<ResumePointUpdate>,
    pub dispatch: Option<BeaconDispatch>,
}

#[derive(Debug, Default)]
pub(crate) struct BeaconScheduler {
    signal: Option<RepeatingTask>,
}

impl BeaconScheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn plan(ctx: &BeaconContext<'_>) -> BeaconPlan {
        let episode = ctx.item.episode.as_ref();

        let position = match ctx.kind {
            BeaconKind::Stop => match episode {
                Some(episode) if !episode.duration.is_zero() => {
                    ctx.saved_position.min(episode.duration)
                }
                _ => ctx.saved_position,
            },
            BeaconKind::Signal | BeaconKind::Interruption => {
                ctx.current_time.unwrap_or(PlaybackTime::ZERO)
            }
        };

        let resume_update = match (ctx.selector, episode) {
            (ContentSelector::OnDemand(_), Some(episode)) => {
                let past_endroll =
                    !episode.endroll_position.is_zero() && position > episode.endroll_position;
                Some(ResumePointUpdate {
                    episode_code: episode.code.clone(),
                    position: if past_endroll { PlaybackTime::ZERO } else { position },
                    completed: ctx.completed,
                    play_mode: ctx.item.play_mode,
                })
            }
            _ => None,
        };

        let dispatch = match ctx.item.play_mode {
            PlayMode::Downloaded => match (ctx.kind, &resume_update) {
                (BeaconKind::Stop, Some(update)) => Some(BeaconDispatch::ResumePoint(ResumePointReport {
                    episode_code: update.episode_code.clone(),
                    resume_point: update.position,
                    completed: ctx.completed,
                    viewed_at: ctx.now,
                    play_mode: PlayMode::Downloaded,
                })),
                _ => None,
            },
            PlayMode::Streaming => {
                let payload = Self::payload(ctx.selector, ctx.item, position);
                Some(match ctx.kind {
                    BeaconKind::Signal => BeaconDispatch::Signal(payload),
                    BeaconKind::Interruption => BeaconDispatch::Interruption(payload),
                    BeaconKind::Stop => BeaconDispatch::Stop {
                        payload,
                        completed: ctx.completed,
                    },
                })
            }
        };

        BeaconPlan {
            position,
            resume_update,
            dispatch,
        }
    }

    fn payload(selector: &ContentSelector, item: &MediaItem, position: PlaybackTime) -> BeaconPayload {
        let play_token = item.play_token.clone();
        match selector {
            ContentSelector::OnDemand(_) => BeaconPayload::OnDemand {
                play_token,
                file_code: item.file_code.clone(),
                play_time: position,
            },
            ContentSelector::Linear { .. } => BeaconPayload::Linear { play_token },
            ContentSelector::Live { .. } => BeaconPayload::Live { play_token },
        }
    }

    /// Start the signal timer for `item`. Does nothing when its beacon
    /// span disables signals.
    pub(crate) fn start_signal<F>(&mut self, item: &MediaItem, on_tick: F) -> bool
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.stop_signal();
        let Some(secs) = item.signal_interval_secs() else {
            return false;
        };
        self.signal = Some(RepeatingTask::spawn(
            "signal_beacon",
            Duration::from_secs(secs),
            on_tick,
        ));
        true
    }

    pub(crate) fn stop_signal(&mut self) {
        if let Some(task) = self.signal.take() {
            task.cancel();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_signal_running(&self) -> bool {
        self.signal.is_some()
    }
}
