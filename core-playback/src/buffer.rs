//! # Buffer Monitor
//!
//! Converts load-progress reports of the active resource into a 0-100
//! buffer level and latches the first "ready to play" signal.
//!
//! ## Invariants
//!
//! - The level never decreases while the same resource stays attached.
//! - Once it reaches 100, load reports are ignored until [`BufferMonitor::reset`].
//! - [`BufferMonitor::on_ready`] returns `true` at most once per resource.

/// Full buffer level.
pub const FULL_BUFFER: u8 = 100;

#[derive(Debug, Clone)]
pub(crate) struct BufferMonitor {
    level: u8,
    first_ready_pending: bool,
    percent_per_second: u8,
}

impl BufferMonitor {
    pub(crate) fn new(percent_per_second: u8) -> Self {
        Self {
            level: 0,
            first_ready_pending: true,
            percent_per_second,
        }
    }

    /// Start tracking a newly attached resource.
    pub(crate) fn reset(&mut self) {
        self.level = 0;
        self.first_ready_pending = true;
    }

    pub(crate) fn level(&self) -> u8 {
        self.level
    }

    /// Record that the resource has loaded up to `secs` seconds.
    ///
    /// Returns the new level when it increased.
    pub(crate) fn on_loaded_until(&mut self, secs: f64) -> Option<u8> {
        if self.level >= FULL_BUFFER || !secs.is_finite() || secs <= 0.0 {
            return None;
        }

        let loaded = secs.floor().min(f64::from(FULL_BUFFER)) as u32;
        let level = (loaded * u32::from(self.percent_per_second)).min(u32::from(FULL_BUFFER)) as u8;
        if level > self.level {
            self.level = level;
            Some(level)
        } else {
            None
        }
    }

    /// Latch the first ready signal and fill the buffer.
    ///
    /// Returns `true` only for the first call after a reset.
    pub(crate) fn on_ready(&mut self) -> bool {
        if !self.first_ready_pending {
            return false;
        }
        self.first_ready_pending = false;
        self.level = FULL_BUFFER;
        true
    }
}
