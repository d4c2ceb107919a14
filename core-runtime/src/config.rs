//! # Core Configuration Module
//!
//! Holds the host bridges and settings shared by every playback session.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance. It enforces fail-fast validation so that a host that forgets a
//! required bridge finds out at startup, not when the user presses play.
//!
//! ## Required Dependencies
//!
//! - `ScreenGuard` - Required for content protection checks
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `Clock` - Wall clock for report timestamps (default: `SystemClock`)
//! - `NetworkMonitor` - Connectivity detection (optional)
//! - `EventBus` - Shared event bus (default: a fresh bus)
//!
//! ## Usage
//!
//! ```
//! use bridge_traits::PermissiveScreenGuard;
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .screen_guard(Arc::new(PermissiveScreenGuard))
//!     .build()
//!     .expect("Failed to build config");
//! assert!(config.features.allow_external_playback);
//! ```
//!
//! ## Error Handling
//!
//! The builder names the missing capability and how to provide it:
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing screen guard");
//! ```

use crate::error::{Error, Result};
use crate::events::{EventBus, DEFAULT_EVENT_BUFFER_SIZE};
use bridge_traits::{Clock, NetworkMonitor, ScreenGuard, SystemClock};
use std::sync::Arc;

/// Core configuration shared by playback sessions.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Mirroring and screen capture detection (required)
    pub screen_guard: Arc<dyn ScreenGuard>,

    /// Wall clock used to stamp reports that leave the device
    pub clock: Arc<dyn Clock>,

    /// Network connectivity monitor (optional)
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    /// Bus on which session events are mirrored
    pub event_bus: EventBus,

    /// Features flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("screen_guard", &"ScreenGuard { ... }")
            .field("clock", &"Clock { ... }")
            .field(
                "network_monitor",
                &self
                    .network_monitor
                    .as_ref()
                    .map(|_| "NetworkMonitor { ... }"),
            )
            .field("event_bus", &self.event_bus)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Let render resources play on external routes (AirPlay, Cast).
    pub allow_external_playback: bool,

    /// Surface an empty playback buffer while offline as a connection
    /// failure (requires NetworkMonitor).
    pub enable_network_awareness: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            allow_external_playback: true,
            enable_network_awareness: false,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates feature flags against the injected bridges.
    pub fn validate(&self) -> Result<()> {
        if self.features.enable_network_awareness && self.network_monitor.is_none() {
            return Err(Error::Config(
                "Network awareness enabled but no NetworkMonitor provided. \
                 Disable the feature or inject a NetworkMonitor implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn screen_guard_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "ScreenGuard".to_string(),
        message: "ScreenGuard implementation is required for content protection. \
                 iOS: report UIScreen capture and mirroring state. \
                 Android: report Display flags and MediaProjection state. \
                 Desktop: inject PermissiveScreenGuard."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    screen_guard: Option<Arc<dyn ScreenGuard>>,
    clock: Option<Arc<dyn Clock>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    event_bus: Option<EventBus>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the screen guard implementation (required).
    ///
    /// # Examples
    ///
    /// ```
    /// use bridge_traits::PermissiveScreenGuard;
    /// use core_runtime::config::CoreConfig;
    /// use std::sync::Arc;
    ///
    /// let builder = CoreConfig::builder()
    ///     .screen_guard(Arc::new(PermissiveScreenGuard));
    /// ```
    pub fn screen_guard(mut self, guard: Arc<dyn ScreenGuard>) -> Self {
        self.screen_guard = Some(guard);
        self
    }

    /// Sets the wall clock. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the network monitor implementation (optional).
    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    /// Shares an existing event bus instead of creating one.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Buffer size of the event bus created by `build()`.
    ///
    /// Ignored when a bus is supplied through [`event_bus`](Self::event_bus).
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Enables or disables playback on external routes.
    ///
    /// Default: true
    pub fn allow_external_playback(mut self, enabled: bool) -> Self {
        self.features.allow_external_playback = enabled;
        self
    }

    /// Enables or disables network awareness.
    ///
    /// Requires a `NetworkMonitor` to be provided.
    ///
    /// Default: false
    pub fn enable_network_awareness(mut self, enabled: bool) -> Self {
        self.features.enable_network_awareness = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - The screen guard is missing
    /// - The event buffer size is zero
    /// - Feature flags are inconsistent with available bridges
    pub fn build(self) -> Result<CoreConfig> {
        let screen_guard = self.screen_guard.ok_or_else(screen_guard_missing_error)?;

        let event_bus = match self.event_bus {
            Some(bus) => bus,
            None => {
                let size = self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE);
                if size == 0 {
                    return Err(Error::Config(
                        "Event buffer size must be greater than 0".to_string(),
                    ));
                }
                EventBus::new(size)
            }
        };

        let config = CoreConfig {
            screen_guard,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            network_monitor: self.network_monitor,
            event_bus,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
