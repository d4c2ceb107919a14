//! # Host Bridge Traits
//!
//! Platform capabilities that the playback core consumes but cannot implement
//! itself. Each host (iOS, Android, desktop) ships adapters for these traits and
//! hands them to `core_runtime::CoreConfig`.
//!
//! ## Traits
//!
//! ### Display & Output Routing
//! - [`ScreenGuard`](display::ScreenGuard) - Mirroring, screen capture and
//!   external playback route detection
//!
//! ### Connectivity
//! - [`NetworkMonitor`](network::NetworkMonitor) - Online/offline and metered
//!   connection detection
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Wall-clock source for timestamps (deterministic in tests)
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! Required bridges are validated when the core configuration is built, so a
//! host that forgets to inject a capability fails at startup instead of at the
//! first playback attempt:
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .screen_guard(Arc::new(MyScreenGuard))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! Fallible bridge calls return [`BridgeError`](error::BridgeError). Adapters
//! should convert platform errors into it with an actionable message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`: the session controller queries them
//! from its own task and from background work it spawns.

pub mod display;
pub mod error;
pub mod network;
pub mod time;

pub use error::BridgeError;

pub use display::{PermissiveScreenGuard, ScreenGuard, ScreenPolicyViolation};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
