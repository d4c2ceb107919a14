//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the playback crates:
//! - Logging and tracing setup
//! - Configuration of host bridges
//! - Event bus for session observers
//!
//! ## Overview
//!
//! Nothing in here knows about render resources or beacons. It establishes
//! the logging conventions, the fail-fast configuration pattern and the
//! broadcast mechanism that `core-playback` builds on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, FeatureFlags};
pub use error::{Error, Result};
pub use events::{BeaconEvent, BeaconKind, CoreEvent, EventBus, EventStream, PlaybackEvent};
