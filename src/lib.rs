//! Workspace umbrella crate.
//!
//! Host applications can depend on `playback-workspace` alone and reach the
//! session controller, the runtime infrastructure and the platform bridge
//! traits through these re-exports.

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;
