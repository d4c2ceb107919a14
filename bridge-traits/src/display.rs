//! Display & Output Route Abstraction
//!
//! Content protection rules forbid playback while the screen is mirrored to an
//! external display or recorded. The host reports those conditions through
//! [`ScreenGuard`]; the session controller checks it before setup and whenever
//! an output route changes.

/// Reason a screen policy check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenPolicyViolation {
    /// The display is mirrored to another screen.
    Mirroring,
    /// The screen is being recorded or captured.
    Capture,
}

/// Screen output inspection trait
///
/// # Platform Support
///
/// - **iOS**: `UIScreen.isCaptured`, connected screens, AirPlay route state
/// - **Android**: `Display` flags, `MediaProjection` callbacks
/// - **Desktop**: usually [`PermissiveScreenGuard`]
///
/// # Example
///
/// ```ignore
/// use bridge_traits::display::ScreenGuard;
///
/// fn may_start(guard: &dyn ScreenGuard) -> bool {
///     guard.check().is_ok()
/// }
/// ```
pub trait ScreenGuard: Send + Sync {
    /// Whether the main display is currently mirrored.
    fn is_mirroring(&self) -> bool;

    /// Whether the screen is currently being recorded or captured.
    fn is_captured(&self) -> bool;

    /// Whether playback is routed to an external device (e.g. AirPlay video).
    fn is_external_playback(&self) -> bool {
        false
    }

    /// Run both protection checks, mirroring first.
    fn check(&self) -> Result<(), ScreenPolicyViolation> {
        if self.is_mirroring() {
            Err(ScreenPolicyViolation::Mirroring)
        } else if self.is_captured() {
            Err(ScreenPolicyViolation::Capture)
        } else {
            Ok(())
        }
    }
}

/// Guard that never reports a violation. Suitable for hosts without
/// mirroring or capture APIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveScreenGuard;

impl ScreenGuard for PermissiveScreenGuard {
    fn is_mirroring(&self) -> bool {
        false
    }

    fn is_captured(&self) -> bool {
        false
    }
}
