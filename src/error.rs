//! Error taxonomy delivered to the consumer's error sink.

use thiserror::Error;

/// Failures surfaced by the interception lifecycle.
///
/// These are delivered by value through the error callback; nothing unwinds
/// across the event tap boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HotkeyError {
    /// Accessibility permission is not granted. Recoverable: the manager
    /// re-checks whenever a permission-change notification arrives.
    #[error("accessibility permission not granted")]
    PermissionDenied,

    /// The event tap could not be created, or was disabled by the OS at
    /// runtime. Only a fresh permission grant reopens creation.
    #[error("failed to create keyboard event tap")]
    TapCreationFailed,
}
