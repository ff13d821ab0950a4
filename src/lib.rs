//! Session-wide hotkey detection and interception for macOS.
//!
//! This crate watches the OS event stream for one exact keyboard
//! combination (a set of modifier keys plus a single physical key), reports
//! whether it is currently fully held, and swallows the matching key events
//! before any other application sees them. It uses a privileged CGEventTap,
//! which requires the Accessibility trust permission; the permission
//! lifecycle is handled automatically, including re-creating the tap when
//! the user grants trust after an initial denial.
//!
//! # Features
//!
//! - **Exact-match state machine** - held keys and modifiers are tracked
//!   per event; any extra held key or modifier breaks the match
//! - **Swallow-on-match** - events are consumed exactly while the
//!   combination is fully held, and forwarded otherwise
//! - **Permission lifecycle** - a denied permission is reported once, then
//!   the tap is created automatically when trust is granted
//! - **Automatic cleanup** - the capture thread stops when the handle drops
//! - **Mockable core** - the lifecycle is generic over the permission gate
//!   and the tap, so it can be tested without the OS
//!
//! # Example
//!
//! ```ignore
//! use hotkey_interceptor::{parse_hotkey, HotkeyInterceptorBuilder};
//!
//! fn main() -> anyhow::Result<()> {
//!     let handle = HotkeyInterceptorBuilder::new()
//!         .hotkey(parse_hotkey("Cmd+Shift+Space")?)
//!         .prompt_when_denied(true)
//!         .on_match(|held| println!("combination held: {}", held))
//!         .on_error(|err| eprintln!("error: {}", err))
//!         .build()?
//!         .start()?;
//!
//!     std::thread::park();
//!     drop(handle); // stops the capture thread
//!     Ok(())
//! }
//! ```
//!
//! # Permission
//!
//! Interception requires Accessibility trust (System Settings > Privacy &
//! Security > Accessibility). Without it the error callback receives
//! [`HotkeyError::PermissionDenied`] and the interceptor waits; granting
//! the permission brings it up without a restart.

mod error;
mod event;
mod hotkey;
mod key;
mod manager;
mod modifiers;
mod state;

#[cfg(target_os = "macos")]
mod macos;

pub use error::HotkeyError;
pub use event::{KeyEvent, TapDecision};
pub use hotkey::{parse_hotkey, Hotkey};
pub use key::KeyCode;
pub use manager::{
    ErrorCallback, EventHandler, EventTap, HotkeyManager, Lifecycle, MatchCallback,
    PermissionGate, PERMISSION_SETTLE_DELAY,
};
pub use modifiers::ModifierMask;
pub use state::KeyTracker;

#[cfg(target_os = "macos")]
pub use macos::{
    open_accessibility_settings, AccessibilityGate, HotkeyInterceptor, HotkeyInterceptorBuilder,
    HotkeyInterceptorHandle, SessionTap,
};
