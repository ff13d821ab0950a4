//! Raw key transition events and the per-event swallow verdict.

use crate::key::KeyCode;
use crate::modifiers::ModifierMask;

/// A single key transition as seen by the interception tap.
///
/// Modifier keys do not produce `KeyDown`/`KeyUp`; the OS reports them as a
/// wholesale `ModifierChange` carrying the full modifier mask after the
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// A non-modifier key was pressed.
    KeyDown(KeyCode),
    /// A non-modifier key was released.
    KeyUp(KeyCode),
    /// The set of held modifiers changed; carries the new mask.
    ModifierChange(ModifierMask),
}

/// What the tap callback does with an event after processing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapDecision {
    /// Deliver the event to the rest of the system unmodified.
    Forward,
    /// Consume the event; no other application sees it.
    Swallow,
}
