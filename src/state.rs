//! Held-key tracking and exact-match decision for the target hotkey.

use crate::event::KeyEvent;
use crate::hotkey::Hotkey;
use crate::key::KeyCode;
use crate::modifiers::ModifierMask;
use std::collections::HashSet;

/// Tracks the set of currently-pressed keys and the current modifier mask,
/// and decides after every event whether the target combination is exactly
/// held.
///
/// The tracker is pure state: it performs no I/O and allocates only when a
/// previously-unseen key is pressed, so it is safe to drive from an event
/// tap callback.
pub struct KeyTracker {
    target: Hotkey,
    held: HashSet<KeyCode>,
    modifiers: ModifierMask,
}

impl KeyTracker {
    /// Create a tracker for the given target combination.
    pub fn new(target: Hotkey) -> Self {
        Self {
            target: Hotkey::with_modifiers(target.key, target.modifiers),
            held: HashSet::new(),
            modifiers: ModifierMask::NONE,
        }
    }

    /// Apply one key transition and return whether the target combination is
    /// exactly held afterwards.
    ///
    /// The match value is computed and returned for every event, not only
    /// when it changes.
    pub fn apply(&mut self, event: KeyEvent) -> bool {
        match event {
            KeyEvent::KeyDown(code) => {
                self.held.insert(code);
            }
            KeyEvent::KeyUp(code) => {
                self.held.remove(&code);
            }
            KeyEvent::ModifierChange(mask) => {
                self.modifiers = mask.recognized();
            }
        }
        self.is_match()
    }

    /// Exact-set match: the target key is the only held key and the held
    /// modifiers equal the target modifiers bit-for-bit.
    pub fn is_match(&self) -> bool {
        self.held.len() == 1
            && self.held.contains(&self.target.key)
            && self.modifiers == self.target.modifiers
    }

    /// The combination this tracker watches for.
    pub fn target(&self) -> Hotkey {
        self.target
    }
}
