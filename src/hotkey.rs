//! Target hotkey definition: one key plus an exact modifier set.

use crate::key::KeyCode;
use crate::modifiers::ModifierMask;
use anyhow::{anyhow, Result};

/// A hotkey consisting of a single physical key and an exact modifier mask.
///
/// Matching is exact-set: the combination is considered held only when the
/// key is the sole pressed key and the held modifiers equal `modifiers`
/// exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    pub key: KeyCode,
    pub modifiers: ModifierMask,
}

impl Hotkey {
    /// Create a new hotkey with no modifiers.
    pub fn new(key: KeyCode) -> Self {
        Self {
            key,
            modifiers: ModifierMask::NONE,
        }
    }

    /// Create a new hotkey with the given modifiers. The mask is normalized
    /// to the recognized modifier set.
    pub fn with_modifiers(key: KeyCode, modifiers: ModifierMask) -> Self {
        Self {
            key,
            modifiers: modifiers.recognized(),
        }
    }
}

impl Default for Hotkey {
    /// Command+Shift+Space.
    fn default() -> Self {
        Self::with_modifiers(
            KeyCode::SPACE,
            ModifierMask::COMMAND.with(ModifierMask::SHIFT),
        )
    }
}

impl std::fmt::Display for Hotkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.modifiers.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}+{}", self.modifiers, self.key)
        }
    }
}

/// Parse a hotkey string like "Cmd+Shift+Space" or "F10" into a [`Hotkey`].
pub fn parse_hotkey(s: &str) -> Result<Hotkey> {
    let parts: Vec<&str> = s.split('+').collect();

    if parts.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return Err(anyhow!("Malformed hotkey string: {:?}", s));
    }

    // Parse modifiers (all parts except the last one)
    let mut modifiers = ModifierMask::NONE;
    for part in &parts[..parts.len() - 1] {
        modifiers = modifiers.with(ModifierMask::parse(part)?);
    }

    // Parse the key (last part)
    let key = KeyCode::parse(parts[parts.len() - 1])?;

    Ok(Hotkey::with_modifiers(key, modifiers))
}
