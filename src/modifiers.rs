//! Modifier key mask, normalized to the recognized device-independent bits.

use anyhow::{anyhow, Result};

/// A set of held modifier keys, as a CGEventFlags-style bit mask.
///
/// Readings taken from the OS carry device-specific bits (left/right key
/// distinction, hardware flags); [`ModifierMask::recognized`] discards
/// everything outside the fixed recognized set so that masks compare
/// consistently across hardware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModifierMask(pub u64);

impl ModifierMask {
    // Device-independent CGEventFlags bits (NSEvent.ModifierFlags values).
    pub const CAPS_LOCK: ModifierMask = ModifierMask(0x0001_0000);
    pub const SHIFT: ModifierMask = ModifierMask(0x0002_0000);
    pub const CONTROL: ModifierMask = ModifierMask(0x0004_0000);
    pub const OPTION: ModifierMask = ModifierMask(0x0008_0000);
    pub const COMMAND: ModifierMask = ModifierMask(0x0010_0000);
    pub const FUNCTION: ModifierMask = ModifierMask(0x0080_0000);

    /// Union of all recognized modifier bits.
    pub const RECOGNIZED: ModifierMask = ModifierMask(
        Self::CAPS_LOCK.0
            | Self::SHIFT.0
            | Self::CONTROL.0
            | Self::OPTION.0
            | Self::COMMAND.0
            | Self::FUNCTION.0,
    );

    /// The empty mask (no modifiers held).
    pub const NONE: ModifierMask = ModifierMask(0);

    /// Build a mask from a raw CGEventFlags reading, keeping only the
    /// recognized bits.
    pub fn from_raw(flags: u64) -> Self {
        ModifierMask(flags).recognized()
    }

    /// Discard everything outside the recognized modifier set.
    pub fn recognized(self) -> Self {
        ModifierMask(self.0 & Self::RECOGNIZED.0)
    }

    /// Return this mask with the given modifier added.
    pub fn with(self, other: ModifierMask) -> Self {
        ModifierMask(self.0 | other.0)
    }

    /// Whether every bit of `other` is set in this mask.
    pub fn contains(self, other: ModifierMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse a single modifier name like "Cmd" or "Shift".
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "CMD" | "COMMAND" => Ok(Self::COMMAND),
            "SHIFT" => Ok(Self::SHIFT),
            "OPT" | "OPTION" | "ALT" => Ok(Self::OPTION),
            "CTRL" | "CONTROL" => Ok(Self::CONTROL),
            "FN" | "FUNCTION" => Ok(Self::FUNCTION),
            "CAPSLOCK" | "CAPS_LOCK" => Ok(Self::CAPS_LOCK),
            _ => Err(anyhow!("Unknown modifier: {}", s)),
        }
    }
}

impl std::fmt::Display for ModifierMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Self::CONTROL) {
            parts.push("Ctrl");
        }
        if self.contains(Self::OPTION) {
            parts.push("Opt");
        }
        if self.contains(Self::SHIFT) {
            parts.push("Shift");
        }
        if self.contains(Self::COMMAND) {
            parts.push("Cmd");
        }
        if self.contains(Self::FUNCTION) {
            parts.push("Fn");
        }
        if self.contains(Self::CAPS_LOCK) {
            parts.push("CapsLock");
        }
        write!(f, "{}", parts.join("+"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Left/right device bits from IOKit, present in raw flag readings.
    const NX_DEVICELCMDKEYMASK: u64 = 0x0000_0008;
    const NX_DEVICELSHIFTKEYMASK: u64 = 0x0000_0002;

    #[test]
    fn test_from_raw_discards_device_bits() {
        let raw = ModifierMask::COMMAND.0 | NX_DEVICELCMDKEYMASK;
        assert_eq!(ModifierMask::from_raw(raw), ModifierMask::COMMAND);
    }

    #[test]
    fn test_from_raw_keeps_recognized_combination() {
        let raw = ModifierMask::COMMAND.0
            | ModifierMask::SHIFT.0
            | NX_DEVICELCMDKEYMASK
            | NX_DEVICELSHIFTKEYMASK;
        let expected = ModifierMask::COMMAND.with(ModifierMask::SHIFT);
        assert_eq!(ModifierMask::from_raw(raw), expected);
    }

    #[test]
    fn test_exact_equality_is_order_free() {
        let a = ModifierMask::COMMAND.with(ModifierMask::SHIFT);
        let b = ModifierMask::SHIFT.with(ModifierMask::COMMAND);
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(ModifierMask::parse("Cmd").unwrap(), ModifierMask::COMMAND);
        assert_eq!(ModifierMask::parse("ALT").unwrap(), ModifierMask::OPTION);
        assert!(ModifierMask::parse("Hyper").is_err());
    }

    #[test]
    fn test_display() {
        let mask = ModifierMask::COMMAND.with(ModifierMask::SHIFT);
        assert_eq!(mask.to_string(), "Shift+Cmd");
        assert_eq!(ModifierMask::NONE.to_string(), "");
    }
}
