//! Physical key identification.

use anyhow::{anyhow, Result};

/// A macOS virtual key code identifying one physical key, independent of its
/// character mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const RETURN: KeyCode = KeyCode(36);
    pub const TAB: KeyCode = KeyCode(48);
    pub const SPACE: KeyCode = KeyCode(49);
    pub const DELETE: KeyCode = KeyCode(51);
    pub const ESCAPE: KeyCode = KeyCode(53);
    pub const F1: KeyCode = KeyCode(122);
    pub const F2: KeyCode = KeyCode(120);
    pub const F3: KeyCode = KeyCode(99);
    pub const F4: KeyCode = KeyCode(118);
    pub const F5: KeyCode = KeyCode(96);
    pub const F6: KeyCode = KeyCode(97);
    pub const F7: KeyCode = KeyCode(98);
    pub const F8: KeyCode = KeyCode(100);
    pub const F9: KeyCode = KeyCode(101);
    pub const F10: KeyCode = KeyCode(109);
    pub const F11: KeyCode = KeyCode(103);
    pub const F12: KeyCode = KeyCode(111);

    /// Parse a key from a name like "Space" or "F8", or a raw virtual key
    /// code like "49".
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "RETURN" | "ENTER" => Ok(KeyCode::RETURN),
            "TAB" => Ok(KeyCode::TAB),
            "SPACE" => Ok(KeyCode::SPACE),
            "DELETE" | "BACKSPACE" => Ok(KeyCode::DELETE),
            "ESCAPE" | "ESC" => Ok(KeyCode::ESCAPE),
            "F1" => Ok(KeyCode::F1),
            "F2" => Ok(KeyCode::F2),
            "F3" => Ok(KeyCode::F3),
            "F4" => Ok(KeyCode::F4),
            "F5" => Ok(KeyCode::F5),
            "F6" => Ok(KeyCode::F6),
            "F7" => Ok(KeyCode::F7),
            "F8" => Ok(KeyCode::F8),
            "F9" => Ok(KeyCode::F9),
            "F10" => Ok(KeyCode::F10),
            "F11" => Ok(KeyCode::F11),
            "F12" => Ok(KeyCode::F12),
            other => other
                .parse::<u16>()
                .map(KeyCode)
                .map_err(|_| anyhow!("Unknown key: {}", s)),
        }
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            KeyCode::RETURN => write!(f, "Return"),
            KeyCode::TAB => write!(f, "Tab"),
            KeyCode::SPACE => write!(f, "Space"),
            KeyCode::DELETE => write!(f, "Delete"),
            KeyCode::ESCAPE => write!(f, "Escape"),
            KeyCode::F1 => write!(f, "F1"),
            KeyCode::F2 => write!(f, "F2"),
            KeyCode::F3 => write!(f, "F3"),
            KeyCode::F4 => write!(f, "F4"),
            KeyCode::F5 => write!(f, "F5"),
            KeyCode::F6 => write!(f, "F6"),
            KeyCode::F7 => write!(f, "F7"),
            KeyCode::F8 => write!(f, "F8"),
            KeyCode::F9 => write!(f, "F9"),
            KeyCode::F10 => write!(f, "F10"),
            KeyCode::F11 => write!(f, "F11"),
            KeyCode::F12 => write!(f, "F12"),
            KeyCode(code) => write!(f, "{}", code),
        }
    }
}
