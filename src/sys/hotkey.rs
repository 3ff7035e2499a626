//! Portable hotkey types.
//!
//! Key codes are macOS virtual key codes; every backend translates into them
//! so that configuration files stay the same across machines.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3;
    }
}

// Device-independent CGEventFlags bits.
const CG_FLAG_SHIFT: u64 = 0x0002_0000;
const CG_FLAG_CONTROL: u64 = 0x0004_0000;
const CG_FLAG_ALTERNATE: u64 = 0x0008_0000;
const CG_FLAG_COMMAND: u64 = 0x0010_0000;

impl Modifiers {
    pub fn from_cg_flags(bits: u64) -> Self {
        let mut mods = Modifiers::empty();
        mods.set(Modifiers::SHIFT, bits & CG_FLAG_SHIFT != 0);
        mods.set(Modifiers::CONTROL, bits & CG_FLAG_CONTROL != 0);
        mods.set(Modifiers::ALT, bits & CG_FLAG_ALTERNATE != 0);
        mods.set(Modifiers::META, bits & CG_FLAG_COMMAND != 0);
        mods
    }

    fn parse_one(token: &str) -> Option<Modifiers> {
        match token.to_ascii_lowercase().as_str() {
            "shift" => Some(Modifiers::SHIFT),
            "ctrl" | "control" => Some(Modifiers::CONTROL),
            "alt" | "opt" | "option" => Some(Modifiers::ALT),
            "cmd" | "command" | "meta" | "super" => Some(Modifiers::META),
            _ => None,
        }
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Modifiers::CONTROL, "Ctrl"),
            (Modifiers::ALT, "Alt"),
            (Modifiers::SHIFT, "Shift"),
            (Modifiers::META, "Cmd"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoPrimitive,
    TryFromPrimitive
)]
#[repr(u16)]
#[strum(ascii_case_insensitive)]
pub enum KeyCode {
    A = 0,
    S = 1,
    D = 2,
    F = 3,
    H = 4,
    G = 5,
    Z = 6,
    X = 7,
    C = 8,
    V = 9,
    B = 11,
    Q = 12,
    W = 13,
    E = 14,
    R = 15,
    Y = 16,
    T = 17,
    #[strum(to_string = "1")]
    Digit1 = 18,
    #[strum(to_string = "2")]
    Digit2 = 19,
    #[strum(to_string = "3")]
    Digit3 = 20,
    #[strum(to_string = "4")]
    Digit4 = 21,
    #[strum(to_string = "6")]
    Digit6 = 22,
    #[strum(to_string = "5")]
    Digit5 = 23,
    #[strum(to_string = "Equal", serialize = "=")]
    Equal = 24,
    #[strum(to_string = "9")]
    Digit9 = 25,
    #[strum(to_string = "7")]
    Digit7 = 26,
    #[strum(to_string = "Minus", serialize = "-")]
    Minus = 27,
    #[strum(to_string = "8")]
    Digit8 = 28,
    #[strum(to_string = "0")]
    Digit0 = 29,
    #[strum(to_string = "RightBracket", serialize = "]")]
    RightBracket = 30,
    O = 31,
    U = 32,
    #[strum(to_string = "LeftBracket", serialize = "[")]
    LeftBracket = 33,
    I = 34,
    P = 35,
    #[strum(to_string = "Return", serialize = "enter")]
    Return = 36,
    L = 37,
    J = 38,
    #[strum(to_string = "Quote", serialize = "'")]
    Quote = 39,
    K = 40,
    #[strum(to_string = "Semicolon", serialize = ";")]
    Semicolon = 41,
    #[strum(to_string = "Backslash", serialize = "\\")]
    Backslash = 42,
    #[strum(to_string = "Comma", serialize = ",")]
    Comma = 43,
    #[strum(to_string = "Slash", serialize = "/")]
    Slash = 44,
    N = 45,
    M = 46,
    #[strum(to_string = "Period", serialize = ".")]
    Period = 47,
    Tab = 48,
    Space = 49,
    #[strum(to_string = "Grave", serialize = "`", serialize = "backtick")]
    Grave = 50,
    #[strum(to_string = "Delete", serialize = "backspace")]
    Delete = 51,
    #[strum(to_string = "Escape", serialize = "esc")]
    Escape = 53,
    #[strum(to_string = "Left", serialize = "leftarrow")]
    LeftArrow = 123,
    #[strum(to_string = "Right", serialize = "rightarrow")]
    RightArrow = 124,
    #[strum(to_string = "Down", serialize = "downarrow")]
    DownArrow = 125,
    #[strum(to_string = "Up", serialize = "uparrow")]
    UpArrow = 126,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum HotkeyParseError {
    #[error("hotkey is empty")]
    Empty,
    #[error("unknown modifier `{0}`")]
    UnknownModifier(String),
    #[error("unknown key `{0}`")]
    UnknownKey(String),
    #[error("hotkey `{0}` has no modifier; a held modifier is required to drive the switcher")]
    MissingModifier(String),
}

/// A modifier+key combination such as `Alt+Tab`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub modifiers: Modifiers,
    pub key_code: KeyCode,
}

impl Hotkey {
    pub fn new(modifiers: Modifiers, key_code: KeyCode) -> Self { Self { modifiers, key_code } }

    /// The modifier that must stay held for a session to remain open.
    ///
    /// Shift is excluded because it only reverses direction, unless it is the
    /// only modifier on the hotkey.
    pub fn held_modifiers(&self) -> Modifiers {
        let held = self.modifiers - Modifiers::SHIFT;
        if held.is_empty() { self.modifiers } else { held }
    }
}

impl FromStr for Hotkey {
    type Err = HotkeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split('+').map(str::trim).collect();
        let Some((key, mods)) = tokens.split_last() else {
            return Err(HotkeyParseError::Empty);
        };
        if key.is_empty() {
            return Err(HotkeyParseError::Empty);
        }
        let mut modifiers = Modifiers::empty();
        for token in mods {
            modifiers |= Modifiers::parse_one(token)
                .ok_or_else(|| HotkeyParseError::UnknownModifier(token.to_string()))?;
        }
        let key_code =
            KeyCode::from_str(key).map_err(|_| HotkeyParseError::UnknownKey(key.to_string()))?;
        if modifiers.is_empty() {
            return Err(HotkeyParseError::MissingModifier(s.to_string()));
        }
        Ok(Hotkey { modifiers, key_code })
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.modifiers, self.key_code)
    }
}

impl Serialize for Hotkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hotkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifies a live registration with a [`HotkeyRegistrar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyId(pub u32);

#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey {0} is already registered by another process")]
    Conflict(Hotkey),
    #[error("hotkey registration failed: {0}")]
    Platform(String),
}

pub type HotkeyCallback = Box<dyn Fn() + Send + Sync>;

/// Registers process-scoped global hotkeys.
///
/// The callback carries no payload; whoever registers it knows what it means.
pub trait HotkeyRegistrar: Send {
    fn register(&mut self, hotkey: Hotkey, callback: HotkeyCallback)
    -> Result<HotkeyId, HotkeyError>;

    fn unregister(&mut self, id: HotkeyId);
}
