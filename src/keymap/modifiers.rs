//! Modifier flags attached to a key mapping
//!
//! A key map stores modifiers as a 16-bit mask. Callers see them as an
//! ordered list of named flags, lowest bit first.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Every bit a modifier mask may carry
pub const VALID_MASK: u16 = 0x003F;

/// Single modifier flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u16)]
pub enum Modifier {
    LeftShift = 0x0001,
    RightShift = 0x0002,
    LeftAlt = 0x0004,
    RightAlt = 0x0008,
    LeftCtrl = 0x0010,
    RightCtrl = 0x0020,
}

/// All modifiers in ascending bit order
pub const ALL: [Modifier; 6] = [
    Modifier::LeftShift,
    Modifier::RightShift,
    Modifier::LeftAlt,
    Modifier::RightAlt,
    Modifier::LeftCtrl,
    Modifier::RightCtrl,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModifierError {
    #[error("Unknown modifier: '{0}'")]
    UnknownName(String),

    #[error("Unknown modifier value: {0:#x}")]
    UnknownValue(u64),

    #[error("Modifier mask {0:#06x} contains unsupported bits")]
    InvalidMask(u16),
}

impl Modifier {
    /// Bit this modifier occupies in a mask
    pub fn bit(self) -> u16 {
        self as u16
    }

    /// Lowercase wire name
    pub fn name(self) -> &'static str {
        match self {
            Modifier::LeftShift => "leftshift",
            Modifier::RightShift => "rightshift",
            Modifier::LeftAlt => "leftalt",
            Modifier::RightAlt => "rightalt",
            Modifier::LeftCtrl => "leftctrl",
            Modifier::RightCtrl => "rightctrl",
        }
    }

    /// Look a modifier up by its numeric constant
    pub fn from_value(value: u64) -> Result<Self, ModifierError> {
        ALL.iter()
            .copied()
            .find(|m| u64::from(m.bit()) == value)
            .ok_or(ModifierError::UnknownValue(value))
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Modifier {
    type Err = ModifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        ALL.iter()
            .copied()
            .find(|m| m.name() == lowered)
            .ok_or_else(|| ModifierError::UnknownName(s.to_string()))
    }
}

/// Expand a mask into its flags, scanning bits low to high.
pub fn expand(mask: u16) -> Result<Vec<Modifier>, ModifierError> {
    if mask & !VALID_MASK != 0 {
        return Err(ModifierError::InvalidMask(mask));
    }
    Ok(ALL.iter().copied().filter(|m| mask & m.bit() != 0).collect())
}

/// OR a sequence of flags into a mask.
pub fn reduce<I>(modifiers: I) -> u16
where
    I: IntoIterator<Item = Modifier>,
{
    modifiers.into_iter().fold(0, |mask, m| mask | m.bit())
}

/// Check that a mask only uses recognised bits
pub fn validate_mask(mask: u16) -> Result<u16, ModifierError> {
    if mask & !VALID_MASK != 0 {
        Err(ModifierError::InvalidMask(mask))
    } else {
        Ok(mask)
    }
}
