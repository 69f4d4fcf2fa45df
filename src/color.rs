use crate::error::PetError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Preset coat colors the host can cycle through.
pub(crate) const PRESETS: &[&str] = &[
    "#7EC8E3", "#FFB347", "#B19CD9", "#77DD77", "#FF6961", "#FDFD96", "#F49AC2",
];

/// Coat color, stored in save files as a hex string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub(crate) struct PetColor {
    pub(crate) a: u8,
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

impl Default for PetColor {
    fn default() -> Self {
        Self::rgb(0x7E, 0xC8, 0xE3)
    }
}

impl PetColor {
    pub(crate) const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { a: 0xFF, r, g, b }
    }

    /// Multiply the channels, for shading.
    pub(crate) fn scaled(self, k: f32) -> Self {
        let f = |c: u8| ((c as f32 * k).clamp(0.0, 255.0)) as u8;
        Self {
            a: self.a,
            r: f(self.r),
            g: f(self.g),
            b: f(self.b),
        }
    }
}

fn invalid(input: &str, reason: &'static str) -> PetError {
    PetError::Color {
        input: input.to_string(),
        reason,
    }
}

/// Accepts `#RGB`, `#ARGB`, `#RRGGBB` and `#AARRGGBB`; the `#` is optional.
impl FromStr for PetColor {
    type Err = PetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.is_empty() {
            return Err(invalid(s, "empty"));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid(s, "not hexadecimal"));
        }

        let nibble = |i: usize| -> u8 {
            let v = u8::from_str_radix(&hex[i..i + 1], 16).unwrap_or(0);
            v << 4 | v
        };
        let byte = |i: usize| -> u8 { u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0) };

        match hex.len() {
            3 => Ok(Self::rgb(nibble(0), nibble(1), nibble(2))),
            4 => Ok(Self {
                a: nibble(0),
                r: nibble(1),
                g: nibble(2),
                b: nibble(3),
            }),
            6 => Ok(Self::rgb(byte(0), byte(2), byte(4))),
            8 => Ok(Self {
                a: byte(0),
                r: byte(2),
                g: byte(4),
                b: byte(6),
            }),
            _ => Err(invalid(s, "expected 3, 4, 6 or 8 hex digits")),
        }
    }
}

impl fmt::Display for PetColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 0xFF {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
        }
    }
}

impl TryFrom<String> for PetColor {
    type Error = PetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PetColor> for String {
    fn from(c: PetColor) -> Self {
        c.to_string()
    }
}
