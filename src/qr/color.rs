//! Hex color parsing for the two-tone QR palette

use crate::error::{Error, Result};
use image::Rgba;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An RGBA color parsed from a CSS-style hex string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel (255 = opaque)
    pub a: u8,
}

impl Color {
    /// Opaque black (`#000000FF`)
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    /// Opaque white (`#FFFFFFFF`)
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);

    /// Build a color from its four channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RGB`, `#RGBA`, `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
    pub fn from_hex(value: &str) -> Result<Self> {
        let hex = value.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::Color(value.to_string()));
        }

        let expanded: String = match hex.len() {
            3 | 4 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 | 8 => hex.to_string(),
            _ => return Err(Error::Color(value.to_string())),
        };

        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::Color(value.to_string()))
        };

        let a = if expanded.len() == 8 { channel(3)? } else { 255 };
        Ok(Self::rgba(channel(0)?, channel(1)?, channel(2)?, a))
    }

    /// `#rrggbb` without alpha, as used in SVG paint attributes.
    pub fn rgb_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Alpha as an opacity in `0.0..=1.0`, `None` when fully opaque.
    pub fn opacity(&self) -> Option<f32> {
        (self.a < 255).then(|| f32::from(self.a) / 255.0)
    }

    pub(crate) fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::from_hex(value)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02X}{:02X}{:02X}{:02X}",
            self.r, self.g, self.b, self.a
        )
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Color::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}
