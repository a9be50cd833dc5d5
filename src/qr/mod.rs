//! QR code encoding and decoding
//!
//! The [`EncodeService`] trait is the seam between the generator panel and
//! the QR library: one call renders a PNG data URL, the other renders SVG
//! markup. [`QrEncoder`] is the `qrcode`-backed implementation and
//! [`QrDecoder`] reads generated images back for verification.

mod color;
mod decoder;
mod encoder;

pub use color::Color;
pub use decoder::QrDecoder;
pub use encoder::QrEncoder;

use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

/// Pixel width requested from the encoder
pub const DEFAULT_WIDTH: u32 = 400;
/// Quiet-zone width in modules
pub const DEFAULT_MARGIN: u32 = 2;
/// Largest accepted image width in pixels
pub const MAX_WIDTH: u32 = 8192;
/// Largest accepted quiet zone in modules
pub const MAX_MARGIN: u32 = 64;

/// Fully resolved rendering parameters passed to the encode collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSpec {
    /// Target image width in pixels
    pub width: u32,
    /// Quiet zone in modules on each side
    pub margin: u32,
    /// Color of dark modules
    pub dark: Color,
    /// Color of light modules and the quiet zone
    pub light: Color,
    /// Error correction level
    pub ecc: qrcode::EcLevel,
}

impl Default for RenderSpec {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            margin: DEFAULT_MARGIN,
            dark: Color::BLACK,
            light: Color::WHITE,
            ecc: qrcode::EcLevel::M,
        }
    }
}

/// Converts text into a QR image (raster) or markup (vector)
#[async_trait]
pub trait EncodeService: Send + Sync {
    /// Render `text` as a PNG and return it as a base64 data URL.
    async fn encode_to_raster(&self, text: &str, spec: &RenderSpec) -> Result<DataUrl>;

    /// Render `text` as SVG markup.
    async fn encode_to_vector_markup(&self, text: &str, spec: &RenderSpec) -> Result<String>;
}

/// A `data:<mime>;base64,<payload>` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl(String);

impl DataUrl {
    /// Encode raw bytes under the given MIME type.
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
    }

    /// Validate and wrap an existing data URL string.
    pub fn parse(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let header = url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(',').map(|(header, _)| header))
            .ok_or_else(|| Error::DataUrl(format!("missing data: header in '{}'", truncate(&url))))?;

        if !header.ends_with(";base64") {
            return Err(Error::DataUrl(format!(
                "only base64 data URLs are supported, got '{header}'"
            )));
        }

        Ok(Self(url))
    }

    /// MIME type declared in the header.
    pub fn mime(&self) -> &str {
        self.header().trim_end_matches(";base64")
    }

    /// Decode the base64 payload.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let payload = self.0.split_once(',').map(|(_, p)| p).unwrap_or_default();
        Ok(STANDARD.decode(payload)?)
    }

    /// The full URL string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.split_once(',').is_none_or(|(_, p)| p.is_empty())
    }

    fn header(&self) -> &str {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(',').map(|(h, _)| h))
            .unwrap_or_default()
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn truncate(value: &str) -> &str {
    match value.char_indices().nth(32) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Parse an error correction level name (`L`, `M`, `Q`, `H`).
pub fn parse_ec_level(value: &str) -> Option<qrcode::EcLevel> {
    match value.trim().to_ascii_uppercase().as_str() {
        "L" | "LOW" => Some(qrcode::EcLevel::L),
        "M" | "MEDIUM" => Some(qrcode::EcLevel::M),
        "Q" | "QUARTILE" => Some(qrcode::EcLevel::Q),
        "H" | "HIGH" => Some(qrcode::EcLevel::H),
        _ => None,
    }
}
