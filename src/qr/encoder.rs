//! QR code encoder

use crate::error::{Error, Result};
use crate::qr::{DataUrl, EncodeService, MAX_MARGIN, MAX_WIDTH, RenderSpec};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbaImage};
use qrcode::QrCode;
use std::fmt::Write as _;
use std::io::Cursor;

/// Pixels per module when the requested width cannot fit the symbol
const FALLBACK_SCALE: f64 = 4.0;

/// QR code encoder backed by the `qrcode` crate
#[derive(Debug, Clone, Default)]
pub struct QrEncoder;

/// Module grid plus the geometry derived from a [`RenderSpec`]
struct Layout {
    modules: usize,
    dark: Vec<bool>,
    margin: u32,
    scale: f64,
    size: u32,
}

impl Layout {
    fn new(text: &str, spec: &RenderSpec) -> Result<Self> {
        if spec.width > MAX_WIDTH || spec.margin > MAX_MARGIN {
            return Err(Error::QrEncode(format!(
                "Render size out of range: width {} (max {MAX_WIDTH}), margin {} (max {MAX_MARGIN})",
                spec.width, spec.margin
            )));
        }

        let code = QrCode::with_error_correction_level(text.as_bytes(), spec.ecc)
            .map_err(|e| Error::QrEncode(format!("Failed to create QR code: {}", e)))?;

        let modules = code.width();
        let dark = code
            .to_colors()
            .into_iter()
            .map(|c| c == qrcode::Color::Dark)
            .collect();

        let total = modules as u32 + spec.margin * 2;
        let (scale, size) = if spec.width >= total {
            (f64::from(spec.width) / f64::from(total), spec.width)
        } else {
            (FALLBACK_SCALE, total * FALLBACK_SCALE as u32)
        };

        Ok(Self {
            modules,
            dark,
            margin: spec.margin,
            scale,
            size,
        })
    }

    /// Symbol size in modules, quiet zone included
    fn total_modules(&self) -> u32 {
        self.modules as u32 + self.margin * 2
    }

    /// Rendered image size in pixels
    fn pixel_size(&self) -> u32 {
        self.size
    }

    fn is_dark(&self, col: usize, row: usize) -> bool {
        self.dark
            .get(row * self.modules + col)
            .copied()
            .unwrap_or(false)
    }
}

impl QrEncoder {
    /// Create a new QR encoder
    pub fn new() -> Self {
        Self
    }

    /// Render `text` into an RGBA image following `spec`.
    pub fn render_image(&self, text: &str, spec: &RenderSpec) -> Result<DynamicImage> {
        let layout = Layout::new(text, spec)?;
        let size = layout.pixel_size();
        let scaled_margin = f64::from(layout.margin) * layout.scale;
        let limit = f64::from(size) - scaled_margin;
        let last = layout.modules.saturating_sub(1);
        let (dark, light) = (spec.dark.to_rgba(), spec.light.to_rgba());

        let image = RgbaImage::from_fn(size, size, |x, y| {
            let (px, py) = (f64::from(x), f64::from(y));
            if px < scaled_margin || py < scaled_margin || px >= limit || py >= limit {
                return light;
            }
            let col = (((px - scaled_margin) / layout.scale).floor() as usize).min(last);
            let row = (((py - scaled_margin) / layout.scale).floor() as usize).min(last);
            if layout.is_dark(col, row) { dark } else { light }
        });

        tracing::debug!(
            modules = layout.modules,
            size,
            scale = layout.scale,
            "Rendered QR raster"
        );

        Ok(DynamicImage::ImageRgba8(image))
    }

    /// Render `text` as a PNG data URL.
    pub fn render_raster(&self, text: &str, spec: &RenderSpec) -> Result<DataUrl> {
        let image = self.render_image(text, spec)?;
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(DataUrl::from_bytes("image/png", &png))
    }

    /// Render `text` as SVG markup.
    ///
    /// The viewBox is measured in modules; the `width`/`height` attributes
    /// carry the pixel size of the equivalent raster. Dark modules are drawn
    /// as horizontal runs on a single stroked path.
    pub fn render_vector(&self, text: &str, spec: &RenderSpec) -> Result<String> {
        let layout = Layout::new(text, spec)?;
        let total = layout.total_modules();
        let size = layout.pixel_size();

        let mut path = String::new();
        for row in 0..layout.modules {
            let mut col = 0;
            while col < layout.modules {
                if !layout.is_dark(col, row) {
                    col += 1;
                    continue;
                }
                let start = col;
                while col < layout.modules && layout.is_dark(col, row) {
                    col += 1;
                }
                let x = start as u32 + layout.margin;
                let y = row as u32 + layout.margin;
                let _ = write!(path, "M{x} {y}.5h{}", col - start);
            }
        }

        let mut svg = String::new();
        let _ = write!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{size}\" height=\"{size}\" \
             viewBox=\"0 0 {total} {total}\" shape-rendering=\"crispEdges\">"
        );
        let _ = write!(
            svg,
            "<path fill=\"{}\"{} d=\"M0 0h{total}v{total}H0z\"/>",
            spec.light.rgb_hex(),
            opacity_attr("fill-opacity", spec.light.opacity()),
        );
        let _ = write!(
            svg,
            "<path stroke=\"{}\"{} d=\"{path}\"/>",
            spec.dark.rgb_hex(),
            opacity_attr("stroke-opacity", spec.dark.opacity()),
        );
        svg.push_str("</svg>\n");

        tracing::debug!(modules = layout.modules, bytes = svg.len(), "Rendered QR vector");
        Ok(svg)
    }
}

fn opacity_attr(name: &str, opacity: Option<f32>) -> String {
    opacity
        .map(|o| format!(" {name}=\"{o:.2}\""))
        .unwrap_or_default()
}

#[async_trait]
impl EncodeService for QrEncoder {
    async fn encode_to_raster(&self, text: &str, spec: &RenderSpec) -> Result<DataUrl> {
        let (encoder, text, spec) = (self.clone(), text.to_owned(), spec.clone());
        tokio::task::spawn_blocking(move || encoder.render_raster(&text, &spec))
            .await
            .map_err(|e| Error::QrEncode(format!("Raster task failed: {e}")))?
    }

    async fn encode_to_vector_markup(&self, text: &str, spec: &RenderSpec) -> Result<String> {
        let (encoder, text, spec) = (self.clone(), text.to_owned(), spec.clone());
        tokio::task::spawn_blocking(move || encoder.render_vector(&text, &spec))
            .await
            .map_err(|e| Error::QrEncode(format!("Vector task failed: {e}")))?
    }
}
