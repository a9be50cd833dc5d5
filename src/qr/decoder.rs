//! QR code decoder using rqrr

use crate::error::{Error, Result};
use crate::qr::DataUrl;
use image::{DynamicImage, GrayImage};

/// QR code decoder, used to confirm generated images scan back to their input
#[derive(Debug, Clone, Default)]
pub struct QrDecoder;

impl QrDecoder {
    /// Create a new QR decoder with default settings
    pub fn new() -> Self {
        Self
    }

    /// Decode the text of a QR code held in an image data URL
    pub fn decode_data_url(&self, url: &DataUrl) -> Result<String> {
        let bytes = url.decode()?;
        let image = image::load_from_memory(&bytes)?;
        self.decode(&image)
    }

    /// Decode a QR code from an image
    pub fn decode(&self, img: &DynamicImage) -> Result<String> {
        self.decode_gray(img.to_luma8())
    }

    /// Decode a QR code from a grayscale image
    pub fn decode_gray(&self, img: GrayImage) -> Result<String> {
        let mut prepared = rqrr::PreparedImage::prepare(img);
        let grids = prepared.detect_grids();

        let grid = grids.first().ok_or(Error::NoQrCodeFound)?;

        match grid.decode() {
            Ok((meta, content)) => {
                tracing::debug!(
                    "Decoded QR: version={:?}, ecc_level={:?}, length={}",
                    meta.version,
                    meta.ecc_level,
                    content.len()
                );
                Ok(content)
            }
            Err(e) => Err(Error::QrDecode(format!("Decode failed: {:?}", e))),
        }
    }
}
