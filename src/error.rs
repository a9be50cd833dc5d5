//! Error types for qrgen operations

use thiserror::Error;

/// Result type alias using qrgen's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Banner shown when generate is triggered with blank input
pub const VALIDATION_MESSAGE: &str = "Please enter some text or a URL.";

/// Banner shown when the raster encode fails
pub const RASTER_FAILURE_MESSAGE: &str = "Failed to generate QR code. Please try again.";

/// Banner shown when the vector encode (or its download) fails
pub const VECTOR_FAILURE_MESSAGE: &str = "Failed to generate SVG. Please try again.";

/// Main error type for qrgen operations
#[derive(Error, Debug)]
pub enum Error {
    /// Input was empty or whitespace-only at generate time
    #[error("Validation failed: {0}")]
    Validation(String),

    /// QR code encoding failed
    #[error("Failed to encode QR code: {0}")]
    QrEncode(String),

    /// QR code decoding failed
    #[error("Failed to decode QR code: {0}")]
    QrDecode(String),

    /// No QR code found in image
    #[error("No QR code found in image")]
    NoQrCodeFound,

    /// A generation is already in flight
    #[error("A generation is already in progress")]
    Busy,

    /// Completion did not match the in-flight generation
    #[error("Stale generation ticket {0}")]
    StaleTicket(u64),

    /// Download delivery failed
    #[error("Download failed: {0}")]
    Download(String),

    /// Malformed data URL or object URL
    #[error("Invalid data URL: {0}")]
    DataUrl(String),

    /// Malformed color string
    #[error("Invalid color '{0}', expected #RGB, #RGBA, #RRGGBB or #RRGGBBAA")]
    Color(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image processing error
    #[error("Image processing error: {0}")]
    Image(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Static banner text for the errors a user is allowed to see.
    ///
    /// Validation failures get the prompt to enter text; encode failures get
    /// the generic raster message. Everything else has no banner.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Error::Validation(_) => Some(VALIDATION_MESSAGE),
            Error::QrEncode(_) | Error::Image(_) => Some(RASTER_FAILURE_MESSAGE),
            _ => None,
        }
    }

    /// Whether this error came from the encode collaborator.
    pub fn is_encode_failure(&self) -> bool {
        matches!(self, Error::QrEncode(_) | Error::Image(_))
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(format!("JSON error: {}", e))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::DataUrl(format!("base64 decode error: {}", e))
    }
}
