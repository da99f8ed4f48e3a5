//! Error types for qrledger operations

use thiserror::Error;

/// Result type alias using qrledger's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for qrledger operations
#[derive(Error, Debug)]
pub enum Error {
    /// Submitted field values were rejected before any I/O happened
    #[error("Invalid input: {0}")]
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

    /// Workbook could not be opened, updated or saved
    #[error("Failed to update workbook: {0}")]
    Persistence(String),

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
    /// Short machine-friendly name of the error kind, used in structured output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::QrEncode(_) => "encoding",
            Error::QrDecode(_) | Error::NoQrCodeFound => "decoding",
            Error::Persistence(_) => "persistence",
            Error::Io(_) => "io",
            Error::Image(_) => "image",
            Error::Config(_) => "config",
            Error::Other(_) => "other",
        }
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
