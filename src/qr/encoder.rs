//! QR code encoder

use crate::error::{Error, Result};
use crate::qr::{ErrorCorrection, QrPayload};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use qrcode::QrCode;

/// Pixels per QR module
pub const DEFAULT_MODULE_SIZE: u32 = 10;

/// Quiet zone width in modules
pub const DEFAULT_BORDER: u32 = 4;

/// QR code encoder
///
/// Rendering parameters are fixed per encoder, so the same payload always
/// produces a bit-identical image.
#[derive(Debug, Clone)]
pub struct QrEncoder {
    ecc: ErrorCorrection,
    module_size: u32,
    border: u32,
}

impl QrEncoder {
    /// Create a new QR encoder with default settings (High ECC, 10px modules, 4 module border)
    pub fn new() -> Self {
        Self {
            ecc: ErrorCorrection::H,
            module_size: DEFAULT_MODULE_SIZE,
            border: DEFAULT_BORDER,
        }
    }

    /// Create a new QR encoder with a specific error correction level
    pub fn with_ecc_level(ecc: ErrorCorrection) -> Self {
        Self {
            ecc,
            ..Self::new()
        }
    }

    /// Override module size (pixels per module) and border width (in modules).
    pub fn with_geometry(mut self, module_size: u32, border: u32) -> Self {
        self.module_size = module_size.max(1);
        self.border = border;
        self
    }

    /// Error correction level used by this encoder
    pub fn ecc_level(&self) -> ErrorCorrection {
        self.ecc
    }

    /// Encode data into a QR code image
    pub fn encode(&self, payload: &QrPayload) -> Result<DynamicImage> {
        if payload.data.is_empty() {
            return Err(Error::QrEncode("payload is empty".to_string()));
        }

        let code = QrCode::with_error_correction_level(&payload.data, self.ecc.into())
            .map_err(|e| Error::QrEncode(format!("Failed to create QR code: {}", e)))?;

        let modules = code
            .render::<Luma<u8>>()
            .quiet_zone(false)
            .module_dimensions(self.module_size, self.module_size)
            .build();

        tracing::debug!(
            version = ?code.version(),
            ecc = %self.ecc,
            width = code.width(),
            bytes = payload.data.len(),
            "Encoded QR payload"
        );

        Ok(DynamicImage::ImageLuma8(self.with_border(&modules)))
    }

    /// Encode a string into a QR code image
    pub fn encode_string(&self, data: &str) -> Result<DynamicImage> {
        let payload = QrPayload::from_string(data.to_string());
        self.encode(&payload)
    }

    /// Encode `data` and scale it to a `size`×`size` display image
    pub fn display_image(&self, data: &str, size: u32) -> Result<DynamicImage> {
        let image = self.encode_string(data)?;
        Ok(Self::resized(&image, size, size))
    }

    /// Lanczos-resized copy of an encoded image, as shown in a preview or embedded in a sheet.
    pub fn resized(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width.max(1), height.max(1), FilterType::Lanczos3)
    }

    fn with_border(&self, modules: &GrayImage) -> GrayImage {
        let pad = self.border * self.module_size;
        if pad == 0 {
            return modules.clone();
        }

        let mut canvas = GrayImage::from_pixel(
            modules.width() + 2 * pad,
            modules.height() + 2 * pad,
            Luma([255u8]),
        );
        imageops::overlay(&mut canvas, modules, i64::from(pad), i64::from(pad));
        canvas
    }
}

impl Default for QrEncoder {
    fn default() -> Self {
        Self::new()
    }
}
