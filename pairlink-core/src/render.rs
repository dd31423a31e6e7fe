//! Pairing code rendering
//!
//! Turns the opaque pairing token reported by a transport into a PNG QR code
//! wrapped in a `data:` URL the web client can drop into an `<img>`.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;

use crate::error::RenderError;

/// Prefix of every rendered payload
pub const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Smallest edge length of the rendered image, in pixels
const MIN_DIMENSION: u32 = 264;

/// Render `token` as a PNG QR code data URL
pub fn render_pairing_code(token: &str) -> Result<String, RenderError> {
    let code = QrCode::new(token.as_bytes())?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .quiet_zone(true)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    Ok(format!("{DATA_URL_PREFIX}{}", STANDARD.encode(png)))
}
