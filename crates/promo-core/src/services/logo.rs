use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};

use crate::services::GenerationError;

/// Where and how large the logo is stamped onto a generated image.
///
/// The logo is resized to exactly `width`×`height` and anchored to the
/// top-right corner, `margin` pixels in from both edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoPlacement {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    pub jpeg_quality: u8,
}

impl Default for LogoPlacement {
    fn default() -> Self {
        Self {
            width: 200,
            height: 100,
            margin: 10,
            jpeg_quality: 90,
        }
    }
}

impl LogoPlacement {
    /// Overlay `logo_b64` onto `image` and re-encode the result as JPEG.
    pub fn compose(&self, image: &[u8], logo_b64: &str) -> Result<Bytes, GenerationError> {
        let mut base = image::load_from_memory(image)?.to_rgba8();

        let logo_bytes = decode_logo(logo_b64)?;
        let logo = image::load_from_memory(&logo_bytes)?
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_rgba8();

        let x = i64::from(base.width()) - i64::from(self.width) - i64::from(self.margin);
        let y = i64::from(self.margin);
        imageops::overlay(&mut base, &logo, x, y);

        let rgb = image::DynamicImage::ImageRgba8(base).to_rgb8();
        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, self.jpeg_quality).encode_image(&rgb)?;
        Ok(Bytes::from(out.into_inner()))
    }
}

/// Decode a logo given as plain base64 or as a `data:<mime>;base64,` URL.
///
/// Line breaks and other ASCII whitespace are ignored, so MIME-wrapped
/// (76-column) encodings decode too.
fn decode_logo(logo: &str) -> Result<Vec<u8>, GenerationError> {
    let logo = logo.trim();
    let payload = match logo.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
        None => logo,
    };
    let compact: Vec<u8> = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|e| GenerationError::Image(format!("logo is not valid base64: {e}")))
}
