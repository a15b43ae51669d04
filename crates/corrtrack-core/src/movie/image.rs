//! Generic PNG/JPG/BMP decoder: a single 8-bit grayscale frame, relying on
//! the `image` crate's format-agnostic reader.

use std::path::Path;

use super::{Movie, MovieFormat};
use crate::error::{CorrTrackError, Result};
use crate::pixel_buffer::PixelBuffer;

pub fn open(path: &Path) -> Result<Movie> {
    let buf = decode_single(path)?;
    Ok(Movie::new(MovieFormat::Image, 8, 0.0, path.to_path_buf(), vec![buf]))
}

/// Decode any image format the `image` crate recognises into an 8-bit
/// grayscale [`PixelBuffer`], converting color/alpha away as needed.
pub fn decode_single(path: &Path) -> Result<PixelBuffer> {
    let img = image::open(path).map_err(|e| CorrTrackError::Corrupt {
        reason: format!("failed to decode image {}: {e}", path.display()),
    })?;
    let gray = img.to_luma8();
    let (width, height) = (gray.width(), gray.height());
    let pixels: Vec<u16> = gray.into_raw().into_iter().map(|v| v as u16).collect();
    Ok(PixelBuffer::from_pixels(width, height, 8, pixels, 0))
}
