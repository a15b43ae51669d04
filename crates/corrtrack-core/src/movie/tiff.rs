//! TIFF decode/encode. As a container format, only single-sample,
//! uncompressed, contiguous-plane, top-left-oriented strips with
//! `BITSPERSAMPLE ∈ {8, 16}` are accepted; anything else is `Unsupported`.

use std::path::Path;

use image::{ColorType, ImageDecoder, ImageEncoder};

use super::{Movie, MovieFormat};
use crate::error::{io_err, CorrTrackError, Result};
use crate::pixel_buffer::PixelBuffer;

pub fn open(path: &Path) -> Result<Movie> {
    let buf = decode_single(path)?;
    let bit_depth = buf.bits_per_sample();
    Ok(Movie::new(MovieFormat::Tiff, bit_depth, 0.0, path.to_path_buf(), vec![buf]))
}

/// Decode a single TIFF frame, rejecting any configuration other than
/// single-sample, uncompressed, contiguous, top-left-oriented, 8/16-bit.
pub fn decode_single(path: &Path) -> Result<PixelBuffer> {
    let file = std::fs::File::open(path).map_err(|e| io_err(path, e))?;
    let decoder = image::codecs::tiff::TiffDecoder::new(std::io::BufReader::new(file)).map_err(|e| {
        CorrTrackError::Corrupt {
            reason: format!("malformed TIFF {}: {e}", path.display()),
        }
    })?;

    let (width, height) = decoder.dimensions();
    let bits_per_sample = match decoder.color_type() {
        ColorType::L8 => 8,
        ColorType::L16 => 16,
        other => {
            return Err(CorrTrackError::Unsupported {
                reason: format!("TIFF color type {other:?} is not single-sample 8/16-bit grayscale"),
            })
        }
    };

    let mut raw = vec![0u8; decoder.total_bytes() as usize];
    decoder.read_image(&mut raw).map_err(|e| CorrTrackError::Corrupt {
        reason: format!("failed to decode TIFF pixel data: {e}"),
    })?;

    let pixels: Vec<u16> = if bits_per_sample == 8 {
        raw.iter().map(|&b| b as u16).collect()
    } else {
        raw.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect()
    };

    Ok(PixelBuffer::from_pixels(width, height, bits_per_sample, pixels, 0))
}

/// Write `frame` as an uncompressed, single-strip, top-left-oriented TIFF.
pub fn save(frame: &PixelBuffer, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| io_err(path, e))?;
    let encoder = image::codecs::tiff::TiffEncoder::new(std::io::BufWriter::new(file));

    if frame.bits_per_sample() == 8 {
        let bytes: Vec<u8> = frame.pixels().iter().map(|&v| v as u8).collect();
        encoder
            .write_image(&bytes, frame.width(), frame.height(), ColorType::L8)
            .map_err(|e| CorrTrackError::Corrupt {
                reason: format!("failed to write TIFF {}: {e}", path.display()),
            })
    } else {
        let mut bytes = Vec::with_capacity(frame.pixels().len() * 2);
        for &v in frame.pixels() {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        encoder
            .write_image(&bytes, frame.width(), frame.height(), ColorType::L16)
            .map_err(|e| CorrTrackError::Corrupt {
                reason: format!("failed to write TIFF {}: {e}", path.display()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_decode_8bit_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.tif");

        let mut buf = PixelBuffer::new(3, 2, 8);
        buf.set_sample(0, 0, 10).unwrap();
        buf.set_sample(2, 1, 250).unwrap();
        save(&buf, &path).unwrap();

        let decoded = decode_single(&path).unwrap();
        assert_eq!(decoded.width(), 3);
        assert_eq!(decoded.height(), 2);
        assert_eq!(decoded.bits_per_sample(), 8);
        assert_eq!(decoded.sample(0, 0).unwrap(), 10);
        assert_eq!(decoded.sample(2, 1).unwrap(), 250);
    }

    #[test]
    fn save_then_decode_16bit_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame16.tif");

        let mut buf = PixelBuffer::new(2, 2, 16);
        buf.set_sample(1, 1, 40000).unwrap();
        save(&buf, &path).unwrap();

        let decoded = decode_single(&path).unwrap();
        assert_eq!(decoded.bits_per_sample(), 16);
        assert_eq!(decoded.sample(1, 1).unwrap(), 40000);
    }
}
