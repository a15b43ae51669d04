//! PDS decoder: a binary format of fixed-size frame headers followed by
//! pixel payloads, with dimensions and pixel format stored as floats at
//! fixed byte offsets within each header.

use std::path::Path;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use super::{Movie, MovieFormat};
use crate::error::{io_err, CorrTrackError, Result};
use crate::pixel_buffer::PixelBuffer;

const MAGIC: u32 = 0x0404_0404;
const HEADER_SIZE: usize = 544;
const RECORD_GAP: usize = 40;
const WIDTH_OFFSET: usize = 0x1AC;
const HEIGHT_OFFSET: usize = 0x1B0;
const PIXEL_FORMAT_OFFSET: usize = 0x1C0;

fn read_f32_at(header: &[u8], offset: usize) -> Result<f32> {
    let bytes: [u8; 4] = header
        .get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| CorrTrackError::Corrupt {
            reason: format!("PDS frame header too short to read field at offset {offset:#x}"),
        })?;
    Ok(f32::from_le_bytes(bytes))
}

pub fn open(path: &Path) -> Result<Movie> {
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    let mut cursor = std::io::Cursor::new(bytes.as_slice());

    let magic = cursor.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    if magic != MAGIC {
        return Err(CorrTrackError::Corrupt {
            reason: format!("PDS magic mismatch: expected {MAGIC:#010x}, found {magic:#010x}"),
        });
    }
    let n_frames = cursor.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))? as usize;
    if n_frames == 0 {
        return Err(CorrTrackError::Corrupt {
            reason: "PDS file declares zero frames".into(),
        });
    }

    // Read the first header to determine dimensions/format; every frame is
    // assumed to share them (the format has no per-frame override).
    let first_header_start = 8;
    let first_header = bytes
        .get(first_header_start..first_header_start + HEADER_SIZE)
        .ok_or_else(|| CorrTrackError::Corrupt {
            reason: "PDS file truncated before first frame header".into(),
        })?;

    let width = read_f32_at(first_header, WIDTH_OFFSET)? as u32;
    let height = read_f32_at(first_header, HEIGHT_OFFSET)? as u32;
    let pixel_format = read_f32_at(first_header, PIXEL_FORMAT_OFFSET)?;
    let bits_per_sample: u8 = if pixel_format == 0.0 {
        8
    } else if pixel_format == 1.0 {
        16
    } else {
        return Err(CorrTrackError::Corrupt {
            reason: format!("unrecognised PDS pixel format selector {pixel_format}"),
        });
    };

    let pixel_count = (width as usize) * (height as usize);
    let bytes_per_sample = (bits_per_sample / 8) as usize;
    let payload_size = pixel_count * bytes_per_sample;
    let record_size = HEADER_SIZE + RECORD_GAP + payload_size;
    let expected_size = 8 + record_size * n_frames;
    if bytes.len() != expected_size {
        return Err(CorrTrackError::Corrupt {
            reason: format!(
                "PDS file size {} does not match expected {expected_size} ({n_frames} frames, record size {record_size})",
                bytes.len()
            ),
        });
    }

    let mut frames = Vec::with_capacity(n_frames);
    for frame_idx in 0..n_frames {
        let record_start = 8 + frame_idx * record_size;
        let payload_start = record_start + HEADER_SIZE + RECORD_GAP;
        let payload = &bytes[payload_start..payload_start + payload_size];

        let mut pixels = Vec::with_capacity(pixel_count);
        if bytes_per_sample == 1 {
            pixels.extend(payload.iter().map(|&b| b as u16));
        } else {
            let mut payload_cursor = std::io::Cursor::new(payload);
            for _ in 0..pixel_count {
                pixels.push(payload_cursor.read_u16::<BigEndian>().map_err(|e| io_err(path, e))?);
            }
        }

        frames.push(PixelBuffer::from_pixels(width, height, bits_per_sample, pixels, 0));
    }

    Ok(Movie::new(MovieFormat::Pds, bits_per_sample, 0.0, path.to_path_buf(), frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_pds(width: u32, height: u32, bps: u8, frame_pixels: &[Vec<u16>]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&(frame_pixels.len() as u32).to_le_bytes());

        for pixels in frame_pixels {
            let mut header = vec![0u8; HEADER_SIZE];
            header[WIDTH_OFFSET..WIDTH_OFFSET + 4].copy_from_slice(&(width as f32).to_le_bytes());
            header[HEIGHT_OFFSET..HEIGHT_OFFSET + 4].copy_from_slice(&(height as f32).to_le_bytes());
            let fmt = if bps == 8 { 0.0f32 } else { 1.0f32 };
            header[PIXEL_FORMAT_OFFSET..PIXEL_FORMAT_OFFSET + 4].copy_from_slice(&fmt.to_le_bytes());
            out.extend_from_slice(&header);
            out.extend_from_slice(&vec![0u8; RECORD_GAP]);

            if bps == 8 {
                out.extend(pixels.iter().map(|&v| v as u8));
            } else {
                for &v in pixels {
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
        }
        out
    }

    #[test]
    fn decodes_mono8_single_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.pds");
        let bytes = build_pds(2, 2, 8, &[vec![1, 2, 3, 4]]);
        std::fs::write(&path, bytes).unwrap();

        let movie = open(&path).unwrap();
        assert_eq!(movie.n_frames(), 1);
        assert_eq!(movie.width(), 2);
        assert_eq!(movie.height(), 2);
        assert_eq!(movie.bits_per_sample(), 8);
        assert_eq!(movie.timestamps, vec![0]);
        assert_eq!(movie.frame(0).unwrap().sample(1, 1).unwrap(), 4);
    }

    #[test]
    fn decodes_mono16_big_endian_two_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.pds");
        let bytes = build_pds(1, 1, 16, &[vec![0x1234], vec![0xBEEF]]);
        std::fs::write(&path, bytes).unwrap();

        let movie = open(&path).unwrap();
        assert_eq!(movie.n_frames(), 2);
        assert_eq!(movie.frame(0).unwrap().sample(0, 0).unwrap(), 0x1234);
        assert_eq!(movie.frame(1).unwrap().sample(0, 0).unwrap(), 0xBEEF);
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.pds");
        std::fs::write(&path, [0u8; 16]).unwrap();
        assert!(matches!(open(&path), Err(CorrTrackError::Corrupt { .. })));
    }

    #[test]
    fn wrong_file_size_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.pds");
        let mut bytes = build_pds(2, 2, 8, &[vec![1, 2, 3, 4]]);
        bytes.pop();
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(open(&path), Err(CorrTrackError::Corrupt { .. })));
    }
}
