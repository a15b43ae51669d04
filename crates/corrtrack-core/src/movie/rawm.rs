//! RAWM decoder: a sidecar XML header plus a binary `.raw` pixel stream
//! with an identical filename stem.

use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};

use super::xml::{with_parsed, XmlNode};
use super::{Movie, MovieFormat};
use crate::error::{io_err, CorrTrackError, Result};
use crate::pixel_buffer::PixelBuffer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PixelFormat {
    Mono8,
    Mono10,
    Mono12,
    Mono14,
    Mono16,
}

impl PixelFormat {
    fn bits_per_sample(self) -> u8 {
        match self {
            PixelFormat::Mono8 => 8,
            _ => 16,
        }
    }

    /// Semantic bit depth (the field width before zero-padding to 16 bits).
    fn bit_depth(self) -> u8 {
        match self {
            PixelFormat::Mono8 => 8,
            PixelFormat::Mono10 => 10,
            PixelFormat::Mono12 => 12,
            PixelFormat::Mono14 => 14,
            PixelFormat::Mono16 => 16,
        }
    }

    fn mask(self) -> u16 {
        match self {
            PixelFormat::Mono8 => 0xFF,
            PixelFormat::Mono10 => 0x03FF,
            PixelFormat::Mono12 => 0x0FFF,
            PixelFormat::Mono14 => 0x3FFF,
            PixelFormat::Mono16 => 0xFFFF,
        }
    }

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Mono8" => Ok(PixelFormat::Mono8),
            "Mono10" => Ok(PixelFormat::Mono10),
            "Mono12" => Ok(PixelFormat::Mono12),
            "Mono14" => Ok(PixelFormat::Mono14),
            "Mono16" => Ok(PixelFormat::Mono16),
            other => Err(CorrTrackError::Corrupt {
                reason: format!("unrecognised RAWM pixel format {other:?}"),
            }),
        }
    }
}

struct RawmHeader {
    pixel_format: PixelFormat,
    width: u32,
    height: u32,
    framerate: f64,
    timestamps: Vec<u64>,
}

/// Parse a two-part dotted version string (e.g. "1.2") into `(major, minor)`.
fn parse_version(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next()?.parse().ok()?;
    Some((major, minor))
}

fn parse_header(xml: &str) -> Result<RawmHeader> {
    with_parsed(xml, |root| {
        let version_str = root
            .find_first("version")
            .and_then(|n| n.text().map(str::to_string))
            .unwrap_or_default();
        let legacy = parse_version(&version_str).map(|(maj, min)| (maj, min) < (1, 3)).unwrap_or(true);

        let width = required_u32(&root, "width")?;
        let height = required_u32(&root, "height")?;

        let pixel_format = if legacy {
            if let Some(n) = root.find_first("pixelFormat") {
                let text = n.text().unwrap_or("Mono8");
                if text != "Mono8" {
                    return Err(CorrTrackError::Corrupt {
                        reason: format!("RAWM version {version_str} only supports Mono8, found {text:?}"),
                    });
                }
            }
            PixelFormat::Mono8
        } else {
            let text = root
                .find_first("pixelFormat")
                .and_then(|n| n.text())
                .ok_or_else(|| CorrTrackError::Corrupt {
                    reason: "RAWM header missing pixelFormat".into(),
                })?;
            PixelFormat::from_str(text)?
        };

        let endianness = root
            .find_first("endianness")
            .and_then(|n| n.text())
            .unwrap_or("little");
        if legacy {
            if endianness != "little" {
                return Err(CorrTrackError::Corrupt {
                    reason: format!("RAWM version {version_str} only supports little endianness"),
                });
            }
        } else if endianness == "big" {
            return Err(CorrTrackError::Unsupported {
                reason: "big-endian RAWM pixel data is not supported".into(),
            });
        } else if endianness != "little" {
            return Err(CorrTrackError::Corrupt {
                reason: format!("unrecognised RAWM endianness {endianness:?}"),
            });
        }

        let framerate = root
            .find_first("framerate")
            .and_then(|n| n.text())
            .and_then(|t| t.parse().ok())
            .unwrap_or(0.0);

        let timestamps: Vec<u64> = root
            .find_first("frames")
            .map(|frames| {
                frames
                    .children_named("frame")
                    .filter_map(|f| f.attribute("timestamp"))
                    .filter_map(|t| t.parse().ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(RawmHeader {
            pixel_format,
            width,
            height,
            framerate,
            timestamps,
        })
    })
}

fn required_u32(node: &XmlNode, name: &str) -> Result<u32> {
    node.find_first(name)
        .and_then(|n| n.text())
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| CorrTrackError::Corrupt {
            reason: format!("RAWM header missing or invalid {name}"),
        })
}

pub fn open(path: &Path) -> Result<Movie> {
    let xml_text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let header = parse_header(&xml_text)?;

    let raw_path = sidecar_raw_path(path);
    let raw_bytes = std::fs::read(&raw_path).map_err(|e| io_err(&raw_path, e))?;

    let bytes_per_sample = (header.pixel_format.bits_per_sample() / 8) as usize;
    let pixel_count = (header.width as usize) * (header.height as usize);
    let frame_byte_size = pixel_count * bytes_per_sample;
    let n_frames = header.timestamps.len();
    if n_frames == 0 {
        return Err(CorrTrackError::Corrupt {
            reason: "RAWM header declares no <frame> entries".into(),
        });
    }
    let expected_size = frame_byte_size * n_frames;
    if raw_bytes.len() != expected_size {
        return Err(CorrTrackError::Corrupt {
            reason: format!(
                ".raw size {} does not match {n_frames} frames of size {frame_byte_size} (expected {expected_size})",
                raw_bytes.len(),
            ),
        });
    }

    let mut frames = Vec::with_capacity(n_frames);
    let mask = header.pixel_format.mask();
    for frame_idx in 0..n_frames {
        let start = frame_idx * frame_byte_size;
        let mut cursor = std::io::Cursor::new(&raw_bytes[start..start + frame_byte_size]);
        let mut pixels = Vec::with_capacity(pixel_count);
        if bytes_per_sample == 1 {
            for _ in 0..pixel_count {
                pixels.push(cursor.read_u8().map_err(|e| io_err(&raw_path, e))? as u16);
            }
        } else {
            for _ in 0..pixel_count {
                let v = cursor.read_u16::<LittleEndian>().map_err(|e| io_err(&raw_path, e))?;
                pixels.push(v & mask);
            }
        }
        let timestamp = header.timestamps[frame_idx];
        frames.push(PixelBuffer::from_pixels(
            header.width,
            header.height,
            header.pixel_format.bits_per_sample(),
            pixels,
            timestamp,
        ));
    }

    Ok(Movie::new(
        MovieFormat::Rawm,
        header.pixel_format.bit_depth(),
        header.framerate,
        path.to_path_buf(),
        frames,
    ))
}

fn sidecar_raw_path(header_path: &Path) -> PathBuf {
    header_path.with_extension("raw")
}
