//! XISEQ decoder: an XML manifest listing per-frame image files (decoded
//! through [`super::image`]/[`super::tiff`]) plus an `apiContextList` table
//! mapping a numeric pixel-format code to a bit depth.

use std::path::Path;

use tracing::debug;

use super::xml::with_parsed;
use super::{Movie, MovieFormat};
use crate::error::{io_err, CorrTrackError, Result};
use crate::pixel_buffer::PixelBuffer;

struct FrameEntry {
    file_name: String,
    timestamp: u64,
}

struct Manifest {
    bit_depth: u8,
    framerate: f64,
    frames: Vec<FrameEntry>,
}

/// `apiContextList` carries a line of the form `xiApiImg:format=<uint>`
/// mapping a vendor-specific numeric pixel-format code to a bit depth.
/// Only the codes the fixed table recognises are accepted.
fn bit_depth_for_format_code(code: u32) -> Result<u8> {
    match code {
        0x01080001 => Ok(8),
        0x01100003 => Ok(10),
        0x01100005 => Ok(12),
        0x01100025 => Ok(14),
        0x01100007 => Ok(16),
        other => Err(CorrTrackError::Unsupported {
            reason: format!("unrecognised apiContextList pixel format code {other:#x}"),
        }),
    }
}

fn parse_format_code(line: &str) -> Option<u32> {
    let value = line.trim().strip_prefix("xiApiImg:format=")?;
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}

fn parse_manifest(xml: &str) -> Result<Manifest> {
    with_parsed(xml, |root| {
        let format_line = root
            .find_first("apiContextList")
            .map(|n| n.all_text())
            .ok_or_else(|| CorrTrackError::Corrupt {
                reason: "xiseq manifest missing apiContextList".into(),
            })?;
        let format_code = parse_format_code(&format_line).ok_or_else(|| CorrTrackError::Corrupt {
            reason: format!("malformed apiContextList line {format_line:?}"),
        })?;
        let bit_depth = bit_depth_for_format_code(format_code)?;

        let framerate = root
            .find_first("framerate")
            .and_then(|n| n.text())
            .and_then(|t| t.parse().ok())
            .unwrap_or(0.0);

        let frames: Vec<FrameEntry> = root
            .find_first("sequence")
            .map(|seq| {
                seq.children_named("image")
                    .filter_map(|n| {
                        let file_name = n.attribute("fileName")?.to_string();
                        let timestamp = n.attribute("timestamp").and_then(|t| t.parse().ok()).unwrap_or(0);
                        Some(FrameEntry { file_name, timestamp })
                    })
                    .collect()
            })
            .unwrap_or_default();

        if frames.is_empty() {
            return Err(CorrTrackError::Corrupt {
                reason: "xiseq manifest lists no frames".into(),
            });
        }

        Ok(Manifest {
            bit_depth,
            framerate,
            frames,
        })
    })
}

pub fn open(path: &Path) -> Result<Movie> {
    let xml_text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let manifest = parse_manifest(&xml_text)?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut frames: Vec<PixelBuffer> = Vec::with_capacity(manifest.frames.len());
    let mut dims: Option<(u32, u32, u8)> = None;

    for entry in &manifest.frames {
        let frame_path = base_dir.join(&entry.file_name);
        let ext = frame_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let mut buf = match ext.as_str() {
            "tif" | "tiff" => super::tiff::decode_single(&frame_path)?,
            "png" | "jpg" | "jpeg" | "bmp" => super::image::decode_single(&frame_path)?,
            other => {
                return Err(CorrTrackError::Unsupported {
                    reason: format!("xiseq frame file has unsupported extension {other:?}"),
                })
            }
        };

        let (w, h, bps) = (buf.width(), buf.height(), buf.bits_per_sample());
        match dims {
            None => dims = Some((w, h, bps)),
            Some((ew, eh, ebps)) => {
                if (w, h, bps) != (ew, eh, ebps) {
                    return Err(CorrTrackError::Corrupt {
                        reason: format!(
                            "xiseq frame {} has dimensions {w}x{h}@{bps}bit, expected {ew}x{eh}@{ebps}bit",
                            entry.file_name
                        ),
                    });
                }
            }
        }

        buf = PixelBuffer::from_pixels(w, h, bps, buf.pixels().to_vec(), entry.timestamp);
        frames.push(buf);
    }

    debug!(path = %path.display(), frames = frames.len(), "parsed xiseq manifest");

    Ok(Movie::new(
        MovieFormat::Xiseq,
        manifest.bit_depth,
        manifest.framerate,
        path.to_path_buf(),
        frames,
    ))
}
