//! Movie decoding and frame access.
//!
//! A [`Movie`] is an ordered sequence of [`PixelBuffer`]s sharing identical
//! dimensions and bit depth, decoded from one of several binary container
//! formats. [`Movie::open`] dispatches on file extension (case-insensitive)
//! to the matching codec in [`crate::movie::rawm`], [`xiseq`], [`pds`],
//! [`cine`], [`tiff`] or [`image`].

pub mod cine;
pub mod image;
pub mod pds;
pub mod rawm;
pub mod tiff;
pub mod xiseq;
mod xml;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{CorrTrackError, Result};
use crate::pixel_buffer::PixelBuffer;
use crate::progress::ProgressReporter;

/// The container format a [`Movie`] was decoded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MovieFormat {
    Image,
    Tiff,
    Rawm,
    Xiseq,
    Pds,
    Cine,
}

/// An ordered sequence of frames sharing identical `(width, height,
/// bits_per_sample)`, plus the metadata a host needs to display and export
/// them.
#[derive(Debug)]
pub struct Movie {
    pub format: MovieFormat,
    /// Declared semantic precision; `bit_depth <= bits_per_sample`.
    pub bit_depth: u8,
    /// Frames per second, or 0 if unknown.
    pub framerate: f64,
    pub timestamps: Vec<u64>,
    pub source_path: PathBuf,
    frames: Vec<PixelBuffer>,
}

impl Movie {
    /// Build a movie from already-decoded frames. Decoders call this after
    /// validating that every frame shares the same dimensions and bit
    /// depth; it panics otherwise, since that would be a decoder bug rather
    /// than a user-facing failure.
    pub(crate) fn new(
        format: MovieFormat,
        bit_depth: u8,
        framerate: f64,
        source_path: PathBuf,
        frames: Vec<PixelBuffer>,
    ) -> Self {
        assert!(!frames.is_empty(), "decoders must produce at least one frame");
        let (w, h, bps) = (frames[0].width(), frames[0].height(), frames[0].bits_per_sample());
        assert!(frames.iter().all(|f| f.width() == w && f.height() == h && f.bits_per_sample() == bps));
        assert!(bit_depth <= bps);

        let timestamps = frames.iter().map(|f| f.timestamp()).collect();
        Self {
            format,
            bit_depth,
            framerate,
            timestamps,
            source_path,
            frames,
        }
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn width(&self) -> u32 {
        self.frames[0].width()
    }

    pub fn height(&self) -> u32 {
        self.frames[0].height()
    }

    pub fn bits_per_sample(&self) -> u8 {
        self.frames[0].bits_per_sample()
    }

    /// Dispatch on extension (case-insensitive) to the matching codec.
    pub fn open(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let movie = match ext.as_str() {
            "rawm" => rawm::open(path),
            "xiseq" => xiseq::open(path),
            "pds" => pds::open(path),
            "cine" => cine::open(path),
            "tif" | "tiff" => tiff::open(path),
            "png" | "jpg" | "jpeg" | "bmp" => image::open(path),
            other => Err(CorrTrackError::Unsupported {
                reason: format!("unrecognised movie file extension {other:?}"),
            }),
        };

        match &movie {
            Ok(m) => debug!(
                path = %path.display(),
                width = m.width(),
                height = m.height(),
                frames = m.n_frames(),
                bit_depth = m.bit_depth,
                "opened movie"
            ),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to open movie"),
        }

        movie
    }

    pub fn frame(&self, i: usize) -> Result<&PixelBuffer> {
        self.frames.get(i).ok_or(CorrTrackError::FrameIndexOutOfRange {
            index: i,
            total: self.frames.len(),
        })
    }

    pub fn frame_intensity_min_max(&self, i: usize) -> Result<(u16, u16)> {
        let frame = self.frame(i)?;
        let mut min = u16::MAX;
        let mut max = 0u16;
        for &v in frame.pixels() {
            min = min.min(v);
            max = max.max(v);
        }
        Ok((min, max))
    }

    /// Scan over all frames, updating `progress` as it goes.
    pub fn intensity_min_max(&self, progress: &dyn ProgressReporter) -> (u16, u16) {
        progress.begin(self.frames.len());
        let mut min = u16::MAX;
        let mut max = 0u16;
        for (i, frame) in self.frames.iter().enumerate() {
            for &v in frame.pixels() {
                min = min.min(v);
                max = max.max(v);
            }
            progress.advance(i + 1);
        }
        progress.finish();
        (min, max)
    }

    /// Per-frame intensity histogram with `n_bins` buckets spanning
    /// `[0, 2^bit_depth)`. Pure data computation used by non-GUI hosts (the
    /// CLI's `info` command) to print a quick distribution summary; the
    /// interactive zoom/intensity dialog that originally consumed this
    /// stays out of scope.
    pub fn histogram(&self, i: usize, n_bins: usize) -> Result<Vec<u64>> {
        let frame = self.frame(i)?;
        let range = 1u32 << self.bit_depth;
        let mut bins = vec![0u64; n_bins];
        for &v in frame.pixels() {
            let bin = ((v as u64) * n_bins as u64 / range as u64).min(n_bins as u64 - 1);
            bins[bin as usize] += 1;
        }
        Ok(bins)
    }

    /// Render frame `i` as 8-bit by shifting samples by `bit_depth - 8`,
    /// clamping any value beyond `2^bit_depth - 1` to 255.
    pub fn to_u8_by_bit_depth(&self, i: usize) -> Result<Vec<u8>> {
        let frame = self.frame(i)?;
        let max_val = (1u32 << self.bit_depth) - 1;
        let shift = self.bit_depth as i32 - 8;
        Ok(frame
            .pixels()
            .iter()
            .map(|&v| {
                if v as u32 > max_val {
                    255
                } else if shift >= 0 {
                    (v >> shift) as u8
                } else {
                    ((v as u32) << (-shift)).min(255) as u8
                }
            })
            .collect())
    }

    /// Render frame `i` as 8-bit via `255 * clamp((v - min) / (max - min), 0, 1)`.
    pub fn to_u8_by_range(&self, i: usize, min: u16, max: u16) -> Result<Vec<u8>> {
        let frame = self.frame(i)?;
        let span = (max as f64 - min as f64).max(1.0);
        Ok(frame
            .pixels()
            .iter()
            .map(|&v| {
                let numerator = v as f64 - min as f64;
                let ratio = if numerator <= 0.0 {
                    0.0
                } else {
                    (numerator / span).min(1.0)
                };
                (255.0 * ratio).round() as u8
            })
            .collect())
    }

    /// Write frame `i` to an arbitrary caller-chosen path.
    pub fn export_tiff_to(&self, i: usize, path: &Path) -> Result<()> {
        let frame = self.frame(i)?;
        tiff::save(frame, path)
    }

    /// Write frame `i` next to `source_path` as `<stem>_<NNN>.tif`, 1-origin,
    /// zero-padded to the decimal digit count of `n_frames`. Returns the
    /// path written.
    pub fn export_tiff(&self, i: usize) -> Result<PathBuf> {
        let suffix = format!(
            "_{:0width$}.tif",
            i + 1,
            width = digit_count(self.frames.len())
        );
        let mut name = stem_path(&self.source_path).into_os_string();
        name.push(suffix);
        let path = PathBuf::from(name);
        self.export_tiff_to(i, &path)?;
        Ok(path)
    }

    /// Write every frame as `<dir>/<NNN>.tif` (1-origin, zero-padded to the
    /// digit count of `n_frames`) into an arbitrary caller-chosen directory.
    /// Fails if `dir` already exists.
    pub fn export_all_tiffs_to(&self, dir: &Path, progress: &dyn ProgressReporter) -> Result<()> {
        if dir.exists() {
            return Err(CorrTrackError::Corrupt {
                reason: format!("export directory {} already exists", dir.display()),
            });
        }
        std::fs::create_dir_all(dir).map_err(|e| crate::error::io_err(dir, e))?;

        let pad_width = digit_count(self.frames.len());
        progress.begin(self.frames.len());
        for (i, frame) in self.frames.iter().enumerate() {
            let name = format!("{:0width$}.tif", i + 1, width = pad_width);
            tiff::save(frame, &dir.join(name))?;
            progress.advance(i + 1);
        }
        progress.finish();
        Ok(())
    }

    /// Write every frame into a `<stem>/` directory next to `source_path`
    /// (stem derived by dropping the extension), named `<NNN>.tif`. Returns
    /// the directory path. Fails if the directory already exists.
    pub fn export_all_tiffs(&self, progress: &dyn ProgressReporter) -> Result<PathBuf> {
        let dir = stem_path(&self.source_path);
        self.export_all_tiffs_to(&dir, progress)?;
        Ok(dir)
    }
}

/// The source path with its extension dropped, the stem used as a base for
/// derived TIFF export names and directories.
fn stem_path(source_path: &Path) -> PathBuf {
    source_path.with_extension("")
}

/// Zero-pad width for TIFF filenames: the decimal digit count of `n`.
pub(crate) fn digit_count(n: usize) -> usize {
    n.to_string().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_count_matches_decimal_width() {
        assert_eq!(digit_count(1), 1);
        assert_eq!(digit_count(9), 1);
        assert_eq!(digit_count(10), 2);
        assert_eq!(digit_count(999), 3);
        assert_eq!(digit_count(1000), 4);
    }

    fn single_frame_movie() -> Movie {
        let mut buf = PixelBuffer::new(2, 2, 8);
        buf.set_sample(0, 0, 0).unwrap();
        buf.set_sample(1, 0, 128).unwrap();
        buf.set_sample(0, 1, 255).unwrap();
        buf.set_sample(1, 1, 64).unwrap();
        Movie::new(MovieFormat::Image, 8, 0.0, PathBuf::from("test.png"), vec![buf])
    }

    #[test]
    fn to_u8_by_bit_depth_is_identity_for_8bit() {
        let movie = single_frame_movie();
        let rendered = movie.to_u8_by_bit_depth(0).unwrap();
        assert_eq!(rendered, vec![0, 128, 255, 64]);
    }

    #[test]
    fn to_u8_by_range_is_monotonic() {
        let movie = single_frame_movie();
        let rendered = movie.to_u8_by_range(0, 0, 255).unwrap();
        let mut sorted_inputs = vec![0u16, 128, 255, 64];
        sorted_inputs.sort();
        let mut sorted_outputs = rendered.clone();
        sorted_outputs.sort();
        assert_eq!(rendered.len(), 4);
        for w in sorted_outputs.windows(2) {
            assert!(w[0] <= w[1]);
        }
        let _ = sorted_inputs;
    }

    #[test]
    fn frame_out_of_range_is_reported() {
        let movie = single_frame_movie();
        assert!(matches!(
            movie.frame(5),
            Err(CorrTrackError::FrameIndexOutOfRange { index: 5, total: 1 })
        ));
    }
}
