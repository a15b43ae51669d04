//! Frame-by-frame particle tracking: correlate each anchor against the
//! current frame, refine to sub-pixel precision, advance the anchor, and
//! append a row to the `.dat` trajectory file.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::{APP_NAME, TARGET_VERSION, VERSION};
use crate::correlation::{correlate, CorrelationMap};
use crate::error::{io_err, CorrTrackError, Result};
use crate::filter::Filter;
use crate::movie::Movie;
use crate::progress::ProgressReporter;
use crate::subpixel::refine_peak;

/// An integer-pixel coordinate being tracked across frames, updated in
/// place as `Tracker::run` advances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnchorPoint {
    pub x: i64,
    pub y: i64,
}

/// A persistable description of a tracking session: everything needed to
/// reconstruct a [`Tracker`] without replaying interactive anchor-placement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub movie_path: PathBuf,
    pub filter_path: PathBuf,
    pub output_path: PathBuf,
    pub window_width: u32,
    pub window_height: u32,
    pub fit_radius: f64,
    pub anchors: Vec<(i64, i64)>,
}

pub struct Tracker {
    movie: Movie,
    filter: Filter,
    anchors: Vec<AnchorPoint>,
    window_width: u32,
    window_height: u32,
    fit_radius: f64,
}

impl Tracker {
    pub fn new(movie: Movie, filter: Filter, window_width: u32, window_height: u32, fit_radius: f64) -> Self {
        Self {
            movie,
            filter,
            anchors: Vec::new(),
            window_width,
            window_height,
            fit_radius,
        }
    }

    /// Open the movie and filter named by `config` and build a tracker with
    /// its declared anchors already in place.
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        let movie = Movie::open(&config.movie_path)?;
        let filter = Filter::load(&config.filter_path)?;
        let mut tracker = Self::new(movie, filter, config.window_width, config.window_height, config.fit_radius);
        for &(x, y) in &config.anchors {
            tracker.add_point(x, y);
        }
        Ok(tracker)
    }

    pub fn movie(&self) -> &Movie {
        &self.movie
    }

    pub fn anchors(&self) -> &[AnchorPoint] {
        &self.anchors
    }

    pub fn add_point(&mut self, x: i64, y: i64) {
        self.anchors.push(AnchorPoint { x, y });
    }

    pub fn remove_last_point(&mut self) -> Option<AnchorPoint> {
        self.anchors.pop()
    }

    pub fn clear_points(&mut self) {
        self.anchors.clear();
    }

    /// Correlate every anchor against `frame_index` without mutating anchors
    /// or writing output — a read-only preview a host can render before
    /// committing to a full run.
    pub fn test_correlation(&self, frame_index: usize) -> Result<Vec<CorrelationMap>> {
        let frame = self.movie.frame(frame_index)?;
        self.anchors
            .iter()
            .map(|a| correlate(frame, a.x, a.y, self.window_width, self.window_height, &self.filter))
            .collect()
    }

    /// Track every anchor across every frame, writing a `.dat` trajectory to
    /// `output_path`. Aborts the whole run on the first per-frame failure,
    /// leaving whatever rows were already flushed in place, and reports it
    /// as [`CorrTrackError::AnalyseError`].
    pub fn run(
        &mut self,
        output_path: &Path,
        progress: &dyn ProgressReporter,
        should_cancel: Option<&dyn Fn() -> bool>,
    ) -> Result<()> {
        let file = std::fs::File::create(output_path).map_err(|e| io_err(output_path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_header(&mut writer, output_path)?;

        let n_frames = self.movie.n_frames();
        progress.begin(n_frames);

        for frame_idx in 0..n_frames {
            if let Some(cancel) = should_cancel {
                if cancel() {
                    break;
                }
            }
            progress.advance(frame_idx);

            let row = self.process_frame(frame_idx).map_err(|e| CorrTrackError::AnalyseError {
                partial_output_path: output_path.to_path_buf(),
                frame: frame_idx,
                cause: Box::new(e),
            })?;

            writer.write_all(row.as_bytes()).map_err(|e| {
                CorrTrackError::AnalyseError {
                    partial_output_path: output_path.to_path_buf(),
                    frame: frame_idx,
                    cause: Box::new(io_err(output_path, e)),
                }
            })?;
            writer.flush().map_err(|e| io_err(output_path, e))?;
        }

        progress.finish();
        Ok(())
    }

    fn write_header<W: Write>(&self, writer: &mut W, output_path: &Path) -> Result<()> {
        let version_line = if VERSION == TARGET_VERSION {
            format!("# {APP_NAME} version {VERSION}")
        } else {
            format!("# {APP_NAME} development version {VERSION}->{TARGET_VERSION}")
        };

        let mut header = String::new();
        header.push_str(&version_line);
        header.push('\n');
        header.push_str(&format!("# Filter {}\n", self.filter.source_path().display()));
        header.push_str(&format!(
            "# with window size ({}, {}) and fit radius {}.\n",
            self.window_width, self.window_height, self.fit_radius
        ));
        header.push_str("#\n");

        header.push_str("# Frame\tTimestamp");
        for k in 1..=self.anchors.len() {
            header.push_str(&format!("\tx_{k}\ty_{k}"));
        }
        header.push('\n');

        writer.write_all(header.as_bytes()).map_err(|e| io_err(output_path, e))
    }

    /// Correlate, refine, and advance every anchor for a single frame,
    /// returning the formatted `.dat` row (1-origin frame number, trailing
    /// newline included).
    fn process_frame(&mut self, frame_idx: usize) -> Result<String> {
        let timestamp = self.movie.frame(frame_idx)?.timestamp();
        let half_w = (self.window_width / 2) as f64;
        let half_h = (self.window_height / 2) as f64;

        let movie = &self.movie;
        let filter = &self.filter;
        let mut columns = Vec::with_capacity(self.anchors.len() * 2);
        for anchor in self.anchors.iter_mut() {
            let frame = movie.frame(frame_idx)?;
            let map = correlate(frame, anchor.x, anchor.y, self.window_width, self.window_height, filter)?;
            let peak = refine_peak(&map, self.fit_radius)?;

            let x = anchor.x as f64 - half_w + peak.x + 1.0;
            let y = anchor.y as f64 - half_h + peak.y + 1.0;

            anchor.x = round_half_up(x - 1.0);
            anchor.y = round_half_up(y - 1.0);

            columns.push(format!("{x:.6}"));
            columns.push(format!("{y:.6}"));
        }

        let mut line = format!("{}\t{}", frame_idx + 1, timestamp);
        for col in columns {
            line.push('\t');
            line.push_str(&col);
        }
        line.push('\n');
        Ok(line)
    }
}

/// Round-half-up: ties round toward positive infinity, matching the
/// tracking loop's anchor-advance rule.
fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}
