use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorrTrackError {
    #[error("I/O error reading {path}: {cause}")]
    Io {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    #[error("unsupported: {reason}")]
    Unsupported { reason: String },

    #[error("corrupt file: {reason}")]
    Corrupt { reason: String },

    #[error("filter file rejected: {0}")]
    FilterFormat(String),

    #[error("pixel ({x}, {y}) out of bounds for {width}x{height} buffer")]
    OutOfBounds { x: u32, y: u32, width: u32, height: u32 },

    #[error("frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("correlation window escapes image bounds")]
    WindowOutOfBounds,

    #[error("fit radius selects {found} point(s), at least 6 required")]
    FitUnderdetermined { found: usize },

    #[error("sub-pixel fit is degenerate (zero denominator)")]
    FitDegenerate,

    #[error("analysis aborted at frame {frame}, partial output at {partial_output_path}: {cause}")]
    AnalyseError {
        partial_output_path: PathBuf,
        frame: usize,
        #[source]
        cause: Box<CorrTrackError>,
    },
}

pub type Result<T> = std::result::Result<T, CorrTrackError>;

/// Attach a path to an I/O error, the common case at decoder entry points.
pub(crate) fn io_err(path: &std::path::Path, cause: std::io::Error) -> CorrTrackError {
    CorrTrackError::Io {
        path: path.to_path_buf(),
        cause,
    }
}
