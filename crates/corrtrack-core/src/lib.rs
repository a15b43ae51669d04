//! Sub-pixel particle-tracking engine: decode a movie from one of several
//! binary/container formats, correlate a reference filter against each
//! frame around a set of tracked anchors, refine the peak to sub-pixel
//! precision, and write the resulting trajectories.

pub mod consts;
pub mod correlation;
pub mod error;
pub mod filter;
pub mod movie;
pub mod pixel_buffer;
pub mod progress;
pub mod subpixel;
pub mod tracker;

pub use error::{CorrTrackError, Result};
pub use filter::Filter;
pub use movie::{Movie, MovieFormat};
pub use pixel_buffer::PixelBuffer;
pub use progress::{NullProgress, ProgressCursor, ProgressReporter};
pub use tracker::{AnchorPoint, Tracker, TrackerConfig};
