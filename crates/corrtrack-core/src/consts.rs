/// Minimum window area (w*h) to use row-level Rayon parallelism in the
/// correlation engine's inner loop.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 4_096;

/// Number of coefficients in the 2-D quadratic surface fit by
/// [`crate::subpixel`] (a, b, c, d, e, f in `a*dx^2 + b*dx*dy + c*dy^2 + d*dx + e*dy + f`).
pub const FIT_COEFFS: usize = 6;

pub const APP_NAME: &str = "CorrTrack";
pub const VERSION: &str = "1.0.0";
pub const TARGET_VERSION: &str = "1.0.0";
