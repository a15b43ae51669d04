use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use corrtrack_core::Movie;

#[derive(Args)]
pub struct InfoArgs {
    /// Input movie file (.rawm, .xiseq, .pds, .cine, .tif/.tiff, .png, .jpg, .bmp)
    pub file: PathBuf,

    /// Number of histogram buckets to print for the first frame
    #[arg(long, default_value = "10")]
    pub histogram_bins: usize,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let movie = Movie::open(&args.file)?;

    println!("File:        {}", args.file.display());
    println!("Format:      {:?}", movie.format);
    println!("Frames:      {}", movie.n_frames());
    println!("Dimensions:  {}x{}", movie.width(), movie.height());
    println!("Bits/sample: {}", movie.bits_per_sample());
    println!("Bit depth:   {}", movie.bit_depth);
    if movie.framerate > 0.0 {
        println!("Framerate:   {:.3}", movie.framerate);
    }

    let (min, max) = movie.frame_intensity_min_max(0)?;
    println!("Frame 0 min/max: {}/{}", min, max);

    let histogram = movie.histogram(0, args.histogram_bins)?;
    println!("Frame 0 histogram ({} bins):", args.histogram_bins);
    for (bin, count) in histogram.iter().enumerate() {
        println!("  [{bin:>3}] {count}");
    }

    Ok(())
}
