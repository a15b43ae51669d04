use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use corrtrack_core::{Movie, ProgressReporter};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Args)]
pub struct ExportTiffArgs {
    /// Input movie file
    pub file: PathBuf,

    /// Export a single frame instead of the whole movie
    #[arg(long)]
    pub frame: Option<usize>,
}

pub fn run(args: &ExportTiffArgs) -> Result<()> {
    let movie = Movie::open(&args.file)?;

    if let Some(frame) = args.frame {
        let written = movie.export_tiff(frame)?;
        println!("Frame {frame} exported to {}", written.display());
        return Ok(());
    }

    let pb = ProgressBar::new(movie.n_frames() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    pb.set_message("Exporting frames");

    struct CliProgress {
        bar: ProgressBar,
    }
    impl ProgressReporter for CliProgress {
        fn begin(&self, total: usize) {
            self.bar.set_length(total as u64);
        }
        fn advance(&self, step: usize) {
            self.bar.set_position(step as u64);
        }
        fn finish(&self) {
            self.bar.set_position(self.bar.length().unwrap_or(0));
        }
    }

    let dir = movie.export_all_tiffs(&CliProgress { bar: pb.clone() })?;
    pb.finish_with_message("Done");
    println!("All frames exported to {}", dir.display());

    Ok(())
}
