use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use corrtrack_core::{Filter, Movie, Tracker, TrackerConfig};

#[derive(Args)]
pub struct TrackArgs {
    /// Input movie file
    pub file: Option<PathBuf>,

    /// Tracking session config file (TOML); overrides the discrete flags below
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Filter file (tab-separated f64 rows)
    #[arg(long)]
    pub filter: Option<PathBuf>,

    /// Window width
    #[arg(long)]
    pub window_width: Option<u32>,

    /// Window height
    #[arg(long)]
    pub window_height: Option<u32>,

    /// Sub-pixel fit radius
    #[arg(long, default_value = "2.0")]
    pub fit_radius: f64,

    /// Anchor coordinates as repeated "x,y" pairs
    #[arg(long = "anchor")]
    pub anchors: Vec<String>,

    /// Output .dat trajectory file path
    #[arg(short, long, default_value = "trajectory.dat")]
    pub output: PathBuf,
}

fn parse_anchor(s: &str) -> Result<(i64, i64)> {
    let (x, y) = s.split_once(',').ok_or_else(|| anyhow::anyhow!("anchor {s:?} must be of the form x,y"))?;
    Ok((x.trim().parse()?, y.trim().parse()?))
}

pub fn run(args: &TrackArgs) -> Result<()> {
    let mut tracker = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config {}", config_path.display()))?;
        let config: TrackerConfig = toml::from_str(&contents).context("invalid tracker config")?;
        Tracker::from_config(&config)?
    } else {
        let file = args.file.as_ref().context("a movie FILE or --config is required")?;
        let filter_path = args.filter.as_ref().context("--filter is required without --config")?;
        let window_width = args.window_width.context("--window-width is required without --config")?;
        let window_height = args.window_height.context("--window-height is required without --config")?;

        if args.anchors.is_empty() {
            bail!("at least one --anchor is required without --config");
        }

        let movie = Movie::open(file)?;
        let filter = Filter::load(filter_path)?;
        let mut tracker = Tracker::new(movie, filter, window_width, window_height, args.fit_radius);
        for anchor in &args.anchors {
            let (x, y) = parse_anchor(anchor)?;
            tracker.add_point(x, y);
        }
        tracker
    };

    let n_frames = tracker.movie().n_frames();
    let pb = ProgressBar::new(n_frames as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    pb.set_message("Tracking");

    let reporter = CliProgress { bar: pb.clone() };
    tracker.run(&args.output, &reporter, None)?;

    pb.finish_with_message("Done");
    println!("Trajectory written to {}", args.output.display());

    Ok(())
}

struct CliProgress {
    bar: ProgressBar,
}

impl corrtrack_core::ProgressReporter for CliProgress {
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
