use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use corrtrack_core::{Filter, Movie, Tracker};

#[derive(Args)]
pub struct TestCorrelationArgs {
    /// Input movie file
    pub file: PathBuf,

    /// Filter file (tab-separated f64 rows)
    #[arg(long)]
    pub filter: PathBuf,

    /// Frame index to preview
    #[arg(long, default_value = "0")]
    pub frame: usize,

    /// Window width
    #[arg(long)]
    pub window_width: u32,

    /// Window height
    #[arg(long)]
    pub window_height: u32,

    /// Anchor coordinates as repeated "x,y" pairs
    #[arg(long = "anchor", required = true)]
    pub anchors: Vec<String>,
}

fn parse_anchor(s: &str) -> Result<(i64, i64)> {
    let (x, y) = s.split_once(',').ok_or_else(|| anyhow::anyhow!("anchor {s:?} must be of the form x,y"))?;
    Ok((x.trim().parse()?, y.trim().parse()?))
}

pub fn run(args: &TestCorrelationArgs) -> Result<()> {
    if args.anchors.is_empty() {
        bail!("at least one --anchor is required");
    }
    let movie = Movie::open(&args.file)?;
    let filter = Filter::load(&args.filter)?;

    let mut tracker = Tracker::new(movie, filter, args.window_width, args.window_height, 0.0);
    for anchor in &args.anchors {
        let (x, y) = parse_anchor(anchor)?;
        tracker.add_point(x, y);
    }

    let maps = tracker.test_correlation(args.frame)?;
    for (k, map) in maps.iter().enumerate() {
        println!("Anchor {k}: {}x{} correlation map", map.width(), map.height());
        for j in 0..map.height() {
            let row: Vec<String> = (0..map.width()).map(|i| format!("{:.2}", map.get(i, j))).collect();
            println!("  {}", row.join(" "));
        }
    }

    Ok(())
}
