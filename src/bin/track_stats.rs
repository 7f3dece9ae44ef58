//! track_stats - validate and summarize a trackd session log

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use marker_track::{summarize, output::Extent, SessionLogReader, DEFAULT_TICKS_PER_SECOND};

#[derive(Parser, Debug)]
#[command(name = "track_stats", about = "Validate and summarize a trackd session log")]
struct Args {
    /// Session log to summarize.
    #[arg(value_name = "LOG")]
    log: PathBuf,

    /// Tick rate of the timestamp counter the log was recorded against.
    #[arg(long, default_value_t = DEFAULT_TICKS_PER_SECOND)]
    ticks_per_second: u32,

    /// Emit the summary as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let records = SessionLogReader::read_all(&args.log)?;
    let summary = summarize(&records, args.ticks_per_second);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("rows:           {}", summary.rows);
    println!("duration:       {:.2} s", summary.duration_secs);
    match summary.avg_fps {
        Some(fps) => println!("average rate:   {:.2} fps", fps),
        None => println!("average rate:   n/a"),
    }
    println!("red dropouts:   {}", summary.red_dropouts);
    println!("green dropouts: {}", summary.green_dropouts);
    print_extent("red extent", summary.red_extent);
    print_extent("green extent", summary.green_extent);
    Ok(())
}

fn print_extent(label: &str, extent: Option<Extent>) {
    match extent {
        Some(e) => println!(
            "{}:{}x {}..{}  y {}..{}",
            label,
            " ".repeat(15usize.saturating_sub(label.len())),
            e.min_x,
            e.max_x,
            e.min_y,
            e.max_y
        ),
        None => println!(
            "{}:{}(no detections)",
            label,
            " ".repeat(15usize.saturating_sub(label.len()))
        ),
    }
}
