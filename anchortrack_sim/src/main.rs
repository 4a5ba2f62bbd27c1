//! AnchorTrack simulation CLI.
//!
//! Runs the tracking engine against a scripted room and reports what it
//! found. Any run is reproducible from its seed.

use anchortrack_sim::{run_scenario, ScenarioConfig};
use clap::Parser;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "anchortrack-sim", about = "AnchorTrack simulation harness")]
struct Args {
    /// Seed for the ground-truth world
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Simulated duration in seconds
    #[arg(long, default_value_t = 5.0)]
    duration: f64,

    /// Main loop tick rate in Hz
    #[arg(long, default_value_t = 30)]
    tick_rate: u32,

    /// Emit the final report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Verbose (debug-level) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("subscriber already set");

    info!(seed = args.seed, duration = args.duration, "starting scenario");

    let report = run_scenario(ScenarioConfig {
        seed: args.seed,
        duration: Duration::from_secs_f64(args.duration),
        tick_rate_hz: args.tick_rate,
        ..Default::default()
    })
    .await;

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("report serialization failed: {err}"),
        }
    } else {
        info!(
            placements = report.final_placements,
            tracked = report.final_tracked,
            menu_added = report.menu_added,
            menu_removed = report.menu_removed,
            "run complete"
        );
    }
}
