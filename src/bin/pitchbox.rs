use clap::Parser;
use pitchbox::{
    common::box_error::BoxError,
    sound::client::{self, EngineOpts},
};

/// Measure, tune and resynthesize the pitch of a live jack input
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Energy measurement window in seconds
    #[arg(long)]
    energy_window: Option<f32>,

    /// Lowest detectable frequency in Hz
    #[arg(long)]
    min_freq: Option<f32>,

    /// Highest detectable frequency in Hz
    #[arg(long)]
    max_freq: Option<f32>,

    /// Block energy below which input counts as silence
    #[arg(long)]
    min_level: Option<f32>,

    /// Correlation window in seconds
    #[arg(short = 'n', long)]
    window: Option<f32>,

    /// Capture ring length in seconds
    #[arg(short = 'r', long)]
    ring: Option<f32>,

    /// Settings file to read before applying flags
    #[arg(short, long)]
    config: Option<String>,
}

fn main() -> Result<(), BoxError> {
    env_logger::init();
    let args = Args::parse();

    let mut opts = EngineOpts::from_config(args.config.as_deref())?;
    if let Some(v) = args.energy_window {
        opts.energy_window_seconds = v;
    }
    if let Some(v) = args.min_freq {
        opts.min_freq = v;
    }
    if let Some(v) = args.max_freq {
        opts.max_freq = v;
    }
    if let Some(v) = args.min_level {
        opts.min_level = v;
    }
    if let Some(v) = args.window {
        opts.window_seconds = v;
    }
    if let Some(v) = args.ring {
        opts.ring_seconds = v;
    }

    client::run(opts)?;
    Ok(())
}
