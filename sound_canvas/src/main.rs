//! sound_canvas: interactive entry point.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use canvas_grid::Mood;
use canvas_history::CoveragePolicy;
use canvas_midi::DEFAULT_VELOCITY;
use sound_canvas::app::run;
use sound_canvas::config::{parse_canvas_size, AppConfig, DEFAULT_BPM};

#[derive(Parser, Debug)]
#[command(name = "sound_canvas", about = "Paint cells on a grid and play them as music")]
struct Args {
    /// Store file for named canvases.
    #[arg(long, default_value = "canvases.json")]
    store: PathBuf,

    #[arg(long, value_enum, default_value_t = Mood::Happy)]
    mood: Mood,

    /// Tempo, clamped to 60–400.
    #[arg(long, default_value_t = DEFAULT_BPM)]
    bpm: f64,

    #[arg(long, default_value_t = DEFAULT_VELOCITY)]
    velocity: u8,

    /// General MIDI program number.
    #[arg(long, default_value_t = 0)]
    program: u8,

    /// Use the first MIDI output whose name contains this.
    #[arg(long)]
    port: Option<String>,

    /// Do not open a MIDI output.
    #[arg(long)]
    mute: bool,

    /// Do not sound cells while drawing.
    #[arg(long)]
    no_preview: bool,

    /// Keep a cell painted while any remaining stroke covers it.
    #[arg(long)]
    ref_counted: bool,

    /// Drawing surface that stroke points are measured in.
    #[arg(long, value_parser = parse_canvas_size, default_value = "1024x768")]
    canvas_size: (f64, f64),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Sound Canvas — paint a grid, hear the music         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let (canvas_width, canvas_height) = args.canvas_size;
    let cfg = AppConfig {
        canvas_width,
        canvas_height,
        mood:       args.mood,
        bpm:        args.bpm,
        velocity:   args.velocity.min(127),
        program:    args.program.min(127),
        policy:     if args.ref_counted { CoveragePolicy::RefCounted } else { CoveragePolicy::Unconditional },
        preview:    !args.no_preview,
        store_path: args.store,
        port:       args.port,
        mute:       args.mute,
        ..AppConfig::default()
    };

    run(cfg)
}
