//! Export a saved canvas as a Standard MIDI File.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use canvas_grid::{Grid, Mood};
use canvas_history::{CanvasStore, JsonFileStore};
use canvas_midi::{plan, write_file, SmfOptions, DEFAULT_VELOCITY};

#[derive(Parser, Debug)]
#[command(name = "canvas_export", about = "Write a saved canvas to a .mid file")]
struct Args {
    /// Store file.
    #[arg(long, default_value = "canvases.json")]
    store: PathBuf,

    /// Canvas to export.
    #[arg(long)]
    name: String,

    /// Mood to play in; defaults to the one saved with the canvas.
    #[arg(long, value_enum)]
    mood: Option<Mood>,

    #[arg(long, default_value_t = 100.0)]
    bpm: f64,

    /// General MIDI program number.
    #[arg(long, default_value_t = 0)]
    program: u8,

    #[arg(long, default_value_t = DEFAULT_VELOCITY)]
    velocity: u8,

    /// Output file; `<name>.mid` when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = JsonFileStore::new(&args.store);
    let Some(record) = store.load(&args.name)? else {
        bail!("no canvas named \"{}\" in {}", args.name, args.store.display());
    };

    let scale = match args.mood {
        Some(mood) => mood.scale(),
        None => record.scale(),
    };
    let grid = Grid::STANDARD;
    let notes = plan(&grid, &record.covered_cells, &scale, args.bpm)?;

    let out = args.out.unwrap_or_else(|| PathBuf::from(format!("{}.mid", args.name)));
    let opts = SmfOptions {
        program:  args.program.min(127),
        velocity: args.velocity.min(127),
        name:     args.name.clone(),
        ..SmfOptions::default()
    };
    write_file(&out, &notes, args.bpm, &opts)
        .with_context(|| format!("writing {}", out.display()))?;

    info!(notes = notes.len(), path = %out.display(), "exported");
    println!("  Wrote {} notes to {}", notes.len(), out.display());
    Ok(())
}
