//! Inspect and prune a SoundCanvas store file.

use std::path::PathBuf;

use anyhow::{bail, Result};
use canvas_grid::Grid;
use canvas_history::{CanvasStore, JsonFileStore};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "canvas_store", about = "List, show, or delete saved canvases")]
struct Args {
    /// Store file.
    #[arg(long, default_value = "canvases.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List saved canvas names.
    List,
    /// Print a canvas's strokes and a map of its painted cells.
    Show { name: String },
    /// Delete a canvas.
    Delete { name: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut store = JsonFileStore::new(args.store);

    match args.command {
        Command::List => {
            let names = store.list_names()?;
            if names.is_empty() {
                println!("  No canvases saved yet.");
            }
            for name in names {
                println!("  {}", name);
            }
        }
        Command::Show { name } => {
            let Some(record) = store.load(&name)? else {
                bail!("no canvas named \"{name}\"");
            };
            println!("  \"{}\"  mood: {}", name, record.mood.as_deref().unwrap_or("-"));
            for (i, s) in record.strokes.iter().enumerate() {
                println!(
                    "  [{:>3}] {:>4} points  width {:<5} color {}  {} cells",
                    i, s.points.len(), s.line_width, s.color, s.cells.len()
                );
            }
            println!();
            print_cells(&Grid::STANDARD, &record.covered_cells);
        }
        Command::Delete { name } => {
            if store.delete(&name)? {
                println!("  Deleted \"{}\".", name);
            } else {
                bail!("no canvas named \"{name}\"");
            }
        }
    }
    Ok(())
}

fn print_cells(grid: &Grid, cells: &canvas_grid::CoverageSet) {
    for row in 0..grid.rows() {
        let line: String = (0..grid.columns())
            .map(|col| match grid.cell(row, col) {
                Some(c) if cells.contains(c) => '█',
                _ => '·',
            })
            .collect();
        println!("  {}", line);
    }
}
