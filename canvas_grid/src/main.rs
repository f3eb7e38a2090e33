//! Print the row → pitch layout of the grid for one or all moods.

use canvas_grid::{Grid, Mood};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pitch_table", about = "Show which pitch each grid row plays")]
struct Args {
    /// Mood to show; all moods when omitted.
    #[arg(long, value_enum)]
    mood: Option<Mood>,

    /// Number of grid rows.
    #[arg(long, default_value_t = Grid::STANDARD.rows())]
    rows: usize,
}

fn main() {
    let args = Args::parse();
    let grid = Grid::new(Grid::STANDARD.columns(), args.rows.max(1));
    let moods: Vec<Mood> = match args.mood {
        Some(m) => vec![m],
        None    => Mood::ALL.to_vec(),
    };

    print!("  row │");
    for m in &moods {
        print!(" {:>10}", m.name());
    }
    println!();
    println!("  ────┼{}", "─".repeat(11 * moods.len()));

    for row in 0..grid.rows() {
        print!("  {:>3} │", row);
        for m in &moods {
            let pitch = grid.pitch_for_row(row, &m.scale());
            print!(" {:>6} {:<3}", pitch, note_name(pitch));
        }
        println!();
    }
}

fn note_name(pitch: u8) -> String {
    const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NAMES[(pitch % 12) as usize], octave)
}
