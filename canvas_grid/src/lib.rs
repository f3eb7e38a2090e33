//! # canvas_grid
//!
//! The musical grid behind SoundCanvas: a fixed logical grid of cells, the
//! mood → scale table, and the mapping from canvas points to cells and from
//! cells to pitches.
//!
//! ```rust
//! use canvas_grid::{Grid, Mood, Point};
//!
//! let grid = Grid::STANDARD;                       // 32 × 24
//! let cell = grid
//!     .cell_for_point(Point::new(5.0, 235.0), 320.0, 240.0)
//!     .unwrap();
//! assert_eq!(grid.row_of(cell), 23);               // bottom row
//! assert_eq!(grid.pitch_for_cell(cell, &Mood::Happy.scale()), 42);
//! ```
//!
//! ## Pitch layout
//!
//! | Row | Mirrored | Octave | Degree |
//! |---|---|---|---|
//! | 23 (bottom) | 0 | 0 | 0 |
//! | 17 | 6 | 0 | 6 |
//! | 16 | 7 | 1 | 0 |
//! | 0 (top) | 23 | 3 | 2 |

pub mod coverage;
pub mod grid;
pub mod scale;

pub use coverage::CoverageSet;
pub use grid::{Cell, Grid, Point, MAX_PITCH};
pub use scale::{scale_for, Mood, Scale, ScaleError, DEFAULT_SCALE, DEGREES};
