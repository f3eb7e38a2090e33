//! The fixed logical grid and the two mappings that hang off it:
//! canvas point → cell, and cell → pitch.
//!
//! Grid dimensions are logical constants; they never follow the canvas's
//! pixel size.  A cell is a single flattened index
//! `row * columns + column`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scale::{Scale, DEGREES};

/// Highest MIDI note number.
pub const MAX_PITCH: u8 = 127;

// ════════════════════════════════════════════════════════════════════════════
// Point
// ════════════════════════════════════════════════════════════════════════════

/// A position in canvas-local coordinates (pixels, origin top-left).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Cell
// ════════════════════════════════════════════════════════════════════════════

/// One discrete grid unit, identified by its flattened index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cell(usize);

impl Cell {
    pub const fn from_index(index: usize) -> Self {
        Cell(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Grid
// ════════════════════════════════════════════════════════════════════════════

/// Logical grid dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grid {
    columns: usize,
    rows:    usize,
}

impl Default for Grid {
    fn default() -> Self {
        Grid::STANDARD
    }
}

impl Grid {
    /// 32 columns × 24 rows.
    pub const STANDARD: Grid = Grid { columns: 32, rows: 24 };

    /// # Panics
    /// If either dimension is zero.
    pub fn new(columns: usize, rows: usize) -> Self {
        assert!(columns > 0 && rows > 0, "grid dimensions must be non-zero");
        Grid { columns, rows }
    }

    pub fn columns(&self) -> usize { self.columns }
    pub fn rows(&self)    -> usize { self.rows }

    /// Total number of cells.
    pub fn len(&self) -> usize { self.columns * self.rows }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Cell at (`row`, `column`), or `None` when either is out of range.
    pub fn cell(&self, row: usize, column: usize) -> Option<Cell> {
        (row < self.rows && column < self.columns)
            .then(|| Cell(row * self.columns + column))
    }

    /// Validate a raw index against this grid.
    pub fn cell_at(&self, index: usize) -> Option<Cell> {
        (index < self.len()).then_some(Cell(index))
    }

    pub fn row_of(&self, cell: Cell) -> usize { cell.0 / self.columns }

    pub fn column_of(&self, cell: Cell) -> usize { cell.0 % self.columns }

    /// Map a canvas point to the cell beneath it.
    ///
    /// The two axes are treated differently: a point left or right of the
    /// canvas yields `None`, while a point above or below is clamped to the
    /// top or bottom row.  Degenerate canvas sizes yield `None`.
    pub fn cell_for_point(&self, point: Point, canvas_width: f64, canvas_height: f64) -> Option<Cell> {
        if !(canvas_width > 0.0 && canvas_height > 0.0)
            || !canvas_width.is_finite()
            || !canvas_height.is_finite()
        {
            return None;
        }

        let cell_width  = canvas_width / self.columns as f64;
        let cell_height = canvas_height / self.rows as f64;

        let column = (point.x / cell_width).floor();
        if !(column >= 0.0 && column < self.columns as f64) {
            return None;
        }

        // f64::max/min discard NaN, so a NaN row lands on row 0.
        let row = (point.y / cell_height)
            .floor()
            .max(0.0)
            .min((self.rows - 1) as f64);

        self.cell(row as usize, column as usize)
    }

    /// Pitch for a row under `scale`.
    ///
    /// Row 0 (the visual top) is the highest pitch: the row is mirrored,
    /// then split into octave and degree.  Saturates at MIDI 127.
    pub fn pitch_for_row(&self, row: usize, scale: &Scale) -> u8 {
        let mirrored = (self.rows - 1).saturating_sub(row);
        let octave   = mirrored / DEGREES;
        let degree   = mirrored % DEGREES;
        let pitch    = scale.degree(degree) as usize + octave * 12;
        pitch.min(MAX_PITCH as usize) as u8
    }

    /// Pitch for a cell; the column plays no part.
    pub fn pitch_for_cell(&self, cell: Cell, scale: &Scale) -> u8 {
        self.pitch_for_row(self.row_of(cell), scale)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::{Mood, DEFAULT_SCALE};

    const G: Grid = Grid::STANDARD;

    #[test]
    #[should_panic(expected = "non-zero")]
    fn zero_sized_grid_is_refused() {
        Grid::new(0, 24);
    }

    #[test]
    fn pitch_formula_matches_table_for_every_row() {
        for mood in Mood::ALL {
            let s = mood.scale();
            for r in 0..24 {
                let expected = s.degree((23 - r) % 7) as usize + ((23 - r) / 7) * 12;
                assert_eq!(G.pitch_for_row(r, &s) as usize, expected, "{mood} row {r}");
            }
        }
    }

    #[test]
    fn pitch_bottom_and_top_rows() {
        // bottom row: mirrored 0 → degree 0, octave 0
        assert_eq!(G.pitch_for_row(23, &DEFAULT_SCALE), 42);
        // top row: mirrored 23 → octave 3, degree 2 → 46 + 36
        assert_eq!(G.pitch_for_row(0, &DEFAULT_SCALE), 82);
    }

    #[test]
    fn pitch_ignores_column() {
        let s = Mood::Epic.scale();
        let a = G.cell(5, 0).unwrap();
        let b = G.cell(5, 31).unwrap();
        assert_eq!(G.pitch_for_cell(a, &s), G.pitch_for_cell(b, &s));
    }

    #[test]
    fn pitch_saturates_at_midi_max() {
        let tall = Grid::new(1, 200);
        assert_eq!(tall.pitch_for_row(0, &Mood::Excited.scale()), MAX_PITCH);
    }

    #[test]
    fn index_is_a_bijection() {
        let mut seen = vec![false; G.len()];
        for row in 0..24 {
            for column in 0..32 {
                let cell = G.cell(row, column).unwrap();
                assert_eq!(cell.index(), row * 32 + column);
                assert_eq!(G.row_of(cell), row);
                assert_eq!(G.column_of(cell), column);
                assert!(!seen[cell.index()]);
                seen[cell.index()] = true;
            }
        }
        assert!(seen.into_iter().all(|s| s));
        assert_eq!(G.len(), 768);
    }

    #[test]
    fn cell_out_of_range_is_none() {
        assert_eq!(G.cell(24, 0), None);
        assert_eq!(G.cell(0, 32), None);
        assert_eq!(G.cell_at(768), None);
        assert_eq!(G.cell_at(767), Some(Cell::from_index(767)));
    }

    #[test]
    fn point_maps_to_cell() {
        // 320×240 canvas → 10×10 px cells
        let c = G.cell_for_point(Point::new(15.0, 25.0), 320.0, 240.0).unwrap();
        assert_eq!((G.row_of(c), G.column_of(c)), (2, 1));

        let last = G.cell_for_point(Point::new(319.9, 239.9), 320.0, 240.0).unwrap();
        assert_eq!(last.index(), 767);
    }

    #[test]
    fn horizontal_overflow_is_dropped() {
        assert_eq!(G.cell_for_point(Point::new(-0.1, 10.0), 320.0, 240.0), None);
        assert_eq!(G.cell_for_point(Point::new(320.0, 10.0), 320.0, 240.0), None);
        assert_eq!(G.cell_for_point(Point::new(f64::NAN, 10.0), 320.0, 240.0), None);
    }

    #[test]
    fn vertical_overflow_is_clamped() {
        let above = G.cell_for_point(Point::new(5.0, -500.0), 320.0, 240.0).unwrap();
        assert_eq!(G.row_of(above), 0);
        let below = G.cell_for_point(Point::new(5.0, 10_000.0), 320.0, 240.0).unwrap();
        assert_eq!(G.row_of(below), 23);
        let nan = G.cell_for_point(Point::new(5.0, f64::NAN), 320.0, 240.0).unwrap();
        assert_eq!(G.row_of(nan), 0);
    }

    #[test]
    fn degenerate_canvas_yields_none() {
        assert_eq!(G.cell_for_point(Point::new(1.0, 1.0), 0.0, 240.0), None);
        assert_eq!(G.cell_for_point(Point::new(1.0, 1.0), 320.0, -1.0), None);
        assert_eq!(G.cell_for_point(Point::new(1.0, 1.0), f64::INFINITY, 240.0), None);
    }

    #[test]
    fn cell_serialises_as_bare_index() {
        assert_eq!(serde_json::to_string(&Cell::from_index(42)).unwrap(), "42");
    }
}
