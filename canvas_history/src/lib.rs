//! # canvas_history
//!
//! Everything a SoundCanvas drawing is made of once the pixels are gone:
//! strokes, the set of painted cells, undo/redo history, and named storage.
//!
//! ```rust
//! use canvas_grid::{Grid, Point};
//! use canvas_history::{CoverageModel, CoveragePolicy, Rgba};
//!
//! let grid = Grid::STANDARD;
//! let mut model = CoverageModel::new(grid, CoveragePolicy::Unconditional);
//!
//! let stroke = model.begin_stroke(Rgba::BLACK, 5.0);
//! for x in [5.0, 15.0, 25.0] {
//!     let p = Point::new(x, 100.0);
//!     model.extend(stroke, p, grid.cell_for_point(p, 320.0, 240.0)).unwrap();
//! }
//! model.commit_stroke(stroke).unwrap();
//! assert_eq!(model.coverage().len(), 3);
//!
//! model.undo();
//! assert!(model.coverage().is_empty());
//! ```

pub mod color;
pub mod model;
pub mod store;
pub mod stroke;

pub use color::Rgba;
pub use model::{CoverageModel, CoveragePolicy, History, HistoryError, StrokeHandle};
pub use store::{CanvasRecord, CanvasStore, JsonFileStore, MemoryStore, StoreError};
pub use stroke::{RawStroke, Stroke, StrokeError};
