//! # sound_canvas
//!
//! Paint on a musical grid and hear it.  Strokes arrive as
//! [`CanvasEvent`](event::CanvasEvent)s; every cell a stroke crosses is
//! painted and previewed; `play` walks the painted cells column by column.
//!
//! ## Console commands
//!
//! | Command | Event |
//! |---|---|
//! | `stroke x,y x,y …` | `StrokeBegin`, `StrokeMove`…, `StrokeEnd` |
//! | `undo` / `redo` / `clear` | history |
//! | `play` / `stop` | playback |
//! | `mood <name>` / `bpm <n>` / `brush <r;g;b;a> <w>` | settings |
//! | `grid` | show or hide the cell map |
//! | `save` / `load` / `delete <name>`, `list` | named canvases |
//! | `quit` | leave |
//!
//! Once a canvas has been saved or loaded, every edit is saved back under
//! the same name.

pub mod app;
pub mod config;
pub mod event;
pub mod player;
