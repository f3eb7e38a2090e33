//! Top-level application state machine.
//!
//! `AppState` owns the coverage model, the canvas store and the `Player`.
//! It processes `CanvasEvent`s one at a time and folds playback progress
//! into a status line.

use std::io::{self, Write};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use canvas_grid::{Cell, Grid, Mood, Point, Scale, DEFAULT_SCALE};
use canvas_history::{CanvasRecord, CanvasStore, CoverageModel, JsonFileStore, Rgba, StrokeHandle};
use canvas_midi::{PlaybackEvent, SharedSink};

use crate::config::{clamp_tempo, AppConfig, DEFAULT_BRUSH_WIDTH};
use crate::event::{spawn_event_source, CanvasEvent, ConsoleSource};
use crate::player::{Player, PlayerEvent};

const TICK: Duration = Duration::from_millis(50);

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState {
    // ── canvas ───────────────────────────────────────────────────────────
    grid:          Grid,
    canvas_width:  f64,
    canvas_height: f64,
    model:         CoverageModel,
    open:          Option<StrokeHandle>,
    /// Cell under the previous stroke point, so a held cell previews once.
    last_cell:     Option<Cell>,

    // ── brush ────────────────────────────────────────────────────────────
    brush:         Rgba,
    brush_width:   f64,

    // ── music ────────────────────────────────────────────────────────────
    /// `None` after an unknown mood name: the default scale plays.
    mood:          Option<Mood>,
    bpm:           f64,
    preview:       bool,
    player:        Player,
    playing:       bool,

    // ── storage ──────────────────────────────────────────────────────────
    store:         Box<dyn CanvasStore>,
    current_name:  Option<String>,

    show_grid:     bool,
    status:        String,
    status_seq:    u64,
}

impl AppState {
    pub fn new(cfg: &AppConfig, store: Box<dyn CanvasStore>, sink: SharedSink) -> Self {
        let player = Player::spawn(cfg.grid, sink, cfg.velocity, cfg.program);
        AppState {
            grid:          cfg.grid,
            canvas_width:  cfg.canvas_width,
            canvas_height: cfg.canvas_height,
            model:         CoverageModel::new(cfg.grid, cfg.policy),
            open:          None,
            last_cell:     None,
            brush:         Rgba::BLACK,
            brush_width:   DEFAULT_BRUSH_WIDTH,
            mood:          Some(cfg.mood),
            bpm:           clamp_tempo(cfg.bpm),
            preview:       cfg.preview,
            player,
            playing:       false,
            store,
            current_name:  None,
            show_grid:     false,
            status:        format!("Ready. Mood {}, {} BPM. Type `help` for commands.", cfg.mood, clamp_tempo(cfg.bpm)),
            status_seq:    0,
        }
    }

    // ── process one CanvasEvent ──────────────────────────────────────────

    pub fn handle_event(&mut self, event: CanvasEvent) {
        match event {
            // ── Drawing ──────────────────────────────────────────────────
            CanvasEvent::StrokeBegin { point } => {
                self.finish_stroke();
                self.begin_stroke();
                self.paint(point);
            }
            CanvasEvent::StrokeMove { point } => {
                if self.open.is_none() {
                    self.begin_stroke();
                }
                self.paint(point);
            }
            CanvasEvent::StrokeEnd => self.finish_stroke(),

            // ── History ──────────────────────────────────────────────────
            CanvasEvent::Undo => match self.model.undo() {
                Some(stroke) => {
                    self.set_status(format!("Undid a stroke of {} cell(s)", stroke.cells.len()));
                    self.autosave();
                }
                None => self.set_status("Nothing to undo"),
            },
            CanvasEvent::Redo => match self.model.redo() {
                Some(stroke) => {
                    self.set_status(format!("Redid a stroke of {} cell(s)", stroke.cells.len()));
                    self.autosave();
                }
                None => self.set_status("Nothing to redo"),
            },
            CanvasEvent::Clear => {
                self.open = None;
                self.model.clear();
                self.set_status("Canvas cleared");
                self.autosave();
            }

            // ── Playback ─────────────────────────────────────────────────
            CanvasEvent::Play => {
                if self.playing {
                    self.set_status("Already playing");
                } else {
                    self.playing = true;
                    self.player.play(self.model.coverage().clone(), self.scale(), self.bpm);
                    self.set_status(format!(
                        "Playing {} cell(s) at {} BPM",
                        self.model.coverage().len(),
                        self.bpm
                    ));
                }
            }
            CanvasEvent::Stop => {
                self.player.stop();
                if self.playing {
                    self.set_status("Stopping");
                }
            }

            // ── Settings ─────────────────────────────────────────────────
            CanvasEvent::SetMood(name) => match Mood::from_name(&name) {
                Some(mood) => {
                    self.mood = Some(mood);
                    self.set_status(format!("Mood: {mood}"));
                }
                None => {
                    warn!(mood = %name, "unknown mood; using the default scale");
                    self.mood = None;
                    self.set_status(format!("Unknown mood \"{name}\"; using the default scale"));
                }
            },
            CanvasEvent::SetTempo(bpm) => {
                self.bpm = clamp_tempo(bpm);
                self.set_status(format!("Tempo: {} BPM", self.bpm));
            }
            CanvasEvent::SetBrush { color, width } => {
                if width.is_finite() && width > 0.0 {
                    self.brush = color;
                    self.brush_width = width;
                    self.set_status(format!("Brush: {color}, width {width}"));
                } else {
                    self.set_status(format!("Brush width must be positive, got {width}"));
                }
            }
            CanvasEvent::ToggleGrid => {
                self.show_grid = !self.show_grid;
                self.set_status(if self.show_grid { "Grid shown" } else { "Grid hidden" });
            }

            // ── Storage ──────────────────────────────────────────────────
            CanvasEvent::Save { name } => self.save(name.trim()),
            CanvasEvent::Load { name } => self.load(name.trim()),
            CanvasEvent::Delete { name } => self.delete(name.trim()),
            CanvasEvent::List => match self.store.list_names() {
                Ok(names) if names.is_empty() => self.set_status("No canvases saved yet"),
                Ok(names) => self.set_status(format!("Saved canvases: {}", names.join(", "))),
                Err(e) => self.store_failed("list canvases", e),
            },

            CanvasEvent::Quit => { /* handled in the run loop */ }
        }
    }

    // ── drawing ──────────────────────────────────────────────────────────

    fn begin_stroke(&mut self) {
        self.open = Some(self.model.begin_stroke(self.brush, self.brush_width));
        self.last_cell = None;
    }

    fn paint(&mut self, point: Point) {
        let Some(handle) = self.open else { return };
        let cell = self.grid.cell_for_point(point, self.canvas_width, self.canvas_height);
        if let Err(e) = self.model.extend(handle, point, cell) {
            warn!("stroke point dropped: {e}");
            return;
        }
        if let Some(cell) = cell {
            if self.preview && self.last_cell != Some(cell) {
                self.player.preview(self.grid.pitch_for_cell(cell, &self.scale()));
            }
        }
        self.last_cell = cell;
    }

    /// Drop a stroke left open when input ends, with the cells it painted.
    fn abandon_stroke(&mut self) {
        let Some(handle) = self.open.take() else { return };
        self.last_cell = None;
        match self.model.cancel_stroke(handle) {
            Ok(stroke) => debug!(cells = stroke.cells.len(), "unfinished stroke discarded"),
            Err(e) => warn!("stroke lost: {e}"),
        }
    }

    fn finish_stroke(&mut self) {
        let Some(handle) = self.open.take() else { return };
        let cells = self.model.open_stroke(handle).map_or(0, |s| s.cells.len());
        match self.model.commit_stroke(handle) {
            Ok(()) => {
                self.set_status(format!(
                    "Stroke of {} cell(s); {} painted",
                    cells,
                    self.model.coverage().len()
                ));
                self.autosave();
            }
            Err(e) => warn!("stroke lost: {e}"),
        }
    }

    // ── storage ──────────────────────────────────────────────────────────

    fn record(&self) -> CanvasRecord {
        let record = self.model.to_record();
        match self.mood {
            Some(mood) => record.with_mood(mood),
            None => record,
        }
    }

    fn save(&mut self, name: &str) {
        match self.store.save(name, &self.record()) {
            Ok(()) => {
                self.current_name = Some(name.to_string());
                self.set_status(format!("Saved \"{name}\""));
            }
            Err(e) => self.store_failed("save", e),
        }
    }

    fn load(&mut self, name: &str) {
        match self.store.load(name) {
            Ok(Some(record)) => {
                let mood = record.known_mood();
                let had_mood = record.mood.is_some();
                self.open = None;
                self.model.restore(record.strokes, record.covered_cells);
                if let Some(mood) = mood {
                    self.mood = Some(mood);
                } else if had_mood {
                    warn!(name, "saved mood not recognised; using the default scale");
                    self.mood = None;
                }
                self.current_name = Some(name.to_string());
                self.set_status(format!(
                    "Loaded \"{name}\": {} stroke(s), {} cell(s)",
                    self.model.strokes().len(),
                    self.model.coverage().len()
                ));
            }
            Ok(None) => self.set_status(format!("No canvas named \"{name}\"")),
            Err(e) => self.store_failed("load", e),
        }
    }

    fn delete(&mut self, name: &str) {
        match self.store.delete(name) {
            Ok(true) => {
                if self.current_name.as_deref() == Some(name) {
                    self.current_name = None;
                }
                self.set_status(format!("Deleted \"{name}\""));
            }
            Ok(false) => self.set_status(format!("No canvas named \"{name}\"")),
            Err(e) => self.store_failed("delete", e),
        }
    }

    /// Re-save under the current name after an edit.
    fn autosave(&mut self) {
        let Some(name) = self.current_name.clone() else { return };
        if let Err(e) = self.store.save(&name, &self.record()) {
            warn!(name, "autosave failed: {e}");
        }
    }

    fn store_failed(&mut self, what: &str, e: canvas_history::StoreError) {
        warn!("could not {what}: {e}");
        self.set_status(format!("Could not {what}: {e}"));
    }

    // ── per-loop tick ────────────────────────────────────────────────────

    /// Fold pending playback progress into the state.
    pub fn tick(&mut self) {
        for event in self.player.drain_events() {
            match event {
                PlayerEvent::Playback(PlaybackEvent::Started { columns, notes }) => {
                    self.playing = true;
                    self.set_status(format!("♪ {notes} note(s) over {columns} columns"));
                }
                PlayerEvent::Playback(PlaybackEvent::Column { column, pitches }) => {
                    if !pitches.is_empty() {
                        self.set_status(format!("♪ column {column:>2}: {pitches:?}"));
                    }
                }
                PlayerEvent::Playback(PlaybackEvent::Finished) => {
                    self.playing = false;
                    self.set_status("Playback finished");
                }
                PlayerEvent::Playback(PlaybackEvent::Cancelled) => {
                    self.playing = false;
                    self.set_status("Playback stopped");
                }
                PlayerEvent::Rejected(reason) => self.set_status(format!("Cannot play: {reason}")),
            }
        }
    }

    /// The painted cells as text, one line per row.
    pub fn render_cells(&self) -> String {
        let mut out = String::new();
        for row in 0..self.grid.rows() {
            out.push_str("  ");
            for col in 0..self.grid.columns() {
                let painted = self.grid.cell(row, col).is_some_and(|c| self.model.coverage().contains(c));
                out.push(if painted { '█' } else { '·' });
            }
            out.push_str(&format!("  {}\n", self.grid.pitch_for_row(row, &self.scale())));
        }
        out
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        self.status_seq += 1;
    }

    // ── accessors ────────────────────────────────────────────────────────

    pub fn scale(&self) -> Scale {
        self.mood.map_or(DEFAULT_SCALE, Mood::scale)
    }

    pub fn model(&self)        -> &CoverageModel    { &self.model }
    pub fn store(&self)        -> &dyn CanvasStore  { self.store.as_ref() }
    pub fn mood(&self)         -> Option<Mood>      { self.mood }
    pub fn bpm(&self)          -> f64               { self.bpm }
    pub fn brush(&self)        -> (Rgba, f64)       { (self.brush, self.brush_width) }
    pub fn current_name(&self) -> Option<&str>      { self.current_name.as_deref() }
    pub fn is_playing(&self)   -> bool              { self.playing }
    pub fn show_grid(&self)    -> bool              { self.show_grid }
    pub fn status(&self)       -> &str              { &self.status }

    /// Stop playback and release every sounding note.
    pub fn shutdown(self) {
        self.player.quit();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run(): the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the console application until `quit` or end of input.
///
/// Fails up front when the store file's directory does not exist.
pub fn run(cfg: AppConfig) -> Result<()> {
    if let Some(dir) = cfg.store_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.is_dir() {
            bail!("canvas store directory {} does not exist", dir.display());
        }
    }
    let store = JsonFileStore::new(&cfg.store_path);
    info!(path = %cfg.store_path.display(), "using canvas store");
    let app = AppState::new(&cfg, Box::new(store), cfg.open_sink());
    let events = spawn_event_source(ConsoleSource::stdin());
    let mut stdout = io::stdout();
    let app = drive(app, events, &mut stdout);
    app.shutdown();
    stdout.flush()?;
    Ok(())
}

/// Feed `events` into `app`, printing each new status line (and the cell
/// map when shown) to `out`.  Returns when a `Quit` arrives or the source
/// hangs up.  A stroke still open at that point is discarded.
pub fn drive<W: Write>(mut app: AppState, events: Receiver<CanvasEvent>, out: &mut W) -> AppState {
    let mut shown = app.status_seq;
    writeln!(out, "  {}", app.status).ok();

    loop {
        match events.recv_timeout(TICK) {
            Ok(CanvasEvent::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(event) => {
                let redraw = event.edits_canvas();
                app.handle_event(event);
                if redraw && app.show_grid {
                    write!(out, "{}", app.render_cells()).ok();
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        app.tick();
        if app.status_seq != shown {
            shown = app.status_seq;
            writeln!(out, "  {}", app.status).ok();
        }
    }
    app.abandon_stroke();
    app
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
