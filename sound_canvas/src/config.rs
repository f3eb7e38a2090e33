//! Application configuration.

use std::path::PathBuf;

use thiserror::Error;

use canvas_grid::{Grid, Mood};
use canvas_history::CoveragePolicy;
use canvas_midi::{open_midi_output, shared, shared_boxed, NullSink, SharedSink, DEFAULT_VELOCITY};

pub const DEFAULT_BPM: f64 = 100.0;
pub const MIN_BPM:     f64 = 60.0;
pub const MAX_BPM:     f64 = 400.0;

pub const DEFAULT_BRUSH_WIDTH: f64 = 5.0;

/// Keep a tempo inside the playable range.  Non-numbers give the default.
pub fn clamp_tempo(bpm: f64) -> f64 {
    if bpm.is_finite() {
        bpm.clamp(MIN_BPM, MAX_BPM)
    } else {
        DEFAULT_BPM
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("canvas size must look like 1024x768, got \"{0}\"")]
    BadCanvasSize(String),
}

/// Parse `WIDTHxHEIGHT` (both positive).
pub fn parse_canvas_size(text: &str) -> Result<(f64, f64), ConfigError> {
    let bad = || ConfigError::BadCanvasSize(text.to_string());
    let (w, h) = text.split_once(['x', 'X']).ok_or_else(bad)?;
    let w: f64 = w.trim().parse().map_err(|_| bad())?;
    let h: f64 = h.trim().parse().map_err(|_| bad())?;
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        return Err(bad());
    }
    Ok((w, h))
}

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub grid:          Grid,
    /// Size of the drawing surface that stroke points are measured in.
    pub canvas_width:  f64,
    pub canvas_height: f64,
    pub mood:          Mood,
    pub bpm:           f64,
    pub velocity:      u8,
    pub program:       u8,
    pub channel:       u8,
    pub policy:        CoveragePolicy,
    /// Sound each cell as it is painted.
    pub preview:       bool,
    pub store_path:    PathBuf,
    /// Substring of the MIDI output port to use.
    pub port:          Option<String>,
    pub mute:          bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            grid:          Grid::STANDARD,
            canvas_width:  1024.0,
            canvas_height: 768.0,
            mood:          Mood::default(),
            bpm:           DEFAULT_BPM,
            velocity:      DEFAULT_VELOCITY,
            program:       0,
            channel:       0,
            policy:        CoveragePolicy::default(),
            preview:       true,
            store_path:    PathBuf::from("canvases.json"),
            port:          None,
            mute:          false,
        }
    }
}

impl AppConfig {
    /// The configured MIDI output, or a silent sink when muted.
    pub fn open_sink(&self) -> SharedSink {
        if self.mute {
            shared(NullSink)
        } else {
            shared_boxed(open_midi_output(self.port.as_deref(), self.channel))
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
