//! Named canvas storage.
//!
//! A [`CanvasStore`] maps user-chosen names to [`CanvasRecord`]s.  A missing
//! name is an ordinary outcome (`None` / `false`); [`StoreError`] is reserved
//! for the backing medium failing.
//!
//! [`JsonFileStore`] keeps every canvas in one JSON document, keyed by name,
//! the same shape as the single preferences blob older saves live in.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use canvas_grid::{scale_for, CoverageSet, Mood, Scale};

use crate::stroke::{RawStroke, Stroke};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("canvas name must not be empty")]
    EmptyName,

    #[error("canvas store I/O on {path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode canvas store: {0}")]
    Encode(#[from] serde_json::Error),
}

// ════════════════════════════════════════════════════════════════════════════
// CanvasRecord
// ════════════════════════════════════════════════════════════════════════════

/// A saved drawing: its strokes, its painted cells, and optionally the mood
/// it was drawn in.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawRecord")]
pub struct CanvasRecord {
    #[serde(rename = "paths")]
    pub strokes:       Vec<Stroke>,
    pub covered_cells: CoverageSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood:          Option<String>,
}

impl CanvasRecord {
    pub fn new(strokes: Vec<Stroke>, covered_cells: CoverageSet) -> Self {
        CanvasRecord { strokes, covered_cells, mood: None }
    }

    pub fn with_mood(mut self, mood: Mood) -> Self {
        self.mood = Some(mood.name().to_string());
        self
    }

    /// The recorded mood, if it names one we know.
    pub fn known_mood(&self) -> Option<Mood> {
        self.mood.as_deref().and_then(Mood::from_name)
    }

    /// Scale for the recorded mood; the default scale when the mood is
    /// absent or unrecognised.
    pub fn scale(&self) -> Scale {
        scale_for(self.mood.as_deref().unwrap_or_default())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    paths:         Vec<RawStroke>,
    covered_cells: CoverageSet,
    #[serde(default)]
    mood:          Option<String>,
}

impl From<RawRecord> for CanvasRecord {
    fn from(raw: RawRecord) -> Self {
        let strokes = raw
            .paths
            .into_iter()
            .enumerate()
            .filter_map(|(i, raw)| match Stroke::try_from(raw) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!(stroke = i, "skipping malformed stroke: {e}");
                    None
                }
            })
            .collect();
        CanvasRecord { strokes, covered_cells: raw.covered_cells, mood: raw.mood }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CanvasStore
// ════════════════════════════════════════════════════════════════════════════

/// String-keyed store of named canvases.
pub trait CanvasStore: Send {
    /// Create or overwrite `name`.
    fn save(&mut self, name: &str, record: &CanvasRecord) -> Result<(), StoreError>;

    fn load(&self, name: &str) -> Result<Option<CanvasRecord>, StoreError>;

    /// All names, sorted.
    fn list_names(&self) -> Result<Vec<String>, StoreError>;

    /// Returns false when nothing was stored under `name`.
    fn delete(&mut self, name: &str) -> Result<bool, StoreError>;
}

fn check_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::EmptyName);
    }
    Ok(())
}

// ── MemoryStore ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
    canvases: BTreeMap<String, CanvasRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl CanvasStore for MemoryStore {
    fn save(&mut self, name: &str, record: &CanvasRecord) -> Result<(), StoreError> {
        check_name(name)?;
        self.canvases.insert(name.to_string(), record.clone());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<CanvasRecord>, StoreError> {
        Ok(self.canvases.get(name).cloned())
    }

    fn list_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.canvases.keys().cloned().collect())
    }

    fn delete(&mut self, name: &str) -> Result<bool, StoreError> {
        Ok(self.canvases.remove(name).is_some())
    }
}

// ── JsonFileStore ────────────────────────────────────────────────────────

/// Every canvas in one JSON document on disk.
///
/// The document is re-read on every call so several processes see each
/// other's saves.  A document that cannot be read or parsed is treated as
/// empty (with a warning), so a damaged file never blocks drawing.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> BTreeMap<String, CanvasRecord> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "cannot open canvas store: {e}");
                return BTreeMap::new();
            }
        };
        match serde_json::from_reader(BufReader::new(file)) {
            Ok(all) => all,
            Err(e) => {
                warn!(path = %self.path.display(), "unreadable canvas store, treating as empty: {e}");
                BTreeMap::new()
            }
        }
    }

    /// Write through a sibling temp file and rename over the original.
    fn write_all(&self, all: &BTreeMap<String, CanvasRecord>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io { path: self.path.clone(), source };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        {
            let file = fs::File::create(&tmp).map_err(io_err)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, all)?;
            writer.flush().map_err(io_err)?;
        }
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!(path = %self.path.display(), canvases = all.len(), "canvas store written");
        Ok(())
    }
}

impl CanvasStore for JsonFileStore {
    fn save(&mut self, name: &str, record: &CanvasRecord) -> Result<(), StoreError> {
        check_name(name)?;
        let mut all = self.read_all();
        all.insert(name.to_string(), record.clone());
        self.write_all(&all)?;
        info!(name, strokes = record.strokes.len(), "canvas saved");
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<CanvasRecord>, StoreError> {
        Ok(self.read_all().remove(name))
    }

    fn list_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read_all().into_keys().collect())
    }

    fn delete(&mut self, name: &str) -> Result<bool, StoreError> {
        let mut all = self.read_all();
        if all.remove(name).is_none() {
            return Ok(false);
        }
        self.write_all(&all)?;
        info!(name, "canvas deleted");
        Ok(true)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
