//! Painted-cell coverage and stroke history.
//!
//! [`CoverageModel`] owns the live [`CoverageSet`], the strokes still being
//! drawn, and a [`History`] of committed strokes.  History is only reachable
//! through `commit` / `undo` / `redo` / `clear`, so a new commit always
//! discards the redo branch.
//!
//! # Undo and overlapping strokes
//!
//! Two strokes may cover the same cell.  Under
//! [`CoveragePolicy::Unconditional`] undoing either one removes the cell
//! even though the other still covers it; saved canvases were produced that
//! way.  [`CoveragePolicy::RefCounted`] keeps a per-cell count instead and
//! a cell stays painted while any active stroke covers it.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, trace};

use canvas_grid::{Cell, CoverageSet, Grid, Point};

use crate::color::Rgba;
use crate::store::CanvasRecord;
use crate::stroke::Stroke;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("no open stroke with handle {0}")]
    UnknownStroke(u64),
}

/// What undo does to a cell that another active stroke also covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CoveragePolicy {
    /// Remove every cell of the undone stroke.
    #[default]
    Unconditional,
    /// Remove a cell only when no remaining stroke covers it.
    RefCounted,
}

/// Identifies a stroke that has been begun but not yet committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StrokeHandle(u64);

impl StrokeHandle {
    pub fn id(self) -> u64 { self.0 }
}

// ════════════════════════════════════════════════════════════════════════════
// History: forward list, undone stack, coverage snapshots
// ════════════════════════════════════════════════════════════════════════════

/// Committed strokes plus the undo/redo bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct History {
    forward:       Vec<Stroke>,
    undone:        Vec<Stroke>,
    undo_coverage: Vec<CoverageSet>,
    redo_coverage: Vec<CoverageSet>,
}

impl History {
    fn commit(&mut self, stroke: Stroke, coverage: &CoverageSet) {
        self.forward.push(stroke);
        self.undo_coverage.push(coverage.clone());
        self.undone.clear();
        self.redo_coverage.clear();
    }

    fn pop_forward(&mut self) -> Option<Stroke> {
        self.forward.pop()
    }

    fn pop_undone(&mut self) -> Option<Stroke> {
        self.undone.pop()
    }

    fn clear(&mut self) {
        self.forward.clear();
        self.undone.clear();
        self.undo_coverage.clear();
        self.redo_coverage.clear();
    }

    /// Committed strokes, oldest first.
    pub fn strokes(&self) -> &[Stroke] { &self.forward }

    /// Number of strokes `redo` could bring back.
    pub fn redo_depth(&self) -> usize { self.undone.len() }

    /// Coverage snapshot taken after the last commit or undo.
    pub fn last_undo_snapshot(&self) -> Option<&CoverageSet> { self.undo_coverage.last() }

    /// Coverage snapshot taken after the last redo.
    pub fn last_redo_snapshot(&self) -> Option<&CoverageSet> { self.redo_coverage.last() }

    pub fn snapshot_counts(&self) -> (usize, usize) {
        (self.undo_coverage.len(), self.redo_coverage.len())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CoverageModel
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct CoverageModel {
    grid:     Grid,
    policy:   CoveragePolicy,
    coverage: CoverageSet,
    /// Per-cell count of active strokes; only maintained for `RefCounted`.
    counts:   Vec<u32>,
    open:     BTreeMap<StrokeHandle, Stroke>,
    next_id:  u64,
    history:  History,
}

impl CoverageModel {
    pub fn new(grid: Grid, policy: CoveragePolicy) -> Self {
        CoverageModel {
            grid,
            policy,
            coverage: CoverageSet::new(),
            counts:   vec![0; grid.len()],
            open:     BTreeMap::new(),
            next_id:  0,
            history:  History::default(),
        }
    }

    pub fn grid(&self)     -> &Grid          { &self.grid }
    pub fn policy(&self)   -> CoveragePolicy { self.policy }
    pub fn coverage(&self) -> &CoverageSet   { &self.coverage }
    pub fn history(&self)  -> &History       { &self.history }
    pub fn strokes(&self)  -> &[Stroke]      { self.history.strokes() }

    /// An open stroke, for in-progress feedback.
    pub fn open_stroke(&self, handle: StrokeHandle) -> Option<&Stroke> {
        self.open.get(&handle)
    }

    // ── drawing ──────────────────────────────────────────────────────────

    pub fn begin_stroke(&mut self, color: Rgba, line_width: f64) -> StrokeHandle {
        let handle = StrokeHandle(self.next_id);
        self.next_id += 1;
        self.open.insert(handle, Stroke::new(color, line_width));
        trace!(stroke = handle.0, "stroke begun");
        handle
    }

    /// Append a point; a covered cell is painted immediately so playback and
    /// feedback see in-progress strokes.
    pub fn extend(&mut self, handle: StrokeHandle, point: Point, cell: Option<Cell>) -> Result<(), HistoryError> {
        let stroke = self
            .open
            .get_mut(&handle)
            .ok_or(HistoryError::UnknownStroke(handle.0))?;
        stroke.points.push(point);

        let Some(cell) = cell.and_then(|c| self.grid.cell_at(c.index())) else {
            return Ok(());
        };
        if stroke.cells.insert(cell) {
            acquire(&mut self.coverage, &mut self.counts, self.policy, cell);
        }
        Ok(())
    }

    /// Move an open stroke into history and snapshot the coverage.
    /// Clears the redo branch.
    pub fn commit_stroke(&mut self, handle: StrokeHandle) -> Result<(), HistoryError> {
        let stroke = self
            .open
            .remove(&handle)
            .ok_or(HistoryError::UnknownStroke(handle.0))?;
        debug!(
            stroke = handle.0,
            points = stroke.points.len(),
            cells = stroke.cells.len(),
            "stroke committed"
        );
        self.history.commit(stroke, &self.coverage);
        Ok(())
    }

    /// Throw away an open stroke and withdraw the cells it painted.
    pub fn cancel_stroke(&mut self, handle: StrokeHandle) -> Result<Stroke, HistoryError> {
        let stroke = self
            .open
            .remove(&handle)
            .ok_or(HistoryError::UnknownStroke(handle.0))?;
        for cell in &stroke.cells {
            release(&mut self.coverage, &mut self.counts, self.policy, cell);
        }
        debug!(stroke = handle.0, "stroke cancelled");
        Ok(stroke)
    }

    // ── history ──────────────────────────────────────────────────────────

    /// Undo the most recent committed stroke.  `None` when there is none.
    pub fn undo(&mut self) -> Option<Stroke> {
        let stroke = self.history.pop_forward()?;
        for cell in &stroke.cells {
            release(&mut self.coverage, &mut self.counts, self.policy, cell);
        }
        self.history.undo_coverage.push(self.coverage.clone());
        self.history.undone.push(stroke.clone());
        debug!(cells = stroke.cells.len(), remaining = self.coverage.len(), "undo");
        Some(stroke)
    }

    /// Re-apply the most recently undone stroke.  `None` when there is none.
    pub fn redo(&mut self) -> Option<Stroke> {
        let stroke = self.history.pop_undone()?;
        for cell in &stroke.cells {
            acquire(&mut self.coverage, &mut self.counts, self.policy, cell);
        }
        self.history.forward.push(stroke.clone());
        self.history.redo_coverage.push(self.coverage.clone());
        debug!(cells = stroke.cells.len(), total = self.coverage.len(), "redo");
        Some(stroke)
    }

    /// Forget everything, open strokes included.
    pub fn clear(&mut self) {
        self.history.clear();
        self.open.clear();
        self.coverage.clear();
        self.counts.iter_mut().for_each(|c| *c = 0);
        debug!("model cleared");
    }

    /// Replace the contents with loaded strokes and coverage.  History
    /// stacks start empty.
    ///
    /// Under `Unconditional` the given coverage is kept as-is (it may
    /// legitimately differ from the union of the strokes); under
    /// `RefCounted` coverage is rebuilt from the strokes.
    ///
    /// Cells outside the grid are dropped from the coverage and from every
    /// stroke.
    pub fn restore(&mut self, mut strokes: Vec<Stroke>, mut coverage: CoverageSet) {
        self.clear();
        let mut dropped = coverage.retain_within(&self.grid);
        for stroke in &mut strokes {
            dropped += stroke.cells.retain_within(&self.grid);
        }
        if dropped > 0 {
            debug!(dropped, "ignored cells outside the grid");
        }
        match self.policy {
            CoveragePolicy::Unconditional => self.coverage = coverage,
            CoveragePolicy::RefCounted => {
                for cell in strokes.iter().flat_map(|s| s.cells.iter()) {
                    acquire(&mut self.coverage, &mut self.counts, self.policy, cell);
                }
            }
        }
        self.history.forward = strokes;
    }

    /// Committed strokes and live coverage, ready to save.  Open strokes are
    /// not included.
    pub fn to_record(&self) -> CanvasRecord {
        CanvasRecord::new(self.history.forward.clone(), self.coverage.clone())
    }
}

fn acquire(coverage: &mut CoverageSet, counts: &mut [u32], policy: CoveragePolicy, cell: Cell) {
    if policy == CoveragePolicy::RefCounted {
        let Some(count) = counts.get_mut(cell.index()) else {
            return;
        };
        *count += 1;
    }
    coverage.insert(cell);
}

fn release(coverage: &mut CoverageSet, counts: &mut [u32], policy: CoveragePolicy, cell: Cell) {
    match policy {
        CoveragePolicy::Unconditional => {
            coverage.remove(cell);
        }
        CoveragePolicy::RefCounted => {
            let Some(count) = counts.get_mut(cell.index()) else {
                return;
            };
            *count = count.saturating_sub(1);
            if *count == 0 {
                coverage.remove(cell);
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const G: Grid = Grid::STANDARD;

    fn cell(i: usize) -> Cell { Cell::from_index(i) }

    fn draw(model: &mut CoverageModel, cells: &[usize]) -> StrokeHandle {
        let h = model.begin_stroke(Rgba::BLACK, 5.0);
        for &c in cells {
            model.extend(h, Point::new(c as f64, 0.0), Some(cell(c))).unwrap();
        }
        model.commit_stroke(h).unwrap();
        h
    }

    fn set(cells: &[usize]) -> CoverageSet {
        cells.iter().map(|&c| cell(c)).collect()
    }

    #[test]
    fn extend_paints_before_commit() {
        let mut m = CoverageModel::new(G, CoveragePolicy::Unconditional);
        let h = m.begin_stroke(Rgba::BLACK, 5.0);
        m.extend(h, Point::new(1.0, 1.0), Some(cell(10))).unwrap();
        m.extend(h, Point::new(500.0, 1.0), None).unwrap();
        assert!(m.coverage().contains(cell(10)));
        assert!(m.strokes().is_empty());
        assert_eq!(m.open_stroke(h).unwrap().points.len(), 2);
    }

    #[test]
    fn commit_snapshots_and_records() {
        let mut m = CoverageModel::new(G, CoveragePolicy::Unconditional);
        draw(&mut m, &[1, 2]);
        assert_eq!(m.strokes().len(), 1);
        assert_eq!(m.history().last_undo_snapshot(), Some(&set(&[1, 2])));
    }

    #[test]
    fn unknown_handle_is_an_error() {
        let mut m = CoverageModel::new(G, CoveragePolicy::Unconditional);
        let h = draw(&mut m, &[1]);
        assert_eq!(m.extend(h, Point::default(), None), Err(HistoryError::UnknownStroke(h.id())));
        assert!(m.commit_stroke(h).is_err());
    }

    #[test]
    fn undo_redo_round_trip() {
        let mut m = CoverageModel::new(G, CoveragePolicy::Unconditional);
        draw(&mut m, &[1, 2]);
        draw(&mut m, &[40, 41]);
        let strokes = m.strokes().to_vec();
        let coverage = m.coverage().clone();

        assert!(m.undo().is_some());
        assert!(m.undo().is_some());
        assert!(m.coverage().is_empty());
        assert!(m.strokes().is_empty());
        assert_eq!(m.history().redo_depth(), 2);

        assert!(m.redo().is_some());
        assert!(m.redo().is_some());
        assert_eq!(m.strokes(), strokes.as_slice());
        assert_eq!(m.coverage(), &coverage);
        assert_eq!(m.history().last_redo_snapshot(), Some(&coverage));
    }

    #[test]
    fn undo_and_redo_on_empty_history_are_noops() {
        let mut m = CoverageModel::new(G, CoveragePolicy::Unconditional);
        assert!(m.undo().is_none());
        assert!(m.redo().is_none());
        assert_eq!(m.history().snapshot_counts(), (0, 0));
    }

    #[test]
    fn new_commit_discards_redo_branch() {
        let mut m = CoverageModel::new(G, CoveragePolicy::Unconditional);
        draw(&mut m, &[1]);
        m.undo();
        assert_eq!(m.history().redo_depth(), 1);
        draw(&mut m, &[2]);
        assert_eq!(m.history().redo_depth(), 0);
        assert!(m.redo().is_none());
        assert_eq!(m.coverage(), &set(&[2]));
    }

    #[test]
    fn unconditional_undo_removes_shared_cell() {
        let mut m = CoverageModel::new(G, CoveragePolicy::Unconditional);
        draw(&mut m, &[5, 6]);
        draw(&mut m, &[6, 7]);
        m.undo();
        // stroke A still covers 6, but it is gone
        assert_eq!(m.coverage(), &set(&[5]));
    }

    #[test]
    fn ref_counted_undo_keeps_shared_cell() {
        let mut m = CoverageModel::new(G, CoveragePolicy::RefCounted);
        draw(&mut m, &[5, 6]);
        draw(&mut m, &[6, 7]);
        m.undo();
        assert_eq!(m.coverage(), &set(&[5, 6]));
        m.undo();
        assert!(m.coverage().is_empty());
        m.redo();
        m.redo();
        assert_eq!(m.coverage(), &set(&[5, 6, 7]));
    }

    #[test]
    fn repeated_cell_in_one_stroke_counts_once() {
        let mut m = CoverageModel::new(G, CoveragePolicy::RefCounted);
        draw(&mut m, &[9, 9, 9]);
        m.undo();
        assert!(m.coverage().is_empty());
    }

    #[test]
    fn cancel_withdraws_open_cells() {
        let mut m = CoverageModel::new(G, CoveragePolicy::RefCounted);
        draw(&mut m, &[3]);
        let h = m.begin_stroke(Rgba::BLACK, 1.0);
        m.extend(h, Point::default(), Some(cell(3))).unwrap();
        m.extend(h, Point::default(), Some(cell(4))).unwrap();
        m.cancel_stroke(h).unwrap();
        assert_eq!(m.coverage(), &set(&[3]));
    }

    #[test]
    fn out_of_grid_cell_is_ignored() {
        let mut m = CoverageModel::new(G, CoveragePolicy::Unconditional);
        draw(&mut m, &[768, 5]);
        assert_eq!(m.coverage(), &set(&[5]));
    }

    #[test]
    fn clear_empties_everything() {
        let mut m = CoverageModel::new(G, CoveragePolicy::Unconditional);
        draw(&mut m, &[1]);
        draw(&mut m, &[2]);
        m.undo();
        let open = m.begin_stroke(Rgba::BLACK, 1.0);
        m.clear();
        assert!(m.strokes().is_empty());
        assert!(m.coverage().is_empty());
        assert_eq!(m.history().redo_depth(), 0);
        assert_eq!(m.history().snapshot_counts(), (0, 0));
        assert!(m.open_stroke(open).is_none());
    }

    #[test]
    fn restore_keeps_saved_coverage_unconditionally() {
        let mut source = CoverageModel::new(G, CoveragePolicy::Unconditional);
        draw(&mut source, &[5, 6]);
        draw(&mut source, &[6, 7]);
        source.undo();

        let mut m = CoverageModel::new(G, CoveragePolicy::Unconditional);
        m.restore(source.strokes().to_vec(), source.coverage().clone());
        assert_eq!(m.coverage(), &set(&[5]));
        assert_eq!(m.strokes().len(), 1);
        assert_eq!(m.history().redo_depth(), 0);
    }

    #[test]
    fn restore_rebuilds_counts_when_ref_counted() {
        let mut source = CoverageModel::new(G, CoveragePolicy::Unconditional);
        draw(&mut source, &[5, 6]);
        draw(&mut source, &[6, 7]);

        let mut m = CoverageModel::new(G, CoveragePolicy::RefCounted);
        m.restore(source.strokes().to_vec(), CoverageSet::new());
        assert_eq!(m.coverage(), &set(&[5, 6, 7]));
        m.undo();
        assert_eq!(m.coverage(), &set(&[5, 6]));
    }

    #[test]
    fn restore_drops_foreign_cells_from_strokes() {
        let json = r#"{"paths":[{"points":[[0.0,0.0]],"color":"0;0;0;1","lineWidth":5.0,"coveredCells":[4,9000]}],"coveredCells":[4,9000]}"#;
        for policy in [CoveragePolicy::Unconditional, CoveragePolicy::RefCounted] {
            let record: CanvasRecord = serde_json::from_str(json).unwrap();
            let mut m = CoverageModel::new(G, policy);
            m.restore(record.strokes, record.covered_cells);
            assert_eq!(m.coverage(), &set(&[4]), "{policy:?}");
            assert_eq!(m.strokes()[0].cells, set(&[4]), "{policy:?}");

            assert_eq!(m.undo().unwrap().cells, set(&[4]));
            assert!(m.coverage().is_empty(), "{policy:?}");
            m.redo();
            assert_eq!(m.coverage(), &set(&[4]), "{policy:?}");
            assert_eq!(m.to_record().covered_cells, set(&[4]), "{policy:?}");
        }
    }

    #[test]
    fn to_record_skips_open_strokes() {
        let mut m = CoverageModel::new(G, CoveragePolicy::Unconditional);
        draw(&mut m, &[1, 2]);
        let open = m.begin_stroke(Rgba::BLACK, 5.0);
        m.extend(open, Point::new(0.0, 0.0), Some(Cell::from_index(9))).unwrap();

        let record = m.to_record();
        assert_eq!(record.strokes.len(), 1);
        assert_eq!(record.covered_cells, set(&[1, 2, 9]));
        assert!(record.mood.is_none());
    }
}
