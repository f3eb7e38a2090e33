//! The set of painted cells.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::grid::{Cell, Grid};

/// Cells currently considered painted and eligible for playback.
///
/// Iteration is in ascending index order, so a column-major walk can be
/// derived without sorting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageSet(BTreeSet<Cell>);

impl CoverageSet {
    pub fn new() -> Self {
        CoverageSet::default()
    }

    /// Returns true if the cell was not already present.
    pub fn insert(&mut self, cell: Cell) -> bool {
        self.0.insert(cell)
    }

    /// Returns true if the cell was present.
    pub fn remove(&mut self, cell: Cell) -> bool {
        self.0.remove(&cell)
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.0.contains(&cell)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.0.iter().copied()
    }

    /// Covered cells of one column, top row first.
    pub fn column(&self, grid: &Grid, column: usize) -> impl Iterator<Item = Cell> + '_ {
        let grid = *grid;
        (0..grid.rows())
            .filter_map(move |row| grid.cell(row, column))
            .filter(move |cell| self.contains(*cell))
    }

    /// Drop indices that fall outside `grid`.  Returns how many were dropped.
    pub fn retain_within(&mut self, grid: &Grid) -> usize {
        let before = self.0.len();
        self.0.retain(|c| c.index() < grid.len());
        before - self.0.len()
    }
}

impl FromIterator<Cell> for CoverageSet {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        CoverageSet(iter.into_iter().collect())
    }
}

impl Extend<Cell> for CoverageSet {
    fn extend<I: IntoIterator<Item = Cell>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<'a> IntoIterator for &'a CoverageSet {
    type Item = Cell;
    type IntoIter = std::iter::Copied<std::collections::btree_set::Iter<'a, Cell>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_walks_top_to_bottom() {
        let g = Grid::STANDARD;
        let set: CoverageSet = [(20, 3), (2, 3), (2, 4)]
            .into_iter()
            .map(|(r, c)| g.cell(r, c).unwrap())
            .collect();
        let rows: Vec<usize> = set.column(&g, 3).map(|c| g.row_of(c)).collect();
        assert_eq!(rows, vec![2, 20]);
        assert_eq!(set.column(&g, 0).count(), 0);
    }

    #[test]
    fn retain_within_drops_foreign_indices() {
        let mut set: CoverageSet = [5, 767, 768, 9000].into_iter().map(Cell::from_index).collect();
        assert_eq!(set.retain_within(&Grid::STANDARD), 2);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn serialises_as_sorted_list() {
        let set: CoverageSet = [9, 1, 5].into_iter().map(Cell::from_index).collect();
        assert_eq!(serde_json::to_string(&set).unwrap(), "[1,5,9]");
    }
}
