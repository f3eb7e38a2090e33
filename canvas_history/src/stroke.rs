//! A single drawing gesture and its wire form.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use canvas_grid::{Cell, CoverageSet, Point};

use crate::color::Rgba;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrokeError {
    #[error("point {index} has {len} coordinate(s), expected 2")]
    ShortPoint { index: usize, len: usize },
}

// ════════════════════════════════════════════════════════════════════════════
// Stroke
// ════════════════════════════════════════════════════════════════════════════

/// One continuous gesture: its points, styling, and the cells it touched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawStroke", try_from = "RawStroke")]
pub struct Stroke {
    pub points:     Vec<Point>,
    pub color:      Rgba,
    pub line_width: f64,
    pub cells:      CoverageSet,
}

impl Stroke {
    pub fn new(color: Rgba, line_width: f64) -> Self {
        Stroke { points: Vec::new(), color, line_width, cells: CoverageSet::new() }
    }

    pub fn covers(&self, cell: Cell) -> bool {
        self.cells.contains(cell)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// RawStroke: the saved layout
// ════════════════════════════════════════════════════════════════════════════

/// Saved layout of a stroke:
/// `{"points":[[x,y],…],"color":"r;g;b;a","lineWidth":w,"coveredCells":[…]}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStroke {
    pub points:        Vec<Vec<f64>>,
    pub color:         Rgba,
    pub line_width:    f64,
    pub covered_cells: CoverageSet,
}

impl From<Stroke> for RawStroke {
    fn from(s: Stroke) -> Self {
        RawStroke {
            points:        s.points.iter().map(|p| vec![p.x, p.y]).collect(),
            color:         s.color,
            line_width:    s.line_width,
            covered_cells: s.cells,
        }
    }
}

impl TryFrom<RawStroke> for Stroke {
    type Error = StrokeError;

    fn try_from(raw: RawStroke) -> Result<Self, Self::Error> {
        let points = raw
            .points
            .iter()
            .enumerate()
            .map(|(index, pair)| match pair.as_slice() {
                [x, y, ..] => Ok(Point::new(*x, *y)),
                _ => Err(StrokeError::ShortPoint { index, len: pair.len() }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Stroke {
            points,
            color:      raw.color,
            line_width: raw.line_width,
            cells:      raw.covered_cells,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Stroke {
        let mut s = Stroke::new(Rgba::new(1.0, 0.5, 0.0, 1.0), 5.0);
        s.points = vec![Point::new(1.5, 2.0), Point::new(3.0, 4.25)];
        s.cells.insert(Cell::from_index(7));
        s.cells.insert(Cell::from_index(3));
        s
    }

    #[test]
    fn wire_layout_matches_saved_format() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "points": [[1.5, 2.0], [3.0, 4.25]],
                "color": "1.0;0.5;0.0;1.0",
                "lineWidth": 5.0,
                "coveredCells": [3, 7],
            })
        );
    }

    #[test]
    fn decodes_saved_layout() {
        let s = sample();
        let back: Stroke = serde_json::from_str(&serde_json::to_string(&s).unwrap()).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn short_point_is_rejected() {
        let text = r#"{"points":[[1,2],[3]],"color":"0;0;0;1","lineWidth":5,"coveredCells":[]}"#;
        let raw: RawStroke = serde_json::from_str(text).unwrap();
        assert_eq!(
            Stroke::try_from(raw),
            Err(StrokeError::ShortPoint { index: 1, len: 1 })
        );
    }
}
