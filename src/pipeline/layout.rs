//! Grid geometry: cell sizes, large-cell anchors and pixel placements.
//!
//! The grid is `columns × rows` uniform cells separated by `gap` pixels. A
//! large cell spans a 2×2 block of cells (and the gaps inside it), anchored
//! at its top-left cell. Sizes use integer floor division, so a small
//! residual margin may remain on the right/bottom edge.

use crate::error::CoverGenError;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// A cell position in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub col: u32,
    pub row: u32,
}

impl GridPos {
    pub const fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    /// The four cells covered by a large cell anchored here.
    fn block(self) -> [GridPos; 4] {
        [
            self,
            GridPos::new(self.col + 1, self.row),
            GridPos::new(self.col, self.row + 1),
            GridPos::new(self.col + 1, self.row + 1),
        ]
    }

    /// Whether the 2×2 blocks anchored at `self` and `other` intersect.
    fn overlaps(self, other: GridPos) -> bool {
        self.col.abs_diff(other.col) < 2 && self.row.abs_diff(other.row) < 2
    }
}

/// A placement rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn max_x(&self) -> u32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> u32 {
        self.y + self.height
    }

    fn intersects(&self, other: &Rect) -> bool {
        self.x < other.max_x() && other.x < self.max_x() && self.y < other.max_y() && other.y < self.max_y()
    }
}

/// Pixel sizes derived from canvas size, grid shape and gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGeometry {
    pub cell_width: u32,
    pub cell_height: u32,
    pub large_width: u32,
    pub large_height: u32,
    pub gap: u32,
}

impl CellGeometry {
    /// Derive cell sizes, rejecting grids that leave no room for a cell.
    pub fn derive(
        width: u32,
        height: u32,
        columns: u32,
        rows: u32,
        gap: u32,
    ) -> Result<Self, CoverGenError> {
        if columns == 0 || rows == 0 {
            return Err(CoverGenError::InvalidConfig(format!(
                "Grid must have at least one cell, got {columns}×{rows}"
            )));
        }

        let cell = |extent: u32, count: u32| -> Option<u32> {
            let gaps = u64::from(gap) * u64::from(count - 1);
            let free = u64::from(extent).checked_sub(gaps)?;
            let size = (free / u64::from(count)) as u32;
            (size > 0).then_some(size)
        };

        let (Some(cell_width), Some(cell_height)) = (cell(width, columns), cell(height, rows)) else {
            return Err(CoverGenError::InvalidConfig(format!(
                "Grid of {columns}×{rows} cells with {gap}px gaps leaves no room for a cell on a {width}×{height} canvas"
            )));
        };

        Ok(Self {
            cell_width,
            cell_height,
            large_width: 2 * cell_width + gap,
            large_height: 2 * cell_height + gap,
            gap,
        })
    }

    /// Top-left pixel of the cell at `pos`.
    pub fn origin(&self, pos: GridPos) -> (u32, u32) {
        (
            pos.col * (self.cell_width + self.gap),
            pos.row * (self.cell_height + self.gap),
        )
    }

    fn single(&self, pos: GridPos) -> Rect {
        let (x, y) = self.origin(pos);
        Rect::new(x, y, self.cell_width, self.cell_height)
    }

    fn large(&self, pos: GridPos) -> Rect {
        let (x, y) = self.origin(pos);
        Rect::new(x, y, self.large_width, self.large_height)
    }
}

/// Upper bound on non-overlapping large cells that *any* placement can fit.
pub fn max_large_cells(columns: u32, rows: u32) -> u32 {
    (columns / 2) * (rows / 2)
}

/// Images a composition consumes: each large cell displaces four single
/// cells and takes one image itself.
pub fn required_images(columns: u32, rows: u32, large_cells: u32) -> usize {
    (columns as usize * rows as usize) - 3 * large_cells as usize
}

/// Check that anchors lie in `[0, columns−2] × [0, rows−2]` and that no two
/// 2×2 blocks intersect.
pub fn validate_anchors(anchors: &[GridPos], columns: u32, rows: u32) -> Result<(), CoverGenError> {
    for (i, anchor) in anchors.iter().enumerate() {
        if columns < 2 || rows < 2 || anchor.col > columns - 2 || anchor.row > rows - 2 {
            return Err(CoverGenError::InvalidConfig(format!(
                "Large cell at (col {}, row {}) does not fit a {columns}×{rows} grid",
                anchor.col, anchor.row
            )));
        }
        if let Some(other) = anchors[..i].iter().find(|placed| placed.overlaps(*anchor)) {
            return Err(CoverGenError::InvalidConfig(format!(
                "Large cells at (col {}, row {}) and (col {}, row {}) overlap",
                other.col, other.row, anchor.col, anchor.row
            )));
        }
    }
    Ok(())
}

/// Search budget before falling back to the aligned lattice.
const RANDOM_PLACEMENT_STEPS: usize = 10_000;

/// Choose `count` random, non-overlapping large-cell anchors.
///
/// Candidates are visited in shuffled order with backtracking; a candidate
/// is accepted only if no previously placed block intersects it. Should the
/// search budget run out, anchors are drawn from the even-aligned lattice
/// `{(2i, 2j)}`, which always holds [`max_large_cells`] disjoint blocks.
pub fn pick_random_anchors<R: Rng + ?Sized>(
    columns: u32,
    rows: u32,
    count: u32,
    rng: &mut R,
) -> Result<Vec<GridPos>, CoverGenError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let max = max_large_cells(columns, rows);
    if count > max {
        return Err(CoverGenError::InvalidConfig(format!(
            "{count} large cells do not fit a {columns}×{rows} grid (at most {max})"
        )));
    }

    let mut candidates: Vec<GridPos> = (0..=columns - 2)
        .flat_map(|col| (0..=rows - 2).map(move |row| GridPos::new(col, row)))
        .collect();
    candidates.shuffle(rng);

    let mut placed = Vec::with_capacity(count as usize);
    let mut steps = 0;
    if place_from(&candidates, 0, count as usize, &mut placed, &mut steps) {
        debug!("Placed {} large cells at {:?}", count, placed);
        return Ok(placed);
    }

    let mut lattice: Vec<GridPos> = (0..columns / 2)
        .flat_map(|i| (0..rows / 2).map(move |j| GridPos::new(2 * i, 2 * j)))
        .collect();
    lattice.shuffle(rng);
    lattice.truncate(count as usize);
    debug!("Large-cell search exhausted; using lattice anchors {:?}", lattice);
    Ok(lattice)
}

fn place_from(
    candidates: &[GridPos],
    start: usize,
    remaining: usize,
    placed: &mut Vec<GridPos>,
    steps: &mut usize,
) -> bool {
    if remaining == 0 {
        return true;
    }
    for i in start..candidates.len() {
        *steps += 1;
        if *steps > RANDOM_PLACEMENT_STEPS || candidates.len() - i < remaining {
            return false;
        }
        let candidate = candidates[i];
        if placed.iter().any(|p| p.overlaps(candidate)) {
            continue;
        }
        placed.push(candidate);
        if place_from(candidates, i + 1, remaining - 1, placed, steps) {
            return true;
        }
        placed.pop();
    }
    false
}

/// Ordered pixel placements for one composition.
///
/// Single cells come first, in column-major order (every row of column 0,
/// then column 1, …) with cells under a large block skipped. Large cells
/// follow in anchor order.
#[derive(Debug, Clone)]
pub struct GridLayout {
    pub geometry: CellGeometry,
    pub singles: Vec<Rect>,
    pub larges: Vec<Rect>,
}

impl GridLayout {
    pub fn new(
        width: u32,
        height: u32,
        columns: u32,
        rows: u32,
        gap: u32,
        anchors: &[GridPos],
    ) -> Result<Self, CoverGenError> {
        let geometry = CellGeometry::derive(width, height, columns, rows, gap)?;
        validate_anchors(anchors, columns, rows)?;

        let covered: HashSet<GridPos> = anchors.iter().flat_map(|a| a.block()).collect();

        let singles = (0..columns)
            .flat_map(|col| (0..rows).map(move |row| GridPos::new(col, row)))
            .filter(|pos| !covered.contains(pos))
            .map(|pos| geometry.single(pos))
            .collect();
        let larges = anchors.iter().map(|&a| geometry.large(a)).collect();

        Ok(Self {
            geometry,
            singles,
            larges,
        })
    }

    /// Number of images this layout consumes.
    pub fn slot_count(&self) -> usize {
        self.singles.len() + self.larges.len()
    }

    /// Every placement rectangle, singles first.
    pub fn slots(&self) -> impl Iterator<Item = &Rect> {
        self.singles.iter().chain(self.larges.iter())
    }

    /// Whether any two placements intersect.
    pub fn has_overlap(&self) -> bool {
        let all: Vec<&Rect> = self.slots().collect();
        all.iter()
            .enumerate()
            .any(|(i, a)| all[i + 1..].iter().any(|b| a.intersects(b)))
    }
}
