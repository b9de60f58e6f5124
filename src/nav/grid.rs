//! Walkability grid
//!
//! A uniform grid laid over a bounded world rectangle. Each cell stores its
//! world-space center and whether an agent disc fits there. The grid is built
//! once from an [`OccupancyQuery`] and only ever replaced as a whole.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use glam::Vec2;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use super::occupancy::OccupancyQuery;
use crate::core::GridConfig;

/// Integer coordinates of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    /// Column, growing to the right
    pub x: i32,
    /// Row, growing upwards
    pub y: i32,
}

impl CellCoord {
    /// Create a new coordinate
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Coordinate shifted by a delta
    #[must_use]
    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A single grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    /// Position in the grid
    pub coord: CellCoord,
    /// World-space center
    pub center: Vec2,
    /// Whether an agent fits here
    pub walkable: bool,
}

/// Largest number of cells a grid may hold.
pub const MAX_GRID_CELLS: usize = 1 << 22;

/// Offsets of the 8 neighbors, in expansion order.
pub(crate) const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// A built walkability grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridMap {
    /// Bottom-left corner of the grid in world space
    origin: Vec2,
    /// Cell edge length in world units
    cell_size: f32,
    /// Width in cells
    width: usize,
    /// Height in cells
    height: usize,
    /// Row-major cells, `y * width + x`
    cells: Vec<GridCell>,
}

impl GridMap {
    /// Create a grid with no cells. Every lookup on it fails.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            origin: Vec2::ZERO,
            cell_size: 1.0,
            width: 0,
            height: 0,
            cells: Vec::new(),
        }
    }

    /// Columns and rows needed to cover `world_size` with square cells.
    ///
    /// `None` for a non-positive cell size, a non-finite size, or a grid of
    /// more than [`MAX_GRID_CELLS`] cells.
    #[must_use]
    pub fn dimensions_for(world_size: Vec2, cell_size: f32) -> Option<(usize, usize)> {
        if !(cell_size > 0.0) || !world_size.is_finite() {
            return None;
        }

        let cells = (world_size / cell_size).ceil().max(Vec2::ZERO);
        let (width, height) = (f64::from(cells.x), f64::from(cells.y));
        let limit = MAX_GRID_CELLS as f64;
        if width > limit || height > limit || width * height > limit {
            return None;
        }
        Some((width as usize, height as usize))
    }

    /// Build a grid over the rectangle centered at `world_center`.
    ///
    /// A cell is walkable iff a disc of `agent_radius` at its center is not
    /// blocked. A non-positive cell size or an oversized world yields an
    /// empty grid.
    #[must_use]
    pub fn build(
        world_center: Vec2,
        world_size: Vec2,
        cell_size: f32,
        agent_radius: f32,
        occupancy: &impl OccupancyQuery,
    ) -> Self {
        let Some((width, height)) = Self::dimensions_for(world_size, cell_size) else {
            log::warn!("Refusing to build grid with cell size {cell_size} over {world_size}");
            return Self::empty();
        };

        let origin = world_center - world_size * 0.5;

        Self::from_fn(origin, cell_size, width, height, |center| {
            !occupancy.is_blocked(center, agent_radius)
        })
    }

    /// Build a grid from a [`GridConfig`]
    #[must_use]
    pub fn from_config(config: &GridConfig, occupancy: &impl OccupancyQuery) -> Self {
        let grid = Self::build(
            config.world_center,
            config.world_size,
            config.cell_size,
            config.agent_radius,
            occupancy,
        );
        log::info!(
            "Built {}x{} nav grid ({} walkable cells)",
            grid.width,
            grid.height,
            grid.walkable_count()
        );
        grid
    }

    /// Build a grid by evaluating `walkable` at each cell center.
    ///
    /// More than [`MAX_GRID_CELLS`] cells yields an empty grid.
    #[must_use]
    pub fn from_fn(
        origin: Vec2,
        cell_size: f32,
        width: usize,
        height: usize,
        mut walkable: impl FnMut(Vec2) -> bool,
    ) -> Self {
        let Some(len) = width
            .checked_mul(height)
            .filter(|&len| len <= MAX_GRID_CELLS)
        else {
            log::warn!("Refusing to build {width}x{height} grid");
            return Self::empty();
        };

        let mut cells = Vec::with_capacity(len);
        for y in 0..height {
            for x in 0..width {
                let coord = CellCoord::new(x as i32, y as i32);
                let center = origin
                    + Vec2::new(
                        (x as f32 + 0.5) * cell_size,
                        (y as f32 + 0.5) * cell_size,
                    );
                cells.push(GridCell {
                    coord,
                    center,
                    walkable: walkable(center),
                });
            }
        }

        Self {
            origin,
            cell_size,
            width,
            height,
            cells,
        }
    }

    /// Build a grid from a text picture.
    ///
    /// The first row is the top of the grid. `#` marks a blocked cell, any
    /// other character a walkable one. Short rows are padded as walkable.
    #[must_use]
    pub fn from_ascii(origin: Vec2, cell_size: f32, rows: &[&str]) -> Self {
        let height = rows.len();
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);

        let mut grid = Self::from_fn(origin, cell_size, width, height, |_| true);
        for (row, line) in rows.iter().enumerate() {
            let y = height - 1 - row;
            for (x, ch) in line.chars().enumerate() {
                if ch != '#' {
                    continue;
                }
                if let Some(cell) = grid.cells.get_mut(y * width + x) {
                    cell.walkable = false;
                }
            }
        }
        grid
    }

    /// Render the grid as text, top row first. Inverse of [`GridMap::from_ascii`].
    #[must_use]
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for y in (0..self.height).rev() {
            for x in 0..self.width {
                out.push(if self.cells[y * self.width + x].walkable {
                    '.'
                } else {
                    '#'
                });
            }
            out.push('\n');
        }
        out
    }

    /// Width in cells
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in cells
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cell edge length
    #[must_use]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Bottom-left corner in world space
    #[must_use]
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Top-right corner in world space
    #[must_use]
    pub fn max_corner(&self) -> Vec2 {
        self.origin + Vec2::new(self.width as f32, self.height as f32) * self.cell_size
    }

    /// Total number of cells
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if the grid has no cells
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of walkable cells
    #[must_use]
    pub fn walkable_count(&self) -> usize {
        self.cells.iter().filter(|c| c.walkable).count()
    }

    /// Iterate over all cells, row by row from the bottom
    pub fn cells(&self) -> impl Iterator<Item = &GridCell> {
        self.cells.iter()
    }

    /// Check whether a coordinate lies inside the grid
    #[must_use]
    #[inline]
    pub fn contains(&self, coord: CellCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as usize) < self.width
            && (coord.y as usize) < self.height
    }

    /// Flat index of a coordinate
    #[must_use]
    #[inline]
    pub fn index_of(&self, coord: CellCoord) -> Option<usize> {
        self.contains(coord)
            .then(|| coord.y as usize * self.width + coord.x as usize)
    }

    /// Coordinate of a flat index
    #[must_use]
    #[inline]
    pub(crate) fn coord_of(&self, index: usize) -> CellCoord {
        CellCoord::new((index % self.width) as i32, (index / self.width) as i32)
    }

    /// Get a cell
    #[must_use]
    pub fn cell(&self, coord: CellCoord) -> Option<&GridCell> {
        self.index_of(coord).map(|i| &self.cells[i])
    }

    /// Check if a cell is walkable. Cells outside the grid are not.
    #[must_use]
    #[inline]
    pub fn is_walkable(&self, coord: CellCoord) -> bool {
        self.index_of(coord).is_some_and(|i| self.cells[i].walkable)
    }

    /// World-space center of a cell
    #[must_use]
    pub fn cell_center(&self, coord: CellCoord) -> Vec2 {
        self.origin
            + Vec2::new(
                (coord.x as f32 + 0.5) * self.cell_size,
                (coord.y as f32 + 0.5) * self.cell_size,
            )
    }

    /// Cell containing a world point, or `None` outside the grid
    #[must_use]
    pub fn world_to_cell(&self, point: Vec2) -> Option<CellCoord> {
        let local = (point - self.origin) / self.cell_size;
        if !local.is_finite() {
            return None;
        }
        let coord = CellCoord::new(local.x.floor() as i32, local.y.floor() as i32);
        self.contains(coord).then_some(coord)
    }

    /// Check whether a world point lies over the grid
    #[must_use]
    pub fn contains_point(&self, point: Vec2) -> bool {
        self.world_to_cell(point).is_some()
    }

    /// All in-bounds neighbors of a cell, walkable or not
    #[must_use]
    pub fn neighbors(&self, coord: CellCoord) -> SmallVec<[CellCoord; 8]> {
        NEIGHBOR_OFFSETS
            .iter()
            .map(|&(dx, dy)| coord.offset(dx, dy))
            .filter(|&n| self.contains(n))
            .collect()
    }

    /// Check whether a single step from `from` by `(dx, dy)` is legal.
    ///
    /// The target must be walkable, and a diagonal step additionally requires
    /// both orthogonal side cells to be walkable.
    #[must_use]
    #[inline]
    pub fn can_step(&self, from: CellCoord, dx: i32, dy: i32) -> bool {
        if !self.is_walkable(from.offset(dx, dy)) {
            return false;
        }
        if dx != 0 && dy != 0 {
            return self.is_walkable(from.offset(dx, 0)) && self.is_walkable(from.offset(0, dy));
        }
        true
    }

    /// Nearest walkable cell by breadth-first search over 8-connected cells.
    ///
    /// A walkable cell is returned unchanged. `None` when the coordinate is
    /// outside the grid or nothing walkable exists.
    #[must_use]
    pub fn nearest_walkable(&self, from: CellCoord) -> Option<CellCoord> {
        if !self.contains(from) {
            return None;
        }

        let mut queue = VecDeque::new();
        let mut seen = FxHashSet::default();
        queue.push_back(from);
        seen.insert(from);

        while let Some(coord) = queue.pop_front() {
            if self.is_walkable(coord) {
                return Some(coord);
            }
            for neighbor in self.neighbors(coord) {
                if seen.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }

        None
    }
}

impl Default for GridMap {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Shared grid
// ============================================================================

/// Handle to the grid shared by every agent.
///
/// Readers take an [`Arc`] snapshot and never observe a half-built grid:
/// [`SharedGrid::rebuild`] builds a complete replacement before swapping it in.
#[derive(Debug, Clone, Default)]
pub struct SharedGrid {
    inner: Arc<RwLock<Arc<GridMap>>>,
}

impl SharedGrid {
    /// Wrap an existing grid
    #[must_use]
    pub fn new(grid: GridMap) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(grid))),
        }
    }

    /// Build a grid from config and wrap it
    #[must_use]
    pub fn build(config: &GridConfig, occupancy: &impl OccupancyQuery) -> Self {
        Self::new(GridMap::from_config(config, occupancy))
    }

    /// Current grid
    #[must_use]
    pub fn snapshot(&self) -> Arc<GridMap> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Rebuild from config and replace the current grid
    pub fn rebuild(&self, config: &GridConfig, occupancy: &impl OccupancyQuery) {
        log::debug!("Rebuilding nav grid");
        self.replace(GridMap::from_config(config, occupancy));
    }

    /// Replace the current grid
    pub fn replace(&self, grid: GridMap) {
        let grid = Arc::new(grid);
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = grid;
    }
}
