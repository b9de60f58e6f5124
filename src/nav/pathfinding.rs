//! A* pathfinding on the walkability grid
//!
//! 8-directional search with integer costs (10 orthogonal, 14 diagonal) and
//! an octile heuristic. Diagonal steps may not cut past a blocked corner.
//!
//! Per-cell search state lives in a flat array owned by [`PathFinder`] and is
//! reset lazily with a generation counter, so repeated searches on the same
//! grid do not reallocate.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

use glam::Vec2;

use super::grid::{CellCoord, GridMap, NEIGHBOR_OFFSETS};

/// Cost of a horizontal or vertical step
pub const ORTHOGONAL_COST: u32 = 10;
/// Cost of a diagonal step, 10 * sqrt(2) rounded
pub const DIAGONAL_COST: u32 = 14;

/// Octile distance between two cells in step-cost units
#[must_use]
pub fn octile_distance(a: CellCoord, b: CellCoord) -> u32 {
    let dx = a.x.abs_diff(b.x);
    let dy = a.y.abs_diff(b.y);
    let diagonal = dx.min(dy);
    let straight = dx.max(dy) - diagonal;
    diagonal * DIAGONAL_COST + straight * ORTHOGONAL_COST
}

/// Cost of a single step between adjacent cells
#[must_use]
#[inline]
fn step_cost(dx: i32, dy: i32) -> u32 {
    if dx != 0 && dy != 0 {
        DIAGONAL_COST
    } else {
        ORTHOGONAL_COST
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Why a path could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathError {
    /// The grid has not been built
    EmptyGrid,
    /// Start or target lies outside the grid
    OutOfBounds,
    /// No walkable cell could be found near the start or target
    FullyBlocked,
    /// Every reachable cell was explored without reaching the target
    Unreachable,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGrid => write!(f, "navigation grid is empty"),
            Self::OutOfBounds => write!(f, "point lies outside the navigation grid"),
            Self::FullyBlocked => write!(f, "no walkable cell near the requested point"),
            Self::Unreachable => write!(f, "target is unreachable from start"),
        }
    }
}

impl std::error::Error for PathError {}

// ============================================================================
// Path
// ============================================================================

/// Result of a successful search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    /// Cell centers from the step after the start up to the target
    pub waypoints: Vec<Vec2>,
    /// Cells matching `waypoints`
    pub cells: Vec<CellCoord>,
    /// Total step cost (10 per orthogonal, 14 per diagonal step)
    pub cost: u32,
}

impl Path {
    /// Check if the path has no waypoints (start and target share a cell)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Number of waypoints
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// World length of the path when walked from `start`
    #[must_use]
    pub fn length_from(&self, start: Vec2) -> f32 {
        let mut length = 0.0;
        let mut previous = start;
        for &waypoint in &self.waypoints {
            length += waypoint.distance(previous);
            previous = waypoint;
        }
        length
    }
}

// ============================================================================
// Search state
// ============================================================================

/// Sentinel for "no parent"
const NO_PARENT: u32 = u32::MAX;

/// Per-cell search state, valid only while `generation` matches the finder's.
#[derive(Debug, Clone, Copy)]
struct SearchNode {
    /// Cost from start
    g: u32,
    /// Heuristic to target
    h: u32,
    /// Flat index of the predecessor
    parent: u32,
    /// Order in which the node was first discovered
    discovered: u32,
    /// Whether the node has been expanded
    closed: bool,
    /// Search this state belongs to
    generation: u32,
}

impl SearchNode {
    const STALE: Self = Self {
        g: u32::MAX,
        h: 0,
        parent: NO_PARENT,
        discovered: 0,
        closed: false,
        generation: 0,
    };
}

/// Open-set entry: `(f, h, discovery order, index, g)`.
///
/// Ordering on the first three fields gives lowest f, then lowest h, then
/// earliest discovered. `g` detects entries made stale by a cheaper route.
type OpenEntry = Reverse<(u32, u32, u32, u32, u32)>;

/// Reusable A* search state.
///
/// One finder can serve any number of grids; its arena is resized whenever
/// the grid size changes.
#[derive(Debug, Default)]
pub struct PathFinder {
    nodes: Vec<SearchNode>,
    open: BinaryHeap<OpenEntry>,
    generation: u32,
}

impl PathFinder {
    /// Create an empty finder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a path between two world points.
    ///
    /// Start and target are snapped to the nearest walkable cell when they
    /// sit on blocked cells. The start cell is not part of the result.
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] when either point is off the grid, when no
    /// walkable cell exists near them, or when the target is unreachable.
    pub fn find_path(
        &mut self,
        grid: &GridMap,
        start: Vec2,
        target: Vec2,
    ) -> Result<Path, PathError> {
        if grid.is_empty() {
            return Err(PathError::EmptyGrid);
        }

        let start = grid.world_to_cell(start).ok_or(PathError::OutOfBounds)?;
        let target = grid.world_to_cell(target).ok_or(PathError::OutOfBounds)?;

        let start = grid
            .nearest_walkable(start)
            .ok_or(PathError::FullyBlocked)?;
        let target = grid
            .nearest_walkable(target)
            .ok_or(PathError::FullyBlocked)?;

        let (cells, cost) = self.search(grid, start, target)?;
        let waypoints = cells.iter().map(|&c| grid.cell_center(c)).collect();

        Ok(Path {
            waypoints,
            cells,
            cost,
        })
    }

    /// Run A* between two walkable cells.
    ///
    /// Returns the cells after `start` up to and including `target`, and the
    /// total cost.
    ///
    /// # Errors
    ///
    /// [`PathError::OutOfBounds`] for cells outside the grid,
    /// [`PathError::FullyBlocked`] for blocked endpoints and
    /// [`PathError::Unreachable`] when the open set runs dry.
    pub fn search(
        &mut self,
        grid: &GridMap,
        start: CellCoord,
        target: CellCoord,
    ) -> Result<(Vec<CellCoord>, u32), PathError> {
        let start_index = grid.index_of(start).ok_or(PathError::OutOfBounds)?;
        let target_index = grid.index_of(target).ok_or(PathError::OutOfBounds)?;
        if !grid.is_walkable(start) || !grid.is_walkable(target) {
            return Err(PathError::FullyBlocked);
        }

        let generation = self.begin(grid.len());
        let mut discovered = 0u32;

        let h = octile_distance(start, target);
        self.nodes[start_index] = SearchNode {
            g: 0,
            h,
            parent: NO_PARENT,
            discovered,
            closed: false,
            generation,
        };
        self.open
            .push(Reverse((h, h, discovered, start_index as u32, 0)));

        while let Some(Reverse((_, _, _, index, g))) = self.open.pop() {
            let index = index as usize;
            let node = self.nodes[index];
            if node.closed || node.g != g {
                continue;
            }
            self.nodes[index].closed = true;

            if index == target_index {
                let cells = self.retrace(grid, start_index, target_index);
                self.open.clear();
                return Ok((cells, g));
            }

            let current = grid.coord_of(index);
            for &(dx, dy) in &NEIGHBOR_OFFSETS {
                if !grid.can_step(current, dx, dy) {
                    continue;
                }
                let neighbor = current.offset(dx, dy);
                let Some(neighbor_index) = grid.index_of(neighbor) else {
                    continue;
                };

                let slot = &mut self.nodes[neighbor_index];
                if slot.generation != generation {
                    discovered += 1;
                    *slot = SearchNode {
                        discovered,
                        generation,
                        ..SearchNode::STALE
                    };
                }
                if slot.closed {
                    continue;
                }

                let tentative = g + step_cost(dx, dy);
                if tentative < slot.g {
                    slot.g = tentative;
                    slot.h = octile_distance(neighbor, target);
                    slot.parent = index as u32;
                    self.open.push(Reverse((
                        tentative + slot.h,
                        slot.h,
                        slot.discovered,
                        neighbor_index as u32,
                        tentative,
                    )));
                }
            }
        }

        Err(PathError::Unreachable)
    }

    /// Start a new search: size the arena and advance the generation.
    fn begin(&mut self, len: usize) -> u32 {
        if self.nodes.len() != len {
            self.nodes.clear();
            self.nodes.resize(len, SearchNode::STALE);
            self.generation = 0;
        }

        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            // Wrapped: tags from 2^32 searches ago could collide
            self.nodes.fill(SearchNode::STALE);
            self.generation = 1;
        }

        self.open.clear();
        self.generation
    }

    /// Follow parents from the target back to (excluding) the start.
    fn retrace(&self, grid: &GridMap, start_index: usize, target_index: usize) -> Vec<CellCoord> {
        let mut cells = Vec::new();
        let mut current = target_index;
        while current != start_index {
            cells.push(grid.coord_of(current));
            let parent = self.nodes[current].parent;
            if parent == NO_PARENT {
                break;
            }
            current = parent as usize;
        }
        cells.reverse();
        cells
    }
}

/// Find a path with a throwaway [`PathFinder`].
///
/// Prefer keeping a finder around when searching repeatedly.
///
/// # Errors
///
/// See [`PathFinder::find_path`].
pub fn find_path(grid: &GridMap, start: Vec2, target: Vec2) -> Result<Path, PathError> {
    PathFinder::new().find_path(grid, start, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(size: usize) -> GridMap {
        GridMap::from_fn(Vec2::ZERO, 1.0, size, size, |_| true)
    }

    fn center(x: i32, y: i32) -> Vec2 {
        Vec2::new(x as f32 + 0.5, y as f32 + 0.5)
    }

    /// Check that every step is a legal single move.
    fn assert_legal_steps(grid: &GridMap, start: CellCoord, cells: &[CellCoord]) {
        let mut previous = start;
        for &cell in cells {
            let (dx, dy) = (cell.x - previous.x, cell.y - previous.y);
            assert!(dx.abs() <= 1 && dy.abs() <= 1 && (dx, dy) != (0, 0));
            assert!(
                grid.can_step(previous, dx, dy),
                "illegal step {previous} -> {cell}"
            );
            previous = cell;
        }
    }

    #[test]
    fn test_octile_distance() {
        let o = CellCoord::new(0, 0);
        assert_eq!(octile_distance(o, CellCoord::new(3, 0)), 30);
        assert_eq!(octile_distance(o, CellCoord::new(3, 3)), 42);
        assert_eq!(octile_distance(o, CellCoord::new(-2, 5)), 2 * 14 + 3 * 10);
    }

    #[test]
    fn test_open_field_diagonal() {
        let grid = open_grid(10);
        let path = find_path(&grid, center(0, 0), center(9, 9)).unwrap();

        assert_eq!(path.len(), 9);
        assert_eq!(path.cost, 9 * DIAGONAL_COST);
        for (i, cell) in path.cells.iter().enumerate() {
            let step = i as i32 + 1;
            assert_eq!(*cell, CellCoord::new(step, step));
        }
        assert_eq!(path.waypoints.last(), Some(&center(9, 9)));
    }

    #[test]
    fn test_straight_line() {
        let grid = open_grid(10);
        let path = find_path(&grid, center(0, 0), center(3, 0)).unwrap();

        assert_eq!(path.len(), 3);
        assert_eq!(path.cost, 30);
        assert!((path.length_from(center(0, 0)) - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_same_cell_yields_empty_path() {
        let grid = open_grid(4);
        let path = find_path(&grid, Vec2::new(1.1, 1.1), Vec2::new(1.9, 1.8)).unwrap();
        assert!(path.is_empty());
        assert_eq!(path.cost, 0);
    }

    #[test]
    fn test_wall_with_gap() {
        #[rustfmt::skip]
        let grid = GridMap::from_ascii(Vec2::ZERO, 1.0, &[
            ".....#....",
            ".....#....",
            ".....#....",
            ".....#....",
            ".....#....",
            "..........",
            ".....#....",
            ".....#....",
            ".....#....",
            ".....#....",
        ]);
        let gap = CellCoord::new(5, 4);
        assert!(grid.is_walkable(gap));

        let start = CellCoord::new(2, 8);
        let target = CellCoord::new(8, 8);
        let path = find_path(&grid, center(2, 8), center(8, 8)).unwrap();

        assert!(path.cells.contains(&gap));
        assert_legal_steps(&grid, start, &path.cells);
        // A diagonal into the gap would cut a wall corner, so the gap is
        // entered from (4,4) and left towards (6,4): 48 + 20 + 48
        assert_eq!(path.cost, 116);
        assert!(path.cost > octile_distance(start, target));
    }

    #[test]
    fn test_no_corner_cutting() {
        #[rustfmt::skip]
        let grid = GridMap::from_ascii(Vec2::ZERO, 1.0, &[
            "....",
            ".#..",
            "..#.",
            "....",
        ]);
        // (1,1) -> (2,2) would slip between (1,2) and (2,1)
        let start = CellCoord::new(1, 1);
        let path = find_path(&grid, center(1, 1), center(2, 2)).unwrap();

        assert_legal_steps(&grid, start, &path.cells);
        assert_eq!(path.len(), 6);
        assert_eq!(path.cost, 6 * ORTHOGONAL_COST);
    }

    #[test]
    fn test_unreachable_target() {
        #[rustfmt::skip]
        let grid = GridMap::from_ascii(Vec2::ZERO, 1.0, &[
            ".....",
            ".###.",
            ".#.#.",
            ".###.",
            ".....",
        ]);

        let result = find_path(&grid, center(0, 0), center(2, 2));
        assert_eq!(result, Err(PathError::Unreachable));
    }

    #[test]
    fn test_out_of_bounds() {
        let grid = open_grid(5);
        assert_eq!(
            find_path(&grid, center(0, 0), Vec2::new(50.0, 2.0)),
            Err(PathError::OutOfBounds)
        );
        assert_eq!(
            find_path(&grid, Vec2::new(-1.0, 0.0), center(2, 2)),
            Err(PathError::OutOfBounds)
        );
    }

    #[test]
    fn test_empty_grid() {
        assert_eq!(
            find_path(&GridMap::empty(), Vec2::ZERO, Vec2::ONE),
            Err(PathError::EmptyGrid)
        );
    }

    #[test]
    fn test_fully_blocked() {
        let grid = GridMap::from_fn(Vec2::ZERO, 1.0, 4, 4, |_| false);
        assert_eq!(
            find_path(&grid, center(0, 0), center(3, 3)),
            Err(PathError::FullyBlocked)
        );
    }

    #[test]
    fn test_blocked_target_snaps_to_nearest_walkable() {
        #[rustfmt::skip]
        let grid = GridMap::from_ascii(Vec2::ZERO, 1.0, &[
            "......",
            "......",
            "....##",
            "....##",
        ]);

        let path = find_path(&grid, center(0, 0), center(5, 0)).unwrap();
        let end = *path.cells.last().unwrap();
        assert!(grid.is_walkable(end));
        assert_eq!(end, CellCoord::new(3, 0));
    }

    #[test]
    fn test_blocked_start_snaps_to_nearest_walkable() {
        #[rustfmt::skip]
        let grid = GridMap::from_ascii(Vec2::ZERO, 1.0, &[
            "....",
            "....",
            "#...",
        ]);

        let path = find_path(&grid, center(0, 0), center(3, 0)).unwrap();
        assert_legal_steps(&grid, CellCoord::new(0, 1), &path.cells);
        assert_eq!(path.cells.last(), Some(&CellCoord::new(3, 0)));
    }

    #[test]
    fn test_deterministic_and_reusable() {
        #[rustfmt::skip]
        let grid = GridMap::from_ascii(Vec2::ZERO, 1.0, &[
            "........",
            "..#..#..",
            "..#..#..",
            "........",
            "..####..",
            "........",
        ]);

        let mut finder = PathFinder::new();
        let first = finder.find_path(&grid, center(0, 0), center(7, 5)).unwrap();
        for _ in 0..5 {
            let again = finder.find_path(&grid, center(0, 0), center(7, 5)).unwrap();
            assert_eq!(again, first);
        }
        assert_eq!(find_path(&grid, center(0, 0), center(7, 5)).unwrap(), first);
    }

    #[test]
    fn test_finder_survives_grid_resize() {
        let mut finder = PathFinder::new();
        let small = open_grid(3);
        let large = open_grid(12);

        assert_eq!(finder.find_path(&small, center(0, 0), center(2, 2)).unwrap().len(), 2);
        assert_eq!(finder.find_path(&large, center(0, 0), center(11, 0)).unwrap().len(), 11);
        assert_eq!(finder.find_path(&small, center(2, 0), center(0, 0)).unwrap().len(), 2);
    }

    #[test]
    fn test_cost_is_optimal_around_obstacle() {
        // Reference: breadth-first relaxation over every cell
        #[rustfmt::skip]
        let grid = GridMap::from_ascii(Vec2::ZERO, 1.0, &[
            "..........",
            "...#......",
            "...#..#...",
            "...#..#...",
            "......#...",
            ".####.#...",
            "......#...",
        ]);
        let start = CellCoord::new(0, 0);
        let target = CellCoord::new(9, 6);

        let mut best = vec![u32::MAX; grid.len()];
        best[grid.index_of(start).unwrap()] = 0;
        let mut changed = true;
        while changed {
            changed = false;
            for index in 0..grid.len() {
                let cost = best[index];
                if cost == u32::MAX {
                    continue;
                }
                let from = grid.coord_of(index);
                for &(dx, dy) in &NEIGHBOR_OFFSETS {
                    if grid.can_step(from, dx, dy) {
                        let next = grid.index_of(from.offset(dx, dy)).unwrap();
                        let candidate = cost + step_cost(dx, dy);
                        if candidate < best[next] {
                            best[next] = candidate;
                            changed = true;
                        }
                    }
                }
            }
        }

        let (cells, cost) = PathFinder::new().search(&grid, start, target).unwrap();
        assert_eq!(cost, best[grid.index_of(target).unwrap()]);
        assert_legal_steps(&grid, start, &cells);
    }
}
