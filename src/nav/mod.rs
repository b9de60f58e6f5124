//! Grid navigation
//!
//! Occupancy queries, the walkability grid and A* pathfinding.

mod grid;
mod occupancy;
mod pathfinding;

pub use grid::{CellCoord, GridCell, GridMap, MAX_GRID_CELLS, SharedGrid};
pub use occupancy::{
    Layer, LayerMask, MaskedField, Obstacle, ObstacleField, ObstacleId, OccupancyQuery, Shape,
    SweepHit,
};
pub use pathfinding::{
    DIAGONAL_COST, ORTHOGONAL_COST, Path, PathError, PathFinder, find_path, octile_distance,
};
