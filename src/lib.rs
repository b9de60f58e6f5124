//! Grid navigation for 2D agents
//!
//! This crate provides:
//! - Walkability grids baked from 2D obstacle shapes
//! - 8-connected A* search with octile costs and no corner cutting
//! - A per-agent movement controller with re-planning and wall sliding
//! - A headless hecs simulation harness with tap-to-move commands

pub mod agent;
pub mod core;
pub mod nav;
pub mod sim;

// Re-exports for convenience
pub use glam;
pub use hecs;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::agent::{AgentBody, AgentController, Contact, MotionPhase};
    pub use crate::core::{AgentConfig, AgentEvent, ConfigError, GridConfig, NavConfig, NavEvent};
    pub use crate::nav::{
        CellCoord, GridMap, Layer, LayerMask, Obstacle, ObstacleField, OccupancyQuery, Path,
        PathError, PathFinder, SharedGrid,
    };
    pub use crate::sim::{Body, NavWorld, TapCommander, TapOutcome};
    pub use glam::Vec2;
}
