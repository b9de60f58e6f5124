//! Navigation configuration
//!
//! All tunables live in plain serde structs so a whole setup can be loaded
//! from a single RON file.

use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::nav::{GridMap, LayerMask, MAX_GRID_CELLS};

/// Grid configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Center of the navigable rectangle
    pub world_center: Vec2,
    /// Size of the navigable rectangle
    pub world_size: Vec2,
    /// Cell edge length
    pub cell_size: f32,
    /// Radius of the disc tested at each cell center
    pub agent_radius: f32,
    /// Layers that make a cell unwalkable
    pub obstacle_mask: LayerMask,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            world_center: Vec2::ZERO,
            world_size: Vec2::new(40.0, 24.0),
            cell_size: 0.5,
            agent_radius: 0.25,
            obstacle_mask: LayerMask::STATIC,
        }
    }
}

impl GridConfig {
    /// Set the navigable rectangle
    #[must_use]
    pub fn with_world(mut self, center: Vec2, size: Vec2) -> Self {
        self.world_center = center;
        self.world_size = size;
        self
    }

    /// Set the cell size
    #[must_use]
    pub fn with_cell_size(mut self, cell_size: f32) -> Self {
        self.cell_size = cell_size;
        self
    }

    /// Set the probe radius
    #[must_use]
    pub fn with_agent_radius(mut self, radius: f32) -> Self {
        self.agent_radius = radius;
        self
    }

    /// Check every value is in range
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        at_least("grid.cell_size", self.cell_size, 0.1)?;
        at_least("grid.agent_radius", self.agent_radius, 0.0)?;
        at_least("grid.world_size.x", self.world_size.x, 0.0)?;
        at_least("grid.world_size.y", self.world_size.y, 0.0)?;
        if GridMap::dimensions_for(self.world_size, self.cell_size).is_none() {
            return Err(ConfigError::invalid(
                "grid.world_size",
                format!(
                    "needs more than {MAX_GRID_CELLS} cells at cell size {}",
                    self.cell_size
                ),
            ));
        }
        if !self.world_center.is_finite() {
            return Err(ConfigError::invalid("grid.world_center", "must be finite"));
        }
        Ok(())
    }
}

/// Movement controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Cruise speed in world units per second
    pub move_speed: f32,
    /// Distance at which waypoints and the destination count as reached
    pub stopping_distance: f32,
    /// Arrival also requires the agent to be slower than this
    pub arrive_speed_threshold: f32,
    /// Seconds between periodic re-plans
    pub repath_interval: f32,
    /// Minimum improvement in distance that counts as progress
    pub progress_epsilon: f32,
    /// Seconds without progress before a recovery re-plan
    pub no_progress_time: f32,
    /// Length of the forward avoidance probe
    pub look_ahead: f32,
    /// Weight of the wall-slide vector relative to the desired direction
    pub avoid_strength: f32,
    /// Seconds of forced re-planning after any collision
    pub force_repath_window: f32,
    /// Approximate body radius used for probes and line of sight
    pub radius: f32,
    /// Within this distance of the destination, on the final leg, speed
    /// scales down linearly. Zero disables slowing.
    pub slow_radius: f32,
    /// Layers the probes treat as obstacles
    pub obstacle_mask: LayerMask,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            move_speed: 3.5,
            stopping_distance: 0.15,
            arrive_speed_threshold: 0.25,
            repath_interval: 0.35,
            progress_epsilon: 0.01,
            no_progress_time: 0.35,
            look_ahead: 0.6,
            avoid_strength: 1.0,
            force_repath_window: 0.15,
            radius: 0.25,
            slow_radius: 0.5,
            obstacle_mask: LayerMask::STATIC,
        }
    }
}

impl AgentConfig {
    /// Set the cruise speed
    #[must_use]
    pub fn with_move_speed(mut self, speed: f32) -> Self {
        self.move_speed = speed;
        self
    }

    /// Set the body radius
    #[must_use]
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    /// Set the periodic re-plan interval
    #[must_use]
    pub fn with_repath_interval(mut self, seconds: f32) -> Self {
        self.repath_interval = seconds;
        self
    }

    /// Set the no-progress timeout
    #[must_use]
    pub fn with_no_progress_time(mut self, seconds: f32) -> Self {
        self.no_progress_time = seconds;
        self
    }

    /// Set the final-leg slow-down radius
    #[must_use]
    pub fn with_slow_radius(mut self, radius: f32) -> Self {
        self.slow_radius = radius;
        self
    }

    /// Check every value is in range
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        at_least("agent.move_speed", self.move_speed, 0.1)?;
        at_least("agent.stopping_distance", self.stopping_distance, 0.01)?;
        at_least("agent.arrive_speed_threshold", self.arrive_speed_threshold, 0.0)?;
        at_least("agent.repath_interval", self.repath_interval, 0.05)?;
        at_least("agent.progress_epsilon", self.progress_epsilon, 0.01)?;
        at_least("agent.no_progress_time", self.no_progress_time, 0.05)?;
        at_least("agent.look_ahead", self.look_ahead, 0.05)?;
        at_least("agent.avoid_strength", self.avoid_strength, 0.0)?;
        at_least("agent.force_repath_window", self.force_repath_window, 0.0)?;
        at_least("agent.radius", self.radius, 0.0)?;
        at_least("agent.slow_radius", self.slow_radius, 0.0)?;
        Ok(())
    }
}

/// Simulation harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed step length in seconds
    pub fixed_dt: f32,
    /// Upper bound on fixed steps run for one frame
    pub max_steps_per_frame: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 0.02,
            max_steps_per_frame: 8,
        }
    }
}

impl SimConfig {
    /// Check every value is in range
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        at_least("sim.fixed_dt", self.fixed_dt, 0.001)?;
        if self.max_steps_per_frame == 0 {
            return Err(ConfigError::invalid(
                "sim.max_steps_per_frame",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Complete navigation setup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Grid settings
    pub grid: GridConfig,
    /// Per-agent controller settings
    pub agent: AgentConfig,
    /// Simulation harness settings
    pub sim: SimConfig,
}

impl NavConfig {
    /// Check every section
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid.validate()?;
        self.agent.validate()?;
        self.sim.validate()
    }

    /// Parse and validate a RON string
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            ron::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_ron_str(&source)
    }

    /// Save to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let source = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, source).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

fn at_least(field: &'static str, value: f32, min: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must be at least {min}, got {value}"),
        ))
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A value is out of range
    InvalidValue {
        /// Dotted path of the field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
    /// Error reading or writing a file
    Io(String),
    /// Error parsing or serializing RON
    Parse(String),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => write!(f, "Invalid {field}: {reason}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
