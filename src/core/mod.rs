//! Core module
//!
//! Configuration, navigation events and fixed-step timing

mod config;
mod events;
mod time;

pub use config::{AgentConfig, ConfigError, GridConfig, NavConfig, SimConfig};
pub use events::{AgentEvent, EventQueue, NavEvent};
pub(crate) use events::push_bounded;
pub use time::FixedTimestep;
