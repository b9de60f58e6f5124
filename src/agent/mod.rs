//! Agent movement
//!
//! Steering helpers and the per-agent movement controller.

mod controller;
pub mod steering;

pub use controller::{AgentBody, AgentController, Contact, MotionPhase};
