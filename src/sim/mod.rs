//! Headless simulation harness
//!
//! Kinematic disc bodies in a hecs world, stepped at a fixed rate, plus a
//! tap-to-move command layer on top.

mod commander;
mod world;

pub use commander::{TapCommander, TapOutcome};
pub use world::{Body, NavWorld};
