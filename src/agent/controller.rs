//! Per-agent movement controller
//!
//! An [`AgentController`] owns one agent's navigation request. Every fixed
//! step the owner hands it the body state and an occupancy view, and it
//! returns the velocity the body should take. Along the way it:
//!
//! - plans grid paths with its own [`PathFinder`] on a shared grid snapshot
//! - re-plans periodically, after collisions and when progress stalls
//! - drops the path entirely when the destination is in plain view
//! - bends its heading around walls found by a short forward probe
//! - declares arrival only when close, in view, done with waypoints and slow
//!
//! Nothing is reported through callbacks. Notable transitions are recorded as
//! [`NavEvent`]s and collected with [`AgentController::drain_events`].

use std::collections::VecDeque;

use glam::Vec2;

use super::steering::{Arrive, MIN_STEER_SQUARED, WallSlide, seek};
use crate::core::{AgentConfig, ConfigError, NavEvent, push_bounded};
use crate::nav::{OccupancyQuery, PathFinder, SharedGrid};

// ============================================================================
// Public Types
// ============================================================================

/// Where the controller is in its request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionPhase {
    /// No destination
    #[default]
    Idle,
    /// Moving toward a destination
    Seeking,
    /// Arrived during the last tick; becomes `Idle` on the next one
    Arrived,
}

/// Physical state the owner reports each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AgentBody {
    /// Current position
    pub position: Vec2,
    /// Velocity actually achieved last step
    pub velocity: Vec2,
}

impl AgentBody {
    /// Body at rest at `position`
    #[must_use]
    pub fn at_rest(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
        }
    }
}

/// A collision the owner observed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Contact {
    /// Contact normal pointing away from the other body
    pub normal: Vec2,
    /// Closing speed along the normal
    pub relative_speed: f32,
}

// ============================================================================
// Motion State
// ============================================================================

#[derive(Debug, Clone, Default)]
struct MotionState {
    has_destination: bool,
    destination: Vec2,
    path: Vec<Vec2>,
    path_index: usize,
    repath_timer: f32,
    last_distance: f32,
    no_progress_timer: f32,
    force_repath_timer: f32,
}

impl MotionState {
    fn clear_path(&mut self) {
        self.path.clear();
        self.path_index = 0;
    }

    fn has_remaining_waypoints(&self) -> bool {
        self.path_index < self.path.len()
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Movement controller for one agent.
#[derive(Debug)]
pub struct AgentController {
    config: AgentConfig,
    grid: SharedGrid,
    finder: PathFinder,
    state: MotionState,
    phase: MotionPhase,
    velocity: Vec2,
    disabled: Option<ConfigError>,
    searches: u64,
    events: VecDeque<NavEvent>,
    events_overflowed: bool,
}

impl AgentController {
    /// Undrained events kept before the oldest are dropped.
    pub const EVENT_LIMIT: usize = 256;

    /// Create a controller planning on `grid`.
    ///
    /// An invalid configuration does not fail construction. The controller
    /// logs the problem once, emits [`NavEvent::Disabled`] and then ignores
    /// every command. Use [`AgentController::try_new`] to get the error
    /// instead.
    #[must_use]
    pub fn new(config: AgentConfig, grid: SharedGrid) -> Self {
        match config.validate() {
            Ok(()) => Self::build(config, grid, None),
            Err(err) => {
                log::error!("Agent controller disabled: {err}");
                let reason = err.to_string();
                let mut controller = Self::build(config, grid, Some(err));
                controller.record(NavEvent::Disabled { reason });
                controller
            }
        }
    }

    /// Create a controller, rejecting an invalid configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found in `config`.
    pub fn try_new(config: AgentConfig, grid: SharedGrid) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, grid, None))
    }

    fn build(config: AgentConfig, grid: SharedGrid, disabled: Option<ConfigError>) -> Self {
        Self {
            config,
            grid,
            finder: PathFinder::new(),
            state: MotionState::default(),
            phase: MotionPhase::Idle,
            velocity: Vec2::ZERO,
            disabled,
            searches: 0,
            events: VecDeque::new(),
            events_overflowed: false,
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Start moving toward `destination`, planning from `position`.
    ///
    /// Replaces any active request. A failed search keeps the destination
    /// active; the agent steers straight at it and keeps re-planning.
    pub fn set_destination(&mut self, destination: Vec2, position: Vec2) {
        if let Some(err) = &self.disabled {
            log::debug!("Ignoring destination {destination}: {err}");
            return;
        }

        self.state.destination = destination;
        self.state.has_destination = true;
        self.state.last_distance = position.distance(destination);
        self.state.no_progress_timer = 0.0;
        self.phase = MotionPhase::Seeking;

        log::debug!("Destination set to {destination} from {position}");
        self.record(NavEvent::DestinationSet { destination });

        self.repath(position);
    }

    /// Drop the active request and stop. Does nothing when idle.
    pub fn cancel_destination(&mut self) {
        if self.state.has_destination {
            log::debug!("Destination {} cancelled", self.state.destination);
            self.record(NavEvent::Cancelled);
        }
        self.reset_motion();
        self.phase = MotionPhase::Idle;
    }

    /// Report a collision. Arms the forced re-plan window.
    pub fn on_collision(&mut self, contact: Contact) {
        if self.disabled.is_some() {
            return;
        }
        log::trace!(
            "Collision along {} at {:.2} m/s",
            contact.normal,
            contact.relative_speed
        );
        self.state.force_repath_timer = self.config.force_repath_window;
        self.record(NavEvent::CollisionReported);
    }

    /// Advance one fixed step and return the velocity to apply.
    ///
    /// `occupancy` should already be filtered to the layers this agent
    /// treats as obstacles.
    pub fn tick(&mut self, dt: f32, body: AgentBody, occupancy: &impl OccupancyQuery) -> Vec2 {
        if self.phase == MotionPhase::Arrived {
            self.phase = MotionPhase::Idle;
        }

        if self.disabled.is_some() || !self.state.has_destination {
            self.velocity = Vec2::ZERO;
            return self.velocity;
        }

        let position = body.position;

        // Forced re-plans win over the periodic timer
        if self.state.force_repath_timer > 0.0 {
            self.state.force_repath_timer -= dt;
            self.repath(position);
            self.state.repath_timer = 0.0;
        }

        if self.should_arrive(body, occupancy) {
            self.arrive(position);
            return self.velocity;
        }

        self.state.repath_timer += dt;
        if self.state.repath_timer >= self.config.repath_interval {
            self.state.repath_timer = 0.0;
            self.periodic_repath(position, occupancy);
        }

        let desired = self.desired_direction(position);
        let avoid = WallSlide {
            radius: self.config.radius,
            look_ahead: self.config.look_ahead,
            strength: self.config.avoid_strength,
        };
        let steering = avoid.apply(position, desired, occupancy);

        self.velocity = if steering.length_squared() < MIN_STEER_SQUARED {
            Vec2::ZERO
        } else {
            steering.normalize() * self.cruise_speed(position)
        };

        self.track_progress(dt, position);
        self.velocity
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn should_arrive(&self, body: AgentBody, occupancy: &impl OccupancyQuery) -> bool {
        let destination = self.state.destination;
        body.position.distance(destination) <= self.config.stopping_distance
            && occupancy.has_line_of_sight(body.position, destination, self.config.radius)
            && !self.state.has_remaining_waypoints()
            && body.velocity.length() <= self.config.arrive_speed_threshold
    }

    fn arrive(&mut self, position: Vec2) {
        log::debug!(
            "Arrived at {position} (destination {})",
            self.state.destination
        );
        self.record(NavEvent::Arrived { position });
        self.reset_motion();
        self.phase = MotionPhase::Arrived;
    }

    fn reset_motion(&mut self) {
        self.state.has_destination = false;
        self.state.clear_path();
        self.state.repath_timer = 0.0;
        self.state.no_progress_timer = 0.0;
        self.velocity = Vec2::ZERO;
    }

    fn periodic_repath(&mut self, position: Vec2, occupancy: &impl OccupancyQuery) {
        let destination = self.state.destination;
        if occupancy.has_line_of_sight(position, destination, self.config.radius) {
            if !self.state.path.is_empty() {
                log::trace!("Destination in view, dropping path");
                self.state.clear_path();
                self.record(NavEvent::PathDiscarded);
            }
            return;
        }

        if !self.state.has_remaining_waypoints() {
            self.repath(position);
        }
    }

    fn repath(&mut self, position: Vec2) {
        self.state.clear_path();
        self.searches += 1;

        let grid = self.grid.snapshot();
        match self
            .finder
            .find_path(&grid, position, self.state.destination)
        {
            Ok(path) => {
                log::trace!(
                    "Planned {} waypoints (cost {}) toward {}",
                    path.len(),
                    path.cost,
                    self.state.destination
                );
                self.record(NavEvent::PathFound {
                    waypoints: path.len(),
                    cost: path.cost,
                });
                self.state.path = path.waypoints;
            }
            Err(error) => {
                log::debug!(
                    "No path from {position} to {}: {error}",
                    self.state.destination
                );
                self.record(NavEvent::PathFailed { error });
            }
        }
    }

    fn desired_direction(&mut self, position: Vec2) -> Vec2 {
        let state = &mut self.state;
        if state.has_remaining_waypoints()
            && position.distance(state.path[state.path_index]) <= self.config.stopping_distance
        {
            state.path_index += 1;
        }

        match state.path.get(state.path_index) {
            Some(&waypoint) => seek(position, waypoint),
            None => seek(position, state.destination),
        }
    }

    fn cruise_speed(&self, position: Vec2) -> f32 {
        if self.state.has_remaining_waypoints() {
            return self.config.move_speed;
        }
        Arrive::new(self.config.move_speed, self.config.slow_radius)
            .speed_at(position.distance(self.state.destination))
    }

    fn track_progress(&mut self, dt: f32, position: Vec2) {
        let distance = position.distance(self.state.destination);
        if distance < self.state.last_distance - self.config.progress_epsilon {
            self.state.last_distance = distance;
            self.state.no_progress_timer = 0.0;
            return;
        }

        self.state.no_progress_timer += dt;
        if self.state.no_progress_timer >= self.config.no_progress_time {
            self.state.no_progress_timer = 0.0;
            log::debug!(
                "No progress for {}s at {position}, re-planning",
                self.config.no_progress_time
            );
            self.record(NavEvent::StallRecovered { distance });
            self.repath(position);
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Grid this controller plans on
    #[must_use]
    pub fn grid(&self) -> &SharedGrid {
        &self.grid
    }

    /// Lifecycle phase
    #[must_use]
    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    /// Whether a misconfiguration disabled this controller
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.is_some()
    }

    /// Why this controller is disabled
    #[must_use]
    pub fn disabled_reason(&self) -> Option<&ConfigError> {
        self.disabled.as_ref()
    }

    /// Active destination
    #[must_use]
    pub fn destination(&self) -> Option<Vec2> {
        self.state
            .has_destination
            .then_some(self.state.destination)
    }

    /// Current path, including waypoints already passed
    #[must_use]
    pub fn path(&self) -> &[Vec2] {
        &self.state.path
    }

    /// Index of the next waypoint
    #[must_use]
    pub fn path_index(&self) -> usize {
        self.state.path_index
    }

    /// Waypoints not yet reached
    #[must_use]
    pub fn remaining_waypoints(&self) -> &[Vec2] {
        self.state
            .path
            .get(self.state.path_index..)
            .unwrap_or_default()
    }

    /// Velocity returned by the last tick
    #[must_use]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Seconds since the last periodic re-plan check
    #[must_use]
    pub fn repath_timer(&self) -> f32 {
        self.state.repath_timer
    }

    /// Seconds without progress
    #[must_use]
    pub fn no_progress_timer(&self) -> f32 {
        self.state.no_progress_timer
    }

    /// Seconds left in the forced re-plan window
    #[must_use]
    pub fn force_repath_timer(&self) -> f32 {
        self.state.force_repath_timer
    }

    /// Number of path searches run so far
    #[must_use]
    pub fn search_count(&self) -> u64 {
        self.searches
    }

    /// Number of recorded events not yet drained
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Take the events recorded since the last call
    pub fn drain_events(&mut self) -> impl Iterator<Item = NavEvent> + '_ {
        self.events_overflowed = false;
        self.events.drain(..)
    }

    /// Keep at most [`AgentController::EVENT_LIMIT`] undrained events.
    fn record(&mut self, event: NavEvent) {
        if push_bounded(&mut self.events, event, Self::EVENT_LIMIT) && !self.events_overflowed {
            log::warn!(
                "Agent controller holds {} undrained events, dropping the oldest",
                Self::EVENT_LIMIT
            );
            self.events_overflowed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::{GridMap, Layer, Obstacle, ObstacleField, PathError};

    const DT: f32 = 0.1;

    fn open_grid(size: usize) -> SharedGrid {
        SharedGrid::new(GridMap::from_fn(Vec2::ZERO, 1.0, size, size, |_| true))
    }

    fn grid_from(field: &ObstacleField) -> SharedGrid {
        SharedGrid::new(GridMap::build(
            Vec2::splat(5.0),
            Vec2::splat(10.0),
            1.0,
            0.25,
            field,
        ))
    }

    /// Tall wall at x in [5, 6] for y >= 2; the way around is along the bottom.
    fn wall_field() -> ObstacleField {
        let mut field = ObstacleField::new();
        field.add(Obstacle::rect(
            Vec2::new(5.0, 2.0),
            Vec2::new(6.0, 10.0),
            Layer::Wall,
        ));
        field
    }

    /// Closed box around the cell centered on (7.5, 7.5).
    fn boxed_field() -> ObstacleField {
        let mut field = ObstacleField::new();
        for (min, max) in [
            (Vec2::new(6.0, 6.0), Vec2::new(9.0, 7.0)),
            (Vec2::new(6.0, 8.0), Vec2::new(9.0, 9.0)),
            (Vec2::new(6.0, 7.0), Vec2::new(7.0, 8.0)),
            (Vec2::new(8.0, 7.0), Vec2::new(9.0, 8.0)),
        ] {
            field.add(Obstacle::rect(min, max, Layer::Wall));
        }
        field
    }

    fn events(controller: &mut AgentController) -> Vec<NavEvent> {
        controller.drain_events().collect()
    }

    #[test]
    fn test_set_destination_plans_path() {
        let field = wall_field();
        let mut controller = AgentController::new(AgentConfig::default(), grid_from(&field));

        controller.set_destination(Vec2::new(8.5, 7.5), Vec2::new(2.5, 7.5));

        assert_eq!(controller.phase(), MotionPhase::Seeking);
        assert_eq!(controller.destination(), Some(Vec2::new(8.5, 7.5)));
        assert!(!controller.path().is_empty());
        assert_eq!(controller.path().last(), Some(&Vec2::new(8.5, 7.5)));
        assert_eq!(controller.search_count(), 1);

        let events = events(&mut controller);
        assert_eq!(
            events[0],
            NavEvent::DestinationSet {
                destination: Vec2::new(8.5, 7.5)
            }
        );
        assert!(matches!(events[1], NavEvent::PathFound { .. }));
    }

    #[test]
    fn test_follows_waypoints_in_order() {
        let mut controller = AgentController::new(AgentConfig::default(), open_grid(6));
        let field = ObstacleField::new();

        controller.set_destination(Vec2::new(4.5, 0.5), Vec2::new(0.5, 0.5));
        assert_eq!(controller.path().len(), 4);

        let velocity = controller.tick(DT, AgentBody::at_rest(Vec2::new(0.5, 0.5)), &field);
        assert!((velocity - Vec2::new(3.5, 0.0)).length() < 1e-4);
        assert_eq!(controller.path_index(), 0);

        // Standing on the first waypoint advances to the second
        controller.tick(DT, AgentBody::at_rest(Vec2::new(1.5, 0.5)), &field);
        assert_eq!(controller.path_index(), 1);
        assert_eq!(controller.remaining_waypoints().len(), 3);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut controller = AgentController::new(AgentConfig::default(), open_grid(6));
        let field = ObstacleField::new();

        controller.cancel_destination();
        assert!(events(&mut controller).is_empty());

        controller.set_destination(Vec2::new(4.5, 4.5), Vec2::new(0.5, 0.5));
        controller.tick(DT, AgentBody::at_rest(Vec2::new(0.5, 0.5)), &field);
        let _ = events(&mut controller);

        controller.cancel_destination();
        controller.cancel_destination();

        assert_eq!(events(&mut controller), vec![NavEvent::Cancelled]);
        assert_eq!(controller.phase(), MotionPhase::Idle);
        assert_eq!(controller.destination(), None);
        assert!(controller.path().is_empty());
        assert_eq!(controller.velocity(), Vec2::ZERO);
        assert_eq!(
            controller.tick(DT, AgentBody::at_rest(Vec2::new(0.5, 0.5)), &field),
            Vec2::ZERO
        );
    }

    #[test]
    fn test_arrival_requires_line_of_sight() {
        // Grid planned before the obstacle appeared
        let mut controller = AgentController::new(AgentConfig::default(), open_grid(4));
        let mut field = ObstacleField::new();
        let pebble = field.add(Obstacle::circle(Vec2::new(0.55, 0.5), 0.02, Layer::Hard));

        let position = Vec2::new(0.5, 0.5);
        controller.set_destination(Vec2::new(0.6, 0.5), position);
        assert!(controller.path().is_empty());

        controller.tick(DT, AgentBody::at_rest(position), &field);
        assert_eq!(controller.phase(), MotionPhase::Seeking);
        assert!(controller.destination().is_some());

        field.remove(pebble);
        let _ = events(&mut controller);
        let velocity = controller.tick(DT, AgentBody::at_rest(position), &field);

        assert_eq!(velocity, Vec2::ZERO);
        assert_eq!(controller.phase(), MotionPhase::Arrived);
        assert_eq!(controller.destination(), None);
        assert_eq!(
            events(&mut controller),
            vec![NavEvent::Arrived { position }]
        );

        controller.tick(DT, AgentBody::at_rest(position), &field);
        assert_eq!(controller.phase(), MotionPhase::Idle);
    }

    #[test]
    fn test_arrival_requires_low_speed() {
        let mut controller = AgentController::new(AgentConfig::default(), open_grid(4));
        let field = ObstacleField::new();
        let position = Vec2::new(0.5, 0.5);
        controller.set_destination(Vec2::new(0.6, 0.5), position);

        let moving = AgentBody {
            position,
            velocity: Vec2::new(1.0, 0.0),
        };
        controller.tick(DT, moving, &field);
        assert_eq!(controller.phase(), MotionPhase::Seeking);

        controller.tick(DT, AgentBody::at_rest(position), &field);
        assert_eq!(controller.phase(), MotionPhase::Arrived);
    }

    #[test]
    fn test_stall_replans_once_per_episode() {
        let field = wall_field();
        let mut controller = AgentController::new(AgentConfig::default(), grid_from(&field));
        let stuck = AgentBody::at_rest(Vec2::new(2.5, 7.5));

        controller.set_destination(Vec2::new(8.5, 7.5), stuck.position);
        assert_eq!(controller.search_count(), 1);

        for _ in 0..3 {
            controller.tick(DT, stuck, &field);
        }
        assert_eq!(controller.search_count(), 1);

        controller.tick(DT, stuck, &field);
        assert_eq!(controller.search_count(), 2);
        assert_eq!(controller.no_progress_timer(), 0.0);
        let stalls = events(&mut controller)
            .into_iter()
            .filter(|e| matches!(e, NavEvent::StallRecovered { .. }))
            .count();
        assert_eq!(stalls, 1);

        for _ in 0..3 {
            controller.tick(DT, stuck, &field);
        }
        assert_eq!(controller.search_count(), 2);
        controller.tick(DT, stuck, &field);
        assert_eq!(controller.search_count(), 3);
    }

    #[test]
    fn test_progress_resets_stall_timer() {
        let field = wall_field();
        let mut controller = AgentController::new(AgentConfig::default(), grid_from(&field));
        let mut position = Vec2::new(2.5, 7.5);
        controller.set_destination(Vec2::new(2.5, 0.5), position);

        for _ in 0..10 {
            let velocity = controller.tick(DT, AgentBody::at_rest(position), &field);
            position += velocity * DT;
        }
        assert_eq!(controller.search_count(), 1);
        assert!(controller.no_progress_timer() < 1e-6);
    }

    #[test]
    fn test_forced_repath_preempts_periodic() {
        let field = boxed_field();
        let config = AgentConfig::default().with_no_progress_time(10.0);
        let stuck = AgentBody::at_rest(Vec2::new(1.5, 1.5));

        let mut plain = AgentController::new(config.clone(), grid_from(&field));
        let mut bumped = AgentController::new(config, grid_from(&field));
        for controller in [&mut plain, &mut bumped] {
            controller.set_destination(Vec2::new(7.5, 7.5), stuck.position);
            for _ in 0..3 {
                controller.tick(DT, stuck, &field);
            }
            assert_eq!(controller.search_count(), 1);
        }

        // Without a collision the periodic timer fires and resets
        plain.tick(DT, stuck, &field);
        assert_eq!(plain.search_count(), 2);
        assert!(plain.repath_timer().abs() < 1e-6);

        // With one, the forced re-plan runs and the periodic one does not
        bumped.on_collision(Contact {
            normal: Vec2::X,
            relative_speed: 1.0,
        });
        assert_eq!(bumped.force_repath_timer(), 0.15);
        bumped.tick(DT, stuck, &field);
        assert_eq!(bumped.search_count(), 2);
        assert!((bumped.repath_timer() - DT).abs() < 1e-6);
    }

    #[test]
    fn test_unreachable_keeps_destination() {
        let field = boxed_field();
        let mut controller = AgentController::new(AgentConfig::default(), grid_from(&field));
        let mut position = Vec2::new(1.5, 1.5);

        controller.set_destination(Vec2::new(7.5, 7.5), position);
        let failed = events(&mut controller)
            .into_iter()
            .any(|e| e == NavEvent::PathFailed { error: PathError::Unreachable });
        assert!(failed);

        for _ in 0..8 {
            let velocity = controller.tick(DT, AgentBody::at_rest(position), &field);
            assert!(velocity.length() > 0.0);
            position += velocity * DT;
        }

        assert_eq!(controller.phase(), MotionPhase::Seeking);
        assert_eq!(controller.destination(), Some(Vec2::new(7.5, 7.5)));
        assert!(controller.path().is_empty());
    }

    #[test]
    fn test_line_of_sight_discards_stale_path() {
        // The grid still has the wall, the world no longer does
        let stale = wall_field();
        let open = ObstacleField::new();
        let config = AgentConfig::default().with_no_progress_time(10.0);
        let mut controller = AgentController::new(config, grid_from(&stale));
        let position = Vec2::new(2.5, 7.5);

        controller.set_destination(Vec2::new(8.5, 7.5), position);
        assert!(!controller.path().is_empty());
        let _ = events(&mut controller);

        for _ in 0..4 {
            controller.tick(DT, AgentBody::at_rest(position), &open);
        }

        assert!(controller.path().is_empty());
        assert_eq!(controller.search_count(), 1);
        assert!(events(&mut controller).contains(&NavEvent::PathDiscarded));

        // Steering goes straight at the destination
        let velocity = controller.tick(DT, AgentBody::at_rest(position), &open);
        assert!((velocity.normalize() - Vec2::X).length() < 1e-4);
    }

    #[test]
    fn test_slows_on_final_leg() {
        let mut controller = AgentController::new(AgentConfig::default(), open_grid(4));
        let field = ObstacleField::new();
        let position = Vec2::new(0.5, 0.5);

        controller.set_destination(Vec2::new(0.75, 0.5), position);
        let velocity = controller.tick(DT, AgentBody::at_rest(position), &field);

        // Half the slow radius away
        assert!((velocity.length() - 3.5 * 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_zero_slow_radius_keeps_full_speed() {
        let config = AgentConfig::default().with_slow_radius(0.0);
        let mut controller = AgentController::new(config, open_grid(4));
        let field = ObstacleField::new();
        let position = Vec2::new(0.5, 0.5);

        controller.set_destination(Vec2::new(0.75, 0.5), position);
        let velocity = controller.tick(DT, AgentBody::at_rest(position), &field);

        assert!((velocity.length() - 3.5).abs() < 1e-4);
    }

    #[test]
    fn test_undrained_events_are_bounded() {
        let field = boxed_field();
        let mut controller = AgentController::new(AgentConfig::default(), grid_from(&field));
        let stuck = AgentBody::at_rest(Vec2::new(1.5, 1.5));
        controller.set_destination(Vec2::new(7.5, 7.5), stuck.position);

        for i in 0..50_000 {
            if i % 10 == 0 {
                controller.on_collision(Contact {
                    normal: Vec2::X,
                    relative_speed: 1.0,
                });
            }
            controller.tick(DT, stuck, &field);
            assert!(controller.pending_events() <= AgentController::EVENT_LIMIT);
        }

        // The newest events survive
        let kept = events(&mut controller);
        assert_eq!(kept.len(), AgentController::EVENT_LIMIT);
        assert!(!kept.contains(&NavEvent::DestinationSet {
            destination: Vec2::new(7.5, 7.5)
        }));
        assert_eq!(controller.pending_events(), 0);
    }

    #[test]
    fn test_misconfigured_controller_is_disabled() {
        let config = AgentConfig::default().with_move_speed(0.0);
        let mut controller = AgentController::new(config.clone(), open_grid(4));

        assert!(controller.is_disabled());
        assert!(matches!(
            controller.disabled_reason(),
            Some(ConfigError::InvalidValue {
                field: "agent.move_speed",
                ..
            })
        ));
        assert!(matches!(
            events(&mut controller).as_slice(),
            [NavEvent::Disabled { .. }]
        ));

        controller.set_destination(Vec2::new(3.5, 3.5), Vec2::new(0.5, 0.5));
        assert_eq!(controller.destination(), None);
        assert_eq!(controller.search_count(), 0);
        assert_eq!(
            controller.tick(DT, AgentBody::at_rest(Vec2::new(0.5, 0.5)), &ObstacleField::new()),
            Vec2::ZERO
        );

        assert!(AgentController::try_new(config, open_grid(4)).is_err());
    }
}
