//! Headless navigation world
//!
//! [`NavWorld`] stands in for a physics engine: agents are kinematic discs in
//! a hecs world, obstacles live in an [`ObstacleField`], and each fixed step
//! ticks every controller, moves bodies with sweep-and-slide, pushes
//! overlapping agents apart and reports new contacts back to the controllers.

use glam::Vec2;
use hecs::Entity;
use rustc_hash::FxHashSet;

use crate::agent::{AgentBody, AgentController, Contact};
use crate::core::{AgentConfig, AgentEvent, ConfigError, EventQueue, FixedTimestep, NavConfig};
use crate::nav::{LayerMask, ObstacleField, ObstacleId, OccupancyQuery, SharedGrid};

/// Gap kept between a body and the surface it slid against.
const SKIN: f32 = 0.005;

/// Extra reach used when looking for touching shapes.
const CONTACT_SLOP: f32 = 0.01;

/// Slide iterations per step.
const MAX_SLIDES: usize = 3;

// ============================================================================
// Components
// ============================================================================

/// Kinematic disc body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    /// Center
    pub position: Vec2,
    /// Velocity achieved by the last step
    pub velocity: Vec2,
    /// Disc radius
    pub radius: f32,
}

impl Body {
    /// Body at rest
    #[must_use]
    pub fn new(position: Vec2, radius: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            radius,
        }
    }

    /// Whether `point` lies on this body
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        self.position.distance_squared(point) <= self.radius * self.radius
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Touching {
    Obstacle(ObstacleId),
    Agent(Entity),
}

// ============================================================================
// World
// ============================================================================

/// Agents, obstacles and the shared grid, stepped at a fixed rate.
pub struct NavWorld {
    world: hecs::World,
    obstacles: ObstacleField,
    grid: SharedGrid,
    config: NavConfig,
    events: EventQueue,
    time: FixedTimestep,
    contacts: FxHashSet<(Entity, Touching)>,
}

impl NavWorld {
    /// Create a world and bake its grid from `obstacles`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when any section of `config` is invalid.
    pub fn new(config: NavConfig, obstacles: ObstacleField) -> Result<Self, ConfigError> {
        config.validate()?;

        let grid = SharedGrid::build(
            &config.grid,
            &obstacles.masked(config.grid.obstacle_mask),
        );
        let time = FixedTimestep::new(config.sim.fixed_dt, config.sim.max_steps_per_frame);

        Ok(Self {
            world: hecs::World::new(),
            obstacles,
            grid,
            config,
            events: EventQueue::new(),
            time,
            contacts: FxHashSet::default(),
        })
    }

    // ------------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------------

    /// Spawn an agent with the world's default agent configuration
    pub fn spawn_agent(&mut self, position: Vec2) -> Entity {
        let config = self.config.agent.clone();
        self.spawn_agent_with(position, config)
    }

    /// Spawn an agent with its own configuration
    pub fn spawn_agent_with(&mut self, position: Vec2, config: AgentConfig) -> Entity {
        let body = Body::new(position, config.radius);
        let controller = AgentController::new(config, self.grid.clone());
        let entity = self.world.spawn((body, controller));
        log::debug!("Spawned agent {entity:?} at {position}");
        entity
    }

    /// Remove an agent. Returns false if it did not exist.
    pub fn despawn(&mut self, agent: Entity) -> bool {
        if self.world.despawn(agent).is_err() {
            return false;
        }
        self.contacts
            .retain(|(a, other)| *a != agent && *other != Touching::Agent(agent));
        true
    }

    /// Check if an agent exists
    #[must_use]
    pub fn contains(&self, agent: Entity) -> bool {
        self.world.contains(agent)
    }

    /// Number of agents
    #[must_use]
    pub fn agent_count(&self) -> u32 {
        self.world.len()
    }

    /// All agents
    #[must_use]
    pub fn agents(&self) -> Vec<Entity> {
        self.world
            .query::<&Body>()
            .iter()
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Body state of an agent
    #[must_use]
    pub fn body(&self, agent: Entity) -> Option<Body> {
        self.world.get::<&Body>(agent).ok().map(|b| *b)
    }

    /// Borrow an agent's controller
    pub fn controller(&self, agent: Entity) -> Option<hecs::Ref<'_, AgentController>> {
        self.world.get::<&AgentController>(agent).ok()
    }

    /// Send an agent toward `destination`. Returns false for unknown agents.
    pub fn set_destination(&mut self, agent: Entity, destination: Vec2) -> bool {
        let Ok((body, controller)) = self
            .world
            .query_one_mut::<(&Body, &mut AgentController)>(agent)
        else {
            return false;
        };
        controller.set_destination(destination, body.position);
        true
    }

    /// Stop an agent. Returns false for unknown agents.
    pub fn cancel_destination(&mut self, agent: Entity) -> bool {
        match self.world.get::<&mut AgentController>(agent) {
            Ok(mut controller) => {
                controller.cancel_destination();
                true
            }
            Err(_) => false,
        }
    }

    /// Agent whose body covers `point`, nearest center first
    #[must_use]
    pub fn agent_at(&self, point: Vec2) -> Option<Entity> {
        self.world
            .query::<&Body>()
            .iter()
            .filter(|(_, body)| body.contains(point))
            .min_by(|(_, a), (_, b)| {
                a.position
                    .distance_squared(point)
                    .total_cmp(&b.position.distance_squared(point))
            })
            .map(|(entity, _)| entity)
    }

    // ------------------------------------------------------------------------
    // Environment
    // ------------------------------------------------------------------------

    /// Whether `point` is on a ground shape
    #[must_use]
    pub fn is_ground(&self, point: Vec2) -> bool {
        self.obstacles
            .masked(LayerMask::GROUND)
            .is_blocked(point, 0.0)
    }

    /// Obstacle shapes
    #[must_use]
    pub fn obstacles(&self) -> &ObstacleField {
        &self.obstacles
    }

    /// Mutable obstacle shapes. Call [`NavWorld::rebuild_grid`] afterwards
    /// for the change to reach path planning.
    pub fn obstacles_mut(&mut self) -> &mut ObstacleField {
        &mut self.obstacles
    }

    /// Rebake the grid from the current obstacles.
    ///
    /// Agents pick the new grid up at their next search.
    pub fn rebuild_grid(&mut self) {
        self.grid.rebuild(
            &self.config.grid,
            &self.obstacles.masked(self.config.grid.obstacle_mask),
        );
    }

    /// Grid shared by every agent
    #[must_use]
    pub fn grid(&self) -> &SharedGrid {
        &self.grid
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Events from the previous frame
    #[must_use]
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Take the events from the previous frame
    pub fn drain_events(&mut self) -> impl Iterator<Item = AgentEvent> + '_ {
        self.events.drain()
    }

    /// Events recorded since the last frame, not yet readable
    #[must_use]
    pub fn pending_event_count(&self) -> usize {
        self.events.pending_count()
    }

    /// Events lost because nothing swapped the queue in time
    #[must_use]
    pub fn dropped_event_count(&self) -> u64 {
        self.events.dropped_count()
    }

    /// Fixed-step clock
    #[must_use]
    pub fn time(&self) -> &FixedTimestep {
        &self.time
    }

    // ------------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------------

    /// Advance by one rendered frame. Returns the number of fixed steps run.
    pub fn frame(&mut self, frame_dt: f32) -> u32 {
        self.events.swap();
        let steps = self.time.advance(frame_dt);
        let dt = self.time.step();
        for _ in 0..steps {
            self.step(dt);
        }
        steps
    }

    /// Run one fixed step of `dt` seconds.
    ///
    /// Events recorded here become readable after the next [`NavWorld::frame`].
    /// Without frames the queue keeps only the newest events.
    pub fn step(&mut self, dt: f32) {
        self.steer_agents(dt);
        self.move_bodies(dt);
        let touching = self.separate_agents();
        self.report_contacts(touching);
        self.collect_events();
    }

    fn steer_agents(&mut self, dt: f32) {
        let obstacles = &self.obstacles;
        for (_, (body, controller)) in self
            .world
            .query_mut::<(&mut Body, &mut AgentController)>()
        {
            let view = obstacles.masked(controller.config().obstacle_mask);
            let agent = AgentBody {
                position: body.position,
                velocity: body.velocity,
            };
            body.velocity = controller.tick(dt, agent, &view);
        }
    }

    fn move_bodies(&mut self, dt: f32) {
        let solid = self.obstacles.masked(LayerMask::SOLID);
        for (_, body) in self.world.query_mut::<&mut Body>() {
            depenetrate(body, &self.obstacles);
            move_and_slide(body, dt, &solid);
        }
    }

    /// Push overlapping agents apart and list every touching pair.
    fn separate_agents(&mut self) -> Vec<(Entity, Touching, Contact)> {
        let mut bodies: Vec<(Entity, Body)> = self
            .world
            .query::<&Body>()
            .iter()
            .map(|(entity, body)| (entity, *body))
            .collect();
        bodies.sort_by_key(|(entity, _)| entity.to_bits());

        let mut touching = Vec::new();
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let (a, body_a) = bodies[i];
                let (b, body_b) = bodies[j];
                let delta = body_a.position - body_b.position;
                let reach = body_a.radius + body_b.radius;
                let distance = delta.length();
                if distance >= reach + CONTACT_SLOP {
                    continue;
                }

                let normal = delta.try_normalize().unwrap_or(Vec2::X);
                let overlap = reach - distance;
                if overlap > 0.0 {
                    bodies[i].1.position += normal * (overlap * 0.5);
                    bodies[j].1.position -= normal * (overlap * 0.5);
                }

                let closing = (body_b.velocity - body_a.velocity).dot(normal).max(0.0);
                touching.push((
                    a,
                    Touching::Agent(b),
                    Contact {
                        normal,
                        relative_speed: closing,
                    },
                ));
                touching.push((
                    b,
                    Touching::Agent(a),
                    Contact {
                        normal: -normal,
                        relative_speed: closing,
                    },
                ));
            }
        }

        for (entity, separated) in &bodies {
            if let Ok(mut body) = self.world.get::<&mut Body>(*entity) {
                body.position = separated.position;
            }
        }

        for (entity, body) in &bodies {
            for (id, obstacle) in
                self.obstacles
                    .overlapping(body.position, body.radius + CONTACT_SLOP, LayerMask::SOLID)
            {
                let normal = obstacle
                    .penetration(body.position, body.radius + CONTACT_SLOP)
                    .map_or(Vec2::ZERO, |(normal, _)| normal);
                touching.push((
                    *entity,
                    Touching::Obstacle(id),
                    Contact {
                        normal,
                        relative_speed: (-body.velocity.dot(normal)).max(0.0),
                    },
                ));
            }
        }

        touching
    }

    /// Forward contacts that began this step.
    fn report_contacts(&mut self, touching: Vec<(Entity, Touching, Contact)>) {
        let mut current = FxHashSet::default();
        for (entity, other, contact) in touching {
            let key = (entity, other);
            if !self.contacts.contains(&key) {
                log::trace!("{entity:?} touched {other:?}");
                if let Ok(mut controller) = self.world.get::<&mut AgentController>(entity) {
                    controller.on_collision(contact);
                }
            }
            current.insert(key);
        }
        self.contacts = current;
    }

    fn collect_events(&mut self) {
        for (agent, controller) in self.world.query_mut::<&mut AgentController>() {
            for event in controller.drain_events() {
                self.events.push(AgentEvent { agent, event });
            }
        }
    }
}

impl std::fmt::Debug for NavWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavWorld")
            .field("agents", &self.world.len())
            .field("obstacles", &self.obstacles.len())
            .field("steps", &self.time.total_steps())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Body Motion
// ============================================================================

/// Push a body out of every solid shape it overlaps.
fn depenetrate(body: &mut Body, obstacles: &ObstacleField) {
    let pushes: Vec<Vec2> = obstacles
        .overlapping(body.position, body.radius, LayerMask::SOLID)
        .filter_map(|(_, o)| o.penetration(body.position, body.radius))
        .map(|(normal, depth)| normal * (depth + SKIN))
        .collect();

    for push in pushes {
        body.position += push;
        let into = body.velocity.dot(push.normalize_or_zero());
        if into < 0.0 {
            body.velocity -= push.normalize_or_zero() * into;
        }
    }
}

/// Move a body by `velocity * dt`, sliding along whatever it hits.
fn move_and_slide(body: &mut Body, dt: f32, occupancy: &impl OccupancyQuery) {
    let mut remaining = body.velocity * dt;

    for _ in 0..MAX_SLIDES {
        let distance = remaining.length();
        if distance <= 1e-6 {
            break;
        }
        let direction = remaining / distance;

        let Some(hit) = occupancy.sweep(body.position, body.radius, direction, distance) else {
            body.position += remaining;
            break;
        };

        let travel = (hit.distance - SKIN).max(0.0);
        body.position += direction * travel;

        let leftover = remaining - direction * travel;
        remaining = leftover - hit.normal * leftover.dot(hit.normal).min(0.0);
        body.velocity -= hit.normal * body.velocity.dot(hit.normal).min(0.0);
    }
}
