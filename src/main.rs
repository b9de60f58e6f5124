//! Headless demo: a walled arena, a few cells and scripted taps

use std::process::ExitCode;

use cellnav::prelude::*;

/// Rendered frame length the demo pretends to run at
const FRAME_DT: f32 = 1.0 / 60.0;

/// Frames to simulate
const FRAMES: u32 = 900;

/// Ground over the whole world, a border, a dividing wall with a gap near
/// the top and a few boulders.
fn build_arena(config: &GridConfig) -> ObstacleField {
    let half = config.world_size * 0.5;
    let min = config.world_center - half;
    let max = config.world_center + half;
    let thickness = 0.5;

    let mut field = ObstacleField::new();
    field.add(Obstacle::rect(min, max, Layer::Ground));

    // Border
    field.add(Obstacle::rect(min, Vec2::new(max.x, min.y + thickness), Layer::Wall));
    field.add(Obstacle::rect(Vec2::new(min.x, max.y - thickness), max, Layer::Wall));
    field.add(Obstacle::rect(min, Vec2::new(min.x + thickness, max.y), Layer::Wall));
    field.add(Obstacle::rect(Vec2::new(max.x - thickness, min.y), max, Layer::Wall));

    // Divider, open for the top quarter
    let center = config.world_center;
    field.add(Obstacle::rect(
        Vec2::new(center.x - thickness * 0.5, min.y),
        Vec2::new(center.x + thickness * 0.5, max.y - half.y * 0.5),
        Layer::Wall,
    ));

    for offset in [Vec2::new(-8.0, 2.0), Vec2::new(-6.0, -5.0), Vec2::new(7.0, -3.0)] {
        field.add(Obstacle::circle(center + offset, 1.0, Layer::Hard));
    }

    field
}

fn load_config() -> Result<NavConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading config from {path}");
            NavConfig::load_ron(path)
        }
        None => Ok(NavConfig::default()),
    }
}

fn log_event(event: &AgentEvent) {
    match &event.event {
        NavEvent::Arrived { position } => log::info!("{:?} arrived at {position}", event.agent),
        NavEvent::PathFailed { error } => log::warn!("{:?} has no path: {error}", event.agent),
        NavEvent::Disabled { reason } => log::error!("{:?} disabled: {reason}", event.agent),
        other => log::debug!("{:?}: {other:?}", event.agent),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let arena = build_arena(&config.grid);
    let center = config.grid.world_center;
    let mut world = match NavWorld::new(config, arena) {
        Ok(world) => world,
        Err(e) => {
            log::error!("Failed to create world: {e}");
            return ExitCode::FAILURE;
        }
    };

    let starts = [
        center + Vec2::new(-15.0, -8.0),
        center + Vec2::new(-15.0, -4.0),
        center + Vec2::new(-12.0, 7.0),
    ];
    let goals = [
        center + Vec2::new(15.0, -8.0),
        center + Vec2::new(14.0, 6.0),
        center + Vec2::new(-4.0, -9.0),
    ];

    let agents: Vec<_> = starts.iter().map(|&p| world.spawn_agent(p)).collect();

    let mut commander = TapCommander::new();
    for (&start, &goal) in starts.iter().zip(&goals) {
        commander.tap(&mut world, start);
        match commander.tap(&mut world, goal) {
            TapOutcome::MoveIssued { agent, destination } => {
                log::info!("Sent {agent:?} to {destination}");
            }
            outcome => log::warn!("Tap at {goal} did nothing: {outcome:?}"),
        }
    }

    for _ in 0..FRAMES {
        world.frame(FRAME_DT);
        for event in world.events().iter() {
            log_event(event);
        }
    }

    for agent in agents {
        let (Some(body), Some(controller)) = (world.body(agent), world.controller(agent)) else {
            continue;
        };
        log::info!(
            "{agent:?} finished at {} ({:?}, {} searches)",
            body.position,
            controller.phase(),
            controller.search_count()
        );
    }

    log::info!("Ran {} fixed steps", world.time().total_steps());
    ExitCode::SUCCESS
}
