//! Tap-to-move command layer

use glam::Vec2;
use hecs::Entity;

use super::NavWorld;

/// What a tap did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapOutcome {
    /// An agent was tapped and is now selected
    Selected(Entity),
    /// The selected agent was sent to the tapped ground point
    MoveIssued {
        /// Agent that received the command
        agent: Entity,
        /// Tapped point
        destination: Vec2,
    },
    /// Nothing happened
    Ignored,
}

/// Turns taps into selection and move commands.
///
/// Tapping an agent selects it. Tapping ground while an agent is selected
/// sends it there. Anything else is ignored.
#[derive(Debug, Clone, Default)]
pub struct TapCommander {
    selected: Option<Entity>,
}

impl TapCommander {
    /// Create a commander with nothing selected
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a tap at a world point
    pub fn tap(&mut self, world: &mut NavWorld, point: Vec2) -> TapOutcome {
        if let Some(agent) = world.agent_at(point) {
            log::debug!("Selected {agent:?}");
            self.selected = Some(agent);
            return TapOutcome::Selected(agent);
        }

        let Some(agent) = self.selected else {
            return TapOutcome::Ignored;
        };

        if !world.contains(agent) {
            self.selected = None;
            return TapOutcome::Ignored;
        }

        if !world.is_ground(point) || !world.set_destination(agent, point) {
            return TapOutcome::Ignored;
        }

        log::debug!("Sent {agent:?} to {point}");
        TapOutcome::MoveIssued {
            agent,
            destination: point,
        }
    }

    /// Currently selected agent
    #[must_use]
    pub fn selected(&self) -> Option<Entity> {
        self.selected
    }

    /// Drop the selection
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }
}
