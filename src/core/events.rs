//! Navigation events
//!
//! Controllers never call back into their owners. Instead they record what
//! happened as [`NavEvent`]s, which the owner drains and forwards into a
//! double-buffered [`EventQueue`] for UI, audio or debugging consumers.
//!
//! # Example
//!
//! ```ignore
//! // Frame N: the world pushes events while stepping agents
//! queue.push(AgentEvent { agent, event: NavEvent::Arrived { position } });
//!
//! // Frame N+1: consumers read them after the swap
//! queue.swap();
//! for e in queue.iter() {
//!     if let NavEvent::Arrived { .. } = e.event {
//!         log::info!("{:?} arrived", e.agent);
//!     }
//! }
//! ```

use std::collections::VecDeque;

use glam::Vec2;
use hecs::Entity;

use crate::nav::PathError;

// ============================================================================
// Event Types
// ============================================================================

/// Something that happened to one agent's navigation.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum NavEvent {
    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------
    /// A new destination was accepted.
    DestinationSet {
        /// Requested destination
        destination: Vec2,
    },

    /// The destination was cancelled before arrival.
    Cancelled,

    /// The agent reached its destination and stopped.
    Arrived {
        /// Where the agent stopped
        position: Vec2,
    },

    // -------------------------------------------------------------------------
    // Planning
    // -------------------------------------------------------------------------
    /// A search produced a path.
    PathFound {
        /// Number of waypoints
        waypoints: usize,
        /// Total step cost
        cost: u32,
    },

    /// A search failed. The destination stays active.
    PathFailed {
        /// Why the search failed
        error: PathError,
    },

    /// The path was dropped because the destination is in plain view.
    PathDiscarded,

    /// No progress was made for too long; a re-plan was forced.
    StallRecovered {
        /// Distance to the destination when the stall was detected
        distance: f32,
    },

    /// A collision armed the forced re-plan window.
    CollisionReported,

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------
    /// The controller was misconfigured and has disabled itself.
    Disabled {
        /// Human-readable reason
        reason: String,
    },
}

/// A [`NavEvent`] tagged with the agent it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentEvent {
    /// Agent entity
    pub agent: Entity,
    /// What happened
    pub event: NavEvent,
}

// ============================================================================
// Event Queue
// ============================================================================

/// Append to `buffer`, dropping the oldest entry once it holds `limit`.
///
/// Returns true when an entry was dropped.
pub(crate) fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, limit: usize) -> bool {
    let full = buffer.len() >= limit.max(1);
    if full {
        buffer.pop_front();
    }
    buffer.push_back(item);
    full
}

/// Double-buffered, bounded queue of agent events.
///
/// Events pushed during frame N are available for reading during frame N+1.
/// At most `limit` events wait for the next [`EventQueue::swap`]; beyond that
/// the oldest are dropped and counted.
#[derive(Debug)]
pub struct EventQueue {
    /// Events being written this frame
    pending: VecDeque<AgentEvent>,
    /// Events from previous frame, ready for processing
    processing: VecDeque<AgentEvent>,
    /// Cap on `pending`
    limit: usize,
    /// Events dropped since creation
    dropped: u64,
    /// Whether the overflow warning was logged since the last swap
    warned: bool,
}

impl EventQueue {
    /// Default cap on events waiting for a swap.
    pub const DEFAULT_LIMIT: usize = 1024;

    /// Create a queue with the default limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(Self::DEFAULT_LIMIT)
    }

    /// Create a queue holding at most `limit` unswapped events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            pending: VecDeque::with_capacity(limit.min(64)),
            processing: VecDeque::with_capacity(limit.min(64)),
            limit,
            dropped: 0,
            warned: false,
        }
    }

    /// Push an event to be processed next frame.
    pub fn push(&mut self, event: AgentEvent) {
        if push_bounded(&mut self.pending, event, self.limit) {
            self.dropped += 1;
            if !self.warned {
                log::warn!(
                    "Event queue holds {} unswapped events, dropping the oldest",
                    self.limit
                );
                self.warned = true;
            }
        }
    }

    /// Swap the pending and processing queues.
    ///
    /// Call this once per frame. Unread events from the previous frame are
    /// dropped.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.pending, &mut self.processing);
        self.pending.clear();
        self.warned = false;
    }

    /// Iterate over events from the previous frame.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &AgentEvent> {
        self.processing.iter()
    }

    /// Drain all events from the previous frame.
    #[inline]
    pub fn drain(&mut self) -> impl Iterator<Item = AgentEvent> + '_ {
        self.processing.drain(..)
    }

    /// Check if there are any events to process.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.processing.is_empty()
    }

    /// Number of events ready for processing.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.processing.len()
    }

    /// Number of events waiting for the next swap.
    #[must_use]
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of events dropped because the pending side was full.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Cap on events waiting for a swap.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
