//! Steering helpers for path following
//!
//! Small building blocks the movement controller combines each tick: seek a
//! point, slow down on the final approach, and slide along walls that the
//! forward probe runs into.

use glam::Vec2;

use crate::nav::OccupancyQuery;

/// Steering vectors shorter than this (squared) mean "hold position".
pub const MIN_STEER_SQUARED: f32 = 0.0001;

/// Seek - unnormalized vector from `position` to `target`
#[must_use]
#[inline]
pub fn seek(position: Vec2, target: Vec2) -> Vec2 {
    target - position
}

/// Arrive - full speed until `slow_radius`, then linearly slower
#[derive(Debug, Clone, Copy)]
pub struct Arrive {
    /// Maximum speed
    pub max_speed: f32,
    /// Slowing distance; zero disables slowing
    pub slow_radius: f32,
}

impl Arrive {
    /// Create a new arrive behavior
    #[must_use]
    pub fn new(max_speed: f32, slow_radius: f32) -> Self {
        Self {
            max_speed,
            slow_radius,
        }
    }

    /// Speed to use at `distance` from the target
    #[must_use]
    pub fn speed_at(&self, distance: f32) -> f32 {
        if self.slow_radius <= 0.0 || distance >= self.slow_radius {
            self.max_speed
        } else {
            self.max_speed * distance / self.slow_radius
        }
    }
}

/// Wall slide - short-horizon avoidance by sliding along the surface ahead
#[derive(Debug, Clone, Copy)]
pub struct WallSlide {
    /// Probe radius
    pub radius: f32,
    /// Probe length
    pub look_ahead: f32,
    /// Weight of the slide vector
    pub strength: f32,
}

impl WallSlide {
    /// Probe along `desired` and bend it around whatever is hit.
    ///
    /// Without a hit `desired` comes back unchanged. With a hit the result is
    /// the normalized desired direction plus the surface tangent that agrees
    /// with it, scaled by `strength`. The result is not normalized.
    #[must_use]
    pub fn apply(&self, position: Vec2, desired: Vec2, occupancy: &impl OccupancyQuery) -> Vec2 {
        if desired.length_squared() < MIN_STEER_SQUARED {
            return desired;
        }

        let direction = desired.normalize();
        let Some(hit) = occupancy.sweep(position, self.radius, direction, self.look_ahead) else {
            return desired;
        };

        let mut slide = hit.normal.perp();
        if slide.dot(direction) < 0.0 {
            slide = -slide;
        }

        direction + slide * self.strength
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::{Layer, Obstacle, ObstacleField};

    fn wall_ahead() -> ObstacleField {
        let mut field = ObstacleField::new();
        field.add(Obstacle::rect(
            Vec2::new(1.0, -5.0),
            Vec2::new(2.0, 5.0),
            Layer::Wall,
        ));
        field
    }

    #[test]
    fn test_seek() {
        let v = seek(Vec2::ZERO, Vec2::new(3.0, 4.0));
        assert!((v.length() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_arrive_slowing() {
        let arrive = Arrive::new(4.0, 1.0);
        assert_eq!(arrive.speed_at(3.0), 4.0);
        assert!((arrive.speed_at(0.5) - 2.0).abs() < 1e-5);
        assert_eq!(arrive.speed_at(0.0), 0.0);

        let disabled = Arrive::new(4.0, 0.0);
        assert_eq!(disabled.speed_at(0.01), 4.0);
    }

    #[test]
    fn test_wall_slide_without_hit_is_identity() {
        let slide = WallSlide {
            radius: 0.25,
            look_ahead: 0.6,
            strength: 1.0,
        };
        let desired = Vec2::new(2.0, 0.0);
        assert_eq!(slide.apply(Vec2::ZERO, desired, &wall_ahead()), desired);
    }

    #[test]
    fn test_wall_slide_follows_desired_side() {
        let slide = WallSlide {
            radius: 0.25,
            look_ahead: 1.0,
            strength: 1.0,
        };
        let desired = Vec2::new(1.0, 0.2);
        let direction = desired.normalize();

        let steered = slide.apply(Vec2::ZERO, desired, &wall_ahead());

        // Tangent along the wall, on the side the agent was already leaning
        assert!((steered.x - direction.x).abs() < 1e-5);
        assert!((steered.y - (direction.y + 1.0)).abs() < 1e-5);
    }

    #[test]
    fn test_wall_slide_strength_scales_tangent() {
        let slide = WallSlide {
            radius: 0.25,
            look_ahead: 1.0,
            strength: 0.5,
        };
        let steered = slide.apply(Vec2::ZERO, Vec2::new(1.0, -0.1), &wall_ahead());
        let direction = Vec2::new(1.0, -0.1).normalize();
        assert!((steered - (direction + Vec2::new(0.0, -0.5))).length() < 1e-5);
    }
}
