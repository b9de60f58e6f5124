//! Obstacle occupancy queries
//!
//! The navigation core never talks to a physics engine directly. Everything it
//! needs to know about the world goes through [`OccupancyQuery`]: "is this disc
//! blocked?" and "where does this swept disc first hit something?".
//!
//! [`ObstacleField`] is a small deterministic implementation over circles and
//! axis-aligned boxes, each tagged with a [`Layer`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Sweeps shorter than this are treated as "already there".
const MIN_SWEEP_DISTANCE: f32 = 0.001;

// ============================================================================
// Layers
// ============================================================================

/// Collision layer of a static shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    /// Walkable floor; only used for picking destinations
    Ground,
    /// Level walls
    Wall,
    /// Hard blocks placed inside the level
    Hard,
    /// Agent bodies
    Cell,
}

impl Layer {
    /// Bit used for this layer in a [`LayerMask`].
    #[must_use]
    pub const fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Set of layers a query takes into account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Matches nothing
    pub const NONE: Self = Self(0);
    /// Matches every layer
    pub const ALL: Self = Self(u32::MAX);
    /// Ground only
    pub const GROUND: Self = Self(Layer::Ground.bit());
    /// Walls and hard blocks; cells are deliberately left out
    pub const STATIC: Self = Self(Layer::Wall.bit() | Layer::Hard.bit());
    /// Everything an agent body physically collides with
    pub const SOLID: Self = Self(Layer::Wall.bit() | Layer::Hard.bit() | Layer::Cell.bit());

    /// Add a layer to the mask
    #[must_use]
    pub const fn with(self, layer: Layer) -> Self {
        Self(self.0 | layer.bit())
    }

    /// Remove a layer from the mask
    #[must_use]
    pub const fn without(self, layer: Layer) -> Self {
        Self(self.0 & !layer.bit())
    }

    /// Check whether the mask includes a layer
    #[must_use]
    #[inline]
    pub const fn contains(self, layer: Layer) -> bool {
        self.0 & layer.bit() != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::STATIC
    }
}

// ============================================================================
// Query trait
// ============================================================================

/// First contact of a swept disc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    /// Contact point on the obstacle surface
    pub point: Vec2,
    /// Surface normal at the contact, pointing away from the obstacle
    pub normal: Vec2,
    /// Distance travelled by the disc center before contact
    pub distance: f32,
}

/// Obstacle occupancy as seen by the navigation core.
///
/// Implementations must be deterministic for the duration of one simulation
/// step.
pub trait OccupancyQuery {
    /// Whether a disc of `radius` centered at `point` overlaps any obstacle.
    fn is_blocked(&self, point: Vec2, radius: f32) -> bool;

    /// Sweep a disc from `from` along `direction` for at most `max_distance`.
    ///
    /// A disc that already overlaps an obstacle reports a hit at distance 0
    /// with the normal opposing `direction`.
    fn sweep(&self, from: Vec2, radius: f32, direction: Vec2, max_distance: f32)
    -> Option<SweepHit>;

    /// Whether a disc of `radius` can travel in a straight line from `from` to `to`.
    fn has_line_of_sight(&self, from: Vec2, to: Vec2, radius: f32) -> bool {
        let delta = to - from;
        let distance = delta.length();
        if distance <= MIN_SWEEP_DISTANCE {
            return true;
        }
        self.sweep(from, radius, delta / distance, distance).is_none()
    }
}

impl<T: OccupancyQuery + ?Sized> OccupancyQuery for &T {
    fn is_blocked(&self, point: Vec2, radius: f32) -> bool {
        (**self).is_blocked(point, radius)
    }

    fn sweep(
        &self,
        from: Vec2,
        radius: f32,
        direction: Vec2,
        max_distance: f32,
    ) -> Option<SweepHit> {
        (**self).sweep(from, radius, direction, max_distance)
    }
}

// ============================================================================
// Shapes
// ============================================================================

/// Geometry of a static shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Disc
    Circle {
        /// Center in world space
        center: Vec2,
        /// Radius
        radius: f32,
    },
    /// Axis-aligned box
    Rect {
        /// Bottom-left corner
        min: Vec2,
        /// Top-right corner
        max: Vec2,
    },
}

/// A static shape on a collision layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Geometry
    pub shape: Shape,
    /// Collision layer
    pub layer: Layer,
}

impl Obstacle {
    /// Create a circular obstacle
    #[must_use]
    pub fn circle(center: Vec2, radius: f32, layer: Layer) -> Self {
        Self {
            shape: Shape::Circle {
                center,
                radius: radius.abs(),
            },
            layer,
        }
    }

    /// Create a box from two opposite corners
    #[must_use]
    pub fn rect(a: Vec2, b: Vec2, layer: Layer) -> Self {
        Self {
            shape: Shape::Rect {
                min: a.min(b),
                max: a.max(b),
            },
            layer,
        }
    }

    /// Create a box from its center and half extents
    #[must_use]
    pub fn rect_centered(center: Vec2, half_extents: Vec2, layer: Layer) -> Self {
        let half = half_extents.abs();
        Self::rect(center - half, center + half, layer)
    }

    /// Whether a disc overlaps this shape. Touching does not count.
    #[must_use]
    pub fn overlaps_disc(&self, point: Vec2, radius: f32) -> bool {
        match self.shape {
            Shape::Circle { center, radius: r } => {
                let reach = r + radius;
                point.distance_squared(center) < reach * reach
            }
            Shape::Rect { min, max } => {
                if point.cmpge(min).all() && point.cmple(max).all() {
                    return true;
                }
                point.distance_squared(point.clamp(min, max)) < radius * radius
            }
        }
    }

    /// How far a disc must move, and in which direction, to stop overlapping.
    ///
    /// Returns `(normal, depth)` or `None` when there is no overlap.
    #[must_use]
    pub fn penetration(&self, point: Vec2, radius: f32) -> Option<(Vec2, f32)> {
        match self.shape {
            Shape::Circle { center, radius: r } => {
                let delta = point - center;
                let distance = delta.length();
                let depth = r + radius - distance;
                (depth > 0.0).then(|| (delta.try_normalize().unwrap_or(Vec2::Y), depth))
            }
            Shape::Rect { min, max } => {
                let inside = point.cmpge(min).all() && point.cmple(max).all();
                if inside {
                    // Exit through the nearest face
                    let faces = [
                        (point.x - min.x, Vec2::NEG_X),
                        (max.x - point.x, Vec2::X),
                        (point.y - min.y, Vec2::NEG_Y),
                        (max.y - point.y, Vec2::Y),
                    ];
                    let (gap, normal) = faces
                        .into_iter()
                        .fold(faces[0], |best, face| if face.0 < best.0 { face } else { best });
                    return Some((normal, gap + radius));
                }
                let delta = point - point.clamp(min, max);
                let distance = delta.length();
                (distance < radius).then(|| (delta / distance, radius - distance))
            }
        }
    }

    /// Sweep a disc against this shape. `direction` must be normalized.
    #[must_use]
    pub fn sweep_disc(
        &self,
        from: Vec2,
        radius: f32,
        direction: Vec2,
        max_distance: f32,
    ) -> Option<SweepHit> {
        if self.overlaps_disc(from, radius) {
            return Some(SweepHit {
                point: from,
                normal: -direction,
                distance: 0.0,
            });
        }

        let (distance, normal) = match self.shape {
            Shape::Circle { center, radius: r } => {
                let t = ray_circle(from, direction, center, r + radius)?;
                let at = from + direction * t;
                (t, (at - center).try_normalize().unwrap_or(-direction))
            }
            Shape::Rect { min, max } => ray_rounded_rect(from, direction, min, max, radius)?,
        };

        if distance > max_distance {
            return None;
        }

        let center_at_contact = from + direction * distance;
        Some(SweepHit {
            point: center_at_contact - normal * radius,
            normal,
            distance,
        })
    }
}

/// Entry distance of a ray into a circle, if any.
fn ray_circle(origin: Vec2, direction: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let m = origin - center;
    let b = m.dot(direction);
    let c = m.length_squared() - radius * radius;
    if c > 0.0 && b > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    Some((-b - discriminant.sqrt()).max(0.0))
}

/// Slab test. Returns the entry distance and the normal of the entry face.
fn ray_aabb(origin: Vec2, direction: Vec2, min: Vec2, max: Vec2) -> Option<(f32, Vec2)> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut normal = Vec2::ZERO;

    for axis in 0..2 {
        let o = origin[axis];
        let d = direction[axis];

        if d.abs() < f32::EPSILON {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t0 = (min[axis] - o) * inv;
        let mut t1 = (max[axis] - o) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }

        if t0 > t_enter {
            t_enter = t0;
            normal = Vec2::ZERO;
            normal[axis] = -d.signum();
        }
        t_exit = t_exit.min(t1);

        if t_enter > t_exit {
            return None;
        }
    }

    if t_exit < 0.0 {
        return None;
    }
    Some((t_enter.max(0.0), normal))
}

/// Ray against a box inflated by `radius` with rounded corners.
fn ray_rounded_rect(
    origin: Vec2,
    direction: Vec2,
    min: Vec2,
    max: Vec2,
    radius: f32,
) -> Option<(f32, Vec2)> {
    let wide = ray_aabb(
        origin,
        direction,
        min - Vec2::new(radius, 0.0),
        max + Vec2::new(radius, 0.0),
    );
    let tall = ray_aabb(
        origin,
        direction,
        min - Vec2::new(0.0, radius),
        max + Vec2::new(0.0, radius),
    );

    let corners = [min, Vec2::new(max.x, min.y), max, Vec2::new(min.x, max.y)];
    let rounded = corners.into_iter().filter_map(|corner| {
        let t = ray_circle(origin, direction, corner, radius)?;
        let at = origin + direction * t;
        Some((t, (at - corner).try_normalize().unwrap_or(-direction)))
    });

    wide.into_iter()
        .chain(tall)
        .chain(rounded)
        .fold(None, |best: Option<(f32, Vec2)>, hit| match best {
            Some(b) if b.0 <= hit.0 => Some(b),
            _ => Some(hit),
        })
}

// ============================================================================
// Obstacle field
// ============================================================================

/// Stable identifier of a shape inside an [`ObstacleField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObstacleId(pub u32);

/// Static collision shapes, grouped by layer.
///
/// Queries through the [`OccupancyQuery`] impl consider every layer; use
/// [`ObstacleField::masked`] to restrict them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObstacleField {
    obstacles: Vec<(ObstacleId, Obstacle)>,
    next_id: u32,
}

impl ObstacleField {
    /// Create an empty field
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a shape and return its id
    pub fn add(&mut self, obstacle: Obstacle) -> ObstacleId {
        let id = ObstacleId(self.next_id);
        self.next_id += 1;
        self.obstacles.push((id, obstacle));
        id
    }

    /// Remove a shape by id
    pub fn remove(&mut self, id: ObstacleId) -> Option<Obstacle> {
        let index = self.obstacles.iter().position(|(i, _)| *i == id)?;
        Some(self.obstacles.remove(index).1)
    }

    /// Look up a shape by id
    #[must_use]
    pub fn get(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.obstacles.iter().find(|(i, _)| *i == id).map(|(_, o)| o)
    }

    /// Iterate over all shapes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (ObstacleId, &Obstacle)> {
        self.obstacles.iter().map(|(id, o)| (*id, o))
    }

    /// Number of shapes
    #[must_use]
    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    /// Check if the field has no shapes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    /// Remove every shape
    pub fn clear(&mut self) {
        self.obstacles.clear();
    }

    /// View of this field restricted to the layers in `mask`
    #[must_use]
    pub fn masked(&self, mask: LayerMask) -> MaskedField<'_> {
        MaskedField { field: self, mask }
    }

    /// Shapes on `mask` overlapping a disc
    pub fn overlapping(
        &self,
        point: Vec2,
        radius: f32,
        mask: LayerMask,
    ) -> impl Iterator<Item = (ObstacleId, &Obstacle)> {
        self.iter()
            .filter(move |(_, o)| mask.contains(o.layer) && o.overlaps_disc(point, radius))
    }

    fn sweep_masked(
        &self,
        from: Vec2,
        radius: f32,
        direction: Vec2,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<SweepHit> {
        let direction = direction.try_normalize()?;
        self.obstacles
            .iter()
            .filter(|(_, o)| mask.contains(o.layer))
            .filter_map(|(_, o)| o.sweep_disc(from, radius, direction, max_distance))
            .fold(None, |best: Option<SweepHit>, hit| match best {
                Some(b) if b.distance <= hit.distance => Some(b),
                _ => Some(hit),
            })
    }
}

impl OccupancyQuery for ObstacleField {
    fn is_blocked(&self, point: Vec2, radius: f32) -> bool {
        self.overlapping(point, radius, LayerMask::ALL).next().is_some()
    }

    fn sweep(
        &self,
        from: Vec2,
        radius: f32,
        direction: Vec2,
        max_distance: f32,
    ) -> Option<SweepHit> {
        self.sweep_masked(from, radius, direction, max_distance, LayerMask::ALL)
    }
}

/// An [`ObstacleField`] seen through a [`LayerMask`].
#[derive(Debug, Clone, Copy)]
pub struct MaskedField<'a> {
    field: &'a ObstacleField,
    mask: LayerMask,
}

impl OccupancyQuery for MaskedField<'_> {
    fn is_blocked(&self, point: Vec2, radius: f32) -> bool {
        self.field.overlapping(point, radius, self.mask).next().is_some()
    }

    fn sweep(
        &self,
        from: Vec2,
        radius: f32,
        direction: Vec2,
        max_distance: f32,
    ) -> Option<SweepHit> {
        self.field
            .sweep_masked(from, radius, direction, max_distance, self.mask)
    }
}
