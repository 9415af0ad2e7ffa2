use bevy::math::Vec2;
use serde::{Deserialize, Serialize};

use super::components::Movable;
use super::config::MoveConfig;

mod world;

pub use world::CircleWorld;

/// Static square obstacle, one per blocked grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub position: Vec2,
    pub half_extent: f32,
}

/// A pair of dynamic bodies whose shapes touched during the last step; `a < b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Contact {
    pub a: usize,
    pub b: usize,
}

/// Restartable position in the contact list. `ContactCursor::default()` starts over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContactCursor(pub usize);

/// Nearest body hit by a segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub body: usize,
    /// Position along the segment in `[0, 1]`.
    pub fraction: f32,
    pub point: Vec2,
}

/// Solver tuning taken from [`MoveConfig`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverSettings {
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub linear_slop: f32,
    pub baumgarte: f32,
    pub max_linear_correction: f32,
    pub linear_sleep_tolerance: f32,
    pub time_to_sleep: f32,
    /// Zero derives the cell size from the largest proxy.
    pub broadphase_cell_size: f32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self::from(&MoveConfig::default())
    }
}

impl From<&MoveConfig> for SolverSettings {
    fn from(config: &MoveConfig) -> Self {
        Self {
            velocity_iterations: config.velocity_iterations,
            position_iterations: config.position_iterations,
            linear_slop: config.linear_slop,
            baumgarte: config.baumgarte,
            max_linear_correction: config.max_linear_correction,
            linear_sleep_tolerance: config.linear_sleep_tolerance,
            time_to_sleep: config.time_to_sleep,
            broadphase_cell_size: config.broadphase_cell_size,
        }
    }
}

/// Rigid-body simulation of circular bodies among static square obstacles.
///
/// Bodies are index-aligned with the `movables` slice passed to
/// [`step`](RigidBodyWorld::step): a body is created the first time its index
/// is stepped and is never removed, so the slice may only grow.
pub trait RigidBodyWorld {
    /// Advance every body by `dt`.
    ///
    /// Consumes each movable's `force` and `WAKE` flag; writes back position,
    /// velocity, `AWAKE`, `HAS_CONTACT` and `HAS_TOUCHING_CONTACT`.
    fn step(&mut self, dt: f32, movables: &mut [Movable], obstacles: &[Obstacle]);

    /// Next touching body pair of the last step, advancing `cursor`.
    fn next_contact(&self, cursor: &mut ContactCursor) -> Option<Contact>;

    /// Bodies whose bounds overlap the box `min`-`max`, ascending. Clears `out`.
    fn query_aabb(&self, min: Vec2, max: Vec2, out: &mut Vec<usize>);

    /// Nearest body crossed by the segment `from`-`to`.
    fn raycast(&self, from: Vec2, to: Vec2) -> Option<RayHit>;

    /// Number of bodies created so far.
    fn body_count(&self) -> usize;

    /// Every touching pair of the last step.
    fn contacts(&self) -> Contacts<'_, Self>
    where
        Self: Sized,
    {
        Contacts { world: self, cursor: ContactCursor::default() }
    }
}

/// Iterator adapter over [`RigidBodyWorld::next_contact`].
pub struct Contacts<'a, W: RigidBodyWorld> {
    world: &'a W,
    cursor: ContactCursor,
}

impl<W: RigidBodyWorld> Iterator for Contacts<'_, W> {
    type Item = Contact;

    fn next(&mut self) -> Option<Contact> {
        self.world.next_contact(&mut self.cursor)
    }
}
