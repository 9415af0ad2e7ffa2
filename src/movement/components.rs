/// Per-body data shared between the steering loop and the physics world.
///
/// `Movable` and `Unit` live in two index-aligned arrays: index `i` of one
/// always describes the same logical unit as index `i` of the other.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::pathfinding::PathGridFlowField;

// ============================================================================
// Physical State
// ============================================================================

/// Body state bits written by the physics step (and `WAKE`, written by steering).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveFlags(pub u8);

impl MoveFlags {
    pub const NONE: Self = Self(0);
    /// Body is simulated this tick.
    pub const AWAKE: Self = Self(1 << 0);
    /// Steering asks the world to resume simulating a sleeping body.
    pub const WAKE: Self = Self(1 << 1);
    /// Broadphase bounds overlap another proxy.
    pub const HAS_CONTACT: Self = Self(1 << 2);
    /// Shapes actually touch.
    pub const HAS_TOUCHING_CONTACT: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

impl std::ops::BitOr for MoveFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Physical state of one circular body.
///
/// `force` is an input: it is applied during the next physics step and then
/// considered consumed. `position` and `velocity` are authoritative only after
/// a step has written them back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Movable {
    pub radius: f32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub force: Vec2,
    pub flags: MoveFlags,
}

impl Movable {
    pub fn new(radius: f32, position: Vec2) -> Self {
        Self {
            radius,
            position,
            ..Default::default()
        }
    }
}

// ============================================================================
// Steering State
// ============================================================================

/// Explicit form of a unit's movement state.
///
/// `Idle` has no target. `Seeking` travels at full desired speed. `Arriving`
/// is inside its stopping distance, holding at a crowded destination, or has
/// arrived; the caller clears `target` to return the unit to `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitState {
    #[default]
    Idle,
    Seeking,
    Arriving,
}

/// Steering parameters and per-tick steering scratch of one unit.
#[derive(Clone, Debug)]
pub struct Unit {
    pub speed: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    pub rotation_speed: f32,
    /// Facing angle in radians, `(-PI, PI]`.
    pub facing: f32,
    pub target: Option<Vec2>,
    pub flow_field: Option<Arc<PathGridFlowField>>,
    /// Avoidance nudge gathered from this tick's contacts, consumed next tick.
    pub contact_velocity: Vec2,
    /// Steering intent of the current tick, before the contact nudge.
    pub desired_velocity: Vec2,
    pub state: UnitState,
}

impl Unit {
    pub fn new(speed: f32, acceleration: f32) -> Self {
        Self {
            speed,
            acceleration,
            deceleration: acceleration,
            rotation_speed: std::f32::consts::TAU,
            facing: 0.0,
            target: None,
            flow_field: None,
            contact_velocity: Vec2::ZERO,
            desired_velocity: Vec2::ZERO,
            state: UnitState::Idle,
        }
    }

    pub fn with_deceleration(mut self, deceleration: f32) -> Self {
        self.deceleration = deceleration;
        self
    }

    pub fn with_rotation_speed(mut self, rotation_speed: f32) -> Self {
        self.rotation_speed = rotation_speed;
        self
    }

    pub fn with_facing(mut self, facing: f32) -> Self {
        self.facing = facing;
        self
    }

    pub fn with_target(mut self, target: Vec2) -> Self {
        self.target = Some(target);
        self
    }

    /// A unit is busy while it has somewhere to go.
    pub fn is_busy(&self) -> bool {
        self.target.is_some()
    }
}

// ============================================================================
// ECS Link
// ============================================================================

/// Links an entity to its slot in [`MoveBodies`](super::MoveBodies).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyIndex(pub usize);
