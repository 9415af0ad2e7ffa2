/// ECS resources wrapping the movement engine state.

use bevy::prelude::*;
use std::sync::Arc;

use super::components::{BodyIndex, Movable, Unit};
use super::mover::Mover;
use super::pathfinding::PathGrid;

/// Index-aligned body arrays. Append-only: slots are never removed, so a
/// [`BodyIndex`] stays valid for the lifetime of the app.
#[derive(Resource, Default, Debug)]
pub struct MoveBodies {
    pub movables: Vec<Movable>,
    pub units: Vec<Unit>,
}

impl MoveBodies {
    pub fn push(&mut self, movable: Movable, unit: Unit) -> BodyIndex {
        let index = self.movables.len();
        self.movables.push(movable);
        self.units.push(unit);
        BodyIndex(index)
    }

    pub fn len(&self) -> usize {
        self.movables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movables.is_empty()
    }

    pub fn get(&self, index: BodyIndex) -> Option<(&Movable, &Unit)> {
        Some((self.movables.get(index.0)?, self.units.get(index.0)?))
    }
}

/// Active occupancy grid. Replace the `Arc` to change terrain; the engine
/// notices by pointer identity.
#[derive(Resource, Clone, Debug)]
pub struct NavGrid(pub Arc<PathGrid>);

impl Default for NavGrid {
    fn default() -> Self {
        Self(Arc::new(PathGrid::new(0, 0, 1.0)))
    }
}

#[derive(Resource, Default)]
pub struct MoveEngine(pub Mover);

/// Number of movement ticks run so far.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveTick(pub u64);

impl MoveTick {
    pub fn increment(&mut self) {
        self.0 += 1;
    }
}
