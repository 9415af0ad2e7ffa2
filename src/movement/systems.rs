use bevy::prelude::*;
use locomotion_macros::profile;

use super::components::BodyIndex;
use super::config::MoveConfig;
use super::events::MoveCommand;
use super::math::normalize_angle;
use super::resources::{MoveBodies, MoveEngine, MoveTick, NavGrid};
use crate::profile_log;

// ============================================================================
// Tick
// ============================================================================

pub fn increment_move_tick(mut tick: ResMut<MoveTick>) {
    tick.increment();
}

// ============================================================================
// Input
// ============================================================================

/// Apply pending move commands in body order so the outcome does not depend
/// on message arrival order within a tick.
pub fn process_move_commands(mut commands: MessageReader<MoveCommand>, mut bodies: ResMut<MoveBodies>) {
    let mut pending: Vec<MoveCommand> = commands.read().copied().collect();
    if pending.is_empty() {
        return;
    }
    pending.sort_by_key(|command| command.body);

    for command in pending {
        let Some(unit) = bodies.units.get_mut(command.body.0) else {
            warn!("[MOVE] Ignoring command for unknown body {:?}", command.body);
            continue;
        };
        unit.target = command.target;
    }
}

// ============================================================================
// Step
// ============================================================================

#[profile(2)]
pub fn step_movement(
    mut engine: ResMut<MoveEngine>,
    mut bodies: ResMut<MoveBodies>,
    grid: Res<NavGrid>,
    config: Res<MoveConfig>,
    tick: Res<MoveTick>,
) {
    let bodies = &mut *bodies;
    if bodies.is_empty() {
        return;
    }
    engine.0.update(config.dt(), &mut bodies.movables, &mut bodies.units, &grid.0);

    profile_log!(
        tick,
        "[MOVE] tick {} | bodies {} | cached flow fields {}",
        tick.0,
        bodies.len(),
        engine.0.path_finder().len()
    );
}

// ============================================================================
// Sync
// ============================================================================

/// Mirror body positions onto entity transforms. The ground plane is X/Z,
/// so body `y` maps to world `z` and facing becomes a yaw.
pub fn sync_transforms(bodies: Res<MoveBodies>, mut query: Query<(&BodyIndex, &mut Transform)>) {
    for (index, mut transform) in query.iter_mut() {
        let Some((movable, unit)) = bodies.get(*index) else {
            continue;
        };
        transform.translation.x = movable.position.x;
        transform.translation.z = movable.position.y;
        transform.rotation = Quat::from_rotation_y(normalize_angle(-unit.facing));
    }
}
