/// Movement layer: physics, local avoidance and flow-field pathfinding.
///
/// This module is organized into:
/// - **components**: per-body state (`Movable`, `Unit`) and the ECS link
/// - **physics**: the rigid-body world port and its circle solver
/// - **spatial_hash**: broadphase grid used by the solver
/// - **pathfinding**: occupancy grid, flow fields, heatmaps and their cache
/// - **contact**: avoidance nudges derived from touching pairs
/// - **mover**: the per-tick orchestrator tying the above together
/// - **resources / events / systems**: bevy integration

use bevy::prelude::*;

pub mod components;
pub mod config;
pub mod contact;
pub mod events;
pub mod math;
pub mod mover;
pub mod pathfinding;
pub mod physics;
pub mod resources;
pub mod spatial_hash;
pub mod systems;

pub use components::*;
pub use config::{MoveConfig, MoveConfigPlugin, MoveTuning, MOVE_CONFIG_PATH};
pub use events::*;
pub use mover::Mover;
pub use pathfinding::{PathFinder, PathGrid, PathGridFlowField};
pub use physics::{CircleWorld, Contact, ContactCursor, Obstacle, RigidBodyWorld};
pub use resources::*;

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum MoveSet {
    Input, // Move commands into unit targets
    Step,  // Steering, physics and avoidance
    Sync,  // Body state onto transforms
}

/// Runs the movement engine on the fixed timestep.
///
/// Without an explicit config the plugin reads [`MOVE_CONFIG_PATH`] at build
/// time and falls back to defaults.
#[derive(Default)]
pub struct MovementPlugin {
    pub config: Option<MoveConfig>,
}

impl MovementPlugin {
    pub fn with_config(config: MoveConfig) -> Self {
        Self { config: Some(config) }
    }
}

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        let config = self
            .config
            .clone()
            .unwrap_or_else(|| MoveConfig::load_or_default(MOVE_CONFIG_PATH));
        info!("Movement running at {} Hz", config.tick_rate);

        app.insert_resource(Time::<Fixed>::from_hz(config.tick_rate));
        app.insert_resource(MoveEngine(Mover::new(config.clone())));
        app.insert_resource(config);
        app.init_resource::<MoveBodies>();
        app.init_resource::<NavGrid>();
        app.init_resource::<MoveTick>();

        app.add_message::<MoveCommand>();

        app.configure_sets(FixedUpdate, (MoveSet::Input, MoveSet::Step, MoveSet::Sync).chain());

        app.add_systems(
            FixedUpdate,
            (
                systems::increment_move_tick.before(MoveSet::Input),
                systems::process_move_commands.in_set(MoveSet::Input),
                systems::step_movement.in_set(MoveSet::Step),
                systems::sync_transforms.in_set(MoveSet::Sync),
            ),
        );
    }
}
