use bevy::prelude::*;
use bevy_common_assets::ron::RonAssetPlugin;
use serde::{Deserialize, Serialize};

use super::resources::MoveEngine;

/// Default location of the static movement configuration.
pub const MOVE_CONFIG_PATH: &str = "assets/move_config.ron";

/// Static movement configuration, read once when the plugin is built.
///
/// These values feed the physics solver and the steering loop. Changing them
/// mid-match changes simulation results, so only [`MoveTuning`] is hot-reloaded.
#[derive(Resource, Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MoveConfig {
    // Timestep
    pub tick_rate: f64,

    // Solver
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub linear_slop: f32,
    pub baumgarte: f32,
    pub max_linear_correction: f32,
    pub linear_sleep_tolerance: f32,
    pub time_to_sleep: f32,
    /// Broadphase cell edge length. Zero derives it from the largest proxy each step.
    pub broadphase_cell_size: f32,

    // Steering
    /// Heat deposited per unit of `radius²` when painting heatmaps.
    pub heat_per_radius_sq: f32,
    /// A unit moving slower than `rotation_epsilon * speed * dt` keeps its facing.
    pub rotation_epsilon: f32,

    // Diagnostics
    pub summary_log_interval: u64,
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            velocity_iterations: 8,
            position_iterations: 3,
            linear_slop: 0.005,
            baumgarte: 0.2,
            max_linear_correction: 0.2,
            linear_sleep_tolerance: 0.01,
            time_to_sleep: 0.5,
            broadphase_cell_size: 0.0,
            heat_per_radius_sq: 4.0,
            rotation_epsilon: 0.1,
            summary_log_interval: 600,
        }
    }
}

impl MoveConfig {
    /// Fixed timestep in seconds.
    pub fn dt(&self) -> f32 {
        (1.0 / self.tick_rate) as f32
    }

    /// Read a RON config file, falling back to defaults when it is missing or malformed.
    pub fn load_or_default(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match ron::from_str::<MoveConfig>(&contents) {
                Ok(config) => {
                    info!("Loaded movement config from {}", path);
                    config
                }
                Err(e) => {
                    error!("Failed to parse movement config {}: {}", path, e);
                    error!("Using default MoveConfig");
                    MoveConfig::default()
                }
            },
            Err(e) => {
                error!("Failed to read {}: {}", path, e);
                error!("Using default MoveConfig");
                MoveConfig::default()
            }
        }
    }
}

/// Runtime tuning that may be hot-reloaded while the simulation runs.
#[derive(Deserialize, Serialize, Asset, TypePath, Clone, Debug)]
pub struct MoveTuning {
    pub tick_rate: f64,
    pub summary_log_interval: u64,
}

#[derive(Resource)]
pub struct MoveTuningHandle(pub Handle<MoveTuning>);

/// Loads `move_tuning.ron` through the asset server and applies every reload.
///
/// Requires `AssetPlugin`; headless tests that only need the engine can skip
/// this plugin entirely.
pub struct MoveConfigPlugin;

impl Plugin for MoveConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RonAssetPlugin::<MoveTuning>::new(&["move_tuning.ron"]))
            .add_systems(Startup, setup_move_tuning)
            .add_systems(Update, apply_move_tuning);
    }
}

fn setup_move_tuning(mut commands: Commands, asset_server: Res<AssetServer>) {
    let handle = asset_server.load("move_tuning.ron");
    commands.insert_resource(MoveTuningHandle(handle));
}

fn apply_move_tuning(
    mut fixed_time: ResMut<Time<Fixed>>,
    handle: Option<Res<MoveTuningHandle>>,
    tunings: Res<Assets<MoveTuning>>,
    config: Option<ResMut<MoveConfig>>,
    engine: Option<ResMut<MoveEngine>>,
    mut events: MessageReader<AssetEvent<MoveTuning>>,
) {
    let Some(handle) = handle else { return };
    let mut changed = false;
    for event in events.read() {
        if event.is_modified(handle.0.id()) || event.is_loaded_with_dependencies(handle.0.id()) {
            changed = true;
        }
    }
    if !changed {
        return;
    }
    let Some(tuning) = tunings.get(&handle.0) else { return };
    if tuning.tick_rate <= 0.0 {
        warn!("Ignoring movement tuning with tick rate {}", tuning.tick_rate);
        return;
    }

    fixed_time.set_timestep_hz(tuning.tick_rate);
    if let Some(mut config) = config {
        config.tick_rate = tuning.tick_rate;
        config.summary_log_interval = tuning.summary_log_interval;
    }
    if let Some(mut engine) = engine {
        engine.0.config_mut().summary_log_interval = tuning.summary_log_interval;
    }
    info!(
        "Applied movement tuning: tick rate {} Hz, summary every {} ticks",
        tuning.tick_rate, tuning.summary_log_interval
    );
}
