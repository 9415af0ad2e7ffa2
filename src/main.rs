use bevy::prelude::*;

use locomotion::movement::pathfinding::{load_grid, save_grid};
use locomotion::movement::{
    MoveBodies, MoveConfig, MoveConfigPlugin, MoveTick, Movable, MovementPlugin, NavGrid, PathGrid, Unit,
    UnitState, MOVE_CONFIG_PATH,
};

use rand::Rng;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEMO_GRID_SIZE: usize = 48;
const DEMO_GRID_STEP: f32 = 2.0;
const DEMO_BLOCKED_RATIO: f64 = 0.12;
const DEMO_UNITS: usize = 120;
const DEMO_TICKS: u64 = 1800;

fn setup_file_logging() -> String {
    let log_dir = PathBuf::from("logs");
    if !log_dir.exists() {
        if let Err(e) = fs::create_dir_all(&log_dir) {
            eprintln!("Failed to create logs directory: {}", e);
        }
    }

    // Keep only the last 25 runs
    cleanup_old_logs(&log_dir, 25);

    let now = chrono::Local::now();
    let log_filename = format!("locomotion_{}.log", now.format("%Y%m%d_%H%M%S"));
    let log_path_str = log_dir.join(&log_filename).to_string_lossy().to_string();

    let file_appender = RollingFileAppender::new(Rotation::NEVER, &log_dir, &log_filename);

    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);

    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bevy_ecs=info,bevy_asset=warn,locomotion=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    log_path_str
}

fn cleanup_old_logs(log_dir: &PathBuf, keep_count: usize) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| s.starts_with("locomotion") && s.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        // Oldest first
        log_files.sort_by_key(|e| e.metadata().ok().and_then(|m| m.modified().ok()));

        if log_files.len() > keep_count {
            for file in log_files.iter().take(log_files.len() - keep_count) {
                let _ = fs::remove_file(file.path());
            }
        }
    }
}

// ============================================================================
// Demo Scenario
// ============================================================================

/// Random occupancy with an open border so every region has a way around.
fn generate_grid(rng: &mut impl Rng) -> PathGrid {
    let mut grid = PathGrid::new(DEMO_GRID_SIZE, DEMO_GRID_SIZE, DEMO_GRID_STEP);
    for y in 2..DEMO_GRID_SIZE - 2 {
        for x in 2..DEMO_GRID_SIZE - 2 {
            if rng.random_bool(DEMO_BLOCKED_RATIO) {
                grid.set_blocked(x, y, true);
            }
        }
    }
    grid
}

fn open_cells(grid: &PathGrid) -> Vec<usize> {
    (0..grid.cell_count()).filter(|&cell| !grid.is_blocked_index(cell)).collect()
}

/// Spawn a crowd on random open cells and send it toward a handful of rally points.
fn spawn_crowd(bodies: &mut MoveBodies, grid: &PathGrid, rng: &mut impl Rng) {
    let open = open_cells(grid);
    if open.is_empty() {
        warn!("Grid has no open cells, nothing to spawn");
        return;
    }

    let rally: Vec<Vec2> = (0..4)
        .map(|_| grid.cell_center(open[rng.random_range(0..open.len())]))
        .collect();

    for i in 0..DEMO_UNITS {
        let start = grid.cell_center(open[rng.random_range(0..open.len())]);
        let radius = rng.random_range(0.3..0.8) * grid.step();
        let speed = rng.random_range(6.0..12.0);
        let unit = Unit::new(speed, speed * 4.0)
            .with_deceleration(speed * 6.0)
            .with_facing(rng.random_range(-std::f32::consts::PI..std::f32::consts::PI))
            .with_target(rally[i % rally.len()]);
        bodies.push(Movable::new(radius, start), unit);
    }
    info!("Spawned {} units toward {} rally points", DEMO_UNITS, rally.len());
}

fn main() {
    let log_file = setup_file_logging();

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Locomotion - Logging to file                            ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║  Log file: {:<45} ║", log_file);
    println!("╚══════════════════════════════════════════════════════════╝");

    let mut args = std::env::args().skip(1);
    let grid_path = args.next();
    let ticks = args.next().and_then(|t| t.parse().ok()).unwrap_or(DEMO_TICKS);

    let mut rng = rand::rng();
    let grid = match grid_path.as_deref() {
        Some(path) => match load_grid(path) {
            Ok(grid) => {
                info!("Loaded {}x{} grid from {}", grid.width(), grid.height(), path);
                grid
            }
            Err(e) => {
                error!("Failed to load grid {}: {}", path, e);
                return;
            }
        },
        None => {
            let grid = generate_grid(&mut rng);
            let path = "logs/last_grid.bin";
            if let Err(e) = save_grid(path, &grid) {
                warn!("Could not save generated grid to {}: {}", path, e);
            } else {
                info!("Generated grid saved to {} (pass it as the first argument to replay)", path);
            }
            grid
        }
    };

    let config = MoveConfig::load_or_default(MOVE_CONFIG_PATH);

    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins(AssetPlugin::default())
        .add_plugins(MoveConfigPlugin)
        .add_plugins(MovementPlugin::with_config(config))
        .insert_resource(NavGrid(Arc::new(grid)));

    {
        let world = app.world_mut();
        let grid = Arc::clone(&world.resource::<NavGrid>().0);
        spawn_crowd(&mut world.resource_mut::<MoveBodies>(), &grid, &mut rng);
    }

    // Startup systems and asset loading
    app.update();

    let start = std::time::Instant::now();
    for _ in 0..ticks {
        app.world_mut().run_schedule(FixedUpdate);
    }
    let elapsed = start.elapsed();

    let world = app.world();
    let bodies = world.resource::<MoveBodies>();
    let arrived = bodies
        .movables
        .iter()
        .zip(&bodies.units)
        .filter(|(movable, unit)| {
            unit.state == UnitState::Arriving
                && unit.target.is_some_and(|t| movable.position.distance(t) < 4.0 * movable.radius)
        })
        .count();
    let seeking = bodies.units.iter().filter(|u| u.state == UnitState::Seeking).count();

    info!(
        "Ran {} ticks in {:?} ({:.3} ms/tick): {}/{} near their rally point, {} still seeking",
        world.resource::<MoveTick>().0,
        elapsed,
        elapsed.as_secs_f64() * 1000.0 / ticks.max(1) as f64,
        arrived,
        bodies.len(),
        seeking
    );
}
