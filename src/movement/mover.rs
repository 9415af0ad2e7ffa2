use bevy::log::{debug, info};
use bevy::math::Vec2;
use std::sync::Arc;

use super::components::{Movable, MoveFlags, Unit, UnitState};
use super::config::MoveConfig;
use super::contact::apply_contact;
use super::math::{heading, lerp, rotate_towards};
use super::pathfinding::{PathFinder, PathGrid, PathGridGraph};
use super::physics::{CircleWorld, ContactCursor, Obstacle, RigidBodyWorld, SolverSettings};

/// Per-tick movement orchestrator.
///
/// Owns the physics world, the flow-field cache and the obstacle set built
/// from the active grid. Each [`update`](Mover::update) turns unit targets into
/// steering forces, steps the world, resolves contacts into avoidance nudges
/// for the next tick and repaints the crowd heatmaps.
pub struct Mover<W: RigidBodyWorld = CircleWorld> {
    world: W,
    path_finder: PathFinder,
    obstacles: Vec<Obstacle>,
    grid: Option<Arc<PathGrid>>,
    obstacle_rebuilds: u64,
    config: MoveConfig,
    tick: u64,
}

impl Default for Mover<CircleWorld> {
    fn default() -> Self {
        Self::new(MoveConfig::default())
    }
}

impl Mover<CircleWorld> {
    pub fn new(config: MoveConfig) -> Self {
        let world = CircleWorld::new(SolverSettings::from(&config));
        Self::with_world(world, config)
    }
}

impl<W: RigidBodyWorld> Mover<W> {
    pub fn with_world(world: W, config: MoveConfig) -> Self {
        Self {
            world,
            path_finder: PathFinder::new(config.heat_per_radius_sq),
            obstacles: Vec::new(),
            grid: None,
            obstacle_rebuilds: 0,
            config,
            tick: 0,
        }
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn config(&self) -> &MoveConfig {
        &self.config
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn config_mut(&mut self) -> &mut MoveConfig {
        &mut self.config
    }

    pub fn path_finder(&self) -> &PathFinder {
        &self.path_finder
    }

    pub fn path_finder_mut(&mut self) -> &mut PathFinder {
        &mut self.path_finder
    }

    /// How many times the obstacle set was rebuilt from a new grid.
    pub fn obstacle_rebuilds(&self) -> u64 {
        self.obstacle_rebuilds
    }

    /// Advance all units by one tick of length `dt`.
    ///
    /// `movables[i]` and `units[i]` must describe the same unit. The slices
    /// may grow between calls but never shrink.
    pub fn update(&mut self, dt: f32, movables: &mut [Movable], units: &mut [Unit], grid: &Arc<PathGrid>) {
        assert_eq!(
            movables.len(),
            units.len(),
            "movables and units must be index-aligned"
        );

        for (movable, unit) in movables.iter_mut().zip(units.iter_mut()) {
            if unit.target.is_some() && unit.flow_field.is_none() {
                movable.flags.insert(MoveFlags::WAKE);
            }
            if !movable.flags.contains(MoveFlags::AWAKE) && unit.target.is_none() {
                unit.flow_field = None;
            }

            let desired = self.desired_velocity(dt, movable, unit, grid);
            unit.desired_velocity = desired;
            movable.force = steering_force(desired + unit.contact_velocity, movable.velocity, unit, dt);
        }

        if !self.grid.as_ref().is_some_and(|current| Arc::ptr_eq(current, grid)) {
            self.rebuild_obstacles(grid);
        }

        self.world.step(dt, movables, &self.obstacles);

        let epsilon = self.config.rotation_epsilon;
        for (movable, unit) in movables.iter().zip(units.iter_mut()) {
            unit.contact_velocity = Vec2::ZERO;
            if movable.velocity.length() > epsilon * unit.speed * dt {
                unit.facing = rotate_towards(unit.facing, heading(movable.velocity), unit.rotation_speed * dt);
            }
        }

        let mut cursor = ContactCursor::default();
        let mut contacts = 0;
        while let Some(contact) = self.world.next_contact(&mut cursor) {
            apply_contact(movables, units, contact);
            contacts += 1;
        }

        let mut fields = 0;
        for field in self.path_finder.flow_fields() {
            field.update_heatmap(movables);
            fields += 1;
        }

        self.tick += 1;
        let interval = self.config.summary_log_interval;
        if interval > 0 && self.tick % interval == 0 {
            let awake = movables.iter().filter(|m| m.flags.contains(MoveFlags::AWAKE)).count();
            let busy = units.iter().filter(|u| u.is_busy()).count();
            info!(
                "[MOVE] tick {}: {} bodies ({} awake, {} busy), {} contacts, {} live flow fields",
                self.tick,
                movables.len(),
                awake,
                busy,
                contacts,
                fields
            );
        }
    }

    fn desired_velocity(&mut self, dt: f32, movable: &Movable, unit: &mut Unit, grid: &Arc<PathGrid>) -> Vec2 {
        let Some(target) = unit.target else {
            unit.state = UnitState::Idle;
            return Vec2::ZERO;
        };

        let width = movable.radius * 2.0;
        let size = PathFinder::inflation_size(grid, width);
        let stale = match &unit.flow_field {
            Some(field) => {
                !Arc::ptr_eq(field.grid(), grid)
                    || field.size() != size
                    || field.target() != PathGridGraph::new(grid, size).node_index(target)
            }
            None => true,
        };
        if stale {
            unit.flow_field = self.path_finder.flow_field(grid, width, target);
        }
        let Some(field) = &unit.flow_field else {
            unit.state = UnitState::Arriving;
            return Vec2::ZERO;
        };

        let remaining = field.remaining_distance(movable.position, target);
        if remaining <= unit.speed * dt {
            unit.state = UnitState::Arriving;
            return Vec2::ZERO;
        }

        let direction = field.vector(movable.position);
        let stopping = (2.0 * unit.acceleration * remaining).sqrt();
        unit.state = if stopping < unit.speed || direction == Vec2::ZERO {
            UnitState::Arriving
        } else {
            UnitState::Seeking
        };
        direction * unit.speed.min(stopping)
    }

    fn rebuild_obstacles(&mut self, grid: &Arc<PathGrid>) {
        let half_extent = grid.step() * 0.5;
        self.obstacles.clear();
        self.obstacles.extend(grid.blocked_cells().map(|cell| Obstacle {
            position: grid.cell_center(cell),
            half_extent,
        }));
        self.grid = Some(Arc::clone(grid));
        self.obstacle_rebuilds += 1;
        debug!(
            "[MOVE] Rebuilt {} obstacles for {}x{} grid (rebuild #{})",
            self.obstacles.len(),
            grid.width(),
            grid.height(),
            self.obstacle_rebuilds
        );
    }
}

/// Force that moves `velocity` toward `desired` within one tick.
///
/// Limited by deceleration when stopping, by acceleration when starting, and
/// by a blend of the two depending on how far the heading has to turn.
fn steering_force(desired: Vec2, velocity: Vec2, unit: &Unit, dt: f32) -> Vec2 {
    let limit = if desired == Vec2::ZERO {
        unit.deceleration
    } else if velocity == Vec2::ZERO {
        unit.acceleration
    } else {
        let cos = desired.normalize().dot(velocity.normalize());
        lerp(unit.deceleration, unit.acceleration, (cos + 1.0) * 0.5)
    };
    ((desired - velocity) / dt).clamp_length_max(limit)
}
