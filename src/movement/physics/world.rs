use bevy::math::Vec2;

use super::{Contact, ContactCursor, Obstacle, RayHit, RigidBodyWorld, SolverSettings};
use crate::movement::components::{Movable, MoveFlags};
use crate::movement::spatial_hash::{Aabb, Proxy, SpatialHash};

/// Per-body state the movable does not carry.
#[derive(Clone, Copy, Debug)]
struct Body {
    radius: f32,
    inv_mass: f32,
    /// Position at the end of the last step.
    position: Vec2,
    awake: bool,
    sleep_time: f32,
}

/// Touching pair prepared for the solver. `normal` points from `a` to `b`.
#[derive(Clone, Copy, Debug)]
struct Constraint {
    a: usize,
    b: Proxy,
    normal: Vec2,
    impulse: f32,
}

/// Sequential-impulse solver for circles with a hashed-grid broadphase.
///
/// Each body has unit mass (density `1 / (πr²)`), so an applied force is its
/// acceleration whatever the radius. Contacts have no friction and no
/// restitution: bodies stop penetrating but never bounce.
#[derive(Debug, Clone)]
pub struct CircleWorld {
    settings: SolverSettings,
    bodies: Vec<Body>,
    obstacles: Vec<Obstacle>,
    broadphase: SpatialHash,
    contacts: Vec<Contact>,
    // Scratch
    pairs: Vec<(Proxy, Proxy)>,
    constraints: Vec<Constraint>,
}

impl Default for CircleWorld {
    fn default() -> Self {
        Self::new(SolverSettings::default())
    }
}

impl CircleWorld {
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            settings,
            bodies: Vec::new(),
            obstacles: Vec::new(),
            broadphase: SpatialHash::new(1.0),
            contacts: Vec::new(),
            pairs: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn is_awake(&self, body: usize) -> bool {
        self.bodies[body].awake
    }

    pub fn broadphase(&self) -> &SpatialHash {
        &self.broadphase
    }

    // ========================================================================
    // Broadphase
    // ========================================================================

    fn body_bounds(&self, body: &Body) -> Aabb {
        Aabb::around(body.position, body.radius + self.settings.linear_slop)
    }

    fn cell_size(&self) -> f32 {
        if self.settings.broadphase_cell_size > 0.0 {
            return self.settings.broadphase_cell_size;
        }
        let bodies = self
            .bodies
            .iter()
            .map(|b| 2.0 * (b.radius + self.settings.linear_slop))
            .fold(0.0, f32::max);
        let obstacles = self.obstacles.iter().map(|o| 2.0 * o.half_extent).fold(0.0, f32::max);
        bodies.max(obstacles).max(f32::EPSILON)
    }

    fn rebuild_broadphase(&mut self) {
        let cell_size = self.cell_size();
        self.broadphase.set_cell_size(cell_size);
        self.broadphase.clear();
        for (index, body) in self.bodies.iter().enumerate() {
            let bounds = self.body_bounds(body);
            self.broadphase.insert(Proxy::Body(index), bounds);
        }
        for (index, obstacle) in self.obstacles.iter().enumerate() {
            self.broadphase
                .insert(Proxy::Obstacle(index), Aabb::around(obstacle.position, obstacle.half_extent));
        }
    }

    /// Create bodies for new indices and re-index when the scene moved
    /// since the last step.
    fn sync(&mut self, movables: &[Movable], obstacles: &[Obstacle]) {
        assert!(
            movables.len() >= self.bodies.len(),
            "movables shrank from {} to {}",
            self.bodies.len(),
            movables.len()
        );
        let mut stale = movables.len() != self.bodies.len();
        for movable in &movables[self.bodies.len()..] {
            self.bodies.push(Body {
                radius: movable.radius,
                inv_mass: 1.0,
                position: movable.position,
                awake: true,
                sleep_time: 0.0,
            });
        }
        for (body, movable) in self.bodies.iter_mut().zip(movables) {
            if body.position != movable.position {
                body.position = movable.position;
                stale = true;
            }
        }
        if self.obstacles.as_slice() != obstacles {
            self.obstacles.clear();
            self.obstacles.extend_from_slice(obstacles);
            stale = true;
        }
        if stale {
            self.rebuild_broadphase();
        }
    }

    // ========================================================================
    // Narrowphase
    // ========================================================================

    /// Normal from `a` toward the partner and signed distance between surfaces.
    fn manifold(&self, a: usize, position: Vec2, partner: Proxy, positions: &[Movable]) -> Option<(Vec2, f32)> {
        let radius = self.bodies[a].radius;
        match partner {
            Proxy::Body(b) => {
                let delta = positions[b].position - position;
                let distance = delta.length();
                let normal = delta.try_normalize().unwrap_or(Vec2::X);
                Some((normal, distance - radius - self.bodies[b].radius))
            }
            Proxy::Obstacle(o) => {
                let obstacle = self.obstacles.get(o)?;
                Some(circle_square(position, radius, obstacle))
            }
        }
    }

    fn inv_mass(&self, proxy: Proxy) -> f32 {
        match proxy {
            Proxy::Body(b) if self.bodies[b].awake => self.bodies[b].inv_mass,
            _ => 0.0,
        }
    }

    fn collect_constraints(&mut self, movables: &mut [Movable]) {
        self.constraints.clear();
        self.contacts.clear();
        self.broadphase.overlapping_pairs(&mut self.pairs);

        let mut touching = Vec::with_capacity(self.pairs.len());
        for &(p, q) in &self.pairs {
            let (a, b) = match (p, q) {
                (Proxy::Body(a), other) => (a, other),
                (other, Proxy::Body(a)) => (a, other),
                _ => continue,
            };
            movables[a].flags.insert(MoveFlags::HAS_CONTACT);
            if let Proxy::Body(b) = b {
                movables[b].flags.insert(MoveFlags::HAS_CONTACT);
            }
            let Some((normal, separation)) = self.manifold(a, movables[a].position, b, movables) else {
                continue;
            };
            if separation > 0.0 {
                continue;
            }
            movables[a].flags.insert(MoveFlags::HAS_TOUCHING_CONTACT);
            if let Proxy::Body(b) = b {
                movables[b].flags.insert(MoveFlags::HAS_TOUCHING_CONTACT);
                self.contacts.push(Contact { a: a.min(b), b: a.max(b) });
            }
            touching.push(Constraint { a, b, normal, impulse: 0.0 });
        }

        // A sleeping body touched by an awake one wakes, transitively.
        let mut changed = true;
        while changed {
            changed = false;
            for constraint in &touching {
                let Proxy::Body(b) = constraint.b else { continue };
                let (a_awake, b_awake) = (self.bodies[constraint.a].awake, self.bodies[b].awake);
                if a_awake != b_awake {
                    let sleeper = if a_awake { b } else { constraint.a };
                    self.bodies[sleeper].awake = true;
                    self.bodies[sleeper].sleep_time = 0.0;
                    changed = true;
                }
            }
        }

        touching.retain(|c| self.bodies[c.a].awake || matches!(c.b, Proxy::Body(b) if self.bodies[b].awake));
        touching.sort_by_key(|c| (c.a, c.b));
        self.contacts.sort_unstable();
        self.constraints = touching;
    }

    // ========================================================================
    // Solver
    // ========================================================================

    fn solve_velocities(&mut self, movables: &mut [Movable]) {
        for _ in 0..self.settings.velocity_iterations {
            for i in 0..self.constraints.len() {
                let c = self.constraints[i];
                let inv_a = self.inv_mass(Proxy::Body(c.a));
                let inv_b = self.inv_mass(c.b);
                let inv_sum = inv_a + inv_b;
                if inv_sum <= 0.0 {
                    continue;
                }
                let vb = match c.b {
                    Proxy::Body(b) => movables[b].velocity,
                    Proxy::Obstacle(_) => Vec2::ZERO,
                };
                let normal_speed = (vb - movables[c.a].velocity).dot(c.normal);
                let lambda = -normal_speed / inv_sum;
                let accumulated = (c.impulse + lambda).max(0.0);
                let delta = accumulated - c.impulse;
                self.constraints[i].impulse = accumulated;

                let impulse = c.normal * delta;
                movables[c.a].velocity -= impulse * inv_a;
                if let Proxy::Body(b) = c.b {
                    movables[b].velocity += impulse * inv_b;
                }
            }
        }
    }

    fn solve_positions(&mut self, movables: &mut [Movable]) {
        let slop = self.settings.linear_slop;
        for _ in 0..self.settings.position_iterations {
            let mut min_separation = 0.0f32;
            for i in 0..self.constraints.len() {
                let c = self.constraints[i];
                let inv_a = self.inv_mass(Proxy::Body(c.a));
                let inv_b = self.inv_mass(c.b);
                let inv_sum = inv_a + inv_b;
                if inv_sum <= 0.0 {
                    continue;
                }
                let Some((normal, separation)) = self.manifold(c.a, movables[c.a].position, c.b, movables) else {
                    continue;
                };
                min_separation = min_separation.min(separation);
                let correction = (self.settings.baumgarte * (separation + slop))
                    .clamp(-self.settings.max_linear_correction, 0.0);
                let impulse = normal * (-correction / inv_sum);
                movables[c.a].position -= impulse * inv_a;
                if let Proxy::Body(b) = c.b {
                    movables[b].position += impulse * inv_b;
                }
            }
            if min_separation >= -3.0 * slop {
                break;
            }
        }
    }

    fn update_sleep(&mut self, dt: f32, movables: &mut [Movable]) {
        let tolerance_sq = self.settings.linear_sleep_tolerance * self.settings.linear_sleep_tolerance;
        for (body, movable) in self.bodies.iter_mut().zip(movables.iter_mut()) {
            if !body.awake {
                continue;
            }
            if movable.velocity.length_squared() > tolerance_sq || movable.force != Vec2::ZERO {
                body.sleep_time = 0.0;
                continue;
            }
            body.sleep_time += dt;
            if body.sleep_time >= self.settings.time_to_sleep {
                body.awake = false;
                movable.velocity = Vec2::ZERO;
            }
        }
    }
}

/// Normal from the circle toward the square and signed surface distance.
fn circle_square(center: Vec2, radius: f32, obstacle: &Obstacle) -> (Vec2, f32) {
    let half = Vec2::splat(obstacle.half_extent);
    let min = obstacle.position - half;
    let max = obstacle.position + half;
    let closest = center.clamp(min, max);
    let delta = closest - center;
    if let Some(normal) = delta.try_normalize() {
        return (normal, delta.length() - radius);
    }

    // Center inside the square: leave through the nearest face.
    let faces = [
        (center.x - min.x, Vec2::X),
        (max.x - center.x, Vec2::NEG_X),
        (center.y - min.y, Vec2::Y),
        (max.y - center.y, Vec2::NEG_Y),
    ];
    let (depth, normal) = faces
        .into_iter()
        .fold((f32::INFINITY, Vec2::X), |best, face| if face.0 < best.0 { face } else { best });
    (normal, -depth - radius)
}

impl RigidBodyWorld for CircleWorld {
    fn step(&mut self, dt: f32, movables: &mut [Movable], obstacles: &[Obstacle]) {
        self.sync(movables, obstacles);

        for (body, movable) in self.bodies.iter_mut().zip(movables.iter_mut()) {
            if movable.force != Vec2::ZERO || movable.flags.contains(MoveFlags::WAKE) {
                body.awake = true;
                body.sleep_time = 0.0;
            }
            movable.flags.remove(MoveFlags::WAKE | MoveFlags::HAS_CONTACT | MoveFlags::HAS_TOUCHING_CONTACT);
            if body.awake {
                movable.velocity += movable.force * body.inv_mass * dt;
            } else {
                movable.velocity = Vec2::ZERO;
            }
        }

        self.collect_constraints(movables);
        self.solve_velocities(movables);

        for (body, movable) in self.bodies.iter().zip(movables.iter_mut()) {
            if body.awake {
                movable.position += movable.velocity * dt;
            }
        }

        self.solve_positions(movables);
        self.update_sleep(dt, movables);

        for (body, movable) in self.bodies.iter_mut().zip(movables.iter_mut()) {
            movable.flags.set(MoveFlags::AWAKE, body.awake);
            movable.force = Vec2::ZERO;
            body.position = movable.position;
        }
        self.rebuild_broadphase();
    }

    fn next_contact(&self, cursor: &mut ContactCursor) -> Option<Contact> {
        let contact = self.contacts.get(cursor.0).copied()?;
        cursor.0 += 1;
        Some(contact)
    }

    fn query_aabb(&self, min: Vec2, max: Vec2, out: &mut Vec<usize>) {
        out.clear();
        let bounds = Aabb::new(min, max);
        let mut candidates = Vec::new();
        self.broadphase.query_aabb(&bounds, &mut candidates);
        out.extend(candidates.into_iter().filter_map(|proxy| match proxy {
            Proxy::Body(index) => {
                let body = &self.bodies[index];
                Aabb::around(body.position, body.radius).overlaps(&bounds).then_some(index)
            }
            Proxy::Obstacle(_) => None,
        }));
        out.sort_unstable();
    }

    fn raycast(&self, from: Vec2, to: Vec2) -> Option<RayHit> {
        let mut candidates = Vec::new();
        self.broadphase.query_segment(from, to, &mut candidates);
        let direction = to - from;

        candidates
            .into_iter()
            .filter_map(|proxy| match proxy {
                Proxy::Body(index) => {
                    let body = &self.bodies[index];
                    ray_circle(from, direction, body.position, body.radius).map(|fraction| RayHit {
                        body: index,
                        fraction,
                        point: from + direction * fraction,
                    })
                }
                Proxy::Obstacle(_) => None,
            })
            .min_by(|a, b| a.fraction.total_cmp(&b.fraction).then(a.body.cmp(&b.body)))
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

/// First fraction in `[0, 1]` at which `origin + t * direction` meets the circle.
fn ray_circle(origin: Vec2, direction: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let offset = origin - center;
    let c = offset.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let a = direction.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let b = offset.dot(direction);
    let discriminant = b * b - a * c;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-b - discriminant.sqrt()) / a;
    (0.0..=1.0).contains(&t).then_some(t)
}
