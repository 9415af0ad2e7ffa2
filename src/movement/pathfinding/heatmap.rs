use bevy::math::Vec2;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::flow_field::{FlowField, State};
use super::graph::{EdgeBuffer, PathGridGraph};
use super::grid::PathGrid;
use crate::movement::components::Movable;

/// Heat deposited per unit of `radius²` unless the cache was told otherwise.
pub const DEFAULT_HEAT_PER_RADIUS_SQ: f32 = 4.0;

/// Vacancy at or below this reads as "no room left".
const VACANCY_EPSILON: f32 = 1e-4;

/// A flow field to one destination together with a crowd heatmap.
///
/// Shared by every unit heading to the same cell with the same path width.
/// The heatmap is repainted once per tick; cells around the destination that
/// are already covered by arrived units read as hot and stop steering, so a
/// crowd fills the area around the target instead of piling onto one point.
///
/// Heat is stored per node of the field's own (inflated) graph. A node is the
/// min corner of a footprint, so node and cell indices share one range.
pub struct PathGridFlowField {
    grid: Arc<PathGrid>,
    target: usize,
    size: usize,
    heat_per_radius_sq: f32,
    field: FlowField,
    heatmap: RwLock<Vec<f32>>,
}

impl fmt::Debug for PathGridFlowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathGridFlowField")
            .field("target", &self.target)
            .field("size", &self.size)
            .field("width", &self.grid.width())
            .field("height", &self.grid.height())
            .field("hot_cells", &self.hot_cell_count())
            .finish()
    }
}

impl PathGridFlowField {
    pub fn new(grid: Arc<PathGrid>, target: usize, size: usize, heat_per_radius_sq: f32) -> Self {
        let size = size.max(1);
        let field = FlowField::build(&PathGridGraph::new(&grid, size), target);
        let heatmap = RwLock::new(vec![0.0; grid.cell_count()]);
        Self {
            grid,
            target,
            size,
            heat_per_radius_sq,
            field,
            heatmap,
        }
    }

    pub fn grid(&self) -> &Arc<PathGrid> {
        &self.grid
    }

    /// Target node index.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Inflation size in cells.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn field(&self) -> &FlowField {
        &self.field
    }

    pub fn graph(&self) -> PathGridGraph<'_> {
        PathGridGraph::new(&self.grid, self.size)
    }

    fn read_heat(&self) -> RwLockReadGuard<'_, Vec<f32>> {
        self.heatmap.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_heat(&self) -> RwLockWriteGuard<'_, Vec<f32>> {
        self.heatmap.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn heat(&self, index: usize) -> f32 {
        self.read_heat().get(index).copied().unwrap_or(0.0)
    }

    /// A hot cell is fully covered by arrived units.
    pub fn is_hot(&self, index: usize) -> bool {
        self.heat(index) >= self.grid.cell_area()
    }

    pub fn hot_cell_count(&self) -> usize {
        let area = self.grid.cell_area();
        self.read_heat().iter().filter(|&&h| h >= area).count()
    }

    // ========================================================================
    // Sampling
    // ========================================================================

    /// Steering direction at `position`, or zero to hold position.
    ///
    /// Bilinearly blends the vectors of the four nearest nodes and weighs them
    /// against the free capacity of those nodes.
    pub fn vector(&self, position: Vec2) -> Vec2 {
        if !self.grid.contains(position) {
            return Vec2::ZERO;
        }
        let step = self.grid.step();
        let half = self.size as f32 * 0.5;
        let max_x = self.grid.width().saturating_sub(self.size);
        let max_y = self.grid.height().saturating_sub(self.size);

        let fx = position.x / step - half;
        let fy = position.y / step - half;
        let x0 = (fx.floor().max(0.0) as usize).min(max_x);
        let y0 = (fy.floor().max(0.0) as usize).min(max_y);
        let x1 = (x0 + 1).min(max_x);
        let y1 = (y0 + 1).min(max_y);
        let tx = (fx - x0 as f32).clamp(0.0, 1.0);
        let ty = (fy - y0 as f32).clamp(0.0, 1.0);

        let samples = [
            (x0, y0, (1.0 - tx) * (1.0 - ty)),
            (x1, y0, tx * (1.0 - ty)),
            (x0, y1, (1.0 - tx) * ty),
            (x1, y1, tx * ty),
        ];

        let area = self.grid.cell_area();
        let heat = self.read_heat();
        let mut vector = Vec2::ZERO;
        let mut vacancy = 1.0;
        for (x, y, weight) in samples {
            let node = self.grid.cell_index(x, y);
            vector += self.field.vector(node) * weight;
            let occupied = heat.get(node).copied().unwrap_or(0.0) / area;
            vacancy -= occupied.min(1.0) * weight;
        }

        if vacancy <= VACANCY_EPSILON {
            return Vec2::ZERO;
        }
        vector.normalize_or_zero()
    }

    /// Estimated path length from `position` to `target`.
    ///
    /// Measured through the relay of the nearest node; exact straight-line
    /// distance once the relay is the target itself.
    pub fn remaining_distance(&self, position: Vec2, target: Vec2) -> f32 {
        let graph = self.graph();
        let node = graph.node_index(position);
        match (self.field.relay(node), self.field.distance(node)) {
            (Some(relay), Some(_)) if relay != self.field.target() => {
                let via = self.field.distance(relay).unwrap_or(0.0);
                position.distance(graph.position(relay)) + via
            }
            _ => position.distance(target),
        }
    }

    // ========================================================================
    // Heatmap
    // ========================================================================

    /// Repaint the heatmap from the current body positions.
    pub fn update_heatmap(&self, movables: &[Movable]) {
        let mut heat = self.write_heat();
        heat.fill(0.0);
        if heat.is_empty() {
            return;
        }

        let graph = self.graph();
        for movable in movables {
            let node = graph.node_index(movable.position);
            if let Some(value) = heat.get_mut(node) {
                *value += movable.radius * movable.radius * self.heat_per_radius_sq;
            }
        }

        self.clear_islands(&mut heat);

        let occupied: f32 = heat.iter().sum();
        let area = self.grid.cell_area();
        if occupied < area {
            return;
        }
        heat.fill(0.0);
        self.flood_from_target(&mut heat, occupied);
    }

    /// Drop heat on nodes whose `next` chain leaves the heated region before
    /// reaching the target.
    fn clear_islands(&self, heat: &mut [f32]) {
        const UNKNOWN: u8 = 0;
        const CONNECTED: u8 = 1;
        const ISLAND: u8 = 2;

        let target = self.field.target();
        let mut state = vec![UNKNOWN; heat.len()];
        let mut chain = Vec::new();

        for start in 0..heat.len() {
            if heat[start] <= 0.0 || state[start] != UNKNOWN {
                continue;
            }
            chain.clear();
            let mut cursor = start;
            let verdict = loop {
                if state[cursor] != UNKNOWN {
                    break state[cursor];
                }
                if heat[cursor] <= 0.0 {
                    break ISLAND;
                }
                chain.push(cursor);
                if cursor == target {
                    break CONNECTED;
                }
                match self.field.next(cursor) {
                    Some(next) => cursor = next,
                    None => break ISLAND,
                }
            };
            for &cell in &chain {
                state[cell] = verdict;
            }
        }

        for (cell, value) in heat.iter_mut().enumerate() {
            if state[cell] != CONNECTED {
                *value = 0.0;
            }
        }
    }

    /// Mark nodes hot in path order from the target until they cover `occupied`.
    fn flood_from_target(&self, heat: &mut [f32], occupied: f32) {
        let area = self.grid.cell_area();
        let graph = self.graph();
        let target = self.field.target();
        if target >= heat.len() {
            return;
        }
        let target_walkable = graph.is_walkable(target);

        let mut distance = vec![f32::INFINITY; heat.len()];
        let mut edges = EdgeBuffer::new();
        let mut open = BinaryHeap::new();
        let mut marked = 0.0;

        distance[target] = 0.0;
        open.push(State { cost: 0.0, node: target });

        while let Some(State { cost, node }) = open.pop() {
            if cost > distance[node] {
                continue;
            }
            heat[node] = area;
            marked += area;
            if marked >= occupied {
                break;
            }
            graph.edges(node, &mut edges);
            for &(to, edge_cost) in &edges {
                if node == target && !target_walkable && !graph.is_walkable(to) {
                    continue;
                }
                let candidate = cost + edge_cost;
                if candidate < distance[to] {
                    distance[to] = candidate;
                    open.push(State { cost: candidate, node: to });
                }
            }
        }
    }
}
