use bevy::log::debug;
use bevy::math::Vec2;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};

use super::graph::PathGridGraph;
use super::grid::PathGrid;
use super::heatmap::{PathGridFlowField, DEFAULT_HEAT_PER_RADIUS_SQ};

/// (grid address, target node, inflation size)
type FieldKey = (usize, usize, usize);

/// Cache of flow fields shared by every unit heading to the same place.
///
/// Entries are weak: a field lives as long as some unit holds it. Dead
/// entries are reclaimed lazily, one per call to [`PathFinder::flow_fields`].
#[derive(Debug)]
pub struct PathFinder {
    entries: Vec<(FieldKey, Weak<PathGridFlowField>)>,
    index: FxHashMap<FieldKey, usize>,
    heat_per_radius_sq: f32,
    built: u64,
}

impl Default for PathFinder {
    fn default() -> Self {
        Self::new(DEFAULT_HEAT_PER_RADIUS_SQ)
    }
}

impl PathFinder {
    pub fn new(heat_per_radius_sq: f32) -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
            heat_per_radius_sq,
            built: 0,
        }
    }

    /// Flow field toward `target` for units of width `path_width`.
    ///
    /// The target is clamped onto the grid. Returns `None` only when the
    /// grid has no cells.
    pub fn flow_field(
        &mut self,
        grid: &Arc<PathGrid>,
        path_width: f32,
        target: Vec2,
    ) -> Option<Arc<PathGridFlowField>> {
        if grid.is_empty() {
            return None;
        }
        let size = Self::inflation_size(grid, path_width);
        let node = PathGridGraph::new(grid, size).node_index(target);
        let key = (Arc::as_ptr(grid) as usize, node, size);

        if let Some(&slot) = self.index.get(&key) {
            if let Some(field) = self.entries[slot].1.upgrade() {
                if Arc::ptr_eq(field.grid(), grid) {
                    return Some(field);
                }
            }
            let field = self.build(grid, node, size);
            self.entries[slot].1 = Arc::downgrade(&field);
            return Some(field);
        }

        let field = self.build(grid, node, size);
        self.index.insert(key, self.entries.len());
        self.entries.push((key, Arc::downgrade(&field)));
        Some(field)
    }

    fn build(&mut self, grid: &Arc<PathGrid>, node: usize, size: usize) -> Arc<PathGridFlowField> {
        self.built += 1;
        debug!("Building flow field to node {} (size {}) on {}x{} grid", node, size, grid.width(), grid.height());
        Arc::new(PathGridFlowField::new(Arc::clone(grid), node, size, self.heat_per_radius_sq))
    }

    /// Footprint edge in cells for a body of width `path_width`.
    pub fn inflation_size(grid: &PathGrid, path_width: f32) -> usize {
        ((path_width / grid.step()).ceil().max(1.0)) as usize
    }

    /// Every live field. Reclaims at most one dead entry first.
    pub fn flow_fields(&mut self) -> impl Iterator<Item = Arc<PathGridFlowField>> + '_ {
        self.sweep_one();
        self.entries.iter().filter_map(|(_, weak)| weak.upgrade())
    }

    fn sweep_one(&mut self) {
        let Some(dead) = self.entries.iter().position(|(_, weak)| weak.strong_count() == 0) else {
            return;
        };
        let (key, _) = self.entries.swap_remove(dead);
        self.index.remove(&key);
        if let Some((moved, _)) = self.entries.get(dead) {
            self.index.insert(*moved, dead);
        }
    }

    /// Number of cache entries, dead ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of fields built since creation.
    pub fn built(&self) -> u64 {
        self.built
    }
}
