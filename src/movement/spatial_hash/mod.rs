use bevy::math::Vec2;
use rustc_hash::FxHashMap;

mod query;
#[cfg(test)]
mod tests;

/// What a broadphase entry stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Proxy {
    /// Dynamic body, by movable index.
    Body(usize),
    /// Static obstacle, by obstacle index.
    Obstacle(usize),
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min: min.min(max), max: min.max(max) }
    }

    pub fn around(center: Vec2, half_extent: f32) -> Self {
        let half = Vec2::splat(half_extent);
        Self { min: center - half, max: center + half }
    }

    /// Closed-interval overlap: touching boxes overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }
}

/// Uniform hashed grid used as the physics broadphase.
///
/// Every proxy is stored in each cell its bounds touch, so proxies of any size
/// are found by any query that overlaps them. A pair shared by several cells
/// is reported only from the cell holding the max corner of the two mins,
/// which makes queries duplicate-free without a visited set.
///
/// # Performance
///
/// - **Insert:** O(cells covered)
/// - **Clear:** keeps cell allocations for the next rebuild
#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: f32,
    cells: FxHashMap<(i32, i32), Vec<usize>>,
    proxies: Vec<(Proxy, Aabb)>,
}

impl SpatialHash {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            cells: FxHashMap::default(),
            proxies: Vec::new(),
        }
    }

    /// Change the cell size. Existing entries are dropped when it changes.
    pub fn set_cell_size(&mut self, cell_size: f32) {
        let cell_size = cell_size.max(f32::EPSILON);
        if cell_size != self.cell_size {
            self.cell_size = cell_size;
            self.cells.clear();
            self.proxies.clear();
        }
    }

    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
        self.proxies.clear();
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Number of cells currently holding at least one proxy.
    pub fn non_empty_cells(&self) -> usize {
        self.cells.values().filter(|cell| !cell.is_empty()).count()
    }

    pub(crate) fn cell_of(&self, point: Vec2) -> (i32, i32) {
        (
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }

    /// Inclusive cell range covered by `bounds`.
    pub(crate) fn cell_range(&self, bounds: &Aabb) -> ((i32, i32), (i32, i32)) {
        (self.cell_of(bounds.min), self.cell_of(bounds.max))
    }

    pub fn insert(&mut self, proxy: Proxy, bounds: Aabb) {
        let slot = self.proxies.len();
        self.proxies.push((proxy, bounds));
        let ((x0, y0), (x1, y1)) = self.cell_range(&bounds);
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.cells.entry((x, y)).or_default().push(slot);
            }
        }
    }

    pub(crate) fn proxy(&self, slot: usize) -> (Proxy, Aabb) {
        self.proxies[slot]
    }

    pub(crate) fn cell(&self, key: (i32, i32)) -> &[usize] {
        self.cells.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }
}
