use bevy::math::Vec2;
use smallvec::SmallVec;
use std::f32::consts::SQRT_2;

use super::grid::PathGrid;

/// Outgoing `(to, cost)` pairs of one node; cost is in cells.
pub type EdgeBuffer = SmallVec<[(usize, f32); 8]>;

/// Axis moves first, then diagonals.
const DIRECTIONS: [(isize, isize); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
    (-1, -1),
];

/// Weighted 8-connected graph over a [`PathGrid`] for a footprint of
/// `size × size` cells.
///
/// Node `(x, y)` is the footprint whose min corner is cell `(x, y)`; node
/// indices share the grid's row-major layout. A node is walkable when its
/// whole footprint lies on the grid and is free.
#[derive(Clone, Copy, Debug)]
pub struct PathGridGraph<'a> {
    grid: &'a PathGrid,
    size: usize,
}

impl<'a> PathGridGraph<'a> {
    pub fn new(grid: &'a PathGrid, size: usize) -> Self {
        Self { grid, size: size.max(1) }
    }

    pub fn grid(&self) -> &'a PathGrid {
        self.grid
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn node_count(&self) -> usize {
        self.grid.cell_count()
    }

    fn coords(&self, index: usize) -> (isize, isize) {
        let (x, y) = self.grid.cell_coords(index);
        (x as isize, y as isize)
    }

    fn index_of(&self, x: isize, y: isize) -> usize {
        self.grid.cell_index(x as usize, y as usize)
    }

    /// Row-major index of the node whose footprint center is nearest
    /// `position`, clamped so the footprint stays on the grid.
    pub fn node_index(&self, position: Vec2) -> usize {
        let step = self.grid.step();
        let half = self.size as f32 * 0.5;
        let max_x = self.grid.width().saturating_sub(self.size);
        let max_y = self.grid.height().saturating_sub(self.size);
        let x = ((position.x / step - half).round().max(0.0) as usize).min(max_x);
        let y = ((position.y / step - half).round().max(0.0) as usize).min(max_y);
        self.grid.cell_index(x, y)
    }

    /// World-space center of a node's footprint.
    pub fn position(&self, index: usize) -> Vec2 {
        let (x, y) = self.grid.cell_coords(index);
        let half = self.size as f32 * 0.5;
        Vec2::new((x as f32 + half) * self.grid.step(), (y as f32 + half) * self.grid.step())
    }

    pub fn is_walkable(&self, index: usize) -> bool {
        let (x, y) = self.coords(index);
        let size = self.size as isize;
        (y..y + size).all(|cy| (x..x + size).all(|cx| !self.grid.is_blocked(cx, cy)))
    }

    /// Whether the strip of cells a footprint at `(x, y)` enters when it
    /// moves one cell along an axis is free.
    fn strip_free(&self, x: isize, y: isize, dx: isize, dy: isize) -> bool {
        let size = self.size as isize;
        if dx != 0 {
            let column = if dx > 0 { x + size } else { x - 1 };
            (y..y + size).all(|cy| !self.grid.is_blocked(column, cy))
        } else {
            let row = if dy > 0 { y + size } else { y - 1 };
            (x..x + size).all(|cx| !self.grid.is_blocked(cx, row))
        }
    }

    /// The single cell a footprint enters only by moving diagonally.
    fn corner_free(&self, x: isize, y: isize, dx: isize, dy: isize) -> bool {
        let size = self.size as isize;
        let cx = if dx > 0 { x + size } else { x - 1 };
        let cy = if dy > 0 { y + size } else { y - 1 };
        !self.grid.is_blocked(cx, cy)
    }

    fn can_move(&self, x: isize, y: isize, dx: isize, dy: isize) -> bool {
        if dx == 0 || dy == 0 {
            return self.strip_free(x, y, dx, dy);
        }
        self.strip_free(x, y, dx, 0) && self.strip_free(x, y, 0, dy) && self.corner_free(x, y, dx, dy)
    }

    /// Fill `buffer` with the edges leaving `from`. Diagonals never cut a
    /// blocked corner.
    pub fn edges(&self, from: usize, buffer: &mut EdgeBuffer) {
        buffer.clear();
        let (x, y) = self.coords(from);
        for (dx, dy) in DIRECTIONS {
            if !self.can_move(x, y, dx, dy) {
                continue;
            }
            let cost = if dx != 0 && dy != 0 { SQRT_2 } else { 1.0 };
            buffer.push((self.index_of(x + dx, y + dy), cost));
        }
    }

    /// Whether `cell` touches a convex wall corner that a straight line
    /// from behind `cell` toward `toward` could clip.
    ///
    /// A corner is convex when the diagonal cell is blocked but both axis
    /// moves toward it are free. Corners lying strictly in the quadrant
    /// facing away from `toward` are ignored.
    pub fn is_turn_point(&self, cell: usize, toward: usize) -> bool {
        if cell == toward {
            return false;
        }
        let (x, y) = self.coords(cell);
        let (tx, ty) = self.coords(toward);
        let sx = (tx - x).signum();
        let sy = (ty - y).signum();

        DIRECTIONS[4..].iter().any(|&(dx, dy)| {
            let behind = sx == -dx && sy == -dy;
            !behind
                && !self.corner_free(x, y, dx, dy)
                && self.strip_free(x, y, dx, 0)
                && self.strip_free(x, y, 0, dy)
        })
    }
}
