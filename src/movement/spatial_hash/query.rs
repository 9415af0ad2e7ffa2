use bevy::math::Vec2;

use super::{Aabb, Proxy, SpatialHash};

impl SpatialHash {
    fn owner_cell(&self, a: &Aabb, b: &Aabb) -> (i32, i32) {
        self.cell_of(a.min.max(b.min))
    }

    /// Every proxy whose bounds overlap `bounds`, each exactly once.
    ///
    /// Clears `out` before populating it.
    pub fn query_aabb(&self, bounds: &Aabb, out: &mut Vec<Proxy>) {
        out.clear();
        let ((x0, y0), (x1, y1)) = self.cell_range(bounds);
        for y in y0..=y1 {
            for x in x0..=x1 {
                for &slot in self.cell((x, y)) {
                    let (proxy, other) = self.proxy(slot);
                    if other.overlaps(bounds) && self.owner_cell(bounds, &other) == (x, y) {
                        out.push(proxy);
                    }
                }
            }
        }
    }

    /// Proxies whose bounds overlap the bounds of segment `a`-`b`.
    ///
    /// Candidates only; callers run the exact shape test.
    pub fn query_segment(&self, a: Vec2, b: Vec2, out: &mut Vec<Proxy>) {
        self.query_aabb(&Aabb::new(a, b), out);
    }

    /// All overlapping proxy pairs, each reported once with the lower
    /// insertion slot first.
    ///
    /// Clears `out` before populating it.
    pub fn overlapping_pairs(&self, out: &mut Vec<(Proxy, Proxy)>) {
        out.clear();
        for (&key, cell) in &self.cells {
            for (i, &slot_a) in cell.iter().enumerate() {
                let (proxy_a, bounds_a) = self.proxy(slot_a);
                for &slot_b in &cell[i + 1..] {
                    let (proxy_b, bounds_b) = self.proxy(slot_b);
                    if !bounds_a.overlaps(&bounds_b) || self.owner_cell(&bounds_a, &bounds_b) != key {
                        continue;
                    }
                    if slot_a < slot_b {
                        out.push((proxy_a, proxy_b));
                    } else {
                        out.push((proxy_b, proxy_a));
                    }
                }
            }
        }
    }
}
