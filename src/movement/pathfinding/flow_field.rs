use bevy::math::Vec2;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::graph::{EdgeBuffer, PathGridGraph};

pub(super) const NO_NODE: usize = usize::MAX;

/// Open-set entry; the heap pops the lowest cost, then the lowest index.
#[derive(Clone, Copy, PartialEq)]
pub(super) struct State {
    pub cost: f32,
    pub node: usize,
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-target shortest-path tree over a [`PathGridGraph`].
///
/// For every reachable node this stores the path distance to the target in
/// world units, the adjacent node one step closer (`next`), the farthest turn
/// point (or the target) visible along the path (`relay`), and a unit vector
/// pointing at that relay.
#[derive(Clone, Debug)]
pub struct FlowField {
    target: usize,
    distance: Vec<f32>,
    next: Vec<usize>,
    relay: Vec<usize>,
    vectors: Vec<Vec2>,
}

impl FlowField {
    /// Run Dijkstra from `target` over `graph`.
    pub fn build(graph: &PathGridGraph, target: usize) -> Self {
        let count = graph.node_count();
        let mut field = Self {
            target,
            distance: vec![f32::INFINITY; count],
            next: vec![NO_NODE; count],
            relay: vec![NO_NODE; count],
            vectors: vec![Vec2::ZERO; count],
        };
        if target >= count {
            return field;
        }

        let step = graph.grid().step();
        // A blocked target still seeds the search; only walkable nodes join it.
        let target_walkable = graph.is_walkable(target);
        let mut edges = EdgeBuffer::new();
        let mut open = BinaryHeap::new();

        field.distance[target] = 0.0;
        field.relay[target] = target;
        open.push(State { cost: 0.0, node: target });

        while let Some(State { cost, node: from }) = open.pop() {
            if cost > field.distance[from] {
                continue;
            }
            graph.edges(from, &mut edges);
            for &(to, edge_cost) in &edges {
                if from == target && !target_walkable && !graph.is_walkable(to) {
                    continue;
                }
                let candidate = cost + edge_cost * step;
                if candidate >= field.distance[to] {
                    continue;
                }
                field.distance[to] = candidate;
                field.next[to] = from;
                let relay = field.relay[from];
                field.relay[to] = if graph.is_turn_point(from, relay) { from } else { relay };
                open.push(State { cost: candidate, node: to });
            }
        }

        for node in 0..count {
            let relay = field.relay[node];
            if node == target || relay == NO_NODE {
                continue;
            }
            field.vectors[node] = (graph.position(relay) - graph.position(node)).normalize_or_zero();
        }
        field
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn len(&self) -> usize {
        self.distance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distance.is_empty()
    }

    pub fn is_reachable(&self, node: usize) -> bool {
        self.distance.get(node).is_some_and(|d| d.is_finite())
    }

    /// Path distance to the target in world units.
    pub fn distance(&self, node: usize) -> Option<f32> {
        self.distance.get(node).copied().filter(|d| d.is_finite())
    }

    pub fn next(&self, node: usize) -> Option<usize> {
        self.next.get(node).copied().filter(|&n| n != NO_NODE)
    }

    pub fn relay(&self, node: usize) -> Option<usize> {
        self.relay.get(node).copied().filter(|&n| n != NO_NODE)
    }

    /// Zero at the target and at unreachable nodes.
    pub fn vector(&self, node: usize) -> Vec2 {
        self.vectors.get(node).copied().unwrap_or(Vec2::ZERO)
    }
}
