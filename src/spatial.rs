//! Nearest-neighbour lookups over fixed point sets (graph nodes, turbines,
//! nests, roosts). Each index is bulk-loaded once and never mutated.

use rstar::{primitives::GeomWithData, PointDistance, RTree};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: Position) -> Position {
        Position::new(0.5 * (self.x + other.x), 0.5 * (self.y + other.y))
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    fn as_array(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// R-tree over a point list; entries carry their position in that list.
pub struct SpatialIndex {
    tree: RTree<IndexedPoint>,
    len: usize,
}

impl SpatialIndex {
    pub fn build(points: &[Position]) -> Self {
        let entries: Vec<IndexedPoint> = points
            .iter()
            .enumerate()
            .map(|(idx, p)| GeomWithData::new(p.as_array(), idx))
            .collect();
        Self {
            len: entries.len(),
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the closest point, or `None` when the set is empty.
    pub fn nearest(&self, pos: Position) -> Option<usize> {
        self.tree
            .nearest_neighbor(&pos.as_array())
            .map(|entry| entry.data)
    }

    /// True when some point lies strictly closer than `radius`.
    pub fn any_within(&self, pos: Position, radius: f64) -> bool {
        if self.is_empty() || radius <= 0.0 {
            return false;
        }
        let query = pos.as_array();
        let radius_sq = radius * radius;
        self.tree
            .locate_within_distance(query, radius_sq)
            .any(|entry| entry.geom().distance_2(&query) < radius_sq)
    }
}
