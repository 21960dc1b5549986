use nalgebra::Point3;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

// Wrapper for RTree
struct IndexedPoint(usize, [f64; 3]);

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.1)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.1[0] - point[0];
        let dy = self.1[1] - point[1];
        let dz = self.1[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Exact Euclidean nearest-neighbour index over a fixed point set.
pub struct NearestNeighbors {
    tree: RTree<IndexedPoint>,
}

impl NearestNeighbors {
    pub fn new(points: &[Point3<f64>]) -> Self {
        let wrappers = points
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint(i, [p.x, p.y, p.z]))
            .collect();
        Self {
            tree: RTree::bulk_load(wrappers),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Index of the nearest point and its squared distance.
    pub fn nearest(&self, query: &Point3<f64>) -> Option<(usize, f64)> {
        let q = [query.x, query.y, query.z];
        self.tree
            .nearest_neighbor(&q)
            .map(|found| (found.0, found.distance_2(&q)))
    }
}
