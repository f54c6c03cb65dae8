//! Read-only nearest-neighbour lookups over a fixed set of units.

use ndarray::ArrayView2;

use super::{KdStore, KdTree};

/// A k-d tree plus its scratch store, for repeated 1-NN queries.
///
/// Units are never removed; this is the query surface the diagnostics use.
#[derive(Debug, Clone)]
pub struct NearestNeighbour {
    tree: KdTree,
    store: KdStore,
}

impl NearestNeighbour {
    /// Index the rows of `coordinates` listed in `units`.
    pub fn new(coordinates: ArrayView2<'_, f64>, units: &[usize], bucket_size: usize) -> Self {
        Self {
            tree: KdTree::with_units(coordinates, units, bucket_size),
            store: KdStore::new(1),
        }
    }

    /// Every indexed unit tied at the minimum distance from `point`.
    pub fn nearest_to_point(&mut self, point: &[f64]) -> &[usize] {
        self.tree.find_neighbours_of_point(&mut self.store, point);
        self.store.neighbours()
    }

    /// Distance from `point` to its nearest indexed unit
    /// (`f64::INFINITY` if nothing is indexed).
    pub fn distance_to_nearest(&mut self, point: &[f64]) -> f64 {
        self.tree.find_neighbours_of_point(&mut self.store, point);
        self.store.min_distance()
    }

    /// Number of indexed units.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn finds_ties_among_indexed_units_only() {
        let points = array![[0.0, 0.0], [1.0, 0.0], [-1.0, 0.0], [0.1, 0.0]];
        let mut nn = NearestNeighbour::new(points.view(), &[1, 2], 2);
        assert_eq!(nn.len(), 2);
        assert_eq!(nn.nearest_to_point(&[0.0, 0.0]), &[1, 2]);
        assert_eq!(nn.distance_to_nearest(&[0.0, 0.0]), 1.0);
        assert_eq!(nn.nearest_to_point(&[0.9, 0.1]), &[1]);
    }
}
