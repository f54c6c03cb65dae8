//! K-d tree over unit coordinates, with deletion.
//!
//! The split geometry is computed once from the full coordinate matrix and
//! never changes. Only the leaf buckets shrink as units are decided, so
//! queries on a heavily depleted tree degrade toward a scan of the remaining
//! buckets instead of failing.
//!
//! Nodes are kept in a flat arena and refer to each other by index. Every node
//! tracks how many active units live below it; queries skip empty subtrees.
//!
//! ## References
//!
//! - Bentley (1975): multidimensional binary search trees.
//! - Friedman, Bentley, Finkel (1977): branch-and-bound nearest neighbour search.

mod metric;
mod nearest;
mod store;

pub use metric::{Manhattan, Metric, SquaredEuclidean};
pub use nearest::NearestNeighbour;
pub use store::KdStore;

use ndarray::ArrayView2;
use store::Limit;

const NOT_IN_TREE: usize = usize::MAX;

/// One node of the arena.
///
/// Internal nodes have both children and an empty bucket; leaves have no
/// children.
#[derive(Debug, Clone)]
pub struct KdNode {
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
    split_dim: usize,
    split_value: f64,
    units: Vec<usize>,
    active: usize,
}

impl KdNode {
    fn new(parent: Option<usize>, active: usize) -> Self {
        Self {
            parent,
            left: None,
            right: None,
            split_dim: 0,
            split_value: 0.0,
            units: Vec::new(),
            active,
        }
    }

    /// Whether this node is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.left.is_none()
    }

    /// Parent node index (`None` for the root).
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Units currently stored in this leaf.
    pub fn units(&self) -> &[usize] {
        &self.units
    }

    /// Number of active units in this subtree.
    pub fn active(&self) -> usize {
        self.active
    }
}

/// Static-structure k-d tree with mutable leaf contents.
#[derive(Debug, Clone)]
pub struct KdTree<M = SquaredEuclidean> {
    data: Vec<f64>,
    dim: usize,
    nodes: Vec<KdNode>,
    leaf_of: Vec<usize>,
    bucket_size: usize,
    metric: M,
}

impl KdTree<SquaredEuclidean> {
    /// Build over every row of `coordinates` with the default metric.
    pub fn new(coordinates: ArrayView2<'_, f64>, bucket_size: usize) -> Self {
        let units: Vec<usize> = (0..coordinates.nrows()).collect();
        Self::with_metric(coordinates, &units, bucket_size, SquaredEuclidean)
    }

    /// Build over the rows listed in `units` with the default metric.
    pub fn with_units(
        coordinates: ArrayView2<'_, f64>,
        units: &[usize],
        bucket_size: usize,
    ) -> Self {
        Self::with_metric(coordinates, units, bucket_size, SquaredEuclidean)
    }
}

impl<M: Metric> KdTree<M> {
    /// Build over the rows listed in `units` using `metric`.
    ///
    /// # Panics
    ///
    /// Panics if a unit id is not a row of `coordinates` or is listed twice.
    pub fn with_metric(
        coordinates: ArrayView2<'_, f64>,
        units: &[usize],
        bucket_size: usize,
        metric: M,
    ) -> Self {
        let (n, dim) = coordinates.dim();
        let mut data = Vec::with_capacity(n * dim);
        for row in coordinates.rows() {
            data.extend(row.iter().copied());
        }

        let mut tree = Self {
            data,
            dim,
            nodes: Vec::new(),
            leaf_of: vec![NOT_IN_TREE; n],
            bucket_size: bucket_size.max(1),
            metric,
        };

        let mut order = units.to_vec();
        tree.build(&mut order, None);
        log::trace!(
            "kdtree: {} units, {} nodes, bucket size {}",
            units.len(),
            tree.nodes.len(),
            tree.bucket_size
        );
        tree
    }

    fn build(&mut self, units: &mut [usize], parent: Option<usize>) -> usize {
        let node = self.nodes.len();
        self.nodes.push(KdNode::new(parent, units.len()));

        let split = if units.len() > self.bucket_size {
            self.widest_dimension(units)
        } else {
            None
        };

        let Some(dim) = split else {
            for &id in units.iter() {
                assert!(
                    self.leaf_of[id] == NOT_IN_TREE,
                    "KdTree: unit {id} listed twice"
                );
                self.leaf_of[id] = node;
            }
            self.nodes[node].units = units.to_vec();
            return node;
        };

        let mid = units.len() / 2;
        units.select_nth_unstable_by(mid, |&a, &b| {
            self.coordinate(a, dim).total_cmp(&self.coordinate(b, dim))
        });
        let value = self.coordinate(units[mid], dim);

        let (lower, upper) = units.split_at_mut(mid);
        let left = self.build(lower, Some(node));
        let right = self.build(upper, Some(node));

        let n = &mut self.nodes[node];
        n.split_dim = dim;
        n.split_value = value;
        n.left = Some(left);
        n.right = Some(right);
        node
    }

    /// Dimension with the largest spread, or `None` if all points coincide.
    fn widest_dimension(&self, units: &[usize]) -> Option<usize> {
        let mut best = None;
        let mut best_spread = 0.0;
        for d in 0..self.dim {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for &id in units {
                let v = self.coordinate(id, d);
                lo = lo.min(v);
                hi = hi.max(v);
            }
            if hi - lo > best_spread {
                best_spread = hi - lo;
                best = Some(d);
            }
        }
        best
    }

    #[inline]
    fn coordinate(&self, id: usize, dim: usize) -> f64 {
        self.data[id * self.dim + dim]
    }

    /// Coordinate row of `id`.
    #[inline]
    pub fn coordinates(&self, id: usize) -> &[f64] {
        &self.data[id * self.dim..(id + 1) * self.dim]
    }

    /// Number of coordinate columns.
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Number of units still in the tree.
    pub fn len(&self) -> usize {
        self.nodes.first().map_or(0, |root| root.active)
    }

    /// Whether every unit has been removed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is still in the tree.
    pub fn contains(&self, id: usize) -> bool {
        self.leaf_of.get(id).is_some_and(|&leaf| leaf != NOT_IN_TREE)
    }

    /// The node arena (root at index 0).
    pub fn nodes(&self) -> &[KdNode] {
        &self.nodes
    }

    /// The metric in use.
    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Remove a decided unit from its leaf.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not in the tree.
    pub fn remove_unit(&mut self, id: usize) {
        assert!(self.contains(id), "KdTree::remove_unit: unit {id} not in tree");
        let leaf = self.leaf_of[id];
        self.leaf_of[id] = NOT_IN_TREE;

        let units = &mut self.nodes[leaf].units;
        if let Some(pos) = units.iter().position(|&u| u == id) {
            units.swap_remove(pos);
        }

        let mut node = Some(leaf);
        while let Some(i) = node {
            self.nodes[i].active -= 1;
            node = self.nodes[i].parent;
        }
    }

    /// The `store.k()` nearest units to `unit` (excluding itself), plus every
    /// unit tied with the k-th.
    pub fn find_neighbours(&self, store: &mut KdStore, unit: usize) {
        store.reset(Limit::Count);
        self.search(0, self.coordinates(unit), Some(unit), store, &|_: usize| 0.0);
    }

    /// The `store.k()` nearest units to an arbitrary point, plus ties.
    ///
    /// # Panics
    ///
    /// Panics if `point.len()` differs from the tree dimension.
    pub fn find_neighbours_of_point(&self, store: &mut KdStore, point: &[f64]) {
        assert_eq!(
            point.len(),
            self.dim,
            "KdTree::find_neighbours_of_point: dimension mismatch"
        );
        store.reset(Limit::Count);
        self.search(0, point, None, store, &|_: usize| 0.0);
    }

    /// Nearest units to `unit` in distance order until their cumulative
    /// `weight` reaches 1, plus every unit tied with the last one needed.
    ///
    /// If the whole tree cannot supply weight 1, every remaining unit is
    /// returned.
    pub fn find_neighbours_weighted<F>(&self, store: &mut KdStore, unit: usize, weight: F)
    where
        F: Fn(usize) -> f64,
    {
        store.reset(Limit::Weight);
        self.search(0, self.coordinates(unit), Some(unit), store, &weight);
    }

    fn search<F>(
        &self,
        node: usize,
        point: &[f64],
        exclude: Option<usize>,
        store: &mut KdStore,
        weight: &F,
    ) where
        F: Fn(usize) -> f64,
    {
        let Some(n) = self.nodes.get(node) else {
            return;
        };
        if n.active == 0 {
            return;
        }

        let (Some(left), Some(right)) = (n.left, n.right) else {
            for &id in &n.units {
                if Some(id) == exclude {
                    continue;
                }
                let d = self.metric.distance(point, self.coordinates(id));
                store.offer(id, d, weight(id));
            }
            return;
        };

        let diff = point[n.split_dim] - n.split_value;
        let (near, far) = if diff <= 0.0 { (left, right) } else { (right, left) };

        self.search(near, point, exclude, store, weight);
        if self.metric.axis_bound(diff) <= store.radius() {
            self.search(far, point, exclude, store, weight);
        }
    }
}
