//! Scratch state for one neighbour query.
//!
//! A `KdStore` is owned by the caller and handed to every query as `&mut`.
//! Its buffers are cleared between queries but keep their allocation, so a
//! run issuing one query per decided unit allocates only while the buffers
//! grow.

/// How a query decides it has collected enough neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Limit {
    /// The `k` nearest, plus everything tied with the k-th.
    Count,
    /// The nearest units until their cumulative weight reaches 1, plus ties.
    Weight,
}

/// Caller-owned neighbour query context.
#[derive(Debug, Clone)]
pub struct KdStore {
    k: usize,
    limit: Limit,
    neighbours: Vec<usize>,
    distances: Vec<f64>,
    weights: Vec<f64>,
    cut: Option<usize>,
}

impl Default for KdStore {
    fn default() -> Self {
        Self::new(1)
    }
}

impl KdStore {
    /// A store for `k`-nearest-neighbour queries. `k == 0` is treated as 1.
    pub fn new(k: usize) -> Self {
        Self::with_capacity(k, k.max(1))
    }

    /// Like [`KdStore::new`], with room for `capacity` neighbours up front.
    pub fn with_capacity(k: usize, capacity: usize) -> Self {
        Self {
            k: k.max(1),
            limit: Limit::Count,
            neighbours: Vec::with_capacity(capacity),
            distances: Vec::with_capacity(capacity),
            weights: Vec::with_capacity(capacity),
            cut: None,
        }
    }

    /// Requested number of neighbours for count-limited queries.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Change the requested number of neighbours. `k == 0` is treated as 1.
    pub fn set_k(&mut self, k: usize) {
        self.k = k.max(1);
    }

    /// Neighbours found by the last query, nearest first (ties by id).
    pub fn neighbours(&self) -> &[usize] {
        &self.neighbours
    }

    /// Distances matching [`KdStore::neighbours`].
    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    /// Number of neighbours held.
    pub fn len(&self) -> usize {
        self.neighbours.len()
    }

    /// Whether the last query found nothing.
    pub fn is_empty(&self) -> bool {
        self.neighbours.is_empty()
    }

    /// Distance to the nearest neighbour, `f64::INFINITY` when empty.
    pub fn min_distance(&self) -> f64 {
        self.distances.first().copied().unwrap_or(f64::INFINITY)
    }

    /// Distance to the farthest kept neighbour, `f64::INFINITY` when empty.
    pub fn max_distance(&self) -> f64 {
        self.distances.last().copied().unwrap_or(f64::INFINITY)
    }

    /// Number of neighbours tied at the minimum distance.
    pub fn tied_at_min(&self) -> usize {
        let min = self.min_distance();
        self.distances.iter().take_while(|&&d| d == min).count()
    }

    pub(crate) fn clear(&mut self) {
        self.reset(Limit::Count);
    }

    pub(crate) fn reset(&mut self, limit: Limit) {
        self.limit = limit;
        self.neighbours.clear();
        self.distances.clear();
        self.weights.clear();
        self.cut = None;
    }

    /// Current pruning radius: candidates farther than this cannot enter.
    #[inline]
    pub(crate) fn radius(&self) -> f64 {
        match self.cut {
            Some(c) => self.distances[c],
            None => f64::INFINITY,
        }
    }

    /// Offer a candidate; kept if it is within the current radius.
    pub(crate) fn offer(&mut self, id: usize, distance: f64, weight: f64) {
        if distance > self.radius() {
            return;
        }

        let mut lo = 0;
        let mut hi = self.neighbours.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let before = self.distances[mid] < distance
                || (self.distances[mid] == distance && self.neighbours[mid] < id);
            if before {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        self.neighbours.insert(lo, id);
        self.distances.insert(lo, distance);
        self.weights.insert(lo, weight);

        self.update_cut();
    }

    fn update_cut(&mut self) {
        self.cut = match self.limit {
            Limit::Count => (self.neighbours.len() >= self.k).then_some(self.k - 1),
            Limit::Weight => {
                let mut total = 0.0;
                self.weights.iter().position(|&w| {
                    total += w;
                    total >= 1.0
                })
            }
        };

        if let Some(c) = self.cut {
            let radius = self.distances[c];
            let keep = c + 1 + self.distances[c + 1..]
                .iter()
                .take_while(|&&d| d <= radius)
                .count();
            self.neighbours.truncate(keep);
            self.distances.truncate(keep);
            self.weights.truncate(keep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_limit_keeps_ties_with_kth() {
        let mut store = KdStore::new(2);
        store.reset(Limit::Count);
        store.offer(5, 3.0, 0.0);
        store.offer(1, 1.0, 0.0);
        assert_eq!(store.radius(), 3.0);
        store.offer(7, 3.0, 0.0);
        store.offer(2, 2.0, 0.0);
        // 1 @ 1.0 and 2 @ 2.0 are the two nearest; the 3.0 entries fall out.
        assert_eq!(store.neighbours(), &[1, 2]);
        store.offer(9, 2.0, 0.0);
        assert_eq!(store.neighbours(), &[1, 2, 9]);
        store.offer(0, 4.0, 0.0);
        assert_eq!(store.len(), 3);
        assert_eq!(store.min_distance(), 1.0);
        assert_eq!(store.max_distance(), 2.0);
    }

    #[test]
    fn weight_limit_stops_once_mass_reaches_one() {
        let mut store = KdStore::default();
        store.reset(Limit::Weight);
        store.offer(3, 1.0, 0.4);
        store.offer(4, 2.0, 0.4);
        assert_eq!(store.radius(), f64::INFINITY);
        store.offer(6, 3.0, 0.4);
        assert_eq!(store.radius(), 3.0);
        store.offer(8, 5.0, 0.9);
        assert_eq!(store.neighbours(), &[3, 4, 6]);
        store.offer(2, 0.5, 0.9);
        assert_eq!(store.neighbours(), &[2, 3]);
    }

    #[test]
    fn ties_are_ordered_by_id() {
        let mut store = KdStore::new(3);
        store.reset(Limit::Count);
        store.offer(8, 1.0, 0.0);
        store.offer(2, 1.0, 0.0);
        store.offer(5, 1.0, 0.0);
        assert_eq!(store.neighbours(), &[2, 5, 8]);
        assert_eq!(store.tied_at_min(), 3);
    }
}
