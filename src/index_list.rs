//! Active/inactive partition of unit ids.
//!
//! `list[0..len)` holds the active ids in arbitrary order and `reverse[id]` the
//! position of `id` in `list`. Erasing swaps the id with the last active slot,
//! so every operation is O(1).

use rand::Rng;

const INACTIVE: usize = usize::MAX;

/// O(1) maintainable set of active unit ids in `[0, capacity)`.
#[derive(Debug, Clone)]
pub struct IndexList {
    list: Vec<usize>,
    reverse: Vec<usize>,
    len: usize,
}

impl IndexList {
    /// Create a list with room for `capacity` ids, none of them active.
    pub fn new(capacity: usize) -> Self {
        Self {
            list: vec![0; capacity],
            reverse: vec![INACTIVE; capacity],
            len: 0,
        }
    }

    /// Create a list with every id active.
    pub fn filled(capacity: usize) -> Self {
        let mut idx = Self::new(capacity);
        idx.fill();
        idx
    }

    /// Activate every id `0..capacity`, in order.
    pub fn fill(&mut self) {
        for (k, (slot, rev)) in self.list.iter_mut().zip(self.reverse.iter_mut()).enumerate() {
            *slot = k;
            *rev = k;
        }
        self.len = self.list.len();
    }

    /// Activate a single id by appending it.
    ///
    /// # Panics
    ///
    /// Panics if `id >= capacity` or `id` is already active.
    pub fn set_id(&mut self, id: usize) {
        assert!(
            id < self.capacity(),
            "IndexList::set_id: id {id} out of range (capacity {})",
            self.capacity()
        );
        assert!(
            self.reverse[id] == INACTIVE,
            "IndexList::set_id: id {id} is already active"
        );
        self.list[self.len] = id;
        self.reverse[id] = self.len;
        self.len += 1;
    }

    /// Remove `id` from the active set.
    ///
    /// # Panics
    ///
    /// Panics if `id >= capacity` or `id` is not active.
    pub fn erase(&mut self, id: usize) {
        assert!(
            id < self.capacity(),
            "IndexList::erase: id {id} out of range (capacity {})",
            self.capacity()
        );
        let k = self.reverse[id];
        assert!(k != INACTIVE, "IndexList::erase: id {id} is not active");

        self.len -= 1;
        let last = self.list[self.len];
        self.list[k] = last;
        self.reverse[last] = k;
        self.reverse[id] = INACTIVE;
    }

    /// A uniformly random active id.
    ///
    /// # Panics
    ///
    /// Panics if the list is empty.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        assert!(self.len > 0, "IndexList::draw: no active ids");
        self.list[rng.random_range(0..self.len)]
    }

    /// Whether `id` is active. Out-of-range ids are never active.
    #[inline]
    pub fn exists(&self, id: usize) -> bool {
        id < self.capacity() && self.reverse[id] != INACTIVE
    }

    /// The id stored at position `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k >= len()`.
    #[inline]
    pub fn get_id(&self, k: usize) -> usize {
        assert!(
            k < self.len,
            "IndexList::get_id: position {k} out of range (len {})",
            self.len
        );
        self.list[k]
    }

    /// The position of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id >= capacity` or `id` is not active.
    #[inline]
    pub fn get_k(&self, id: usize) -> usize {
        assert!(
            id < self.capacity(),
            "IndexList::get_k: id {id} out of range (capacity {})",
            self.capacity()
        );
        let k = self.reverse[id];
        assert!(k != INACTIVE, "IndexList::get_k: id {id} is not active");
        k
    }

    /// First active id, if any.
    pub fn first(&self) -> Option<usize> {
        self.as_slice().first().copied()
    }

    /// Last active id, if any.
    pub fn last(&self) -> Option<usize> {
        self.as_slice().last().copied()
    }

    /// Number of active ids.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no id is active.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total number of ids the list can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.list.len()
    }

    /// Active ids in list order.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.list[..self.len]
    }

    /// Iterate over the active ids in list order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.as_slice().iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn fill_activates_everything_in_order() {
        let idx = IndexList::filled(5);
        assert_eq!(idx.len(), 5);
        assert_eq!(idx.as_slice(), &[0, 1, 2, 3, 4]);
        assert!((0..5).all(|id| idx.exists(id)));
        assert!(!idx.exists(5));
    }

    #[test]
    fn erase_swaps_last_into_hole() {
        let mut idx = IndexList::filled(5);
        idx.erase(1);
        assert_eq!(idx.as_slice(), &[0, 4, 2, 3]);
        assert!(!idx.exists(1));
        assert_eq!(idx.get_k(4), 1);

        idx.erase(3);
        assert_eq!(idx.as_slice(), &[0, 4, 2]);
        for k in 0..idx.len() {
            assert_eq!(idx.get_k(idx.get_id(k)), k);
        }
    }

    #[test]
    fn set_id_builds_partial_lists() {
        let mut idx = IndexList::new(4);
        assert!(idx.is_empty());
        idx.set_id(3);
        idx.set_id(1);
        assert_eq!(idx.as_slice(), &[3, 1]);
        assert_eq!(idx.first(), Some(3));
        assert_eq!(idx.last(), Some(1));
        assert!(!idx.exists(0));
    }

    #[test]
    #[should_panic(expected = "is not active")]
    fn double_erase_panics() {
        let mut idx = IndexList::filled(3);
        idx.erase(2);
        idx.erase(2);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn erase_out_of_range_panics() {
        let mut idx = IndexList::filled(3);
        idx.erase(3);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn get_id_past_len_panics() {
        let mut idx = IndexList::filled(3);
        idx.erase(0);
        idx.get_id(2);
    }

    #[test]
    fn draw_only_returns_active_ids() {
        let mut idx = IndexList::filled(10);
        for id in [0, 2, 4, 6, 8] {
            idx.erase(id);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut seen = [false; 10];
        for _ in 0..500 {
            let id = idx.draw(&mut rng);
            assert!(idx.exists(id));
            seen[id] = true;
        }
        assert!([1, 3, 5, 7, 9].iter().all(|&id| seen[id]));
    }
}
