//! Vector Buffer
//!
//! Contiguous fixed-stride storage for unit vectors with stable ids.

use hashbrown::HashMap;

use super::normalize::UnitVector;

/// Row-major vector storage
///
/// Slot `i` occupies `data[i * dim..(i + 1) * dim]`. Removal swaps the last
/// row into the hole, so slots are dense but not stable; ids are stable and
/// resolve through `slots`.
#[derive(Debug, Clone)]
pub struct VectorBuffer {
    dim: usize,
    /// Concatenated rows of length `dim`
    data: Vec<f32>,
    /// Slot -> id
    ids: Vec<u64>,
    /// Id -> slot, rewritten on every swap
    slots: HashMap<u64, usize>,
}

impl VectorBuffer {
    /// Create an empty buffer for vectors of length `dim`
    pub fn new(dim: usize) -> Self {
        Self::with_capacity(dim, 0)
    }

    /// Create an empty buffer with room for `capacity` vectors
    pub fn with_capacity(dim: usize, capacity: usize) -> Self {
        Self {
            dim,
            data: Vec::with_capacity(dim * capacity),
            ids: Vec::with_capacity(capacity),
            slots: HashMap::with_capacity(capacity),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Vectors that fit before the next reallocation
    pub fn capacity(&self) -> usize {
        if self.dim == 0 {
            return self.ids.capacity();
        }
        self.data.capacity() / self.dim
    }

    pub fn contains(&self, id: u64) -> bool {
        self.slots.contains_key(&id)
    }

    /// Current slot of `id`
    pub fn slot_of(&self, id: u64) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    /// Id stored at `slot`
    pub fn id_at(&self, slot: usize) -> Option<u64> {
        self.ids.get(slot).copied()
    }

    /// Ids in slot order
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// Vector view for `slot`
    #[inline]
    pub fn get(&self, slot: usize) -> Option<&[f32]> {
        if slot >= self.len() {
            return None;
        }
        let start = slot * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    /// Rows `start..end` as one contiguous slice
    #[inline]
    pub fn rows(&self, start: usize, end: usize) -> &[f32] {
        &self.data[start * self.dim..end * self.dim]
    }

    /// All rows as one contiguous slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Append a vector, returning its slot.
    ///
    /// The caller guarantees `id` is absent and `vector.dim() == self.dim()`.
    pub fn append(&mut self, id: u64, vector: &UnitVector) -> usize {
        debug_assert_eq!(vector.dim(), self.dim);
        debug_assert!(!self.slots.contains_key(&id));

        let slot = self.ids.len();
        // Vec growth is amortized doubling
        self.data.extend_from_slice(vector.as_slice());
        self.ids.push(id);
        self.slots.insert(id, slot);
        slot
    }

    /// Remove `id`, returning the slot it vacated.
    pub fn remove(&mut self, id: u64) -> Option<usize> {
        let slot = self.slot_of(id)?;
        self.remove_slot(slot);
        Some(slot)
    }

    /// Swap-remove the vector at `slot`, returning its id.
    ///
    /// The previous last row moves into `slot` and its id is remapped.
    pub fn remove_slot(&mut self, slot: usize) -> Option<u64> {
        let len = self.len();
        if slot >= len {
            return None;
        }

        let last = len - 1;
        if slot != last {
            let src = last * self.dim;
            self.data
                .copy_within(src..src + self.dim, slot * self.dim);
        }
        self.data.truncate(last * self.dim);

        let removed = self.ids.swap_remove(slot);
        self.slots.remove(&removed);
        if slot != last {
            let moved = self.ids[slot];
            self.slots.insert(moved, slot);
        }
        Some(removed)
    }

    /// Reserve room for `additional` more vectors
    pub fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional * self.dim);
        self.ids.reserve(additional);
        self.slots.reserve(additional);
    }

    /// Release excess capacity
    pub fn shrink_to_fit(&mut self) {
        self.data.shrink_to_fit();
        self.ids.shrink_to_fit();
        self.slots.shrink_to_fit();
    }

    /// Drop every vector, keeping the dimension
    pub fn clear(&mut self) {
        self.data.clear();
        self.ids.clear();
        self.slots.clear();
    }

    /// Bytes held by vector rows
    pub fn memory_bytes(&self) -> usize {
        self.data.capacity() * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(v: &[f32]) -> UnitVector {
        UnitVector::from_stored(v.to_vec())
    }

    fn filled() -> VectorBuffer {
        let mut buffer = VectorBuffer::new(2);
        buffer.append(10, &unit(&[1.0, 0.0]));
        buffer.append(20, &unit(&[0.0, 1.0]));
        buffer.append(30, &unit(&[0.6, 0.8]));
        buffer
    }

    #[test]
    fn test_append_and_get() {
        let buffer = filled();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.get(1), Some(&[0.0, 1.0][..]));
        assert_eq!(buffer.get(3), None);
        assert_eq!(buffer.slot_of(30), Some(2));
        assert_eq!(buffer.id_at(0), Some(10));
        assert_eq!(buffer.rows(1, 3), &[0.0, 1.0, 0.6, 0.8]);
    }

    #[test]
    fn test_swap_remove_remaps_last() {
        let mut buffer = filled();

        assert_eq!(buffer.remove(10), Some(0));
        assert_eq!(buffer.len(), 2);
        assert!(!buffer.contains(10));

        // Last row moved into the vacated slot
        assert_eq!(buffer.slot_of(30), Some(0));
        assert_eq!(buffer.get(0), Some(&[0.6, 0.8][..]));
        assert_eq!(buffer.slot_of(20), Some(1));
        assert_eq!(buffer.ids(), &[30, 20]);
    }

    #[test]
    fn test_remove_last_slot() {
        let mut buffer = filled();
        assert_eq!(buffer.remove_slot(2), Some(30));
        assert_eq!(buffer.ids(), &[10, 20]);
        assert_eq!(buffer.as_slice(), &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_remove_missing() {
        let mut buffer = filled();
        assert_eq!(buffer.remove(99), None);
        assert_eq!(buffer.remove_slot(3), None);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_growth_and_shrink() {
        let mut buffer = VectorBuffer::new(4);
        let v = unit(&[0.5, 0.5, 0.5, 0.5]);
        for id in 0..1000 {
            buffer.append(id, &v);
        }
        assert_eq!(buffer.len(), 1000);
        assert!(buffer.capacity() >= 1000);

        for id in 0..900 {
            buffer.remove(id);
        }
        buffer.shrink_to_fit();
        assert_eq!(buffer.len(), 100);
        assert!(buffer.memory_bytes() >= 100 * 4 * 4);
        for id in 900..1000 {
            let slot = buffer.slot_of(id).unwrap();
            assert_eq!(buffer.id_at(slot), Some(id));
        }
    }

    #[test]
    fn test_clear() {
        let mut buffer = filled();
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.dim(), 2);
        assert!(!buffer.contains(20));
    }
}
