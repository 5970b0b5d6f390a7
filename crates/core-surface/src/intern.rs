//! Byte-string intern pool with mark/sweep reclamation.
//!
//! Cells reference long clusters and patch records by [`Handle`]. Handles
//! are indices into a slot vector and stay stable across growth and GC of
//! the probe table, so cells never need rewriting when the pool reorganizes.
//!
//! Growth rule: when occupancy exceeds ¾ of the probe table, the owning
//! surface first runs a GC pass (marking every handle a live cell still
//! references); only if the pool stays crowded does the table double.
//!
//! The digest is a fixed-seed `ahash` folded to 32 bits; collisions resolve
//! by linear probing.

use std::hash::BuildHasher;

const EMPTY: u32 = u32::MAX;
const INITIAL_BUCKETS: usize = 16;

/// Stable reference to a pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct Slot<V> {
    key: Box<[u8]>,
    hash: u32,
    marked: bool,
    value: V,
}

#[derive(Debug, Clone)]
pub struct Pool<V> {
    hasher: ahash::RandomState,
    slots: Vec<Option<Slot<V>>>,
    free: Vec<u32>,
    buckets: Vec<u32>,
    count: usize,
}

impl<V> Default for Pool<V> {
    fn default() -> Self {
        Pool::new()
    }
}

impl<V> Pool<V> {
    pub fn new() -> Self {
        Pool {
            // Fixed seeds: the digest must be stable for the lifetime of the
            // pool, nothing more.
            hasher: ahash::RandomState::with_seeds(0x6b65, 0x7270, 0x6169, 0x746e),
            slots: Vec::new(),
            free: Vec::new(),
            buckets: vec![EMPTY; INITIAL_BUCKETS],
            count: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn digest(&self, key: &[u8]) -> u32 {
        let h = self.hasher.hash_one(key);
        (h ^ (h >> 32)) as u32
    }

    /// Occupancy check backing the gc-then-grow policy.
    pub fn is_crowded(&self) -> bool {
        self.count * 4 > self.buckets.len() * 3
    }

    /// Existing handle for `key`, if any.
    pub fn get(&self, key: &[u8]) -> Option<Handle> {
        let hash = self.digest(key);
        let mask = self.buckets.len() - 1;
        let mut i = hash as usize & mask;
        loop {
            let slot_idx = self.buckets[i];
            if slot_idx == EMPTY {
                return None;
            }
            if let Some(slot) = &self.slots[slot_idx as usize] {
                if slot.hash == hash && *slot.key == *key {
                    return Some(Handle(slot_idx));
                }
            }
            i = (i + 1) & mask;
        }
    }

    /// Handle for `key`, allocating a slot with `make` when absent.
    pub fn ensure(&mut self, key: &[u8], make: impl FnOnce() -> V) -> Handle {
        if let Some(h) = self.get(key) {
            return h;
        }
        let hash = self.digest(key);
        let slot = Slot {
            key: key.to_vec().into_boxed_slice(),
            hash,
            marked: false,
            value: make(),
        };
        let slot_idx = match self.free.pop() {
            Some(i) => {
                self.slots[i as usize] = Some(slot);
                i
            }
            None => {
                self.slots.push(Some(slot));
                (self.slots.len() - 1) as u32
            }
        };
        self.insert_bucket(hash, slot_idx);
        self.count += 1;
        Handle(slot_idx)
    }

    fn insert_bucket(&mut self, hash: u32, slot_idx: u32) {
        let mask = self.buckets.len() - 1;
        let mut i = hash as usize & mask;
        while self.buckets[i] != EMPTY {
            i = (i + 1) & mask;
        }
        self.buckets[i] = slot_idx;
    }

    pub fn key(&self, h: Handle) -> &[u8] {
        self.slots[h.idx()].as_ref().map(|s| &*s.key).unwrap_or(&[])
    }

    pub fn value(&self, h: Handle) -> Option<&V> {
        self.slots[h.idx()].as_ref().map(|s| &s.value)
    }

    /// Mark/sweep: everything not in `live` is dropped.
    pub fn gc(&mut self, live: impl IntoIterator<Item = Handle>) {
        for slot in self.slots.iter_mut().flatten() {
            slot.marked = false;
        }
        for h in live {
            if let Some(slot) = self.slots.get_mut(h.idx()).and_then(Option::as_mut) {
                slot.marked = true;
            }
        }
        let before = self.count;
        for (i, entry) in self.slots.iter_mut().enumerate() {
            if matches!(entry, Some(s) if !s.marked) {
                *entry = None;
                self.free.push(i as u32);
                self.count -= 1;
            }
        }
        if self.count != before {
            tracing::trace!(dropped = before - self.count, kept = self.count, "intern gc");
        }
        self.rebuild_buckets(self.buckets.len());
    }

    /// Double the probe table.
    pub fn grow(&mut self) {
        self.rebuild_buckets(self.buckets.len() * 2);
    }

    fn rebuild_buckets(&mut self, size: usize) {
        self.buckets.clear();
        self.buckets.resize(size, EMPTY);
        let mask = size - 1;
        for idx in 0..self.slots.len() {
            let hash = match &self.slots[idx] {
                Some(s) => s.hash,
                None => continue,
            };
            let mut i = hash as usize & mask;
            while self.buckets[i] != EMPTY {
                i = (i + 1) & mask;
            }
            self.buckets[i] = idx as u32;
        }
    }
}
