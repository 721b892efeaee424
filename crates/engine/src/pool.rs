//! Named, growable pools of reusable objects.
//!
//! Slot bookkeeping lives in a metadata table parallel to the stored objects,
//! so pooled types only need to know how to [`Poolable::reset`] themselves.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use thiserror::Error;
use tracing::info;

use crate::vector::Vec2;

pub const VEC2_POOL: &str = "vec2";
pub const DEFAULT_VEC2_POOL_SIZE: usize = 500;

pub trait Poolable {
    /// Restores the object to its freshly constructed state. Called on acquisition.
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    pool: PoolId,
    index: u32,
}

impl PoolHandle {
    pub fn pool(self) -> PoolId {
        self.pool
    }

    pub fn index(self) -> usize {
        self.index as usize
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("unknown pool `{name}`")]
    UnknownPool { name: String },
    #[error("pool `{name}` is already allocated")]
    DuplicatePool { name: String },
    #[error("too many pools registered (limit {limit})")]
    TooManyPools { limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotMeta {
    available: bool,
}

pub struct Pool<T> {
    name: String,
    items: Vec<T>,
    meta: Vec<SlotMeta>,
    factory: fn() -> T,
}

impl<T: Poolable> Pool<T> {
    fn new(name: &str, factory: fn() -> T, count: usize) -> Self {
        let mut pool = Self {
            name: name.to_string(),
            items: Vec::with_capacity(count),
            meta: Vec::with_capacity(count),
            factory,
        };
        pool.grow_to(count);
        pool
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    pub fn in_use(&self) -> usize {
        self.meta.iter().filter(|slot| !slot.available).count()
    }

    fn grow_to(&mut self, target: usize) {
        while self.items.len() < target {
            self.items.push((self.factory)());
            self.meta.push(SlotMeta { available: true });
        }
    }

    /// First available slot wins. A full pool doubles and the scan runs once more.
    fn acquire(&mut self) -> usize {
        if let Some(index) = self.first_available() {
            return self.claim(index);
        }

        let previous = self.capacity();
        let next = (previous * 2).max(1);
        self.grow_to(next);
        info!(
            pool = self.name.as_str(),
            previous_capacity = previous,
            capacity = next,
            "pool_grown"
        );

        // Doubling always adds at least one free slot.
        let index = self.first_available().unwrap_or(previous);
        self.claim(index)
    }

    fn first_available(&self) -> Option<usize> {
        self.meta.iter().position(|slot| slot.available)
    }

    fn claim(&mut self, index: usize) -> usize {
        self.meta[index].available = false;
        self.items[index].reset();
        index
    }

    fn release(&mut self, index: usize) -> bool {
        match self.meta.get_mut(index) {
            Some(slot) if !slot.available => {
                slot.available = true;
                true
            }
            _ => false,
        }
    }

    fn is_available(&self, index: usize) -> Option<bool> {
        self.meta.get(index).map(|slot| slot.available)
    }
}

/// Registry of pools addressed by name.
pub struct PoolRegistry<T> {
    pools: Vec<Pool<T>>,
    ids_by_name: HashMap<String, PoolId>,
}

impl<T> Default for PoolRegistry<T> {
    fn default() -> Self {
        Self {
            pools: Vec::new(),
            ids_by_name: HashMap::new(),
        }
    }
}

impl<T: Poolable> PoolRegistry<T> {
    pub fn allocate(
        &mut self,
        name: &str,
        factory: fn() -> T,
        count: usize,
    ) -> Result<PoolId, PoolError> {
        if self.ids_by_name.contains_key(name) {
            return Err(PoolError::DuplicatePool {
                name: name.to_string(),
            });
        }
        let raw = u16::try_from(self.pools.len()).map_err(|_| PoolError::TooManyPools {
            limit: u16::MAX as usize,
        })?;
        let id = PoolId(raw);
        self.pools.push(Pool::new(name, factory, count));
        self.ids_by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn id_of(&self, name: &str) -> Result<PoolId, PoolError> {
        self.ids_by_name
            .get(name)
            .copied()
            .ok_or_else(|| PoolError::UnknownPool {
                name: name.to_string(),
            })
    }

    /// Acquires a reset object from the named pool.
    pub fn get(&mut self, name: &str) -> Result<PoolHandle, PoolError> {
        let id = self.id_of(name)?;
        Ok(self.acquire(id))
    }

    pub fn acquire(&mut self, id: PoolId) -> PoolHandle {
        let pool = &mut self.pools[id.0 as usize];
        let index = pool.acquire();
        PoolHandle {
            pool: id,
            index: index as u32,
        }
    }

    /// Returns the slot to its pool. Unknown or already free handles are ignored.
    pub fn free(&mut self, handle: PoolHandle) -> bool {
        self.pools
            .get_mut(handle.pool.0 as usize)
            .is_some_and(|pool| pool.release(handle.index()))
    }

    pub fn is_acquired(&self, handle: PoolHandle) -> bool {
        self.pools
            .get(handle.pool.0 as usize)
            .and_then(|pool| pool.is_available(handle.index()))
            .is_some_and(|available| !available)
    }

    pub fn try_get(&self, handle: PoolHandle) -> Option<&T> {
        self.pools
            .get(handle.pool.0 as usize)
            .and_then(|pool| pool.items.get(handle.index()))
    }

    pub fn capacity(&self, name: &str) -> Result<usize, PoolError> {
        let id = self.id_of(name)?;
        Ok(self.pools[id.0 as usize].capacity())
    }

    pub fn in_use(&self, name: &str) -> Result<usize, PoolError> {
        let id = self.id_of(name)?;
        Ok(self.pools[id.0 as usize].in_use())
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pool<T>> {
        self.pools.iter()
    }
}

impl<T> Index<PoolHandle> for PoolRegistry<T> {
    type Output = T;

    fn index(&self, handle: PoolHandle) -> &T {
        &self.pools[handle.pool.0 as usize].items[handle.index()]
    }
}

impl<T> IndexMut<PoolHandle> for PoolRegistry<T> {
    fn index_mut(&mut self, handle: PoolHandle) -> &mut T {
        &mut self.pools[handle.pool.0 as usize].items[handle.index()]
    }
}

pub type VectorPool = PoolRegistry<Vec2>;

impl VectorPool {
    /// Registry with the shared `vec2` pool already allocated.
    pub fn with_vec2_pool(count: usize) -> Self {
        let mut registry = Self::default();
        // A fresh registry has no pools, so this cannot collide.
        let _ = registry.allocate(VEC2_POOL, Vec2::default, count);
        registry
    }

    pub fn vec2(&mut self) -> Result<PoolHandle, PoolError> {
        self.get(VEC2_POOL)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        value: u32,
        resets: u32,
    }

    impl Poolable for Counter {
        fn reset(&mut self) {
            self.value = 0;
            self.resets += 1;
        }
    }

    #[test]
    fn get_returns_first_available_and_resets() {
        let mut registry = PoolRegistry::<Counter>::default();
        registry
            .allocate("counters", Counter::default, 2)
            .expect("allocate");

        let first = registry.get("counters").expect("first");
        registry[first].value = 42;
        let second = registry.get("counters").expect("second");
        assert_ne!(first, second);
        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);

        assert!(registry.free(first));
        assert_eq!(registry[first].value, 42, "free must not reset eagerly");

        let again = registry.get("counters").expect("again");
        assert_eq!(again, first);
        assert_eq!(registry[again].value, 0);
        assert_eq!(registry[again].resets, 2);
    }

    #[test]
    fn exhausted_pool_doubles_without_handing_out_duplicates() {
        let mut registry = PoolRegistry::<Counter>::default();
        registry
            .allocate("small", Counter::default, 3)
            .expect("allocate");

        let mut seen = HashSet::new();
        for _ in 0..10 {
            let handle = registry.get("small").expect("acquire");
            assert!(seen.insert(handle), "slot handed out twice");
        }

        assert_eq!(registry.capacity("small").expect("capacity"), 12);
        assert_eq!(registry.in_use("small").expect("in use"), 10);
    }

    #[test]
    fn empty_pool_grows_from_zero() {
        let mut registry = PoolRegistry::<Counter>::default();
        registry
            .allocate("empty", Counter::default, 0)
            .expect("allocate");
        let handle = registry.get("empty").expect("acquire");
        assert_eq!(handle.index(), 0);
        assert_eq!(registry.capacity("empty").expect("capacity"), 1);
    }

    #[test]
    fn unknown_pool_fails_fast() {
        let mut registry = PoolRegistry::<Counter>::default();
        assert_eq!(
            registry.get("missing"),
            Err(PoolError::UnknownPool {
                name: "missing".to_string()
            })
        );
    }

    #[test]
    fn duplicate_allocate_is_rejected() {
        let mut registry = PoolRegistry::<Counter>::default();
        registry.allocate("a", Counter::default, 1).expect("first");
        assert!(matches!(
            registry.allocate("a", Counter::default, 1),
            Err(PoolError::DuplicatePool { .. })
        ));
    }

    #[test]
    fn double_free_and_foreign_handle_are_noops() {
        let mut registry = PoolRegistry::<Counter>::default();
        registry.allocate("a", Counter::default, 1).expect("allocate");
        let handle = registry.get("a").expect("acquire");

        assert!(registry.free(handle));
        assert!(!registry.free(handle));

        let foreign = PoolHandle {
            pool: PoolId(9),
            index: 0,
        };
        assert!(!registry.free(foreign));
        assert!(!registry.is_acquired(foreign));
    }

    #[test]
    fn vec2_registry_is_preallocated() {
        let mut vectors = VectorPool::with_vec2_pool(DEFAULT_VEC2_POOL_SIZE);
        assert_eq!(
            vectors.capacity(VEC2_POOL).expect("capacity"),
            DEFAULT_VEC2_POOL_SIZE
        );
        let handle = vectors.vec2().expect("vec2");
        vectors[handle].set(1.0, 2.0);
        assert!(vectors.is_acquired(handle));
        assert_eq!(vectors[handle], Vec2::new(1.0, 2.0));
    }
}
