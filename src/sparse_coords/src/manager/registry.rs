//! Arena of coordinate levels.

use std::collections::HashMap;
use std::sync::Arc;

use crate::index::CoordinateIndex;
use crate::key::{Provenance, StrideKey};

/// Dense handle of a level in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LevelId(u32);

impl LevelId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One registered level. Never mutated once registered.
#[derive(Debug)]
pub(crate) struct Level<T> {
    pub key: StrideKey,
    pub index: Arc<CoordinateIndex<T>>,
    pub provenance: Provenance,
}

/// Levels addressed by [`LevelId`], plus the key lookup.
#[derive(Debug)]
pub(crate) struct Registry<T> {
    levels: Vec<Level<T>>,
    by_key: HashMap<StrideKey, LevelId>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            levels: Vec::new(),
            by_key: HashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn contains(&self, key: &StrideKey) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn id(&self, key: &StrideKey) -> Option<LevelId> {
        self.by_key.get(key).copied()
    }

    pub fn get(&self, key: &StrideKey) -> Option<&Level<T>> {
        self.id(key).map(|id| &self.levels[id.index()])
    }

    pub fn level(&self, id: LevelId) -> &Level<T> {
        &self.levels[id.index()]
    }

    /// Append a level; the key must be free.
    pub fn register(
        &mut self,
        key: StrideKey,
        index: CoordinateIndex<T>,
        provenance: Provenance,
    ) -> LevelId {
        debug_assert!(!self.by_key.contains_key(&key));
        let id = LevelId(self.levels.len() as u32);
        self.by_key.insert(key.clone(), id);
        self.levels.push(Level {
            key,
            index: Arc::new(index),
            provenance,
        });
        id
    }

    /// Levels ordered by key.
    pub fn sorted(&self) -> Vec<&Level<T>> {
        let mut levels: Vec<&Level<T>> = self.levels.iter().collect();
        levels.sort_by(|a, b| a.key.cmp(&b.key));
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::<i32>::default();
        let a = registry.register(
            StrideKey::new(vec![2, 2], ""),
            CoordinateIndex::new(2),
            Provenance::Inserted,
        );
        let b = registry.register(
            StrideKey::unit(2),
            CoordinateIndex::new(2),
            Provenance::Inserted,
        );

        assert_eq!(registry.len(), 2);
        assert_eq!(a.index(), 0);
        assert_eq!(registry.id(&StrideKey::unit(2)), Some(b));
        assert!(registry.get(&StrideKey::new(vec![4, 4], "")).is_none());
        assert_eq!(registry.level(a).key.tensor_stride(), &[2, 2]);

        let sorted: Vec<_> = registry.sorted().iter().map(|l| l.key.clone()).collect();
        assert_eq!(sorted[0], StrideKey::unit(2));
    }
}
