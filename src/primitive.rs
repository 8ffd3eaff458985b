//! Primitive stat stores.
//!
//! Primitive stats are owned by the surrounding equipment, buff and
//! passive systems. The engine only reads them through `PrimitiveStore`.

use crate::stat_id::StatId;
use std::collections::HashMap;

/// Read access to externally owned primitive stat values.
///
/// Unknown stats read as 0.
pub trait PrimitiveStore {
    /// Get the current value of a primitive stat.
    fn primitive(&self, id: StatId) -> i64;
}

/// Write access, for stores that let the engine apply a change on the
/// owner's behalf (see `Evaluator::set_primitive`).
pub trait PrimitiveStoreMut: PrimitiveStore {
    /// Overwrite a primitive stat value.
    fn set_primitive(&mut self, id: StatId, value: i64);
}

impl<T: PrimitiveStore + ?Sized> PrimitiveStore for &T {
    fn primitive(&self, id: StatId) -> i64 {
        (**self).primitive(id)
    }
}

/// A dense primitive table with one slot per stat.
///
/// # Examples
///
/// ```rust
/// use vstat::{DensePrimitives, PrimitiveStore, StatId};
/// use vstat::primitive::PrimitiveStoreMut;
///
/// let mut store = DensePrimitives::new(8);
/// store.set_primitive(StatId::new(2), 40);
///
/// assert_eq!(store.primitive(StatId::new(2)), 40);
/// assert_eq!(store.primitive(StatId::new(100)), 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DensePrimitives {
    values: Vec<i64>,
}

impl DensePrimitives {
    /// Create a zeroed table for `stat_count` stats.
    pub fn new(stat_count: usize) -> Self {
        Self {
            values: vec![0; stat_count],
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PrimitiveStore for DensePrimitives {
    fn primitive(&self, id: StatId) -> i64 {
        self.values.get(id.index()).copied().unwrap_or(0)
    }
}

impl PrimitiveStoreMut for DensePrimitives {
    /// Writes outside the table are ignored.
    fn set_primitive(&mut self, id: StatId, value: i64) {
        if let Some(slot) = self.values.get_mut(id.index()) {
            *slot = value;
        }
    }
}

/// A sparse primitive store backed by a `HashMap`.
///
/// Useful for tests and for actors that only carry a handful of
/// non-zero primitives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapPrimitives {
    values: HashMap<StatId, i64>,
}

impl MapPrimitives {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, builder style.
    pub fn with(mut self, id: StatId, value: i64) -> Self {
        self.values.insert(id, value);
        self
    }
}

impl FromIterator<(StatId, i64)> for MapPrimitives {
    fn from_iter<I: IntoIterator<Item = (StatId, i64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl PrimitiveStore for MapPrimitives {
    fn primitive(&self, id: StatId) -> i64 {
        self.values.get(&id).copied().unwrap_or(0)
    }
}

impl PrimitiveStoreMut for MapPrimitives {
    fn set_primitive(&mut self, id: StatId, value: i64) {
        self.values.insert(id, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_primitives() {
        let mut store = DensePrimitives::new(4);
        assert_eq!(store.len(), 4);
        store.set_primitive(StatId::new(1), 7);
        store.set_primitive(StatId::new(9), 7);
        assert_eq!(store.primitive(StatId::new(1)), 7);
        assert_eq!(store.primitive(StatId::new(9)), 0);
        assert!(DensePrimitives::default().is_empty());
    }

    #[test]
    fn test_map_primitives() {
        let store: MapPrimitives = [(StatId::new(3), 12), (StatId::new(5), -4)]
            .into_iter()
            .collect();
        assert_eq!(store.primitive(StatId::new(3)), 12);
        assert_eq!(store.primitive(StatId::new(5)), -4);
        assert_eq!(store.primitive(StatId::new(4)), 0);
    }

    #[test]
    fn test_store_by_reference() {
        let store = MapPrimitives::new().with(StatId::new(0), 3);
        let by_ref = &store;
        assert_eq!(PrimitiveStore::primitive(&by_ref, StatId::new(0)), 3);
    }
}
