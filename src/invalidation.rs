//! Dirty propagation.
//!
//! When a stat changes, every derived stat reachable from it through the
//! reverse-dependency map is stale. The `Propagator` finds them with a
//! breadth-first walk whose cost is proportional to the reached edges,
//! not to the size of the stat space.

use crate::registry::Registry;
use crate::stat_id::StatId;
use std::collections::VecDeque;

/// Derived stats made stale by a change, in breadth-first order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    ids: Vec<StatId>,
}

impl DirtySet {
    /// Number of stale stats.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing went stale.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether a stat is in the set.
    pub fn contains(&self, id: StatId) -> bool {
        self.ids.contains(&id)
    }

    /// Iterate the stale stats in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = StatId> + '_ {
        self.ids.iter().copied()
    }

    /// The stale stats as a slice.
    pub fn as_slice(&self) -> &[StatId] {
        &self.ids
    }
}

impl IntoIterator for DirtySet {
    type Item = StatId;
    type IntoIter = std::vec::IntoIter<StatId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}

/// Reusable breadth-first walker over the reverse-dependency map.
///
/// The visited set is a table of epoch stamps: a slot counts as visited
/// when it holds the current epoch. Starting a new walk only bumps the
/// epoch, so no per-walk clearing is needed.
///
/// # Examples
///
/// ```rust
/// use vstat::invalidation::Propagator;
/// use vstat::{RegistryBuilder, StatId};
///
/// let (p, a, b, c) = (StatId::new(0), StatId::new(1), StatId::new(2), StatId::new(3));
/// let mut builder = RegistryBuilder::new(4);
/// builder.register(a, &[p], move |s| s.stat(p));
/// builder.register(b, &[a], move |s| s.stat(a));
/// builder.register(c, &[a, b], move |s| s.stat(a) + s.stat(b));
/// let registry = builder.build();
///
/// let mut propagator = Propagator::new(registry.stat_count());
/// let dirty = propagator.propagate(&registry, [p]);
/// assert_eq!(dirty.as_slice(), &[a, b, c]);
/// ```
#[derive(Debug, Clone)]
pub struct Propagator {
    stamps: Vec<u32>,
    epoch: u32,
    queue: VecDeque<StatId>,
}

impl Propagator {
    /// Create a walker for a stat space of `stat_count` stats.
    pub fn new(stat_count: usize) -> Self {
        Self {
            stamps: vec![0; stat_count],
            epoch: 0,
            queue: VecDeque::new(),
        }
    }

    fn next_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            // Wrapped: stale stamps could alias the new epoch.
            self.stamps.fill(0);
            self.epoch = 1;
        }
    }

    /// Mark a stat visited, returning `false` if it already was.
    fn visit(&mut self, id: StatId) -> bool {
        match self.stamps.get_mut(id.index()) {
            Some(stamp) if *stamp == self.epoch => false,
            Some(stamp) => {
                *stamp = self.epoch;
                true
            }
            None => false,
        }
    }

    /// Collect every derived stat reachable from any of `changed`.
    ///
    /// A changed stat that is itself derived is included; primitives are
    /// not, since they are never cached. Each stat appears once even when
    /// reachable along several paths.
    pub fn propagate(
        &mut self,
        registry: &Registry,
        changed: impl IntoIterator<Item = StatId>,
    ) -> DirtySet {
        self.next_epoch();
        let mut ids = Vec::new();

        for id in changed {
            if !self.visit(id) {
                continue;
            }
            if registry.is_derived(id) {
                ids.push(id);
            }
            self.queue.push_back(id);
        }

        while let Some(id) = self.queue.pop_front() {
            for &dependant in registry.dependants(id) {
                if self.visit(dependant) {
                    ids.push(dependant);
                    self.queue.push_back(dependant);
                }
            }
        }

        tracing::trace!(stale = ids.len(), "propagated stat change");
        DirtySet { ids }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;

    const P: StatId = StatId::new(0);
    const Q: StatId = StatId::new(1);
    const A: StatId = StatId::new(2);
    const B: StatId = StatId::new(3);
    const C: StatId = StatId::new(4);
    const D: StatId = StatId::new(5);
    const E: StatId = StatId::new(6);

    /// P -> A -> {B, C} -> D, Q -> E
    fn diamond() -> Registry {
        let mut builder = RegistryBuilder::new(7);
        builder
            .register(A, &[P], |s| s.stat(P))
            .register(B, &[A], |s| s.stat(A))
            .register(C, &[A], |s| s.stat(A))
            .register(D, &[B, C], |s| s.stat(B) + s.stat(C))
            .register(E, &[Q], |s| s.stat(Q));
        builder.build()
    }

    #[test]
    fn test_diamond_visits_each_stat_once() {
        let registry = diamond();
        let mut propagator = Propagator::new(registry.stat_count());
        let dirty = propagator.propagate(&registry, [P]);
        assert_eq!(dirty.as_slice(), &[A, B, C, D]);
        assert!(!dirty.contains(E));
    }

    #[test]
    fn test_changed_derived_stat_is_included() {
        let registry = diamond();
        let mut propagator = Propagator::new(registry.stat_count());
        let dirty = propagator.propagate(&registry, [B]);
        assert_eq!(dirty.as_slice(), &[B, D]);
    }

    #[test]
    fn test_unrelated_primitive_dirties_nothing_else() {
        let registry = diamond();
        let mut propagator = Propagator::new(registry.stat_count());
        let dirty = propagator.propagate(&registry, [Q]);
        assert_eq!(dirty.as_slice(), &[E]);
        assert_eq!(propagator.propagate(&registry, [D]).as_slice(), &[D]);
    }

    #[test]
    fn test_batch_shares_visited_set() {
        let registry = diamond();
        let mut propagator = Propagator::new(registry.stat_count());
        let dirty = propagator.propagate(&registry, [P, Q, P]);
        assert_eq!(dirty.len(), 5);
        assert_eq!(dirty.into_iter().filter(|&id| id == D).count(), 1);
    }

    #[test]
    fn test_reuse_across_walks() {
        let registry = diamond();
        let mut propagator = Propagator::new(registry.stat_count());
        for _ in 0..3 {
            assert_eq!(propagator.propagate(&registry, [P]).len(), 4);
        }
    }

    #[test]
    fn test_epoch_wraparound() {
        let registry = diamond();
        let mut propagator = Propagator::new(registry.stat_count());
        propagator.epoch = u32::MAX - 1;
        assert_eq!(propagator.propagate(&registry, [P]).len(), 4);
        assert_eq!(propagator.propagate(&registry, [P]).len(), 4);
        assert_eq!(propagator.epoch, 1);
    }

    #[test]
    fn test_out_of_range_change_is_ignored() {
        let registry = diamond();
        let mut propagator = Propagator::new(registry.stat_count());
        assert!(propagator.propagate(&registry, [StatId::new(50)]).is_empty());
    }
}
