//! Stat evaluator module.
//!
//! Provides `Evaluator`, the per-context entry point for stat queries.
//! One evaluator exists per character or snapshot; it owns that context's
//! primitive store and `EvaluationCache` and borrows the shared registry.

use crate::access::StatAccess;
use crate::data::GameData;
use crate::error::StatError;
use crate::invalidation::{DirtySet, Propagator};
use crate::primitive::{PrimitiveStore, PrimitiveStoreMut};
use crate::registry::Registry;
use crate::stat_id::StatId;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    value: i64,
    fresh: bool,
}

/// Memoized derived values for one evaluation context.
#[derive(Debug, Clone, Default)]
pub struct EvaluationCache {
    slots: Vec<Slot>,
    fresh: usize,
}

impl EvaluationCache {
    /// Create an empty cache for `stat_count` stats.
    pub fn new(stat_count: usize) -> Self {
        Self {
            slots: vec![Slot::default(); stat_count],
            fresh: 0,
        }
    }

    /// The cached value, if fresh.
    #[inline]
    pub fn value(&self, id: StatId) -> Option<i64> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.fresh)
            .map(|slot| slot.value)
    }

    /// Whether a fresh value is cached.
    pub fn is_fresh(&self, id: StatId) -> bool {
        self.value(id).is_some()
    }

    /// Number of fresh entries.
    pub fn fresh_count(&self) -> usize {
        self.fresh
    }

    fn store(&mut self, id: StatId, value: i64) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            if !slot.fresh {
                self.fresh += 1;
            }
            *slot = Slot { value, fresh: true };
        }
    }

    fn evict(&mut self, id: StatId) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            if slot.fresh {
                slot.fresh = false;
                self.fresh -= 1;
            }
        }
    }

    fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.fresh = false;
        }
        self.fresh = 0;
    }
}

/// Work counters for one evaluator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalCounters {
    /// Formula bodies executed.
    pub formula_calls: u64,
    /// Derived reads served from the cache.
    pub cache_hits: u64,
    /// Reads answered by the primitive store.
    pub primitive_reads: u64,
}

/// Resolves stats for one evaluation context.
///
/// `stat` returns primitives straight from the store and computes derived
/// stats on demand, caching each result until a change to something it
/// depends on is propagated through `update`, `invalidate` or
/// `set_primitive`.
///
/// With guards enabled (the default in debug builds) the evaluator also
/// tracks the formulas currently running and panics when a formula reads
/// a stat it did not declare, or when evaluation re-enters a stat that is
/// still being computed. Release builds skip that bookkeeping.
///
/// # Examples
///
/// ```rust
/// use vstat::{DensePrimitives, Evaluator, RegistryBuilder, StatId};
///
/// const P: StatId = StatId::new(0);
/// const A: StatId = StatId::new(1);
/// const B: StatId = StatId::new(2);
/// const C: StatId = StatId::new(3);
///
/// let mut builder = RegistryBuilder::new(4);
/// builder
///     .register(A, &[P], |s| s.stat(P))
///     .register(B, &[A], |s| s.stat(A) * 2)
///     .register(C, &[A, B], |s| s.stat(A) + s.stat(B));
/// let registry = builder.build();
///
/// let mut evaluator = Evaluator::new(&registry, DensePrimitives::new(4));
/// evaluator.set_primitive(P, 5);
/// assert_eq!(evaluator.stat(C), 15);
///
/// let dirty = evaluator.set_primitive(P, 10);
/// assert_eq!(dirty.as_slice(), &[A, B, C]);
/// assert_eq!(evaluator.stat(C), 30);
/// ```
pub struct Evaluator<'r, P> {
    registry: &'r Registry,
    data: &'r GameData,
    primitives: P,
    cache: EvaluationCache,
    propagator: Propagator,
    counters: EvalCounters,
    guards: bool,
    stack: Vec<StatId>,
}

impl<'r, P: PrimitiveStore> Evaluator<'r, P> {
    /// Create an evaluator with an empty cache and no game data.
    pub fn new(registry: &'r Registry, primitives: P) -> Self {
        let stat_count = registry.stat_count();
        Self {
            registry,
            data: GameData::empty(),
            primitives,
            cache: EvaluationCache::new(stat_count),
            propagator: Propagator::new(stat_count),
            counters: EvalCounters::default(),
            guards: cfg!(debug_assertions),
            stack: Vec::new(),
        }
    }

    /// Give formulas access to game data.
    pub fn with_data(mut self, data: &'r GameData) -> Self {
        self.data = data;
        self
    }

    /// Turn the cycle and undeclared-dependency guards on or off.
    pub fn with_guards(mut self, guards: bool) -> Self {
        self.guards = guards;
        self.stack.clear();
        self
    }

    /// Get the value of any stat.
    ///
    /// Primitives come from the store. Derived stats are served from the
    /// cache when fresh and computed (recursively) otherwise.
    ///
    /// # Arguments
    ///
    /// * `id` - The stat to read, primitive or derived
    ///
    /// # Panics
    ///
    /// Only with guards enabled: on a dependency cycle, or when the
    /// formula being evaluated reads a stat it did not declare.
    pub fn stat(&mut self, id: StatId) -> i64 {
        if self.guards {
            self.check_declared(id);
        }

        let registry = self.registry;
        let Some(node) = registry.lookup(id) else {
            self.counters.primitive_reads += 1;
            return self.primitives.primitive(id);
        };

        if let Some(value) = self.cache.value(id) {
            self.counters.cache_hits += 1;
            return value;
        }

        self.counters.formula_calls += 1;
        let value = if self.guards {
            let mut frame = Frame::enter(self, id);
            node.evaluate(&mut *frame)
        } else {
            node.evaluate(self)
        };

        self.cache.store(id, value);
        value
    }

    fn check_declared(&self, id: StatId) {
        let Some(&current) = self.stack.last() else {
            return;
        };
        if let Some(node) = self.registry.lookup(current) {
            if !node.declares(id) {
                panic!(
                    "{}",
                    StatError::UndeclaredDependency {
                        stat: current,
                        read: id
                    }
                );
            }
        }
    }

    /// Resolve every derived stat, in registration order.
    pub fn evaluate_all(&mut self) -> Vec<(StatId, i64)> {
        let registry = self.registry;
        registry
            .derived_ids()
            .iter()
            .map(|&id| (id, self.stat(id)))
            .collect()
    }

    /// Let the owning system mutate its primitives, then mark everything
    /// depending on `changed` stale.
    ///
    /// # Arguments
    ///
    /// * `changed` - The primitive the closure modifies
    /// * `mutate` - Applies the change to the primitive store
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vstat::{Evaluator, MapPrimitives, RegistryBuilder, StatId};
    ///
    /// const LEVEL: StatId = StatId::new(0);
    /// const LIFE: StatId = StatId::new(1);
    ///
    /// let mut builder = RegistryBuilder::new(2);
    /// builder.register(LIFE, &[LEVEL], |s| 38 + 12 * s.stat(LEVEL));
    /// let registry = builder.build();
    ///
    /// let mut evaluator = Evaluator::new(&registry, MapPrimitives::new().with(LEVEL, 1));
    /// assert_eq!(evaluator.stat(LIFE), 50);
    ///
    /// let dirty = evaluator.update(LEVEL, |p| *p = MapPrimitives::new().with(LEVEL, 2));
    /// assert_eq!(dirty.as_slice(), &[LIFE]);
    /// assert_eq!(evaluator.stat(LIFE), 62);
    /// ```
    pub fn update<F>(&mut self, changed: StatId, mutate: F) -> DirtySet
    where
        F: FnOnce(&mut P),
    {
        mutate(&mut self.primitives);
        self.invalidate(changed)
    }

    /// Mark everything depending on `changed` stale.
    pub fn invalidate(&mut self, changed: StatId) -> DirtySet {
        self.invalidate_many([changed])
    }

    /// Mark everything depending on any of `changed` stale.
    ///
    /// Use this for batched changes such as an equipment swap: shared
    /// dependants are visited once.
    pub fn invalidate_many(&mut self, changed: impl IntoIterator<Item = StatId>) -> DirtySet {
        let dirty = self.propagator.propagate(self.registry, changed);
        for id in dirty.iter() {
            self.cache.evict(id);
        }
        dirty
    }

    /// Drop every cached value.
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// The registry this evaluator reads formulas from.
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// The primitive store.
    pub fn primitives(&self) -> &P {
        &self.primitives
    }

    /// Give the primitive store back.
    pub fn into_primitives(self) -> P {
        self.primitives
    }

    /// The memoization cache.
    pub fn cache(&self) -> &EvaluationCache {
        &self.cache
    }

    /// Work done since creation or the last `reset_counters`.
    pub fn counters(&self) -> EvalCounters {
        self.counters
    }

    /// Zero the work counters.
    pub fn reset_counters(&mut self) {
        self.counters = EvalCounters::default();
    }
}

impl<'r, P: PrimitiveStoreMut> Evaluator<'r, P> {
    /// Write a primitive and propagate the change.
    ///
    /// Writing the value the store already holds invalidates nothing.
    ///
    /// # Arguments
    ///
    /// * `id` - The primitive to write
    /// * `value` - Its new value
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vstat::{DensePrimitives, Evaluator, RegistryBuilder, StatId};
    ///
    /// const STRENGTH: StatId = StatId::new(0);
    /// const MELEE_BONUS: StatId = StatId::new(1);
    ///
    /// let mut builder = RegistryBuilder::new(2);
    /// builder.register(MELEE_BONUS, &[STRENGTH], |s| s.stat(STRENGTH) / 5);
    /// let registry = builder.build();
    ///
    /// let mut evaluator = Evaluator::new(&registry, DensePrimitives::new(2));
    /// assert_eq!(evaluator.set_primitive(STRENGTH, 50).len(), 1);
    /// assert_eq!(evaluator.stat(MELEE_BONUS), 10);
    /// assert!(evaluator.set_primitive(STRENGTH, 50).is_empty());
    /// ```
    pub fn set_primitive(&mut self, id: StatId, value: i64) -> DirtySet {
        if self.primitives.primitive(id) == value {
            return DirtySet::default();
        }
        self.primitives.set_primitive(id, value);
        self.invalidate(id)
    }
}

/// One formula on the guard stack.
///
/// Dropping the frame truncates the stack back to where it was, so a
/// formula that panics (and is caught by the caller) leaves no stale entry
/// behind to misattribute later reads.
struct Frame<'a, 'r, P> {
    evaluator: &'a mut Evaluator<'r, P>,
    depth: usize,
}

impl<'a, 'r, P> Frame<'a, 'r, P> {
    fn enter(evaluator: &'a mut Evaluator<'r, P>, id: StatId) -> Self {
        if let Some(start) = evaluator.stack.iter().position(|&s| s == id) {
            let mut path = evaluator.stack[start..].to_vec();
            path.push(id);
            panic!("{}", StatError::Cycle { path });
        }
        let depth = evaluator.stack.len();
        evaluator.stack.push(id);
        Self { evaluator, depth }
    }
}

impl<'r, P> Deref for Frame<'_, 'r, P> {
    type Target = Evaluator<'r, P>;

    fn deref(&self) -> &Self::Target {
        &*self.evaluator
    }
}

impl<P> DerefMut for Frame<'_, '_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.evaluator
    }
}

impl<P> Drop for Frame<'_, '_, P> {
    fn drop(&mut self) {
        self.evaluator.stack.truncate(self.depth);
    }
}

impl<P: PrimitiveStore> StatAccess for Evaluator<'_, P> {
    fn stat(&mut self, id: StatId) -> i64 {
        Evaluator::stat(self, id)
    }

    fn data(&self) -> &GameData {
        self.data
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for Evaluator<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("registry", self.registry)
            .field("primitives", &self.primitives)
            .field("fresh", &self.cache.fresh_count())
            .field("counters", &self.counters)
            .field("guards", &self.guards)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{DensePrimitives, MapPrimitives};
    use crate::registry::RegistryBuilder;

    const P: StatId = StatId::new(0);
    const Q: StatId = StatId::new(1);
    const A: StatId = StatId::new(2);
    const B: StatId = StatId::new(3);
    const C: StatId = StatId::new(4);

    fn chain() -> Registry {
        let mut builder = RegistryBuilder::new(5);
        builder
            .register(A, &[P], |s| s.stat(P))
            .register(B, &[A], |s| s.stat(A) * 2)
            .register(C, &[A, B], |s| s.stat(A) + s.stat(B));
        builder.build()
    }

    #[test]
    fn test_primitive_passthrough() {
        let registry = chain();
        let mut evaluator = Evaluator::new(&registry, MapPrimitives::new().with(Q, 9));
        assert_eq!(evaluator.stat(Q), 9);
        assert_eq!(evaluator.counters().primitive_reads, 1);
        assert_eq!(evaluator.cache().fresh_count(), 0);
    }

    #[test]
    fn test_memoization() {
        let registry = chain();
        let mut evaluator = Evaluator::new(&registry, MapPrimitives::new().with(P, 5));

        assert_eq!(evaluator.stat(C), 15);
        assert_eq!(evaluator.counters().formula_calls, 3);

        evaluator.reset_counters();
        assert_eq!(evaluator.stat(C), 15);
        assert_eq!(evaluator.counters().formula_calls, 0);
        assert_eq!(evaluator.counters().cache_hits, 1);
        assert_eq!(evaluator.cache().fresh_count(), 3);
    }

    #[test]
    fn test_update_recomputes_dependants() {
        let registry = chain();
        let mut evaluator = Evaluator::new(&registry, MapPrimitives::new().with(P, 5));
        assert_eq!(evaluator.stat(C), 15);

        let dirty = evaluator.update(P, |p| {
            *p = MapPrimitives::new().with(P, 10);
        });
        assert_eq!(dirty.as_slice(), &[A, B, C]);
        assert!(!evaluator.cache().is_fresh(A));
        assert_eq!(evaluator.stat(C), 30);
    }

    #[test]
    fn test_set_same_value_is_noop() {
        let registry = chain();
        let mut evaluator = Evaluator::new(&registry, DensePrimitives::new(5));
        evaluator.set_primitive(P, 3);
        evaluator.stat(C);
        assert!(evaluator.set_primitive(P, 3).is_empty());
        assert!(evaluator.cache().is_fresh(C));
    }

    #[test]
    fn test_invalidate_all() {
        let registry = chain();
        let mut evaluator = Evaluator::new(&registry, MapPrimitives::new().with(P, 1));
        evaluator.stat(C);
        evaluator.invalidate_all();
        assert_eq!(evaluator.cache().fresh_count(), 0);
        evaluator.reset_counters();
        assert_eq!(evaluator.stat(C), 3);
        assert_eq!(evaluator.counters().formula_calls, 3);
    }

    #[test]
    fn test_evaluate_all() {
        let registry = chain();
        let mut evaluator = Evaluator::new(&registry, MapPrimitives::new().with(P, 2));
        assert_eq!(evaluator.evaluate_all(), vec![(A, 2), (B, 4), (C, 6)]);
    }

    #[test]
    fn test_invalidating_derived_stat_keeps_its_dependencies() {
        let registry = chain();
        let mut evaluator = Evaluator::new(&registry, MapPrimitives::new().with(P, 2));
        evaluator.stat(C);
        let dirty = evaluator.invalidate(B);
        assert_eq!(dirty.as_slice(), &[B, C]);
        assert!(evaluator.cache().is_fresh(A));
    }

    #[test]
    #[should_panic(expected = "read undeclared dependency")]
    fn test_guard_catches_undeclared_read() {
        let mut builder = RegistryBuilder::new(5);
        builder.register(A, &[P], |s| s.stat(P) + s.stat(Q));
        let registry = builder.build();
        let mut evaluator = Evaluator::new(&registry, MapPrimitives::new()).with_guards(true);
        evaluator.stat(A);
    }

    #[test]
    #[should_panic(expected = "Cycle detected")]
    fn test_guard_catches_cycle() {
        let mut builder = RegistryBuilder::new(5);
        builder
            .register(A, &[B], |s| s.stat(B))
            .register(B, &[A], |s| s.stat(A));
        let registry = builder.build();
        let mut evaluator = Evaluator::new(&registry, MapPrimitives::new()).with_guards(true);
        evaluator.stat(A);
    }

    #[test]
    fn test_unguarded_undeclared_read_goes_stale() {
        let mut builder = RegistryBuilder::new(5);
        builder.register(A, &[P], |s| s.stat(P) + s.stat(Q));
        let registry = builder.build();
        let mut evaluator =
            Evaluator::new(&registry, DensePrimitives::new(5)).with_guards(false);

        assert_eq!(evaluator.stat(A), 0);
        assert!(evaluator.set_primitive(Q, 7).is_empty());
        assert_eq!(evaluator.stat(A), 0);
    }

    #[test]
    fn test_guard_stack_recovers_after_caught_panic() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let mut builder = RegistryBuilder::new(5);
        builder
            .register(A, &[P], |s| s.stat(P) + s.stat(Q))
            .register(B, &[P], |s| s.stat(P) + 1);
        let registry = builder.build();
        let mut evaluator =
            Evaluator::new(&registry, MapPrimitives::new().with(P, 2).with(Q, 3))
                .with_guards(true);

        let caught = catch_unwind(AssertUnwindSafe(|| evaluator.stat(A)));
        assert!(caught.is_err());
        assert!(evaluator.stack.is_empty());

        // Neither read is attributed to the formula that panicked.
        assert_eq!(evaluator.stat(B), 3);
        assert_eq!(evaluator.stat(Q), 3);
        assert!(!evaluator.cache().is_fresh(A));
    }

    #[test]
    fn test_guard_stack_recovers_after_caught_cycle() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let mut builder = RegistryBuilder::new(5);
        builder
            .register(A, &[B], |s| s.stat(B))
            .register(B, &[A], |s| s.stat(A))
            .register(C, &[P], |s| s.stat(P) * 10);
        let registry = builder.build();
        let mut evaluator =
            Evaluator::new(&registry, MapPrimitives::new().with(P, 4)).with_guards(true);

        assert!(catch_unwind(AssertUnwindSafe(|| evaluator.stat(A))).is_err());
        assert!(evaluator.stack.is_empty());
        assert_eq!(evaluator.stat(C), 40);
    }

    #[test]
    fn test_accessors_and_into_primitives() {
        let registry = chain();
        let mut evaluator = Evaluator::new(&registry, DensePrimitives::new(5));
        assert!(std::ptr::eq(evaluator.registry(), &registry));

        evaluator.set_primitive(P, 6);
        assert_eq!(evaluator.stat(C), 18);
        assert_eq!(evaluator.primitives().primitive(P), 6);

        let primitives = evaluator.into_primitives();
        let mut fresh = Evaluator::new(&registry, primitives);
        assert_eq!(fresh.stat(C), 18);
        assert_eq!(fresh.counters().formula_calls, 3);
    }

    #[test]
    fn test_evaluator_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Evaluator<'static, DensePrimitives>>();
    }
}
