//! The accessor seam between formulas and the evaluator.
//!
//! Formulas only see `&mut dyn StatAccess`, so the same formula runs
//! against the memoizing `Evaluator` in production and against an
//! instrumented wrapper in the validation harness.

use crate::data::GameData;
use crate::stat_id::StatId;

/// What a formula may read while it is being evaluated.
pub trait StatAccess {
    /// Get the current value of any stat.
    fn stat(&mut self, id: StatId) -> i64;

    /// Static game data (constants and reference tables).
    fn data(&self) -> &GameData;

    /// `true` when the stat is non-zero. Used for kill switches and flags.
    fn flag(&mut self, id: StatId) -> bool {
        self.stat(id) != 0
    }
}

/// Wraps another accessor and records every stat read through it.
///
/// Only reads made directly through this wrapper are recorded; nested
/// evaluation performed by the inner accessor is not.
///
/// # Examples
///
/// ```rust
/// use vstat::access::{RecordingAccess, StatAccess};
/// use vstat::{Evaluator, MapPrimitives, RegistryBuilder, StatId};
///
/// let registry = RegistryBuilder::new(4).build();
/// let mut evaluator = Evaluator::new(&registry, MapPrimitives::new());
///
/// let mut recorder = RecordingAccess::new(&mut evaluator);
/// recorder.stat(StatId::new(2));
/// recorder.stat(StatId::new(1));
/// recorder.stat(StatId::new(2));
///
/// assert_eq!(recorder.reads(), &[StatId::new(2), StatId::new(1)]);
/// ```
pub struct RecordingAccess<'a> {
    inner: &'a mut dyn StatAccess,
    reads: Vec<StatId>,
}

impl<'a> RecordingAccess<'a> {
    /// Wrap an accessor.
    pub fn new(inner: &'a mut dyn StatAccess) -> Self {
        Self {
            inner,
            reads: Vec::new(),
        }
    }

    /// Distinct stats read so far, in first-read order.
    pub fn reads(&self) -> &[StatId] {
        &self.reads
    }

    /// Consume the wrapper and return the recorded reads.
    pub fn into_reads(self) -> Vec<StatId> {
        self.reads
    }
}

impl StatAccess for RecordingAccess<'_> {
    fn stat(&mut self, id: StatId) -> i64 {
        if !self.reads.contains(&id) {
            self.reads.push(id);
        }
        self.inner.stat(id)
    }

    fn data(&self) -> &GameData {
        self.inner.data()
    }
}
