//! Stat identifier module.
//!
//! Provides the `StatId` type, a dense index into the fixed stat
//! enumeration shared by primitive and derived stats.

use serde::{Deserialize, Serialize};

/// Dense index into the stat enumeration.
///
/// Every stat, primitive or derived, owns one slot. The enumeration size
/// `N` is fixed when the registry is built and every valid id is `< N`.
///
/// # Examples
///
/// ```rust
/// use vstat::StatId;
///
/// const LIFE: StatId = StatId::new(3);
/// assert_eq!(LIFE.index(), 3);
/// assert_eq!(LIFE.to_string(), "#3");
/// ```
#[derive(
    Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StatId(u32);

impl StatId {
    /// Create a `StatId` from its raw index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The slot index of this stat, usable for dense tables.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The raw integer value.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for StatId {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for StatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
