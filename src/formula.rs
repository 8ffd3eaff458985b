//! Formula nodes.
//!
//! A formula is a pure function of the accessor that returns an integer.
//! It must read only the stats it declared at registration; reading
//! anything else leaves the derived value permanently stale when that
//! stat changes.
//!
//! Most content formulas share one shape:
//!
//! ```text
//! if kill_switch { 0 }
//! else { max(0, base × scale(100 + Σ increased) × Π scale(100 + more_i)) }
//! ```
//!
//! `ModifiedStat` builds that shape declaratively and derives its
//! dependency list from its own structure.

use crate::access::StatAccess;
use crate::numeric::{self, round, scale};
use crate::stat_id::StatId;

/// A pure function from the accessor to a stat value.
///
/// Implemented for every `Fn(&mut dyn StatAccess) -> i64` closure.
pub trait Formula: Send + Sync {
    /// Compute the value. Must be deterministic and side-effect free.
    fn evaluate(&self, stats: &mut dyn StatAccess) -> i64;

    /// Human-readable description, used in logs and reports.
    fn description(&self) -> String {
        String::from("formula")
    }
}

impl<F> Formula for F
where
    F: Fn(&mut dyn StatAccess) -> i64 + Send + Sync,
{
    fn evaluate(&self, stats: &mut dyn StatAccess) -> i64 {
        self(stats)
    }
}

/// A formula that knows its own dependencies.
///
/// Registering one through `RegistryBuilder::register_declared` makes
/// under-declaration impossible by construction.
pub trait DeclaredFormula: Formula {
    /// Every stat `evaluate` may read.
    fn depends_on(&self) -> Vec<StatId>;
}

/// A registered formula together with its declared dependencies.
pub struct FormulaNode {
    id: StatId,
    dependencies: Vec<StatId>,
    formula: Box<dyn Formula>,
}

impl FormulaNode {
    /// Create a node. Duplicate dependencies are dropped, order is kept.
    pub fn new(id: StatId, dependencies: &[StatId], formula: Box<dyn Formula>) -> Self {
        let mut unique = Vec::with_capacity(dependencies.len());
        for &dep in dependencies {
            if !unique.contains(&dep) {
                unique.push(dep);
            }
        }
        Self {
            id,
            dependencies: unique,
            formula,
        }
    }

    /// The derived stat this node computes.
    pub fn id(&self) -> StatId {
        self.id
    }

    /// Declared dependencies, in declaration order.
    pub fn dependencies(&self) -> &[StatId] {
        &self.dependencies
    }

    /// Whether `id` is one of the declared dependencies.
    pub fn declares(&self, id: StatId) -> bool {
        self.dependencies.contains(&id)
    }

    /// Run the formula.
    pub fn evaluate(&self, stats: &mut dyn StatAccess) -> i64 {
        self.formula.evaluate(stats)
    }

    /// Description of the underlying formula.
    pub fn description(&self) -> String {
        self.formula.description()
    }
}

impl std::fmt::Debug for FormulaNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormulaNode")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .field("formula", &format!("<{}>", self.formula.description()))
            .finish()
    }
}

/// Sum several stats.
pub fn sum_stats(stats: &mut dyn StatAccess, ids: &[StatId]) -> i64 {
    ids.iter().map(|&id| stats.stat(id)).sum()
}

/// `true` if any of the stats is non-zero.
///
/// Short-circuits, so every id must still be declared.
pub fn any_set(stats: &mut dyn StatAccess, ids: &[StatId]) -> bool {
    ids.iter().any(|&id| stats.flag(id))
}

/// Declarative "base × increased × more" formula.
///
/// - `base` stats are summed into a flat value;
/// - `increased` stats (increased/reduced, in percent) are summed and
///   applied once through `scale(100 + total)`;
/// - each `more` stat (more/less, in percent) applies its own
///   `scale(100 + value)`;
/// - if any kill switch is set the result is 0;
/// - the result is rounded once and floored at 0 unless
///   `allow_negative` was called.
///
/// # Examples
///
/// ```rust
/// use vstat::formula::ModifiedStat;
/// use vstat::{Evaluator, MapPrimitives, RegistryBuilder, StatId};
///
/// const BASE: StatId = StatId::new(0);
/// const INC_A: StatId = StatId::new(1);
/// const INC_B: StatId = StatId::new(2);
/// const MORE: StatId = StatId::new(3);
/// const NO_DAMAGE: StatId = StatId::new(4);
/// const DAMAGE: StatId = StatId::new(5);
///
/// let mut builder = RegistryBuilder::new(6);
/// builder.register_declared(
///     DAMAGE,
///     ModifiedStat::base([BASE])
///         .increased([INC_A, INC_B])
///         .more([MORE])
///         .unless(NO_DAMAGE),
/// );
/// let registry = builder.build();
///
/// let primitives = MapPrimitives::new()
///     .with(BASE, 100)
///     .with(INC_A, 30)
///     .with(INC_B, 20)
///     .with(MORE, 20);
/// let mut evaluator = Evaluator::new(&registry, primitives);
///
/// // 100 × 1.5 × 1.2
/// assert_eq!(evaluator.stat(DAMAGE), 180);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModifiedStat {
    base: Vec<StatId>,
    increased: Vec<StatId>,
    more: Vec<StatId>,
    kill_switches: Vec<StatId>,
    allow_negative: bool,
}

impl ModifiedStat {
    /// Start from the sum of the given flat stats.
    pub fn base(ids: impl IntoIterator<Item = StatId>) -> Self {
        Self {
            base: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Add increased/reduced modifiers (summed together).
    pub fn increased(mut self, ids: impl IntoIterator<Item = StatId>) -> Self {
        self.increased.extend(ids);
        self
    }

    /// Add more/less modifiers (each multiplies independently).
    pub fn more(mut self, ids: impl IntoIterator<Item = StatId>) -> Self {
        self.more.extend(ids);
        self
    }

    /// Return 0 whenever `kill_switch` is non-zero.
    pub fn unless(mut self, kill_switch: StatId) -> Self {
        self.kill_switches.push(kill_switch);
        self
    }

    /// Keep negative results instead of flooring at 0.
    pub fn allow_negative(mut self) -> Self {
        self.allow_negative = true;
        self
    }
}

impl Formula for ModifiedStat {
    fn evaluate(&self, stats: &mut dyn StatAccess) -> i64 {
        if any_set(stats, &self.kill_switches) {
            return 0;
        }
        let base = sum_stats(stats, &self.base);
        let increased = sum_stats(stats, &self.increased);

        let mut value = base as f64 * scale(100 + increased);
        for &id in &self.more {
            value *= scale(100 + stats.stat(id));
        }

        let value = round(value);
        if self.allow_negative {
            value
        } else {
            value.max(0)
        }
    }

    fn description(&self) -> String {
        format!(
            "base({}) inc({}) more({}){}",
            self.base.len(),
            self.increased.len(),
            self.more.len(),
            if self.kill_switches.is_empty() { "" } else { " gated" }
        )
    }
}

impl DeclaredFormula for ModifiedStat {
    fn depends_on(&self) -> Vec<StatId> {
        self.kill_switches
            .iter()
            .chain(&self.base)
            .chain(&self.increased)
            .chain(&self.more)
            .copied()
            .collect()
    }
}

/// Unit a legacy leech stat was authored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeechUnit {
    /// Whole percent.
    Percent,
    /// Hundredths of a percent.
    Permyriad,
}

/// Converts one legacy leech stat into modern permyriad using the global
/// leech tuning constant.
///
/// # Examples
///
/// ```rust
/// use vstat::formula::LegacyLeech;
/// use vstat::numeric::{GLOBALS_TABLE, LEGACY_LEECH_EFFECTIVENESS};
/// use vstat::{Evaluator, GameData, MapPrimitives, RegistryBuilder, StatId};
///
/// const OLD_LIFE_LEECH: StatId = StatId::new(0);
/// const LIFE_LEECH_PERMYRIAD: StatId = StatId::new(1);
///
/// let mut builder = RegistryBuilder::new(2);
/// builder.register_declared(LIFE_LEECH_PERMYRIAD, LegacyLeech::from_percent(OLD_LIFE_LEECH));
/// let registry = builder.build();
///
/// let data = GameData::new().with_constant(GLOBALS_TABLE, LEGACY_LEECH_EFFECTIVENESS, 20.0);
/// let mut evaluator = Evaluator::new(&registry, MapPrimitives::new().with(OLD_LIFE_LEECH, 5))
///     .with_data(&data);
///
/// assert_eq!(evaluator.stat(LIFE_LEECH_PERMYRIAD), 100);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LegacyLeech {
    source: StatId,
    unit: LeechUnit,
}

impl LegacyLeech {
    /// Convert a stat authored in whole percent.
    pub fn from_percent(source: StatId) -> Self {
        Self {
            source,
            unit: LeechUnit::Percent,
        }
    }

    /// Convert a stat authored in permyriad.
    pub fn from_permyriad(source: StatId) -> Self {
        Self {
            source,
            unit: LeechUnit::Permyriad,
        }
    }
}

impl Formula for LegacyLeech {
    fn evaluate(&self, stats: &mut dyn StatAccess) -> i64 {
        let value = stats.stat(self.source);
        match self.unit {
            LeechUnit::Percent => numeric::legacy_leech_from_percent(value, stats.data()),
            LeechUnit::Permyriad => numeric::legacy_leech_from_permyriad(value, stats.data()),
        }
    }

    fn description(&self) -> String {
        format!("legacy leech {:?} from {}", self.unit, self.source)
    }
}

impl DeclaredFormula for LegacyLeech {
    fn depends_on(&self) -> Vec<StatId> {
        vec![self.source]
    }
}
