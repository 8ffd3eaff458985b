//! Virtual stat registry.
//!
//! The registry maps each derived `StatId` to its formula and keeps the
//! reverse-dependency edges used for invalidation. It is built once at
//! startup from ordinary code, then frozen and shared read-only.

use crate::access::StatAccess;
use crate::error::StatError;
use crate::formula::{DeclaredFormula, Formula, FormulaNode};
use crate::stat_id::StatId;
use std::sync::OnceLock;

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// One entry of an ordered startup definition list.
pub struct StatDefinition {
    /// The derived stat.
    pub id: StatId,
    /// Declared dependencies.
    pub dependencies: Vec<StatId>,
    /// The formula computing the stat.
    pub formula: Box<dyn Formula>,
}

impl StatDefinition {
    /// Build a definition from a closure.
    pub fn new<F>(id: StatId, dependencies: &[StatId], formula: F) -> Self
    where
        F: Fn(&mut dyn StatAccess) -> i64 + Send + Sync + 'static,
    {
        Self {
            id,
            dependencies: dependencies.to_vec(),
            formula: Box::new(formula),
        }
    }

    /// Build a definition from a formula that declares its own dependencies.
    pub fn declared<F: DeclaredFormula + 'static>(id: StatId, formula: F) -> Self {
        Self {
            id,
            dependencies: formula.depends_on(),
            formula: Box::new(formula),
        }
    }
}

/// Mutable registration phase of the registry.
///
/// # Examples
///
/// ```rust
/// use vstat::{RegistryBuilder, StatId};
///
/// const STRENGTH: StatId = StatId::new(0);
/// const LIFE: StatId = StatId::new(1);
///
/// let mut builder = RegistryBuilder::new(2);
/// builder.register(LIFE, &[STRENGTH], |s| 50 + s.stat(STRENGTH) / 2);
/// let registry = builder.build();
///
/// assert!(registry.lookup(LIFE).is_some());
/// assert!(registry.lookup(STRENGTH).is_none());
/// assert_eq!(registry.dependants(STRENGTH), &[LIFE]);
/// ```
pub struct RegistryBuilder {
    nodes: Vec<Option<FormulaNode>>,
    dependants: Vec<Vec<StatId>>,
    order: Vec<StatId>,
}

impl RegistryBuilder {
    /// Start a registry over a stat space of `stat_count` stats.
    pub fn new(stat_count: usize) -> Self {
        Self {
            nodes: (0..stat_count).map(|_| None).collect(),
            dependants: vec![Vec::new(); stat_count],
            order: Vec::new(),
        }
    }

    /// Register a closure formula.
    ///
    /// # Arguments
    ///
    /// * `id` - The derived stat the formula computes
    /// * `dependencies` - Every stat the formula may read
    /// * `formula` - The formula body
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vstat::{RegistryBuilder, StatId};
    ///
    /// const ARMOUR: StatId = StatId::new(0);
    /// const EVASION: StatId = StatId::new(1);
    /// const DEFENCE: StatId = StatId::new(2);
    ///
    /// let mut builder = RegistryBuilder::new(3);
    /// builder.register(DEFENCE, &[ARMOUR, EVASION], |s| s.stat(ARMOUR) + s.stat(EVASION));
    /// let registry = builder.build();
    /// assert!(registry.is_derived(DEFENCE));
    /// assert_eq!(registry.edge_count(), 2);
    /// ```
    ///
    /// # Panics
    ///
    /// On double registration, self-dependency, or an id outside the
    /// stat space. These are startup programmer errors.
    pub fn register<F>(&mut self, id: StatId, dependencies: &[StatId], formula: F) -> &mut Self
    where
        F: Fn(&mut dyn StatAccess) -> i64 + Send + Sync + 'static,
    {
        self.register_formula(id, dependencies, formula)
    }

    /// Register any `Formula` with an explicit dependency list.
    ///
    /// # Panics
    ///
    /// See [`register`](Self::register).
    pub fn register_formula<F: Formula + 'static>(
        &mut self,
        id: StatId,
        dependencies: &[StatId],
        formula: F,
    ) -> &mut Self {
        let node = FormulaNode::new(id, dependencies, Box::new(formula));
        if let Err(err) = self.try_insert(node) {
            panic!("virtual stat registration failed: {err}");
        }
        self
    }

    /// Register a formula that declares its own dependencies.
    ///
    /// # Panics
    ///
    /// See [`register`](Self::register).
    pub fn register_declared<F: DeclaredFormula + 'static>(
        &mut self,
        id: StatId,
        formula: F,
    ) -> &mut Self {
        let dependencies = formula.depends_on();
        self.register_formula(id, &dependencies, formula)
    }

    /// Register a definition, reporting programmer errors instead of
    /// panicking.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vstat::{RegistryBuilder, StatDefinition, StatError, StatId};
    ///
    /// const P: StatId = StatId::new(0);
    /// const A: StatId = StatId::new(1);
    ///
    /// let mut builder = RegistryBuilder::new(2);
    /// builder.try_register(StatDefinition::new(A, &[P], |s| s.stat(P)))?;
    ///
    /// let again = builder.try_register(StatDefinition::new(A, &[P], |s| s.stat(P)));
    /// assert_eq!(again, Err(StatError::DuplicateRegistration(A)));
    /// # Ok::<(), StatError>(())
    /// ```
    pub fn try_register(&mut self, definition: StatDefinition) -> Result<(), StatError> {
        let node = FormulaNode::new(definition.id, &definition.dependencies, definition.formula);
        self.try_insert(node)
    }

    fn check_id(&self, id: StatId) -> Result<(), StatError> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(StatError::OutOfRange {
                id,
                stat_count: self.nodes.len(),
            })
        }
    }

    fn try_insert(&mut self, node: FormulaNode) -> Result<(), StatError> {
        let id = node.id();
        self.check_id(id)?;
        for &dep in node.dependencies() {
            self.check_id(dep)?;
            if dep == id {
                return Err(StatError::SelfDependency(id));
            }
        }
        if self.nodes[id.index()].is_some() {
            return Err(StatError::DuplicateRegistration(id));
        }

        for &dep in node.dependencies() {
            self.dependants[dep.index()].push(id);
        }
        self.order.push(id);
        self.nodes[id.index()] = Some(node);
        Ok(())
    }

    /// Freeze the registry.
    pub fn build(self) -> Registry {
        let registry = Registry {
            nodes: self.nodes,
            dependants: self.dependants,
            order: self.order,
        };
        tracing::debug!(
            stat_count = registry.stat_count(),
            formulas = registry.formula_count(),
            edges = registry.edge_count(),
            "built virtual stat registry"
        );
        registry
    }
}

/// Frozen formula table and reverse-dependency map.
///
/// `Registry` is `Sync`: build it once, then share `&Registry` with every
/// evaluation context on every thread.
pub struct Registry {
    nodes: Vec<Option<FormulaNode>>,
    dependants: Vec<Vec<StatId>>,
    order: Vec<StatId>,
}

impl Registry {
    /// Build a registry from an ordered list of definitions.
    ///
    /// # Arguments
    ///
    /// * `stat_count` - Size of the stat space
    /// * `definitions` - Derived stat definitions, in registration order
    ///
    /// # Panics
    ///
    /// On the same programmer errors as `RegistryBuilder::register`.
    pub fn from_definitions(
        stat_count: usize,
        definitions: impl IntoIterator<Item = StatDefinition>,
    ) -> Self {
        let mut builder = RegistryBuilder::new(stat_count);
        for definition in definitions {
            if let Err(err) = builder.try_register(definition) {
                panic!("virtual stat registration failed: {err}");
            }
        }
        builder.build()
    }

    /// Like [`from_definitions`](Self::from_definitions) but returns the
    /// first registration error.
    pub fn try_from_definitions(
        stat_count: usize,
        definitions: impl IntoIterator<Item = StatDefinition>,
    ) -> Result<Self, StatError> {
        let mut builder = RegistryBuilder::new(stat_count);
        for definition in definitions {
            builder.try_register(definition)?;
        }
        Ok(builder.build())
    }

    /// Install this registry as the process-wide registry.
    ///
    /// Only the first install succeeds.
    pub fn install(self) -> Result<&'static Registry, StatError> {
        GLOBAL
            .set(self)
            .map_err(|_| StatError::RegistryInstalled)?;
        Self::global().ok_or(StatError::RegistryInstalled)
    }

    /// The process-wide registry, if one was installed.
    pub fn global() -> Option<&'static Registry> {
        GLOBAL.get()
    }

    /// The formula node for a derived stat, `None` for primitives.
    #[inline]
    pub fn lookup(&self, id: StatId) -> Option<&FormulaNode> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    /// Whether the stat has a registered formula.
    pub fn is_derived(&self, id: StatId) -> bool {
        self.lookup(id).is_some()
    }

    /// Derived stats that declared `id` as a dependency, in registration order.
    #[inline]
    pub fn dependants(&self, id: StatId) -> &[StatId] {
        self.dependants
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Derived stats in registration order.
    pub fn derived_ids(&self) -> &[StatId] {
        &self.order
    }

    /// Registered formula nodes in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &FormulaNode> {
        self.order.iter().filter_map(|&id| self.lookup(id))
    }

    /// Size `N` of the stat space.
    pub fn stat_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of registered formulas.
    pub fn formula_count(&self) -> usize {
        self.order.len()
    }

    /// Number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.dependants.iter().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("stat_count", &self.stat_count())
            .field("formulas", &self.formula_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: StatId = StatId::new(0);
    const B: StatId = StatId::new(1);
    const C: StatId = StatId::new(2);
    const D: StatId = StatId::new(3);

    fn zero() -> impl Fn(&mut dyn StatAccess) -> i64 + Send + Sync + 'static {
        |_| 0
    }

    #[test]
    fn test_reverse_dependencies() {
        let mut builder = RegistryBuilder::new(4);
        builder
            .register(B, &[A], zero())
            .register(C, &[A, B], zero())
            .register(D, &[C, C], zero());
        let registry = builder.build();

        assert_eq!(registry.dependants(A), &[B, C]);
        assert_eq!(registry.dependants(B), &[C]);
        assert_eq!(registry.dependants(C), &[D]);
        assert!(registry.dependants(D).is_empty());
        assert_eq!(registry.edge_count(), 4);
        assert_eq!(registry.formula_count(), 3);
        assert_eq!(registry.derived_ids(), &[B, C, D]);
    }

    #[test]
    fn test_lookup_primitive_is_none() {
        let registry = RegistryBuilder::new(2).build();
        assert!(registry.lookup(A).is_none());
        assert!(registry.lookup(StatId::new(99)).is_none());
        assert!(registry.dependants(StatId::new(99)).is_empty());
    }

    #[test]
    fn test_duplicate_registration_error() {
        let mut builder = RegistryBuilder::new(4);
        builder.register(B, &[A], zero());
        let result = builder.try_register(StatDefinition::new(B, &[C], zero()));
        assert_eq!(result, Err(StatError::DuplicateRegistration(B)));
        // Failed registration leaves no edges behind.
        assert!(builder.build().dependants(C).is_empty());
    }

    #[test]
    fn test_self_dependency_error() {
        let mut builder = RegistryBuilder::new(4);
        let result = builder.try_register(StatDefinition::new(B, &[A, B], zero()));
        assert_eq!(result, Err(StatError::SelfDependency(B)));
        assert!(builder.build().dependants(A).is_empty());
    }

    #[test]
    fn test_out_of_range_error() {
        let mut builder = RegistryBuilder::new(2);
        let result = builder.try_register(StatDefinition::new(B, &[StatId::new(5)], zero()));
        assert_eq!(
            result,
            Err(StatError::OutOfRange {
                id: StatId::new(5),
                stat_count: 2
            })
        );
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_register_panics_on_duplicate() {
        let mut builder = RegistryBuilder::new(4);
        builder.register(B, &[A], zero()).register(B, &[A], zero());
    }

    #[test]
    #[should_panic(expected = "depends on itself")]
    fn test_register_panics_on_self_dependency() {
        RegistryBuilder::new(4).register(C, &[C], zero());
    }

    #[test]
    fn test_from_definitions() {
        let registry = Registry::from_definitions(
            4,
            vec![
                StatDefinition::new(B, &[A], |s| s.stat(A) + 1),
                StatDefinition::new(C, &[B], |s| s.stat(B) + 1),
            ],
        );
        assert!(registry.is_derived(B));
        assert!(registry.is_derived(C));
        assert!(!registry.is_derived(A));
        assert_eq!(registry.nodes().count(), 2);
    }

    #[test]
    fn test_try_from_definitions_reports_error() {
        let result = Registry::try_from_definitions(
            4,
            vec![
                StatDefinition::new(B, &[A], zero()),
                StatDefinition::new(B, &[A], zero()),
            ],
        );
        assert!(matches!(result, Err(StatError::DuplicateRegistration(id)) if id == B));
    }

    #[test]
    fn test_registry_is_sync() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<Registry>();
    }
}
