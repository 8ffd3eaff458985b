//! Registry validation harness.
//!
//! An under-declared dependency does not crash anything: the derived stat
//! silently stops updating when the undeclared input changes. This module
//! runs every formula through a recording accessor over sample inputs so
//! those mistakes fail a test instead of shipping.

use crate::access::RecordingAccess;
use crate::data::GameData;
use crate::error::StatError;
use crate::evaluator::Evaluator;
use crate::graph::DependencyGraph;
use crate::primitive::{MapPrimitives, PrimitiveStore};
use crate::registry::Registry;
use crate::stat_id::StatId;
use std::collections::{BTreeSet, HashMap};

/// Findings of `validate_registry`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Cycles, undeclared reads and non-deterministic formulas.
    pub errors: Vec<StatError>,
    /// `(stat, dependency)` pairs that were declared but never read on
    /// any sample. Harmless, but often a sign of a stale declaration or of
    /// samples that never open a gate.
    pub unused_dependencies: Vec<(StatId, StatId)>,
    /// Number of formulas checked.
    pub formulas: usize,
    /// Number of primitive samples evaluated.
    pub samples: usize,
}

impl ValidationReport {
    /// Whether no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turn the report into a `Result`, keeping every error.
    pub fn into_result(self) -> Result<(), Vec<StatError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn push_error(&mut self, error: StatError) {
        if !self.errors.contains(&error) {
            tracing::warn!(%error, "virtual stat validation failed");
            self.errors.push(error);
        }
    }
}

/// Check a registry against sample primitive sets.
///
/// 1. The declared graph must be acyclic; if not, the cycle is the only
///    error reported and no formula is run.
/// 2. Each formula is evaluated once per sample through a
///    `RecordingAccess`; any stat read but not declared is an
///    `UndeclaredDependency`.
/// 3. Each formula is evaluated a second time and must return the same
///    value.
///
/// With no samples, a single all-zero sample is used.
///
/// # Examples
///
/// ```rust
/// use vstat::validation::validate_registry;
/// use vstat::{GameData, MapPrimitives, RegistryBuilder, StatError, StatId};
///
/// let (p, q, a) = (StatId::new(0), StatId::new(1), StatId::new(2));
/// let mut builder = RegistryBuilder::new(3);
/// builder.register(a, &[p], move |s| s.stat(p) + s.stat(q));
/// let registry = builder.build();
///
/// let report = validate_registry(&registry, GameData::empty(), &[MapPrimitives::new()]);
/// assert_eq!(
///     report.errors,
///     vec![StatError::UndeclaredDependency { stat: a, read: q }],
/// );
/// ```
pub fn validate_registry<S: PrimitiveStore>(
    registry: &Registry,
    data: &GameData,
    samples: &[S],
) -> ValidationReport {
    let mut report = ValidationReport {
        formulas: registry.formula_count(),
        ..ValidationReport::default()
    };

    let graph = DependencyGraph::from_registry(registry);
    let order = match graph.topological_sort() {
        Ok(order) => order,
        Err(cycle) => {
            report.push_error(cycle);
            return report;
        }
    };

    let mut used: HashMap<StatId, BTreeSet<StatId>> = HashMap::new();
    if samples.is_empty() {
        check_sample(registry, data, &order, MapPrimitives::new(), &mut used, &mut report);
    } else {
        for sample in samples {
            check_sample(registry, data, &order, sample, &mut used, &mut report);
        }
    }

    for node in registry.nodes() {
        let reads = used.get(&node.id());
        for &dep in node.dependencies() {
            if !reads.is_some_and(|r| r.contains(&dep)) {
                report.unused_dependencies.push((node.id(), dep));
            }
        }
    }

    tracing::debug!(
        formulas = report.formulas,
        samples = report.samples,
        errors = report.errors.len(),
        unused = report.unused_dependencies.len(),
        "validated virtual stat registry"
    );
    report
}

fn check_sample<S: PrimitiveStore>(
    registry: &Registry,
    data: &GameData,
    order: &[StatId],
    sample: S,
    used: &mut HashMap<StatId, BTreeSet<StatId>>,
    report: &mut ValidationReport,
) {
    report.samples += 1;
    let mut evaluator = Evaluator::new(registry, sample)
        .with_data(data)
        .with_guards(false);

    for &id in order {
        let Some(node) = registry.lookup(id) else {
            continue;
        };

        let mut recorder = RecordingAccess::new(&mut evaluator);
        let first = node.evaluate(&mut recorder);
        let reads = recorder.into_reads();

        for read in reads {
            if node.declares(read) {
                used.entry(id).or_default().insert(read);
            } else {
                report.push_error(StatError::UndeclaredDependency { stat: id, read });
            }
        }

        let second = node.evaluate(&mut evaluator);
        if first != second {
            report.push_error(StatError::NonDeterministic {
                stat: id,
                first,
                second,
            });
        }
    }
}
