//! # vstat - Incremental Virtual Stat Engine
//!
//! The numeric core of an RPG character attribute model. Derived stats
//! (damage, resistances, leech, speeds, ...) are registered once as pure
//! formulas with explicit dependency lists, evaluated lazily, memoized per
//! character, and invalidated precisely when a primitive input changes.
//!
//! ## Core Concepts
//!
//! ```text
//! [PrimitiveStore] ──► Evaluator::stat ──► FormulaNode (cached)
//!        │                                      ▲
//!        └── change ──► Propagator ──► DirtySet ┘ evict
//! ```
//!
//! 1. **Registry**: built once at startup, then frozen and shared.
//! 2. **Evaluator**: one per character; memoizes derived values.
//! 3. **Propagation**: a change dirties exactly the reachable dependants.
//! 4. **Validation**: proves the graph is acyclic and every formula
//!    declares what it reads.
//!
//! ## Example
//!
//! ```rust
//! use vstat::*;
//! use vstat::formula::ModifiedStat;
//!
//! const BASE_DAMAGE: StatId = StatId::new(0);
//! const INCREASED_DAMAGE: StatId = StatId::new(1);
//! const DEAL_NO_DAMAGE: StatId = StatId::new(2);
//! const DAMAGE: StatId = StatId::new(3);
//!
//! let mut builder = RegistryBuilder::new(4);
//! builder.register_declared(
//!     DAMAGE,
//!     ModifiedStat::base([BASE_DAMAGE])
//!         .increased([INCREASED_DAMAGE])
//!         .unless(DEAL_NO_DAMAGE),
//! );
//! let registry = builder.build();
//!
//! let mut character = Evaluator::new(&registry, DensePrimitives::new(4));
//! character.set_primitive(BASE_DAMAGE, 40);
//! character.set_primitive(INCREASED_DAMAGE, 50);
//! assert_eq!(character.stat(DAMAGE), 60);
//!
//! character.set_primitive(DEAL_NO_DAMAGE, 1);
//! assert_eq!(character.stat(DAMAGE), 0);
//! ```
//!
//! ## Modules
//!
//! - [`stat_id`] - Dense stat identifiers
//! - [`numeric`] - Total arithmetic helpers
//! - [`data`] - Game constants and reference tables
//! - [`primitive`] - Primitive stat stores
//! - [`access`] - The accessor seam formulas read through
//! - [`formula`] - Formula contract and declarative formulas
//! - [`registry`] - Registration and the frozen registry
//! - [`graph`] - Dependency graph checks
//! - [`invalidation`] - Dirty propagation
//! - [`evaluator`] - Memoized evaluation
//! - [`validation`] - Registry validation harness
//! - [`error`] - Error types

pub mod access;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod formula;
pub mod graph;
pub mod invalidation;
pub mod numeric;
pub mod primitive;
pub mod registry;
pub mod stat_id;
pub mod validation;

pub use access::StatAccess;
pub use data::GameData;
pub use error::StatError;
pub use evaluator::{EvalCounters, EvaluationCache, Evaluator};
pub use formula::{DeclaredFormula, Formula, FormulaNode};
pub use invalidation::DirtySet;
pub use primitive::{DensePrimitives, MapPrimitives, PrimitiveStore, PrimitiveStoreMut};
pub use registry::{Registry, RegistryBuilder, StatDefinition};
pub use stat_id::StatId;
pub use validation::{validate_registry, ValidationReport};
