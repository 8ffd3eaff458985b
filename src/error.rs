//! Error types for stat registration, validation and data loading.
//!
//! Evaluation itself never fails: every error here is either a startup
//! programmer error or a finding reported by the validation harness.

use crate::stat_id::StatId;
use thiserror::Error;

/// Format a cycle path as a readable string.
fn format_cycle_path(path: &[StatId]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised by the virtual stat engine.
///
/// # Examples
///
/// ```rust
/// use vstat::{StatError, StatId};
///
/// let err = StatError::DuplicateRegistration(StatId::new(4));
/// assert_eq!(err.to_string(), "Virtual stat #4 registered twice");
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatError {
    /// A formula was registered for a stat that already has one.
    #[error("Virtual stat {0} registered twice")]
    DuplicateRegistration(StatId),

    /// A formula declared its own stat as a dependency.
    #[error("Virtual stat {0} depends on itself")]
    SelfDependency(StatId),

    /// A stat id outside the enumeration was used at registration.
    #[error("Stat {id} is outside the stat space of {stat_count} stats")]
    OutOfRange { id: StatId, stat_count: usize },

    /// A dependency cycle was found in the declared graph or during evaluation.
    ///
    /// The path is closed: the first and last entries are the same stat.
    #[error("Cycle detected: {}", format_cycle_path(.path))]
    Cycle { path: Vec<StatId> },

    /// A formula read a stat it did not declare as a dependency.
    #[error("Virtual stat {stat} read undeclared dependency {read}")]
    UndeclaredDependency { stat: StatId, read: StatId },

    /// Two evaluations of the same formula over the same inputs disagreed.
    #[error("Virtual stat {stat} is not deterministic: {first} then {second}")]
    NonDeterministic { stat: StatId, first: i64, second: i64 },

    /// The process-wide registry was already installed.
    #[error("Global registry already installed")]
    RegistryInstalled,

    /// Game data could not be parsed.
    #[error("Invalid game data: {0}")]
    InvalidData(String),
}

impl From<serde_json::Error> for StatError {
    fn from(err: serde_json::Error) -> Self {
        StatError::InvalidData(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StatError::UndeclaredDependency {
            stat: StatId::new(10),
            read: StatId::new(2),
        };
        assert!(err.to_string().contains("#10"));
        assert!(err.to_string().contains("#2"));
    }

    #[test]
    fn test_cycle_error_display() {
        let a = StatId::new(1);
        let b = StatId::new(2);
        let c = StatId::new(3);
        let err = StatError::Cycle {
            path: vec![a, b, c, a],
        };
        assert_eq!(err.to_string(), "Cycle detected: #1 -> #2 -> #3 -> #1");
    }

    #[test]
    fn test_empty_cycle_display() {
        let err = StatError::Cycle { path: Vec::new() };
        assert!(err.to_string().contains("(empty cycle)"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: StatError = json_err.into();
        assert!(matches!(err, StatError::InvalidData(_)));
    }
}
