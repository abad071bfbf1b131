use thiserror::Error;

/// Errors surfaced by the simulation, twin and optimization components
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("process type '{0}' not supported")]
    UnknownProcessType(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{kind} with ID {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("algorithm '{0}' not supported")]
    UnsupportedAlgorithm(String),

    #[error("simulation failed: {0}")]
    SimulationFailure(String),

    /// Grid search found no point satisfying every hard constraint.
    /// Recovered by the midpoint fallback; only used for logging.
    #[error("no candidate satisfies all hard constraints ({0} evaluated)")]
    ConstraintInfeasible(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("digital twin {0} is no longer accepting commands")]
    TwinUnavailable(String),
}

impl Error {
    pub(crate) fn twin_not_found(id: &str) -> Self {
        Error::NotFound {
            kind: "Digital twin",
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = Error::twin_not_found("abc");
        assert_eq!(err.to_string(), "Digital twin with ID abc not found");
    }

    #[test]
    fn test_unknown_process_type_message() {
        let err = Error::UnknownProcessType("welding".to_string());
        assert_eq!(err.to_string(), "process type 'welding' not supported");
    }
}
