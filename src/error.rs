use thiserror::Error;

/// Failures that abort a power flow before or outside of the iterative
/// solve. Non-convergence is not an error: it is reported through the
/// `success` flag of the result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PowerFlowError {
    #[error("bus number {0} is used by more than one bus")]
    DuplicateBus(usize),

    #[error("{kind} {index} refers to bus {bus} which does not exist")]
    MissingBus {
        kind: &'static str,
        index: usize,
        bus: usize,
    },

    #[error("invalid bus type code {0}")]
    InvalidBusType(usize),

    #[error("bus {index} has number {bus}, buses must be numbered consecutively from 0")]
    NonConsecutiveBus { index: usize, bus: usize },

    #[error("case must be converted to internal ordering")]
    NotInternal,

    #[error("case has no \"order\" field, it must be converted with ext_to_int first")]
    MissingOrder,

    #[error("no reference bus and no PV bus available to take its place")]
    NoReferenceBus,

    #[error("cannot enforce Q limits at slack bus {0} in a system with multiple slacks")]
    MultipleSlackQLimit(usize),

    #[error("expected {expected} values for {what}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("matrix is singular")]
    Singular,
}
