use thiserror::Error;

/// The error kinds shared by all analysis components.
///
/// No component recovers from these internally; every fallible operation
/// surfaces its error to the caller.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Structural problem in the net: bipartite violation, dangling
    /// reference, non-1-safe input, or an unknown place/transition id.
    #[error("invalid net: {0}")]
    InvalidNet(String),

    /// An attempt to fire a transition that is not enabled.
    #[error("transition `{0}` is not enabled in the given marking")]
    NotEnabled(String),

    /// A symbolic query was issued before `initialize`.
    #[error("symbolic engine is not initialized")]
    EngineUninitialized,

    /// A membership or optimization query was issued before
    /// `compute_reachability`.
    #[error("reachable set has not been computed")]
    EngineNotComputed,

    /// The ILP solver returned a status that is neither optimal
    /// nor infeasible.
    #[error("ILP solver failure: {0}")]
    SolverFailure(String),

    /// Cooperative cancellation was requested by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// The input file could not be read.
    #[error("cannot read input: {0}")]
    Io(#[from] std::io::Error),
}
