use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("strategy `{strategy}` exceeded its {budget:?} time slice")]
    StrategyTimeout {
        strategy: String,
        budget: Duration,
    },
    #[error("strategy `{strategy}` failed: {message}")]
    StrategyFailed { strategy: String, message: String },
    #[error("strategy `{strategy}` panicked")]
    StrategyPanicked { strategy: String },
    #[error("layout computation was cancelled")]
    Cancelled,
    #[error("strategy `{strategy}` produced a non-finite position for node {node_id}")]
    NonFinitePosition { strategy: String, node_id: String },
    #[error("strategy `{strategy}` broke the layout contract: {message}")]
    ContractViolation { strategy: String, message: String },
    #[error("no layout strategy produced a result after {attempts} attempt(s): {reasons}")]
    NoValidLayout { attempts: usize, reasons: String },
}

pub type Result<T> = std::result::Result<T, Error>;
