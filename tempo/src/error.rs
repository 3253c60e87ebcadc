use serde::{Deserialize, Serialize};
use thiserror::Error;
use tempo_execution::error::ExecutionError;
use tempo_instrument::error::InstrumentError;

/// Errors raised by event feeds, the strategy/engine lifecycle FSMs and the scheduling loop.
///
/// Grounded in `barter::error::BarterError` and `barter-execution::error::ExecutionError`'s
/// one-variant-per-failure-mode `thiserror` enums (see SPEC_FULL.md §7).
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
pub enum EngineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("invalid transition: cannot apply {action} to {state}")]
    InvalidTransition { state: String, action: String },

    #[error("unknown listener key: {0}")]
    UnknownListener(String),

    #[error("duplicate listener key: {0}")]
    DuplicateListener(String),

    #[error("unknown feed key: {0}")]
    UnknownFeed(String),

    #[error("duplicate feed key: {0}")]
    DuplicateFeed(String),

    #[error("unknown broker key: {0}")]
    UnknownBroker(String),

    #[error("duplicate broker key: {0}")]
    DuplicateBroker(String),

    #[error("builder incomplete: missing {0}")]
    BuilderIncomplete(String),

    #[error("strategy is not running")]
    StrategyNotRunning,

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Instrument(#[from] InstrumentError),
}
