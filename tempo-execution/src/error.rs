use serde::{Deserialize, Serialize};
use thiserror::Error;
use tempo_instrument::error::InstrumentError;

/// Errors raised by the order state machine, order book simulation and simulated broker.
///
/// Grounded in `barter-execution::error::ExecutionError` and `barter::error::BarterError`'s
/// one-variant-per-failure-mode `thiserror` enums.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
pub enum ExecutionError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("invalid transition: cannot apply {action} to {state}")]
    InvalidTransition { state: String, action: String },

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: String, available: String },

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("unknown order: {0}")]
    UnknownOrder(u64),

    #[error("unknown broker: {0}")]
    UnknownBroker(String),

    #[error("missing price reference for instrument: {0}")]
    MissingPriceReference(String),

    #[error("builder incomplete: missing {0}")]
    BuilderIncomplete(String),

    #[error(transparent)]
    Instrument(#[from] InstrumentError),
}
