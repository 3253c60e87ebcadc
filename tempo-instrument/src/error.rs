use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by [`crate`] value types and the process-wide [`Currency`](crate::currency::Currency)
/// registry.
///
/// Grounded in `barter::error::BarterError` and `barter-execution::error::ExecutionError`'s use
/// of `thiserror` enums with one variant per failure mode.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
pub enum InstrumentError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("currency mismatch: {lhs} vs {rhs}")]
    CurrencyMismatch { lhs: String, rhs: String },
}
