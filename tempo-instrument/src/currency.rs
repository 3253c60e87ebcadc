use crate::error::InstrumentError;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{
    collections::HashMap,
    sync::{OnceLock, RwLock},
};

/// ISO-like identity for a [`Currency`]. Cheap to copy and hash.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
pub struct CurrencyId(pub SmolStr);

impl CurrencyId {
    pub fn new(code: &str) -> Self {
        Self(SmolStr::new(code))
    }
}

impl From<&str> for CurrencyId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Broad classification of a [`Currency`], used only for display/reporting purposes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyKind {
    Fiat,
    Crypto,
    Commodity,
}

/// A tradable or settlement currency.
///
/// Attributes: `precision` (decimal places used when rounding amounts denominated in this
/// currency), `display_name`, and `kind`.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Currency {
    pub code: CurrencyId,
    pub precision: u32,
    pub display_name: SmolStr,
    pub kind: CurrencyKind,
}

impl Currency {
    pub fn new(code: &str, precision: u32, display_name: &str, kind: CurrencyKind) -> Self {
        Self {
            code: CurrencyId::new(code),
            precision,
            display_name: SmolStr::new(display_name),
            kind,
        }
    }
}

/// Process-wide [`Currency`] registry, keyed by [`CurrencyId`].
///
/// Mutated only at initialization (see [`CurrencyRegistry::register`]); every other access is a
/// read. This is one of only two process-wide singletons permitted by the design (the other being
/// an order-id generator owned by the `Engine`) — see SPEC_FULL.md §9.
static REGISTRY: OnceLock<RwLock<HashMap<CurrencyId, Currency>>> = OnceLock::new();

/// Handle onto the process-wide [`Currency`] registry.
#[derive(Debug, Default, Copy, Clone)]
pub struct CurrencyRegistry;

impl CurrencyRegistry {
    fn map() -> &'static RwLock<HashMap<CurrencyId, Currency>> {
        REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
    }

    /// Register a [`Currency`] under its code. Intended to be called only during process
    /// initialization; re-registering an existing code overwrites the prior entry.
    pub fn register(currency: Currency) {
        Self::map()
            .write()
            .expect("currency registry lock poisoned")
            .insert(currency.code.clone(), currency);
    }

    /// Look up a previously registered [`Currency`] by code.
    pub fn get(code: &CurrencyId) -> Result<Currency, InstrumentError> {
        Self::map()
            .read()
            .expect("currency registry lock poisoned")
            .get(code)
            .cloned()
            .ok_or_else(|| InstrumentError::UnknownCurrency(code.0.to_string()))
    }

    pub fn is_registered(code: &CurrencyId) -> bool {
        Self::map()
            .read()
            .expect("currency registry lock poisoned")
            .contains_key(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_get_round_trips() {
        CurrencyRegistry::register(Currency::new("TST", 2, "Test Coin", CurrencyKind::Crypto));

        let found = CurrencyRegistry::get(&CurrencyId::new("TST")).unwrap();
        assert_eq!(found.precision, 2);
        assert_eq!(found.kind, CurrencyKind::Crypto);
    }

    #[test]
    fn unknown_code_errors() {
        let err = CurrencyRegistry::get(&CurrencyId::new("DOES_NOT_EXIST"));
        assert!(matches!(err, Err(InstrumentError::UnknownCurrency(_))));
    }
}
