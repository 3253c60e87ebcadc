use crate::{currency::CurrencyId, error::InstrumentError};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Identifier for the venue an [`Instrument`] trades on.
///
/// Concrete market-data providers are out of scope for this crate (SPEC_FULL.md §1); `ExchangeId`
/// is therefore a free-form code rather than the closed enum of real venues a live-trading crate
/// would carry (cf. `barter_instrument::exchange::ExchangeId`).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
pub struct ExchangeId(pub SmolStr);

impl ExchangeId {
    pub fn new(code: &str) -> Self {
        Self(SmolStr::new(code))
    }
}

/// Opaque, densely-packed handle onto an [`Instrument`] registered with an [`InstrumentIndex`].
///
/// A derived cache key only: `(name, exchange)` remains the canonical identity. Grounded in
/// `barter_instrument::instrument::InstrumentIndex`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
pub struct InstrumentKey(pub usize);

/// Broad classification of what an [`Instrument`] represents.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    Future,
    FxSpot,
    CommoditySpot,
    Option,
}

/// Comprehensive instrument model: identity is `(name, exchange)`.
///
/// Invariant: `tick_value == price_increment * contract_size` (see [`Instrument::tick_value`]).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Instrument {
    pub name: SmolStr,
    pub exchange: ExchangeId,
    pub asset_class: AssetClass,
    pub price_increment: Decimal,
    pub quantity_increment: Decimal,
    pub contract_size: Decimal,
    pub contract_unit: SmolStr,
    pub quote_currency: CurrencyId,
    pub settlement_currency: CurrencyId,
}

impl Instrument {
    /// Construct a new [`Instrument`], defaulting `settlement_currency` to `quote_currency` as
    /// per SPEC_FULL.md §3.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<SmolStr>,
        exchange: ExchangeId,
        asset_class: AssetClass,
        price_increment: Decimal,
        quantity_increment: Decimal,
        contract_size: Decimal,
        contract_unit: impl Into<SmolStr>,
        quote_currency: CurrencyId,
        settlement_currency: Option<CurrencyId>,
    ) -> Result<Self, InstrumentError> {
        if price_increment <= Decimal::ZERO {
            return Err(InstrumentError::Validation(
                "price_increment must be > 0".into(),
            ));
        }
        if quantity_increment <= Decimal::ZERO {
            return Err(InstrumentError::Validation(
                "quantity_increment must be > 0".into(),
            ));
        }
        if contract_size <= Decimal::ZERO {
            return Err(InstrumentError::Validation("contract_size must be > 0".into()));
        }

        let settlement_currency = settlement_currency.unwrap_or_else(|| quote_currency.clone());

        Ok(Self {
            name: name.into(),
            exchange,
            asset_class,
            price_increment,
            quantity_increment,
            contract_size,
            contract_unit: contract_unit.into(),
            quote_currency,
            settlement_currency,
        })
    }

    /// `price_increment * contract_size` — the monetary value of one tick move.
    pub fn tick_value(&self) -> Decimal {
        self.price_increment * self.contract_size
    }

    /// True if `quantity` is a non-negative multiple of [`Self::quantity_increment`].
    pub fn is_valid_quantity(&self, quantity: Decimal) -> bool {
        quantity > Decimal::ZERO && (quantity % self.quantity_increment).is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd() -> CurrencyId {
        CurrencyId::new("USD")
    }

    #[test]
    fn tick_value_matches_invariant() {
        let instrument = Instrument::new(
            "ES",
            ExchangeId::new("CME"),
            AssetClass::Future,
            dec!(0.25),
            dec!(1),
            dec!(50),
            "contract",
            usd(),
            None,
        )
        .unwrap();

        assert_eq!(instrument.tick_value(), dec!(12.50));
        assert_eq!(instrument.settlement_currency, usd());
    }

    #[test]
    fn rejects_non_positive_increments() {
        let err = Instrument::new(
            "ES",
            ExchangeId::new("CME"),
            AssetClass::Future,
            dec!(0),
            dec!(1),
            dec!(50),
            "contract",
            usd(),
            None,
        );
        assert!(err.is_err());
    }

    #[test]
    fn quantity_validity() {
        let instrument = Instrument::new(
            "ES",
            ExchangeId::new("CME"),
            AssetClass::Future,
            dec!(0.25),
            dec!(2),
            dec!(50),
            "contract",
            usd(),
            None,
        )
        .unwrap();

        assert!(instrument.is_valid_quantity(dec!(4)));
        assert!(!instrument.is_valid_quantity(dec!(3)));
        assert!(!instrument.is_valid_quantity(dec!(0)));
    }
}
