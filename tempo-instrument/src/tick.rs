use crate::error::InstrumentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Single executed trade observation. Negative prices are permitted (e.g. expired commodity
/// futures); volume must be strictly positive.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradeTick {
    pub instrument_name: SmolStr,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub volume: Decimal,
}

impl TradeTick {
    pub fn new(
        instrument_name: impl Into<SmolStr>,
        timestamp: DateTime<Utc>,
        price: Decimal,
        volume: Decimal,
    ) -> Result<Self, InstrumentError> {
        if volume <= Decimal::ZERO {
            return Err(InstrumentError::Validation(
                "TradeTick volume must be > 0".into(),
            ));
        }
        Ok(Self {
            instrument_name: instrument_name.into(),
            timestamp,
            price,
            volume,
        })
    }
}

/// Top-of-book bid/ask observation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QuoteTick {
    pub instrument_name: SmolStr,
    pub timestamp: DateTime<Utc>,
    pub bid_price: Decimal,
    pub bid_volume: Decimal,
    pub ask_price: Decimal,
    pub ask_volume: Decimal,
}

impl QuoteTick {
    pub fn new(
        instrument_name: impl Into<SmolStr>,
        timestamp: DateTime<Utc>,
        bid_price: Decimal,
        bid_volume: Decimal,
        ask_price: Decimal,
        ask_volume: Decimal,
    ) -> Result<Self, InstrumentError> {
        if bid_volume <= Decimal::ZERO || ask_volume <= Decimal::ZERO {
            return Err(InstrumentError::Validation(
                "QuoteTick volumes must be > 0".into(),
            ));
        }
        Ok(Self {
            instrument_name: instrument_name.into(),
            timestamp,
            bid_price,
            bid_volume,
            ask_price,
            ask_volume,
        })
    }
}

/// A single price observation used to drive price-only subscribers.
///
/// Equality/hash purposefully excludes `price` so a late duplicate observation at the same
/// `(instrument, timestamp, price_type)` can be dropped regardless of its price.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PriceSample {
    pub instrument_name: SmolStr,
    pub timestamp: DateTime<Utc>,
    pub price_type: crate::bar::PriceType,
    pub price: Decimal,
}

impl PartialEq for PriceSample {
    fn eq(&self, other: &Self) -> bool {
        self.instrument_name == other.instrument_name
            && self.timestamp == other.timestamp
            && self.price_type == other.price_type
    }
}

impl Eq for PriceSample {}

impl std::hash::Hash for PriceSample {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.instrument_name.hash(state);
        self.timestamp.hash(state);
        self.price_type.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bar::PriceType;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn price_sample_equality_ignores_price() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let a = PriceSample {
            instrument_name: "ES".into(),
            timestamp: ts,
            price_type: PriceType::Last,
            price: dec!(100),
        };
        let b = PriceSample {
            price: dec!(101),
            ..a.clone()
        };

        assert_eq!(a, b);
    }

    #[test]
    fn trade_tick_rejects_non_positive_volume() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(TradeTick::new("ES", ts, dec!(100), dec!(0)).is_err());
    }
}
