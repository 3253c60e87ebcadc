use crate::{error::InstrumentError, instrument::Instrument};
use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Unit a [`BarType`]'s period is expressed in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Tick,
    Volume,
}

/// Which price a bar's OHLC was built from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    Bid,
    Ask,
    Last,
    Mid,
}

/// Identity for a class of bars: `(instrument, period value, period unit, price type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct BarType {
    pub instrument_name: smol_str::SmolStr,
    pub period_value: u64,
    pub period_unit: PeriodUnit,
    pub price_type: PriceType,
}

impl BarType {
    pub fn new(
        instrument: &Instrument,
        period_value: u64,
        period_unit: PeriodUnit,
        price_type: PriceType,
    ) -> Self {
        Self {
            instrument_name: instrument.name.clone(),
            period_value,
            period_unit,
            price_type,
        }
    }
}

/// Aggregated OHLCV observation over a closed time (or volume) window.
///
/// Invariants: `low <= {open, close} <= high`; `start_dt < end_dt`; both timestamps UTC.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Bar {
    pub bar_type: BarType,
    pub start_dt: DateTime<Utc>,
    pub end_dt: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub is_partial: bool,
}

impl Bar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bar_type: BarType,
        start_dt: DateTime<Utc>,
        end_dt: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        is_partial: bool,
    ) -> Result<Self, InstrumentError> {
        if start_dt >= end_dt {
            return Err(InstrumentError::Validation(
                "Bar start_dt must be < end_dt".into(),
            ));
        }
        if low > open || low > close || low > high || high < open || high < close {
            return Err(InstrumentError::Validation(
                "Bar must satisfy low <= {open, close} <= high".into(),
            ));
        }
        if volume < Decimal::ZERO {
            return Err(InstrumentError::Validation("Bar volume must be >= 0".into()));
        }

        Ok(Self {
            bar_type,
            start_dt,
            end_dt,
            open,
            high,
            low,
            close,
            volume,
            is_partial,
        })
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_dt - self.start_dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{AssetClass, ExchangeId};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn bar_type() -> BarType {
        let instrument = Instrument::new(
            "ES",
            ExchangeId::new("CME"),
            AssetClass::Future,
            dec!(0.25),
            dec!(1),
            dec!(50),
            "contract",
            crate::currency::CurrencyId::new("USD"),
            None,
        )
        .unwrap();

        BarType::new(&instrument, 1, PeriodUnit::Minute, PriceType::Last)
    }

    #[test]
    fn rejects_inverted_high_low() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();

        let err = Bar::new(
            bar_type(),
            start,
            end,
            dec!(10),
            dec!(9),
            dec!(11),
            dec!(10),
            dec!(0),
            false,
        );
        assert!(err.is_err());
    }

    #[test]
    fn accepts_valid_bar() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();

        let bar = Bar::new(
            bar_type(),
            start,
            end,
            dec!(10),
            dec!(12),
            dec!(9),
            dec!(11),
            dec!(100),
            false,
        )
        .unwrap();

        assert_eq!(bar.duration(), chrono::Duration::minutes(1));
    }
}
