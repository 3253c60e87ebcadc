use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// One `(price, volume)` entry in an [`OrderBook`] side. `volume` is always `> 0`.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub volume: Decimal,
}

impl BookLevel {
    pub fn new(price: Decimal, volume: Decimal) -> Self {
        Self { price, volume }
    }
}

/// Depth-of-book snapshot for a single instrument at a single timestamp.
///
/// Invariants: bids sorted descending by price, asks sorted ascending by price; zero spread
/// (`bid_top == ask_top`) is allowed; negative prices are allowed; either side may be empty.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderBook {
    pub instrument_name: SmolStr,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    /// Construct a new [`OrderBook`], sorting both sides into their canonical order.
    pub fn new(
        instrument_name: impl Into<SmolStr>,
        timestamp: DateTime<Utc>,
        mut bids: Vec<BookLevel>,
        mut asks: Vec<BookLevel>,
    ) -> Self {
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));

        Self {
            instrument_name: instrument_name.into(),
            timestamp,
            bids,
            asks,
        }
    }

    /// A single-level book with identical bid and ask price (and, usually, volume) — the shape
    /// produced by the trade-tick and bar legs of the Event → OrderBook converter.
    pub fn zero_spread(
        instrument_name: impl Into<SmolStr>,
        timestamp: DateTime<Utc>,
        price: Decimal,
        volume: Decimal,
    ) -> Self {
        Self::new(
            instrument_name,
            timestamp,
            vec![BookLevel::new(price, volume)],
            vec![BookLevel::new(price, volume)],
        )
    }

    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn sorts_bids_desc_and_asks_asc() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let book = OrderBook::new(
            "ES",
            ts,
            vec![
                BookLevel::new(dec!(99), dec!(1)),
                BookLevel::new(dec!(101), dec!(1)),
                BookLevel::new(dec!(100), dec!(1)),
            ],
            vec![
                BookLevel::new(dec!(103), dec!(1)),
                BookLevel::new(dec!(102), dec!(1)),
            ],
        );

        assert_eq!(book.bids[0].price, dec!(101));
        assert_eq!(book.bids[2].price, dec!(99));
        assert_eq!(book.asks[0].price, dec!(102));
    }

    #[test]
    fn zero_spread_book_allows_equal_top_of_book() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let book = OrderBook::zero_spread("ES", ts, dec!(100), dec!(5));

        assert_eq!(book.best_bid().unwrap().price, book.best_ask().unwrap().price);
    }
}
