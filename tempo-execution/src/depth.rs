use tempo_instrument::book::OrderBook;

/// Pluggable pass that enriches a canonical order book with spread, depth, or slippage.
///
/// Implementations must preserve `instrument_name` and `timestamp`. The enriched book becomes the
/// single source of pricing truth consumed by the simulated broker for that timestamp
/// (SPEC_FULL.md §4.F).
pub trait MarketDepthModel: std::fmt::Debug {
    fn enrich(&self, book: OrderBook) -> OrderBook;
}

/// Default [`MarketDepthModel`]: returns its input unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroSpreadDepthModel;

impl MarketDepthModel for ZeroSpreadDepthModel {
    fn enrich(&self, book: OrderBook) -> OrderBook {
        book
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_spread_model_is_identity() {
        let book = OrderBook::zero_spread("ES", Utc::now(), dec!(100), dec!(5));
        let enriched = ZeroSpreadDepthModel.enrich(book.clone());
        assert_eq!(enriched, book);
    }
}
