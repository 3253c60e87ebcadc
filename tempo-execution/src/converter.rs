use chrono::{DateTime, Utc};
use rand::RngCore;
use rust_decimal::Decimal;
use tempo_instrument::{
    bar::Bar,
    book::OrderBook,
    event::{Event, EventKind},
    tick::{QuoteTick, TradeTick},
};

/// Deterministically decomposes a market-data [`Event`] into zero or more canonical
/// [`OrderBook`] snapshots (SPEC_FULL.md §4.E). `TimeNotification` events produce none.
///
/// The one non-deterministic case — a bar whose high and low are exactly equidistant from its
/// open — is resolved by drawing a single bit from `rng`, matching the Open Question recorded in
/// SPEC_FULL.md §9: callers that need reproducibility should pass a seeded RNG.
pub fn event_to_order_books(event: &Event, rng: &mut dyn RngCore) -> Vec<OrderBook> {
    match &event.kind {
        EventKind::QuoteTick(tick) => vec![quote_to_book(tick)],
        EventKind::TradeTick(tick) => vec![trade_to_book(tick)],
        EventKind::Bar(bar) => bar_to_books(bar, rng),
        EventKind::TimeNotification => Vec::new(),
    }
}

fn quote_to_book(tick: &QuoteTick) -> OrderBook {
    OrderBook::new(
        tick.instrument_name.clone(),
        tick.timestamp,
        vec![tempo_instrument::book::BookLevel::new(tick.bid_price, tick.bid_volume)],
        vec![tempo_instrument::book::BookLevel::new(tick.ask_price, tick.ask_volume)],
    )
}

fn trade_to_book(tick: &TradeTick) -> OrderBook {
    OrderBook::zero_spread(
        tick.instrument_name.clone(),
        tick.timestamp,
        tick.price,
        tick.volume,
    )
}

fn bar_to_books(bar: &Bar, rng: &mut dyn RngCore) -> Vec<OrderBook> {
    let volume = bar.volume;
    let dur = bar.end_dt - bar.start_dt;
    let one_third = bar.start_dt + dur / 3;
    let two_thirds = bar.start_dt + (dur * 2) / 3;

    let dist_high = (bar.high - bar.open).abs();
    let dist_low = (bar.open - bar.low).abs();

    let high_first = match dist_high.cmp(&dist_low) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => rng.next_u32() % 2 == 0,
    };

    let (mid_first_price, mid_second_price) = if high_first {
        (bar.high, bar.low)
    } else {
        (bar.low, bar.high)
    };

    let instrument = &bar.bar_type.instrument_name;
    vec![
        book_at(instrument, bar.start_dt, bar.open, volume),
        book_at(instrument, one_third, mid_first_price, volume),
        book_at(instrument, two_thirds, mid_second_price, volume),
        book_at(instrument, bar.end_dt, bar.close, volume),
    ]
}

fn book_at(instrument: &str, timestamp: DateTime<Utc>, price: Decimal, volume: Decimal) -> OrderBook {
    OrderBook::zero_spread(instrument, timestamp, price, volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use rust_decimal_macros::dec;
    use tempo_instrument::bar::{BarType, PeriodUnit, PriceType};

    fn bar_type() -> BarType {
        BarType {
            instrument_name: "ES".into(),
            period_value: 1,
            period_unit: PeriodUnit::Minute,
            price_type: PriceType::Last,
        }
    }

    #[test]
    fn bar_decomposes_into_four_books_open_then_extremes_then_close() {
        let start = Utc::now();
        let end = start + chrono::Duration::minutes(1);
        let bar = Bar::new(bar_type(), start, end, dec!(10), dec!(15), dec!(8), dec!(12), dec!(100), false).unwrap();

        let event = Event::bar(bar.clone(), start);
        let mut rng = StdRng::seed_from_u64(1);
        let books = event_to_order_books(&event, &mut rng);

        assert_eq!(books.len(), 4);
        assert_eq!(books[0].best_bid().unwrap().price, dec!(10));
        assert_eq!(books[3].best_bid().unwrap().price, dec!(12));

        let mid_prices: Vec<Decimal> = books[1..3].iter().map(|b| b.best_bid().unwrap().price).collect();
        assert!(mid_prices.contains(&dec!(15)));
        assert!(mid_prices.contains(&dec!(8)));

        // high (15) is 5 away from open (10); low (8) is 2 away - low is closer, so emitted first.
        assert_eq!(books[1].best_bid().unwrap().price, dec!(8));
        assert_eq!(books[2].best_bid().unwrap().price, dec!(15));
    }

    #[test]
    fn bar_volume_sums_to_total_across_books() {
        let start = Utc::now();
        let end = start + chrono::Duration::minutes(1);
        let bar = Bar::new(bar_type(), start, end, dec!(10), dec!(11), dec!(9), dec!(10), dec!(40), false).unwrap();

        let event = Event::bar(bar, start);
        let mut rng = StdRng::seed_from_u64(7);
        let books = event_to_order_books(&event, &mut rng);

        let total: Decimal = books.iter().map(|b| b.best_bid().unwrap().volume).sum();
        assert_eq!(total, dec!(160));
    }

    #[test]
    fn tie_is_resolved_by_seeded_rng_deterministically() {
        let start = Utc::now();
        let end = start + chrono::Duration::minutes(1);
        // high and low both 2 away from open: a genuine tie.
        let bar = Bar::new(bar_type(), start, end, dec!(10), dec!(12), dec!(8), dec!(10), dec!(0), false).unwrap();

        let event = Event::bar(bar, start);
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);

        let books_a = event_to_order_books(&event, &mut rng_a);
        let books_b = event_to_order_books(&event, &mut rng_b);

        assert_eq!(books_a[1].best_bid().unwrap().price, books_b[1].best_bid().unwrap().price);
    }

    #[test]
    fn trade_tick_produces_zero_spread_book() {
        let tick = TradeTick::new("ES", Utc::now(), dec!(100), dec!(5)).unwrap();
        let event = Event::trade_tick(tick, Utc::now());
        let mut rng = StdRng::seed_from_u64(1);
        let books = event_to_order_books(&event, &mut rng);

        assert_eq!(books.len(), 1);
        assert_eq!(books[0].best_bid().unwrap().price, books[0].best_ask().unwrap().price);
    }
}
