use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tempo_instrument::book::OrderBook;

/// A fill proposed by [`simulate_fills`], before any [`crate::policy::FillModel`] overlay is
/// applied.
///
/// `quantity`'s sign matches the order side that requested the match (positive for BUY, negative
/// for SELL).
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedFill {
    pub quantity: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Best-price-first consumption of `book`'s resting liquidity against a signed `target_quantity`.
///
/// - `target_quantity > 0` (BUY): walks asks ascending, skipping levels priced above `max_price`
///   when given, until `target_quantity` is met or the filtered asks are exhausted.
/// - `target_quantity < 0` (SELL): walks bids descending, symmetric rules using `min_price`.
///
/// Returns an empty `Vec` if the opposite side is empty (or fully filtered out). Negative prices
/// are valid and are never filtered by this function — only `max_price`/`min_price` filter.
pub fn simulate_fills(
    book: &OrderBook,
    target_quantity: Decimal,
    max_price: Option<Decimal>,
    min_price: Option<Decimal>,
) -> Vec<ProposedFill> {
    if target_quantity.is_zero() {
        return Vec::new();
    }

    if target_quantity.is_sign_positive() {
        walk_levels(&book.asks, target_quantity, max_price, book.timestamp)
    } else {
        walk_levels(&book.bids, target_quantity, min_price, book.timestamp)
            .into_iter()
            .map(|fill| ProposedFill {
                quantity: -fill.quantity,
                ..fill
            })
            .collect()
    }
}

/// Consumes `levels` (already sorted best-first for the relevant side) up to `|target_quantity|`
/// total volume, honoring an optional one-sided price bound.
fn walk_levels(
    levels: &[tempo_instrument::book::BookLevel],
    target_quantity: Decimal,
    price_bound: Option<Decimal>,
    timestamp: DateTime<Utc>,
) -> Vec<ProposedFill> {
    let mut remaining = target_quantity.abs();
    let mut fills = Vec::new();

    for level in levels {
        if remaining <= Decimal::ZERO {
            break;
        }

        let price_filtered = match price_bound {
            Some(bound) if target_quantity.is_sign_positive() => level.price > bound,
            Some(bound) => level.price < bound,
            None => false,
        };
        if price_filtered {
            continue;
        }

        let take = remaining.min(level.volume);
        fills.push(ProposedFill {
            quantity: take,
            price: level.price,
            timestamp,
        });
        remaining -= take;
    }

    fills
}
