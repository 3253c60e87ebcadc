use crate::{book_fill::ProposedFill, order::Order};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tempo_instrument::{book::OrderBook, currency::CurrencyId, instrument::Instrument, money::Money};

/// Computes the commission owed on a [`ProposedFill`] (SPEC_FULL.md §4.G).
pub trait FeeModel: std::fmt::Debug {
    fn compute_commission(
        &self,
        proposed_fill: &ProposedFill,
        order: &Order,
        previous_fills_of_account: &[Money],
    ) -> Money;
}

/// Fixed fee per unit traded, independent of price or account history.
#[derive(Debug, Clone)]
pub struct FixedPerUnitFeeModel {
    pub fee_per_unit: Decimal,
    pub currency: CurrencyId,
}

impl FeeModel for FixedPerUnitFeeModel {
    fn compute_commission(
        &self,
        proposed_fill: &ProposedFill,
        _order: &Order,
        _previous_fills_of_account: &[Money],
    ) -> Money {
        Money::new(self.fee_per_unit * proposed_fill.quantity.abs(), self.currency.clone())
    }
}

/// Computes initial and maintenance margin requirements (SPEC_FULL.md §4.G).
pub trait MarginModel: std::fmt::Debug {
    fn compute_initial_margin(
        &self,
        instrument: &Instrument,
        order_book: &OrderBook,
        trade_quantity: Decimal,
        is_buy: bool,
        timestamp: DateTime<Utc>,
    ) -> Money;

    fn compute_maintenance_margin(
        &self,
        instrument: &Instrument,
        order_book: &OrderBook,
        net_position_quantity: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Money;
}

/// Fixed ratio of `|price| * |qty| * contract_size`, symmetric for long and short positions.
#[derive(Debug, Clone)]
pub struct FixedRatioMarginModel {
    pub ratio: Decimal,
}

impl FixedRatioMarginModel {
    fn reference_price(order_book: &OrderBook) -> Decimal {
        order_book
            .best_bid()
            .or_else(|| order_book.best_ask())
            .map(|level| level.price)
            .unwrap_or(Decimal::ZERO)
    }

    fn margin_for(&self, instrument: &Instrument, price: Decimal, quantity: Decimal, currency: CurrencyId) -> Money {
        let notional = price.abs() * quantity.abs() * instrument.contract_size;
        Money::new(notional * self.ratio, currency)
    }
}

impl MarginModel for FixedRatioMarginModel {
    fn compute_initial_margin(
        &self,
        instrument: &Instrument,
        order_book: &OrderBook,
        trade_quantity: Decimal,
        _is_buy: bool,
        _timestamp: DateTime<Utc>,
    ) -> Money {
        let price = Self::reference_price(order_book);
        self.margin_for(instrument, price, trade_quantity, instrument.settlement_currency.clone())
    }

    fn compute_maintenance_margin(
        &self,
        instrument: &Instrument,
        order_book: &OrderBook,
        net_position_quantity: Decimal,
        _timestamp: DateTime<Utc>,
    ) -> Money {
        let price = Self::reference_price(order_book);
        self.margin_for(
            instrument,
            price,
            net_position_quantity,
            instrument.settlement_currency.clone(),
        )
    }
}

/// Applies an overlay (slippage, partial/probabilistic fill, etc.) to the fills proposed by
/// [`crate::book_fill::simulate_fills`] (SPEC_FULL.md §4.G).
pub trait FillModel: std::fmt::Debug {
    fn apply_fill_policy(
        &self,
        order: &Order,
        order_book: &OrderBook,
        proposed_fills: Vec<ProposedFill>,
    ) -> Vec<ProposedFill>;
}

/// Default [`FillModel`]: takes every proposed fill unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityFillModel;

impl FillModel for IdentityFillModel {
    fn apply_fill_policy(
        &self,
        _order: &Order,
        _order_book: &OrderBook,
        proposed_fills: Vec<ProposedFill>,
    ) -> Vec<ProposedFill> {
        proposed_fills
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderId, OrderType, Side, TimeInForce, TradeDirection};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempo_instrument::instrument::{AssetClass, ExchangeId};

    fn instrument() -> Instrument {
        Instrument::new(
            "ES",
            ExchangeId::new("CME"),
            AssetClass::Future,
            dec!(0.25),
            dec!(1),
            dec!(50),
            "contract",
            CurrencyId::new("USD"),
            None,
        )
        .unwrap()
    }

    fn order() -> Order {
        Order::new(
            OrderId(1),
            "ES",
            Side::Buy,
            dec!(2),
            OrderType::Market,
            TimeInForce::Gtc,
            None,
            None,
            TradeDirection::Entry,
            Vec::new(),
        )
    }

    #[test]
    fn fixed_fee_scales_with_quantity() {
        let model = FixedPerUnitFeeModel {
            fee_per_unit: dec!(0.5),
            currency: CurrencyId::new("USD"),
        };
        let fill = ProposedFill { quantity: dec!(4), price: dec!(100), timestamp: Utc::now() };

        assert_eq!(model.compute_commission(&fill, &order(), &[]).amount, dec!(2.0));
    }

    #[test]
    fn fixed_ratio_margin_is_symmetric_long_short() {
        let model = FixedRatioMarginModel { ratio: dec!(0.1) };
        let instrument = instrument();
        let book = OrderBook::zero_spread("ES", Utc::now(), dec!(100), dec!(10));

        let long = model.compute_initial_margin(&instrument, &book, dec!(2), true, Utc::now());
        let short = model.compute_initial_margin(&instrument, &book, dec!(-2), false, Utc::now());

        assert_eq!(long.amount, short.amount);
        assert_eq!(long.amount, dec!(100) * dec!(2) * dec!(50) * dec!(0.1));
    }

    #[test]
    fn identity_fill_model_passes_through() {
        let fills = vec![ProposedFill { quantity: dec!(1), price: dec!(100), timestamp: Utc::now() }];
        let book = OrderBook::zero_spread("ES", Utc::now(), dec!(100), dec!(10));
        assert_eq!(IdentityFillModel.apply_fill_policy(&order(), &book, fills.clone()), fills);
    }
}
