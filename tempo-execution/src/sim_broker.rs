use crate::{
    account::Account,
    book_fill::simulate_fills,
    broker::{Broker, LastOrderBookSource, LastPriceSampleSource, PriceSampleProcessor},
    depth::{MarketDepthModel, ZeroSpreadDepthModel},
    error::ExecutionError,
    order::{Order, OrderAction, OrderFill, OrderId, OrderStatus, OrderType, Side, TimeInForce, TriggerKind},
    policy::{FeeModel, FillModel, IdentityFillModel, MarginModel},
};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use tempo_instrument::{
    book::OrderBook,
    instrument::Instrument,
    money::Money,
    tick::{PriceSample, PriceType},
};
use tracing::warn;

/// Single simulated broker: one instrument universe, one account, one set of pluggable policies
/// (SPEC_FULL.md §4.H). Owns the canonical order objects once submitted — strategies and the
/// routing registry refer to them by [`OrderId`] thereafter.
///
/// The per-instrument lookup maps use `FnvHashMap`, matching the hashing choice
/// `barter_instrument::instrument::map::InstrumentMap` makes for its own small, string-keyed
/// index tables.
#[derive(Debug)]
pub struct SimulatedBroker {
    instruments: FnvHashMap<SmolStr, Instrument>,
    orders: BTreeMap<OrderId, Order>,
    orders_by_instrument: FnvHashMap<SmolStr, Vec<OrderId>>,
    account: Account,
    depth_model: Box<dyn MarketDepthModel>,
    fee_model: Box<dyn FeeModel>,
    margin_model: Box<dyn MarginModel>,
    fill_model: Box<dyn FillModel>,
    last_books: FnvHashMap<SmolStr, OrderBook>,
    connected: bool,
}

impl SimulatedBroker {
    pub fn builder() -> SimulatedBrokerBuilder {
        SimulatedBrokerBuilder::default()
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Registers an order in `Pending` state without submitting it for matching. Used to park the
    /// child legs of a bracket until a [`TriggerKind::Activate`] fires on the parent.
    pub fn add_pending_order(&mut self, order: Order) {
        self.register(order.id, &order.instrument_name.clone());
        self.orders.insert(order.id, order);
    }

    fn register(&mut self, id: OrderId, instrument_name: &str) {
        let ids = self.orders_by_instrument.entry(SmolStr::new(instrument_name)).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    fn instrument(&self, name: &str) -> Result<&Instrument, ExecutionError> {
        self.instruments
            .get(name)
            .ok_or_else(|| ExecutionError::UnknownInstrument(name.to_string()))
    }

    fn last_book(&self, name: &str) -> Result<&OrderBook, ExecutionError> {
        self.last_books
            .get(name)
            .ok_or_else(|| ExecutionError::MissingPriceReference(name.to_string()))
    }

    /// Applies a freshly-converted/enriched [`OrderBook`] against every active order resting on
    /// that instrument, id-ascending, and reports the fills produced.
    ///
    /// Triggered companions (`TriggerRelationship`) are activated or cancelled within this same
    /// call, the moment their parent first reaches `Filled`.
    pub fn process_order_book(&mut self, book: OrderBook) -> Result<Vec<OrderFill>, ExecutionError> {
        let book = self.depth_model.enrich(book);
        let instrument_name = book.instrument_name.clone();
        self.last_books.insert(instrument_name.clone(), book.clone());

        let instrument = match self.instrument(&instrument_name) {
            Ok(instrument) => instrument.clone(),
            Err(error) => {
                warn!(%error, %instrument_name, "ignoring order book for an instrument this broker does not trade");
                return Ok(Vec::new());
            }
        };

        let reference = reference_price(&book);
        let mut order_ids = self.orders_by_instrument.get(&instrument_name).cloned().unwrap_or_default();
        order_ids.sort();

        let mut new_fills = Vec::new();
        let mut newly_filled_parents = Vec::new();

        for id in order_ids {
            let order = match self.orders.get(&id) {
                Some(order) if order.status().is_active() => order.clone(),
                _ => continue,
            };
            if !order.crosses_trigger(reference) {
                continue;
            }

            let target_quantity = order.remaining_quantity() * order.side.sign();
            let (max_price, min_price) = price_bounds(&order);
            let proposed = simulate_fills(&book, target_quantity, max_price, min_price);
            let proposed = self.fill_model.apply_fill_policy(&order, &book, proposed);

            let total_proposed: Decimal = proposed.iter().map(|fill| fill.quantity.abs()).sum();
            if order.time_in_force == TimeInForce::Fok && total_proposed < order.remaining_quantity() {
                self.orders.get_mut(&id).unwrap().apply(OrderAction::Cancel)?;
                self.account.release_remaining_margin(id, &instrument_name);
                continue;
            }

            if proposed.is_empty() {
                if order.time_in_force == TimeInForce::Ioc {
                    self.orders.get_mut(&id).unwrap().apply(OrderAction::Cancel)?;
                    self.account.release_remaining_margin(id, &instrument_name);
                }
                continue;
            }

            for proposed_fill in &proposed {
                let commission = self.fee_model.compute_commission(proposed_fill, &order, self.account.paid_fees());
                let fill = OrderFill {
                    order_id: id,
                    quantity: proposed_fill.quantity,
                    price: proposed_fill.price,
                    timestamp: proposed_fill.timestamp,
                    commission: commission.clone(),
                };

                self.orders.get_mut(&id).unwrap().record_fill(fill.clone())?;
                self.account.record_fee(commission);
                self.account.settle_fill(fill.quantity, fill.price, instrument.contract_size, instrument.settlement_currency.clone());
                self.account.adjust_net_position(&instrument_name, fill.quantity);

                let release_fraction = fill.quantity.abs() / order.quantity;
                self.account.release_margin_fraction(id, &instrument_name, release_fraction);

                let net_position = self.account.net_position(&instrument_name);
                let maintenance = self
                    .margin_model
                    .compute_maintenance_margin(&instrument, &book, net_position, book.timestamp);
                self.account.set_maintenance_margin(&instrument_name, maintenance);

                new_fills.push(fill);
            }

            let final_status = self.orders.get(&id).unwrap().status();
            if final_status == OrderStatus::Filled {
                // The per-fill `release_margin_fraction` calls above compute each release against
                // the order's original quantity while `Account` tracks the *current* remaining
                // block; across more than one fill those two telescope and under-release. Once
                // the order is actually done, release whatever fraction is left outright rather
                // than trust the running total to have reached zero.
                self.account.release_remaining_margin(id, &instrument_name);
                newly_filled_parents.push(id);
            } else if order.time_in_force == TimeInForce::Ioc && final_status == OrderStatus::PartiallyFilled {
                self.orders.get_mut(&id).unwrap().apply(OrderAction::Cancel)?;
                self.account.release_remaining_margin(id, &instrument_name);
            }
        }

        for parent_id in newly_filled_parents {
            let triggers = self.orders.get(&parent_id).map(|order| order.triggers.clone()).unwrap_or_default();
            for trigger in triggers {
                match trigger.kind {
                    TriggerKind::Cancel => {
                        let _ = self.cancel_order(trigger.other);
                    }
                    TriggerKind::Activate => {
                        let pending = self
                            .orders
                            .get(&trigger.other)
                            .filter(|order| order.status() == OrderStatus::Pending)
                            .cloned();
                        if let Some(pending) = pending {
                            let _ = self.submit_order(pending);
                        }
                    }
                }
            }
        }

        Ok(new_fills)
    }
}

/// Mid of best bid/ask, falling back to whichever side is present; `0` if the book is empty.
fn reference_price(book: &OrderBook) -> Decimal {
    match (book.best_bid(), book.best_ask()) {
        (Some(bid), Some(ask)) => (bid.price + ask.price) / Decimal::from(2),
        (Some(bid), None) => bid.price,
        (None, Some(ask)) => ask.price,
        (None, None) => Decimal::ZERO,
    }
}

/// The one-sided price filter `simulate_fills` should apply for this order, given its type and
/// side. `Stop`/`StopLimit` orders only reach here once [`Order::crosses_trigger`] has fired, at
/// which point `Stop` behaves like `Market` and `StopLimit` like `Limit`.
fn price_bounds(order: &Order) -> (Option<Decimal>, Option<Decimal>) {
    match (order.order_type, order.side) {
        (OrderType::Market, _) | (OrderType::Stop, _) => (None, None),
        (OrderType::Limit, Side::Buy) | (OrderType::StopLimit, Side::Buy) => (order.limit_price, None),
        (OrderType::Limit, Side::Sell) | (OrderType::StopLimit, Side::Sell) => (None, order.limit_price),
    }
}

impl Broker for SimulatedBroker {
    fn connect(&mut self) -> Result<(), ExecutionError> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ExecutionError> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn submit_order(&mut self, mut order: Order) -> Result<(), ExecutionError> {
        let instrument = self.instrument(&order.instrument_name)?.clone();
        if !instrument.is_valid_quantity(order.quantity) {
            return Err(ExecutionError::Validation(format!(
                "quantity {} is not a valid multiple of {} for {}",
                order.quantity, instrument.quantity_increment, instrument.name
            )));
        }

        order.apply(OrderAction::Submit)?;

        let book = self.last_book(&order.instrument_name)?.clone();
        let signed_quantity = order.quantity * order.side.sign();
        let is_buy = matches!(order.side, Side::Buy);
        let margin = self
            .margin_model
            .compute_initial_margin(&instrument, &book, signed_quantity, is_buy, book.timestamp);

        if self.account.available(&instrument.settlement_currency) < margin.amount {
            order.apply(OrderAction::Reject)?;
            self.register(order.id, &order.instrument_name.clone());
            self.orders.insert(order.id, order);
            return Ok(());
        }

        order.apply(OrderAction::Accept)?;
        self.account.block_initial_margin(order.id, &order.instrument_name, margin);
        self.register(order.id, &order.instrument_name.clone());
        self.orders.insert(order.id, order);
        Ok(())
    }

    fn cancel_order(&mut self, order_id: OrderId) -> Result<(), ExecutionError> {
        let order = self.orders.get_mut(&order_id).ok_or(ExecutionError::UnknownOrder(order_id.0))?;
        order.apply(OrderAction::Cancel)?;
        let instrument_name = order.instrument_name.clone();
        self.account.release_remaining_margin(order_id, &instrument_name);
        Ok(())
    }

    fn modify_order(
        &mut self,
        order_id: OrderId,
        new_quantity: Decimal,
        new_limit_price: Option<Decimal>,
    ) -> Result<(), ExecutionError> {
        let order = self.orders.get(&order_id).ok_or(ExecutionError::UnknownOrder(order_id.0))?;
        if !order.status().is_active() {
            return Err(ExecutionError::Validation("cannot modify an inactive order".into()));
        }
        if new_quantity < order.filled_quantity() {
            return Err(ExecutionError::Validation(
                "new quantity cannot be below already-filled quantity".into(),
            ));
        }

        let instrument = self.instrument(&order.instrument_name)?.clone();
        let book = self.last_book(&order.instrument_name)?.clone();
        let is_buy = matches!(order.side, Side::Buy);
        let signed_remaining = (new_quantity - order.filled_quantity()) * order.side.sign();
        let new_margin = self
            .margin_model
            .compute_initial_margin(&instrument, &book, signed_remaining, is_buy, book.timestamp);
        let currently_blocked = self.account.blocked_initial_margin(&order.instrument_name);

        let order = self.orders.get_mut(&order_id).unwrap();
        if new_margin.amount > currently_blocked {
            let delta = Money::new(new_margin.amount - currently_blocked, new_margin.currency.clone());
            if self.account.available(&delta.currency) < delta.amount {
                return Err(ExecutionError::InsufficientFunds {
                    needed: delta.amount.to_string(),
                    available: self.account.available(&delta.currency).to_string(),
                });
            }
            self.account.block_initial_margin(order_id, &order.instrument_name.clone(), delta);
        } else if new_margin.amount < currently_blocked {
            let fraction = if currently_blocked.is_zero() {
                Decimal::ZERO
            } else {
                (currently_blocked - new_margin.amount) / currently_blocked
            };
            self.account.release_margin_fraction(order_id, &order.instrument_name.clone(), fraction);
        }

        order.quantity = new_quantity;
        order.limit_price = new_limit_price.or(order.limit_price);
        Ok(())
    }

    fn get_active_orders(&self) -> Vec<&Order> {
        self.orders.values().filter(|order| order.status().is_active()).collect()
    }
}

impl LastOrderBookSource for SimulatedBroker {
    fn get_last_order_book(&self, instrument_name: &str) -> Option<OrderBook> {
        self.last_books.get(instrument_name).cloned()
    }
}

impl LastPriceSampleSource for SimulatedBroker {
    fn get_last_price_sample(&self, instrument_name: &str) -> Option<PriceSample> {
        let book = self.last_books.get(instrument_name)?;
        Some(PriceSample {
            instrument_name: book.instrument_name.clone(),
            timestamp: book.timestamp,
            price_type: PriceType::Mid,
            price: reference_price(book),
        })
    }
}

impl PriceSampleProcessor for SimulatedBroker {
    /// Updates the last-known price reference from a bare sample without attempting to match
    /// resting orders against it (a sample carries no depth to trade against).
    fn process_price_sample(&mut self, sample: PriceSample) {
        let book = OrderBook::zero_spread(sample.instrument_name.clone(), sample.timestamp, sample.price, Decimal::ZERO);
        self.last_books.insert(sample.instrument_name, book);
    }
}

/// Builder for [`SimulatedBroker`], grounded in `barter-execution`'s
/// `ClientAccountBuilder`/`Trader::builder()` `Option`-field-then-validate idiom.
#[derive(Default)]
pub struct SimulatedBrokerBuilder {
    instruments: Vec<Instrument>,
    fee_model: Option<Box<dyn FeeModel>>,
    margin_model: Option<Box<dyn MarginModel>>,
    depth_model: Option<Box<dyn MarketDepthModel>>,
    fill_model: Option<Box<dyn FillModel>>,
    starting_balances: Vec<Money>,
}

impl SimulatedBrokerBuilder {
    pub fn instrument(mut self, instrument: Instrument) -> Self {
        self.instruments.push(instrument);
        self
    }

    pub fn fee_model(mut self, model: impl FeeModel + 'static) -> Self {
        self.fee_model = Some(Box::new(model));
        self
    }

    pub fn margin_model(mut self, model: impl MarginModel + 'static) -> Self {
        self.margin_model = Some(Box::new(model));
        self
    }

    pub fn depth_model(mut self, model: impl MarketDepthModel + 'static) -> Self {
        self.depth_model = Some(Box::new(model));
        self
    }

    pub fn fill_model(mut self, model: impl FillModel + 'static) -> Self {
        self.fill_model = Some(Box::new(model));
        self
    }

    pub fn starting_balance(mut self, balance: Money) -> Self {
        self.starting_balances.push(balance);
        self
    }

    pub fn build(self) -> Result<SimulatedBroker, ExecutionError> {
        let fee_model = self
            .fee_model
            .ok_or_else(|| ExecutionError::BuilderIncomplete("fee_model".into()))?;
        let margin_model = self
            .margin_model
            .ok_or_else(|| ExecutionError::BuilderIncomplete("margin_model".into()))?;
        let depth_model = self.depth_model.unwrap_or_else(|| Box::new(ZeroSpreadDepthModel));
        let fill_model = self.fill_model.unwrap_or_else(|| Box::new(IdentityFillModel));

        let mut account = Account::new();
        for balance in self.starting_balances {
            account.deposit(balance);
        }

        let instruments = self.instruments.into_iter().map(|instrument| (instrument.name.clone(), instrument)).collect();

        Ok(SimulatedBroker {
            instruments,
            orders: BTreeMap::new(),
            orders_by_instrument: FnvHashMap::default(),
            account,
            depth_model,
            fee_model,
            margin_model,
            fill_model,
            last_books: FnvHashMap::default(),
            connected: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        order::{TradeDirection, TriggerRelationship},
        policy::{FixedPerUnitFeeModel, FixedRatioMarginModel},
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempo_instrument::{
        currency::CurrencyId,
        instrument::{AssetClass, ExchangeId},
    };

    fn usd() -> CurrencyId {
        CurrencyId::new("USD")
    }

    fn es() -> Instrument {
        Instrument::new(
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
        .unwrap()
    }

    fn broker_with_book() -> SimulatedBroker {
        let mut broker = SimulatedBroker::builder()
            .instrument(es())
            .fee_model(FixedPerUnitFeeModel { fee_per_unit: dec!(0.1), currency: usd() })
            .margin_model(FixedRatioMarginModel { ratio: dec!(0.1) })
            .starting_balance(Money::new(dec!(100_000), usd()))
            .build()
            .unwrap();

        broker
            .process_order_book(OrderBook::zero_spread("ES", Utc::now(), dec!(4_500), dec!(100)))
            .unwrap();
        broker
    }

    fn market_buy(id: u64, quantity: Decimal) -> Order {
        Order::new(OrderId(id), "ES", Side::Buy, quantity, OrderType::Market, TimeInForce::Gtc, None, None, TradeDirection::Entry, Vec::new())
    }

    #[test]
    fn submit_blocks_margin_and_accepts() {
        let mut broker = broker_with_book();
        broker.submit_order(market_buy(1, dec!(2))).unwrap();

        let order = broker.orders.get(&OrderId(1)).unwrap();
        assert_eq!(order.status(), OrderStatus::Accepted);
        assert!(broker.account().blocked_initial_margin("ES") > Decimal::ZERO);
    }

    #[test]
    fn submit_rejects_when_margin_exceeds_available_funds() {
        let mut broker = SimulatedBroker::builder()
            .instrument(es())
            .fee_model(FixedPerUnitFeeModel { fee_per_unit: dec!(0), currency: usd() })
            .margin_model(FixedRatioMarginModel { ratio: dec!(0.1) })
            .starting_balance(Money::new(dec!(1), usd()))
            .build()
            .unwrap();
        broker.process_order_book(OrderBook::zero_spread("ES", Utc::now(), dec!(4_500), dec!(100))).unwrap();

        broker.submit_order(market_buy(1, dec!(2))).unwrap();
        assert_eq!(broker.orders.get(&OrderId(1)).unwrap().status(), OrderStatus::Rejected);
    }

    #[test]
    fn matching_book_produces_fill_and_releases_margin() {
        let mut broker = broker_with_book();
        broker.submit_order(market_buy(1, dec!(2))).unwrap();

        let fills = broker
            .process_order_book(OrderBook::new(
                "ES",
                Utc::now(),
                vec![tempo_instrument::book::BookLevel::new(dec!(4_499), dec!(10))],
                vec![tempo_instrument::book::BookLevel::new(dec!(4_500), dec!(10))],
            ))
            .unwrap();

        assert_eq!(fills.len(), 1);
        assert_eq!(broker.orders.get(&OrderId(1)).unwrap().status(), OrderStatus::Filled);
        assert_eq!(broker.account().blocked_initial_margin("ES"), Decimal::ZERO);
    }

    #[test]
    fn ioc_cancels_unfilled_remainder_in_same_pass() {
        let mut broker = broker_with_book();
        let mut order = market_buy(1, dec!(5));
        order.time_in_force = TimeInForce::Ioc;
        broker.submit_order(order).unwrap();

        broker
            .process_order_book(OrderBook::new(
                "ES",
                Utc::now(),
                Vec::new(),
                vec![tempo_instrument::book::BookLevel::new(dec!(4_500), dec!(2))],
            ))
            .unwrap();

        assert_eq!(broker.orders.get(&OrderId(1)).unwrap().status(), OrderStatus::Cancelled);
    }

    #[test]
    fn fok_rejects_all_or_nothing() {
        let mut broker = broker_with_book();
        let mut order = market_buy(1, dec!(5));
        order.time_in_force = TimeInForce::Fok;
        broker.submit_order(order).unwrap();

        broker
            .process_order_book(OrderBook::new(
                "ES",
                Utc::now(),
                Vec::new(),
                vec![tempo_instrument::book::BookLevel::new(dec!(4_500), dec!(2))],
            ))
            .unwrap();

        let order = broker.orders.get(&OrderId(1)).unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(order.fills.is_empty());
    }

    #[test]
    fn parent_fill_activates_pending_trigger() {
        let mut broker = broker_with_book();
        let child = market_buy(2, dec!(1));
        broker.add_pending_order(child);

        let mut parent = market_buy(1, dec!(1));
        parent.triggers.push(TriggerRelationship { kind: TriggerKind::Activate, other: OrderId(2) });
        broker.submit_order(parent).unwrap();

        broker
            .process_order_book(OrderBook::new(
                "ES",
                Utc::now(),
                Vec::new(),
                vec![tempo_instrument::book::BookLevel::new(dec!(4_500), dec!(10))],
            ))
            .unwrap();

        assert_eq!(broker.orders.get(&OrderId(1)).unwrap().status(), OrderStatus::Filled);
        assert_eq!(broker.orders.get(&OrderId(2)).unwrap().status(), OrderStatus::Accepted);
    }
}
