use crate::{
    error::ExecutionError,
    order::{Order, OrderId},
};
use rust_decimal::Decimal;
use tempo_instrument::{book::OrderBook, tick::PriceSample};

/// Common surface every broker (real or simulated) exposes to the routing layer
/// (SPEC_FULL.md §6 "Broker contract").
pub trait Broker: std::fmt::Debug {
    fn connect(&mut self) -> Result<(), ExecutionError>;
    fn disconnect(&mut self) -> Result<(), ExecutionError>;
    fn is_connected(&self) -> bool;

    fn submit_order(&mut self, order: Order) -> Result<(), ExecutionError>;
    fn cancel_order(&mut self, order_id: OrderId) -> Result<(), ExecutionError>;
    fn modify_order(
        &mut self,
        order_id: OrderId,
        new_quantity: Decimal,
        new_limit_price: Option<Decimal>,
    ) -> Result<(), ExecutionError>;
    fn get_active_orders(&self) -> Vec<&Order>;
}

/// Optional capability: the broker can be fed price-level observations directly, for
/// subscribers that prefer sample granularity over full order books.
pub trait PriceSampleProcessor {
    fn process_price_sample(&mut self, sample: PriceSample);
}

/// Optional capability: query the most recent [`PriceSample`] a broker has observed for an
/// instrument.
pub trait LastPriceSampleSource {
    fn get_last_price_sample(&self, instrument_name: &str) -> Option<PriceSample>;
}

/// Optional capability: query the most recent [`OrderBook`] a broker has observed for an
/// instrument.
pub trait LastOrderBookSource {
    fn get_last_order_book(&self, instrument_name: &str) -> Option<OrderBook>;
}
