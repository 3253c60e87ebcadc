use crate::order::OrderId;
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use tempo_instrument::{currency::CurrencyId, money::Money};

/// Per-broker ledger: available funds by currency, blocked initial margin by order, maintenance
/// margin and net position by instrument, and a running fee log (SPEC_FULL.md §4.H).
///
/// Grounded in `barter-execution`'s simulated exchange account (`ClientAccount`/`Balance`), scaled
/// down to what a single-account simulated broker needs; the lookup maps use `FnvHashMap` for the
/// same reason `barter_instrument::instrument::map::InstrumentMap` does.
#[derive(Debug, Clone, Default)]
pub struct Account {
    available: FnvHashMap<CurrencyId, Decimal>,
    blocked_by_order: FnvHashMap<OrderId, Money>,
    blocked_by_instrument: FnvHashMap<SmolStr, Decimal>,
    maintenance_margin: FnvHashMap<SmolStr, Money>,
    net_position: FnvHashMap<SmolStr, Decimal>,
    paid_fees: Vec<Money>,
}

impl Account {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&mut self, amount: Money) {
        *self.available.entry(amount.currency.clone()).or_insert(Decimal::ZERO) += amount.amount;
    }

    pub fn available(&self, currency: &CurrencyId) -> Decimal {
        self.available.get(currency).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn blocked_initial_margin(&self, instrument_name: &str) -> Decimal {
        self.blocked_by_instrument.get(instrument_name).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn maintenance_margin(&self, instrument_name: &str) -> Option<&Money> {
        self.maintenance_margin.get(instrument_name)
    }

    pub fn net_position(&self, instrument_name: &str) -> Decimal {
        self.net_position.get(instrument_name).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn paid_fees(&self) -> &[Money] {
        &self.paid_fees
    }

    /// Debits `margin` from available funds and records it as blocked against `order_id`.
    pub fn block_initial_margin(&mut self, order_id: OrderId, instrument_name: &str, margin: Money) {
        *self.available.entry(margin.currency.clone()).or_insert(Decimal::ZERO) -= margin.amount;
        *self.blocked_by_instrument.entry(SmolStr::new(instrument_name)).or_insert(Decimal::ZERO) += margin.amount;
        self.blocked_by_order.insert(order_id, margin);
    }

    /// Releases `fraction` of the margin originally blocked against `order_id` back to available
    /// funds. Used when a fill reduces an order's remaining quantity proportionally.
    pub fn release_margin_fraction(&mut self, order_id: OrderId, instrument_name: &str, fraction: Decimal) {
        let Some(blocked) = self.blocked_by_order.get_mut(&order_id) else {
            return;
        };
        let release_amount = blocked.amount * fraction;
        blocked.amount -= release_amount;

        *self.available.entry(blocked.currency.clone()).or_insert(Decimal::ZERO) += release_amount;
        if let Some(by_instrument) = self.blocked_by_instrument.get_mut(instrument_name) {
            *by_instrument -= release_amount;
        }
    }

    /// Releases whatever margin remains blocked against `order_id` (used on Fill/Cancel).
    pub fn release_remaining_margin(&mut self, order_id: OrderId, instrument_name: &str) {
        if let Some(blocked) = self.blocked_by_order.remove(&order_id) {
            *self.available.entry(blocked.currency.clone()).or_insert(Decimal::ZERO) += blocked.amount;
            if let Some(by_instrument) = self.blocked_by_instrument.get_mut(instrument_name) {
                *by_instrument -= blocked.amount;
            }
        }
    }

    pub fn record_fee(&mut self, fee: Money) {
        *self.available.entry(fee.currency.clone()).or_insert(Decimal::ZERO) -= fee.amount;
        self.paid_fees.push(fee);
    }

    /// Debits/credits `currency` by the signed notional value of a fill: positive
    /// `signed_quantity` (BUY) debits available funds, negative (SELL) credits them
    /// (SPEC_FULL.md §4.H step 2: "adjust account funds ... by signed fill value").
    pub fn settle_fill(&mut self, signed_quantity: Decimal, price: Decimal, contract_size: Decimal, currency: CurrencyId) {
        let value = signed_quantity * price * contract_size;
        *self.available.entry(currency).or_insert(Decimal::ZERO) -= value;
    }

    pub fn adjust_net_position(&mut self, instrument_name: &str, signed_quantity: Decimal) {
        *self.net_position.entry(SmolStr::new(instrument_name)).or_insert(Decimal::ZERO) += signed_quantity;
    }

    pub fn set_maintenance_margin(&mut self, instrument_name: &str, margin: Money) {
        self.maintenance_margin.insert(SmolStr::new(instrument_name), margin);
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
    fn deposit_and_block_moves_funds_out_of_available() {
        let mut account = Account::new();
        account.deposit(Money::new(dec!(10_000), usd()));
        account.block_initial_margin(OrderId(1), "ES", Money::new(dec!(500), usd()));

        assert_eq!(account.available(&usd()), dec!(9_500));
        assert_eq!(account.blocked_initial_margin("ES"), dec!(500));
    }

    #[test]
    fn partial_release_returns_proportional_amount() {
        let mut account = Account::new();
        account.deposit(Money::new(dec!(10_000), usd()));
        account.block_initial_margin(OrderId(1), "ES", Money::new(dec!(1_000), usd()));

        account.release_margin_fraction(OrderId(1), "ES", dec!(0.4));

        assert_eq!(account.available(&usd()), dec!(9_400));
        assert_eq!(account.blocked_initial_margin("ES"), dec!(600));
    }

    #[test]
    fn release_remaining_zeroes_out_order_block() {
        let mut account = Account::new();
        account.deposit(Money::new(dec!(10_000), usd()));
        account.block_initial_margin(OrderId(1), "ES", Money::new(dec!(1_000), usd()));

        account.release_margin_fraction(OrderId(1), "ES", dec!(0.25));
        account.release_remaining_margin(OrderId(1), "ES");

        assert_eq!(account.available(&usd()), dec!(10_000));
        assert_eq!(account.blocked_initial_margin("ES"), dec!(0));
    }

    #[test]
    fn fees_reduce_available_and_are_logged() {
        let mut account = Account::new();
        account.deposit(Money::new(dec!(1_000), usd()));
        account.record_fee(Money::new(dec!(5), usd()));

        assert_eq!(account.available(&usd()), dec!(995));
        assert_eq!(account.paid_fees().len(), 1);
    }

    #[test]
    fn settle_fill_debits_buys_and_credits_sells() {
        let mut account = Account::new();
        account.deposit(Money::new(dec!(10_000), usd()));

        account.settle_fill(dec!(2), dec!(100), dec!(1), usd());
        assert_eq!(account.available(&usd()), dec!(9_800));

        account.settle_fill(dec!(-2), dec!(110), dec!(1), usd());
        assert_eq!(account.available(&usd()), dec!(10_020));
    }
}
