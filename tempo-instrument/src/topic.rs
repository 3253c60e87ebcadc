use crate::{
    bar::{BarType, PeriodUnit, PriceType},
    instrument::ExchangeId,
};

/// Render `(name, exchange)` as `name@exchange`, lowercased — the canonical instrument component
/// of a topic string.
pub fn instrument_topic_component(name: &str, exchange: &ExchangeId) -> String {
    format!("{name}@{}", exchange.0).to_lowercase()
}

fn period_unit_lower(unit: PeriodUnit) -> &'static str {
    match unit {
        PeriodUnit::Second => "second",
        PeriodUnit::Minute => "minute",
        PeriodUnit::Hour => "hour",
        PeriodUnit::Day => "day",
        PeriodUnit::Week => "week",
        PeriodUnit::Month => "month",
        PeriodUnit::Tick => "tick",
        PeriodUnit::Volume => "volume",
    }
}

fn price_type_lower(price_type: PriceType) -> &'static str {
    match price_type {
        PriceType::Bid => "bid",
        PriceType::Ask => "ask",
        PriceType::Last => "last",
        PriceType::Mid => "mid",
    }
}

/// `bar::{instrument}::{period_value}-{unit}::{price_type}`
pub fn bar_topic(instrument: &str, exchange: &ExchangeId, bar_type: &BarType) -> String {
    format!(
        "bar::{}::{}-{}::{}",
        instrument_topic_component(instrument, exchange),
        bar_type.period_value,
        period_unit_lower(bar_type.period_unit),
        price_type_lower(bar_type.price_type)
    )
}

/// `trade_tick::{instrument}`
pub fn trade_tick_topic(instrument: &str, exchange: &ExchangeId) -> String {
    format!("trade_tick::{}", instrument_topic_component(instrument, exchange))
}

/// `quote_tick::{instrument}`
pub fn quote_tick_topic(instrument: &str, exchange: &ExchangeId) -> String {
    format!("quote_tick::{}", instrument_topic_component(instrument, exchange))
}
