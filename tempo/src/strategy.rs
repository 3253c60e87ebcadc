use crate::{error::EngineError, feed::EventFeed, routing::RoutingRegistry};
use chrono::{DateTime, Utc};
use derive_more::Display;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use tempo_execution::{
    order::{Order, OrderFill, OrderId, OrderIdGenerator, OrderType, Side, TimeInForce, TradeDirection, TriggerRelationship},
    state::{FsmRules, StateMachine},
};
use tempo_instrument::event::Event;

/// Strategy FSM states, per SPEC_FULL.md §3: `New -> Added -> Running -> (Stopped | Error)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub enum StrategyStatus {
    New,
    Added,
    Running,
    Stopped,
    Error,
}

impl StrategyStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StrategyStatus::Stopped | StrategyStatus::Error)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Display)]
pub enum StrategyAction {
    Add,
    Start,
    Stop,
    Fail,
}

pub struct StrategyFsm;

impl FsmRules for StrategyFsm {
    type State = StrategyStatus;
    type Action = StrategyAction;

    fn transition(state: &StrategyStatus, action: &StrategyAction) -> Option<StrategyStatus> {
        use StrategyAction::*;
        use StrategyStatus::*;

        match (state, action) {
            (New, Add) => Some(Added),
            (Added, Start) => Some(Running),
            (Running, Stop) => Some(Stopped),
            (Running, Fail) => Some(Error),
            (Added, Fail) => Some(Error),
            _ => None,
        }
    }
}

/// A user-defined trading strategy, driven exclusively by the engine's scheduling loop
/// (SPEC_FULL.md §4.I). Callbacks return `Result` rather than panicking to escape; an `Err` is the
/// idiomatic-Rust rendering of "an exception escaped the callback" in the source design note
/// (SPEC_FULL.md §9).
pub trait Strategy: std::fmt::Debug {
    fn on_start(&mut self, _ctx: &mut StrategyContext) -> Result<(), EngineError> {
        Ok(())
    }

    fn on_event(&mut self, event: &Event, ctx: &mut StrategyContext) -> Result<(), EngineError>;

    fn on_execution(&mut self, _fill: &OrderFill, _ctx: &mut StrategyContext) -> Result<(), EngineError> {
        Ok(())
    }

    fn on_stop(&mut self, _ctx: &mut StrategyContext) -> Result<(), EngineError> {
        Ok(())
    }
}

/// A feed registered with a strategy, carrying the "drives simulated fills" flag from spec.md
/// §4.A/§4.J.
pub struct FeedRegistration {
    pub feed: Box<dyn EventFeed>,
    pub drives_simulated_fills: bool,
}

impl std::fmt::Debug for FeedRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedRegistration")
            .field("feed", &self.feed)
            .field("drives_simulated_fills", &self.drives_simulated_fills)
            .finish()
    }
}

/// Non-owning handle passed into a [`Strategy`] callback for the duration of that call, borrowing
/// exactly the engine-owned pieces the strategy-facing API needs (SPEC_FULL.md §9 "avoid
/// ownership cycles" — the strategy itself never holds a reference back to the `Engine`).
pub struct StrategyContext<'a> {
    pub(crate) feeds: &'a mut IndexMap<SmolStr, FeedRegistration>,
    pub(crate) strategy_now: DateTime<Utc>,
    pub(crate) order_ids: &'a mut OrderIdGenerator,
    pub(crate) routing: &'a mut RoutingRegistry,
    pub(crate) strategy_index: usize,
    pub(crate) submissions: &'a mut Vec<(SmolStr, Order)>,
}

impl<'a> StrategyContext<'a> {
    /// Registers `feed` under `key`. If the strategy is already running, the feed is trimmed via
    /// [`EventFeed::remove_events_before`] to the strategy's current timeline position, per
    /// spec.md §4.I.
    pub fn add_event_feed(
        &mut self,
        key: &str,
        mut feed: Box<dyn EventFeed>,
        drives_simulated_fills: bool,
    ) -> Result<(), EngineError> {
        if key.is_empty() {
            return Err(EngineError::Validation("feed key must not be empty".into()));
        }
        if self.feeds.contains_key(key) {
            return Err(EngineError::DuplicateFeed(key.to_string()));
        }
        feed.remove_events_before(self.strategy_now);
        self.feeds.insert(SmolStr::new(key), FeedRegistration { feed, drives_simulated_fills });
        Ok(())
    }

    /// Closes and detaches a previously registered feed.
    pub fn remove_event_feed(&mut self, key: &str) -> Result<(), EngineError> {
        let mut registration = self
            .feeds
            .shift_remove(key)
            .ok_or_else(|| EngineError::UnknownFeed(key.to_string()))?;
        registration.feed.close();
        Ok(())
    }

    /// Submits `order` for routing to `broker_key`. The engine assigns the [`OrderId`], records
    /// the `(strategy, broker)` routing pair (SPEC_FULL.md §4.L) and forwards the order to the
    /// named broker once this callback returns.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_order(
        &mut self,
        broker_key: &str,
        instrument_name: impl Into<SmolStr>,
        side: Side,
        quantity: Decimal,
        order_type: OrderType,
        time_in_force: TimeInForce,
        limit_price: Option<Decimal>,
        stop_price: Option<Decimal>,
        trade_direction: TradeDirection,
        triggers: Vec<TriggerRelationship>,
    ) -> OrderId {
        let id = self.order_ids.next();
        let order = Order::new(
            id,
            instrument_name,
            side,
            quantity,
            order_type,
            time_in_force,
            limit_price,
            stop_price,
            trade_direction,
            triggers,
        );
        self.routing.record(id, self.strategy_index, broker_key);
        self.submissions.push((SmolStr::new(broker_key), order));
        id
    }
}

/// Engine-internal bookkeeping for one registered [`Strategy`]: its FSM state, its registered
/// feeds in registration order, and the high-water mark of `dt_event` it has consumed so far.
#[derive(Debug)]
pub struct StrategySlot {
    pub name: SmolStr,
    strategy: Box<dyn Strategy>,
    fsm: StateMachine<StrategyFsm>,
    pub(crate) feeds: IndexMap<SmolStr, FeedRegistration>,
    strategy_now: DateTime<Utc>,
}

impl StrategySlot {
    pub fn new(name: impl Into<SmolStr>, strategy: Box<dyn Strategy>) -> Self {
        Self {
            name: name.into(),
            strategy,
            fsm: StateMachine::new(StrategyStatus::New),
            feeds: IndexMap::new(),
            strategy_now: DateTime::<Utc>::MIN_UTC,
        }
    }

    pub fn status(&self) -> StrategyStatus {
        *self.fsm.state()
    }

    pub(crate) fn apply(&mut self, action: StrategyAction) -> Result<StrategyStatus, EngineError> {
        self.fsm.apply(action).map(|state| *state).map_err(EngineError::from)
    }

    fn context<'a>(
        &'a mut self,
        index: usize,
        order_ids: &'a mut OrderIdGenerator,
        routing: &'a mut RoutingRegistry,
        submissions: &'a mut Vec<(SmolStr, Order)>,
    ) -> StrategyContext<'a> {
        StrategyContext {
            feeds: &mut self.feeds,
            strategy_now: self.strategy_now,
            order_ids,
            routing,
            strategy_index: index,
            submissions,
        }
    }

    pub(crate) fn run_on_start(
        &mut self,
        index: usize,
        order_ids: &mut OrderIdGenerator,
        routing: &mut RoutingRegistry,
        submissions: &mut Vec<(SmolStr, Order)>,
    ) -> Result<(), EngineError> {
        let mut ctx = self.context(index, order_ids, routing, submissions);
        self.strategy.on_start(&mut ctx)
    }

    pub(crate) fn run_on_event(
        &mut self,
        index: usize,
        event: &Event,
        order_ids: &mut OrderIdGenerator,
        routing: &mut RoutingRegistry,
        submissions: &mut Vec<(SmolStr, Order)>,
    ) -> Result<(), EngineError> {
        self.strategy_now = self.strategy_now.max(event.dt_event);
        let mut ctx = self.context(index, order_ids, routing, submissions);
        self.strategy.on_event(event, &mut ctx)
    }

    pub(crate) fn run_on_execution(
        &mut self,
        index: usize,
        fill: &OrderFill,
        order_ids: &mut OrderIdGenerator,
        routing: &mut RoutingRegistry,
        submissions: &mut Vec<(SmolStr, Order)>,
    ) -> Result<(), EngineError> {
        let mut ctx = self.context(index, order_ids, routing, submissions);
        self.strategy.on_execution(fill, &mut ctx)
    }

    pub(crate) fn run_on_stop(
        &mut self,
        index: usize,
        order_ids: &mut OrderIdGenerator,
        routing: &mut RoutingRegistry,
        submissions: &mut Vec<(SmolStr, Order)>,
    ) -> Result<(), EngineError> {
        let mut ctx = self.context(index, order_ids, routing, submissions);
        self.strategy.on_stop(&mut ctx)
    }
}
