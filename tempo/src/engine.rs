use crate::{
    config::EngineConfig,
    error::EngineError,
    merger,
    routing::RoutingRegistry,
    strategy::{Strategy, StrategyAction, StrategySlot, StrategyStatus},
};
use derive_more::Display;
use indexmap::IndexMap;
use rand::{rngs::StdRng, SeedableRng};
use smol_str::SmolStr;
use tempo_execution::{
    broker::Broker,
    order::{Order, OrderFill, OrderIdGenerator},
    sim_broker::SimulatedBroker,
    state::{FsmRules, StateMachine},
};
use tracing::warn;

/// Either of the two shapes a registered broker can take. Only [`BrokerSlot::Simulated`] can be
/// driven by converted order-book events (SPEC_FULL.md §4.J) — `process_order_book` is not part
/// of the [`Broker`] trait itself, since real brokers consume their own venue feed.
#[derive(Debug)]
pub enum BrokerSlot {
    Simulated(SimulatedBroker),
    External(Box<dyn Broker>),
}

impl BrokerSlot {
    fn as_broker_mut(&mut self) -> &mut dyn Broker {
        match self {
            BrokerSlot::Simulated(broker) => broker,
            BrokerSlot::External(broker) => broker.as_mut(),
        }
    }
}

/// Engine FSM states, per SPEC_FULL.md §3: `New -> Running -> (Stopped | Error)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub enum EngineStatus {
    New,
    Running,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Eq, PartialEq, Display)]
pub enum EngineAction {
    Start,
    Stop,
    Fail,
}

pub struct EngineFsm;

impl FsmRules for EngineFsm {
    type State = EngineStatus;
    type Action = EngineAction;

    fn transition(state: &EngineStatus, action: &EngineAction) -> Option<EngineStatus> {
        use EngineAction::*;
        use EngineStatus::*;

        match (state, action) {
            (New, Start) => Some(Running),
            (Running, Stop) => Some(Stopped),
            (Running, Fail) => Some(Error),
            _ => None,
        }
    }
}

/// Top-level orchestrator: owns every [`Strategy`] and [`BrokerSlot`], drives the chronological
/// scheduling loop, and routes executions back to their originating strategy (SPEC_FULL.md §4.J).
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    fsm: StateMachine<EngineFsm>,
    strategies: Vec<StrategySlot>,
    brokers: IndexMap<SmolStr, BrokerSlot>,
    routing: RoutingRegistry,
    order_ids: OrderIdGenerator,
    rng: StdRng,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.bar_tie_break_seed);
        Self {
            config,
            fsm: StateMachine::new(EngineStatus::New),
            strategies: Vec::new(),
            brokers: IndexMap::new(),
            routing: RoutingRegistry::default(),
            order_ids: OrderIdGenerator::default(),
            rng,
        }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn status(&self) -> EngineStatus {
        *self.fsm.state()
    }

    /// Looks up a registered broker by key, for inspecting its post-run state (e.g. a
    /// [`BrokerSlot::Simulated`]'s account balance) once the engine has stopped.
    pub fn broker(&self, key: &str) -> Option<&BrokerSlot> {
        self.brokers.get(key)
    }

    /// Registers a broker under `key`. Only valid while the engine is `New` (SPEC_FULL.md §4.J).
    pub fn add_broker(&mut self, key: &str, broker: BrokerSlot) -> Result<(), EngineError> {
        self.require_new("add_broker")?;
        if self.brokers.contains_key(key) {
            return Err(EngineError::DuplicateBroker(key.to_string()));
        }
        self.brokers.insert(SmolStr::new(key), broker);
        Ok(())
    }

    /// Registers a strategy under `name`, immediately transitioning it `New -> Added`. Only valid
    /// while the engine is `New` (SPEC_FULL.md §4.J).
    pub fn add_strategy(&mut self, name: &str, strategy: Box<dyn Strategy>) -> Result<(), EngineError> {
        self.require_new("add_strategy")?;
        let mut slot = StrategySlot::new(name, strategy);
        slot.apply(StrategyAction::Add)?;
        self.strategies.push(slot);
        Ok(())
    }

    /// Registers `feed` against an already-added strategy, identified by its position in
    /// registration order. A convenience for assembling a strategy's feeds before [`Engine::start`]
    /// — once running, a strategy registers its own feeds from inside a callback via
    /// [`crate::strategy::StrategyContext::add_event_feed`] instead.
    pub fn add_strategy_feed(
        &mut self,
        strategy_index: usize,
        key: &str,
        feed: Box<dyn crate::feed::EventFeed>,
        drives_simulated_fills: bool,
    ) -> Result<(), EngineError> {
        self.require_new("add_strategy_feed")?;
        let slot = self
            .strategies
            .get_mut(strategy_index)
            .ok_or_else(|| EngineError::Validation(format!("no strategy at index {strategy_index}")))?;

        if key.is_empty() {
            return Err(EngineError::Validation("feed key must not be empty".into()));
        }
        if slot.feeds.contains_key(key) {
            return Err(EngineError::DuplicateFeed(key.to_string()));
        }

        slot.feeds.insert(SmolStr::new(key), crate::strategy::FeedRegistration { feed, drives_simulated_fills });
        Ok(())
    }

    fn require_new(&self, action: &str) -> Result<(), EngineError> {
        if self.status() != EngineStatus::New {
            return Err(EngineError::InvalidTransition {
                state: self.status().to_string(),
                action: action.to_string(),
            });
        }
        Ok(())
    }

    /// Runs the full scheduling loop to completion (SPEC_FULL.md §4.J steps 1-5). Returns an
    /// error only when the engine itself must halt (a strategy failed and
    /// [`EngineConfig::continue_on_strategy_error`] is `false`, or the engine's own bookkeeping
    /// failed) — per spec.md §7, strategy callback errors are otherwise converted into state
    /// transitions rather than propagated.
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.require_new("start")?;

        for index in 0..self.strategies.len() {
            if let Err(halt) = self.start_strategy(index) {
                self.fsm.apply(EngineAction::Fail)?;
                return Err(halt);
            }
        }

        self.fsm.apply(EngineAction::Start)?;

        loop {
            let Some((strategy_index, feed_index)) = self.select_global_next() else {
                break;
            };

            if let Err(halt) = self.dispatch(strategy_index, feed_index) {
                self.fsm.apply(EngineAction::Fail)?;
                return Err(halt);
            }
        }

        for index in (0..self.strategies.len()).rev() {
            self.stop_strategy(index);
        }

        self.fsm.apply(EngineAction::Stop)?;
        Ok(())
    }

    fn start_strategy(&mut self, index: usize) -> Result<(), EngineError> {
        self.strategies[index].apply(StrategyAction::Start)?;

        let mut submissions = Vec::new();
        let result = {
            let (order_ids, routing) = (&mut self.order_ids, &mut self.routing);
            self.strategies[index].run_on_start(index, order_ids, routing, &mut submissions)
        };
        self.forward_submissions(submissions);

        self.handle_callback_result(index, result)
    }

    fn stop_strategy(&mut self, index: usize) {
        if self.strategies[index].status() != StrategyStatus::Running {
            return;
        }

        let mut submissions = Vec::new();
        let result = {
            let (order_ids, routing) = (&mut self.order_ids, &mut self.routing);
            self.strategies[index].run_on_stop(index, order_ids, routing, &mut submissions)
        };
        self.forward_submissions(submissions);

        if let Err(error) = result {
            warn!(strategy = %self.strategies[index].name, %error, "on_stop failed");
        }
        let _ = self.strategies[index].apply(StrategyAction::Stop);
    }

    /// Peeks every running strategy's next event (without consuming) and returns the globally
    /// earliest one, ties broken by strategy-registration order then feed-registration order
    /// (SPEC_FULL.md §5).
    fn select_global_next(&mut self) -> Option<(usize, usize)> {
        let mut winner: Option<(usize, usize, chrono::DateTime<chrono::Utc>)> = None;

        for (strategy_index, slot) in self.strategies.iter_mut().enumerate() {
            if slot.status() != StrategyStatus::Running {
                continue;
            }
            let Some(feed_index) = merger::select_next(&mut slot.feeds) else {
                continue;
            };
            let dt_event = {
                let (_, registration) = slot.feeds.get_index_mut(feed_index).expect("valid index");
                registration.feed.peek().expect("select_next guarantees a ready event").dt_event
            };

            match &winner {
                Some((_, _, best)) if dt_event >= *best => {}
                _ => winner = Some((strategy_index, feed_index, dt_event)),
            }
        }

        winner.map(|(strategy_index, feed_index, _)| (strategy_index, feed_index))
    }

    /// Dispatches one event to its owning strategy. When the producing feed drives simulated
    /// fills, the event's canonical order book(s) are forwarded to every [`BrokerSlot::Simulated`]
    /// broker in two passes: once *before* `on_event` (so any order the strategy submits can see
    /// a current reference price for its initial margin check) and once more with just the most
    /// recent of those books *after* `on_event` (so a freshly submitted order is matched against
    /// the current price without being matched against earlier, already-past intrabar prices).
    fn dispatch(&mut self, strategy_index: usize, feed_index: usize) -> Result<(), EngineError> {
        let (event, drives_simulated_fills) = {
            let slot = &mut self.strategies[strategy_index];
            let (_, registration) = slot.feeds.get_index_mut(feed_index).expect("valid index");
            let event = registration.feed.pop().expect("select_next guarantees a ready event");
            (event, registration.drives_simulated_fills)
        };

        let books = if drives_simulated_fills {
            tempo_execution::converter::event_to_order_books(&event, &mut self.rng)
        } else {
            Vec::new()
        };

        if !books.is_empty() {
            for fill in self.process_books(&books) {
                self.route_execution(fill)?;
            }
        }

        let mut submissions = Vec::new();
        let result = {
            let (order_ids, routing) = (&mut self.order_ids, &mut self.routing);
            self.strategies[strategy_index].run_on_event(strategy_index, &event, order_ids, routing, &mut submissions)
        };
        self.forward_submissions(submissions);
        self.handle_callback_result(strategy_index, result)?;

        if let Some(last_book) = books.last() {
            for fill in self.process_books(std::slice::from_ref(last_book)) {
                self.route_execution(fill)?;
            }
        }

        Ok(())
    }

    fn process_books(&mut self, books: &[tempo_instrument::book::OrderBook]) -> Vec<OrderFill> {
        let mut fills = Vec::new();

        for book in books {
            for broker in self.brokers.values_mut() {
                if let BrokerSlot::Simulated(simulated) = broker {
                    match simulated.process_order_book(book.clone()) {
                        Ok(mut new_fills) => fills.append(&mut new_fills),
                        Err(error) => warn!(%error, "simulated broker failed to process order book"),
                    }
                }
            }
        }

        fills
    }

    fn route_execution(&mut self, fill: OrderFill) -> Result<(), EngineError> {
        let (strategy_index, _broker_key) = self.routing.owner_of(fill.order_id)?;

        let mut submissions = Vec::new();
        let result = {
            let (order_ids, routing) = (&mut self.order_ids, &mut self.routing);
            self.strategies[strategy_index].run_on_execution(strategy_index, &fill, order_ids, routing, &mut submissions)
        };
        self.forward_submissions(submissions);
        self.handle_callback_result(strategy_index, result)
    }

    fn forward_submissions(&mut self, submissions: Vec<(SmolStr, Order)>) {
        for (broker_key, order) in submissions {
            match self.brokers.get_mut(&broker_key) {
                Some(slot) => {
                    if let Err(error) = slot.as_broker_mut().submit_order(order) {
                        warn!(broker = %broker_key, %error, "order submission failed");
                    }
                }
                None => warn!(broker = %broker_key, "submit_order routed to unknown broker"),
            }
        }
    }

    /// Converts a strategy callback's `Err` into a strategy-level ERROR transition plus
    /// best-effort `on_stop`. Returns `Err` only when the whole engine must halt
    /// (`continue_on_strategy_error == false`), per spec.md §4.I / §7.
    fn handle_callback_result(&mut self, index: usize, result: Result<(), EngineError>) -> Result<(), EngineError> {
        let Err(error) = result else {
            return Ok(());
        };

        warn!(strategy = %self.strategies[index].name, %error, "strategy callback failed");
        let _ = self.strategies[index].apply(StrategyAction::Fail);

        let mut submissions = Vec::new();
        let stop_result = {
            let (order_ids, routing) = (&mut self.order_ids, &mut self.routing);
            self.strategies[index].run_on_stop(index, order_ids, routing, &mut submissions)
        };
        self.forward_submissions(submissions);
        if let Err(stop_error) = stop_result {
            warn!(strategy = %self.strategies[index].name, error = %stop_error, "on_stop failed after error");
        }

        if self.config.continue_on_strategy_error {
            Ok(())
        } else {
            Err(error)
        }
    }
}

/// Builder for [`Engine`], grounded in `barter/src/engine/trader.rs`'s `Trader::builder()` /
/// `TraderBuilder` `Option`-field-then-validate idiom.
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    brokers: Vec<(SmolStr, BrokerSlot)>,
    strategies: Vec<(SmolStr, Box<dyn Strategy>)>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn broker(mut self, key: &str, broker: BrokerSlot) -> Self {
        self.brokers.push((SmolStr::new(key), broker));
        self
    }

    pub fn strategy(mut self, name: &str, strategy: Box<dyn Strategy>) -> Self {
        self.strategies.push((SmolStr::new(name), strategy));
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        if self.strategies.is_empty() {
            return Err(EngineError::BuilderIncomplete("strategy".into()));
        }

        let mut engine = Engine::new(self.config.unwrap_or_default());
        for (key, broker) in self.brokers {
            engine.add_broker(&key, broker)?;
        }
        for (name, strategy) in self.strategies {
            engine.add_strategy(&name, strategy)?;
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        feed::{fixed_sequence::FixedSequenceFeed, EventFeed},
        strategy::StrategyContext,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};
    use tempo_execution::{
        order::{OrderType, Side, TimeInForce, TradeDirection},
        policy::{FixedPerUnitFeeModel, FixedRatioMarginModel},
    };
    use tempo_instrument::{
        currency::CurrencyId,
        event::Event,
        instrument::{AssetClass, ExchangeId, Instrument},
        money::Money,
        tick::QuoteTick,
    };

    fn usd() -> CurrencyId {
        CurrencyId::new("USD")
    }

    fn es() -> Instrument {
        Instrument::new("ES", ExchangeId::new("CME"), AssetClass::Future, dec!(0.01), dec!(1), dec!(1), "contract", usd(), None).unwrap()
    }

    fn simulated_broker() -> SimulatedBroker {
        SimulatedBroker::builder()
            .instrument(es())
            .fee_model(FixedPerUnitFeeModel { fee_per_unit: dec!(0), currency: usd() })
            .margin_model(FixedRatioMarginModel { ratio: dec!(0.1) })
            .starting_balance(Money::new(dec!(100_000), usd()))
            .build()
            .unwrap()
    }

    #[derive(Debug)]
    struct MarketBuyOnce {
        submitted: bool,
        executions: Arc<Mutex<Vec<OrderFill>>>,
    }

    impl Strategy for MarketBuyOnce {
        fn on_event(&mut self, _event: &Event, ctx: &mut StrategyContext) -> Result<(), EngineError> {
            if !self.submitted {
                self.submitted = true;
                ctx.submit_order(
                    "sim",
                    "ES",
                    Side::Buy,
                    dec!(1),
                    OrderType::Market,
                    TimeInForce::Gtc,
                    None,
                    None,
                    TradeDirection::Entry,
                    Vec::new(),
                );
            }
            Ok(())
        }

        fn on_execution(&mut self, fill: &OrderFill, _ctx: &mut StrategyContext) -> Result<(), EngineError> {
            self.executions.lock().unwrap().push(fill.clone());
            Ok(())
        }
    }

    fn quote_event(bid: rust_decimal::Decimal, ask: rust_decimal::Decimal) -> Event {
        let ts = Utc::now();
        Event::quote_tick(QuoteTick::new("ES", ts, bid, dec!(10), ask, dec!(10)).unwrap(), ts)
    }

    #[test]
    fn market_buy_against_one_quote_produces_one_execution() {
        let executions = Arc::new(Mutex::new(Vec::new()));
        let strategy = MarketBuyOnce { submitted: false, executions: executions.clone() };

        let mut engine = Engine::builder()
            .broker("sim", BrokerSlot::Simulated(simulated_broker()))
            .strategy("s1", Box::new(strategy))
            .build()
            .unwrap();

        let feed: Box<dyn EventFeed> = Box::new(FixedSequenceFeed::new(vec![quote_event(dec!(99), dec!(101))]));
        engine.add_strategy_feed(0, "ticks", feed, true).unwrap();

        engine.start().unwrap();

        let executions = executions.lock().unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].price, dec!(101));
        assert_eq!(executions[0].quantity, dec!(1));
        assert_eq!(engine.status(), EngineStatus::Stopped);
    }

    #[test]
    fn two_strategies_same_tick_stay_isolated() {
        let executions_a = Arc::new(Mutex::new(Vec::new()));
        let executions_b = Arc::new(Mutex::new(Vec::new()));

        let mut engine = Engine::builder()
            .broker("sim", BrokerSlot::Simulated(simulated_broker()))
            .strategy("s1", Box::new(MarketBuyOnce { submitted: false, executions: executions_a.clone() }))
            .strategy("s2", Box::new(MarketBuyOnce { submitted: false, executions: executions_b.clone() }))
            .build()
            .unwrap();

        let event = quote_event(dec!(99), dec!(101));
        engine.add_strategy_feed(0, "ticks", Box::new(FixedSequenceFeed::new(vec![event.clone()])), true).unwrap();
        engine.add_strategy_feed(1, "ticks", Box::new(FixedSequenceFeed::new(vec![event])), true).unwrap();

        engine.start().unwrap();

        assert_eq!(executions_a.lock().unwrap().len(), 1);
        assert_eq!(executions_b.lock().unwrap().len(), 1);
    }

    #[test]
    fn add_broker_fails_once_engine_is_running() {
        let mut engine = Engine::builder()
            .strategy("s1", Box::new(MarketBuyOnce { submitted: false, executions: Arc::new(Mutex::new(Vec::new())) }))
            .build()
            .unwrap();
        engine.start().unwrap();

        assert!(engine.add_broker("late", BrokerSlot::Simulated(simulated_broker())).is_err());
    }

    #[test]
    fn builder_requires_at_least_one_strategy() {
        assert!(matches!(Engine::builder().build(), Err(EngineError::BuilderIncomplete(_))));
    }
}
