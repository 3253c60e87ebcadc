use crate::state::{FsmRules, StateMachine};
use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tempo_instrument::{currency::CurrencyId, money::Money};

/// Engine-issued unique identifier for an [`Order`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
pub struct OrderId(pub u64);

/// Generates monotonically increasing [`OrderId`]s. Owned exclusively by the `Engine` — one of
/// the two process-scoped singletons the design permits (the other is the currency registry).
#[derive(Debug, Default)]
pub struct OrderIdGenerator(u64);

impl OrderIdGenerator {
    pub fn next(&mut self) -> OrderId {
        let id = OrderId(self.0);
        self.0 += 1;
        id
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// `+1` for `Buy`, `-1` for `Sell` — used to sign quantities and fills.
    pub fn sign(self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => -Decimal::ONE,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    Gtc,
    Gtd,
    Ioc,
    Fok,
    Day,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    Entry,
    Exit,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Activate,
    Cancel,
}

/// Directed link from this order to another: "when I reach terminal FILLED, Activate/Cancel
/// `other`".
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct TriggerRelationship {
    pub kind: TriggerKind,
    pub other: OrderId,
}

/// Order FSM states, per SPEC_FULL.md §3:
/// `Pending -> Submitted -> (Accepted | Rejected); Accepted -> (PartiallyFilled loop | Filled |
/// Cancelled); PartiallyFilled -> (PartiallyFilled | Filled | Cancelled)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Submitted,
    Accepted,
    Rejected,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Rejected | OrderStatus::Cancelled
        )
    }

    pub fn is_active(self) -> bool {
        matches!(
            self,
            OrderStatus::Accepted | OrderStatus::PartiallyFilled
        )
    }
}

/// Actions applied to the Order FSM.
#[derive(Debug, Clone, Eq, PartialEq, Display)]
pub enum OrderAction {
    Submit,
    Accept,
    Reject,
    PartialFill,
    FullFill,
    Cancel,
}

/// [`FsmRules`] instance governing [`OrderStatus`] transitions.
pub struct OrderFsm;

impl FsmRules for OrderFsm {
    type State = OrderStatus;
    type Action = OrderAction;

    fn transition(state: &OrderStatus, action: &OrderAction) -> Option<OrderStatus> {
        use OrderAction::*;
        use OrderStatus::*;

        match (state, action) {
            (Pending, Submit) => Some(Submitted),
            (Submitted, Accept) => Some(Accepted),
            (Submitted, Reject) => Some(Rejected),
            (Accepted, PartialFill) => Some(PartiallyFilled),
            (Accepted, FullFill) => Some(Filled),
            (Accepted, Cancel) => Some(Cancelled),
            (PartiallyFilled, PartialFill) => Some(PartiallyFilled),
            (PartiallyFilled, FullFill) => Some(Filled),
            (PartiallyFilled, Cancel) => Some(Cancelled),
            _ => None,
        }
    }
}

/// A (partial) trade against an [`Order`], including commission.
///
/// `quantity`'s sign aligns with the order's [`Side`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderFill {
    pub order_id: OrderId,
    pub quantity: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub commission: Money,
}

/// An order submitted by a [`Strategy`](tempo crate) and routed to exactly one broker.
///
/// Ownership (which strategy submitted it, which broker it is routed to) is tracked externally by
/// the routing registry (SPEC_FULL.md §4.L), not on the `Order` itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub instrument_name: SmolStr,
    pub side: Side,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub trade_direction: TradeDirection,
    pub triggers: Vec<TriggerRelationship>,
    fsm: StateMachine<OrderFsm>,
    pub fills: Vec<OrderFill>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OrderId,
        instrument_name: impl Into<SmolStr>,
        side: Side,
        quantity: Decimal,
        order_type: OrderType,
        time_in_force: TimeInForce,
        limit_price: Option<Decimal>,
        stop_price: Option<Decimal>,
        trade_direction: TradeDirection,
        triggers: Vec<TriggerRelationship>,
    ) -> Self {
        Self {
            id,
            instrument_name: instrument_name.into(),
            side,
            quantity,
            order_type,
            time_in_force,
            limit_price,
            stop_price,
            trade_direction,
            triggers,
            fsm: StateMachine::new(OrderStatus::Pending),
            fills: Vec::new(),
        }
    }

    pub fn status(&self) -> OrderStatus {
        *self.fsm.state()
    }

    pub fn apply(&mut self, action: OrderAction) -> Result<OrderStatus, crate::error::ExecutionError> {
        self.fsm.apply(action).copied()
    }

    pub fn filled_quantity(&self) -> Decimal {
        self.fills.iter().map(|f| f.quantity.abs()).sum()
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity()
    }

    pub fn record_fill(&mut self, fill: OrderFill) -> Result<(), crate::error::ExecutionError> {
        self.fills.push(fill);

        let action = if self.remaining_quantity() <= Decimal::ZERO {
            OrderAction::FullFill
        } else {
            OrderAction::PartialFill
        };
        self.apply(action)?;
        Ok(())
    }

    /// Whether the order's limit/stop price filters accept a signed target quantity at `price`.
    pub fn crosses_trigger(&self, last_trade_price: Decimal) -> bool {
        match (self.order_type, self.stop_price) {
            (OrderType::Stop | OrderType::StopLimit, Some(stop)) => match self.side {
                Side::Buy => last_trade_price >= stop,
                Side::Sell => last_trade_price <= stop,
            },
            _ => true,
        }
    }
}
