use crate::{bar::Bar, tick::{QuoteTick, TradeTick}};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Closed, exhaustively-matchable variant set for everything an [`crate::event::Event`] can
/// carry.
///
/// Grounded in the re-architecture directive of SPEC_FULL.md §9: a tagged `enum` dispatched by
/// pattern match, replacing the source's polymorphic `isinstance`-style event hierarchy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum EventKind {
    Bar(Bar),
    TradeTick(TradeTick),
    QuoteTick(QuoteTick),
    /// A pure time-advance notification, carrying no market data of its own. Used by the
    /// fixed-interval time-notification feed (SPEC_FULL.md §4.A).
    TimeNotification,
}

/// A domain event flowing through an Event Feed.
///
/// `dt_event` is the logical (market) timestamp; `dt_received` is when the event was ingested.
/// Both are UTC. `metadata` is an optional read-only bag of ancillary string key/value pairs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub dt_event: DateTime<Utc>,
    pub dt_received: DateTime<Utc>,
    pub metadata: Option<IndexMap<SmolStr, SmolStr>>,
}

impl Event {
    pub fn new(kind: EventKind, dt_event: DateTime<Utc>, dt_received: DateTime<Utc>) -> Self {
        Self {
            kind,
            dt_event,
            dt_received,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: IndexMap<SmolStr, SmolStr>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn bar(bar: Bar, dt_received: DateTime<Utc>) -> Self {
        let dt_event = bar.end_dt;
        Self::new(EventKind::Bar(bar), dt_event, dt_received)
    }

    pub fn trade_tick(tick: TradeTick, dt_received: DateTime<Utc>) -> Self {
        let dt_event = tick.timestamp;
        Self::new(EventKind::TradeTick(tick), dt_event, dt_received)
    }

    pub fn quote_tick(tick: QuoteTick, dt_received: DateTime<Utc>) -> Self {
        let dt_event = tick.timestamp;
        Self::new(EventKind::QuoteTick(tick), dt_event, dt_received)
    }

    pub fn time_notification(dt_event: DateTime<Utc>, dt_received: DateTime<Utc>) -> Self {
        Self::new(EventKind::TimeNotification, dt_event, dt_received)
    }
}
