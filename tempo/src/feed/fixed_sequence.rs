use super::EventFeed;
use crate::{
    error::EngineError,
    listener::{Listener, ListenerRegistry},
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::VecDeque;
use tempo_instrument::event::Event;

/// [`EventFeed`] over an in-memory ordered list of events, already sorted by `dt_event`.
///
/// Grounded in `barter-data`'s historical/backtest feed style of replaying a bounded, pre-built
/// sequence (the teacher's `MarketFeed::Backtest` generator in `barter-data/src/event.rs`).
#[derive(Debug)]
pub struct FixedSequenceFeed {
    events: VecDeque<Event>,
    closed: bool,
    listeners: ListenerRegistry,
    metadata: Option<IndexMap<SmolStr, SmolStr>>,
}

impl FixedSequenceFeed {
    /// Builds a feed from `events`, which must already be sorted non-decreasing by `dt_event`
    /// (the merger relies on single-feed monotonicity; this constructor does not re-sort).
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events: events.into(),
            closed: false,
            listeners: ListenerRegistry::default(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: IndexMap<SmolStr, SmolStr>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl EventFeed for FixedSequenceFeed {
    fn peek(&mut self) -> Option<&Event> {
        if self.closed {
            return None;
        }
        self.events.front()
    }

    fn pop(&mut self) -> Option<Event> {
        if self.closed {
            return None;
        }
        let event = self.events.pop_front()?;
        self.listeners.notify(&event);
        Some(event)
    }

    fn is_finished(&self) -> bool {
        self.closed || self.events.is_empty()
    }

    fn add_listener(&mut self, key: &str, listener: Listener) -> Result<(), EngineError> {
        self.listeners.add(key, listener)
    }

    fn remove_listener(&mut self, key: &str) -> Result<(), EngineError> {
        self.listeners.remove(key)
    }

    fn remove_events_before(&mut self, cutoff: DateTime<Utc>) {
        while matches!(self.events.front(), Some(event) if event.dt_event < cutoff) {
            self.events.pop_front();
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn metadata(&self) -> Option<&IndexMap<SmolStr, SmolStr>> {
        self.metadata.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempo_instrument::event::Event;

    fn event_at(minute: u32) -> Event {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap();
        Event::time_notification(ts, ts)
    }

    #[test]
    fn peek_then_pop_preserves_order() {
        let mut feed = FixedSequenceFeed::new(vec![event_at(0), event_at(1), event_at(2)]);

        assert_eq!(feed.peek().unwrap().dt_event, event_at(0).dt_event);
        let popped = feed.pop().unwrap();
        assert_eq!(popped.dt_event, event_at(0).dt_event);
        assert_eq!(feed.peek().unwrap().dt_event, event_at(1).dt_event);
    }

    #[test]
    fn finishes_once_drained() {
        let mut feed = FixedSequenceFeed::new(vec![event_at(0)]);
        assert!(!feed.is_finished());
        feed.pop().unwrap();
        assert!(feed.is_finished());
        assert!(feed.pop().is_none());
    }

    #[test]
    fn remove_events_before_trims_head() {
        let mut feed = FixedSequenceFeed::new(vec![event_at(0), event_at(1), event_at(2)]);
        feed.remove_events_before(event_at(2).dt_event);

        let remaining = feed.peek().unwrap();
        assert!(remaining.dt_event >= event_at(2).dt_event);
    }

    #[test]
    fn close_is_idempotent_and_blocks_further_events() {
        let mut feed = FixedSequenceFeed::new(vec![event_at(0), event_at(1)]);
        feed.close();
        feed.close();

        assert!(feed.is_finished());
        assert!(feed.peek().is_none());
        assert!(feed.pop().is_none());
    }

    #[test]
    fn duplicate_listener_key_is_rejected() {
        let mut feed = FixedSequenceFeed::new(vec![event_at(0)]);
        feed.add_listener("a", Box::new(|_| Ok(()))).unwrap();
        assert!(matches!(
            feed.add_listener("a", Box::new(|_| Ok(()))),
            Err(EngineError::DuplicateListener(_))
        ));
    }

    #[test]
    fn listener_invoked_on_pop() {
        use std::sync::{Arc, Mutex};

        let calls = Arc::new(Mutex::new(0));
        let calls_clone = calls.clone();

        let mut feed = FixedSequenceFeed::new(vec![event_at(0)]);
        feed.add_listener(
            "counter",
            Box::new(move |_event| {
                *calls_clone.lock().unwrap() += 1;
                Ok(())
            }),
        )
        .unwrap();

        feed.pop().unwrap();
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
