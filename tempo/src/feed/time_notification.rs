use super::EventFeed;
use crate::{
    error::EngineError,
    listener::{Listener, ListenerRegistry},
};
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::{cell::Cell, rc::Rc};
use tempo_instrument::event::Event;

/// A `Rc<Cell<bool>>` reflecting whether a bound feed has finished, kept current by
/// [`TrackedFeed`] every time the wrapped feed's [`EventFeed::is_finished`] is queried.
pub type FinishedFlag = Rc<Cell<bool>>;

/// Wraps any [`EventFeed`], exposing a cloneable [`FinishedFlag`] that mirrors
/// [`EventFeed::is_finished`] -- the handle a [`TimeNotificationFeed`] uses to discover when the
/// feed it is bound to has completed (SPEC_FULL.md §4.A).
#[derive(Debug)]
pub struct TrackedFeed<F> {
    inner: F,
    finished: FinishedFlag,
}

impl<F: EventFeed> TrackedFeed<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            finished: Rc::new(Cell::new(false)),
        }
    }

    pub fn finished_flag(&self) -> FinishedFlag {
        self.finished.clone()
    }
}

impl<F: EventFeed> EventFeed for TrackedFeed<F> {
    fn peek(&mut self) -> Option<&Event> {
        self.inner.peek()
    }

    fn pop(&mut self) -> Option<Event> {
        self.inner.pop()
    }

    fn is_finished(&self) -> bool {
        let finished = self.inner.is_finished();
        self.finished.set(finished);
        finished
    }

    fn add_listener(&mut self, key: &str, listener: Listener) -> Result<(), EngineError> {
        self.inner.add_listener(key, listener)
    }

    fn remove_listener(&mut self, key: &str) -> Result<(), EngineError> {
        self.inner.remove_listener(key)
    }

    fn remove_events_before(&mut self, cutoff: DateTime<Utc>) {
        self.inner.remove_events_before(cutoff)
    }

    fn close(&mut self) {
        self.inner.close();
        self.finished.set(true);
    }

    fn metadata(&self) -> Option<&IndexMap<SmolStr, SmolStr>> {
        self.inner.metadata()
    }
}

/// Emits a [`Event::time_notification`] every `interval`, starting at `start`, until the feed it
/// is bound to (via a [`FinishedFlag`]) finishes (SPEC_FULL.md §4.A).
#[derive(Debug)]
pub struct TimeNotificationFeed {
    next_dt: Option<DateTime<Utc>>,
    interval: Duration,
    bound_finished: FinishedFlag,
    closed: bool,
    pending: Option<Event>,
    listeners: ListenerRegistry,
}

impl TimeNotificationFeed {
    pub fn new(start: DateTime<Utc>, interval: Duration, bound_finished: FinishedFlag) -> Self {
        Self {
            next_dt: Some(start),
            interval,
            bound_finished,
            closed: false,
            pending: None,
            listeners: ListenerRegistry::default(),
        }
    }

    fn refill(&mut self) {
        if self.pending.is_some() || self.closed {
            return;
        }
        if self.bound_finished.get() {
            self.next_dt = None;
            return;
        }
        if let Some(dt) = self.next_dt {
            self.pending = Some(Event::time_notification(dt, dt));
            self.next_dt = Some(dt + self.interval);
        }
    }
}

impl EventFeed for TimeNotificationFeed {
    fn peek(&mut self) -> Option<&Event> {
        if self.closed {
            return None;
        }
        self.refill();
        self.pending.as_ref()
    }

    fn pop(&mut self) -> Option<Event> {
        if self.closed {
            return None;
        }
        self.refill();
        let event = self.pending.take()?;
        self.listeners.notify(&event);
        Some(event)
    }

    fn is_finished(&self) -> bool {
        self.closed || (self.pending.is_none() && self.next_dt.is_none())
    }

    fn add_listener(&mut self, key: &str, listener: Listener) -> Result<(), EngineError> {
        self.listeners.add(key, listener)
    }

    fn remove_listener(&mut self, key: &str) -> Result<(), EngineError> {
        self.listeners.remove(key)
    }

    fn remove_events_before(&mut self, cutoff: DateTime<Utc>) {
        while matches!(self.next_dt, Some(dt) if dt < cutoff) {
            self.next_dt = self.next_dt.map(|dt| dt + self.interval);
        }
        if matches!(&self.pending, Some(event) if event.dt_event < cutoff) {
            self.pending = None;
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
