use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use smol_str::SmolStr;
use tempo_instrument::event::Event;

use crate::{error::EngineError, listener::Listener};

/// Fixed-sequence [`EventFeed`] built from an in-memory ordered list.
pub mod fixed_sequence;

/// Fixed-interval time-notification feed, bound to another feed's lifetime.
pub mod time_notification;

/// Bar-sequence feed parsed from a CSV file (SPEC_FULL.md §6 "Bar CSV import").
pub mod csv_feed;

/// Time-window bar aggregation feed (SPEC_FULL.md §4.K).
pub mod aggregation;

/// A lazy, time-ordered source of domain [`Event`]s (SPEC_FULL.md §4.A).
///
/// Implementations are single-threaded and driven exclusively by the engine's scheduling loop
/// (SPEC_FULL.md §5): no method here may block or suspend.
pub trait EventFeed: std::fmt::Debug {
    /// The next event this feed will produce, without consuming it. Returns `None` if the feed
    /// currently has nothing ready -- which does not imply [`EventFeed::is_finished`].
    fn peek(&mut self) -> Option<&Event>;

    /// Consumes and returns the next event, synchronously notifying every registered listener (in
    /// registration order) on success. Returns `None` if nothing is ready; this is not an error
    /// (`FeedExhausted` is never raised by `pop`, per SPEC_FULL.md §7).
    fn pop(&mut self) -> Option<Event>;

    /// True iff this feed will never produce another event.
    fn is_finished(&self) -> bool;

    /// Registers a listener under a unique, non-empty `key`. Duplicate or empty keys fail with
    /// [`EngineError::DuplicateListener`] / [`EngineError::Validation`].
    fn add_listener(&mut self, key: &str, listener: Listener) -> Result<(), EngineError>;

    /// Removes a previously registered listener. Unknown keys fail with
    /// [`EngineError::UnknownListener`].
    fn remove_listener(&mut self, key: &str) -> Result<(), EngineError>;

    /// Trims the head of the lazy stream so that the first remaining event (if any) has
    /// `dt_event >= cutoff`. Used when a feed is registered on an already-running strategy whose
    /// timeline has already advanced past `cutoff` (SPEC_FULL.md §4.A, §4.I).
    fn remove_events_before(&mut self, cutoff: DateTime<Utc>);

    /// Idempotent, non-blocking resource release. After `close()`, `peek`/`pop` return `None` and
    /// `is_finished` returns `true`.
    fn close(&mut self);

    /// Optional read-only metadata bag.
    fn metadata(&self) -> Option<&IndexMap<SmolStr, SmolStr>> {
        None
    }
}
