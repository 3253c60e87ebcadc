use crate::strategy::FeedRegistration;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use smol_str::SmolStr;

/// Selects the next event to dispatch across one strategy's registered feeds (SPEC_FULL.md §4.B):
/// the feed whose peeked event has the smallest `dt_event` wins, ties broken by registration
/// order (the [`IndexMap`]'s iteration order). Returns the winning feed's position, or `None` if
/// no feed currently has a ready event.
pub fn select_next(feeds: &mut IndexMap<SmolStr, FeedRegistration>) -> Option<usize> {
    let mut winner: Option<(usize, DateTime<Utc>)> = None;

    for (index, (_, registration)) in feeds.iter_mut().enumerate() {
        let Some(event) = registration.feed.peek() else { continue };
        match &winner {
            Some((_, best_dt)) if event.dt_event >= *best_dt => {}
            _ => winner = Some((index, event.dt_event)),
        }
    }

    winner.map(|(index, _)| index)
}

/// True iff every feed registered with the strategy is finished.
pub fn all_finished(feeds: &mut IndexMap<SmolStr, FeedRegistration>) -> bool {
    feeds.values_mut().all(|registration| registration.feed.is_finished())
}
