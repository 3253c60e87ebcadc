use crate::error::EngineError;
use indexmap::IndexMap;
use smol_str::SmolStr;
use tempo_instrument::event::Event;
use tracing::warn;

/// A feed listener: notified on every `pop()`, in registration order. Fallible, per spec.md
/// §4.A -- "listener errors are logged and swallowed", not "listeners cannot fail".
pub type Listener = Box<dyn FnMut(&Event) -> Result<(), EngineError>>;

/// Owner-indexed slots (key -> callback) shared by every built-in [`crate::feed::EventFeed`]
/// implementation.
///
/// Grounded in the re-architecture directive of SPEC_FULL.md §9: listener callbacks on feeds are
/// expressed as a key -> callable map rather than an ad hoc observer list, so `pop()` can iterate
/// in registration order and swallow (log-and-continue) any listener error without aborting the
/// feed.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: IndexMap<SmolStr, Listener>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("keys", &self.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ListenerRegistry {
    pub fn add(&mut self, key: &str, listener: Listener) -> Result<(), EngineError> {
        if key.is_empty() {
            return Err(EngineError::Validation("listener key must not be empty".into()));
        }
        if self.listeners.contains_key(key) {
            return Err(EngineError::DuplicateListener(key.to_string()));
        }
        self.listeners.insert(SmolStr::new(key), listener);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Result<(), EngineError> {
        self.listeners
            .shift_remove(key)
            .map(|_| ())
            .ok_or_else(|| EngineError::UnknownListener(key.to_string()))
    }

    /// Invokes every listener, in registration order, with `event`. A listener's error is logged
    /// and swallowed rather than propagated, per SPEC_FULL.md §4.A -- one misbehaving listener
    /// must never abort the feed or block the others from running.
    pub fn notify(&mut self, event: &Event) {
        for (key, listener) in self.listeners.iter_mut() {
            if let Err(error) = listener(event) {
                warn!(listener = %key, %error, "event feed listener failed; continuing");
            }
        }
    }
}
