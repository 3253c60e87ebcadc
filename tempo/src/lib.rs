#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::too_many_arguments)]

//! # Tempo
//! Event-driven trading framework: event feeds, strategy lifecycle and the trading engine.
//!
//! `tempo` is the top-level crate. It owns the scheduling loop that turns one or more
//! chronologically ordered [`feed::EventFeed`]s into callbacks on user-written
//! [`strategy::Strategy`] implementations, and routes the resulting orders to the
//! `tempo-execution` brokers those strategies are wired to. `tempo-instrument` supplies the
//! market-data and money types everything else builds on.

/// Top-level, serializable engine configuration.
pub mod config;

/// The top-level orchestrator: [`engine::Engine`], [`engine::EngineBuilder`] and the engine FSM.
pub mod engine;

/// Crate-wide error type.
pub mod error;

/// `EventFeed` and its concrete implementations: fixed sequences, CSV-backed bar replay,
/// time-notification ticking and bar aggregation.
pub mod feed;

/// The observer registry strategies and brokers can be inspected through.
pub mod listener;

/// Default `tracing` logging initialisers for host binaries and tests.
pub mod logging;

/// Chronological, tie-broken selection across a strategy's registered feeds.
pub mod merger;

/// Tracks which strategy (and broker) owns each in-flight order.
pub mod routing;

/// `Strategy`, `StrategyContext` and the strategy lifecycle FSM.
pub mod strategy;

pub use config::EngineConfig;
pub use engine::{BrokerSlot, Engine, EngineBuilder, EngineStatus};
pub use error::EngineError;
pub use strategy::{Strategy, StrategyContext, StrategyStatus};
