#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::too_many_arguments)]

//! # Tempo Instrument
//! Core `Instrument`, `Currency`, `Money` and market-data value types shared by the Tempo
//! event-driven trading framework.
//!
//! This crate owns no behavior beyond construction-time validation: the event-scheduling engine,
//! order routing and simulated broker live in the `tempo` and `tempo-execution` crates.

/// `Bar` and `BarType` — aggregated OHLCV observations and their identity.
pub mod bar;

/// `OrderBook` and `BookLevel` — depth-of-book snapshots.
pub mod book;

/// Process-wide `Currency` registry.
pub mod currency;

/// Crate-wide error type.
pub mod error;

/// The closed `Event` variant set flowing through an Event Feed.
pub mod event;

/// `Instrument` identity and specification.
pub mod instrument;

/// Exact-decimal, currency-scoped `Money`.
pub mod money;

/// `TradeTick`, `QuoteTick` and `PriceSample`.
pub mod tick;

/// Topic-string rendering for optional message-bus integration.
pub mod topic;
