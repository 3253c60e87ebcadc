#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::too_many_arguments)]

//! # Tempo Execution
//! Order state machine, order-book fill simulation and simulated broker for the Tempo
//! event-driven trading framework.
//!
//! This crate turns `tempo-instrument` market-data and order-book types into executions: an
//! `Order` lifecycle FSM, a venue-agnostic `Broker` trait, a deterministic `SimulatedBroker`
//! that matches resting orders against `OrderBook` snapshots, and the bar/tick-to-order-book
//! `converter` that feeds it from raw market data.

/// Ledger of cash and margin for a single simulated broker.
pub mod account;

/// Matches resting orders against an `OrderBook`, producing `OrderFill`s.
pub mod book_fill;

/// The `Broker` trait: the capability every execution venue (simulated or real) implements.
pub mod broker;

/// Converts `Bar`, `TradeTick` and `QuoteTick` events into `OrderBook` snapshots.
pub mod converter;

/// `MarketDepthModel` — synthesizes book depth beyond the best bid/ask.
pub mod depth;

/// Crate-wide error type.
pub mod error;

/// `Order`, `OrderFill`, `OrderId` and the order lifecycle FSM.
pub mod order;

/// `FeeModel`, `MarginModel` and `FillModel` — pluggable execution-cost policies.
pub mod policy;

/// `SimulatedBroker` — a deterministic, in-process `Broker` driven by converted order books.
pub mod sim_broker;

/// The generic, reusable finite state machine abstraction.
pub mod state;
