//! Backtest Engine Library
//!
//! Replays a trading strategy against historical daily closing prices,
//! simulates a virtual portfolio under realistic frictions, and produces a
//! statistically rigorous performance report.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        SimulationLoop                            │
//! │   per trading date:                                              │
//! │   ┌──────────────┐  ┌────────────┐  ┌─────────────┐  ┌────────┐ │
//! │   │ mark-to-     │→ │ Strategy   │→ │ RiskManager │→ │ daily  │ │
//! │   │ market       │  │ signals    │  │ sweep       │  │snapshot│ │
//! │   └──────────────┘  └─────┬──────┘  └──────┬──────┘  └────────┘ │
//! │                          via TradeExecutor                       │
//! └──────────────────────────────────────────────────────────────────┘
//!                 ↓ after the last date
//!        PerformanceCalculator → BacktestResult
//! ```
//!
//! # Key concepts
//!
//! - Strategies are pure signal generators; only the executor mutates the
//!   portfolio, and one run exclusively owns its state.
//! - Money and quantities use fixed-point `Decimal` arithmetic; statistical
//!   summaries use `f64`.
//! - Execution rejections and per-date data gaps are not errors; the run
//!   carries on and only configuration problems stop it before it starts.
//!
//! Loading prices, persisting results and exposing them over a network are
//! the caller's responsibility.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod execution;
pub mod performance;
pub mod portfolio;
pub mod report;
pub mod risk;
pub mod strategy;

pub use config::BacktestConfig;
pub use data::PriceSeries;
pub use engine::{BacktestResult, RunStatus, SimulationLoop};
pub use error::EngineError;
pub use execution::{ExecutedTrade, TradeExecutor};
pub use performance::{BacktestMetrics, PerformanceCalculator};
pub use portfolio::{DailySnapshot, PortfolioState, Position};
pub use report::BacktestReport;
pub use risk::RiskManager;
pub use strategy::{
    build_strategy, RebalanceFrequency, Strategy, TradeIntent, TradeKind,
};
