//! Portfolio state mutated by the simulation loop.
//!
//! One `PortfolioState` is owned by a single run and passed by exclusive
//! reference through the executor and the risk manager; nothing else ever
//! holds a copy while the run is in flight.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A holding in one asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Asset identifier
    pub asset: String,
    /// Quantity held, never negative
    pub quantity: Decimal,
    /// Weighted-average cost per unit
    pub avg_cost: Decimal,
    /// Last known market price (forward-filled on quiet dates)
    pub last_price: Decimal,
}

impl Position {
    /// Create a new empty position for an asset
    pub fn new(asset: &str) -> Self {
        Self {
            asset: asset.to_string(),
            quantity: Decimal::ZERO,
            avg_cost: Decimal::ZERO,
            last_price: Decimal::ZERO,
        }
    }

    /// Whether any quantity is held
    pub fn is_open(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    /// Update the mark price
    pub fn update_price(&mut self, price: Decimal) {
        self.last_price = price;
    }

    /// Quantity × mark price
    pub fn market_value(&self) -> Decimal {
        self.quantity * self.last_price
    }

    /// Quantity × weighted-average cost
    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.avg_cost
    }

    /// Market value minus cost basis
    pub fn unrealized_pnl(&self) -> Decimal {
        self.market_value() - self.cost_basis()
    }

    /// Unrealized P&L as a fraction of cost basis, `None` when flat
    pub fn unrealized_pnl_frac(&self) -> Option<Decimal> {
        let basis = self.cost_basis();
        if basis <= Decimal::ZERO {
            return None;
        }
        Some(self.unrealized_pnl() / basis)
    }

    /// Add quantity at a price, blending the average cost
    pub fn add(&mut self, quantity: Decimal, price: Decimal) {
        let total_qty = self.quantity + quantity;
        if total_qty > Decimal::ZERO {
            self.avg_cost = (self.cost_basis() + quantity * price) / total_qty;
        }
        self.quantity = total_qty;
        self.last_price = price;
    }

    /// Remove quantity; a fully closed position resets its average cost
    pub fn reduce(&mut self, quantity: Decimal, price: Decimal) {
        self.quantity -= quantity;
        self.last_price = price;
        if self.quantity <= Decimal::ZERO {
            self.quantity = Decimal::ZERO;
            self.avg_cost = Decimal::ZERO;
        }
    }
}

/// The mutable simulation state
#[derive(Debug, Clone)]
pub struct PortfolioState {
    /// Cash balance, never negative after a successful execution
    pub cash: Decimal,
    /// Open (and previously opened) positions keyed by asset
    pub positions: HashMap<String, Position>,
    /// Current simulation date
    pub current_date: NaiveDate,
}

impl PortfolioState {
    /// Start a run with cash only
    pub fn new(initial_capital: Decimal, start_date: NaiveDate) -> Self {
        Self {
            cash: initial_capital,
            positions: HashMap::new(),
            current_date: start_date,
        }
    }

    /// Position for an asset, if one was ever opened
    pub fn position(&self, asset: &str) -> Option<&Position> {
        self.positions.get(asset)
    }

    /// Whether an asset currently has quantity on the book
    pub fn has_open_position(&self, asset: &str) -> bool {
        self.positions.get(asset).is_some_and(Position::is_open)
    }

    /// Sum of position market values
    pub fn invested_value(&self) -> Decimal {
        self.positions.values().map(Position::market_value).sum()
    }

    /// Cash plus invested value
    pub fn total_value(&self) -> Decimal {
        self.cash + self.invested_value()
    }
}

/// Per-position slice of a daily snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub asset: String,
    pub quantity: Decimal,
    pub value: Decimal,
    /// Share of total portfolio value
    pub weight: f64,
    pub unrealized_pnl: Decimal,
}

/// Immutable end-of-day record, one per simulated date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub total_value: Decimal,
    pub cash: Decimal,
    pub invested_value: Decimal,
    /// Day-over-day return
    pub daily_return: f64,
    /// Return since inception
    pub cumulative_return: f64,
    pub positions: Vec<PositionSnapshot>,
    /// Benchmark-equivalent portfolio value, when a benchmark is configured
    pub benchmark_value: Option<Decimal>,
    /// Benchmark day-over-day return
    pub benchmark_return: Option<f64>,
}

// ============================================================================
// Tests
// ============================================================================
