//! Backtest configuration and validation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::strategy::RebalanceFrequency;

/// Backtest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Strategy kind ("buy_and_hold", "ma_crossover", "rsi_reversion")
    pub strategy: String,
    /// Assets the strategy may trade
    pub universe: Vec<String>,
    /// First simulated date (inclusive)
    pub start_date: NaiveDate,
    /// Last simulated date (inclusive)
    pub end_date: NaiveDate,
    /// Starting cash
    pub initial_capital: Decimal,
    /// How often the strategy is allowed to act on signals
    pub rebalance_frequency: RebalanceFrequency,
    /// Maximum fraction of portfolio value per position, in (0, 1]
    pub max_position_size: Decimal,
    /// Transaction cost as a fraction of trade value
    pub transaction_cost: Decimal,
    /// Slippage as a fraction of trade value
    pub slippage: Decimal,
    /// Stop-loss threshold as a fraction of cost basis (e.g. 0.10 = -10%)
    pub stop_loss: Option<Decimal>,
    /// Take-profit threshold as a fraction of cost basis
    pub take_profit: Option<Decimal>,
    /// Benchmark asset for relative performance statistics
    pub benchmark: Option<String>,
    /// Annual risk-free rate used by Sharpe/Sortino/alpha
    pub risk_free_rate: f64,
    /// Short moving-average window (ma_crossover)
    pub short_window: usize,
    /// Long moving-average window (ma_crossover)
    pub long_window: usize,
    /// RSI lookback period (rsi_reversion)
    pub rsi_period: usize,
    /// RSI oversold threshold (rsi_reversion)
    pub oversold: f64,
    /// RSI overbought threshold (rsi_reversion)
    pub overbought: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            strategy: "buy_and_hold".to_string(),
            universe: Vec::new(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            initial_capital: dec!(100000),
            rebalance_frequency: RebalanceFrequency::Daily,
            max_position_size: dec!(0.25),
            transaction_cost: dec!(0.001),
            slippage: dec!(0.0005),
            stop_loss: None,
            take_profit: None,
            benchmark: None,
            risk_free_rate: 0.0,
            short_window: 5,
            long_window: 20,
            rsi_period: 14,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

impl BacktestConfig {
    /// Validate parameter ranges.
    ///
    /// Strategy-kind resolution happens separately in the strategy factory.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.universe.is_empty() {
            return Err(EngineError::EmptyUniverse);
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig(
                "initial_capital must be positive".to_string(),
            ));
        }
        if self.start_date > self.end_date {
            return Err(EngineError::InvalidConfig(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            )));
        }
        if self.max_position_size <= Decimal::ZERO || self.max_position_size > Decimal::ONE {
            return Err(EngineError::InvalidConfig(
                "max_position_size must be in (0, 1]".to_string(),
            ));
        }
        if self.transaction_cost < Decimal::ZERO || self.slippage < Decimal::ZERO {
            return Err(EngineError::InvalidConfig(
                "cost fractions must be non-negative".to_string(),
            ));
        }
        if let Some(sl) = self.stop_loss {
            if sl <= Decimal::ZERO {
                return Err(EngineError::InvalidConfig(
                    "stop_loss must be positive".to_string(),
                ));
            }
        }
        if let Some(tp) = self.take_profit {
            if tp <= Decimal::ZERO {
                return Err(EngineError::InvalidConfig(
                    "take_profit must be positive".to_string(),
                ));
            }
        }
        if self.strategy == "ma_crossover" && self.short_window >= self.long_window {
            return Err(EngineError::InvalidConfig(format!(
                "short_window {} must be below long_window {}",
                self.short_window, self.long_window
            )));
        }
        if self.strategy == "rsi_reversion" {
            if self.rsi_period < 2 {
                return Err(EngineError::InvalidConfig(
                    "rsi_period must be at least 2".to_string(),
                ));
            }
            if self.oversold >= self.overbought {
                return Err(EngineError::InvalidConfig(format!(
                    "oversold {} must be below overbought {}",
                    self.oversold, self.overbought
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
