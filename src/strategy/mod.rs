//! Trading strategy abstraction.
//!
//! Strategies read the portfolio and price history and emit trade intents;
//! they never mutate state themselves. Concrete variants live in sibling
//! files and are constructed through [`build_strategy`], which replaces the
//! original process-wide strategy registry with explicit configuration.

mod buy_and_hold;
mod ma_cross;
mod rsi;

pub use buy_and_hold::BuyAndHold;
pub use ma_cross::MovingAverageCrossover;
pub use rsi::RsiReversion;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::BacktestConfig;
use crate::data::PriceSeries;
use crate::error::EngineError;
use crate::portfolio::PortfolioState;

/// Direction of a trade intent.
///
/// Short and Cover are declared for forward compatibility but no concrete
/// strategy emits them and the executor rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeKind {
    Buy,
    Sell,
    Short,
    Cover,
}

/// An ephemeral trade request, consumed by the executor the same day
#[derive(Debug, Clone)]
pub struct TradeIntent {
    /// Asset to trade
    pub asset: String,
    /// Buy or sell
    pub kind: TradeKind,
    /// Requested quantity
    pub quantity: Decimal,
    /// Signal strength in [0, 1], when the strategy grades its conviction
    pub strength: Option<f64>,
    /// Free-text origin ("ma crossover entry", "stop loss", ...)
    pub reason: String,
}

impl TradeIntent {
    /// Build a buy intent
    pub fn buy(asset: &str, quantity: Decimal, reason: &str) -> Self {
        Self {
            asset: asset.to_string(),
            kind: TradeKind::Buy,
            quantity,
            strength: None,
            reason: reason.to_string(),
        }
    }

    /// Build a full or partial sell intent
    pub fn sell(asset: &str, quantity: Decimal, reason: &str) -> Self {
        Self {
            asset: asset.to_string(),
            kind: TradeKind::Sell,
            quantity,
            strength: None,
            reason: reason.to_string(),
        }
    }

    /// Attach a signal strength, clamped to [0, 1]
    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = Some(strength.clamp(0.0, 1.0));
        self
    }
}

/// How often the strategy is allowed to act on signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebalanceFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl RebalanceFrequency {
    /// Minimum elapsed calendar days between rebalances
    fn min_elapsed_days(self) -> i64 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Quarterly => 90,
            Self::Yearly => 365,
        }
    }

    /// Gate for requesting signals; a run with no prior rebalance always
    /// passes.
    pub fn should_rebalance(self, current: NaiveDate, last: Option<NaiveDate>) -> bool {
        match last {
            None => true,
            Some(last) => (current - last).num_days() >= self.min_elapsed_days(),
        }
    }
}

/// A trading strategy, polymorphic over signal generation.
///
/// `generate_signals` must be pure with respect to the portfolio: it reads
/// state and history, all mutation belongs to the executor.
pub trait Strategy {
    /// Human-readable strategy name
    fn name(&self) -> &str;

    /// Produce zero or more trade intents for the current date
    fn generate_signals(
        &self,
        date: NaiveDate,
        portfolio: &PortfolioState,
        prices: &PriceSeries,
    ) -> Vec<TradeIntent>;
}

/// Build the configured strategy variant.
pub fn build_strategy(config: &BacktestConfig) -> Result<Box<dyn Strategy>, EngineError> {
    match config.strategy.as_str() {
        "buy_and_hold" => Ok(Box::new(BuyAndHold::new(config.universe.clone()))),
        "ma_crossover" => Ok(Box::new(MovingAverageCrossover::new(
            config.universe.clone(),
            config.short_window,
            config.long_window,
            config.max_position_size,
        ))),
        "rsi_reversion" => Ok(Box::new(RsiReversion::new(
            config.universe.clone(),
            config.rsi_period,
            config.oversold,
            config.overbought,
            config.max_position_size,
        ))),
        other => Err(EngineError::UnknownStrategy(other.to_string())),
    }
}

/// Entry sizing shared by the indicator strategies:
/// `min(max_position_size × portfolio_value, cash) / price`.
pub(crate) fn entry_quantity(
    portfolio: &PortfolioState,
    price: Decimal,
    max_position_size: Decimal,
) -> Decimal {
    if price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let budget = (max_position_size * portfolio.total_value()).min(portfolio.cash);
    budget / price
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_rebalance_initial_always_fires() {
        for freq in [
            RebalanceFrequency::Daily,
            RebalanceFrequency::Weekly,
            RebalanceFrequency::Monthly,
            RebalanceFrequency::Quarterly,
            RebalanceFrequency::Yearly,
        ] {
            assert!(freq.should_rebalance(day(1), None));
        }
    }

    #[test]
    fn test_rebalance_thresholds() {
        let last = Some(day(1));
        assert!(RebalanceFrequency::Daily.should_rebalance(day(2), last));
        assert!(!RebalanceFrequency::Weekly.should_rebalance(day(7), last));
        assert!(RebalanceFrequency::Weekly.should_rebalance(day(8), last));
        assert!(!RebalanceFrequency::Monthly.should_rebalance(day(30), last));
        assert!(RebalanceFrequency::Monthly.should_rebalance(day(31), last));
    }

    #[test]
    fn test_strength_is_clamped() {
        let intent = TradeIntent::buy("AAA", dec!(1), "test").with_strength(1.7);
        assert_eq!(intent.strength, Some(1.0));

        let intent = TradeIntent::buy("AAA", dec!(1), "test").with_strength(-0.2);
        assert_eq!(intent.strength, Some(0.0));
    }

    #[test]
    fn test_factory_rejects_unknown_kind() {
        let config = BacktestConfig {
            strategy: "momentum".to_string(),
            universe: vec!["AAA".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            build_strategy(&config),
            Err(EngineError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_factory_builds_known_kinds() {
        for kind in ["buy_and_hold", "ma_crossover", "rsi_reversion"] {
            let config = BacktestConfig {
                strategy: kind.to_string(),
                universe: vec!["AAA".to_string()],
                ..Default::default()
            };
            assert!(build_strategy(&config).is_ok());
        }
    }

    #[test]
    fn test_entry_quantity_caps_at_cash() {
        use crate::portfolio::Position;

        let mut portfolio = PortfolioState::new(dec!(1000), day(1));
        let qty = entry_quantity(&portfolio, dec!(10), dec!(0.25));
        assert_eq!(qty, dec!(25));

        // Mostly invested: cash becomes the binding constraint
        let mut pos = Position::new("BBB");
        pos.add(dec!(9), dec!(100));
        portfolio.positions.insert("BBB".to_string(), pos);
        portfolio.cash = dec!(100);
        let qty = entry_quantity(&portfolio, dec!(10), dec!(0.25));
        assert_eq!(qty, dec!(10));
    }
}
