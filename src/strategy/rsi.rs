//! RSI mean-reversion strategy.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::data::PriceSeries;
use crate::portfolio::PortfolioState;

use super::{entry_quantity, Strategy, TradeIntent};

/// Buys when the relative-strength index drops below the oversold
/// threshold, fully exits when it rises above the overbought one.
pub struct RsiReversion {
    universe: Vec<String>,
    period: usize,
    oversold: f64,
    overbought: f64,
    max_position_size: Decimal,
}

impl RsiReversion {
    pub fn new(
        universe: Vec<String>,
        period: usize,
        oversold: f64,
        overbought: f64,
        max_position_size: Decimal,
    ) -> Self {
        Self {
            universe,
            period,
            oversold,
            overbought,
            max_position_size,
        }
    }

    /// RSI over the trailing `period` price changes, bounded to [0, 100].
    ///
    /// Simple rolling average of gains and losses; `closes` must hold
    /// `period + 1` prints oldest-first.
    fn rsi(closes: &[f64], period: usize) -> f64 {
        let mut gain_sum = 0.0;
        let mut loss_sum = 0.0;
        for pair in closes.windows(2) {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                gain_sum += change;
            } else {
                loss_sum += -change;
            }
        }
        let avg_gain = gain_sum / period as f64;
        let avg_loss = loss_sum / period as f64;

        if avg_loss == 0.0 {
            return if avg_gain == 0.0 { 50.0 } else { 100.0 };
        }
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

impl Strategy for RsiReversion {
    fn name(&self) -> &str {
        "rsi_reversion"
    }

    fn generate_signals(
        &self,
        date: NaiveDate,
        portfolio: &PortfolioState,
        prices: &PriceSeries,
    ) -> Vec<TradeIntent> {
        let mut intents = Vec::new();
        let needed = self.period + 1;

        for asset in &self.universe {
            let window = prices.closes_through(asset, date, needed);
            if window.len() < needed {
                continue;
            }
            let Some(price) = prices.close(asset, date) else {
                continue;
            };

            let closes: Vec<f64> = window.iter().filter_map(|c| c.to_f64()).collect();
            if closes.len() < needed {
                continue;
            }

            let rsi = Self::rsi(&closes, self.period);

            if rsi < self.oversold && !portfolio.has_open_position(asset) {
                let quantity = entry_quantity(portfolio, price, self.max_position_size);
                if quantity > Decimal::ZERO {
                    let strength = (self.oversold - rsi) / self.oversold;
                    intents.push(
                        TradeIntent::buy(asset, quantity, "rsi oversold entry")
                            .with_strength(strength),
                    );
                }
            } else if rsi > self.overbought {
                if let Some(position) = portfolio.position(asset) {
                    if position.is_open() {
                        let strength = (rsi - self.overbought) / (100.0 - self.overbought);
                        intents.push(
                            TradeIntent::sell(asset, position.quantity, "rsi overbought exit")
                                .with_strength(strength),
                        );
                    }
                }
            }
        }

        intents
    }
}

// ============================================================================
// Tests
// ============================================================================
