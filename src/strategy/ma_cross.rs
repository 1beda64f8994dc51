//! Moving-average crossover strategy.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::data::PriceSeries;
use crate::portfolio::PortfolioState;

use super::{entry_quantity, Strategy, TradeIntent};

/// Enters when the short rolling mean crosses above the long one, fully
/// exits on the reverse crossover.
pub struct MovingAverageCrossover {
    universe: Vec<String>,
    short_window: usize,
    long_window: usize,
    max_position_size: Decimal,
}

impl MovingAverageCrossover {
    pub fn new(
        universe: Vec<String>,
        short_window: usize,
        long_window: usize,
        max_position_size: Decimal,
    ) -> Self {
        Self {
            universe,
            short_window,
            long_window,
            max_position_size,
        }
    }

    /// Mean of the trailing `window` closes, today and yesterday.
    ///
    /// `closes` holds the last `long_window + 1` prints oldest-first.
    fn rolling_means(closes: &[f64], window: usize) -> (f64, f64) {
        let n = closes.len();
        let today: f64 = closes[n - window..].iter().sum::<f64>() / window as f64;
        let yesterday: f64 = closes[n - window - 1..n - 1].iter().sum::<f64>() / window as f64;
        (today, yesterday)
    }
}

impl Strategy for MovingAverageCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn generate_signals(
        &self,
        date: NaiveDate,
        portfolio: &PortfolioState,
        prices: &PriceSeries,
    ) -> Vec<TradeIntent> {
        let mut intents = Vec::new();
        // Crossover detection needs one extra print for yesterday's means
        let needed = self.long_window + 1;

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

            let (short_now, short_prev) = Self::rolling_means(&closes, self.short_window);
            let (long_now, long_prev) = Self::rolling_means(&closes, self.long_window);

            let crossed_up = short_prev <= long_prev && short_now > long_now;
            let crossed_down = short_prev >= long_prev && short_now < long_now;

            if crossed_up && !portfolio.has_open_position(asset) {
                let quantity = entry_quantity(portfolio, price, self.max_position_size);
                if quantity > Decimal::ZERO {
                    intents.push(TradeIntent::buy(asset, quantity, "ma crossover entry"));
                }
            } else if crossed_down {
                if let Some(position) = portfolio.position(asset) {
                    if position.is_open() {
                        intents.push(TradeIntent::sell(
                            asset,
                            position.quantity,
                            "ma crossover exit",
                        ));
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
