//! Buy-and-hold: one equal-weight allocation, then nothing.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::data::PriceSeries;
use crate::portfolio::PortfolioState;

use super::{Strategy, TradeIntent};

/// Allocates cash equally across the universe on the first trading date and
/// produces no further signals.
pub struct BuyAndHold {
    universe: Vec<String>,
}

impl BuyAndHold {
    pub fn new(universe: Vec<String>) -> Self {
        Self { universe }
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn generate_signals(
        &self,
        date: NaiveDate,
        portfolio: &PortfolioState,
        prices: &PriceSeries,
    ) -> Vec<TradeIntent> {
        // The allocation happens exactly once: as soon as any universe asset
        // has ever been bought, the position map carries its entry (even
        // after a forced exit) and the strategy stays quiet.
        if self.universe.is_empty() || !portfolio.positions.is_empty() {
            return Vec::new();
        }

        let share = portfolio.cash / Decimal::from(self.universe.len() as u64);
        let mut intents = Vec::new();

        for asset in &self.universe {
            let Some(price) = prices.close(asset, date) else {
                debug!(asset = %asset, date = %date, "No price for initial allocation, skipping");
                continue;
            };
            if price <= Decimal::ZERO {
                continue;
            }
            let quantity = (share / price).floor();
            if quantity > Decimal::ZERO {
                intents.push(TradeIntent::buy(asset, quantity, "initial allocation"));
            }
        }

        intents
    }
}

// ============================================================================
// Tests
// ============================================================================
