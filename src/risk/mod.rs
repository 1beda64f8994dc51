//! Daily risk sweep over open positions.

use rust_decimal::Decimal;
use tracing::info;

use crate::portfolio::PortfolioState;
use crate::strategy::TradeIntent;

/// Emits forced full exits on stop-loss / take-profit breaches.
///
/// Runs once per date after strategy signals; the resulting intents go
/// through the executor exactly like strategy-originated ones.
pub struct RiskManager {
    stop_loss: Option<Decimal>,
    take_profit: Option<Decimal>,
}

impl RiskManager {
    /// Build the manager when at least one threshold is configured
    pub fn from_thresholds(
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Option<Self> {
        if stop_loss.is_none() && take_profit.is_none() {
            return None;
        }
        Some(Self {
            stop_loss,
            take_profit,
        })
    }

    /// One pass over open positions, stop-loss checked before take-profit
    pub fn check(&self, portfolio: &PortfolioState) -> Vec<TradeIntent> {
        let mut intents = Vec::new();

        // HashMap order is arbitrary; sort so runs stay deterministic
        let mut assets: Vec<&String> = portfolio.positions.keys().collect();
        assets.sort();

        for asset in assets {
            let position = &portfolio.positions[asset];
            if !position.is_open() {
                continue;
            }
            let Some(pnl_frac) = position.unrealized_pnl_frac() else {
                continue;
            };

            if let Some(stop) = self.stop_loss {
                if pnl_frac <= -stop {
                    info!(
                        asset = %asset,
                        pnl_frac = %pnl_frac,
                        "Stop loss breached, forcing exit"
                    );
                    intents.push(TradeIntent::sell(asset, position.quantity, "stop loss"));
                    continue;
                }
            }
            if let Some(target) = self.take_profit {
                if pnl_frac >= target {
                    info!(
                        asset = %asset,
                        pnl_frac = %pnl_frac,
                        "Take profit reached, forcing exit"
                    );
                    intents.push(TradeIntent::sell(asset, position.quantity, "take profit"));
                }
            }
        }

        intents
    }
}

// ============================================================================
// Tests
// ============================================================================
