//! Trade execution against the portfolio.
//!
//! The executor is the only writer of portfolio state during a run. It
//! applies one intent at a time under cash/quantity constraints and cost
//! models, producing immutable ledger entries.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::PriceSeries;
use crate::portfolio::{PortfolioState, Position};
use crate::strategy::{TradeIntent, TradeKind};

/// Immutable ledger entry for one filled trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedTrade {
    pub asset: String,
    pub kind: TradeKind,
    pub date: NaiveDate,
    pub quantity: Decimal,
    /// Execution price (the day's close)
    pub price: Decimal,
    pub transaction_cost: Decimal,
    pub slippage_cost: Decimal,
    /// Quantity × price
    pub gross_value: Decimal,
    /// Cash actually moved: debit for buys, credit for sells
    pub net_value: Decimal,
    pub portfolio_value_before: Decimal,
    pub portfolio_value_after: Decimal,
    /// Position value as a percentage of the post-trade portfolio
    pub position_size_pct: f64,
    /// P&L realized against the weighted-average cost, sells only
    pub realized_pnl: Option<Decimal>,
    /// Originating signal or risk rule
    pub reason: String,
}

impl ExecutedTrade {
    /// Total friction paid on this fill
    pub fn total_costs(&self) -> Decimal {
        self.transaction_cost + self.slippage_cost
    }

    /// Whether this is a position-reducing trade
    pub fn is_closing(&self) -> bool {
        self.kind == TradeKind::Sell
    }
}

/// Applies trade intents under the configured cost model.
///
/// Rejections (insufficient cash, oversized sell, missing price) drop the
/// intent and the run continues; they are never errors.
pub struct TradeExecutor {
    transaction_cost: Decimal,
    slippage: Decimal,
}

impl TradeExecutor {
    pub fn new(transaction_cost: Decimal, slippage: Decimal) -> Self {
        Self {
            transaction_cost,
            slippage,
        }
    }

    /// Execute one intent. Returns `None` when the intent is rejected.
    pub fn execute(
        &self,
        intent: &TradeIntent,
        portfolio: &mut PortfolioState,
        date: NaiveDate,
        prices: &PriceSeries,
    ) -> Option<ExecutedTrade> {
        if intent.quantity <= Decimal::ZERO {
            debug!(asset = %intent.asset, "Rejected intent with non-positive quantity");
            return None;
        }

        let Some(price) = prices.close(&intent.asset, date) else {
            debug!(asset = %intent.asset, date = %date, "No price today, intent dropped");
            return None;
        };

        let gross_value = intent.quantity * price;
        let transaction_cost = gross_value * self.transaction_cost;
        let slippage_cost = gross_value * self.slippage;
        let value_before = portfolio.total_value();

        let (net_value, realized_pnl) = match intent.kind {
            TradeKind::Buy => {
                let total_debit = gross_value + transaction_cost + slippage_cost;
                if portfolio.cash < total_debit {
                    debug!(
                        asset = %intent.asset,
                        needed = %total_debit,
                        cash = %portfolio.cash,
                        "Insufficient cash, buy rejected"
                    );
                    return None;
                }
                portfolio.cash -= total_debit;
                portfolio
                    .positions
                    .entry(intent.asset.clone())
                    .or_insert_with(|| Position::new(&intent.asset))
                    .add(intent.quantity, price);
                (total_debit, None)
            }
            TradeKind::Sell => {
                let Some(position) = portfolio.positions.get_mut(&intent.asset) else {
                    debug!(asset = %intent.asset, "No position to sell, intent dropped");
                    return None;
                };
                if intent.quantity > position.quantity {
                    debug!(
                        asset = %intent.asset,
                        requested = %intent.quantity,
                        held = %position.quantity,
                        "Oversized sell rejected"
                    );
                    return None;
                }
                let pnl = (price - position.avg_cost) * intent.quantity
                    - transaction_cost
                    - slippage_cost;
                position.reduce(intent.quantity, price);
                let credit = gross_value - transaction_cost - slippage_cost;
                portfolio.cash += credit;
                (credit, Some(pnl))
            }
            TradeKind::Short | TradeKind::Cover => {
                debug!(asset = %intent.asset, kind = ?intent.kind, "Unsupported trade kind, intent dropped");
                return None;
            }
        };

        let value_after = portfolio.total_value();
        let position_value = portfolio
            .position(&intent.asset)
            .map(Position::market_value)
            .unwrap_or(Decimal::ZERO);
        let position_size_pct = if value_after > Decimal::ZERO {
            (position_value / value_after).to_f64().unwrap_or(0.0) * 100.0
        } else {
            0.0
        };

        debug!(
            asset = %intent.asset,
            kind = ?intent.kind,
            quantity = %intent.quantity,
            price = %price,
            reason = %intent.reason,
            "Trade executed"
        );

        Some(ExecutedTrade {
            asset: intent.asset.clone(),
            kind: intent.kind,
            date,
            quantity: intent.quantity,
            price,
            transaction_cost,
            slippage_cost,
            gross_value,
            net_value,
            portfolio_value_before: value_before,
            portfolio_value_after: value_after,
            position_size_pct,
            realized_pnl,
            reason: intent.reason.clone(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn single_price(price: Decimal) -> PriceSeries {
        let mut series = PriceSeries::new();
        series.insert("AAA", day(1), price);
        series
    }

    fn costless() -> TradeExecutor {
        TradeExecutor::new(Decimal::ZERO, Decimal::ZERO)
    }

    #[test]
    fn test_buy_debits_cash_and_opens_position() {
        let executor = TradeExecutor::new(dec!(0.001), dec!(0.0005));
        let mut portfolio = PortfolioState::new(dec!(10000), day(1));
        let prices = single_price(dec!(100));

        let intent = TradeIntent::buy("AAA", dec!(50), "test");
        let trade = executor.execute(&intent, &mut portfolio, day(1), &prices).unwrap();

        assert_eq!(trade.gross_value, dec!(5000));
        assert_eq!(trade.transaction_cost, dec!(5));
        assert_eq!(trade.slippage_cost, dec!(2.5));
        assert_eq!(portfolio.cash, dec!(4992.5));
        assert_eq!(portfolio.position("AAA").unwrap().quantity, dec!(50));
        assert_eq!(portfolio.position("AAA").unwrap().avg_cost, dec!(100));
        // Portfolio value drops by exactly the friction
        assert_eq!(trade.portfolio_value_before, dec!(10000));
        assert_eq!(trade.portfolio_value_after, dec!(9992.5));
    }

    #[test]
    fn test_buy_rejected_when_cash_short() {
        let executor = TradeExecutor::new(dec!(0.001), Decimal::ZERO);
        let mut portfolio = PortfolioState::new(dec!(5000), day(1));
        let prices = single_price(dec!(100));

        // Gross fits exactly, but the commission does not
        let intent = TradeIntent::buy("AAA", dec!(50), "test");
        assert!(executor.execute(&intent, &mut portfolio, day(1), &prices).is_none());
        assert_eq!(portfolio.cash, dec!(5000));
        assert!(portfolio.positions.is_empty());
    }

    #[test]
    fn test_sell_credits_cash_and_realizes_pnl() {
        let executor = TradeExecutor::new(dec!(0.001), Decimal::ZERO);
        let mut portfolio = PortfolioState::new(dec!(0), day(1));
        let mut pos = Position::new("AAA");
        pos.add(dec!(50), dec!(80));
        portfolio.positions.insert("AAA".to_string(), pos);
        let prices = single_price(dec!(100));

        let intent = TradeIntent::sell("AAA", dec!(50), "test");
        let trade = executor.execute(&intent, &mut portfolio, day(1), &prices).unwrap();

        assert_eq!(trade.gross_value, dec!(5000));
        assert_eq!(trade.net_value, dec!(4995));
        assert_eq!(portfolio.cash, dec!(4995));
        // (100 - 80) * 50 - 5 commission
        assert_eq!(trade.realized_pnl, Some(dec!(995)));
        // Fully closed position resets
        let pos = portfolio.position("AAA").unwrap();
        assert_eq!(pos.quantity, Decimal::ZERO);
        assert_eq!(pos.avg_cost, Decimal::ZERO);
    }

    #[test]
    fn test_oversized_sell_rejected() {
        let executor = costless();
        let mut portfolio = PortfolioState::new(dec!(0), day(1));
        let mut pos = Position::new("AAA");
        pos.add(dec!(10), dec!(100));
        portfolio.positions.insert("AAA".to_string(), pos);
        let prices = single_price(dec!(100));

        let intent = TradeIntent::sell("AAA", dec!(11), "test");
        assert!(executor.execute(&intent, &mut portfolio, day(1), &prices).is_none());
        assert_eq!(portfolio.position("AAA").unwrap().quantity, dec!(10));
    }

    #[test]
    fn test_missing_price_drops_intent() {
        let executor = costless();
        let mut portfolio = PortfolioState::new(dec!(10000), day(1));
        let prices = single_price(dec!(100));

        let intent = TradeIntent::buy("AAA", dec!(10), "test");
        assert!(executor.execute(&intent, &mut portfolio, day(2), &prices).is_none());
    }

    #[test]
    fn test_short_and_cover_unsupported() {
        let executor = costless();
        let mut portfolio = PortfolioState::new(dec!(10000), day(1));
        let prices = single_price(dec!(100));

        for kind in [TradeKind::Short, TradeKind::Cover] {
            let intent = TradeIntent {
                asset: "AAA".to_string(),
                kind,
                quantity: dec!(10),
                strength: None,
                reason: "test".to_string(),
            };
            assert!(executor.execute(&intent, &mut portfolio, day(1), &prices).is_none());
        }
    }

    #[test]
    fn test_partial_sell_keeps_average_cost() {
        let executor = costless();
        let mut portfolio = PortfolioState::new(dec!(0), day(1));
        let mut pos = Position::new("AAA");
        pos.add(dec!(10), dec!(80));
        portfolio.positions.insert("AAA".to_string(), pos);
        let prices = single_price(dec!(100));

        let intent = TradeIntent::sell("AAA", dec!(4), "test");
        let trade = executor.execute(&intent, &mut portfolio, day(1), &prices).unwrap();

        assert_eq!(trade.realized_pnl, Some(dec!(80)));
        let pos = portfolio.position("AAA").unwrap();
        assert_eq!(pos.quantity, dec!(6));
        assert_eq!(pos.avg_cost, dec!(80));
    }
}
