//! Performance statistics over a completed run.
//!
//! All figures here are read-only summaries, so plain `f64` is fine; money
//! stays `Decimal` where it is carried through (final value, total costs).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};

use crate::execution::ExecutedTrade;
use crate::portfolio::DailySnapshot;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const CALENDAR_DAYS_PER_YEAR: f64 = 365.25;

/// Full statistics battery for one backtest run.
///
/// Ratios that are mathematically undefined (zero volatility, zero
/// drawdown, zero-length period, no closing trades) are reported as `0.0`
/// so every field stays finite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    /// Final value / initial value - 1
    pub total_return: f64,
    /// Geometric annualization over elapsed calendar days
    pub annualized_return: f64,
    /// Daily-return standard deviation × √252
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Largest peak-to-trough decline, as a positive fraction
    pub max_drawdown: f64,
    /// 5th percentile of the daily-return distribution
    pub value_at_risk_95: f64,
    pub calmar_ratio: f64,
    pub total_trades: usize,
    /// Position-reducing trades with realized P&L
    pub closing_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Winning fraction of closing trades
    pub win_rate: f64,
    /// Mean realized P&L of winning closes
    pub avg_win: f64,
    /// Mean realized P&L of losing closes (negative)
    pub avg_loss: f64,
    /// Gross wins / |gross losses|
    pub profit_factor: f64,
    /// Expected P&L per closing trade
    pub expectancy: f64,
    pub final_value: Decimal,
    /// All transaction and slippage costs paid
    pub total_costs: Decimal,
    pub benchmark_return: Option<f64>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub information_ratio: Option<f64>,
}

impl BacktestMetrics {
    /// Metrics for a run that produced no snapshots
    pub fn empty(initial_capital: Decimal) -> Self {
        Self {
            total_return: 0.0,
            annualized_return: 0.0,
            annualized_volatility: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            max_drawdown: 0.0,
            value_at_risk_95: 0.0,
            calmar_ratio: 0.0,
            total_trades: 0,
            closing_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            profit_factor: 0.0,
            expectancy: 0.0,
            final_value: initial_capital,
            total_costs: Decimal::ZERO,
            benchmark_return: None,
            alpha: None,
            beta: None,
            information_ratio: None,
        }
    }

    /// Whether every statistic is a finite number
    pub fn is_finite(&self) -> bool {
        let required = [
            self.total_return,
            self.annualized_return,
            self.annualized_volatility,
            self.sharpe_ratio,
            self.sortino_ratio,
            self.max_drawdown,
            self.value_at_risk_95,
            self.calmar_ratio,
            self.win_rate,
            self.avg_win,
            self.avg_loss,
            self.profit_factor,
            self.expectancy,
        ];
        let optional = [
            self.benchmark_return,
            self.alpha,
            self.beta,
            self.information_ratio,
        ];
        required.iter().all(|v| v.is_finite())
            && optional.iter().flatten().all(|v| v.is_finite())
    }
}

/// Derives [`BacktestMetrics`] from the snapshot sequence and trade ledger.
pub struct PerformanceCalculator<'a> {
    snapshots: &'a [DailySnapshot],
    trades: &'a [ExecutedTrade],
    initial_capital: Decimal,
    risk_free_rate: f64,
}

impl<'a> PerformanceCalculator<'a> {
    pub fn new(
        snapshots: &'a [DailySnapshot],
        trades: &'a [ExecutedTrade],
        initial_capital: Decimal,
        risk_free_rate: f64,
    ) -> Self {
        Self {
            snapshots,
            trades,
            initial_capital,
            risk_free_rate,
        }
    }

    pub fn calculate(&self) -> BacktestMetrics {
        let Some(last) = self.snapshots.last() else {
            return BacktestMetrics::empty(self.initial_capital);
        };
        let first = &self.snapshots[0];

        let initial = self.initial_capital.to_f64().unwrap_or(0.0);
        let final_f64 = last.total_value.to_f64().unwrap_or(0.0);
        let total_return = if initial > 0.0 {
            final_f64 / initial - 1.0
        } else {
            0.0
        };

        let elapsed_days = (last.date - first.date).num_days() as f64;
        let years = elapsed_days / CALENDAR_DAYS_PER_YEAR;
        let annualized_return = annualize(total_return, years);

        let daily_returns: Vec<f64> = self.snapshots.iter().map(|s| s.daily_return).collect();
        let daily_std = if daily_returns.len() >= 2 {
            daily_returns.iter().std_dev()
        } else {
            0.0
        };
        let annualized_volatility = daily_std * TRADING_DAYS_PER_YEAR.sqrt();

        let rf_daily = self.risk_free_rate / TRADING_DAYS_PER_YEAR;
        let mean_excess = daily_returns.iter().mean() - rf_daily;
        let sharpe_ratio = if daily_std > 0.0 {
            mean_excess / daily_std * TRADING_DAYS_PER_YEAR.sqrt()
        } else {
            0.0
        };

        let downside: Vec<f64> = daily_returns.iter().copied().filter(|r| *r < 0.0).collect();
        let downside_std = if downside.len() >= 2 {
            downside.iter().std_dev()
        } else {
            0.0
        };
        let sortino_ratio = if downside_std > 0.0 {
            mean_excess / downside_std * TRADING_DAYS_PER_YEAR.sqrt()
        } else {
            0.0
        };

        let max_drawdown = max_drawdown(self.snapshots);
        let calmar_ratio = if max_drawdown > 0.0 {
            annualized_return / max_drawdown
        } else {
            0.0
        };

        let value_at_risk_95 = if daily_returns.is_empty() {
            0.0
        } else {
            Data::new(daily_returns.clone()).percentile(5)
        };

        let trade_stats = TradeStats::from_ledger(self.trades);

        let (benchmark_return, alpha, beta, information_ratio) =
            self.benchmark_stats(&daily_returns, annualized_return, years);

        BacktestMetrics {
            total_return,
            annualized_return,
            annualized_volatility,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            value_at_risk_95,
            calmar_ratio,
            total_trades: self.trades.len(),
            closing_trades: trade_stats.closing,
            winning_trades: trade_stats.winning,
            losing_trades: trade_stats.losing,
            win_rate: trade_stats.win_rate,
            avg_win: trade_stats.avg_win,
            avg_loss: trade_stats.avg_loss,
            profit_factor: trade_stats.profit_factor,
            expectancy: trade_stats.expectancy,
            final_value: last.total_value,
            total_costs: self.trades.iter().map(ExecutedTrade::total_costs).sum(),
            benchmark_return,
            alpha,
            beta,
            information_ratio,
        }
    }

    /// Beta, alpha and information ratio against the benchmark series, when
    /// the snapshots carry one.
    fn benchmark_stats(
        &self,
        daily_returns: &[f64],
        annualized_return: f64,
        years: f64,
    ) -> (Option<f64>, Option<f64>, Option<f64>, Option<f64>) {
        let bench_values: Vec<f64> = self
            .snapshots
            .iter()
            .filter_map(|s| s.benchmark_value.and_then(|v| v.to_f64()))
            .collect();
        if bench_values.len() != self.snapshots.len() || bench_values.is_empty() {
            return (None, None, None, None);
        }

        let initial = self.initial_capital.to_f64().unwrap_or(0.0);
        let bench_total = if initial > 0.0 {
            bench_values[bench_values.len() - 1] / initial - 1.0
        } else {
            0.0
        };
        let bench_annualized = annualize(bench_total, years);

        let bench_returns: Vec<f64> = self
            .snapshots
            .iter()
            .map(|s| s.benchmark_return.unwrap_or(0.0))
            .collect();

        let beta = if bench_returns.len() >= 2 {
            let bench_var = bench_returns.iter().variance();
            if bench_var > 0.0 {
                Some(covariance(daily_returns, &bench_returns) / bench_var)
            } else {
                None
            }
        } else {
            None
        };

        let alpha = beta
            .map(|b| annualized_return - (self.risk_free_rate + b * bench_annualized));

        let excess: Vec<f64> = daily_returns
            .iter()
            .zip(&bench_returns)
            .map(|(s, b)| s - b)
            .collect();
        let information_ratio = if excess.len() >= 2 {
            let excess_std = excess.iter().std_dev() * TRADING_DAYS_PER_YEAR.sqrt();
            if excess_std > 0.0 {
                Some((annualized_return - bench_annualized) / excess_std)
            } else {
                None
            }
        } else {
            None
        };

        (Some(bench_total), alpha, beta, information_ratio)
    }
}

/// Geometric annualization; zero-length periods report 0.0
fn annualize(total_return: f64, years: f64) -> f64 {
    if years <= 0.0 {
        return 0.0;
    }
    (1.0 + total_return).powf(1.0 / years) - 1.0
}

/// Largest peak-to-trough decline of the value curve, positive fraction
fn max_drawdown(snapshots: &[DailySnapshot]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst: f64 = 0.0;
    for snapshot in snapshots {
        let value = snapshot.total_value.to_f64().unwrap_or(0.0);
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst
}

/// Sample covariance of two equally long return series
fn covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let mean_a = a[..n].iter().mean();
    let mean_b = b[..n].iter().mean();
    let sum: f64 = a[..n]
        .iter()
        .zip(&b[..n])
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum();
    sum / (n as f64 - 1.0)
}

/// Win/loss statistics over closing trades
struct TradeStats {
    closing: usize,
    winning: usize,
    losing: usize,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    profit_factor: f64,
    expectancy: f64,
}

impl TradeStats {
    fn from_ledger(trades: &[ExecutedTrade]) -> Self {
        let realized: Vec<f64> = trades
            .iter()
            .filter(|t| t.is_closing())
            .filter_map(|t| t.realized_pnl.and_then(|p| p.to_f64()))
            .collect();
        let closing = realized.len();
        if closing == 0 {
            return Self {
                closing: 0,
                winning: 0,
                losing: 0,
                win_rate: 0.0,
                avg_win: 0.0,
                avg_loss: 0.0,
                profit_factor: 0.0,
                expectancy: 0.0,
            };
        }

        let wins: Vec<f64> = realized.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = realized.iter().copied().filter(|p| *p <= 0.0).collect();

        let winning = wins.len();
        let losing = losses.len();
        let win_rate = winning as f64 / closing as f64;

        let gross_wins: f64 = wins.iter().sum();
        let gross_losses: f64 = losses.iter().sum();

        let avg_win = if winning > 0 {
            gross_wins / winning as f64
        } else {
            0.0
        };
        let avg_loss = if losing > 0 {
            gross_losses / losing as f64
        } else {
            0.0
        };
        let profit_factor = if gross_losses < 0.0 {
            gross_wins / gross_losses.abs()
        } else {
            0.0
        };
        let expectancy = win_rate * avg_win + (1.0 - win_rate) * avg_loss;

        Self {
            closing,
            winning,
            losing,
            win_rate,
            avg_win,
            avg_loss,
            profit_factor,
            expectancy,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::TradeKind;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn snapshot(d: u32, value: Decimal, daily_return: f64) -> DailySnapshot {
        DailySnapshot {
            date: day(d),
            total_value: value,
            cash: value,
            invested_value: Decimal::ZERO,
            daily_return,
            cumulative_return: 0.0,
            positions: Vec::new(),
            benchmark_value: None,
            benchmark_return: None,
        }
    }

    fn closing_trade(pnl: Decimal) -> ExecutedTrade {
        ExecutedTrade {
            asset: "AAA".to_string(),
            kind: TradeKind::Sell,
            date: day(1),
            quantity: dec!(10),
            price: dec!(100),
            transaction_cost: dec!(1),
            slippage_cost: Decimal::ZERO,
            gross_value: dec!(1000),
            net_value: dec!(999),
            portfolio_value_before: dec!(10000),
            portfolio_value_after: dec!(9999),
            position_size_pct: 0.0,
            realized_pnl: Some(pnl),
            reason: "test".to_string(),
        }
    }

    #[test]
    fn test_empty_metrics() {
        let calc = PerformanceCalculator::new(&[], &[], dec!(100000), 0.0);
        let metrics = calc.calculate();
        assert_eq!(metrics.total_trades, 0);
        assert!(metrics.total_return.abs() < 1e-12);
        assert_eq!(metrics.final_value, dec!(100000));
        assert!(metrics.is_finite());
    }

    #[test]
    fn test_flat_curve_has_zero_return_and_drawdown() {
        let snapshots: Vec<DailySnapshot> = (1..=10)
            .map(|d| snapshot(d, dec!(100000), 0.0))
            .collect();
        let calc = PerformanceCalculator::new(&snapshots, &[], dec!(100000), 0.0);
        let metrics = calc.calculate();

        assert!(metrics.total_return.abs() < 1e-12);
        assert!(metrics.max_drawdown.abs() < 1e-12);
        assert!(metrics.annualized_volatility.abs() < 1e-12);
        assert!(metrics.sharpe_ratio.abs() < 1e-12);
        assert!(metrics.calmar_ratio.abs() < 1e-12);
        assert!(metrics.is_finite());
    }

    #[test]
    fn test_max_drawdown_peak_to_trough() {
        let snapshots = vec![
            snapshot(1, dec!(100000), 0.0),
            snapshot(2, dec!(120000), 0.2),
            snapshot(3, dec!(90000), -0.25),
            snapshot(4, dec!(110000), 0.2222),
        ];
        let calc = PerformanceCalculator::new(&snapshots, &[], dec!(100000), 0.0);
        let metrics = calc.calculate();

        // Peak 120k → trough 90k
        assert!((metrics.max_drawdown - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_win_rate_and_averages() {
        let trades = vec![
            closing_trade(dec!(100)),
            closing_trade(dec!(300)),
            closing_trade(dec!(-200)),
        ];
        let snapshots = vec![snapshot(1, dec!(100000), 0.0), snapshot(2, dec!(100200), 0.002)];
        let calc = PerformanceCalculator::new(&snapshots, &trades, dec!(100000), 0.0);
        let metrics = calc.calculate();

        assert_eq!(metrics.closing_trades, 3);
        assert_eq!(metrics.winning_trades, 2);
        assert_eq!(metrics.losing_trades, 1);
        assert!((metrics.win_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((metrics.avg_win - 200.0).abs() < 1e-9);
        assert!((metrics.avg_loss + 200.0).abs() < 1e-9);
        assert!((metrics.profit_factor - 2.0).abs() < 1e-9);
        assert_eq!(metrics.total_costs, dec!(3));
    }

    #[test]
    fn test_annualization_zero_period() {
        let snapshots = vec![snapshot(1, dec!(100000), 0.0)];
        let calc = PerformanceCalculator::new(&snapshots, &[], dec!(100000), 0.0);
        let metrics = calc.calculate();
        assert!(metrics.annualized_return.abs() < 1e-12);
        assert!(metrics.is_finite());
    }

    #[test]
    fn test_benchmark_beta_of_identical_series() {
        let mut snapshots = vec![
            snapshot(1, dec!(100000), 0.0),
            snapshot(2, dec!(101000), 0.01),
            snapshot(3, dec!(99990), -0.01),
            snapshot(4, dec!(101990), 0.02),
        ];
        // Benchmark moves exactly with the portfolio
        for s in &mut snapshots {
            s.benchmark_value = Some(s.total_value);
            s.benchmark_return = Some(s.daily_return);
        }
        let calc = PerformanceCalculator::new(&snapshots, &[], dec!(100000), 0.0);
        let metrics = calc.calculate();

        assert!((metrics.beta.unwrap() - 1.0).abs() < 1e-9);
        assert!(metrics.alpha.unwrap().abs() < 1e-9);
        assert!(metrics.benchmark_return.is_some());
        // Zero excess volatility leaves the ratio undefined
        assert!(metrics.information_ratio.is_none());
    }

    #[test]
    fn test_var_is_low_percentile() {
        let snapshots: Vec<DailySnapshot> = (1..=21)
            .map(|d| {
                let r = if d % 5 == 0 { -0.05 } else { 0.01 };
                snapshot(d, dec!(100000), r)
            })
            .collect();
        let calc = PerformanceCalculator::new(&snapshots, &[], dec!(100000), 0.0);
        let metrics = calc.calculate();
        assert!(metrics.value_at_risk_95 < 0.0);
    }
}
