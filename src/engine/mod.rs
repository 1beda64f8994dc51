//! Simulation loop: the per-date state machine driving one backtest run.
//!
//! One `SimulationLoop` owns its portfolio for the whole run and processes
//! trading dates strictly in order; each date's work is mark-to-market,
//! gated strategy signals, the risk sweep, then a snapshot.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BacktestConfig;
use crate::data::PriceSeries;
use crate::error::EngineError;
use crate::execution::{ExecutedTrade, TradeExecutor};
use crate::performance::{BacktestMetrics, PerformanceCalculator};
use crate::portfolio::{DailySnapshot, PortfolioState, PositionSnapshot};
use crate::report::BacktestReport;
use crate::risk::RiskManager;
use crate::strategy::{build_strategy, Strategy};

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Constructed, not yet invoked
    Pending,
    /// Processing trading dates
    Running,
    /// All dates processed
    Completed,
    /// Unrecoverable condition; partial snapshots/trades retained
    Failed,
}

/// The final artifact of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub status: RunStatus,
    /// Failure message when status is Failed
    pub error: Option<String>,
    pub config: BacktestConfig,
    pub metrics: BacktestMetrics,
    pub snapshots: Vec<DailySnapshot>,
    pub trades: Vec<ExecutedTrade>,
    pub report: BacktestReport,
}

/// Progress sink invoked once per simulated date with a percentage
pub type ProgressFn = Box<dyn FnMut(f64)>;

/// Drives one backtest run from configuration and a price table.
pub struct SimulationLoop {
    config: BacktestConfig,
    prices: PriceSeries,
    strategy: Box<dyn Strategy>,
    executor: TradeExecutor,
    risk: Option<RiskManager>,
    status: RunStatus,
    progress: Option<ProgressFn>,
}

impl SimulationLoop {
    /// Validate the configuration and build the run.
    ///
    /// Every configuration-class error (unknown strategy, empty universe,
    /// uncovered window, bad parameter ranges) surfaces here; a constructed
    /// loop can always start.
    pub fn new(config: BacktestConfig, prices: PriceSeries) -> Result<Self, EngineError> {
        config.validate()?;
        let strategy = build_strategy(&config)?;

        let dates = prices.trading_dates(&config.universe, config.start_date, config.end_date);
        if dates.is_empty() {
            return Err(EngineError::NoPriceData {
                start: config.start_date,
                end: config.end_date,
            });
        }

        let executor = TradeExecutor::new(config.transaction_cost, config.slippage);
        let risk = RiskManager::from_thresholds(config.stop_loss, config.take_profit);

        Ok(Self {
            config,
            prices,
            strategy,
            executor,
            risk,
            status: RunStatus::Pending,
            progress: None,
        })
    }

    /// Current lifecycle state
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Register a progress sink, called once per date with 0..=100
    pub fn on_progress(&mut self, callback: impl FnMut(f64) + 'static) {
        self.progress = Some(Box::new(callback));
    }

    /// Run the simulation to completion.
    ///
    /// Execution rejections and data gaps never fail the run; a non-finite
    /// statistic flips the result to Failed while keeping everything
    /// accumulated so far.
    pub fn run(mut self) -> BacktestResult {
        self.status = RunStatus::Running;
        let dates = self
            .prices
            .trading_dates(&self.config.universe, self.config.start_date, self.config.end_date);

        info!(
            strategy = self.strategy.name(),
            assets = self.config.universe.len(),
            dates = dates.len(),
            capital = %self.config.initial_capital,
            "Backtest started"
        );

        let mut portfolio = PortfolioState::new(self.config.initial_capital, dates[0]);
        let mut snapshots: Vec<DailySnapshot> = Vec::with_capacity(dates.len());
        let mut trades: Vec<ExecutedTrade> = Vec::new();
        let mut last_rebalance: Option<NaiveDate> = None;

        // Benchmark valuation is anchored to its first available price
        let benchmark_base = self.config.benchmark.as_ref().and_then(|asset| {
            let base = self.prices.close_on_or_before(asset, dates[0]);
            if base.is_none() {
                warn!(asset = %asset, "Benchmark has no prices in the window, skipping attribution");
            }
            base.filter(|b| *b > Decimal::ZERO)
        });

        let mut prev_total = self.config.initial_capital;
        let mut prev_benchmark = self.config.initial_capital;
        let total_dates = dates.len();

        for (index, date) in dates.iter().copied().enumerate() {
            portfolio.current_date = date;

            // (a) mark open positions, forward-filling across gaps
            for position in portfolio.positions.values_mut() {
                if let Some(price) = self.prices.close_on_or_before(&position.asset, date) {
                    position.update_price(price);
                }
            }

            // (b) strategy signals, subject to the rebalance gate
            if self
                .config
                .rebalance_frequency
                .should_rebalance(date, last_rebalance)
            {
                last_rebalance = Some(date);
                let intents = self.strategy.generate_signals(date, &portfolio, &self.prices);
                for intent in &intents {
                    if let Some(trade) =
                        self.executor.execute(intent, &mut portfolio, date, &self.prices)
                    {
                        trades.push(trade);
                    }
                }
            }

            // (c) risk sweep, every date regardless of the gate
            if let Some(risk) = &self.risk {
                for intent in risk.check(&portfolio) {
                    if let Some(trade) =
                        self.executor.execute(&intent, &mut portfolio, date, &self.prices)
                    {
                        trades.push(trade);
                    }
                }
            }

            // (d) snapshot
            let snapshot = self.take_snapshot(
                &portfolio,
                date,
                prev_total,
                benchmark_base,
                &mut prev_benchmark,
            );
            prev_total = snapshot.total_value;
            snapshots.push(snapshot);

            // (e) progress
            let pct = (index + 1) as f64 / total_dates as f64 * 100.0;
            debug!(date = %date, progress = pct, "Date processed");
            if let Some(callback) = &mut self.progress {
                callback(pct);
            }
        }

        let metrics = PerformanceCalculator::new(
            &snapshots,
            &trades,
            self.config.initial_capital,
            self.config.risk_free_rate,
        )
        .calculate();

        let (status, error) = if metrics.is_finite() {
            (RunStatus::Completed, None)
        } else {
            (
                RunStatus::Failed,
                Some("Performance statistics produced non-finite values".to_string()),
            )
        };
        self.status = status;

        match status {
            RunStatus::Completed => info!(
                final_value = %metrics.final_value,
                total_return = metrics.total_return,
                trades = trades.len(),
                "Backtest completed"
            ),
            _ => warn!(error = ?error, "Backtest failed"),
        }

        let report = BacktestReport::generate(&self.config, &metrics);

        BacktestResult {
            status,
            error,
            config: self.config,
            metrics,
            snapshots,
            trades,
            report,
        }
    }

    fn take_snapshot(
        &self,
        portfolio: &PortfolioState,
        date: NaiveDate,
        prev_total: Decimal,
        benchmark_base: Option<Decimal>,
        prev_benchmark: &mut Decimal,
    ) -> DailySnapshot {
        let total_value = portfolio.total_value();
        let invested_value = portfolio.invested_value();

        let daily_return = ratio_return(total_value, prev_total);
        let cumulative_return = ratio_return(total_value, self.config.initial_capital);

        let total_f64 = total_value.to_f64().unwrap_or(0.0);
        let mut positions: Vec<PositionSnapshot> = portfolio
            .positions
            .values()
            .filter(|p| p.is_open())
            .map(|p| {
                let value = p.market_value();
                PositionSnapshot {
                    asset: p.asset.clone(),
                    quantity: p.quantity,
                    value,
                    weight: if total_f64 > 0.0 {
                        value.to_f64().unwrap_or(0.0) / total_f64
                    } else {
                        0.0
                    },
                    unrealized_pnl: p.unrealized_pnl(),
                }
            })
            .collect();
        positions.sort_by(|a, b| a.asset.cmp(&b.asset));

        let (benchmark_value, benchmark_return) = match (benchmark_base, &self.config.benchmark) {
            (Some(base), Some(asset)) => {
                let price = self
                    .prices
                    .close_on_or_before(asset, date)
                    .unwrap_or(base);
                let value = self.config.initial_capital * price / base;
                let ret = ratio_return(value, *prev_benchmark);
                *prev_benchmark = value;
                (Some(value), Some(ret))
            }
            _ => (None, None),
        };

        DailySnapshot {
            date,
            total_value,
            cash: portfolio.cash,
            invested_value,
            daily_return,
            cumulative_return,
            positions,
            benchmark_value,
            benchmark_return,
        }
    }
}

/// `current / previous - 1` as f64, 0.0 when the base is not positive
fn ratio_return(current: Decimal, previous: Decimal) -> f64 {
    if previous <= Decimal::ZERO {
        return 0.0;
    }
    ((current - previous) / previous).to_f64().unwrap_or(0.0)
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

    fn flat_series(asset: &str, days: u32, price: Decimal) -> PriceSeries {
        let mut series = PriceSeries::new();
        for d in 1..=days {
            series.insert(asset, day(d), price);
        }
        series
    }

    fn config_for(asset: &str, days: u32) -> BacktestConfig {
        BacktestConfig {
            universe: vec![asset.to_string()],
            start_date: day(1),
            end_date: day(days),
            transaction_cost: Decimal::ZERO,
            slippage: Decimal::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_rejects_unknown_strategy() {
        let mut config = config_for("AAA", 10);
        config.strategy = "mystery".to_string();
        let result = SimulationLoop::new(config, flat_series("AAA", 10, dec!(100)));
        assert!(matches!(result, Err(EngineError::UnknownStrategy(_))));
    }

    #[test]
    fn test_new_rejects_uncovered_window() {
        let config = config_for("AAA", 10);
        let result = SimulationLoop::new(config, flat_series("BBB", 10, dec!(100)));
        assert!(matches!(result, Err(EngineError::NoPriceData { .. })));
    }

    #[test]
    fn test_starts_pending_ends_completed() {
        let sim = SimulationLoop::new(config_for("AAA", 5), flat_series("AAA", 5, dec!(100)))
            .unwrap();
        assert_eq!(sim.status(), RunStatus::Pending);

        let result = sim.run();
        assert_eq!(result.status, RunStatus::Completed);
        assert!(result.error.is_none());
        assert_eq!(result.snapshots.len(), 5);
    }

    #[test]
    fn test_progress_reaches_hundred() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut sim = SimulationLoop::new(config_for("AAA", 4), flat_series("AAA", 4, dec!(100)))
            .unwrap();
        let seen: Rc<RefCell<Vec<f64>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        sim.on_progress(move |pct| sink.borrow_mut().push(pct));

        sim.run();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 4);
        assert!((seen[0] - 25.0).abs() < 1e-9);
        assert!((seen[3] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_conservation() {
        let mut series = PriceSeries::new();
        for d in 1..=10 {
            series.insert("AAA", day(d), Decimal::from(100 + d as i64));
        }
        let result = SimulationLoop::new(config_for("AAA", 10), series).unwrap().run();

        for snapshot in &result.snapshots {
            assert_eq!(snapshot.cash + snapshot.invested_value, snapshot.total_value);
        }
    }

    #[test]
    fn test_forward_fill_keeps_valuation_on_gap_days() {
        let mut series = PriceSeries::new();
        series.insert("AAA", day(1), dec!(100));
        series.insert("AAA", day(2), dec!(110));
        // Day 3 missing entirely for AAA, but BBB trades so the date exists
        series.insert("AAA", day(4), dec!(120));
        series.insert("BBB", day(3), dec!(50));

        let mut config = config_for("AAA", 4);
        config.universe = vec!["AAA".to_string(), "BBB".to_string()];
        let result = SimulationLoop::new(config, series).unwrap().run();

        assert_eq!(result.snapshots.len(), 4);
        // On the gap day the AAA position is valued at the day-2 close
        let gap = &result.snapshots[2];
        assert_eq!(gap.date, day(3));
        assert!(gap.invested_value > Decimal::ZERO);
    }
}
