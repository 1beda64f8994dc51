//! Human-readable backtest report.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::BacktestConfig;
use crate::performance::BacktestMetrics;

/// Sectioned report derived from the metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Report title
    pub title: String,
    /// Test period
    pub period: String,
    /// Summary statistics
    pub summary: ReportSummary,
    /// Risk figures
    pub risk: RiskReport,
    /// Trade statistics
    pub trade_stats: TradeStatsReport,
    /// Text report (formatted)
    pub text_report: String,
}

/// Report summary section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub initial_capital: Decimal,
    pub final_value: Decimal,
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub total_trades: usize,
    pub win_rate_pct: f64,
}

/// Risk section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub annualized_volatility_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown_pct: f64,
    pub value_at_risk_95_pct: f64,
    pub calmar_ratio: f64,
}

/// Trade statistics section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeStatsReport {
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub total_costs: Decimal,
}

impl BacktestReport {
    /// Generate a report from a finished run's metrics
    pub fn generate(config: &BacktestConfig, metrics: &BacktestMetrics) -> Self {
        let summary = ReportSummary {
            initial_capital: config.initial_capital,
            final_value: metrics.final_value,
            total_return_pct: metrics.total_return * 100.0,
            annualized_return_pct: metrics.annualized_return * 100.0,
            total_trades: metrics.total_trades,
            win_rate_pct: metrics.win_rate * 100.0,
        };

        let risk = RiskReport {
            annualized_volatility_pct: metrics.annualized_volatility * 100.0,
            sharpe_ratio: metrics.sharpe_ratio,
            sortino_ratio: metrics.sortino_ratio,
            max_drawdown_pct: metrics.max_drawdown * 100.0,
            value_at_risk_95_pct: metrics.value_at_risk_95 * 100.0,
            calmar_ratio: metrics.calmar_ratio,
        };

        let trade_stats = TradeStatsReport {
            winning_trades: metrics.winning_trades,
            losing_trades: metrics.losing_trades,
            avg_win: metrics.avg_win,
            avg_loss: metrics.avg_loss,
            profit_factor: metrics.profit_factor,
            expectancy: metrics.expectancy,
            total_costs: metrics.total_costs,
        };

        let text_report =
            Self::format_text_report(config, metrics, &summary, &risk, &trade_stats);

        Self {
            title: format!("Backtest report: {}", config.strategy),
            period: format!("{} to {}", config.start_date, config.end_date),
            summary,
            risk,
            trade_stats,
            text_report,
        }
    }

    fn format_text_report(
        config: &BacktestConfig,
        metrics: &BacktestMetrics,
        summary: &ReportSummary,
        risk: &RiskReport,
        trade_stats: &TradeStatsReport,
    ) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "=== Backtest report: {} ===\n\
             Period: {} to {}\n\
             Universe: {}\n\n",
            config.strategy,
            config.start_date,
            config.end_date,
            config.universe.join(", ")
        ));

        out.push_str(&format!(
            "-- Summary --\n\
             Initial capital:   {}\n\
             Final value:       {}\n\
             Total return:      {:.2}%\n\
             Annualized return: {:.2}%\n\
             Trades:            {} ({:.1}% win rate)\n\n",
            summary.initial_capital.round_dp(2),
            summary.final_value.round_dp(2),
            summary.total_return_pct,
            summary.annualized_return_pct,
            summary.total_trades,
            summary.win_rate_pct,
        ));

        out.push_str(&format!(
            "-- Risk --\n\
             Volatility (ann.): {:.2}%\n\
             Sharpe:            {:.2}\n\
             Sortino:           {:.2}\n\
             Max drawdown:      {:.2}%\n\
             VaR(95):           {:.2}%\n\
             Calmar:            {:.2}\n\n",
            risk.annualized_volatility_pct,
            risk.sharpe_ratio,
            risk.sortino_ratio,
            risk.max_drawdown_pct,
            risk.value_at_risk_95_pct,
            risk.calmar_ratio,
        ));

        out.push_str(&format!(
            "-- Trades --\n\
             Winners / losers:  {} / {}\n\
             Avg win / loss:    {:.2} / {:.2}\n\
             Profit factor:     {:.2}\n\
             Expectancy:        {:.2}\n\
             Total costs:       {}\n",
            trade_stats.winning_trades,
            trade_stats.losing_trades,
            trade_stats.avg_win,
            trade_stats.avg_loss,
            trade_stats.profit_factor,
            trade_stats.expectancy,
            trade_stats.total_costs.round_dp(2),
        ));

        if let (Some(bench_ret), Some(asset)) = (metrics.benchmark_return, &config.benchmark) {
            out.push_str(&format!(
                "\n-- Benchmark ({}) --\n\
                 Benchmark return:  {:.2}%\n\
                 Alpha:             {:.4}\n\
                 Beta:              {:.2}\n\
                 Information ratio: {:.2}\n",
                asset,
                bench_ret * 100.0,
                metrics.alpha.unwrap_or(0.0),
                metrics.beta.unwrap_or(0.0),
                metrics.information_ratio.unwrap_or(0.0),
            ));
        }

        out
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> (BacktestConfig, BacktestMetrics) {
        let config = BacktestConfig {
            universe: vec!["AAA".to_string()],
            ..Default::default()
        };
        let mut metrics = BacktestMetrics::empty(dec!(100000));
        metrics.total_return = 0.15;
        metrics.win_rate = 0.6;
        metrics.final_value = dec!(115000);
        (config, metrics)
    }

    #[test]
    fn test_report_sections() {
        let (config, metrics) = sample();
        let report = BacktestReport::generate(&config, &metrics);

        assert!((report.summary.total_return_pct - 15.0).abs() < 1e-9);
        assert!((report.summary.win_rate_pct - 60.0).abs() < 1e-9);
        assert_eq!(report.summary.final_value, dec!(115000));
        assert!(report.period.contains("2024-01-01"));
    }

    #[test]
    fn test_text_report_contents() {
        let (config, metrics) = sample();
        let report = BacktestReport::generate(&config, &metrics);

        assert!(report.text_report.contains("Total return:      15.00%"));
        assert!(report.text_report.contains("buy_and_hold"));
        // No benchmark configured, so no benchmark section
        assert!(!report.text_report.contains("Benchmark"));
    }

    #[test]
    fn test_benchmark_section_present_when_configured() {
        let (mut config, mut metrics) = sample();
        config.benchmark = Some("SPY".to_string());
        metrics.benchmark_return = Some(0.10);
        metrics.beta = Some(1.1);

        let report = BacktestReport::generate(&config, &metrics);
        assert!(report.text_report.contains("Benchmark (SPY)"));
        assert!(report.text_report.contains("10.00%"));
    }
}
