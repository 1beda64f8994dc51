//! Demo runner: backtests a moving-average crossover on synthetic prices.
//!
//! Pass `--json` to dump the full result instead of the text report.

use anyhow::Result;
use backtest_engine::{BacktestConfig, PriceSeries, SimulationLoop};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Backtest engine v{}", env!("CARGO_PKG_VERSION"));

    let config = BacktestConfig {
        strategy: "ma_crossover".to_string(),
        universe: vec!["ALPHA".to_string(), "BETA".to_string()],
        start_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        short_window: 5,
        long_window: 20,
        stop_loss: Some(dec!(0.10)),
        take_profit: Some(dec!(0.25)),
        benchmark: Some("INDEX".to_string()),
        ..Default::default()
    };

    let prices = synthetic_prices(
        &["ALPHA", "BETA", "INDEX"],
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        365,
    );

    let mut sim = SimulationLoop::new(config, prices)?;
    sim.on_progress(|pct| {
        if pct as u32 % 25 == 0 {
            tracing::info!(progress = pct, "Simulation progress");
        }
    });

    let result = sim.run();

    if std::env::args().any(|arg| arg == "--json") {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.report.text_report);
    }

    Ok(())
}

/// Deterministic wavy price paths, one print per weekday
fn synthetic_prices(assets: &[&str], start: NaiveDate, days: u32) -> PriceSeries {
    let mut series = PriceSeries::new();
    for (offset, asset) in assets.iter().enumerate() {
        let base = 80.0 + 20.0 * offset as f64;
        for d in 0..days {
            let date = start + chrono::Days::new(d.into());
            if matches!(
                chrono::Datelike::weekday(&date),
                chrono::Weekday::Sat | chrono::Weekday::Sun
            ) {
                continue;
            }
            let phase = d as f64 / (12.0 + 3.0 * offset as f64);
            let drift = 0.04 * d as f64;
            let price = base + drift + 6.0 * phase.sin();
            let close = Decimal::from_f64_retain(price)
                .unwrap_or(Decimal::ONE)
                .round_dp(2);
            series.insert(asset, date, close);
        }
    }
    series
}
