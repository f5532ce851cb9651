#![allow(dead_code)]

use barreplay::adapters::memory_adapter::MemoryFeed;
use barreplay::domain::backtest::{Backtest, BacktestConfig, BacktestResult};
pub use barreplay::domain::ohlcv::Bar;
use barreplay::domain::order::OrderRequest;
use barreplay::domain::price_series::LoadOptions;
use barreplay::domain::strategy::{Strategy, StrategyContext};
use barreplay::ports::data_port::DataFeed;
use chrono::{NaiveDate, NaiveDateTime};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Daily bar starting 2024-01-01 + `day`, with open == close.
pub fn flat_bar(day: usize, close: f64) -> Bar {
    Bar {
        timestamp: date(2024, 1, 1) + chrono::Duration::days(day as i64),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000.0,
    }
}

pub fn make_bar(day: usize, open: f64, close: f64) -> Bar {
    Bar {
        timestamp: date(2024, 1, 1) + chrono::Duration::days(day as i64),
        open,
        high: open.max(close) + 1.0,
        low: open.min(close) - 1.0,
        close,
        volume: 1000.0,
    }
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| flat_bar(i, c))
        .collect()
}

/// Open one point below the close, rising by one per bar.
pub fn generate_bars(count: usize, start_price: f64) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let close = start_price + i as f64;
            make_bar(i, close - 1.0, close)
        })
        .collect()
}

pub fn sample_config(period: usize) -> BacktestConfig {
    BacktestConfig {
        moving_average_period: period,
        ..BacktestConfig::default()
    }
}

/// Issues pre-set requests on chosen bars.
pub struct ScriptedStrategy {
    pub script: Vec<(usize, OrderRequest)>,
}

impl ScriptedStrategy {
    pub fn new(script: Vec<(usize, OrderRequest)>) -> Self {
        Self { script }
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn on_bar(&self, ctx: &StrategyContext<'_>) -> Option<OrderRequest> {
        self.script
            .iter()
            .find(|(index, _)| *index == ctx.index)
            .map(|(_, request)| request.clone())
    }
}

pub fn run_feed(
    config: BacktestConfig,
    feed: &dyn DataFeed,
    strategy: Box<dyn Strategy>,
) -> BacktestResult {
    let mut backtest = Backtest::new(config).unwrap();
    backtest
        .load_data(feed.fetch_bars().unwrap(), &LoadOptions::default())
        .unwrap();
    backtest.attach_strategy(strategy);
    backtest.run().unwrap()
}

pub fn run_bars(
    config: BacktestConfig,
    bars: Vec<Bar>,
    strategy: Box<dyn Strategy>,
) -> BacktestResult {
    run_feed(config, &MemoryFeed::new(bars), strategy)
}
