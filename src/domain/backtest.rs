//! Backtest engine and event loop.
//!
//! A [`Backtest`] is built from a [`BacktestConfig`], given a price series and
//! a strategy, and run once. Each bar is processed in a fixed order:
//!
//! 1. feed the close into the moving average
//! 2. resolve the outstanding order against this bar and book any fill
//! 3. ask the strategy for a decision if nothing is outstanding
//! 4. size and submit the request
//! 5. mark the ledger to market at the close
//!
//! An order still outstanding after the last bar is canceled.

use chrono::NaiveDateTime;

use super::error::{BacktestError, ConfigError};
use super::execution::{ExecutionConfig, ExecutionSimulator};
use super::indicator::sma::MovingAverage;
use super::indicator::{IndicatorSeries, IndicatorType};
use super::ohlcv::Bar;
use super::order::{CancelReason, Fill, Order, OrderEvent, OrderKind, OrderRequest};
use super::portfolio::Ledger;
use super::price_series::{LoadOptions, PriceSeries};
use super::strategy::{Strategy, StrategyContext};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    pub execution: ExecutionConfig,
    /// Units per order when the strategy leaves the size open. `None` means 1.
    pub fixed_position_size: Option<i64>,
    pub moving_average_period: usize,
    pub risk_free_rate: f64,
    pub periods_per_year: u32,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_cash: 100_000.0,
            execution: ExecutionConfig::default(),
            fixed_position_size: None,
            moving_average_period: 20,
            risk_free_rate: 0.0,
            periods_per_year: 252,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return Err(ConfigError::invalid(
                "backtest",
                "initial_cash",
                "must be positive",
            ));
        }
        if !self.execution.commission_rate.is_finite() || self.execution.commission_rate < 0.0 {
            return Err(ConfigError::invalid(
                "backtest",
                "commission_rate",
                "must be >= 0",
            ));
        }
        if !self.execution.margin_buffer.is_finite() || self.execution.margin_buffer < 0.0 {
            return Err(ConfigError::invalid(
                "backtest",
                "margin_buffer",
                "must be >= 0",
            ));
        }
        if self.moving_average_period == 0 {
            return Err(ConfigError::invalid(
                "strategy",
                "moving_average_period",
                "must be >= 1",
            ));
        }
        if let Some(size) = self.fixed_position_size {
            if size <= 0 {
                return Err(ConfigError::invalid(
                    "strategy",
                    "fixed_position_size",
                    "must be positive",
                ));
            }
        }
        if self.periods_per_year == 0 {
            return Err(ConfigError::invalid(
                "backtest",
                "periods_per_year",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub strategy: String,
    pub ledger: Ledger,
    /// Order notifications in the order they happened.
    pub events: Vec<OrderEvent>,
    /// Every order that reached a terminal status.
    pub orders: Vec<Order>,
    pub moving_average: IndicatorSeries,
    pub bars_processed: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BacktestResult {
    pub fn fills(&self) -> impl Iterator<Item = &Fill> {
        self.events.iter().filter_map(|event| match event {
            OrderEvent::Filled { fill } => Some(fill),
            _ => None,
        })
    }

    pub fn final_equity(&self) -> f64 {
        self.ledger.last_equity()
    }
}

pub struct Backtest {
    config: BacktestConfig,
    series: Option<PriceSeries>,
    strategy: Option<Box<dyn Strategy>>,
    finished: bool,
}

impl Backtest {
    pub fn new(config: BacktestConfig) -> Result<Self, BacktestError> {
        config.validate()?;
        Ok(Backtest {
            config,
            series: None,
            strategy: None,
            finished: false,
        })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Validate and load raw bars.
    pub fn load_data<I>(
        &mut self,
        rows: I,
        options: &LoadOptions,
    ) -> Result<&PriceSeries, BacktestError>
    where
        I: IntoIterator<Item = Bar>,
    {
        let series = PriceSeries::load(rows, options)?;
        tracing::debug!(bars = series.len(), "price series loaded");
        Ok(self.series.insert(series))
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.series = Some(series);
        self
    }

    pub fn attach_strategy(&mut self, strategy: Box<dyn Strategy>) {
        self.strategy = Some(strategy);
    }

    fn size(&self, mut request: OrderRequest) -> OrderRequest {
        if request.kind != OrderKind::Close && request.size.is_none() {
            request.size = Some(self.config.fixed_position_size.unwrap_or(1));
        }
        request
    }

    /// Replay the series through the strategy. Can be called once.
    pub fn run(&mut self) -> Result<BacktestResult, BacktestError> {
        if self.finished {
            return Err(BacktestError::NotReady {
                reason: "backtest has already run".into(),
            });
        }
        let Some(series) = self.series.as_ref() else {
            return Err(BacktestError::NotReady {
                reason: "no price data loaded".into(),
            });
        };
        let Some(strategy) = self.strategy.as_ref() else {
            return Err(BacktestError::NotReady {
                reason: "no strategy attached".into(),
            });
        };

        let (start, end) = match (series.first(), series.last()) {
            (Some(first), Some(last)) => (first.timestamp, last.timestamp),
            _ => {
                return Err(BacktestError::NotReady {
                    reason: "price series is empty".into(),
                });
            }
        };

        let period = self.config.moving_average_period;
        let mut average = MovingAverage::new(period)?;
        let mut averages = IndicatorSeries::new(IndicatorType::Sma(period));
        let mut ledger = Ledger::new(self.config.initial_cash);
        let mut simulator = ExecutionSimulator::new(self.config.execution.clone());
        let mut events = Vec::new();
        let bars = series.bars();

        tracing::info!(
            strategy = strategy.name(),
            bars = bars.len(),
            cash = self.config.initial_cash,
            "backtest started"
        );

        for (index, bar) in bars.iter().enumerate() {
            averages.push(average.next(bar.close));

            if let Some(fill) = simulator.resolve(index, bar, &ledger) {
                ledger.apply_fill(&fill);
            }

            if !simulator.has_outstanding() {
                let ctx = StrategyContext {
                    index,
                    history: &bars[..=index],
                    moving_average: &averages,
                    position: &ledger.position,
                };
                if let Some(request) = strategy.on_bar(&ctx) {
                    let request = self.size(request);
                    if let Err(err) = simulator.submit(&request, index, bar, &ledger) {
                        tracing::debug!(bar = index, %err, "request dropped");
                    }
                }
            }

            ledger.mark_to_market(bar.timestamp, bar.close);
            events.extend(simulator.drain_events());
        }

        if let Some(id) = simulator.outstanding().map(|order| order.id) {
            if simulator.cancel(id, CancelReason::EndOfData).is_ok() {
                tracing::debug!(order = %id, "outstanding order canceled at end of data");
            }
            events.extend(simulator.drain_events());
        }

        tracing::info!(
            equity = ledger.last_equity(),
            trades = ledger.closed_trades.len(),
            "backtest finished"
        );

        let result = BacktestResult {
            strategy: strategy.name().to_string(),
            orders: simulator.history().to_vec(),
            ledger,
            events,
            moving_average: averages,
            bars_processed: bars.len(),
            start,
            end,
        };
        self.finished = true;
        Ok(result)
    }
}
