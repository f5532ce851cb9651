//! Strategy interface and the built-in moving-average strategies.

use std::fmt;
use std::str::FromStr;

use crate::domain::indicator::{cross, IndicatorSeries};
use crate::domain::ohlcv::Bar;
use crate::domain::order::OrderRequest;
use crate::domain::position::Position;

/// Read-only view handed to a strategy on each bar.
///
/// `history` and `moving_average` both end at the current bar; nothing after
/// it is visible.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub index: usize,
    pub history: &'a [Bar],
    pub moving_average: &'a IndicatorSeries,
    pub position: &'a Position,
}

impl StrategyContext<'_> {
    pub fn bar(&self) -> &Bar {
        &self.history[self.index]
    }

    pub fn close(&self) -> f64 {
        self.bar().close
    }

    pub fn average(&self) -> Option<f64> {
        self.moving_average.get(self.index)
    }

    fn previous_close(&self) -> Option<f64> {
        self.index
            .checked_sub(1)
            .map(|prev| self.history[prev].close)
    }

    /// Close crossed above the moving average on this bar.
    pub fn cross_up(&self) -> bool {
        let Some(prev) = self.index.checked_sub(1) else {
            return false;
        };
        cross::cross_up(
            self.previous_close(),
            self.moving_average.get(prev),
            Some(self.close()),
            self.average(),
        )
    }

    /// Close crossed below the moving average on this bar.
    pub fn cross_down(&self) -> bool {
        let Some(prev) = self.index.checked_sub(1) else {
            return false;
        };
        cross::cross_down(
            self.previous_close(),
            self.moving_average.get(prev),
            Some(self.close()),
            self.average(),
        )
    }
}

pub trait Strategy {
    fn name(&self) -> &str;

    /// Decide on the current bar. Called at most once per bar, and only when
    /// no order is outstanding.
    fn on_bar(&self, ctx: &StrategyContext<'_>) -> Option<OrderRequest>;
}

/// Buy when the close crosses above its moving average; close the position
/// when it crosses below.
#[derive(Debug, Clone, Default)]
pub struct CrossoverStrategy;

impl Strategy for CrossoverStrategy {
    fn name(&self) -> &str {
        "crossover"
    }

    fn on_bar(&self, ctx: &StrategyContext<'_>) -> Option<OrderRequest> {
        if ctx.cross_up() {
            tracing::debug!(price = ctx.close(), "BUY CREATE");
            Some(OrderRequest::buy())
        } else if ctx.cross_down() && !ctx.position.is_flat() {
            tracing::debug!(price = ctx.close(), "SELL CREATE");
            Some(OrderRequest::close())
        } else {
            None
        }
    }
}

/// While flat, buy when the close is above its moving average; while in a
/// position, close it when the close drops below.
#[derive(Debug, Clone, Default)]
pub struct TrendStrategy;

impl Strategy for TrendStrategy {
    fn name(&self) -> &str {
        "trend"
    }

    fn on_bar(&self, ctx: &StrategyContext<'_>) -> Option<OrderRequest> {
        let average = ctx.average()?;
        if ctx.position.is_flat() {
            if ctx.close() > average {
                tracing::debug!(price = ctx.close(), "BUY CREATE");
                return Some(OrderRequest::buy());
            }
        } else if ctx.close() < average {
            tracing::debug!(price = ctx.close(), "SELL CREATE");
            return Some(OrderRequest::close());
        }
        None
    }
}

/// Built-in strategy selector, as named in config files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StrategyKind {
    #[default]
    Crossover,
    Trend,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn Strategy> {
        match self {
            StrategyKind::Crossover => Box::new(CrossoverStrategy),
            StrategyKind::Trend => Box::new(TrendStrategy),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crossover" | "cross" => Ok(StrategyKind::Crossover),
            "trend" => Ok(StrategyKind::Trend),
            other => Err(format!("unknown strategy kind '{}'", other)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Crossover => write!(f, "crossover"),
            StrategyKind::Trend => write!(f, "trend"),
        }
    }
}
