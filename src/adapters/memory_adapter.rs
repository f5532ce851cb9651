//! In-memory data adapter.

use chrono::NaiveDateTime;

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataFeed;

/// Serves a fixed set of bars, optionally restricted to an inclusive
/// timestamp range. Bars are returned in the order given.
#[derive(Debug, Clone, Default)]
pub struct MemoryFeed {
    bars: Vec<Bar>,
    from: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
}

impl MemoryFeed {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self {
            bars,
            from: None,
            to: None,
        }
    }

    pub fn with_range(mut self, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn push(&mut self, bar: Bar) {
        self.bars.push(bar);
    }

    fn in_range(&self, timestamp: NaiveDateTime) -> bool {
        self.from.is_none_or(|from| timestamp >= from) && self.to.is_none_or(|to| timestamp <= to)
    }
}

impl DataFeed for MemoryFeed {
    fn fetch_bars(&self) -> Result<Vec<Bar>, BacktestError> {
        Ok(self
            .bars
            .iter()
            .filter(|bar| self.in_range(bar.timestamp))
            .cloned()
            .collect())
    }

    fn describe(&self) -> String {
        format!("{} in-memory bars", self.bars.len())
    }
}
