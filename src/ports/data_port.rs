//! Data access port trait.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::Bar;

/// A source of bars for a single instrument.
///
/// Implementations return bars in source order; ordering and spacing are
/// checked by `PriceSeries::load`.
pub trait DataFeed {
    fn fetch_bars(&self) -> Result<Vec<Bar>, BacktestError>;

    /// Short human-readable description of where the bars come from.
    fn describe(&self) -> String;
}
