//! Immutable, time-ordered bar history for one instrument.

use chrono::{Duration, NaiveDateTime};

use super::error::DataError;
use super::ohlcv::Bar;

/// Validation options applied while building a [`PriceSeries`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOptions {
    /// Expected bar spacing. Consecutive bars must be a whole multiple apart.
    pub resolution: Option<Duration>,
    /// Largest allowed spacing, in multiples of `resolution`.
    pub max_gap_bars: Option<u32>,
    /// Skip offending rows with a warning instead of failing.
    pub tolerate_gaps: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn load<I>(rows: I, options: &LoadOptions) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = Bar>,
    {
        let rows: Vec<Bar> = rows.into_iter().collect();
        let stamps: Vec<NaiveDateTime> = rows.iter().map(|b| b.timestamp).collect();
        let mut bars: Vec<Bar> = Vec::with_capacity(rows.len());

        for (index, bar) in rows.into_iter().enumerate() {
            let mut result = check_row(index, &bar, bars.last(), options);
            if result.is_ok() && options.tolerate_gaps {
                result = check_outlier(index, &bar, bars.last(), &stamps[index + 1..]);
            }

            match result {
                Ok(()) => bars.push(bar),
                Err(err @ DataError::Gap { seconds, resolution, .. })
                    if options.tolerate_gaps && resolution > 0 && seconds % resolution == 0 =>
                {
                    tracing::warn!(bar = index, %err, "keeping bar after wide gap");
                    bars.push(bar);
                }
                Err(err) if options.tolerate_gaps => {
                    tracing::warn!(bar = index, %err, "skipping bar");
                }
                Err(err) => return Err(err),
            }
        }

        if bars.is_empty() {
            return Err(DataError::Empty);
        }

        tracing::debug!(
            bars = bars.len(),
            first = %bars[0].timestamp,
            last = %bars[bars.len() - 1].timestamp,
            "price series loaded"
        );
        Ok(PriceSeries { bars })
    }

    pub fn at(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

fn check_row(
    index: usize,
    bar: &Bar,
    previous: Option<&Bar>,
    options: &LoadOptions,
) -> Result<(), DataError> {
    bar.check().map_err(|reason| DataError::InvalidBar {
        index,
        timestamp: bar.timestamp,
        reason,
    })?;

    let Some(prev) = previous else {
        return Ok(());
    };

    if bar.timestamp <= prev.timestamp {
        return Err(DataError::NonMonotonic {
            index,
            timestamp: bar.timestamp,
            previous: prev.timestamp,
        });
    }

    if let Some(resolution) = options.resolution {
        let step = resolution.num_seconds();
        let spacing = (bar.timestamp - prev.timestamp).num_seconds();
        let misaligned = step > 0 && spacing % step != 0;
        let too_wide = match options.max_gap_bars {
            Some(max) if step > 0 => spacing / step > i64::from(max),
            _ => false,
        };
        if misaligned || too_wide {
            return Err(DataError::Gap {
                index,
                timestamp: bar.timestamp,
                seconds: spacing,
                resolution: step,
            });
        }
    }

    Ok(())
}

/// A bar that the next two rows both precede, while still following the last
/// kept bar, is out of place itself. Rejecting it keeps the rows after it.
fn check_outlier(
    index: usize,
    bar: &Bar,
    previous: Option<&Bar>,
    following: &[NaiveDateTime],
) -> Result<(), DataError> {
    let Some(&next) = following.first() else {
        return Ok(());
    };
    let after_previous = previous.is_none_or(|prev| next > prev.timestamp);
    let confirmed = following.get(1).is_none_or(|&after| after < bar.timestamp);
    if after_previous && next < bar.timestamp && confirmed {
        return Err(DataError::NonMonotonic {
            index: index + 1,
            timestamp: next,
            previous: bar.timestamp,
        });
    }
    Ok(())
}
