//! Simple Moving Average.
//!
//! SMA(n)[i] = (C[i] + C[i-1] + ... + C[i-n+1]) / n
//! Warmup: first (n-1) bars are undefined.
//!
//! Maintained as a rolling sum over a ring buffer, so each new bar costs O(1).

use std::collections::VecDeque;

use super::{IndicatorSeries, IndicatorType};
use crate::domain::error::ConfigError;
use crate::domain::price_series::PriceSeries;

#[derive(Debug, Clone)]
pub struct MovingAverage {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl MovingAverage {
    pub fn new(period: usize) -> Result<Self, ConfigError> {
        if period == 0 {
            return Err(ConfigError::invalid(
                "strategy",
                "moving_average_period",
                "period must be at least 1",
            ));
        }
        Ok(MovingAverage {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
        })
    }

    pub fn next(&mut self, close: f64) -> Option<f64> {
        if self.window.len() == self.period {
            if let Some(oldest) = self.window.pop_front() {
                self.sum -= oldest;
            }
        }
        self.window.push_back(close);
        self.sum += close;

        if self.window.len() < self.period {
            None
        } else {
            Some(self.sum / self.period as f64)
        }
    }
}

/// Full SMA series aligned to `series`.
pub fn moving_average(series: &PriceSeries, period: usize) -> Result<IndicatorSeries, ConfigError> {
    let mut ma = MovingAverage::new(period)?;
    let mut out = IndicatorSeries::new(IndicatorType::Sma(period));
    for bar in series.bars() {
        out.push(ma.next(bar.close));
    }
    Ok(out)
}
