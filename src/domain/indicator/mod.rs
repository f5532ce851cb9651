//! Technical indicators.
//!
//! Indicator outputs are aligned to the price series they were computed from.
//! Warm-up positions hold `None` rather than a placeholder number, so a reader
//! can never mistake an undefined value for a real zero.
//!
//! - `IndicatorType`: indicator identity and parameters
//! - `IndicatorSeries`: aligned output values
//! - [`sma::MovingAverage`]: incremental simple moving average
//! - [`cross`]: cross-up / cross-down detection

pub mod cross;
pub mod sma;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn new(indicator_type: IndicatorType) -> Self {
        IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, value: Option<f64>) {
        self.values.push(value);
    }

    /// Value at `index`; `None` when undefined or out of range.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied().flatten()
    }

    /// Whether `line` crossed above this series at `index`.
    pub fn cross_up_at(&self, line: &[f64], index: usize) -> bool {
        if index == 0 || index >= line.len() {
            return false;
        }
        cross::cross_up(
            Some(line[index - 1]),
            self.get(index - 1),
            Some(line[index]),
            self.get(index),
        )
    }

    /// Whether `line` crossed below this series at `index`.
    pub fn cross_down_at(&self, line: &[f64], index: usize) -> bool {
        if index == 0 || index >= line.len() {
            return false;
        }
        cross::cross_down(
            Some(line[index - 1]),
            self.get(index - 1),
            Some(line[index]),
            self.get(index),
        )
    }
}
