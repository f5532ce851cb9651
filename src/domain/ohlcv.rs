//! OHLCV bar representation.

use chrono::{NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Check the price envelope: high >= low, and open/close inside [low, high].
    pub fn check(&self) -> Result<(), String> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err("non-finite price".to_string());
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(format!("invalid volume {}", self.volume));
        }
        if self.high < self.low {
            return Err(format!("high {} below low {}", self.high, self.low));
        }
        if self.high < self.open.max(self.close) {
            return Err(format!(
                "high {} below open/close {}",
                self.high,
                self.open.max(self.close)
            ));
        }
        if self.low > self.open.min(self.close) {
            return Err(format!(
                "low {} above open/close {}",
                self.low,
                self.open.min(self.close)
            ));
        }
        Ok(())
    }
}

/// Parse a timestamp with a chrono format string. A date-only format yields
/// midnight of that day.
pub fn parse_timestamp(value: &str, format: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let value = value.trim();
    match NaiveDateTime::parse_from_str(value, format) {
        Ok(ts) => Ok(ts),
        Err(err) => match NaiveDate::parse_from_str(value, format) {
            Ok(date) => Ok(date.and_time(chrono::NaiveTime::MIN)),
            Err(_) => Err(err),
        },
    }
}
