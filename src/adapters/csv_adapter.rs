//! CSV file data adapter.
//!
//! Reads delimited OHLCV text with configurable column positions. Timestamps
//! are parsed with a chrono format string; a date-only format yields midnight.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::domain::config_validation::DEFAULT_DATE_FORMAT;
use crate::domain::error::{BacktestError, DataError};
use crate::domain::ohlcv::{parse_timestamp, Bar};
use crate::ports::data_port::DataFeed;

/// Zero-based column positions. `volume: None` reads every bar with volume 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap {
    pub timestamp: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub close: usize,
    pub volume: Option<usize>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        ColumnMap {
            timestamp: 0,
            open: 1,
            high: 2,
            low: 3,
            close: 4,
            volume: Some(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsvOptions {
    pub columns: ColumnMap,
    pub delimiter: u8,
    pub has_header: bool,
    pub date_format: String,
    /// Inclusive bounds; rows outside are dropped.
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    /// Skip malformed rows with a warning instead of failing.
    pub skip_malformed: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            columns: ColumnMap::default(),
            delimiter: b',',
            has_header: true,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            from: None,
            to: None,
            skip_malformed: false,
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    Path(PathBuf),
    Text(String),
}

pub struct CsvFeed {
    source: Source,
    options: CsvOptions,
}

impl CsvFeed {
    pub fn from_path(path: impl Into<PathBuf>, options: CsvOptions) -> Self {
        Self {
            source: Source::Path(path.into()),
            options,
        }
    }

    pub fn from_string(content: impl Into<String>, options: CsvOptions) -> Self {
        Self {
            source: Source::Text(content.into()),
            options,
        }
    }

    fn read_bars<R: Read>(&self, reader: R) -> Result<Vec<Bar>, DataError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(self.options.has_header)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut bars = Vec::new();
        let mut skipped = 0usize;

        for result in rdr.records() {
            let parsed = result
                .map_err(|e| {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    (line, format!("CSV parse error: {}", e))
                })
                .and_then(|record| {
                    let line = record.position().map(|p| p.line()).unwrap_or(0);
                    self.parse_record(&record).map_err(|reason| (line, reason))
                });

            let bar = match parsed {
                Ok(bar) => bar,
                Err((line, reason)) if self.options.skip_malformed => {
                    tracing::warn!(line, %reason, "skipping malformed row");
                    skipped += 1;
                    continue;
                }
                Err((line, reason)) => return Err(DataError::Parse { line, reason }),
            };

            if self.options.from.is_some_and(|from| bar.timestamp < from)
                || self.options.to.is_some_and(|to| bar.timestamp > to)
            {
                continue;
            }
            bars.push(bar);
        }

        tracing::debug!(bars = bars.len(), skipped, "csv rows read");
        Ok(bars)
    }

    fn parse_record(&self, record: &csv::StringRecord) -> Result<Bar, String> {
        let columns = &self.options.columns;

        let ts_str = record
            .get(columns.timestamp)
            .ok_or_else(|| "missing timestamp column".to_string())?;
        let timestamp = parse_timestamp(ts_str, &self.options.date_format)
            .map_err(|e| format!("invalid timestamp '{}': {}", ts_str, e))?;

        let open = parse_field(record, columns.open, "open")?;
        let high = parse_field(record, columns.high, "high")?;
        let low = parse_field(record, columns.low, "low")?;
        let close = parse_field(record, columns.close, "close")?;
        let volume = match columns.volume {
            Some(index) => parse_field(record, index, "volume")?,
            None => 0.0,
        };

        Ok(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, String> {
    record
        .get(index)
        .ok_or_else(|| format!("missing {} column", name))?
        .parse()
        .map_err(|e| format!("invalid {} value: {}", name, e))
}

impl DataFeed for CsvFeed {
    fn fetch_bars(&self) -> Result<Vec<Bar>, BacktestError> {
        let bars = match &self.source {
            Source::Path(path) => self.read_bars(File::open(path)?)?,
            Source::Text(content) => self.read_bars(content.as_bytes())?,
        };
        Ok(bars)
    }

    fn describe(&self) -> String {
        match &self.source {
            Source::Path(path) => path.display().to_string(),
            Source::Text(_) => "inline csv".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
date,open,high,low,close,volume
2024-01-02,10.0,11.0,9.5,10.5,1000
2024-01-03,10.5,12.0,10.0,11.5,1500
2024-01-04,11.5,11.8,10.8,11.0,900
";

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn reads_default_layout() {
        let feed = CsvFeed::from_string(SAMPLE, CsvOptions::default());
        let bars = feed.fetch_bars().unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].timestamp, day(2));
        assert_eq!(bars[0].open, 10.0);
        assert_eq!(bars[1].high, 12.0);
        assert_eq!(bars[2].close, 11.0);
        assert_eq!(bars[2].volume, 900.0);
    }

    #[test]
    fn custom_columns_delimiter_and_no_header() {
        let content = "\
11.0;2024-01-02 09:30:00;10.0;9.5;10.5
12.0;2024-01-02 09:31:00;10.5;10.0;11.5
";
        let options = CsvOptions {
            columns: ColumnMap {
                timestamp: 1,
                open: 2,
                high: 0,
                low: 3,
                close: 4,
                volume: None,
            },
            delimiter: b';',
            has_header: false,
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
            ..CsvOptions::default()
        };
        let bars = CsvFeed::from_string(content, options).fetch_bars().unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].timestamp, day(2) + chrono::Duration::minutes(571));
        assert_eq!(bars[1].high, 12.0);
        assert_eq!(bars[1].volume, 0.0);
    }

    #[test]
    fn date_range_is_inclusive() {
        let options = CsvOptions {
            from: Some(day(3)),
            to: Some(day(4)),
            ..CsvOptions::default()
        };
        let bars = CsvFeed::from_string(SAMPLE, options).fetch_bars().unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, day(3));
    }

    #[test]
    fn malformed_row_reports_line() {
        let content = "\
date,open,high,low,close,volume
2024-01-02,10.0,11.0,9.5,10.5,1000
2024-01-03,abc,12.0,10.0,11.5,1500
";
        let err = CsvFeed::from_string(content, CsvOptions::default())
            .fetch_bars()
            .unwrap_err();
        match err {
            BacktestError::Data(DataError::Parse { line, reason }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("invalid open value"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_rows_skipped_when_tolerated() {
        let content = "\
date,open,high,low,close,volume
2024-01-02,10.0,11.0,9.5,10.5,1000
not-a-date,10.5,12.0,10.0,11.5,1500
2024-01-04,11.5,11.8,10.8,11.0
2024-01-05,11.0,11.2,10.9,11.1,700
";
        let options = CsvOptions {
            skip_malformed: true,
            ..CsvOptions::default()
        };
        let bars = CsvFeed::from_string(content, options).fetch_bars().unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].timestamp, day(5));
    }

    #[test]
    fn reads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();
        let feed = CsvFeed::from_path(file.path(), CsvOptions::default());
        assert_eq!(feed.fetch_bars().unwrap().len(), 3);
        assert_eq!(feed.describe(), file.path().display().to_string());
    }

    #[test]
    fn missing_file_is_io_error() {
        let feed = CsvFeed::from_path("/nonexistent/prices.csv", CsvOptions::default());
        assert!(matches!(feed.fetch_bars(), Err(BacktestError::Io(_))));
    }
}
