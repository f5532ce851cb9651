//! Configuration validation.
//!
//! Checks every config field before a backtest is built, so a bad value is
//! reported by section and key instead of being silently replaced by its
//! default.

use crate::domain::error::ConfigError;
use crate::domain::ohlcv::parse_timestamp;
use crate::domain::strategy::StrategyKind;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    validate_initial_cash(config)?;
    validate_commission(config)?;
    validate_margin_buffer(config)?;
    validate_risk_free_rate(config)?;
    validate_periods_per_year(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    validate_strategy_kind(config)?;
    validate_moving_average_period(config)?;
    validate_positive_int(config, "strategy", "fixed_position_size")?;
    validate_positive_int(config, "strategy", "time_in_force_bars")?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    validate_data_path(config)?;
    validate_delimiter(config)?;
    validate_columns(config)?;
    validate_date_range(config)?;
    validate_positive_int(config, "data", "resolution_seconds")?;
    validate_positive_int(config, "data", "max_gap_bars")?;
    Ok(())
}

/// Run every validator.
pub fn validate_all(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_data_config(config)?;
    Ok(())
}

fn number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, ConfigError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ConfigError::invalid(section, key, format!("'{}' is not a number", raw))),
    }
}

fn integer(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<i64>, ConfigError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
            ConfigError::invalid(section, key, format!("'{}' is not an integer", raw))
        }),
    }
}

fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    if let Some(value) = number(config, "backtest", "initial_cash")? {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::invalid(
                "backtest",
                "initial_cash",
                "initial_cash must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    if let Some(value) = number(config, "backtest", "commission_rate")? {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::invalid(
                "backtest",
                "commission_rate",
                "commission_rate must be non-negative",
            ));
        }
    }
    Ok(())
}

fn validate_margin_buffer(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    if let Some(value) = number(config, "backtest", "margin_buffer")? {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::invalid(
                "backtest",
                "margin_buffer",
                "margin_buffer must be non-negative",
            ));
        }
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    if let Some(value) = number(config, "backtest", "risk_free_rate")? {
        if !(0.0..1.0).contains(&value) {
            return Err(ConfigError::invalid(
                "backtest",
                "risk_free_rate",
                "risk_free_rate must be between 0 and 1",
            ));
        }
    }
    Ok(())
}

fn validate_periods_per_year(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    validate_positive_int(config, "backtest", "periods_per_year")?;
    if let Some(value) = integer(config, "backtest", "periods_per_year")? {
        if value > i64::from(u32::MAX) {
            return Err(ConfigError::invalid(
                "backtest",
                "periods_per_year",
                "periods_per_year is too large",
            ));
        }
    }
    Ok(())
}

fn validate_strategy_kind(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    if let Some(kind) = config.get_string("strategy", "kind") {
        kind.parse::<StrategyKind>()
            .map_err(|reason| ConfigError::invalid("strategy", "kind", reason))?;
    }
    Ok(())
}

fn validate_moving_average_period(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    if let Some(value) = integer(config, "strategy", "moving_average_period")? {
        if value < 1 {
            return Err(ConfigError::invalid(
                "strategy",
                "moving_average_period",
                "moving_average_period must be at least 1",
            ));
        }
    }
    Ok(())
}

fn validate_positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), ConfigError> {
    if let Some(value) = integer(config, section, key)? {
        if value <= 0 {
            return Err(ConfigError::invalid(
                section,
                key,
                format!("{} must be positive", key),
            ));
        }
    }
    Ok(())
}

fn validate_data_path(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    match config.get_string("data", "path") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::missing("data", "path")),
    }
}

fn validate_delimiter(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    if let Some(raw) = config.get_string("data", "delimiter") {
        let bytes = raw.as_bytes();
        if raw != "\\t" && (bytes.len() != 1 || !raw.is_ascii()) {
            return Err(ConfigError::invalid(
                "data",
                "delimiter",
                "delimiter must be a single ASCII character",
            ));
        }
    }
    Ok(())
}

fn validate_columns(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    let required = [
        "timestamp_column",
        "open_column",
        "high_column",
        "low_column",
        "close_column",
    ];
    for key in required {
        if let Some(value) = integer(config, "data", key)? {
            if value < 0 {
                return Err(ConfigError::invalid(
                    "data",
                    key,
                    format!("{} must be non-negative", key),
                ));
            }
        }
    }
    if let Some(value) = integer(config, "data", "volume_column")? {
        if value < -1 {
            return Err(ConfigError::invalid(
                "data",
                "volume_column",
                "volume_column must be -1 (disabled) or a column index",
            ));
        }
    }
    Ok(())
}

fn validate_date_range(config: &dyn ConfigPort) -> Result<(), ConfigError> {
    let format = config
        .get_string("data", "date_format")
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());

    let parse = |key: &str| -> Result<Option<chrono::NaiveDateTime>, ConfigError> {
        match config.get_string("data", key) {
            None => Ok(None),
            Some(raw) => parse_timestamp(&raw, &format).map(Some).map_err(|_| {
                let reason = format!("invalid {}, expected format {}", key, format);
                ConfigError::invalid("data", key, reason)
            }),
        }
    };

    let from = parse("from")?;
    let to = parse("to")?;
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ConfigError::invalid(
                "data",
                "from",
                "from must not be after to",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(err: &ConfigError) -> &str {
        match err {
            ConfigError::Invalid { key, .. } | ConfigError::Missing { key, .. } => key,
            ConfigError::Parse { .. } => "",
        }
    }

    #[test]
    fn valid_config_passes() {
        let config = make_config(
            r#"
[backtest]
initial_cash = 100000
commission_rate = 0.001
margin_buffer = 0.05
allow_shorting = false
risk_free_rate = 0.02
periods_per_year = 252

[strategy]
kind = trend
moving_average_period = 15
fixed_position_size = 10
time_in_force_bars = 3

[data]
path = prices.csv
date_format = %Y-%m-%d
delimiter = |
volume_column = -1
from = 2020-01-01
to = 2020-12-31
resolution_seconds = 86400
max_gap_bars = 5
"#,
        );
        assert!(validate_all(&config).is_ok());
    }

    #[test]
    fn defaults_pass_with_only_a_path() {
        let config = make_config("[data]\npath = prices.csv\n");
        assert!(validate_all(&config).is_ok());
    }

    #[test]
    fn initial_cash_must_be_positive() {
        let config = make_config("[backtest]\ninitial_cash = 0\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(&err), "initial_cash");
    }

    #[test]
    fn non_numeric_cash_is_reported() {
        let config = make_config("[backtest]\ninitial_cash = lots\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn negative_commission_fails() {
        let config = make_config("[backtest]\ncommission_rate = -0.01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(&err), "commission_rate");
    }

    #[test]
    fn risk_free_rate_out_of_range_fails() {
        let config = make_config("[backtest]\nrisk_free_rate = 1.5\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(&err), "risk_free_rate");
    }

    #[test]
    fn zero_periods_per_year_fails() {
        let config = make_config("[backtest]\nperiods_per_year = 0\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(&err), "periods_per_year");
    }

    #[test]
    fn unknown_strategy_kind_fails() {
        let config = make_config("[strategy]\nkind = martingale\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert_eq!(invalid_key(&err), "kind");
    }

    #[test]
    fn zero_period_fails() {
        let config = make_config("[strategy]\nmoving_average_period = 0\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert_eq!(invalid_key(&err), "moving_average_period");
    }

    #[test]
    fn negative_position_size_fails() {
        let config = make_config("[strategy]\nfixed_position_size = -5\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert_eq!(invalid_key(&err), "fixed_position_size");
    }

    #[test]
    fn missing_data_path_fails() {
        let config = make_config("[data]\ndelimiter = ,\n");
        let err = validate_data_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
        assert_eq!(invalid_key(&err), "path");
    }

    #[test]
    fn long_delimiter_fails() {
        let config = make_config("[data]\npath = a.csv\ndelimiter = ::\n");
        let err = validate_data_config(&config).unwrap_err();
        assert_eq!(invalid_key(&err), "delimiter");
    }

    #[test]
    fn negative_column_fails() {
        let config = make_config("[data]\npath = a.csv\nclose_column = -1\n");
        let err = validate_data_config(&config).unwrap_err();
        assert_eq!(invalid_key(&err), "close_column");
    }

    #[test]
    fn inverted_date_range_fails() {
        let config = make_config("[data]\npath = a.csv\nfrom = 2021-01-01\nto = 2020-01-01\n");
        let err = validate_data_config(&config).unwrap_err();
        assert_eq!(invalid_key(&err), "from");
    }

    #[test]
    fn bad_date_fails() {
        let config = make_config("[data]\npath = a.csv\nto = 31/12/2020\n");
        let err = validate_data_config(&config).unwrap_err();
        assert_eq!(invalid_key(&err), "to");
    }
}
