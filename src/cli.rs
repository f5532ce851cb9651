//! CLI definition and dispatch.

use chrono::Duration;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{ColumnMap, CsvFeed, CsvOptions};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::report_adapter::{EquityCsvReport, TextReport};
use crate::domain::backtest::{Backtest, BacktestConfig};
use crate::domain::config_validation::{validate_all, DEFAULT_DATE_FORMAT};
use crate::domain::error::{BacktestError, ConfigError};
use crate::domain::execution::ExecutionConfig;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::parse_timestamp;
use crate::domain::order::TimeInForce;
use crate::domain::price_series::{LoadOptions, PriceSeries};
use crate::domain::strategy::StrategyKind;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataFeed;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "barreplay", about = "Single-instrument bar replay backtester")]
pub struct Cli {
    /// Log order and strategy decisions
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Price file, overriding [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Strategy kind, overriding [strategy] kind
        #[arg(long)]
        strategy: Option<String>,
        /// Write the equity curve as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// List closed trades in the summary
        #[arg(long)]
        trades: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the bars a configuration would replay
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            strategy,
            output,
            trades,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(
                    &config,
                    data.as_deref(),
                    strategy.as_deref(),
                    output.as_deref(),
                    trades,
                )
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, data } => run_info(&config, data.as_deref()),
    }
}

fn fail(err: impl Into<BacktestError>) -> ExitCode {
    let err = err.into();
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Load and validate a config file.
fn load_validated(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let config = load_config(path)?;
    validate_all(&config).map_err(fail)?;
    Ok(config)
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, ConfigError> {
    let defaults = BacktestConfig::default();

    let time_in_force = match adapter.get_string("strategy", "time_in_force_bars") {
        None => TimeInForce::GoodTillCanceled,
        Some(_) => {
            let bars = adapter.get_int("strategy", "time_in_force_bars", 0);
            let bars = u32::try_from(bars).ok().filter(|b| *b > 0).ok_or_else(|| {
                ConfigError::invalid("strategy", "time_in_force_bars", "must be positive")
            })?;
            TimeInForce::Bars(bars)
        }
    };

    let fixed_position_size = match adapter.get_string("strategy", "fixed_position_size") {
        None => None,
        Some(_) => Some(adapter.get_int("strategy", "fixed_position_size", 0)),
    };

    let period = adapter.get_int(
        "strategy",
        "moving_average_period",
        defaults.moving_average_period as i64,
    );
    let moving_average_period = usize::try_from(period).map_err(|_| {
        ConfigError::invalid("strategy", "moving_average_period", "must be >= 1")
    })?;

    let periods = adapter.get_int(
        "backtest",
        "periods_per_year",
        i64::from(defaults.periods_per_year),
    );
    let periods_per_year = u32::try_from(periods)
        .map_err(|_| ConfigError::invalid("backtest", "periods_per_year", "out of range"))?;

    let config = BacktestConfig {
        initial_cash: adapter.get_double("backtest", "initial_cash", defaults.initial_cash),
        execution: ExecutionConfig {
            commission_rate: adapter.get_double("backtest", "commission_rate", 0.0),
            margin_buffer: adapter.get_double("backtest", "margin_buffer", 0.0),
            allow_shorting: adapter.get_bool("backtest", "allow_shorting", false),
            time_in_force,
        },
        fixed_position_size,
        moving_average_period,
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", defaults.risk_free_rate),
        periods_per_year,
    };
    config.validate()?;
    Ok(config)
}

pub fn build_strategy_kind(adapter: &dyn ConfigPort) -> Result<StrategyKind, ConfigError> {
    match adapter.get_string("strategy", "kind") {
        None => Ok(StrategyKind::default()),
        Some(kind) => kind
            .parse()
            .map_err(|reason: String| ConfigError::invalid("strategy", "kind", reason)),
    }
}

fn column(adapter: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = adapter.get_int("data", key, default as i64);
    usize::try_from(value).map_err(|_| ConfigError::invalid("data", key, "must be non-negative"))
}

pub fn build_csv_options(adapter: &dyn ConfigPort) -> Result<CsvOptions, ConfigError> {
    let defaults = ColumnMap::default();
    let volume = match adapter.get_int("data", "volume_column", 5) {
        -1 => None,
        v => Some(usize::try_from(v).map_err(|_| {
            ConfigError::invalid("data", "volume_column", "must be -1 or a column index")
        })?),
    };
    let columns = ColumnMap {
        timestamp: column(adapter, "timestamp_column", defaults.timestamp)?,
        open: column(adapter, "open_column", defaults.open)?,
        high: column(adapter, "high_column", defaults.high)?,
        low: column(adapter, "low_column", defaults.low)?,
        close: column(adapter, "close_column", defaults.close)?,
        volume,
    };

    let delimiter = match adapter.get_string("data", "delimiter").as_deref() {
        None => b',',
        Some("\\t") => b'\t',
        Some(d) if d.len() == 1 && d.is_ascii() => d.as_bytes()[0],
        Some(_) => {
            return Err(ConfigError::invalid(
                "data",
                "delimiter",
                "must be a single ASCII character",
            ));
        }
    };

    let date_format = adapter
        .get_string("data", "date_format")
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
    let bound = |key: &str| match adapter.get_string("data", key) {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw, &date_format)
            .map(Some)
            .map_err(|e| ConfigError::invalid("data", key, e.to_string())),
    };
    let from = bound("from")?;
    let to = bound("to")?;

    Ok(CsvOptions {
        columns,
        delimiter,
        has_header: adapter.get_bool("data", "has_header", true),
        date_format,
        from,
        to,
        skip_malformed: adapter.get_bool("data", "tolerate_gaps", false),
    })
}

pub fn build_load_options(adapter: &dyn ConfigPort) -> LoadOptions {
    let resolution = adapter
        .get_string("data", "resolution_seconds")
        .map(|_| Duration::seconds(adapter.get_int("data", "resolution_seconds", 0)));
    let max_gap_bars = adapter
        .get_string("data", "max_gap_bars")
        .and_then(|_| u32::try_from(adapter.get_int("data", "max_gap_bars", 0)).ok());
    LoadOptions {
        resolution,
        max_gap_bars,
        tolerate_gaps: adapter.get_bool("data", "tolerate_gaps", false),
    }
}

/// The price file: the override if given, else `[data] path`. Relative
/// config paths resolve against the config file's directory.
pub fn resolve_data_path(
    config_path: &Path,
    adapter: &dyn ConfigPort,
    data_override: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = data_override {
        return Ok(path.to_path_buf());
    }
    let raw = adapter
        .get_string("data", "path")
        .ok_or_else(|| ConfigError::missing("data", "path"))?;
    let path = PathBuf::from(raw.trim());
    if path.is_absolute() {
        return Ok(path);
    }
    Ok(config_path
        .parent()
        .map(|dir| dir.join(&path))
        .unwrap_or(path))
}

fn run_backtest(
    config_path: &Path,
    data_override: Option<&Path>,
    strategy_override: Option<&str>,
    output: Option<&Path>,
    include_trades: bool,
) -> ExitCode {
    let config = match load_validated(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let bt_config = match build_backtest_config(&config) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let kind = match strategy_override {
        Some(s) => match s.parse::<StrategyKind>() {
            Ok(k) => k,
            Err(reason) => return fail(ConfigError::invalid("strategy", "kind", reason)),
        },
        None => match build_strategy_kind(&config) {
            Ok(k) => k,
            Err(e) => return fail(e),
        },
    };
    let csv_options = match build_csv_options(&config) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };
    let data_path = match resolve_data_path(config_path, &config, data_override) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    eprintln!("Loading data from {}", data_path.display());
    let feed = CsvFeed::from_path(data_path, csv_options);

    run_backtest_pipeline(
        &feed,
        bt_config,
        kind,
        &build_load_options(&config),
        output,
        include_trades,
    )
}

/// Fetch, run, summarise. Separated from config loading so any feed can
/// drive it.
pub fn run_backtest_pipeline(
    feed: &dyn DataFeed,
    bt_config: BacktestConfig,
    kind: StrategyKind,
    load_options: &LoadOptions,
    output: Option<&Path>,
    include_trades: bool,
) -> ExitCode {
    let bars = match feed.fetch_bars() {
        Ok(b) => b,
        Err(e) => return fail(e),
    };

    let risk_free_rate = bt_config.risk_free_rate;
    let periods_per_year = bt_config.periods_per_year;

    let mut backtest = match Backtest::new(bt_config) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };
    if let Err(e) = backtest.load_data(bars, load_options) {
        return fail(e);
    }
    backtest.attach_strategy(kind.build());

    eprintln!(
        "Running backtest: {} strategy, MA({}), {}",
        kind,
        backtest.config().moving_average_period,
        feed.describe()
    );

    let result = match backtest.run() {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let metrics = Metrics::compute(&result, risk_free_rate, periods_per_year);

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = (TextReport { include_trades }).write(&result, &metrics, &mut stdout) {
        return fail(e);
    }

    if let Some(path) = output {
        match EquityCsvReport.write_to_path(&result, &metrics, path) {
            Ok(()) => eprintln!("\nEquity curve written to: {}", path.display()),
            Err(e) => {
                eprintln!("error: failed to write equity curve: {e}");
                return (&e).into();
            }
        }
    }

    ExitCode::SUCCESS
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    let config = match load_validated(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let bt_config = match build_backtest_config(&config) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let kind = match build_strategy_kind(&config) {
        Ok(k) => k,
        Err(e) => return fail(e),
    };
    let csv_options = match build_csv_options(&config) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };
    let data_path = match resolve_data_path(config_path, &config, None) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    eprintln!("Config validated successfully");
    eprintln!("\nStrategy:");
    eprintln!("  kind:           {}", kind);
    eprintln!("  moving average: {}", bt_config.moving_average_period);
    eprintln!(
        "  position size:  {}",
        bt_config.fixed_position_size.unwrap_or(1)
    );
    eprintln!("\nBacktest:");
    eprintln!("  initial cash:   {:.2}", bt_config.initial_cash);
    eprintln!("  commission:     {}", bt_config.execution.commission_rate);
    eprintln!("  shorting:       {}", bt_config.execution.allow_shorting);
    eprintln!("\nData:");
    eprintln!("  path:           {}", data_path.display());
    eprintln!("  date format:    {}", csv_options.date_format);

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let config = match load_validated(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = build_backtest_config(&config) {
        return fail(e);
    }
    if let Err(e) = build_csv_options(&config) {
        return fail(e);
    }
    eprintln!("{}: OK", config_path.display());
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path, data_override: Option<&Path>) -> ExitCode {
    let config = match load_validated(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let csv_options = match build_csv_options(&config) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };
    let data_path = match resolve_data_path(config_path, &config, data_override) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let feed = CsvFeed::from_path(&data_path, csv_options);
    let series = match feed
        .fetch_bars()
        .and_then(|bars| {
            PriceSeries::load(bars, &build_load_options(&config)).map_err(BacktestError::from)
        })
    {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    if let (Some(first), Some(last)) = (series.first(), series.last()) {
        println!(
            "{}: {} bars, {} to {}",
            data_path.display(),
            series.len(),
            first.timestamp,
            last.timestamp
        );
    }
    ExitCode::SUCCESS
}
