//! Tests for the CLI layer: config building, data path resolution and the
//! full pipeline from a feed to the written reports.

mod common;

use barreplay::adapters::file_config_adapter::FileConfigAdapter;
use barreplay::adapters::memory_adapter::MemoryFeed;
use barreplay::cli::{
    build_backtest_config, build_csv_options, build_load_options, build_strategy_kind,
    load_config, resolve_data_path, run_backtest_pipeline, run_dry_run,
};
use barreplay::domain::error::ConfigError;
use barreplay::domain::order::TimeInForce;
use barreplay::domain::price_series::LoadOptions;
use barreplay::domain::strategy::StrategyKind;
use common::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::{NamedTempFile, TempDir};

fn same_code(a: ExitCode, b: ExitCode) -> bool {
    format!("{:?}", a) == format!("{:?}", b)
}

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("backtest.ini");
    std::fs::write(&path, content).unwrap();
    path
}

const FULL_CONFIG: &str = r#"
[backtest]
initial_cash = 50000.0
commission_rate = 0.001
margin_buffer = 0.1
allow_shorting = yes
risk_free_rate = 0.02
periods_per_year = 52

[strategy]
kind = trend
moving_average_period = 10
fixed_position_size = 25
time_in_force_bars = 3

[data]
path = prices.csv
delimiter = |
has_header = false
date_format = %d/%m/%Y
from = 01/02/2020
to = 31/12/2020
volume_column = -1
max_gap_bars = 4
tolerate_gaps = true
"#;

mod config_building {
    use super::*;

    #[test]
    fn backtest_config_from_ini() {
        let adapter = FileConfigAdapter::from_string(FULL_CONFIG).unwrap();
        let config = build_backtest_config(&adapter).unwrap();

        assert_eq!(config.initial_cash, 50000.0);
        assert_eq!(config.execution.commission_rate, 0.001);
        assert_eq!(config.execution.margin_buffer, 0.1);
        assert!(config.execution.allow_shorting);
        assert_eq!(config.execution.time_in_force, TimeInForce::Bars(3));
        assert_eq!(config.fixed_position_size, Some(25));
        assert_eq!(config.moving_average_period, 10);
        assert_eq!(config.risk_free_rate, 0.02);
        assert_eq!(config.periods_per_year, 52);
    }

    #[test]
    fn defaults_when_sections_are_empty() {
        let adapter = FileConfigAdapter::from_string("[backtest]\n").unwrap();
        let config = build_backtest_config(&adapter).unwrap();

        assert_eq!(config.initial_cash, 100_000.0);
        assert_eq!(config.execution.time_in_force, TimeInForce::GoodTillCanceled);
        assert_eq!(config.fixed_position_size, None);
        assert_eq!(config.moving_average_period, 20);
        assert_eq!(build_strategy_kind(&adapter).unwrap(), StrategyKind::Crossover);
    }

    #[test]
    fn unknown_strategy_kind_is_invalid() {
        let adapter = FileConfigAdapter::from_string("[strategy]\nkind = momentum\n").unwrap();
        assert!(matches!(
            build_strategy_kind(&adapter),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn zero_period_is_rejected() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\nmoving_average_period = 0\n").unwrap();
        assert!(build_backtest_config(&adapter).is_err());
    }

    #[test]
    fn csv_options_from_ini() {
        let adapter = FileConfigAdapter::from_string(FULL_CONFIG).unwrap();
        let options = build_csv_options(&adapter).unwrap();

        assert_eq!(options.delimiter, b'|');
        assert!(!options.has_header);
        assert_eq!(options.date_format, "%d/%m/%Y");
        assert_eq!(options.columns.volume, None);
        assert_eq!(options.columns.close, 4);
        assert_eq!(options.from, Some(date(2020, 2, 1)));
        assert_eq!(options.to, Some(date(2020, 12, 31)));
        assert!(options.skip_malformed);
    }

    #[test]
    fn unparseable_range_bound_is_invalid() {
        let adapter = FileConfigAdapter::from_string("[data]\nfrom = last tuesday\n").unwrap();
        assert!(matches!(
            build_csv_options(&adapter),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn load_options_from_ini() {
        let adapter = FileConfigAdapter::from_string(FULL_CONFIG).unwrap();
        let options = build_load_options(&adapter);

        assert_eq!(options.max_gap_bars, Some(4));
        assert_eq!(options.resolution, None);
        assert!(options.tolerate_gaps);
    }
}

mod data_paths {
    use super::*;

    #[test]
    fn relative_path_resolves_against_config_dir() {
        let adapter = FileConfigAdapter::from_string("[data]\npath = prices.csv\n").unwrap();
        let path = resolve_data_path(Path::new("/srv/runs/backtest.ini"), &adapter, None).unwrap();
        assert_eq!(path, PathBuf::from("/srv/runs/prices.csv"));
    }

    #[test]
    fn absolute_path_and_override_are_kept() {
        let adapter = FileConfigAdapter::from_string("[data]\npath = /data/prices.csv\n").unwrap();
        let config_path = Path::new("/srv/runs/backtest.ini");

        assert_eq!(
            resolve_data_path(config_path, &adapter, None).unwrap(),
            PathBuf::from("/data/prices.csv")
        );
        assert_eq!(
            resolve_data_path(config_path, &adapter, Some(Path::new("other.csv"))).unwrap(),
            PathBuf::from("other.csv")
        );
    }

    #[test]
    fn missing_path_is_reported() {
        let adapter = FileConfigAdapter::from_string("[data]\n").unwrap();
        assert!(matches!(
            resolve_data_path(Path::new("backtest.ini"), &adapter, None),
            Err(ConfigError::Missing { .. })
        ));
    }
}

mod commands {
    use super::*;

    #[test]
    fn load_config_reads_temp_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[data]\npath = prices.csv\n").unwrap();
        assert!(load_config(file.path()).is_ok());
        assert!(load_config(Path::new("/nonexistent/backtest.ini")).is_err());
    }

    #[test]
    fn dry_run_accepts_valid_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, FULL_CONFIG);
        assert!(same_code(run_dry_run(&path), ExitCode::SUCCESS));
    }

    #[test]
    fn dry_run_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "[backtest]\ninitial_cash = -5\n[data]\npath = prices.csv\n",
        );
        assert!(same_code(run_dry_run(&path), ExitCode::from(2)));
    }

    #[test]
    fn pipeline_writes_equity_curve() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("equity.csv");
        let feed = MemoryFeed::new(generate_bars(40, 100.0));

        let code = run_backtest_pipeline(
            &feed,
            sample_config(5),
            StrategyKind::Trend,
            &LoadOptions::default(),
            Some(&output),
            true,
        );
        assert!(same_code(code, ExitCode::SUCCESS));

        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "timestamp,equity");
        assert_eq!(lines.len(), 41);
        assert!(lines[1].starts_with("2024-01-01 00:00:00,"));
    }

    #[test]
    fn pipeline_reports_data_errors() {
        let mut bars = generate_bars(5, 100.0);
        bars.swap(1, 3);
        let feed = MemoryFeed::new(bars);

        let code = run_backtest_pipeline(
            &feed,
            sample_config(2),
            StrategyKind::Crossover,
            &LoadOptions::default(),
            None,
            false,
        );
        assert!(same_code(code, ExitCode::from(3)));
    }
}
