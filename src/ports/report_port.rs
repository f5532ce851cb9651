//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::BacktestError;
use crate::domain::metrics::Metrics;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        out: &mut dyn std::io::Write,
    ) -> Result<(), BacktestError>;

    /// Write the report to a file, creating or truncating it.
    fn write_to_path(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        path: &std::path::Path,
    ) -> Result<(), BacktestError> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        self.write(result, metrics, &mut file)?;
        std::io::Write::flush(&mut file)?;
        Ok(())
    }
}
