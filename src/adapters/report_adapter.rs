//! Plain-text summary and equity-curve CSV reports.

use std::io::Write;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::BacktestError;
use crate::domain::metrics::Metrics;
use crate::ports::report_port::ReportPort;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Human-readable run summary.
#[derive(Debug, Clone, Default)]
pub struct TextReport {
    /// Also list every closed trade.
    pub include_trades: bool,
}

impl ReportPort for TextReport {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        out: &mut dyn Write,
    ) -> Result<(), BacktestError> {
        writeln!(out, "=== Backtest Results ({}) ===", result.strategy)?;
        writeln!(
            out,
            "Period:           {} to {} ({} bars)",
            result.start.format(TIMESTAMP_FORMAT),
            result.end.format(TIMESTAMP_FORMAT),
            result.bars_processed
        )?;
        writeln!(out, "Starting Value:   {:.2}", metrics.starting_value)?;
        writeln!(out, "Ending Value:     {:.2}", metrics.ending_value)?;
        writeln!(out, "Total Return:     {:.2}%", metrics.total_return * 100.0)?;
        writeln!(out, "Realized P&L:     {:.2}", metrics.realized_pnl)?;
        writeln!(out, "Unrealized P&L:   {:.2}", metrics.unrealized_pnl)?;
        writeln!(out, "Commission:       {:.2}", metrics.total_commission)?;
        match metrics.sharpe_ratio {
            Some(sharpe) => writeln!(out, "Sharpe Ratio:     {:.2}", sharpe)?,
            None => writeln!(out, "Sharpe Ratio:     n/a")?,
        }
        writeln!(
            out,
            "Max Drawdown:     -{:.2}% ({:.2}, {} bars)",
            metrics.max_drawdown * 100.0,
            metrics.max_money_drawdown,
            metrics.max_drawdown_duration
        )?;
        writeln!(
            out,
            "Trades:           {} ({} won, {} lost)",
            metrics.total_trades, metrics.trades_won, metrics.trades_lost
        )?;
        writeln!(out, "Win Rate:         {:.1}%", metrics.win_rate * 100.0)?;
        writeln!(
            out,
            "Trade P&L:        {:.2} gross, {:.2} net",
            metrics.gross_trade_pnl, metrics.net_trade_pnl
        )?;

        if self.include_trades && !result.ledger.closed_trades.is_empty() {
            writeln!(out)?;
            writeln!(out, "=== Trades ===")?;
            for trade in &result.ledger.closed_trades {
                writeln!(
                    out,
                    "{} -> {}  size {:>6}  {:.2} -> {:.2}  gross {:.2}  net {:.2}",
                    trade.entry_time.format(TIMESTAMP_FORMAT),
                    trade.exit_time.format(TIMESTAMP_FORMAT),
                    trade.size,
                    trade.entry_price,
                    trade.exit_price,
                    trade.pnl,
                    trade.pnl_net
                )?;
            }
        }
        Ok(())
    }
}

/// Equity curve as `timestamp,equity` rows.
#[derive(Debug, Clone, Default)]
pub struct EquityCsvReport;

impl ReportPort for EquityCsvReport {
    fn write(
        &self,
        result: &BacktestResult,
        _metrics: &Metrics,
        out: &mut dyn Write,
    ) -> Result<(), BacktestError> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(["timestamp", "equity"]).map_err(csv_error)?;
        for point in &result.ledger.equity_curve {
            wtr.write_record([
                point.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                format!("{:.2}", point.equity),
            ])
            .map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn csv_error(err: csv::Error) -> BacktestError {
    BacktestError::Io(std::io::Error::other(err))
}
