//! Performance metrics and statistics.

use super::backtest::BacktestResult;
use super::portfolio::{EquityPoint, Ledger};

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub starting_value: f64,
    pub ending_value: f64,
    pub total_return: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    /// `None` when there are fewer than two period returns or they never vary.
    pub sharpe_ratio: Option<f64>,
    /// Largest peak-to-trough decline as a fraction of the peak.
    pub max_drawdown: f64,
    pub max_money_drawdown: f64,
    /// Longest run of bars spent below a previous peak.
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub gross_trade_pnl: f64,
    pub net_trade_pnl: f64,
    pub total_commission: f64,
    pub avg_bars_held: f64,
}

impl Metrics {
    pub fn compute(result: &BacktestResult, risk_free_rate: f64, periods_per_year: u32) -> Self {
        Self::from_ledger(&result.ledger, risk_free_rate, periods_per_year)
    }

    pub fn from_ledger(ledger: &Ledger, risk_free_rate: f64, periods_per_year: u32) -> Self {
        let starting_value = ledger.initial_cash;
        let ending_value = ledger.last_equity();

        let total_return = if starting_value > 0.0 {
            (ending_value - starting_value) / starting_value
        } else {
            0.0
        };

        let drawdown = compute_drawdown(&ledger.equity_curve);
        let periods = f64::from(periods_per_year.max(1));
        let sharpe_ratio = compute_sharpe(&ledger.equity_curve, risk_free_rate / periods, periods);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut gross_trade_pnl = 0.0_f64;
        let mut net_trade_pnl = 0.0_f64;
        let mut total_bars_held = 0usize;

        for trade in &ledger.closed_trades {
            let pnl = trade.pnl_net;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            }
            gross_trade_pnl += trade.pnl;
            net_trade_pnl += trade.pnl_net;
            total_bars_held += trade.bars_held;
        }

        let total_trades = ledger.closed_trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_bars_held = if total_trades > 0 {
            total_bars_held as f64 / total_trades as f64
        } else {
            0.0
        };

        Metrics {
            starting_value,
            ending_value,
            total_return,
            realized_pnl: ledger.realized_pnl,
            unrealized_pnl: ledger.unrealized_pnl,
            sharpe_ratio,
            max_drawdown: drawdown.fraction,
            max_money_drawdown: drawdown.money,
            max_drawdown_duration: drawdown.duration,
            total_trades,
            trades_won,
            trades_lost,
            win_rate,
            profit_factor,
            largest_win,
            largest_loss,
            gross_trade_pnl,
            net_trade_pnl,
            total_commission: ledger.total_commission,
            avg_bars_held,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Drawdown {
    fraction: f64,
    money: f64,
    duration: usize,
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> Drawdown {
    let Some(first) = equity_curve.first() else {
        return Drawdown::default();
    };

    let mut peak = first.equity;
    let mut worst = Drawdown::default();
    let mut current_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_duration = 0;
            continue;
        }

        let money = peak - point.equity;
        worst.money = worst.money.max(money);
        if peak > 0.0 {
            worst.fraction = worst.fraction.max(money / peak);
        }
        current_duration += 1;
        worst.duration = worst.duration.max(current_duration);
    }

    worst
}

/// Annualized Sharpe ratio of per-bar equity returns.
fn compute_sharpe(
    equity_curve: &[EquityPoint],
    period_rf: f64,
    periods_per_year: f64,
) -> Option<f64> {
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let curr = w[1].equity;
            if prev > 0.0 {
                (curr - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    if returns.len() < 2 {
        return None;
    }

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev <= f64::EPSILON {
        return None;
    }

    Some((mean - period_rf) / stddev * periods_per_year.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::ClosedTrade;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::days(day)
    }

    fn make_equity_curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                timestamp: ts(i as i64),
                equity: v,
            })
            .collect()
    }

    fn make_ledger(equity: Vec<f64>, trades: Vec<ClosedTrade>) -> Ledger {
        let initial = equity.first().copied().unwrap_or(100_000.0);
        let mut ledger = Ledger::new(initial);
        ledger.closed_trades = trades;
        ledger.equity_curve = make_equity_curve(&equity);
        ledger
    }

    fn make_trade(pnl: f64, commission: f64, bars_held: usize) -> ClosedTrade {
        ClosedTrade {
            size: 100,
            entry_price: 100.0,
            exit_price: 100.0 + pnl / 100.0,
            entry_time: ts(0),
            exit_time: ts(bars_held as i64),
            bars_held,
            pnl,
            pnl_net: pnl - commission,
        }
    }

    #[test]
    fn metrics_empty_ledger() {
        let ledger = Ledger::new(100_000.0);
        let metrics = Metrics::from_ledger(&ledger, 0.05, 252);
        assert!((metrics.total_return - 0.0).abs() < f64::EPSILON);
        assert!((metrics.ending_value - 100_000.0).abs() < f64::EPSILON);
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.sharpe_ratio, None);
        assert_eq!(metrics.max_drawdown_duration, 0);
    }

    #[test]
    fn metrics_total_return() {
        let up = Metrics::from_ledger(&make_ledger(vec![100_000.0, 110_000.0], vec![]), 0.0, 252);
        assert!((up.total_return - 0.10).abs() < 1e-9);

        let down = Metrics::from_ledger(&make_ledger(vec![100_000.0, 90_000.0], vec![]), 0.0, 252);
        assert!((down.total_return - (-0.10)).abs() < 1e-9);
    }

    #[test]
    fn metrics_trade_stats_use_net_pnl() {
        let trades = vec![
            make_trade(100.0, 1.0, 5),
            make_trade(-50.0, 1.0, 3),
            make_trade(200.0, 1.0, 10),
            make_trade(1.0, 1.0, 2),
        ];
        let ledger = make_ledger(vec![100_000.0, 100_250.0], trades);
        let metrics = Metrics::from_ledger(&ledger, 0.0, 252);

        assert_eq!(metrics.total_trades, 4);
        assert_eq!(metrics.trades_won, 2);
        assert_eq!(metrics.trades_lost, 1);
        assert!((metrics.win_rate - 0.5).abs() < f64::EPSILON);
        assert!((metrics.gross_trade_pnl - 251.0).abs() < 1e-9);
        assert!((metrics.net_trade_pnl - 247.0).abs() < 1e-9);
        assert!((metrics.avg_bars_held - 5.0).abs() < 1e-9);
    }

    #[test]
    fn metrics_profit_factor_and_extremes() {
        let trades = vec![
            make_trade(100.0, 0.0, 5),
            make_trade(-50.0, 0.0, 3),
            make_trade(200.0, 0.0, 10),
        ];
        let ledger = make_ledger(vec![100_000.0, 100_250.0], trades);
        let metrics = Metrics::from_ledger(&ledger, 0.0, 252);

        assert!((metrics.profit_factor - 6.0).abs() < 1e-9);
        assert!((metrics.largest_win - 200.0).abs() < 1e-9);
        assert!((metrics.largest_loss - 50.0).abs() < 1e-9);
    }

    #[test]
    fn metrics_profit_factor_without_losses() {
        let trades = vec![make_trade(10.0, 0.0, 1)];
        let metrics = Metrics::from_ledger(&make_ledger(vec![100.0, 110.0], trades), 0.0, 252);
        assert!(metrics.profit_factor.is_infinite());
    }

    #[test]
    fn max_drawdown_fraction_and_money() {
        let curve = make_equity_curve(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        let dd = compute_drawdown(&curve);

        assert!((dd.fraction - (110.0 - 80.0) / 110.0).abs() < 1e-9);
        assert!((dd.money - 30.0).abs() < 1e-9);
    }

    #[test]
    fn max_drawdown_duration_in_bars() {
        let curve = make_equity_curve(&[100.0, 110.0, 100.0, 90.0, 85.0, 95.0, 111.0, 105.0]);
        assert_eq!(compute_drawdown(&curve).duration, 4);
    }

    #[test]
    fn sharpe_positive_for_rising_curve() {
        let values: Vec<f64> = (0..253)
            .map(|i| 100_000.0 * (1.0 + 0.001 * (i as f64) + 0.0001 * ((i % 3) as f64)))
            .collect();
        let metrics = Metrics::from_ledger(&make_ledger(values, vec![]), 0.0, 252);
        assert!(metrics.sharpe_ratio.unwrap() > 0.0);
    }

    #[test]
    fn sharpe_undefined_for_flat_or_short_curve() {
        let flat = make_equity_curve(&[100.0, 100.0, 100.0, 100.0]);
        assert_eq!(compute_sharpe(&flat, 0.0, 252.0), None);

        let short = make_equity_curve(&[100.0, 101.0]);
        assert_eq!(compute_sharpe(&short, 0.0, 252.0), None);
    }

    #[test]
    fn sharpe_matches_hand_computation() {
        // returns: +10%, -10%
        let curve = make_equity_curve(&[100.0, 110.0, 99.0]);
        let sharpe = compute_sharpe(&curve, 0.0, 1.0).unwrap();
        // mean 0, so the ratio is zero
        assert!(sharpe.abs() < 1e-12);

        let curve = make_equity_curve(&[100.0, 110.0, 121.0, 121.0]);
        let returns = [0.1, 0.1, 0.0];
        let mean = 0.2 / 3.0;
        let var = returns.iter().map(|r: &f64| (r - mean).powi(2)).sum::<f64>() / 3.0;
        let expected = mean / var.sqrt() * 4.0_f64.sqrt();
        let sharpe = compute_sharpe(&curve, 0.0, 4.0).unwrap();
        assert!((sharpe - expected).abs() < 1e-9);
    }
}
