//! Portfolio ledger: cash, position, P&L and the equity curve.
//!
//! The ledger only changes through [`Ledger::apply_fill`] and
//! [`Ledger::mark_to_market`]. Both are driven by the backtest loop.

use chrono::NaiveDateTime;

use super::order::Fill;
use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// Bookkeeping for the round trip currently open.
#[derive(Debug, Clone, PartialEq)]
struct OpenTrade {
    entry_time: NaiveDateTime,
    entry_bar: usize,
    peak_size: i64,
    pnl: f64,
    commission: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub initial_cash: f64,
    pub cash: f64,
    pub position: Position,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_commission: f64,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    open_trade: Option<OpenTrade>,
}

impl Ledger {
    pub fn new(initial_cash: f64) -> Self {
        Ledger {
            initial_cash,
            cash: initial_cash,
            position: Position::default(),
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            total_commission: 0.0,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
            open_trade: None,
        }
    }

    /// Book a confirmed fill. Returns the trade it closed, if any.
    pub fn apply_fill(&mut self, fill: &Fill) -> Option<ClosedTrade> {
        let quantity = fill.side.sign() * fill.executed_size;
        let entry_price = self.position.average_entry_price;
        self.cash -= quantity as f64 * fill.executed_price + fill.commission;
        self.total_commission += fill.commission;

        let change = self.position.apply(quantity, fill.executed_price);
        self.realized_pnl += change.realized_pnl;

        let mut closed = None;

        if change.closed > 0 {
            if let Some(mut trade) = self.open_trade.take() {
                // Commission of a flipping fill is split between the two trades.
                let total = (change.closed + change.opened) as f64;
                let share = fill.commission * change.closed as f64 / total;
                trade.pnl += change.realized_pnl;
                trade.commission += share;

                if self.position.size != 0 && change.opened == 0 {
                    self.open_trade = Some(trade);
                } else {
                    let done = ClosedTrade {
                        size: trade.peak_size,
                        entry_price,
                        exit_price: fill.executed_price,
                        entry_time: trade.entry_time,
                        exit_time: fill.timestamp,
                        bars_held: fill.bar_index.saturating_sub(trade.entry_bar),
                        pnl: trade.pnl,
                        pnl_net: trade.pnl - trade.commission,
                    };
                    tracing::info!(gross = done.pnl, net = done.pnl_net, "trade closed");
                    self.closed_trades.push(done.clone());
                    closed = Some(done);
                }
            }
        }

        if change.opened > 0 {
            let opened_share = fill.commission * change.opened as f64
                / (change.closed + change.opened) as f64;
            match self.open_trade.as_mut() {
                Some(trade) => {
                    trade.commission += opened_share;
                    if self.position.size.abs() > trade.peak_size.abs() {
                        trade.peak_size = self.position.size;
                    }
                }
                None => {
                    self.open_trade = Some(OpenTrade {
                        entry_time: fill.timestamp,
                        entry_bar: fill.bar_index,
                        peak_size: self.position.size,
                        pnl: 0.0,
                        commission: opened_share,
                    });
                }
            }
        }

        closed
    }

    /// Value the position at `price`, record unrealized P&L and append an
    /// equity point.
    pub fn mark_to_market(&mut self, timestamp: NaiveDateTime, price: f64) -> f64 {
        self.unrealized_pnl = self.position.unrealized_pnl(price);
        let equity = self.equity_at(price);
        self.equity_curve.push(EquityPoint { timestamp, equity });
        equity
    }

    /// cash + size * price
    pub fn equity_at(&self, price: f64) -> f64 {
        self.cash + self.position.market_value(price)
    }

    /// Last recorded equity at or before `as_of`; the initial cash if `as_of`
    /// predates the curve.
    pub fn get_equity(&self, as_of: NaiveDateTime) -> f64 {
        let idx = self
            .equity_curve
            .partition_point(|p| p.timestamp <= as_of);
        if idx == 0 {
            self.initial_cash
        } else {
            self.equity_curve[idx - 1].equity
        }
    }

    pub fn last_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_cash)
    }
}
