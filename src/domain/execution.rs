//! Order execution and fill simulation.
//!
//! Orders are decided on bar *t* and resolved against bar *t+1* or later:
//!
//! - Market / Close: fill at the next bar's open
//! - Limit: fill only if low <= limit <= high; the open is used when it is
//!   at least as good as the limit
//! - Stop: triggers when the bar trades through the stop; fills at the worse
//!   of open and stop
//!
//! At most one order is outstanding at a time. Every state change is queued as
//! an [`OrderEvent`] for the driver to drain.

use super::error::OrderError;
use super::ohlcv::Bar;
use super::order::{
    CancelReason, Fill, Order, OrderEvent, OrderId, OrderKind, OrderRequest, OrderStatus, Side,
    TimeInForce,
};
use super::portfolio::Ledger;

/// Configuration for execution parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Fraction of traded value charged per fill.
    pub commission_rate: f64,
    /// Extra headroom required on the buying-power check at submission.
    pub margin_buffer: f64,
    pub allow_shorting: bool,
    pub time_in_force: TimeInForce,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_rate: 0.0,
            margin_buffer: 0.0,
            allow_shorting: false,
            time_in_force: TimeInForce::GoodTillCanceled,
        }
    }
}

/// Commission: price * size * rate.
pub fn calculate_commission(price: f64, size: i64, commission_rate: f64) -> f64 {
    price * size as f64 * commission_rate
}

/// Price at which `order` would fill on `bar`, if it fills at all.
pub fn fill_price(order: &Order, bar: &Bar) -> Option<f64> {
    match (order.kind, order.side) {
        (OrderKind::Market | OrderKind::Close, _) => Some(bar.open),
        (OrderKind::Limit(limit), Side::Buy) => (bar.low <= limit && limit <= bar.high)
            .then(|| if bar.open <= limit { bar.open } else { limit }),
        (OrderKind::Limit(limit), Side::Sell) => (bar.low <= limit && limit <= bar.high)
            .then(|| if bar.open >= limit { bar.open } else { limit }),
        (OrderKind::Stop(stop), Side::Buy) => (bar.high >= stop).then(|| bar.open.max(stop)),
        (OrderKind::Stop(stop), Side::Sell) => (bar.low <= stop).then(|| bar.open.min(stop)),
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionSimulator {
    config: ExecutionConfig,
    next_id: u64,
    active: Option<Order>,
    history: Vec<Order>,
    events: Vec<OrderEvent>,
}

impl ExecutionSimulator {
    pub fn new(config: ExecutionConfig) -> Self {
        ExecutionSimulator {
            config,
            next_id: 1,
            active: None,
            history: Vec::new(),
            events: Vec::new(),
        }
    }

    /// The order in PendingSubmit/Accepted, if any.
    pub fn outstanding(&self) -> Option<&Order> {
        self.active.as_ref()
    }

    pub fn has_outstanding(&self) -> bool {
        self.active.is_some()
    }

    /// Orders that reached a terminal status, in completion order.
    pub fn history(&self) -> &[Order] {
        &self.history
    }

    pub fn drain_events(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.events)
    }

    /// Submit a request decided on bar `bar_index`.
    ///
    /// A rejected order is kept in the history with status `Rejected` and the
    /// reason is returned.
    pub fn submit(
        &mut self,
        request: &OrderRequest,
        bar_index: usize,
        bar: &Bar,
        ledger: &Ledger,
    ) -> Result<OrderId, OrderError> {
        let id = OrderId(self.next_id);
        self.next_id += 1;

        let (side, requested_size) = match request.kind {
            OrderKind::Close if ledger.position.is_short() => {
                (Side::Buy, ledger.position.size.abs())
            }
            OrderKind::Close => (Side::Sell, ledger.position.size.abs()),
            _ => (request.side, request.size.unwrap_or(0)),
        };

        let mut order = Order {
            id,
            side,
            kind: request.kind,
            requested_size,
            time_in_force: self.config.time_in_force,
            submitted_bar: bar_index,
            submitted_at: bar.timestamp,
            attempts: 0,
            status: OrderStatus::PendingSubmit,
        };
        tracing::debug!(
            order = %id,
            side = %side,
            kind = %order.kind,
            size = requested_size,
            price = bar.close,
            "order created"
        );
        self.events.push(OrderEvent::Submitted {
            order: order.clone(),
        });

        if let Err(err) = self.validate(&order, bar, ledger) {
            tracing::warn!(order = %id, %err, "order rejected");
            order.status = OrderStatus::Rejected;
            self.events.push(OrderEvent::Rejected {
                id,
                reason: err.to_string(),
            });
            self.history.push(order);
            return Err(err);
        }

        order.status = OrderStatus::Accepted;
        self.events.push(OrderEvent::Accepted { id });
        self.active = Some(order);
        Ok(id)
    }

    fn validate(&self, order: &Order, bar: &Bar, ledger: &Ledger) -> Result<(), OrderError> {
        if let Some(active) = &self.active {
            return Err(OrderError::invalid(format!(
                "order {} is still outstanding",
                active.id
            )));
        }

        if order.kind == OrderKind::Close && ledger.position.is_flat() {
            return Err(OrderError::invalid("no position to close"));
        }

        if order.requested_size <= 0 {
            return Err(OrderError::invalid(format!(
                "size must be positive, got {}",
                order.requested_size
            )));
        }

        if let OrderKind::Limit(price) | OrderKind::Stop(price) = order.kind {
            if !price.is_finite() || price <= 0.0 {
                return Err(OrderError::invalid(format!("invalid {} price", order.kind)));
            }
        }

        if order.side == Side::Sell
            && order.kind != OrderKind::Close
            && !self.config.allow_shorting
            && ledger.position.size - order.requested_size < 0
        {
            return Err(OrderError::invalid("short selling is disabled"));
        }

        if order.side == Side::Buy && order.kind != OrderKind::Close {
            let expected_price = match order.kind {
                OrderKind::Limit(price) | OrderKind::Stop(price) => price,
                _ => bar.close,
            };
            let required =
                order.requested_size as f64 * expected_price * (1.0 + self.config.margin_buffer);
            if required > ledger.cash {
                return Err(OrderError::InsufficientFunds {
                    required,
                    available: ledger.cash,
                });
            }
        }

        Ok(())
    }

    /// Try to fill the outstanding order against bar `bar_index`.
    ///
    /// Bars at or before the submission bar are never used.
    pub fn resolve(&mut self, bar_index: usize, bar: &Bar, ledger: &Ledger) -> Option<Fill> {
        let order = self.active.as_mut()?;
        if bar_index <= order.submitted_bar {
            return None;
        }
        order.attempts += 1;

        let Some(price) = fill_price(order, bar) else {
            if let TimeInForce::Bars(limit) = order.time_in_force {
                if order.attempts >= limit {
                    let id = order.id;
                    self.finish_cancel(CancelReason::Expired);
                    tracing::debug!(order = %id, "order expired");
                }
            }
            return None;
        };

        let commission =
            calculate_commission(price, order.requested_size, self.config.commission_rate);

        if order.side == Side::Buy && order.kind != OrderKind::Close {
            let required = price * order.requested_size as f64 + commission;
            if required > ledger.cash {
                let err = OrderError::InsufficientFunds {
                    required,
                    available: ledger.cash,
                };
                tracing::warn!(order = %order.id, %err, "order rejected at fill");
                let mut order = self.active.take()?;
                order.status = OrderStatus::Rejected;
                self.events.push(OrderEvent::Rejected {
                    id: order.id,
                    reason: err.to_string(),
                });
                self.history.push(order);
                return None;
            }
        }

        let mut order = self.active.take()?;
        order.status = OrderStatus::Filled;

        let fill = Fill {
            order_id: order.id,
            side: order.side,
            executed_price: price,
            executed_size: order.requested_size,
            commission,
            timestamp: bar.timestamp,
            bar_index,
        };
        tracing::info!(
            order = %order.id,
            side = %order.side,
            price,
            cost = fill.value(),
            size = fill.executed_size,
            commission,
            "order executed"
        );
        self.events.push(OrderEvent::Filled { fill: fill.clone() });
        self.history.push(order);
        Some(fill)
    }

    /// Cancel an outstanding order. Terminal orders cannot be canceled.
    pub fn cancel(&mut self, id: OrderId, reason: CancelReason) -> Result<(), OrderError> {
        match &self.active {
            Some(order) if order.id == id => {
                self.finish_cancel(reason);
                Ok(())
            }
            _ => match self.history.iter().find(|o| o.id == id) {
                Some(order) => Err(OrderError::NotActive {
                    id: id.0,
                    status: order.status.to_string(),
                }),
                None => Err(OrderError::NotFound(id.0)),
            },
        }
    }

    fn finish_cancel(&mut self, reason: CancelReason) {
        if let Some(mut order) = self.active.take() {
            order.status = OrderStatus::Canceled;
            self.events.push(OrderEvent::Canceled {
                id: order.id,
                reason,
            });
            self.history.push(order);
        }
    }
}
