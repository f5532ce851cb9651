//! Order, fill and order-event types.

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderKind {
    Market,
    Limit(f64),
    Stop(f64),
    /// Flatten the whole position at the next open.
    Close,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit(p) => write!(f, "LIMIT {:.2}", p),
            OrderKind::Stop(p) => write!(f, "STOP {:.2}", p),
            OrderKind::Close => write!(f, "CLOSE"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeInForce {
    #[default]
    GoodTillCanceled,
    /// Expire after this many resolution attempts without a fill.
    Bars(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    PendingSubmit,
    Accepted,
    Filled,
    Rejected,
    Canceled,
}

impl OrderStatus {
    pub fn is_active(self) -> bool {
        matches!(self, OrderStatus::PendingSubmit | OrderStatus::Accepted)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::PendingSubmit => "pending-submit",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Filled => "filled",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// What a strategy asks for. `size: None` defers to the configured sizer.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub side: Side,
    pub kind: OrderKind,
    pub size: Option<i64>,
}

impl OrderRequest {
    pub fn buy() -> Self {
        OrderRequest {
            side: Side::Buy,
            kind: OrderKind::Market,
            size: None,
        }
    }

    pub fn sell() -> Self {
        OrderRequest {
            side: Side::Sell,
            kind: OrderKind::Market,
            size: None,
        }
    }

    /// Side and size are resolved against the position at submission.
    pub fn close() -> Self {
        OrderRequest {
            side: Side::Sell,
            kind: OrderKind::Close,
            size: None,
        }
    }

    pub fn with_kind(mut self, kind: OrderKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub kind: OrderKind,
    pub requested_size: i64,
    pub time_in_force: TimeInForce,
    pub submitted_bar: usize,
    pub submitted_at: NaiveDateTime,
    pub attempts: u32,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub order_id: OrderId,
    pub side: Side,
    pub executed_price: f64,
    pub executed_size: i64,
    pub commission: f64,
    pub timestamp: NaiveDateTime,
    pub bar_index: usize,
}

impl Fill {
    /// Notional value of the fill, before commission.
    pub fn value(&self) -> f64 {
        self.executed_price * self.executed_size as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Requested,
    Expired,
    EndOfData,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CancelReason::Requested => "requested",
            CancelReason::Expired => "expired",
            CancelReason::EndOfData => "end of data",
        };
        f.write_str(s)
    }
}

/// Order notifications, queued by the simulator and drained by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Submitted { order: Order },
    Accepted { id: OrderId },
    Filled { fill: Fill },
    Rejected { id: OrderId, reason: String },
    Canceled { id: OrderId, reason: CancelReason },
}
