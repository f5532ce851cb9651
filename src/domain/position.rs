//! Position tracking.

use chrono::NaiveDateTime;

/// Signed single-instrument position: positive long, negative short, zero flat.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub size: i64,
    pub average_entry_price: f64,
}

/// Effect of applying a signed quantity to a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionChange {
    /// Quantity taken off the previous position (always >= 0).
    pub closed: i64,
    /// Quantity added in the new direction (always >= 0).
    pub opened: i64,
    /// Price P&L realized on the closed quantity.
    pub realized_pnl: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.size > 0
    }

    pub fn is_short(&self) -> bool {
        self.size < 0
    }

    pub fn is_flat(&self) -> bool {
        self.size == 0
    }

    /// Signed value of the position at `price`.
    pub fn market_value(&self, price: f64) -> f64 {
        self.size as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.size as f64 * (price - self.average_entry_price)
    }

    /// Apply a signed quantity at `price`.
    ///
    /// Adds in the same direction move the entry price to the size-weighted
    /// average. Reductions realize P&L on the closed part and keep the entry
    /// price. A flip closes everything and opens the rest at `price`.
    pub fn apply(&mut self, quantity: i64, price: f64) -> PositionChange {
        if quantity == 0 {
            return PositionChange {
                closed: 0,
                opened: 0,
                realized_pnl: 0.0,
            };
        }

        let same_direction = self.size == 0 || self.size.signum() == quantity.signum();
        if same_direction {
            let old = self.size.unsigned_abs() as f64;
            let add = quantity.unsigned_abs() as f64;
            self.average_entry_price = (old * self.average_entry_price + add * price) / (old + add);
            self.size += quantity;
            return PositionChange {
                closed: 0,
                opened: quantity.abs(),
                realized_pnl: 0.0,
            };
        }

        let closed = quantity.abs().min(self.size.abs());
        let direction = self.size.signum() as f64;
        let realized_pnl = closed as f64 * (price - self.average_entry_price) * direction;
        let opened = quantity.abs() - closed;

        self.size += quantity;
        if self.size == 0 {
            self.average_entry_price = 0.0;
        } else if opened > 0 {
            self.average_entry_price = price;
        }

        PositionChange {
            closed,
            opened,
            realized_pnl,
        }
    }
}

/// A completed round trip, flat to flat.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    /// Signed peak size reached while the trade was open.
    pub size: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub bars_held: usize,
    pub pnl: f64,
    /// `pnl` net of every commission charged on the trade's fills.
    pub pnl_net: f64,
}
