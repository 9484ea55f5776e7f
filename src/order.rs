//! Order submission and status types.
//!
//! Financial-advisor, SMART-routing and BOX-exchange field groups are left
//! out: those encode wire-protocol detail for a real broker session. This
//! crate tracks only what `place_order` and `ORDER_STATUS` streaming need.
use rust_decimal::Decimal;
use strum_macros::{Display, EnumString};

use crate::{contract::Contract, OrderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum Action {
    #[strum(serialize = "BUY")]
    Buy,
    #[strum(serialize = "SELL")]
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum OrderType {
    #[strum(serialize = "MKT")]
    Market,
    #[strum(serialize = "LMT")]
    Limit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub contract: Contract,
    pub action: Action,
    pub total_qty: Decimal,
    pub order_type: OrderType,
    pub lmt_price: Option<Decimal>,
    pub tif: Option<String>,
}

impl Order {
    pub fn market(contract: Contract, action: Action, total_qty: Decimal) -> Self {
        Self {
            contract,
            action,
            total_qty,
            order_type: OrderType::Market,
            lmt_price: None,
            tif: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum OrderStatusKind {
    #[strum(serialize = "PendingSubmit")]
    PendingSubmit,
    #[strum(serialize = "Submitted")]
    Submitted,
    #[strum(serialize = "Filled")]
    Filled,
    #[strum(serialize = "Cancelled")]
    Cancelled,
    #[strum(serialize = "Inactive")]
    Inactive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderStatusUpdate {
    pub order_id: OrderId,
    pub status: OrderStatusKind,
    pub filled: Decimal,
    pub remaining: Decimal,
    pub avg_fill_price: Decimal,
}
