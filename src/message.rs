//! The `Message` data model produced by the incoming event router and
//! consumed exclusively by the async dispatcher loop.
//!
//! Modeled as a genuine closed Rust `enum` with one typed variant per SDK
//! callback instead of a string-keyed payload map: the router can only ever
//! construct a value the dispatcher already knows how to route, and `rustc`
//! rejects an unhandled variant at compile time.
use chrono::{DateTime, Utc};

use rust_decimal::Decimal;

use crate::{account::AccountValue,
            bars::Bar,
            contract::{Contract, NewsProvider},
            order::{Order, OrderStatusUpdate},
            AccountCode,
            OrderId,
            RequestId};

/// Tick types carried by `TICK_PRICE` / `TICK_SIZE` (a small, relevant subset
/// of the broker's full generic tick type table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickType {
    LastPrice,
    LastSize,
    BidPrice,
    AskPrice,
    Other(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    NextValidId {
        order_id: OrderId,
    },
    /// `req_id` is `None` for errors the SDK could not attribute to any
    /// specific request.
    Error {
        req_id: Option<RequestId>,
        code: i32,
        message: String,
    },
    NewsProviders(Vec<NewsProvider>),
    NewsTick {
        req_id: RequestId,
        time: DateTime<Utc>,
        provider_code: String,
        article_id: String,
        headline: String,
    },
    TickPrice {
        req_id: RequestId,
        tick_type: TickType,
        price: f64,
    },
    TickSize {
        req_id: RequestId,
        tick_type: TickType,
        size: f64,
    },
    TickSnapshotEnd {
        req_id: RequestId,
    },
    HistoricalDataBar {
        req_id: RequestId,
        bar: Bar,
    },
    HistoricalDataEnd {
        req_id: RequestId,
    },
    OrderStatus(OrderStatusUpdate),
    /// `openOrder`; carried for completeness of the 1:1 callback mapping
    /// even though no façade operation streams it back out.
    OpenOrder {
        order_id: OrderId,
        contract: Contract,
        order: Order,
    },
    Position {
        account: AccountCode,
        contract: Contract,
        position: Decimal,
        avg_cost: Decimal,
    },
    PositionEnd,
    AccountSummary {
        req_id: RequestId,
        row: AccountValue,
    },
    AccountSummaryEnd {
        req_id: RequestId,
    },
    ConnectionAck,
    ConnectionClosed,
}

impl Message {
    /// The request id this message carries, when it carries one at all.
    /// Reserved-id and system messages return `None`.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Message::Error { req_id, .. } => *req_id,
            Message::NewsTick { req_id, .. }
            | Message::TickPrice { req_id, .. }
            | Message::TickSize { req_id, .. }
            | Message::TickSnapshotEnd { req_id }
            | Message::HistoricalDataBar { req_id, .. }
            | Message::HistoricalDataEnd { req_id }
            | Message::AccountSummary { req_id, .. }
            | Message::AccountSummaryEnd { req_id } => Some(*req_id),
            Message::OrderStatus(update) => Some(update.order_id),
            Message::NextValidId { .. }
            | Message::NewsProviders(_)
            | Message::OpenOrder { .. }
            | Message::Position { .. }
            | Message::PositionEnd
            | Message::ConnectionAck
            | Message::ConnectionClosed => None,
        }
    }

    /// Whether this variant carries data that is safe to drop under
    /// backpressure on the incoming channel: streaming ticks and news,
    /// never order status, never the terminal markers of an in-flight
    /// aggregation.
    pub fn is_droppable_under_backpressure(&self) -> bool {
        matches!(
            self,
            Message::TickPrice { .. } | Message::TickSize { .. } | Message::NewsTick { .. }
        )
    }
}
