//! Incoming event router.
//!
//! Owns only the send half of the incoming channel and implements
//! [`BrokerCallbacks`] by composition rather than subclassing, fanning
//! callbacks out to a channel the way a handler fans socket frames out to
//! tracker channels. Every method is synchronous and non-blocking:
//! `try_send`, downgrading to drop-and-log for the streaming message types
//! when the channel is full.
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{account::AccountValue,
            bars::Bar,
            contract::{Contract, NewsProvider},
            message::{Message, TickType},
            order::{Order, OrderStatusUpdate},
            sdk::{BrokerCallbacks, INFORMATIONAL_ERROR_CODES},
            AccountCode,
            OrderId,
            RequestId};

pub struct EventRouter {
    tx: mpsc::Sender<Message>,
    // The callbacks run on the SDK's own OS thread (see `BrokerSdk::run_pump`),
    // which has no ambient Tokio context of its own; a bare `tokio::spawn`
    // there panics. Captured once at construction, from inside the async task
    // that builds the router, and used for the retry spawn below instead.
    handle: tokio::runtime::Handle,
}

impl EventRouter {
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self { tx, handle: tokio::runtime::Handle::current() }
    }

    fn send(&self, message: Message) {
        match self.tx.try_send(message) {
            Ok(()) => {},
            Err(mpsc::error::TrySendError::Full(message)) => {
                if message.is_droppable_under_backpressure() {
                    warn!(?message, "incoming channel full, dropping streaming message");
                } else {
                    // Never-drop classes (order status, aggregation terminators) block
                    // briefly rather than lose data; the dispatcher drains quickly enough
                    // in practice that this should be rare.
                    let tx = self.tx.clone();
                    self.handle.spawn(async move {
                        if tx.send(message).await.is_err() {
                            warn!("incoming channel closed while delivering critical message");
                        }
                    });
                }
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("incoming channel closed, dropping message");
            },
        }
    }

    fn tick_type_from_code(code: i32) -> TickType {
        match code {
            4 => TickType::LastPrice,
            5 => TickType::LastSize,
            1 => TickType::BidPrice,
            2 => TickType::AskPrice,
            other => TickType::Other(other),
        }
    }
}

impl BrokerCallbacks for EventRouter {
    fn connect_ack(&mut self) {
        self.send(Message::ConnectionAck);
    }

    fn next_valid_id(&mut self, order_id: OrderId) {
        self.send(Message::NextValidId { order_id });
    }

    fn error(&mut self, req_id: Option<RequestId>, code: i32, message: String) {
        if INFORMATIONAL_ERROR_CODES.contains(&code) {
            debug!(code, message = %message, "informational broker notice");
            return;
        }
        self.send(Message::Error { req_id, code, message });
    }

    fn news_providers(&mut self, providers: Vec<NewsProvider>) {
        self.send(Message::NewsProviders(providers));
    }

    fn tick_news(
        &mut self,
        req_id: RequestId,
        time: chrono::DateTime<chrono::Utc>,
        provider_code: String,
        article_id: String,
        headline: String,
    ) {
        self.send(Message::NewsTick {
            req_id,
            time,
            provider_code,
            article_id,
            headline,
        });
    }

    fn tick_price(&mut self, req_id: RequestId, tick_type: i32, price: f64) {
        self.send(Message::TickPrice {
            req_id,
            tick_type: Self::tick_type_from_code(tick_type),
            price,
        });
    }

    fn tick_size(&mut self, req_id: RequestId, tick_type: i32, size: f64) {
        self.send(Message::TickSize {
            req_id,
            tick_type: Self::tick_type_from_code(tick_type),
            size,
        });
    }

    fn tick_snapshot_end(&mut self, req_id: RequestId) {
        self.send(Message::TickSnapshotEnd { req_id });
    }

    fn historical_data(&mut self, req_id: RequestId, bar: Bar) {
        self.send(Message::HistoricalDataBar { req_id, bar });
    }

    fn historical_data_end(&mut self, req_id: RequestId) {
        self.send(Message::HistoricalDataEnd { req_id });
    }

    fn order_status(&mut self, update: OrderStatusUpdate) {
        self.send(Message::OrderStatus(update));
    }

    fn open_order(&mut self, order_id: OrderId, contract: Contract, order: Order) {
        self.send(Message::OpenOrder { order_id, contract, order });
    }

    fn position(&mut self, account: AccountCode, contract: Contract, position: rust_decimal::Decimal, avg_cost: rust_decimal::Decimal) {
        self.send(Message::Position { account, contract, position, avg_cost });
    }

    fn position_end(&mut self) {
        self.send(Message::PositionEnd);
    }

    fn account_summary(&mut self, req_id: RequestId, row: AccountValue) {
        self.send(Message::AccountSummary { req_id, row });
    }

    fn account_summary_end(&mut self, req_id: RequestId) {
        self.send(Message::AccountSummaryEnd { req_id });
    }

    fn connection_closed(&mut self) {
        self.send(Message::ConnectionClosed);
    }
}
