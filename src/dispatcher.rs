//! Async Dispatcher Loop.
//!
//! Single cooperative task owning the incoming channel. Classifies each
//! [`Message`] into one of four classes and applies that class's routing
//! policy. Runs until the incoming channel closes (disconnect) or is
//! cancelled.
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, instrument};

use crate::{bridge::BridgeState,
            ids::{IdAllocator, NEWS_PROVIDERS_REQ_ID},
            message::Message,
            registry::{Registry, RequestKind, ResponseData},
            streaming::FanOut};

pub struct Dispatcher {
    pub registry: Arc<Registry>,
    pub fan_out: Arc<FanOut>,
    pub ids: Arc<IdAllocator>,
    pub state: watch::Sender<BridgeState>,
}

impl Dispatcher {
    #[instrument(skip_all)]
    pub async fn run(self, mut incoming: mpsc::Receiver<Message>) {
        while let Some(message) = incoming.recv().await {
            self.dispatch(message).await;
        }
        debug!("incoming channel closed, dispatcher loop exiting");
    }

    async fn dispatch(&self, message: Message) {
        match message {
            // System class.
            Message::NextValidId { order_id } => {
                self.ids.seed_order_id(order_id);
                let _ = self.state.send(BridgeState::Operational);
            },
            Message::ConnectionAck => {
                // Connection established; OPERATIONAL is set once NEXT_VALID_ID arrives.
            },
            Message::ConnectionClosed => {
                let _ = self.state.send(BridgeState::Disconnected);
                self.registry.fail_all_disconnected();
            },

            // Reserved-id class.
            Message::NewsProviders(providers) => {
                if let Some((_id, _ctx)) = self.registry.pop_by_type(RequestKind::NewsProviders) {
                    self.registry.complete(NEWS_PROVIDERS_REQ_ID, ResponseData::NewsProviders(providers));
                } else {
                    debug!("news providers arrived with no outstanding request");
                }
            },

            // Completion class: errors with a known request id fail that request;
            // errors without one are logged only (already filtered for
            // informational codes by the router).
            Message::Error { req_id: Some(req_id), code, message } => {
                error!(req_id, code, message = %message, "broker error for pending request");
                self.registry.fail(req_id, crate::error::BridgeError::BrokerError { code, message });
            },
            Message::Error { req_id: None, code, message } => {
                error!(code, message = %message, "broker error with no associated request");
            },
            Message::HistoricalDataBar { req_id, bar } => {
                self.registry.append_bar(req_id, bar);
            },
            Message::HistoricalDataEnd { req_id } => {
                self.registry.complete_with_aggregator(req_id);
            },
            Message::AccountSummary { req_id, row } => {
                self.registry.append_account_row(req_id, row);
            },
            Message::AccountSummaryEnd { req_id } => {
                self.registry.complete_with_aggregator(req_id);
            },
            Message::TickSnapshotEnd { req_id } => {
                self.registry.complete_with_aggregator(req_id);
            },

            // Streaming class. TICK_PRICE/TICK_SIZE also feed an in-flight market
            // snapshot aggregator when one is registered for this req_id; once that
            // request completes (TICK_SNAPSHOT_END above) they are pure streaming.
            Message::NewsTick { req_id, time, provider_code, article_id, headline } => {
                self.fan_out
                    .forward(req_id, Message::NewsTick { req_id, time, provider_code, article_id, headline })
                    .await;
            },
            Message::TickPrice { req_id, tick_type, price } => {
                self.registry.apply_snapshot_tick(req_id, |snap| match tick_type {
                    crate::message::TickType::LastPrice => snap.last_price = Some(price),
                    crate::message::TickType::BidPrice => snap.bid_price = Some(price),
                    crate::message::TickType::AskPrice => snap.ask_price = Some(price),
                    _ => {},
                });
                self.fan_out.forward(req_id, Message::TickPrice { req_id, tick_type, price }).await;
            },
            Message::TickSize { req_id, tick_type, size } => {
                self.registry.apply_snapshot_tick(req_id, |snap| {
                    if tick_type == crate::message::TickType::LastSize {
                        snap.last_size = Some(size);
                    }
                });
                self.fan_out.forward(req_id, Message::TickSize { req_id, tick_type, size }).await;
            },
            Message::OrderStatus(update) => {
                let req_id = update.order_id;
                self.fan_out.forward(req_id, Message::OrderStatus(update)).await;
            },

            // Carried for 1:1 callback mapping completeness; no façade
            // operation streams these back out.
            Message::OpenOrder { .. } | Message::Position { .. } | Message::PositionEnd => {
                debug!("position/open-order bookkeeping message received");
            },
        }
    }
}
