//! The broker SDK boundary.
//!
//! The vendor SDK itself is out of scope: it is specified here only as the
//! pair of traits the rest of this crate is built against. `BrokerCallbacks`
//! is the inbound surface the SDK drives from its own thread, handing
//! callbacks off to a handler the way a socket reader fans frames out to
//! tracker channels; `BrokerSdk` is the outbound surface the façade calls
//! into directly, with no private outgoing channel to the pump thread.
use chrono::{DateTime, Utc};

use crate::{bars::{BarSize, DateFormat, Duration, UseRth, WhatToShow},
            contract::Contract,
            order::Order,
            error::Result,
            OrderId,
            RequestId};

/// Error codes the broker uses for benign, informational conditions (market
/// data farm connection notices and the like). The dispatcher treats these
/// as log-only, never as a failure of a pending request.
pub const INFORMATIONAL_ERROR_CODES: [i32; 14] = [
    2100, 2103, 2104, 2105, 2106, 2107, 2108, 2119, 2150, 2157, 2158, 2168, 2169, 2170,
];

/// Inbound callback surface. The SDK invokes these synchronously from its own
/// pump thread; implementations (the Incoming Event Router) must never block.
pub trait BrokerCallbacks: Send {
    fn connect_ack(&mut self);
    fn next_valid_id(&mut self, order_id: OrderId);
    fn error(&mut self, req_id: Option<RequestId>, code: i32, message: String);
    fn news_providers(&mut self, providers: Vec<crate::contract::NewsProvider>);
    fn tick_news(
        &mut self,
        req_id: RequestId,
        time: DateTime<Utc>,
        provider_code: String,
        article_id: String,
        headline: String,
    );
    fn tick_price(&mut self, req_id: RequestId, tick_type: i32, price: f64);
    fn tick_size(&mut self, req_id: RequestId, tick_type: i32, size: f64);
    fn tick_snapshot_end(&mut self, req_id: RequestId);
    fn historical_data(&mut self, req_id: RequestId, bar: crate::bars::Bar);
    fn historical_data_end(&mut self, req_id: RequestId);
    fn order_status(&mut self, update: crate::order::OrderStatusUpdate);
    fn open_order(&mut self, order_id: OrderId, contract: Contract, order: Order);
    fn position(
        &mut self,
        account: crate::AccountCode,
        contract: Contract,
        position: rust_decimal::Decimal,
        avg_cost: rust_decimal::Decimal,
    );
    fn position_end(&mut self);
    fn account_summary(&mut self, req_id: RequestId, row: crate::account::AccountValue);
    fn account_summary_end(&mut self, req_id: RequestId);
    fn connection_closed(&mut self);
}

/// Outbound operations the façade issues against the broker connection.
/// Mirrors `IBClient` / `EClient`: every method is a thin, synchronous
/// request; responses arrive later through `BrokerCallbacks`.
pub trait BrokerSdk: Send + Sync {
    fn connect(&self, host: &str, port: u16, client_id: crate::ClientId) -> Result<()>;
    fn disconnect(&self) -> Result<()>;
    fn req_news_providers(&self) -> Result<()>;
    fn req_mkt_data(&self, req_id: RequestId, contract: &Contract, snapshot: bool) -> Result<()>;
    fn cancel_mkt_data(&self, req_id: RequestId) -> Result<()>;
    #[allow(clippy::too_many_arguments)]
    fn req_historical_data(
        &self,
        req_id: RequestId,
        contract: &Contract,
        end_date_time: &str,
        duration: Duration,
        bar_size: BarSize,
        what_to_show: WhatToShow,
        use_rth: UseRth,
        format_date: DateFormat,
    ) -> Result<()>;
    fn place_order(&self, order_id: OrderId, order: &Order) -> Result<()>;
    fn cancel_order(&self, order_id: OrderId) -> Result<()>;
    /// Hydrates currently-open positions at connect time; not exposed as a
    /// separate façade entry (position bookkeeping lives behind `TradeStore`).
    fn req_positions(&self) -> Result<()>;
    fn req_account_summary(&self, req_id: RequestId, group: &str, tags: &str) -> Result<()>;
    fn cancel_account_summary(&self, req_id: RequestId) -> Result<()>;
    /// Runs the SDK's own callback pump. Spawned onto a dedicated OS thread;
    /// blocks until the connection drops or is torn down.
    fn run_pump(self: std::sync::Arc<Self>, callbacks: Box<dyn BrokerCallbacks>);
}

/// A scripted [`BrokerSdk`] test double, driving the end-to-end
/// scenarios without a live broker connection.
pub mod mock {
    use std::sync::{Condvar, Mutex};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedCall {
        Connect,
        Disconnect,
        ReqNewsProviders,
        ReqMktData { req_id: RequestId, snapshot: bool },
        CancelMktData { req_id: RequestId },
        ReqHistoricalData { req_id: RequestId },
        PlaceOrder { order_id: OrderId },
        CancelOrder { order_id: OrderId },
        ReqPositions,
        ReqAccountSummary { req_id: RequestId },
        CancelAccountSummary { req_id: RequestId },
    }

    struct State {
        callbacks: Option<Box<dyn BrokerCallbacks>>,
        shutdown: bool,
    }

    /// Implements [`BrokerSdk`] by recording every outbound call and exposing
    /// [`ScriptedSdk::inject`] so a test can drive the stored callbacks
    /// directly, standing in for the broker delivering a reply.
    pub struct ScriptedSdk {
        state: Mutex<State>,
        ready: Condvar,
        pub calls: Mutex<Vec<RecordedCall>>,
    }

    impl Default for ScriptedSdk {
        fn default() -> Self {
            Self {
                state: Mutex::new(State { callbacks: None, shutdown: false }),
                ready: Condvar::new(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ScriptedSdk {
        pub fn new() -> std::sync::Arc<Self> {
            std::sync::Arc::new(Self::default())
        }

        /// Blocks the calling thread until `run_pump` has stored its
        /// callbacks handle, then invokes `f` against it. Intended for use
        /// from a `#[tokio::test(flavor = "multi_thread")]` test body.
        pub fn inject(&self, f: impl FnOnce(&mut dyn BrokerCallbacks)) {
            let guard = self.state.lock().unwrap();
            let mut guard = self.ready.wait_while(guard, |s| s.callbacks.is_none()).unwrap();
            if let Some(cb) = guard.callbacks.as_deref_mut() {
                f(cb);
            }
        }

        fn record(&self, call: RecordedCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl BrokerSdk for ScriptedSdk {
        fn connect(&self, _host: &str, _port: u16, _client_id: crate::ClientId) -> Result<()> {
            self.record(RecordedCall::Connect);
            Ok(())
        }

        fn disconnect(&self) -> Result<()> {
            self.record(RecordedCall::Disconnect);
            let mut guard = self.state.lock().unwrap();
            guard.shutdown = true;
            self.ready.notify_all();
            Ok(())
        }

        fn req_news_providers(&self) -> Result<()> {
            self.record(RecordedCall::ReqNewsProviders);
            Ok(())
        }

        fn req_mkt_data(&self, req_id: RequestId, _contract: &Contract, snapshot: bool) -> Result<()> {
            self.record(RecordedCall::ReqMktData { req_id, snapshot });
            Ok(())
        }

        fn cancel_mkt_data(&self, req_id: RequestId) -> Result<()> {
            self.record(RecordedCall::CancelMktData { req_id });
            Ok(())
        }

        fn req_historical_data(
            &self,
            req_id: RequestId,
            _contract: &Contract,
            _end_date_time: &str,
            _duration: Duration,
            _bar_size: BarSize,
            _what_to_show: WhatToShow,
            _use_rth: UseRth,
            _format_date: DateFormat,
        ) -> Result<()> {
            self.record(RecordedCall::ReqHistoricalData { req_id });
            Ok(())
        }

        fn place_order(&self, order_id: OrderId, _order: &Order) -> Result<()> {
            self.record(RecordedCall::PlaceOrder { order_id });
            Ok(())
        }

        fn cancel_order(&self, order_id: OrderId) -> Result<()> {
            self.record(RecordedCall::CancelOrder { order_id });
            Ok(())
        }

        fn req_positions(&self) -> Result<()> {
            self.record(RecordedCall::ReqPositions);
            Ok(())
        }

        fn req_account_summary(&self, req_id: RequestId, _group: &str, _tags: &str) -> Result<()> {
            self.record(RecordedCall::ReqAccountSummary { req_id });
            Ok(())
        }

        fn cancel_account_summary(&self, req_id: RequestId) -> Result<()> {
            self.record(RecordedCall::CancelAccountSummary { req_id });
            Ok(())
        }

        fn run_pump(self: std::sync::Arc<Self>, callbacks: Box<dyn BrokerCallbacks>) {
            {
                let mut guard = self.state.lock().unwrap();
                guard.callbacks = Some(callbacks);
            }
            self.ready.notify_all();
            let guard = self.state.lock().unwrap();
            let _unused = self.ready.wait_while(guard, |s| !s.shutdown).unwrap();
        }
    }
}
