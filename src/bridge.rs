//! Bridge Façade: the public entry point higher-level services call
//! into. Owns the state machine, the pending-request registry, the fan-out,
//! the identifier allocators, and the dispatcher task.
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, instrument};

use crate::{bars::{Bar, BarSize, DateFormat, Duration as HistDuration, UseRth, WhatToShow},
            config::Config,
            contract::Contract,
            dispatcher::Dispatcher,
            error::{BridgeError, Result},
            ids::{IdAllocator, NEWS_PROVIDERS_REQ_ID},
            order::{Action, Order},
            registry::{RequestContext, RequestKind, ResponseAggregator, ResponseData, Registry, SnapshotAccumulator},
            sdk::BrokerSdk,
            streaming::{FanOut, Subscription},
            ClientId,
            OrderId,
            RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Operational,
}

pub struct Bridge {
    sdk: Arc<dyn BrokerSdk>,
    registry: Arc<Registry>,
    fan_out: Arc<FanOut>,
    ids: Arc<IdAllocator>,
    state_tx: watch::Sender<BridgeState>,
    state_rx: watch::Receiver<BridgeState>,
    config: Config,
    dispatcher_handle: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    sweeper_handle: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Bridge {
    pub fn new(sdk: Arc<dyn BrokerSdk>, config: Config) -> Arc<Self> {
        let (state_tx, state_rx) = watch::channel(BridgeState::Disconnected);
        Arc::new(Self {
            sdk,
            registry: Arc::new(Registry::new()),
            fan_out: Arc::new(FanOut::new()),
            ids: Arc::new(IdAllocator::new()),
            state_tx,
            state_rx,
            config,
            dispatcher_handle: std::sync::Mutex::new(None),
            sweeper_handle: std::sync::Mutex::new(None),
        })
    }

    pub fn state(&self) -> BridgeState {
        *self.state_rx.borrow()
    }

    /// Resolves once `NEXT_VALID_ID` has been observed and the bridge has
    /// transitioned to `OPERATIONAL`.
    #[instrument(skip(self))]
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        if self.state() != BridgeState::Disconnected {
            return Err(BridgeError::AlreadyConnected);
        }
        let _ = self.state_tx.send(BridgeState::Connecting);

        let (incoming_tx, incoming_rx) = mpsc::channel(self.config.streaming.channel_depth);
        let router = crate::router::EventRouter::new(incoming_tx);

        let dispatcher = Dispatcher {
            registry: self.registry.clone(),
            fan_out: self.fan_out.clone(),
            ids: self.ids.clone(),
            state: self.state_tx.clone(),
        };
        let dispatcher_handle = tokio::spawn(dispatcher.run(incoming_rx));
        *self.dispatcher_handle.lock().unwrap() = Some(dispatcher_handle);

        let registry = self.registry.clone();
        let sweep_interval = sweep_interval_for(self.config.request.default_timeout);
        let sweeper_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                registry.sweep_timeouts();
            }
        });
        *self.sweeper_handle.lock().unwrap() = Some(sweeper_handle);

        self.sdk.connect(&self.config.host, self.config.port, self.config.client_id)?;
        let sdk_for_pump = self.sdk.clone();
        std::thread::spawn(move || {
            sdk_for_pump.run_pump(Box::new(router));
        });

        let mut state_rx = self.state_rx.clone();
        let wait = state_rx.wait_for(|s| *s == BridgeState::Operational);
        match tokio::time::timeout(self.config.request.connect_timeout, wait).await {
            Ok(Ok(_)) => {
                info!("bridge operational");
                let _ = self.sdk.req_positions();
                Ok(())
            },
            Ok(Err(_)) => Err(BridgeError::ConnectionRefused),
            Err(_) => Err(BridgeError::Timeout),
        }
    }

    /// Disconnect proceeds in order: mark DISCONNECTED, cancel the
    /// dispatcher, instruct the SDK to disconnect, join the pump with a
    /// deadline, fail all pending registry entries. Idempotent.
    #[instrument(skip(self))]
    pub async fn disconnect(self: &Arc<Self>) {
        let _ = self.state_tx.send(BridgeState::Disconnected);
        if let Some(handle) = self.dispatcher_handle.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.sweeper_handle.lock().unwrap().take() {
            handle.abort();
        }
        let _ = self.sdk.disconnect();
        self.registry.fail_all_disconnected();
    }

    fn require_operational(&self) -> Result<()> {
        if self.state() != BridgeState::Operational {
            return Err(BridgeError::Disconnected);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn request_news_providers(self: &Arc<Self>) -> Result<Vec<crate::contract::NewsProvider>> {
        self.require_operational()?;
        let (tx, rx) = oneshot::channel();
        self.registry.insert(
            NEWS_PROVIDERS_REQ_ID,
            RequestContext::new(
                RequestKind::NewsProviders,
                ResponseAggregator::None,
                self.config.request.news_providers_timeout,
                tx,
            ),
        );
        self.sdk.req_news_providers()?;
        match self.await_with_timeout(NEWS_PROVIDERS_REQ_ID, rx, self.config.request.news_providers_timeout, |_, _| {}).await? {
            ResponseData::NewsProviders(providers) => Ok(providers),
            _ => Err(BridgeError::BadRequest("unexpected response shape".into())),
        }
    }

    #[instrument(skip(self))]
    pub async fn subscribe_news_feed(self: &Arc<Self>, provider_code: &str) -> Result<(RequestId, Subscription)> {
        self.require_operational()?;
        if !self.config.providers.iter().any(|p| p == provider_code) {
            return Err(BridgeError::InvalidProvider(provider_code.to_string()));
        }
        let req_id = self.ids.next_request_id();
        let subscription = self.fan_out.register(req_id, self.config.streaming.channel_depth);
        let contract = Contract::news_feed(provider_code);
        self.sdk.req_mkt_data(req_id, &contract, false)?;
        Ok((req_id, subscription))
    }

    pub fn cancel_subscription(&self, req_id: RequestId) {
        self.fan_out.unregister(req_id);
        let _ = self.sdk.cancel_mkt_data(req_id);
    }

    #[instrument(skip(self, contract))]
    #[allow(clippy::too_many_arguments)]
    pub async fn fetch_historical_data(
        self: &Arc<Self>,
        contract: &Contract,
        duration: HistDuration,
        bar_size: BarSize,
        what_to_show: WhatToShow,
        use_rth: UseRth,
    ) -> Result<Vec<Bar>> {
        self.require_operational()?;
        let req_id = self.ids.next_request_id();
        let (tx, rx) = oneshot::channel();
        self.registry.insert(
            req_id,
            RequestContext::new(
                RequestKind::HistoricalData,
                ResponseAggregator::Bars(Vec::new()),
                self.config.request.default_timeout,
                tx,
            ),
        );
        self.sdk.req_historical_data(req_id, contract, "", duration, bar_size, what_to_show, use_rth, DateFormat::YyyyMmDd)?;
        // No dedicated cancel-historical-data op exists on `BrokerSdk`; a
        // cancellation here only removes the registry entry.
        match self.await_with_timeout(req_id, rx, self.config.request.default_timeout, |_, _| {}).await? {
            ResponseData::Bars(bars) => Ok(bars),
            _ => Err(BridgeError::BadRequest("unexpected response shape".into())),
        }
    }

    #[instrument(skip(self, contract))]
    pub async fn request_market_snapshot(self: &Arc<Self>, contract: &Contract) -> Result<SnapshotAccumulator> {
        self.require_operational()?;
        let req_id = self.ids.next_request_id();
        let (tx, rx) = oneshot::channel();
        self.registry.insert(
            req_id,
            RequestContext::new(
                RequestKind::MarketSnapshot,
                ResponseAggregator::Snapshot(SnapshotAccumulator::default()),
                self.config.request.default_timeout,
                tx,
            ),
        );
        self.sdk.req_mkt_data(req_id, contract, true)?;
        match self.await_with_timeout(req_id, rx, self.config.request.default_timeout, |bridge, id| {
            let _ = bridge.sdk.cancel_mkt_data(id);
        }).await? {
            ResponseData::Snapshot(snap) => Ok(snap),
            _ => Err(BridgeError::BadRequest("unexpected response shape".into())),
        }
    }

    #[instrument(skip(self, contract))]
    pub async fn place_order(self: &Arc<Self>, contract: Contract, action: Action, qty: Decimal) -> Result<OrderId> {
        self.require_operational()?;
        let order_id = self.ids.next_order_id()?;
        let order = Order::market(contract, action, qty);
        self.sdk.place_order(order_id, &order).map_err(|e| match e {
            BridgeError::BadRequest(msg) => BridgeError::Rejected(msg),
            other => other,
        })?;
        Ok(order_id)
    }

    #[instrument(skip(self))]
    pub async fn request_account_summary(self: &Arc<Self>, group: &str, tags: &str) -> Result<Vec<crate::account::AccountValue>> {
        self.require_operational()?;
        let req_id = self.ids.next_request_id();
        let (tx, rx) = oneshot::channel();
        self.registry.insert(
            req_id,
            RequestContext::new(
                RequestKind::AccountSummary,
                ResponseAggregator::AccountRows(Vec::new()),
                self.config.request.default_timeout,
                tx,
            ),
        );
        self.sdk.req_account_summary(req_id, group, tags)?;
        match self.await_with_timeout(req_id, rx, self.config.request.default_timeout, |bridge, id| {
            let _ = bridge.sdk.cancel_account_summary(id);
        }).await? {
            ResponseData::AccountRows(rows) => Ok(rows),
            _ => Err(BridgeError::BadRequest("unexpected response shape".into())),
        }
    }

    /// Awaits a registry completion, applying a hard timeout on top of the
    /// registry's own deadline-based sweep. If the returned future is itself
    /// dropped before this resolves (the caller cancels the façade call
    /// upstream), `guard`'s drop removes the `RequestContext` immediately
    /// instead of leaving it for the sweeper, and runs `on_cancel` as a
    /// best-effort notice to the SDK.
    async fn await_with_timeout<F>(&self, req_id: RequestId, rx: oneshot::Receiver<Result<ResponseData>>, timeout: std::time::Duration, on_cancel: F) -> Result<ResponseData>
    where
        F: FnOnce(&Bridge, RequestId),
    {
        let mut guard = RequestGuard::new(self, req_id, on_cancel);
        let outcome = tokio::time::timeout(timeout, rx).await;
        guard.disarm();
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::Cancelled),
            Err(_) => Err(BridgeError::Timeout),
        }
    }
}

/// Cleans up a registry entry if the request is abandoned before
/// `await_with_timeout` reaches its own match statement, i.e. if the
/// surrounding façade future is dropped by its caller. Disarmed once that
/// await resolves on its own, since the registry already removes completed
/// or failed contexts itself.
struct RequestGuard<'a, F: FnOnce(&Bridge, RequestId)> {
    bridge: &'a Bridge,
    req_id: RequestId,
    on_cancel: Option<F>,
    armed: bool,
}

impl<'a, F: FnOnce(&Bridge, RequestId)> RequestGuard<'a, F> {
    fn new(bridge: &'a Bridge, req_id: RequestId, on_cancel: F) -> Self {
        Self { bridge, req_id, on_cancel: Some(on_cancel), armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<'a, F: FnOnce(&Bridge, RequestId)> Drop for RequestGuard<'a, F> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.bridge.registry.remove(self.req_id).is_some() {
            if let Some(on_cancel) = self.on_cancel.take() {
                on_cancel(self.bridge, self.req_id);
            }
        }
    }
}

/// Sweep cadence: at least 1 Hz, scaled down for short test
/// timeouts so a 200ms deadline still sweeps promptly.
fn sweep_interval_for(default_timeout: std::time::Duration) -> std::time::Duration {
    (default_timeout / 4).clamp(std::time::Duration::from_millis(250), std::time::Duration::from_secs(1))
}
