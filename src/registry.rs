//! Pending-Request Registry.
//!
//! An in-memory mapping from [`RequestId`] to [`RequestContext`], serialized
//! through a single `Mutex` (short critical sections only: insert,
//! lookup, mutate-aggregator, remove). Owned exclusively by the cooperative
//! domain; the SDK pump never touches it.
use std::{collections::HashMap,
          sync::Mutex,
          time::{Duration, Instant}};

use tokio::sync::oneshot;

use crate::{account::AccountValue,
            bars::Bar,
            contract::NewsProvider,
            error::{BridgeError, Result},
            RequestId};

/// Distinguishes reqId-less responses looked up by [`Registry::pop_by_type`]
/// from the ordinary by-id lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    NewsProviders,
    HistoricalData,
    AccountSummary,
    MarketSnapshot,
}

/// What a completed request resolves its caller with.
#[derive(Debug, PartialEq)]
pub enum ResponseData {
    None,
    NewsProviders(Vec<NewsProvider>),
    Bars(Vec<Bar>),
    AccountRows(Vec<AccountValue>),
    Snapshot(SnapshotAccumulator),
    OrderAck,
}

/// Accumulates `TICK_PRICE`/`TICK_SIZE` updates for a market snapshot request
/// until `TICK_SNAPSHOT_END` arrives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotAccumulator {
    pub last_price: Option<f64>,
    pub bid_price: Option<f64>,
    pub ask_price: Option<f64>,
    pub last_size: Option<f64>,
}

/// The in-flight aggregation state of a [`RequestContext`], one variant per
/// request kind.
#[derive(Debug)]
pub enum ResponseAggregator {
    None,
    Bars(Vec<Bar>),
    AccountRows(Vec<AccountValue>),
    Snapshot(SnapshotAccumulator),
}

impl ResponseAggregator {
    fn into_response(self) -> ResponseData {
        match self {
            ResponseAggregator::None => ResponseData::None,
            ResponseAggregator::Bars(bars) => ResponseData::Bars(bars),
            ResponseAggregator::AccountRows(rows) => ResponseData::AccountRows(rows),
            ResponseAggregator::Snapshot(snap) => ResponseData::Snapshot(snap),
        }
    }
}

#[derive(Debug)]
pub struct RequestContext {
    pub kind: RequestKind,
    pub aggregator: ResponseAggregator,
    pub deadline: Instant,
    completion: Option<oneshot::Sender<Result<ResponseData>>>,
}

impl RequestContext {
    pub fn new(
        kind: RequestKind,
        aggregator: ResponseAggregator,
        timeout: Duration,
        completion: oneshot::Sender<Result<ResponseData>>,
    ) -> Self {
        Self {
            kind,
            aggregator,
            deadline: Instant::now() + timeout,
            completion: Some(completion),
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    contexts: Mutex<HashMap<RequestId, RequestContext>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a context before the corresponding SDK call is issued, per the
    /// ordering invariant.
    pub fn insert(&self, req_id: RequestId, ctx: RequestContext) {
        self.contexts.lock().unwrap().insert(req_id, ctx);
    }

    /// Appends to a still-open aggregating context without completing it.
    pub fn append_bar(&self, req_id: RequestId, bar: Bar) {
        let mut guard = self.contexts.lock().unwrap();
        if let Some(ctx) = guard.get_mut(&req_id) {
            if let ResponseAggregator::Bars(bars) = &mut ctx.aggregator {
                bars.push(bar);
            }
        }
    }

    pub fn append_account_row(&self, req_id: RequestId, row: AccountValue) {
        let mut guard = self.contexts.lock().unwrap();
        if let Some(ctx) = guard.get_mut(&req_id) {
            if let ResponseAggregator::AccountRows(rows) = &mut ctx.aggregator {
                rows.push(row);
            }
        }
    }

    pub fn apply_snapshot_tick(&self, req_id: RequestId, f: impl FnOnce(&mut SnapshotAccumulator)) {
        let mut guard = self.contexts.lock().unwrap();
        if let Some(ctx) = guard.get_mut(&req_id) {
            if let ResponseAggregator::Snapshot(snap) = &mut ctx.aggregator {
                f(snap);
            }
        }
    }

    /// Completes a by-id context, consuming its current aggregator state (or
    /// an explicitly supplied terminal value) as the result.
    pub fn complete(&self, req_id: RequestId, result: ResponseData) {
        let ctx = self.contexts.lock().unwrap().remove(&req_id);
        if let Some(mut ctx) = ctx {
            if let Some(tx) = ctx.completion.take() {
                let _ = tx.send(Ok(result));
            }
        }
    }

    /// Completes a by-id context with its accumulated aggregator.
    pub fn complete_with_aggregator(&self, req_id: RequestId) {
        let ctx = self.contexts.lock().unwrap().remove(&req_id);
        if let Some(mut ctx) = ctx {
            if let Some(tx) = ctx.completion.take() {
                let _ = tx.send(Ok(ctx.aggregator.into_response()));
            }
        }
    }

    pub fn fail(&self, req_id: RequestId, error: BridgeError) {
        let ctx = self.contexts.lock().unwrap().remove(&req_id);
        if let Some(mut ctx) = ctx {
            if let Some(tx) = ctx.completion.take() {
                let _ = tx.send(Err(error));
            }
        }
    }

    /// Finds and removes the outstanding context matching `kind`, for
    /// reqId-less responses. There is at most one
    /// outstanding request per reqId-less kind at a time.
    pub fn pop_by_type(&self, kind: RequestKind) -> Option<(RequestId, RequestContext)> {
        let mut guard = self.contexts.lock().unwrap();
        let id = guard
            .iter()
            .find(|(_, ctx)| ctx.kind == kind)
            .map(|(id, _)| *id)?;
        guard.remove(&id).map(|ctx| (id, ctx))
    }

    pub fn lookup_kind(&self, req_id: RequestId) -> Option<RequestKind> {
        self.contexts.lock().unwrap().get(&req_id).map(|ctx| ctx.kind)
    }

    pub fn remove(&self, req_id: RequestId) -> Option<RequestContext> {
        self.contexts.lock().unwrap().remove(&req_id)
    }

    /// Sweeps contexts past their deadline, failing each with `Timeout`.
    /// Invoked periodically by the sweeper task owned by `Bridge::connect`.
    pub fn sweep_timeouts(&self) {
        let now = Instant::now();
        let expired: Vec<RequestId> = {
            let guard = self.contexts.lock().unwrap();
            guard
                .iter()
                .filter(|(_, ctx)| ctx.deadline <= now)
                .map(|(id, _)| *id)
                .collect()
        };
        for id in expired {
            self.fail(id, BridgeError::Timeout);
        }
    }

    /// Fails every still-pending context with `Disconnected` (shutdown).
    pub fn fail_all_disconnected(&self) {
        let mut guard = self.contexts.lock().unwrap();
        for (_, mut ctx) in guard.drain() {
            if let Some(tx) = ctx.completion.take() {
                let _ = tx.send(Err(BridgeError::Disconnected));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_single_shot_request() {
        let registry = Registry::new();
        let (tx, rx) = oneshot::channel();
        registry.insert(
            1,
            RequestContext::new(RequestKind::AccountSummary, ResponseAggregator::None, Duration::from_secs(5), tx),
        );
        registry.complete(1, ResponseData::OrderAck);
        assert!(matches!(rx.await.unwrap(), Ok(ResponseData::OrderAck)));
    }

    #[tokio::test]
    async fn aggregates_bars_until_terminator() {
        let registry = Registry::new();
        let (tx, rx) = oneshot::channel();
        registry.insert(
            2,
            RequestContext::new(RequestKind::HistoricalData, ResponseAggregator::Bars(Vec::new()), Duration::from_secs(5), tx),
        );
        let bar = Bar {
            t_stamp: chrono::Utc::now(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 100.0,
        };
        registry.append_bar(2, bar);
        registry.append_bar(2, bar);
        registry.complete_with_aggregator(2);
        match rx.await.unwrap() {
            Ok(ResponseData::Bars(bars)) => assert_eq!(bars.len(), 2),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sweeper_times_out_expired_context() {
        let registry = Registry::new();
        let (tx, rx) = oneshot::channel();
        registry.insert(
            3,
            RequestContext::new(RequestKind::AccountSummary, ResponseAggregator::None, Duration::from_millis(1), tx),
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.sweep_timeouts();
        assert_eq!(rx.await.unwrap(), Err(BridgeError::Timeout));
    }

    #[test]
    fn pop_by_type_finds_reserved_id_request() {
        let registry = Registry::new();
        let (tx, _rx) = oneshot::channel();
        registry.insert(
            crate::ids::NEWS_PROVIDERS_REQ_ID,
            RequestContext::new(RequestKind::NewsProviders, ResponseAggregator::None, Duration::from_secs(5), tx),
        );
        let (id, _ctx) = registry.pop_by_type(RequestKind::NewsProviders).unwrap();
        assert_eq!(id, crate::ids::NEWS_PROVIDERS_REQ_ID);
        assert!(registry.pop_by_type(RequestKind::NewsProviders).is_none());
    }
}
