//! Detection engine worker pool: evaluates a shock predicate against
//! incoming tickers and emits trade signals on a hit.
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{bars::{BarSize, Duration as HistDuration, UseRth, WhatToShow},
            bridge::Bridge,
            contract::Contract,
            error::BridgeError,
            news::TickerEvent,
            order::Action};

#[derive(Debug, Clone, PartialEq)]
pub struct TradeSignal {
    pub symbol: String,
    pub side: Action,
    pub indicative_price: Decimal,
    pub timestamp: chrono::DateTime<Utc>,
}

/// The price-and-volume shock predicate is an external indicator
/// collaborator; only its call-site contract is in scope. Any
/// predicate just needs the closing window of bars plus the latest
/// real-time price/size.
pub trait ShockPredicate: Send + Sync {
    fn is_shock(&self, bars: &[crate::bars::Bar], realtime_price: Option<f64>) -> bool;
}

/// Default predicate, ported from the original's exact ATR(10)/SMA(20)
/// formula: price shock when `|close-open|/open > (ATR10/open)*3.0`, and
/// volume shock when `volume > SMA(volume,20)*5.0`. Both must hold.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtrSmaShockPredicate;

const PRICE_MULTIPLIER: f64 = 3.0;
const VOLUME_MULTIPLIER: f64 = 5.0;

impl ShockPredicate for AtrSmaShockPredicate {
    fn is_shock(&self, bars: &[crate::bars::Bar], realtime_price: Option<f64>) -> bool {
        if bars.len() < 20 {
            return false;
        }
        let Some(atr10) = average_true_range(bars, 10).filter(|v| *v != 0.0) else {
            return false;
        };

        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
        let Some(sma20_volume) = simple_moving_average(&volumes, 20).filter(|v| *v != 0.0) else {
            return false;
        };

        let current = bars.last().expect("checked len >= 20 above");
        let current_open = current.open;
        let current_close = realtime_price.unwrap_or(current.close);
        let current_volume = current.volume;

        let price_shock = current_open != 0.0
            && (current_close - current_open).abs() / current_open > (atr10 / current_open) * PRICE_MULTIPLIER;
        let volume_shock = current_volume > sma20_volume * VOLUME_MULTIPLIER;

        price_shock && volume_shock
    }
}

/// Wilder-style exponential moving average of the true range, matching
/// `pandas.ewm(span=period, adjust=False).mean()`.
fn average_true_range(bars: &[crate::bars::Bar], period: usize) -> Option<f64> {
    if bars.len() < 2 {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut atr = None;
    for window in bars.windows(2) {
        let [prev, curr] = window else { unreachable!() };
        let true_range = (curr.high - curr.low)
            .max((curr.high - prev.close).abs())
            .max((curr.low - prev.close).abs());
        atr = Some(match atr {
            None => true_range,
            Some(prev_atr) => alpha * true_range + (1.0 - alpha) * prev_atr,
        });
    }
    atr
}

/// Rolling mean over the trailing `period` values, matching
/// `pandas.rolling(window=period).mean()` evaluated at the last row.
fn simple_moving_average(values: &[f64], period: usize) -> Option<f64> {
    if values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

pub struct DetectionEngine {
    bridge: Arc<Bridge>,
    predicate: Arc<dyn ShockPredicate>,
}

impl DetectionEngine {
    pub fn new(bridge: Arc<Bridge>, predicate: Arc<dyn ShockPredicate>) -> Self {
        Self { bridge, predicate }
    }

    /// Spawns `num_workers` tasks draining `news_rx`, each evaluating the
    /// shock predicate and forwarding hits onto `execution_tx`. Worker
    /// lifetime matches the bridge's: they run until `news_rx` closes.
    pub fn spawn_workers(
        self: Arc<Self>,
        num_workers: usize,
        news_rx: mpsc::Receiver<TickerEvent>,
        execution_tx: mpsc::Sender<TradeSignal>,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let news_rx = Arc::new(tokio::sync::Mutex::new(news_rx));
        (0..num_workers)
            .map(|i| {
                let engine = self.clone();
                let news_rx = news_rx.clone();
                let execution_tx = execution_tx.clone();
                tokio::spawn(async move { engine.worker_loop(format!("worker-{}", i + 1), news_rx, execution_tx).await })
            })
            .collect()
    }

    async fn worker_loop(
        &self,
        worker_id: String,
        news_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<TickerEvent>>>,
        execution_tx: mpsc::Sender<TradeSignal>,
    ) {
        loop {
            let event = {
                let mut rx = news_rx.lock().await;
                rx.recv().await
            };
            let Some(event) = event else {
                info!(worker_id, "news channel closed, worker exiting");
                return;
            };

            if let Err(err) = self.process_ticker(&event.symbol, &execution_tx).await {
                match err {
                    BridgeError::Timeout | BridgeError::Disconnected => {
                        warn!(worker_id, symbol = %event.symbol, ?err, "bridge call failed, skipping ticker");
                    },
                    other => {
                        warn!(worker_id, symbol = %event.symbol, ?other, "unexpected error processing ticker");
                    },
                }
            }
        }
    }

    async fn process_ticker(&self, symbol: &str, execution_tx: &mpsc::Sender<TradeSignal>) -> Result<(), BridgeError> {
        let contract = Contract::stock(symbol);

        let bars = self
            .bridge
            .fetch_historical_data(&contract, HistDuration::Seconds(1800), BarSize::_1Min, WhatToShow::Trades, UseRth::Use)
            .await?;

        if bars.len() < 20 {
            return Ok(());
        }

        let snapshot = self.bridge.request_market_snapshot(&contract).await?;

        if self.predicate.is_shock(&bars, snapshot.last_price) {
            let price = snapshot.last_price.unwrap_or(bars.last().unwrap().close);
            let signal = TradeSignal {
                symbol: symbol.to_string(),
                side: Action::Buy,
                indicative_price: Decimal::from_f64_retain(price).unwrap_or_default(),
                timestamp: Utc::now(),
            };
            let _ = execution_tx.send(signal).await;
        }
        Ok(())
    }
}
