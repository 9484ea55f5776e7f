//! Periodic position P&L sweep, closing positions that cross a
//! take-profit or stop-loss threshold.
use std::{collections::HashMap, sync::Mutex, time::Duration};

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{bridge::Bridge, contract::Contract, detection::TradeSignal, order::Action};

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
}

/// Persistence boundary for open/closed position bookkeeping. The real
/// relational store is out of scope; `InMemoryTradeStore` is the ambient
/// default.
pub trait TradeStore: Send + Sync {
    fn load_open_positions(&self) -> Vec<OpenPosition>;
    fn mark_closed(&self, symbol: &str);
}

#[derive(Debug, Default)]
pub struct InMemoryTradeStore {
    positions: Mutex<HashMap<String, OpenPosition>>,
}

impl InMemoryTradeStore {
    pub fn new(initial: Vec<OpenPosition>) -> Self {
        let positions = initial.into_iter().map(|p| (p.symbol.clone(), p)).collect();
        Self { positions: Mutex::new(positions) }
    }
}

impl TradeStore for InMemoryTradeStore {
    fn load_open_positions(&self) -> Vec<OpenPosition> {
        self.positions.lock().unwrap().values().cloned().collect()
    }

    fn mark_closed(&self, symbol: &str) {
        self.positions.lock().unwrap().remove(symbol);
    }
}

pub struct PositionMonitor {
    bridge: std::sync::Arc<Bridge>,
    store: std::sync::Arc<dyn TradeStore>,
    monitor_interval: Duration,
    take_profit: Decimal,
    stop_loss: Decimal,
}

impl PositionMonitor {
    pub fn new(
        bridge: std::sync::Arc<Bridge>,
        store: std::sync::Arc<dyn TradeStore>,
        monitor_interval: Duration,
        take_profit: Decimal,
        stop_loss: Decimal,
    ) -> Self {
        Self { bridge, store, monitor_interval, take_profit, stop_loss }
    }

    /// Periodically sweeps open positions, closing any that hit the
    /// take-profit or stop-loss band. Runs until cancelled.
    pub async fn run(self, execution_tx: mpsc::Sender<TradeSignal>) {
        let mut ticker = tokio::time::interval(self.monitor_interval);
        loop {
            ticker.tick().await;
            if self.bridge.state() != crate::bridge::BridgeState::Operational {
                warn!("bridge not operational, skipping position sweep");
                continue;
            }
            self.sweep_once(&execution_tx).await;
        }
    }

    async fn sweep_once(&self, execution_tx: &mpsc::Sender<TradeSignal>) {
        for position in self.store.load_open_positions() {
            let contract = Contract::stock(&position.symbol);
            let snapshot = match self.bridge.request_market_snapshot(&contract).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(symbol = %position.symbol, ?err, "could not get real-time price, skipping P&L check");
                    continue;
                },
            };
            let Some(current_price) = snapshot.last_price.and_then(Decimal::from_f64_retain) else {
                warn!(symbol = %position.symbol, "no real-time price in snapshot, skipping P&L check");
                continue;
            };

            let pnl = (current_price - position.avg_entry_price) * position.quantity;
            info!(symbol = %position.symbol, %current_price, %pnl, "position P&L");

            if pnl > self.take_profit || pnl < self.stop_loss {
                let side = if position.quantity > Decimal::ZERO { Action::Sell } else { Action::Buy };
                let signal = TradeSignal {
                    symbol: position.symbol.clone(),
                    side,
                    indicative_price: current_price,
                    timestamp: chrono::Utc::now(),
                };
                if execution_tx.send(signal).await.is_ok() {
                    self.store.mark_closed(&position.symbol);
                    info!(symbol = %position.symbol, %pnl, "position closed");
                }
            }
        }
    }
}
