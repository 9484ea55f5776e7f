//! News Ingestion Pipeline consumer loop.
use std::{collections::HashMap, time::Duration};

use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, warn};

use crate::{config::NewsExtractionStrategy,
            message::Message,
            news::{classifier::ClassifierClient, markup},
            streaming::Subscription};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerEvent {
    pub symbol: String,
}

enum Strategy {
    StructuredMarkup,
    Classifier(ClassifierClient),
}

pub struct NewsPipeline {
    strategy: Strategy,
    dedup_window: Duration,
    last_emitted: HashMap<String, Instant>,
    extraction_failures: u64,
}

impl NewsPipeline {
    pub fn new(strategy: &NewsExtractionStrategy, dedup_window: Duration) -> Self {
        let strategy = match strategy {
            NewsExtractionStrategy::StructuredMarkup => Strategy::StructuredMarkup,
            NewsExtractionStrategy::Classifier(config) => Strategy::Classifier(ClassifierClient::new(config.clone())),
        };
        Self {
            strategy,
            dedup_window,
            last_emitted: HashMap::new(),
            extraction_failures: 0,
        }
    }

    /// Consumes NEWS fan-out messages from `subscription`, extracting
    /// candidate tickers and forwarding de-duplicated [`TickerEvent`]s onto
    /// `detection_tx`. Runs until the subscription's producer side closes.
    pub async fn run(mut self, mut subscription: Subscription, detection_tx: mpsc::Sender<TickerEvent>) {
        while let Some(message) = subscription.recv().await {
            let Message::NewsTick { headline, .. } = message else { continue };
            let tickers = match &self.strategy {
                Strategy::StructuredMarkup => markup::extract_tickers(&headline),
                Strategy::Classifier(client) => client.extract_tickers(&headline).await,
            };

            if tickers.is_empty() {
                self.extraction_failures += 1;
                debug!(failures = self.extraction_failures, "no tickers extracted from news payload");
                continue;
            }

            for ticker in tickers {
                if self.should_emit(&ticker) {
                    if detection_tx.send(TickerEvent { symbol: ticker.clone() }).await.is_err() {
                        warn!("detection channel closed, stopping news pipeline");
                        return;
                    }
                    self.last_emitted.insert(ticker, Instant::now());
                }
            }
        }
    }

    fn should_emit(&self, ticker: &str) -> bool {
        match self.last_emitted.get(ticker) {
            Some(last) => last.elapsed() >= self.dedup_window,
            None => true,
        }
    }
}
