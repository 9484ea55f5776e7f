//! End-to-end bridge behavior, driven against `sdk::mock::ScriptedSdk`
//! instead of a live broker connection. Each test plays the role of the
//! scripted broker: it waits for the pump thread to come up, then invokes
//! the `BrokerCallbacks` the real SDK would have invoked at that point.
use std::{sync::Arc, time::Duration};

use broker_bridge_core::{bars::{Bar, BarSize, Duration as HistDuration, UseRth, WhatToShow},
                         bridge::{Bridge, BridgeState},
                         config::{Config, RequestConfig},
                         contract::{Contract, NewsProvider},
                         error::BridgeError,
                         message::Message,
                         order::Action,
                         sdk::{mock::ScriptedSdk, BrokerCallbacks}};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, registry::Registry, EnvFilter};

#[ctor::ctor]
fn init_tracing() {
    LogTracer::init().expect("unable to install log tracer");
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let app_name = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")).to_string();
    let formatting_layer = BunyanFormattingLayer::new(app_name, std::io::stdout);
    let subscriber = Registry::default().with(env_filter).with(JsonStorageLayer).with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber).unwrap();
}

fn config_with_providers(providers: &[&str]) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 4002,
        client_id: 25,
        providers: providers.iter().map(|p| p.to_string()).collect(),
        ..Config::default()
    }
}

/// Spawns `cb` onto the blocking pool without waiting for it to run. Used
/// to seed `NEXT_VALID_ID` concurrently with `connect()`, since the pump
/// thread `connect()` starts is exactly what `ScriptedSdk::inject` blocks on.
fn spawn_inject(sdk: &Arc<ScriptedSdk>, cb: impl FnOnce(&mut dyn BrokerCallbacks) + Send + 'static) -> tokio::task::JoinHandle<()> {
    let sdk = sdk.clone();
    tokio::task::spawn_blocking(move || sdk.inject(cb))
}

/// Runs `cb` against the bridge's callback handle and waits for it to land.
/// Only safe to call once the pump thread is already up (post-`connect`),
/// or concurrently with whatever future is expected to consume it.
async fn inject(sdk: &Arc<ScriptedSdk>, cb: impl FnOnce(&mut dyn BrokerCallbacks) + Send + 'static) {
    spawn_inject(sdk, cb).await.unwrap();
}

/// Connects a freshly built bridge, seeding `NEXT_VALID_ID` concurrently so
/// `connect()` has something to wait for.
async fn connect_seeded(sdk: &Arc<ScriptedSdk>, bridge: &Arc<Bridge>, seed: broker_bridge_core::OrderId) {
    let seeding = spawn_inject(sdk, move |cb| cb.next_valid_id(seed));
    bridge.connect().await.unwrap();
    seeding.await.unwrap();
}

fn bar_at(t: chrono::DateTime<chrono::Utc>) -> Bar {
    Bar { t_stamp: t, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 10.0 }
}

#[tokio::test]
async fn connect_then_list_providers_then_allocate_order_ids() {
    let sdk = ScriptedSdk::new();
    let bridge = Bridge::new(sdk.clone(), config_with_providers(&["BZ", "BRFG"]));

    let seeding = spawn_inject(&sdk, |cb| cb.next_valid_id(42));
    let connected = tokio::time::timeout(Duration::from_secs(10), bridge.connect()).await;
    assert!(matches!(connected, Ok(Ok(()))), "connect should resolve once NEXT_VALID_ID arrives");
    seeding.await.unwrap();

    let providers = {
        let script = spawn_inject(&sdk, |cb| {
            cb.news_providers(vec![
                NewsProvider { code: "BZ".to_string(), name: "Benzinga".to_string() },
                NewsProvider { code: "BRFG".to_string(), name: "Briefing".to_string() },
            ])
        });
        let result = bridge.request_news_providers().await.unwrap();
        script.await.unwrap();
        result
    };
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0].code, "BZ");

    assert_eq!(bridge.place_order(Contract::stock("AAPL"), Action::Buy, dec!(10)).await.unwrap(), 42);
    assert_eq!(bridge.place_order(Contract::stock("AAPL"), Action::Buy, dec!(10)).await.unwrap(), 43);
}

#[tokio::test]
async fn historical_fetch_aggregates_bars_in_arrival_order() {
    let sdk = ScriptedSdk::new();
    let bridge = Bridge::new(sdk.clone(), config_with_providers(&[]));
    connect_seeded(&sdk, &bridge, 1).await;

    let contract = Contract::stock("AAPL");
    let fetch = bridge.fetch_historical_data(&contract, HistDuration::Seconds(1800), BarSize::_1Min, WhatToShow::Trades, UseRth::Use);

    let stamps: Vec<_> = (0..3).map(|i| chrono::Utc::now() + chrono::Duration::minutes(i)).collect();

    let script = {
        let sdk = sdk.clone();
        let stamps = stamps.clone();
        tokio::task::spawn_blocking(move || {
            // req_id 0 is the only request issued so far on a freshly connected bridge.
            sdk.inject(|cb| cb.historical_data(0, bar_at(stamps[0])));
            sdk.inject(|cb| cb.historical_data(0, bar_at(stamps[1])));
            sdk.inject(|cb| cb.historical_data(0, bar_at(stamps[2])));
            sdk.inject(|cb| cb.historical_data_end(0));
        })
    };

    let bars = fetch.await.unwrap();
    script.await.unwrap();

    assert_eq!(bars.len(), 3);
    assert_eq!(bars.iter().map(|b| b.t_stamp).collect::<Vec<_>>(), stamps);
}

#[tokio::test]
async fn historical_fetch_times_out_without_terminator() {
    let sdk = ScriptedSdk::new();
    let config = Config {
        request: RequestConfig { default_timeout: Duration::from_millis(200), ..RequestConfig::default() },
        ..config_with_providers(&[])
    };
    let bridge = Bridge::new(sdk.clone(), config);
    connect_seeded(&sdk, &bridge, 1).await;

    let contract = Contract::stock("AAPL");
    let fetch = bridge.fetch_historical_data(&contract, HistDuration::Seconds(60), BarSize::_1Min, WhatToShow::Trades, UseRth::Use);

    // Spawned onto the blocking pool (a real OS thread) rather than awaited
    // inline, so the two bars land only after `fetch`'s first poll has
    // registered its context. No HISTORICAL_DATA_END is ever injected; the
    // registry sweeper must trip.
    let script = {
        let sdk = sdk.clone();
        tokio::task::spawn_blocking(move || {
            sdk.inject(|cb| cb.historical_data(0, bar_at(chrono::Utc::now())));
            sdk.inject(|cb| cb.historical_data(0, bar_at(chrono::Utc::now())));
        })
    };

    let result = tokio::time::timeout(Duration::from_millis(300), fetch).await.expect("should resolve within 300ms");
    assert_eq!(result, Err(BridgeError::Timeout));
    script.await.unwrap();
}

#[tokio::test]
async fn cancelling_a_news_subscription_stops_further_delivery() {
    let sdk = ScriptedSdk::new();
    let bridge = Bridge::new(sdk.clone(), config_with_providers(&["BRFG"]));
    connect_seeded(&sdk, &bridge, 1).await;

    let (req_id, mut subscription) = bridge.subscribe_news_feed("BRFG").await.unwrap();

    for i in 0..3 {
        inject(&sdk, move |cb| cb.tick_news(req_id, chrono::Utc::now(), "BRFG".to_string(), format!("article-{i}"), format!("headline {i}"))).await;
    }

    for _ in 0..3 {
        let message = tokio::time::timeout(Duration::from_secs(1), subscription.recv()).await.unwrap();
        assert!(matches!(message, Some(Message::NewsTick { .. })));
    }

    bridge.cancel_subscription(req_id);
    inject(&sdk, move |cb| cb.tick_news(req_id, chrono::Utc::now(), "BRFG".to_string(), "late".to_string(), "should not arrive".to_string())).await;

    let after_cancel = tokio::time::timeout(Duration::from_millis(200), subscription.recv()).await;
    assert!(after_cancel.is_err(), "no message should be delivered after the subscription is cancelled");
}

#[tokio::test]
async fn parallel_order_placement_yields_unique_sequential_ids() {
    let sdk = ScriptedSdk::new();
    let bridge = Bridge::new(sdk.clone(), config_with_providers(&[]));
    connect_seeded(&sdk, &bridge, 100).await;

    let contract = Contract::stock("AAPL");
    let (a, b, c, d) = tokio::join!(
        bridge.place_order(contract.clone(), Action::Buy, dec!(1)),
        bridge.place_order(contract.clone(), Action::Buy, dec!(1)),
        bridge.place_order(contract.clone(), Action::Buy, dec!(1)),
        bridge.place_order(contract.clone(), Action::Buy, dec!(1)),
    );
    let mut ids = [a.unwrap(), b.unwrap(), c.unwrap(), d.unwrap()];
    ids.sort_unstable();
    assert_eq!(ids, [100, 101, 102, 103]);
}

#[tokio::test]
async fn informational_error_is_suppressed_before_it_reaches_the_registry() {
    let sdk = ScriptedSdk::new();
    let bridge = Bridge::new(sdk.clone(), config_with_providers(&["BZ"]));
    connect_seeded(&sdk, &bridge, 1).await;

    inject(&sdk, |cb| cb.error(Some(-1), 2104, "Market data farm connection is OK".to_string())).await;

    // The bridge must still be fully usable: an informational code never
    // fails a pending request or disturbs bridge state.
    assert_eq!(bridge.state(), BridgeState::Operational);
    let providers = {
        let script = spawn_inject(&sdk, |cb| cb.news_providers(vec![NewsProvider { code: "BZ".to_string(), name: "Benzinga".to_string() }]));
        let result = bridge.request_news_providers().await.unwrap();
        script.await.unwrap();
        result
    };
    assert_eq!(providers.len(), 1);
}
