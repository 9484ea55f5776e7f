//! Typed configuration for the bridge and its consumers.
//!
//! Everything the bridge needs is collected into one typed record and
//! passed in at construction time, rather than read ad hoc from
//! environment variables at scattered call sites.

use std::time::Duration;

/// News ticker extraction strategy, selected per deployment.
#[derive(Debug, Clone)]
pub enum NewsExtractionStrategy {
    /// Parse structured markup (XML-ish tags/attributes) out of the raw news payload.
    StructuredMarkup,
    /// Delegate to an external HTTP classifier.
    Classifier(ClassifierConfig),
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectionEngineConfig {
    pub num_workers: usize,
}

impl Default for DetectionEngineConfig {
    fn default() -> Self {
        Self { num_workers: 5 }
    }
}

#[derive(Debug, Clone)]
pub struct PositionManagerConfig {
    pub monitor_interval: Duration,
    pub take_profit: rust_decimal::Decimal,
    pub stop_loss: rust_decimal::Decimal,
}

impl Default for PositionManagerConfig {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_secs(5),
            take_profit: rust_decimal::Decimal::new(500, 0),
            stop_loss: rust_decimal::Decimal::new(-200, 0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub default_timeout: Duration,
    pub connect_timeout: Duration,
    pub news_providers_timeout: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(30_000),
            connect_timeout: Duration::from_secs(10),
            news_providers_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamingConfig {
    pub channel_depth: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self { channel_depth: 1024 }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub client_id: i32,
    pub providers: Vec<String>,
    pub detection_engine: DetectionEngineConfig,
    pub position_manager: PositionManagerConfig,
    pub request: RequestConfig,
    pub streaming: StreamingConfig,
    pub news_extraction: NewsExtractionStrategy,
    /// Rolling de-duplication window for the News Ingestion Pipeline.
    pub news_dedup_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4002,
            client_id: 0,
            providers: Vec::new(),
            detection_engine: DetectionEngineConfig::default(),
            position_manager: PositionManagerConfig::default(),
            request: RequestConfig::default(),
            streaming: StreamingConfig::default(),
            news_extraction: NewsExtractionStrategy::StructuredMarkup,
            news_dedup_window: Duration::from_secs(60),
        }
    }
}
