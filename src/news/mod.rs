//! News Ingestion Pipeline: extraction strategies and the consumer
//! loop that turns raw NEWS fan-out payloads into de-duplicated ticker events.
pub mod classifier;
pub mod markup;
pub mod pipeline;

pub use pipeline::{NewsPipeline, TickerEvent};
