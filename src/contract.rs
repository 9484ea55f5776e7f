//! Contract description shared by market data, historical data and order requests.
//!
//! This crate never encodes a contract onto a socket, so only the fields the
//! façade operations and the detection engine actually reference are kept.
use rust_decimal::Decimal;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Default)]
pub enum SecType {
    #[default]
    #[strum(serialize = "STK")]
    Stock,
    #[strum(serialize = "OPT")]
    Option,
    #[strum(serialize = "FUT")]
    Future,
    #[strum(serialize = "CASH")]
    Forex,
    #[strum(serialize = "NEWS")]
    News,
    #[strum(serialize = "CFD")]
    Cfd,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contract {
    pub con_id: Option<i32>,
    pub symbol: String,
    pub sec_type: SecType,
    pub exchange: Option<String>,
    pub currency: String,
    pub local_symbol: Option<String>,
    pub primary_exchange: Option<String>,
    pub strike: Option<Decimal>,
}

impl Contract {
    pub fn stock(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            sec_type: SecType::Stock,
            exchange: Some("SMART".to_string()),
            currency: "USD".to_string(),
            ..Default::default()
        }
    }

    /// The synthetic contract IB uses for broadtape news subscriptions:
    /// symbol `"{provider}:{provider}_ALL"`, `secType = NEWS`, exchange equal
    /// to the provider code.
    pub fn news_feed(provider_code: &str) -> Self {
        Self {
            symbol: format!("{provider_code}:{provider_code}_ALL"),
            sec_type: SecType::News,
            exchange: Some(provider_code.to_string()),
            currency: "USD".to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsProvider {
    pub code: String,
    pub name: String,
}
