//! Historical-data and bar types used by `fetch_historical_data`.
use strum_macros::{Display, EnumString};

use crate::TimeStamp;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub t_stamp: TimeStamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[allow(non_camel_case_types)]
pub enum BarSize {
    #[strum(serialize = "1 secs")]
    _1Secs,
    #[strum(serialize = "1 min")]
    _1Min,
    #[strum(serialize = "5 mins")]
    _5Mins,
    #[strum(serialize = "1 hour")]
    _1Hour,
    #[strum(serialize = "1 day")]
    _1Day,
}

/// Request duration, e.g. `"30 M"` (30 minutes) or `"1 D"` (one day) in the
/// broker's own shorthand. Kept as the typed variants the façade accepts;
/// `Display` produces the wire-shaped string the broker SDK trait expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duration {
    Seconds(u32),
    Days(u32),
    Weeks(u32),
    Months(u32),
    Years(u32),
}

impl std::fmt::Display for Duration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Duration::Seconds(n) => write!(f, "{n} S"),
            Duration::Days(n) => write!(f, "{n} D"),
            Duration::Weeks(n) => write!(f, "{n} W"),
            Duration::Months(n) => write!(f, "{n} M"),
            Duration::Years(n) => write!(f, "{n} Y"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum WhatToShow {
    #[strum(serialize = "TRADES")]
    Trades,
    #[strum(serialize = "MIDPOINT")]
    Midpoint,
    #[strum(serialize = "BID")]
    Bid,
    #[strum(serialize = "ASK")]
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseRth {
    Use,
    DontUse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    YyyyMmDd,
    UnixEpochSeconds,
}
