#![warn(missing_debug_implementations, trivial_casts, trivial_numeric_casts, unsafe_code, unused_import_braces, unused_qualifications)]
#![allow(clippy::module_name_repetitions)]

use chrono::{DateTime, Utc};

pub mod account;
pub mod bars;
pub mod bridge;
pub mod config;
pub mod contract;
pub mod detection;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod message;
pub mod news;
pub mod order;
pub mod position;
pub mod registry;
pub mod router;
pub mod sdk;
pub mod streaming;

/// Request id assigned by [`ids::IdAllocator::next_request_id`]. Signed so
/// [`ids::NEWS_PROVIDERS_REQ_ID`] can host a reserved negative sentinel
/// alongside the allocator's non-negative, ever-increasing stream.
pub type RequestId = i64;

/// Order id assigned by [`ids::IdAllocator::next_order_id`], seeded from the
/// broker's `NEXT_VALID_ID`.
pub type OrderId = i64;

pub type ClientId = i32;
pub type AccountCode = String;
pub type TimeStamp = DateTime<Utc>;

pub mod prelude {
    #[doc(hidden)]
    pub use crate::{account::*,
                     bars::*,
                     bridge::{Bridge, BridgeState},
                     config::*,
                     contract::*,
                     error::{BridgeError, Result},
                     message::Message,
                     order::*,
                     AccountCode,
                     ClientId,
                     OrderId,
                     RequestId,
                     TimeStamp};
}
