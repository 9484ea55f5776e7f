//! Error taxonomy for the bridge.
//!
//! Every variant here corresponds to one of the outcomes a [`RequestContext`]
//! (see [`crate::registry`]) can resolve with, or to a failure the façade
//! surfaces before a request is even registered.
//!
//! [`RequestContext`]: crate::registry::RequestContext
use thiserror::Error;

use crate::RequestId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    /// A pending request, or the connection attempt itself, exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// `connect()` called while already `CONNECTING` or `OPERATIONAL`.
    #[error("bridge is already connected")]
    AlreadyConnected,

    /// The transport could not be established.
    #[error("connection refused")]
    ConnectionRefused,

    /// The broker reported an error for a known request id.
    #[error("broker error {code}: {message}")]
    BrokerError { code: i32, message: String },

    /// An order id was requested before `NEXT_VALID_ID` was observed.
    #[error("order id allocator not ready: no broker-supplied seed yet")]
    NotReady,

    /// The broker rejected an order synchronously.
    #[error("order rejected: {0}")]
    Rejected(String),

    /// `subscribe_news_feed` was called with a provider code the broker never listed.
    #[error("unknown news provider: {0}")]
    InvalidProvider(String),

    /// The broker rejected the shape of a request before accepting it.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The bridge transitioned to `DISCONNECTED` while the caller was waiting.
    #[error("bridge disconnected")]
    Disconnected,

    /// The caller's cancellation signal fired before the request completed.
    #[error("request cancelled")]
    Cancelled,

    /// A request id was looked up that the registry has no context for.
    #[error("no pending request for id {0}")]
    UnknownRequest(RequestId),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
