//! Identifier Allocator.
//!
//! Two independent monotonic counters behind lightweight mutual exclusion.
//! `next_req_id` starts at 0 and increments on every allocation. The order id
//! space is seeded exactly once by the broker's `NEXT_VALID_ID` message;
//! allocating before that happens fails with [`BridgeError::NotReady`].
use std::sync::Mutex;

use crate::{error::{BridgeError, Result},
            OrderId,
            RequestId};

/// Reserved request id used for SDK responses that omit a request id
/// (e.g. `NEWS_PROVIDERS`). Never handed out by [`IdAllocator::next_request_id`].
pub const NEWS_PROVIDERS_REQ_ID: RequestId = -101;

#[derive(Debug, Default)]
pub struct IdAllocator {
    next_req_id: Mutex<RequestId>,
    next_order_id: Mutex<Option<OrderId>>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next_req_id: Mutex::new(0),
            next_order_id: Mutex::new(None),
        }
    }

    /// Allocate the next `RequestId`. Never reused, never negative.
    pub fn next_request_id(&self) -> RequestId {
        let mut guard = self.next_req_id.lock().unwrap();
        let id = *guard;
        *guard += 1;
        id
    }

    /// Idempotently seed the order id allocator from the broker's first
    /// `NEXT_VALID_ID` message. Subsequent calls are ignored.
    pub fn seed_order_id(&self, seed: OrderId) {
        let mut guard = self.next_order_id.lock().unwrap();
        if guard.is_none() {
            *guard = Some(seed);
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.next_order_id.lock().unwrap().is_some()
    }

    /// Allocate the next `OrderId`. Fails with `NotReady` until seeded.
    pub fn next_order_id(&self) -> Result<OrderId> {
        let mut guard = self.next_order_id.lock().unwrap();
        match *guard {
            None => Err(BridgeError::NotReady),
            Some(next) => {
                *guard = Some(next + 1);
                Ok(next)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_sequential_from_zero() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next_request_id(), 0);
        assert_eq!(ids.next_request_id(), 1);
        assert_eq!(ids.next_request_id(), 2);
    }

    #[test]
    fn order_id_allocation_fails_before_seed() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next_order_id(), Err(BridgeError::NotReady));
    }

    #[test]
    fn order_id_seed_is_idempotent_and_monotonic() {
        let ids = IdAllocator::new();
        ids.seed_order_id(100);
        ids.seed_order_id(9000); // ignored, already seeded
        assert_eq!(ids.next_order_id(), Ok(100));
        assert_eq!(ids.next_order_id(), Ok(101));
        assert_eq!(ids.next_order_id(), Ok(102));
    }
}
