//! Streaming Fan-out.
//!
//! Each [`Subscription`] owns a bounded destination queue. The dispatcher
//! forwards streaming `Message`s into the fan-out, which applies a
//! per-stream-kind backpressure policy instead of a single uniform one.
//! A hand-rolled bounded queue (rather than `tokio::sync::mpsc`) is used
//! because the NEWS policy needs to evict the oldest queued item from the
//! producer side, which `mpsc::Sender` cannot do.
use std::{collections::{HashMap, VecDeque},
          sync::{Arc, Mutex},
          time::Duration};

use tokio::sync::Notify;
use tracing::warn;

use crate::{message::{Message, TickType},
            RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    News,
    TickPrice,
    TickSize,
    Bar,
    OrderStatus,
}

impl StreamKind {
    fn of(message: &Message) -> Option<Self> {
        match message {
            Message::NewsTick { .. } => Some(StreamKind::News),
            Message::TickPrice { .. } => Some(StreamKind::TickPrice),
            Message::TickSize { .. } => Some(StreamKind::TickSize),
            Message::HistoricalDataBar { .. } => Some(StreamKind::Bar),
            Message::OrderStatus(_) => Some(StreamKind::OrderStatus),
            _ => None,
        }
    }
}

struct Queue {
    items: Mutex<VecDeque<Message>>,
    coalesced: Mutex<HashMap<TickType, Message>>,
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
}

impl Queue {
    fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(256))),
            coalesced: Mutex::new(HashMap::new()),
            capacity,
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    fn try_push(&self, message: Message) -> Result<(), Message> {
        let mut guard = self.items.lock().unwrap();
        if guard.len() >= self.capacity {
            return Err(message);
        }
        guard.push_back(message);
        drop(guard);
        self.not_empty.notify_one();
        Ok(())
    }

    fn drop_oldest_and_push(&self, message: Message) {
        let mut guard = self.items.lock().unwrap();
        if guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(message);
        drop(guard);
        self.not_empty.notify_one();
    }

    async fn push_blocking(&self, mut message: Message) {
        loop {
            match self.try_push(message) {
                Ok(()) => return,
                Err(returned) => {
                    message = returned;
                    self.not_full.notified().await;
                },
            }
        }
    }

    fn pop(&self) -> Option<Message> {
        let mut guard = self.items.lock().unwrap();
        let popped = guard.pop_front();
        if popped.is_some() {
            // A slot just freed; pull one coalesced tick value back in ahead
            // of anything still in `coalesced` so TICK_PRICE/TICK_SIZE
            // subscribers eventually see the latest value per tick type
            // instead of it sitting stashed forever.
            let mut coalesced = self.coalesced.lock().unwrap();
            if let Some(tick_type) = coalesced.keys().next().copied() {
                if let Some(message) = coalesced.remove(&tick_type) {
                    guard.push_back(message);
                }
            }
        }
        drop(guard);
        if popped.is_some() {
            self.not_full.notify_one();
        }
        popped
    }
}

/// A single subscriber's destination. Consumers drain it with [`Subscription::recv`].
pub struct Subscription {
    queue: Arc<Queue>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            if let Some(message) = self.queue.pop() {
                return Some(message);
            }
            self.queue.not_empty.notified().await;
        }
    }
}

#[derive(Default)]
pub struct FanOut {
    queues: Mutex<HashMap<RequestId, Arc<Queue>>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, req_id: RequestId, depth: usize) -> Subscription {
        let queue = Arc::new(Queue::new(depth));
        self.queues.lock().unwrap().insert(req_id, queue.clone());
        Subscription { queue }
    }

    pub fn unregister(&self, req_id: RequestId) {
        self.queues.lock().unwrap().remove(&req_id);
    }

    /// Forwards `message` to the subscription for `req_id`, applying the
    /// policy for that message's stream kind. No-op if there is no active
    /// subscription (the producer has already been cancelled).
    pub async fn forward(&self, req_id: RequestId, message: Message) {
        let queue = { self.queues.lock().unwrap().get(&req_id).cloned() };
        let Some(queue) = queue else { return };
        let Some(kind) = StreamKind::of(&message) else { return };

        match kind {
            StreamKind::News => {
                match tokio::time::timeout(Duration::from_millis(200), async {
                    // Spin briefly on the bounded queue before evicting; most bursts
                    // drain within the window without losing anything.
                    loop {
                        match queue.try_push(message.clone()) {
                            Ok(()) => return,
                            Err(_) => tokio::task::yield_now().await,
                        }
                    }
                })
                .await
                {
                    Ok(()) => {},
                    Err(_) => {
                        warn!(req_id, "news subscriber backpressured, dropping oldest");
                        queue.drop_oldest_and_push(message);
                    },
                }
            },
            StreamKind::TickPrice | StreamKind::TickSize => {
                let tick_type = match &message {
                    Message::TickPrice { tick_type, .. } | Message::TickSize { tick_type, .. } => *tick_type,
                    _ => unreachable!(),
                };
                if let Err(rejected) = queue.try_push(message) {
                    queue.coalesced.lock().unwrap().insert(tick_type, rejected);
                }
            },
            StreamKind::Bar | StreamKind::OrderStatus => {
                // Never drop: block until the consumer drains, pausing this producer.
                queue.push_blocking(message).await;
            },
        }
    }
}
