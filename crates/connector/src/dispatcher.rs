//! Subscription request queue
//!
//! Interactive callers push venue selections through a cloneable
//! [`SubscriptionDispatcher`]; the stream connection owns the single
//! [`SubscriptionQueue`] and drains it without blocking each time the socket
//! opens (and, optionally, as requests arrive while it is open). Requests are
//! neither merged nor deduplicated.

use tokio::sync::mpsc;
use tracing::debug;

use crate::dex::Dex;

/// A venue selection waiting to be sent upstream.
///
/// Holds the raw venue name; it is resolved to a [`Dex`] only when drained,
/// so a name outside the known set is dropped at that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest(String);

impl SubscriptionRequest {
    pub fn new(venue: impl Into<String>) -> Self {
        Self(venue.into())
    }

    pub fn venue(&self) -> &str {
        &self.0
    }

    pub fn dex(&self) -> Option<Dex> {
        self.0.parse().ok()
    }
}

impl From<Dex> for SubscriptionRequest {
    fn from(dex: Dex) -> Self {
        Self(dex.as_str().to_string())
    }
}

/// Producer side, shared by every query handler
#[derive(Debug, Clone)]
pub struct SubscriptionDispatcher {
    tx: mpsc::UnboundedSender<SubscriptionRequest>,
}

/// Consumer side, owned by the stream connection
#[derive(Debug)]
pub struct SubscriptionQueue {
    rx: mpsc::UnboundedReceiver<SubscriptionRequest>,
}

/// Create a connected dispatcher/queue pair
pub fn subscription_channel() -> (SubscriptionDispatcher, SubscriptionQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SubscriptionDispatcher { tx }, SubscriptionQueue { rx })
}

impl SubscriptionDispatcher {
    /// Queue a request. Never blocks.
    pub fn push(&self, request: impl Into<SubscriptionRequest>) {
        let request = request.into();
        debug!(venue = %request.venue(), "Queued subscription request");
        if self.tx.send(request).is_err() {
            // Only happens once the connection (and its queue) is gone.
            debug!("Subscription queue closed, request discarded");
        }
    }
}

impl SubscriptionQueue {
    /// Pop the oldest request, if any. Never waits.
    pub fn try_pop(&mut self) -> Option<SubscriptionRequest> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next request. `None` once every dispatcher is dropped.
    pub async fn recv(&mut self) -> Option<SubscriptionRequest> {
        self.rx.recv().await
    }

    /// Take every request queued right now, in push order
    pub fn drain(&mut self) -> Vec<SubscriptionRequest> {
        std::iter::from_fn(|| self.try_pop()).collect()
    }
}
