//! Live trade facade used by the HTTP layer and other callers

use std::sync::Arc;
use tracing::info;

use crate::buffer::EventBuffer;
use crate::dex::Dex;
use crate::dispatcher::SubscriptionDispatcher;
use crate::poller::RetrievalPoller;

/// Venue selection plus bounded retrieval over the shared buffer.
///
/// Cheap to clone; every clone shares the same buffer and dispatcher.
#[derive(Clone)]
pub struct LiveTrades {
    buffer: Arc<EventBuffer>,
    dispatcher: SubscriptionDispatcher,
    poller: RetrievalPoller,
    enabled: bool,
}

impl LiveTrades {
    pub fn new(buffer: Arc<EventBuffer>, dispatcher: SubscriptionDispatcher, enabled: bool) -> Self {
        Self {
            buffer,
            dispatcher,
            poller: RetrievalPoller::default(),
            enabled,
        }
    }

    pub fn with_poller(mut self, poller: RetrievalPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Whether live retrieval is offered at all. Callers fall back to the
    /// REST snapshot when this is false.
    pub fn is_streaming_enabled(&self) -> bool {
        self.enabled
    }

    /// Clear the buffer and queue a subscription for `dex`.
    /// Returns the epoch events for this selection will carry.
    pub fn select_venue(&self, dex: Dex) -> u64 {
        let epoch = self.buffer.clear();
        self.dispatcher.push(dex);
        info!(dex = %dex, epoch, "Selected live venue");
        epoch
    }

    /// Select `dex` and collect up to the poller's desired count of display
    /// strings. Empty right away when streaming is disabled.
    pub async fn get_live_trades(&self, dex: Dex) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        let epoch = self.select_venue(dex);
        self.poller.collect(&self.buffer, epoch).await
    }

    pub fn desired_records(&self) -> usize {
        self.poller.desired
    }

    pub fn buffer(&self) -> &Arc<EventBuffer> {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::subscription_channel;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_select_venue_clears_and_queues() {
        let buffer = Arc::new(EventBuffer::new());
        buffer.append(json!({"signature": "old"}));
        let (dispatcher, mut queue) = subscription_channel();
        let live = LiveTrades::new(Arc::clone(&buffer), dispatcher, true);

        let epoch = live.select_venue(Dex::Meteora);

        assert!(buffer.is_empty());
        assert_eq!(epoch, 1);
        assert_eq!(queue.try_pop().and_then(|r| r.dex()), Some(Dex::Meteora));
    }

    #[tokio::test]
    async fn test_disabled_returns_empty_without_queueing() {
        let (dispatcher, mut queue) = subscription_channel();
        let live = LiveTrades::new(Arc::new(EventBuffer::new()), dispatcher, false);

        assert!(!live.is_streaming_enabled());
        assert!(live.get_live_trades(Dex::Orca).await.is_empty());
        assert!(queue.try_pop().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_live_trades_collects_new_events() {
        let buffer = Arc::new(EventBuffer::new());
        buffer.append(json!({"signature": "stale-signature"}));
        let (dispatcher, _queue) = subscription_channel();
        let live = LiveTrades::new(Arc::clone(&buffer), dispatcher, true);

        let producer = {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                buffer.append(json!({"data": {"signature": "fresh-signature"}}));
            })
        };

        let records = live.get_live_trades(Dex::Orca).await;
        producer.await.unwrap();

        assert_eq!(records.len(), 1);
        assert!(records[0].contains("Tx: fresh-si..."));
    }
}
