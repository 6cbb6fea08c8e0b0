//! Bounded-time retrieval of distinct formatted records from the buffer

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::buffer::EventBuffer;
use crate::format::format_transaction;
use crate::metrics;

/// Records wanted per poll
pub const DESIRED_RECORDS: usize = 3;

/// Give up after this long
pub const POLL_TIMEOUT: Duration = Duration::from_secs(20);

/// Delay between snapshots
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How a poll ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollOutcome {
    /// All desired records collected
    Complete,
    /// Timed out with some records
    Partial,
    /// Timed out with nothing
    Empty,
}

impl PollOutcome {
    pub fn classify(collected: usize, desired: usize) -> Self {
        if collected == 0 {
            PollOutcome::Empty
        } else if collected >= desired {
            PollOutcome::Complete
        } else {
            PollOutcome::Partial
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PollOutcome::Complete => "complete",
            PollOutcome::Partial => "partial",
            PollOutcome::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetrievalPoller {
    pub desired: usize,
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for RetrievalPoller {
    fn default() -> Self {
        Self {
            desired: DESIRED_RECORDS,
            timeout: POLL_TIMEOUT,
            interval: POLL_INTERVAL,
        }
    }
}

impl RetrievalPoller {
    /// Collect up to `desired` distinct display strings from events buffered
    /// during `epoch`, first-seen order. Never fails: an empty or short list
    /// is a normal result.
    pub async fn collect(&self, buffer: &EventBuffer, epoch: u64) -> Vec<String> {
        let started = Instant::now();
        let mut records: Vec<String> = Vec::with_capacity(self.desired);
        let mut snapshots = 0u32;

        loop {
            snapshots += 1;
            // Snapshot first; formatting runs without the buffer lock.
            for event in buffer.snapshot_epoch(epoch) {
                if records.len() >= self.desired {
                    break;
                }
                let Some(record) = format_transaction(&event) else {
                    continue;
                };
                let line = record.to_string();
                if !records.contains(&line) {
                    records.push(line);
                }
            }

            if records.len() >= self.desired || started.elapsed() >= self.timeout {
                break;
            }
            tokio::time::sleep(self.interval).await;
        }

        let outcome = PollOutcome::classify(records.len(), self.desired);
        metrics::inc_poll(outcome.as_str());
        debug!(
            epoch,
            snapshots,
            collected = records.len(),
            outcome = outcome.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Live trade poll finished"
        );
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn transfer(signature: &str) -> Value {
        json!({
            "signature": signature,
            "mintAddress": "So11111111111111111111111111111111111111112",
            "amount": 1_500_000_000u64,
            "decimal": 9,
            "blockTime": 1_700_000_000,
        })
    }

    #[test]
    fn test_outcome_classify() {
        assert_eq!(PollOutcome::classify(0, 3), PollOutcome::Empty);
        assert_eq!(PollOutcome::classify(2, 3), PollOutcome::Partial);
        assert_eq!(PollOutcome::classify(3, 3), PollOutcome::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_three_distinct_in_order() {
        let buffer = EventBuffer::new();
        for sig in ["sigAAAAA1", "sigBBBBB2", "sigCCCCC3", "sigBBBBB2", "sigEEEEE5"] {
            buffer.append(transfer(sig));
        }

        let started = Instant::now();
        let records = RetrievalPoller::default().collect(&buffer, 0).await;

        let expected: Vec<String> = ["sigAAAAA1", "sigBBBBB2", "sigCCCCC3"]
            .iter()
            .map(|s| format_transaction(&transfer(s)).unwrap().to_string())
            .collect();
        assert_eq!(records, expected);
        // Enough records on the first snapshot: no waiting
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_buffer_times_out_after_twenty_seconds() {
        let buffer = EventBuffer::new();
        let started = Instant::now();

        let records = RetrievalPoller::default().collect(&buffer, 0).await;

        assert!(records.is_empty());
        let elapsed = started.elapsed();
        assert!(elapsed >= POLL_TIMEOUT);
        assert!(elapsed < POLL_TIMEOUT + POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_picks_up_events_appended_mid_poll() {
        let buffer = Arc::new(EventBuffer::new());
        buffer.append(transfer("sigAAAAA1"));

        let producer = {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                buffer.append(transfer("sigBBBBB2"));
                buffer.append(transfer("sigCCCCC3"));
            })
        };

        let started = Instant::now();
        let records = RetrievalPoller::default().collect(&buffer, 0).await;
        producer.await.unwrap();

        assert_eq!(records.len(), 3);
        assert!(started.elapsed() < POLL_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_when_fewer_than_desired() {
        let buffer = EventBuffer::new();
        buffer.append(transfer("sigAAAAA1"));
        buffer.append(transfer("sigAAAAA1"));
        buffer.append(json!({"signature": "bad", "amount": "lots", "decimal": 9}));

        let records = RetrievalPoller::default().collect(&buffer, 0).await;
        assert_eq!(records.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignores_events_from_other_epoch() {
        let buffer = EventBuffer::new();
        buffer.append(transfer("sigOLD0001"));
        let epoch = buffer.clear();
        buffer.append(transfer("sigNEW0001"));

        let poller = RetrievalPoller {
            timeout: Duration::from_secs(1),
            ..RetrievalPoller::default()
        };
        let stale = poller.collect(&buffer, epoch - 1).await;
        assert!(stale.is_empty());

        let current = poller.collect(&buffer, epoch).await;
        assert_eq!(current.len(), 1);
        assert!(current[0].contains("sigNEW00..."));
    }
}
