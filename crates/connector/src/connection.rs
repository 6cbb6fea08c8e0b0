//! Long-lived stream connection
//!
//! Drives one session at a time through an explicit state machine:
//!
//! ```text
//! Connecting -> Open -> Backoff -> Connecting -> ...
//!      \                  ^
//!       `--(dial error)--'
//! Disabled   (streaming turned off: never dials)
//! Stopped    (shutdown requested)
//! ```
//!
//! On every open the subscription queue is drained and one configure frame is
//! sent per known venue. Inbound frames are parsed, classified, and appended
//! to the shared buffer. Any error or close waits a fixed delay and dials
//! again, without bound. Reconnecting does not resubscribe earlier venues and
//! does not touch the buffer.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::buffer::EventBuffer;
use crate::classify::is_relevant;
use crate::dispatcher::{SubscriptionQueue, SubscriptionRequest};
use crate::error::ConnectorError;
use crate::messages::ConfigureFrame;
use crate::metrics;
use crate::traits::{StreamDialer, StreamSession};
use crate::websocket::VybeDialer;

/// Fixed delay before each reconnect attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Upper bound on a single dial (TCP + TLS + upgrade)
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Backoff,
    Disabled,
    Stopped,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Backoff => "backoff",
            ConnectionState::Disabled => "disabled",
            ConnectionState::Stopped => "stopped",
        }
    }
}

/// What happened to one inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Buffered,
    Dropped,
    Malformed,
}

impl FrameOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameOutcome::Buffered => "buffered",
            FrameOutcome::Dropped => "dropped",
            FrameOutcome::Malformed => "malformed",
        }
    }
}

enum SessionEnd {
    Shutdown,
    Lost(ConnectorError),
}

enum PumpEvent {
    Request(Option<SubscriptionRequest>),
    Frame(Result<String, ConnectorError>),
}

/// Stream connection owning the socket lifecycle
pub struct StreamConnection<D: StreamDialer> {
    dialer: D,
    buffer: Arc<EventBuffer>,
    queue: SubscriptionQueue,
    reconnect_delay: Duration,
    enabled: bool,
    live_subscribe: bool,
    state_tx: watch::Sender<ConnectionState>,
}

impl StreamConnection<VybeDialer> {
    /// Connection to the Vybe live endpoint authenticated by `api_key`
    pub fn connect(
        url: impl Into<String>,
        api_key: impl Into<String>,
        buffer: Arc<EventBuffer>,
        queue: SubscriptionQueue,
    ) -> Self {
        Self::new(VybeDialer::new(url, api_key), buffer, queue)
    }
}

impl<D: StreamDialer> StreamConnection<D> {
    pub fn new(dialer: D, buffer: Arc<EventBuffer>, queue: SubscriptionQueue) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        Self {
            dialer,
            buffer,
            queue,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            enabled: true,
            live_subscribe: false,
            state_tx,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// A disabled connection never dials
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// When set, requests pushed while a session is open are sent right away.
    /// Off by default: the queue is drained only when a session opens.
    pub fn with_live_subscribe(mut self, live_subscribe: bool) -> Self {
        self.live_subscribe = live_subscribe;
        self
    }

    /// Observe state transitions
    pub fn state_handle(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        metrics::set_connected(state == ConnectionState::Open);
        self.state_tx.send_replace(state);
    }

    /// Run until shutdown. Returns immediately when disabled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut state = if self.enabled {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disabled
        };
        let mut session: Option<Box<dyn StreamSession>> = None;

        loop {
            self.set_state(state);
            state = match state {
                ConnectionState::Disabled => {
                    info!("Live streaming disabled, connection not started");
                    return;
                }
                ConnectionState::Stopped => {
                    if let Some(mut s) = session.take() {
                        if let Err(e) = s.close().await {
                            debug!(error = %e, "Error closing session on shutdown");
                        }
                    }
                    info!("Stream connection stopped");
                    return;
                }
                ConnectionState::Connecting => {
                    let dialed = tokio::select! {
                        _ = shutdown_requested(&mut shutdown) => None,
                        result = tokio::time::timeout(CONNECT_TIMEOUT, self.dialer.dial()) => Some(result),
                    };
                    match dialed {
                        None => ConnectionState::Stopped,
                        Some(Ok(Ok(mut s))) => {
                            info!("Connected to Vybe live endpoint");
                            let sent = self.drain_subscriptions(s.as_mut()).await;
                            debug!(frames = sent, "Subscription queue drained on open");
                            session = Some(s);
                            ConnectionState::Open
                        }
                        Some(Ok(Err(e))) => {
                            error!(error = %e, "Live connection failed");
                            ConnectionState::Backoff
                        }
                        Some(Err(_)) => {
                            error!(
                                timeout_secs = CONNECT_TIMEOUT.as_secs(),
                                "Live connection timed out"
                            );
                            ConnectionState::Backoff
                        }
                    }
                }
                ConnectionState::Open => match session.as_mut() {
                    None => ConnectionState::Connecting,
                    Some(s) => match self.pump(s.as_mut(), &mut shutdown).await {
                        SessionEnd::Shutdown => ConnectionState::Stopped,
                        SessionEnd::Lost(e) => {
                            error!(error = %e, "Live connection lost");
                            session = None;
                            ConnectionState::Backoff
                        }
                    },
                },
                ConnectionState::Backoff => {
                    info!(
                        delay_secs = self.reconnect_delay.as_secs_f64(),
                        "Reconnecting after delay"
                    );
                    tokio::select! {
                        _ = shutdown_requested(&mut shutdown) => ConnectionState::Stopped,
                        _ = tokio::time::sleep(self.reconnect_delay) => {
                            metrics::inc_reconnect();
                            ConnectionState::Connecting
                        }
                    }
                }
            };
        }
    }

    /// Read frames until the session fails or shutdown is requested
    async fn pump(
        &mut self,
        session: &mut dyn StreamSession,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let mut queue_open = true;
        loop {
            let live = self.live_subscribe && queue_open;
            let event = tokio::select! {
                _ = shutdown_requested(shutdown) => return SessionEnd::Shutdown,
                request = self.queue.recv(), if live => PumpEvent::Request(request),
                frame = session.recv_text() => PumpEvent::Frame(frame),
            };

            match event {
                PumpEvent::Request(Some(request)) => {
                    send_subscription(session, &request).await;
                    self.drain_subscriptions(session).await;
                }
                PumpEvent::Request(None) => {
                    debug!("All dispatchers dropped, live subscribe off");
                    queue_open = false;
                }
                PumpEvent::Frame(Ok(text)) => {
                    ingest_frame(&self.buffer, &text);
                }
                PumpEvent::Frame(Err(e)) => return SessionEnd::Lost(e),
            }
        }
    }

    /// Send one configure frame per queued request. Returns frames sent.
    async fn drain_subscriptions(&mut self, session: &mut dyn StreamSession) -> usize {
        let mut sent = 0;
        for request in self.queue.drain() {
            if send_subscription(session, &request).await {
                sent += 1;
            }
        }
        sent
    }
}

/// Resolves when shutdown is signalled or the signal sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn send_subscription(session: &mut dyn StreamSession, request: &SubscriptionRequest) -> bool {
    let Some(dex) = request.dex() else {
        debug!(venue = %request.venue(), "Dropping subscription for unknown venue");
        return false;
    };

    let frame = match ConfigureFrame::trades_for(dex).to_json() {
        Ok(frame) => frame,
        Err(e) => {
            error!(dex = %dex, error = %e, "Failed to encode configure frame");
            return false;
        }
    };

    match session.send_text(frame).await {
        Ok(()) => {
            info!(dex = %dex, program_id = %dex.program_id(), "Sent configuration");
            metrics::inc_configure_frame(dex.as_str());
            true
        }
        Err(e) => {
            error!(dex = %dex, error = %e, "Failed to send configuration");
            false
        }
    }
}

/// Parse, classify, and buffer one inbound text frame
pub fn ingest_frame(buffer: &EventBuffer, text: &str) -> FrameOutcome {
    let outcome = match serde_json::from_str::<Value>(text) {
        Err(e) => {
            warn!(error = %e, raw = %text, "Received invalid JSON message");
            FrameOutcome::Malformed
        }
        Ok(event) => {
            trace!(raw = %text, "Raw live message");
            if is_relevant(&event) {
                buffer.append(event);
                FrameOutcome::Buffered
            } else {
                debug!("Dropping irrelevant live message");
                FrameOutcome::Dropped
            }
        }
    };
    metrics::inc_message(outcome.as_str());
    outcome
}
