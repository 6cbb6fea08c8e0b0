//! Prometheus metrics for the live feed
//!
//! Tracks inbound message outcomes, subscription frames, reconnects, and
//! buffer occupancy.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

const LABEL_OUTCOME: &str = "outcome";
const LABEL_DEX: &str = "dex";

/// Inbound frames by outcome (buffered, dropped, malformed)
static MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "vybe_live_messages_total",
        "Inbound live frames by classification outcome",
        &[LABEL_OUTCOME]
    )
    .expect("Failed to register messages_total metric")
});

/// Configure frames sent per venue
static CONFIGURE_FRAMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "vybe_live_configure_frames_total",
        "Filter configuration frames sent upstream",
        &[LABEL_DEX]
    )
    .expect("Failed to register configure_frames_total metric")
});

static RECONNECTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vybe_live_reconnects_total",
        "Reconnect attempts after an error or close"
    )
    .expect("Failed to register reconnects_total metric")
});

/// WebSocket connection status (1 = open, 0 = not open)
static WEBSOCKET_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "vybe_live_websocket_connected",
        "WebSocket connection status (1=open, 0=not open)"
    )
    .expect("Failed to register websocket_connected metric")
});

static BUFFER_LEN: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("vybe_live_buffer_len", "Events currently buffered")
        .expect("Failed to register buffer_len metric")
});

/// Live trade polls by outcome (complete, partial, empty)
static POLLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "vybe_live_polls_total",
        "Live trade polls by outcome",
        &[LABEL_OUTCOME]
    )
    .expect("Failed to register polls_total metric")
});

pub fn inc_message(outcome: &str) {
    MESSAGES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn inc_configure_frame(dex: &str) {
    CONFIGURE_FRAMES_TOTAL.with_label_values(&[dex]).inc();
}

pub fn inc_reconnect() {
    RECONNECTS_TOTAL.inc();
}

pub fn set_connected(connected: bool) {
    WEBSOCKET_CONNECTED.set(i64::from(connected));
}

/// Handle to the buffer occupancy gauge
pub fn buffer_len_gauge() -> IntGauge {
    BUFFER_LEN.clone()
}

pub fn inc_poll(outcome: &str) {
    POLLS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
    })
}
