//! Display formatting for buffered live events
//!
//! Upstream payloads have no fixed schema, so every attribute is resolved
//! from a canonical key with a fallback key, reading from the nested `data`
//! object when there is one. Formatting is total: malformed input yields
//! `None` and the raw payload is logged, never an error.

use chrono::{DateTime, Datelike, Utc};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use tracing::warn;

const NOT_AVAILABLE: &str = "N/A";
const SHORT_LEN: usize = 8;

/// One live event rendered for display
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedRecord {
    pub token: String,
    pub amount: f64,
    pub sender: String,
    pub receiver: String,
    pub timestamp: String,
    pub signature: String,
}

impl fmt::Display for FormattedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token: {}, Amount: {:.4}, From: {}, To: {}, Time: {}, Tx: {}",
            self.token, self.amount, self.sender, self.receiver, self.timestamp, self.signature
        )
    }
}

#[derive(Error, Debug, PartialEq)]
enum FieldError {
    #[error("field `{0}` is not a string")]
    NotString(&'static str),
    #[error("amount is not numeric")]
    Amount,
    #[error("amount {0} is not finite")]
    AmountRange(f64),
    #[error("decimal is not numeric")]
    Decimal,
    #[error("block time is not a number")]
    BlockTime,
    #[error("block time {0} out of range")]
    BlockTimeRange(f64),
}

/// Format one raw event, or `None` when it has no usable shape
pub fn format_transaction(event: &Value) -> Option<FormattedRecord> {
    match try_format(event) {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, raw = %event, "Failed to format transaction");
            None
        }
    }
}

fn try_format(event: &Value) -> Result<Option<FormattedRecord>, FieldError> {
    let Some(event) = event.as_object() else {
        return Ok(None);
    };
    let data = match event.get("data") {
        Some(Value::Object(nested)) => nested,
        Some(_) => return Ok(None),
        None => event,
    };

    let token = short_field(data, "mintAddress", "mint")?;
    let amount = scaled_amount(data)?;
    let sender = short_field(data, "senderAddress", "sender")?;
    let receiver = short_field(data, "receiverAddress", "receiver")?;
    let timestamp = block_time(data)?;
    let signature = short_field(data, "signature", "txId")?;

    Ok(Some(FormattedRecord {
        token,
        amount,
        sender,
        receiver,
        timestamp,
        signature,
    }))
}

/// Loose presence test: null, false, zero, "" and empty containers count as absent
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn pick<'a>(data: &'a Map<String, Value>, primary: &str, fallback: &str) -> Option<&'a Value> {
    data.get(primary)
        .filter(|v| is_truthy(v))
        .or_else(|| data.get(fallback).filter(|v| is_truthy(v)))
}

fn short_field(
    data: &Map<String, Value>,
    primary: &'static str,
    fallback: &'static str,
) -> Result<String, FieldError> {
    match pick(data, primary, fallback) {
        None => Ok(NOT_AVAILABLE.to_string()),
        Some(Value::String(s)) => Ok(shorten(s)),
        Some(_) => Err(FieldError::NotString(primary)),
    }
}

fn shorten(s: &str) -> String {
    let head: String = s.chars().take(SHORT_LEN).collect();
    format!("{head}...")
}

fn scaled_amount(data: &Map<String, Value>) -> Result<f64, FieldError> {
    let amount = data.get("amount").filter(|v| is_truthy(v));
    let decimal = data.get("decimal").filter(|v| is_truthy(v));
    let (Some(amount), Some(decimal)) = (amount, decimal) else {
        return Ok(0.0);
    };

    let amount = match amount {
        Value::Number(n) => n.as_f64().ok_or(FieldError::Amount)?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| FieldError::Amount)?,
        _ => return Err(FieldError::Amount),
    };
    let decimal = decimal.as_f64().ok_or(FieldError::Decimal)?;
    let scale = if decimal.fract() == 0.0 && decimal.abs() <= i32::MAX as f64 {
        10f64.powi(decimal as i32)
    } else {
        10f64.powf(decimal)
    };

    let scaled = amount / scale;
    if !scaled.is_finite() {
        return Err(FieldError::AmountRange(scaled));
    }
    Ok(scaled)
}

fn block_time(data: &Map<String, Value>) -> Result<String, FieldError> {
    let Some(raw) = pick(data, "blockTime", "timestamp") else {
        return Ok(NOT_AVAILABLE.to_string());
    };
    let secs = raw.as_f64().ok_or(FieldError::BlockTime)?;
    if !secs.is_finite() || secs.abs() > i64::MAX as f64 {
        return Err(FieldError::BlockTimeRange(secs));
    }

    let dt: DateTime<Utc> = DateTime::from_timestamp(secs.floor() as i64, 0)
        .filter(|dt| (1..=9999).contains(&dt.year()))
        .ok_or(FieldError::BlockTimeRange(secs))?;

    Ok(dt.format("%Y-%m-%d %H:%M:%S").to_string())
}
